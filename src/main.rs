mod accounts;
mod auth;
mod calendar;
mod config;
mod db;
mod error;
mod lifecycle;
mod models;
mod notify;
mod policy;
mod results;
mod reviews;
mod routes;
mod state;
mod templates;
#[cfg(test)]
mod test_support;
mod visibility;

use actix_files::Files;
use actix_web::{middleware, web, App, HttpServer};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;

use crate::{config::Config, state::AppState};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    if let Err(err) = run().await {
        eprintln!("Startup error: {err}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .init();

    let config = Config::from_env();
    db::ensure_sqlite_dir(&config.database_url)?;

    let connect_options =
        SqliteConnectOptions::from_str(&config.database_url)?.create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(connect_options)
        .await?;

    db::run_migrations(&pool).await?;
    db::seed_defaults(&pool, config.seed_catalog).await?;

    let address = format!("0.0.0.0:{}", config.port);
    log::info!("Starting Salonbook on http://{address} (public URL {})", config.site_url);

    let state = AppState::new(pool, config);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .wrap(middleware::Logger::default())
            .service(Files::new("/static", "./static").prefer_utf8(true))
            .configure(routes::api::configure)
            .configure(routes::staff::configure)
            .configure(routes::site::configure)
    })
    .bind(address)?
    .run()
    .await?;

    Ok(())
}
