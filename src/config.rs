use std::env;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub site_url: String,
    pub calendar_domain: String,
    pub calendar_tzid: String,
    pub seed_catalog: bool,
}

impl Config {
    pub fn from_env() -> Self {
        let port = env::var("PORT")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(8080);

        Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://./data/salonbook.db".to_string()),
            port,
            site_url: env::var("SITE_URL")
                .map(|value| value.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| format!("http://localhost:{port}")),
            calendar_domain: env::var("CALENDAR_DOMAIN")
                .unwrap_or_else(|_| "salonbook.local".to_string()),
            calendar_tzid: env::var("CALENDAR_TZID")
                .unwrap_or_else(|_| "Europe/Moscow".to_string()),
            seed_catalog: env::var("SEED_CATALOG")
                .map(|value| value != "false")
                .unwrap_or(true),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            port: 8080,
            site_url: "http://localhost:8080".to_string(),
            calendar_domain: "salonbook.local".to_string(),
            calendar_tzid: "Europe/Moscow".to_string(),
            seed_catalog: false,
        }
    }
}
