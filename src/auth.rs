use actix_web::{
    dev::{Payload, ServiceRequest},
    error::{ErrorInternalServerError, ErrorUnauthorized},
    http::header::Header,
    web, Error, FromRequest, HttpMessage, HttpRequest,
};
use actix_web_httpauth::{
    extractors::basic::BasicAuth,
    headers::authorization::{Authorization, Basic},
};
use argon2::{
    password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use futures::future::LocalBoxFuture;
use rand_core::OsRng;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{error::BookingError, models::UserRow, policy::Actor, state::AppState};

pub const AUTH_REALM: &str = "Salonbook";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthUser {
    pub id: String,
    pub display_name: String,
    pub is_staff: bool,
}

pub fn hash_password(password: &str) -> Result<String, password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

fn verify_password(password: &str, password_hash: &str) -> bool {
    match PasswordHash::new(password_hash) {
        Ok(hash) => Argon2::default()
            .verify_password(password.as_bytes(), &hash)
            .is_ok(),
        Err(_) => false,
    }
}

pub async fn authenticate_credentials(
    pool: &SqlitePool,
    username: &str,
    password: &str,
) -> Option<AuthUser> {
    let user = sqlx::query_as::<_, UserRow>(
        r#"SELECT id, display_name, password_hash, is_staff
           FROM users
           WHERE username = ? AND active = 1
           LIMIT 1"#,
    )
    .bind(username)
    .fetch_optional(pool)
    .await
    .map_err(|err| log::warn!("Credential lookup failed: {err}"))
    .ok()??;

    if !verify_password(password, &user.password_hash) {
        return None;
    }

    Some(AuthUser {
        id: user.id,
        display_name: user.display_name,
        is_staff: user.is_staff,
    })
}

async fn authenticate(req: &ServiceRequest, credentials: &BasicAuth) -> Result<AuthUser, Error> {
    let state = req
        .app_data::<web::Data<AppState>>()
        .ok_or_else(|| ErrorUnauthorized("Unauthorized"))?;
    let password = credentials.password().unwrap_or_default();
    authenticate_credentials(&state.db, credentials.user_id(), password)
        .await
        .ok_or_else(|| BookingError::Unauthenticated.into())
}

pub async fn basic_validator(
    req: ServiceRequest,
    credentials: BasicAuth,
) -> Result<ServiceRequest, (Error, ServiceRequest)> {
    match authenticate(&req, &credentials).await {
        Ok(user) => {
            req.extensions_mut().insert(user);
            Ok(req)
        }
        Err(err) => Err((err, req)),
    }
}

pub async fn staff_validator(
    req: ServiceRequest,
    credentials: BasicAuth,
) -> Result<ServiceRequest, (Error, ServiceRequest)> {
    match authenticate(&req, &credentials).await {
        Ok(user) => {
            if !user.is_staff {
                let denied = BookingError::Ownership("Staff access required.".to_string());
                return Err((denied.into(), req));
            }
            req.extensions_mut().insert(user);
            Ok(req)
        }
        Err(err) => Err((err, req)),
    }
}

/// Resolves the caller. A request without credentials is anonymous; a request
/// with credentials that do not check out is rejected.
impl FromRequest for Actor {
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        if let Some(user) = req.extensions().get::<AuthUser>().cloned() {
            return Box::pin(async move { Ok(Actor::from(user)) });
        }

        let credentials = Authorization::<Basic>::parse(req)
            .ok()
            .map(|auth| auth.into_scheme());
        let state = req.app_data::<web::Data<AppState>>().cloned();

        Box::pin(async move {
            let Some(credentials) = credentials else {
                return Ok(Actor::Anonymous);
            };
            let state = state.ok_or_else(|| ErrorInternalServerError("missing app state"))?;
            let password = credentials.password().unwrap_or_default();
            authenticate_credentials(&state.db, credentials.user_id(), password)
                .await
                .map(Actor::from)
                .ok_or_else(|| BookingError::Unauthenticated.into())
        })
    }
}

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}
