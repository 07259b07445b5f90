use actix_web::{http::header, http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

use crate::auth::AUTH_REALM;

/// Rejection returned by the booking core. Nothing is written when one is returned.
#[derive(Debug, Error)]
pub enum BookingError {
    /// Malformed input, e.g. a rating outside 1..=5.
    #[error("{0}")]
    Validation(String),
    /// The actor neither owns the record nor is staff.
    #[error("{0}")]
    Ownership(String),
    /// The record is not in the status the operation needs.
    #[error("{0}")]
    Precondition(String),
    #[error("{0}")]
    Duplicate(String),
    /// Missing, or outside the actor's visible set.
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("Authentication required")]
    Unauthenticated,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("password hashing failed: {0}")]
    PasswordHash(String),
}

pub type BookingResult<T> = Result<T, BookingError>;

impl BookingError {
    pub fn kind(&self) -> &'static str {
        match self {
            BookingError::Validation(_) => "validation_error",
            BookingError::Ownership(_) => "ownership_violation",
            BookingError::Precondition(_) => "precondition_violation",
            BookingError::Duplicate(_) => "duplicate_violation",
            BookingError::NotFound(_) => "not_found",
            BookingError::Unauthenticated => "unauthenticated",
            BookingError::Database(_) | BookingError::PasswordHash(_) => "internal_error",
        }
    }

    /// True for rejections a form should show next to the re-rendered input.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            BookingError::Validation(_)
                | BookingError::Precondition(_)
                | BookingError::Duplicate(_)
                | BookingError::Ownership(_)
        )
    }
}

/// Maps a unique-constraint failure onto a duplicate rejection.
pub fn duplicate_on_conflict(err: sqlx::Error, message: &str) -> BookingError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            BookingError::Duplicate(message.to_string())
        }
        _ => BookingError::Database(err),
    }
}

impl ResponseError for BookingError {
    fn status_code(&self) -> StatusCode {
        match self {
            BookingError::Validation(_)
            | BookingError::Precondition(_)
            | BookingError::Duplicate(_) => StatusCode::BAD_REQUEST,
            BookingError::Ownership(_) => StatusCode::FORBIDDEN,
            BookingError::NotFound(_) => StatusCode::NOT_FOUND,
            BookingError::Unauthenticated => StatusCode::UNAUTHORIZED,
            BookingError::Database(_) | BookingError::PasswordHash(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let detail = match self {
            BookingError::Database(_) | BookingError::PasswordHash(_) => {
                log::error!("Internal failure: {self}");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let mut response = HttpResponse::build(self.status_code());
        if matches!(self, BookingError::Unauthenticated) {
            response.insert_header((
                header::WWW_AUTHENTICATE,
                format!("Basic realm=\"{AUTH_REALM}\""),
            ));
        }
        response.json(json!({ "error": self.kind(), "detail": detail }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_classes_match_rejection_kinds() {
        let cases = [
            (BookingError::Validation("bad".into()), StatusCode::BAD_REQUEST),
            (BookingError::Precondition("state".into()), StatusCode::BAD_REQUEST),
            (BookingError::Duplicate("again".into()), StatusCode::BAD_REQUEST),
            (BookingError::Ownership("mine".into()), StatusCode::FORBIDDEN),
            (BookingError::NotFound("Appointment"), StatusCode::NOT_FOUND),
            (BookingError::Unauthenticated, StatusCode::UNAUTHORIZED),
            (
                BookingError::PasswordHash("salt".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(err.status_code(), status, "{}", err.kind());
        }
    }

    #[test]
    fn unauthenticated_carries_basic_challenge() {
        let response = BookingError::Unauthenticated.error_response();
        let challenge = response
            .headers()
            .get(header::WWW_AUTHENTICATE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        assert!(challenge.starts_with("Basic realm="));
    }

    #[test]
    fn not_found_names_the_record() {
        assert_eq!(
            BookingError::NotFound("Review").to_string(),
            "Review not found"
        );
    }
}
