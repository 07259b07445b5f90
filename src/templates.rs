use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use askama::Template;

use crate::error::BookingError;

#[derive(Template)]
#[template(path = "message.html")]
struct MessageTemplate {
    title: String,
    message: String,
}

pub fn render<T: Template>(template: T) -> HttpResponse {
    render_with_status(StatusCode::OK, template)
}

pub fn render_with_status<T: Template>(status: StatusCode, template: T) -> HttpResponse {
    match template.render() {
        Ok(body) => HttpResponse::build(status)
            .content_type("text/html; charset=utf-8")
            .body(body),
        Err(err) => {
            log::error!("Template render error: {err}");
            HttpResponse::InternalServerError().finish()
        }
    }
}

/// HTML rendering of a rejection for pages without a form to re-render.
/// Authentication challenges and internal failures keep their plain response.
pub fn error_page(err: BookingError) -> HttpResponse {
    match err {
        BookingError::Unauthenticated | BookingError::Database(_) | BookingError::PasswordHash(_) => {
            err.error_response()
        }
        other => render_with_status(
            other.status_code(),
            MessageTemplate {
                title: match &other {
                    BookingError::NotFound(_) => "Not found".to_string(),
                    BookingError::Ownership(_) => "Not allowed".to_string(),
                    _ => "Request rejected".to_string(),
                },
                message: other.to_string(),
            },
        ),
    }
}
