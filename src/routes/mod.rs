pub mod api;
pub mod site;
pub mod staff;

use serde::Serialize;

use crate::{
    models::{AppointmentRow, AppointmentStatus, ResultRow, ReviewRow, ServiceReviewRow},
    policy::Actor,
};

/// Appointment as shown to one actor. Staff notes only reach staff.
#[derive(Clone, Debug, Serialize)]
pub struct AppointmentView {
    pub id: String,
    pub client_id: String,
    pub client_name: String,
    pub service_id: String,
    pub service_name: String,
    pub location_id: String,
    pub location_name: String,
    pub date: String,
    pub time: String,
    pub status: AppointmentStatus,
    pub status_label: &'static str,
    pub notes: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_notes: Option<String>,
    pub notified: bool,
    pub can_cancel: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl AppointmentView {
    pub fn new(row: AppointmentRow, actor: &Actor) -> Self {
        Self {
            date: row.date.format("%Y-%m-%d").to_string(),
            time: row.time.format("%H:%M").to_string(),
            status_label: row.status.label(),
            can_cancel: !row.status.is_terminal(),
            admin_notes: actor.is_staff().then_some(row.admin_notes),
            created_at: row.created_at.format("%Y-%m-%d %H:%M").to_string(),
            updated_at: row.updated_at.format("%Y-%m-%d %H:%M").to_string(),
            id: row.id,
            client_id: row.client_id,
            client_name: row.client_name,
            service_id: row.service_id,
            service_name: row.service_name,
            location_id: row.location_id,
            location_name: row.location_name,
            status: row.status,
            notes: row.notes,
            notified: row.notified,
        }
    }

    pub fn admin_notes_text(&self) -> &str {
        self.admin_notes.as_deref().unwrap_or_default()
    }

    pub fn is_completed(&self) -> bool {
        self.status == AppointmentStatus::Completed
    }
}

/// Row shape shared by the review tables in the HTML pages.
#[derive(Clone, Debug)]
pub struct ReviewView {
    pub id: String,
    pub author: String,
    pub subject: String,
    pub rating: i64,
    pub stars: String,
    pub comment: String,
    pub is_published: bool,
    pub created_at: String,
}

impl From<ReviewRow> for ReviewView {
    fn from(row: ReviewRow) -> Self {
        Self {
            id: row.id,
            author: row.client_name,
            subject: row.service_name,
            rating: row.rating,
            stars: stars(row.rating),
            comment: row.comment,
            is_published: row.is_published,
            created_at: row.created_at.format("%Y-%m-%d").to_string(),
        }
    }
}

impl From<ServiceReviewRow> for ReviewView {
    fn from(row: ServiceReviewRow) -> Self {
        Self {
            id: row.id,
            author: row.user_name,
            subject: row.service_name,
            rating: row.rating,
            stars: stars(row.rating),
            comment: row.comment,
            is_published: row.is_published,
            created_at: row.created_at.format("%Y-%m-%d").to_string(),
        }
    }
}

/// Gallery card for one before/after result.
#[derive(Clone, Debug)]
pub struct ResultView {
    pub id: String,
    pub title: String,
    pub service_id: String,
    pub service_name: String,
    pub before_image: String,
    pub after_image: String,
    pub sessions_count: i64,
    pub period: String,
    pub description: String,
    pub client: String,
    pub is_published: bool,
    pub created_at: String,
}

impl From<ResultRow> for ResultView {
    fn from(row: ResultRow) -> Self {
        let client = match row.client_age {
            Some(age) => format!("{}, {age}", row.client_gender.label()),
            None => row.client_gender.label().to_string(),
        };
        Self {
            id: row.id,
            title: row.title,
            service_id: row.service_id,
            service_name: row.service_name,
            before_image: row.before_image,
            after_image: row.after_image,
            sessions_count: row.sessions_count,
            period: row.period,
            description: row.description,
            client,
            is_published: row.is_published,
            created_at: row.created_at.format("%Y-%m-%d").to_string(),
        }
    }
}

fn stars(rating: i64) -> String {
    let filled = rating.clamp(0, 5) as usize;
    format!("{}{}", "★".repeat(filled), "☆".repeat(5 - filled))
}

#[derive(Clone, Debug)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
    pub selected: bool,
}

impl SelectOption {
    pub fn new(value: impl Into<String>, label: impl Into<String>, current: &str) -> Self {
        let value = value.into();
        Self {
            selected: value == current,
            label: label.into(),
            value,
        }
    }
}

pub fn status_options(current: &str) -> Vec<SelectOption> {
    AppointmentStatus::ALL
        .into_iter()
        .map(|status| SelectOption::new(status.as_str(), status.label(), current))
        .collect()
}
