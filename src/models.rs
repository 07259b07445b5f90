use std::{fmt, str::FromStr};

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Completed,
    Canceled,
}

impl AppointmentStatus {
    pub const ALL: [AppointmentStatus; 4] = [
        AppointmentStatus::Pending,
        AppointmentStatus::Confirmed,
        AppointmentStatus::Completed,
        AppointmentStatus::Canceled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Canceled => "canceled",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "Awaiting confirmation",
            AppointmentStatus::Confirmed => "Confirmed",
            AppointmentStatus::Completed => "Completed",
            AppointmentStatus::Canceled => "Canceled",
        }
    }

    /// No client-driven transition leaves a terminal state.
    pub fn is_terminal(self) -> bool {
        matches!(self, AppointmentStatus::Completed | AppointmentStatus::Canceled)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        AppointmentStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == value.trim())
            .ok_or_else(|| format!("Unknown appointment status '{value}'."))
    }
}

/// Credential view of an active user.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub id: String,
    pub display_name: String,
    pub password_hash: String,
    pub is_staff: bool,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ClientRow {
    pub id: String,
    pub user_id: String,
    pub phone: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct LocationRow {
    pub id: String,
    pub name: String,
    pub address: String,
    pub phone: String,
    pub email: String,
    pub working_hours: String,
    pub description: String,
    pub is_active: bool,
    pub latitude: String,
    pub longitude: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CategoryRow {
    pub id: String,
    pub name: String,
    pub description: String,
    pub icon: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ServiceRow {
    pub id: String,
    pub category_id: String,
    pub name: String,
    pub description: String,
    pub price_cents: i64,
    pub duration_minutes: i64,
    pub is_active: bool,
}

impl ServiceRow {
    pub fn duration(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.duration_minutes)
    }

    pub fn price_display(&self) -> String {
        format!("{}.{:02}", self.price_cents / 100, self.price_cents % 100)
    }
}

/// Appointment joined with the display names of its client, service and location.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct AppointmentRow {
    pub id: String,
    pub client_id: String,
    pub client_name: String,
    pub service_id: String,
    pub service_name: String,
    pub location_id: String,
    pub location_name: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub status: AppointmentStatus,
    pub notes: String,
    pub admin_notes: String,
    pub notified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Procedure review. `client_id` is read through the owning appointment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct ReviewRow {
    pub id: String,
    pub appointment_id: String,
    pub client_id: String,
    pub client_name: String,
    pub service_name: String,
    pub location_id: String,
    pub rating: i64,
    pub comment: String,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct ServiceReviewRow {
    pub id: String,
    pub user_id: String,
    pub user_name: String,
    pub service_id: String,
    pub service_name: String,
    pub location_id: String,
    pub rating: i64,
    pub comment: String,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ClientGender {
    Male,
    #[default]
    Female,
}

impl ClientGender {
    pub fn label(self) -> &'static str {
        match self {
            ClientGender::Male => "Man",
            ClientGender::Female => "Woman",
        }
    }
}

/// Before/after result joined with its service and the service's category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct ResultRow {
    pub id: String,
    pub title: String,
    pub service_id: String,
    pub service_name: String,
    pub category_id: String,
    pub category_name: String,
    pub before_image: String,
    pub after_image: String,
    pub sessions_count: i64,
    pub period: String,
    pub description: String,
    pub client_gender: ClientGender,
    pub client_age: Option<i64>,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum CalendarKind {
    None,
    Google,
    Ical,
}

impl CalendarKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CalendarKind::None => "none",
            CalendarKind::Google => "google",
            CalendarKind::Ical => "ical",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct CalendarSettingsRow {
    pub user_id: String,
    pub calendar_kind: CalendarKind,
    pub add_appointments: bool,
    pub update_appointments: bool,
    pub remove_canceled: bool,
    pub reminder_minutes: i64,
}

/// Everything a calendar collaborator needs about one appointment.
#[derive(Debug, Clone)]
pub struct AppointmentSnapshot {
    pub appointment: AppointmentRow,
    pub service: ServiceRow,
    pub location: LocationRow,
}
