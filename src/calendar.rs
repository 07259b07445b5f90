use chrono::{DateTime, NaiveDateTime, Utc};
use icalendar::{Calendar, CalendarDateTime, Component, Event, EventLike, EventStatus};
use thiserror::Error;

use crate::{
    config::Config,
    db,
    models::{
        AppointmentRow, AppointmentSnapshot, AppointmentStatus, CalendarKind, CalendarSettingsRow,
    },
    state::AppState,
};

#[derive(Debug, Error)]
pub enum CalendarError {
    #[error("event {0} does not end after it starts")]
    InvalidEvent(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarEvent {
    pub uid: String,
    pub summary: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub location: String,
    pub description: String,
    pub url: String,
    pub status: AppointmentStatus,
}

impl CalendarEvent {
    pub fn from_snapshot(snapshot: &AppointmentSnapshot, config: &Config) -> Self {
        let AppointmentSnapshot {
            appointment,
            service,
            location,
        } = snapshot;
        let start = appointment.date.and_time(appointment.time);

        let mut description = vec![
            format!("Service: {}", service.name),
            format!("Studio: {}", location.name),
            format!("Address: {}", location.address),
            format!("Phone: {}", location.phone),
        ];
        if !appointment.notes.is_empty() {
            description.push(String::new());
            description.push(format!("Notes: {}", appointment.notes));
        }
        description.push(String::new());
        description.push(format!("Status: {}", appointment.status.label()));

        Self {
            uid: event_uid(&appointment.id, &config.calendar_domain),
            summary: format!("Appointment: {}", service.name),
            start,
            end: start + service.duration(),
            location: location.address.clone(),
            description: description.join("\n"),
            url: format!(
                "{}/my/appointments/{}",
                config.site_url.trim_end_matches('/'),
                appointment.id
            ),
            status: appointment.status,
        }
    }

    pub fn check(&self) -> Result<(), CalendarError> {
        if self.end <= self.start {
            return Err(CalendarError::InvalidEvent(self.uid.clone()));
        }
        Ok(())
    }

    /// iCalendar document holding this single event.
    pub fn to_ics(&self, tzid: &str, stamp: DateTime<Utc>) -> String {
        let status = match self.status {
            AppointmentStatus::Pending => EventStatus::Tentative,
            AppointmentStatus::Confirmed | AppointmentStatus::Completed => EventStatus::Confirmed,
            AppointmentStatus::Canceled => EventStatus::Cancelled,
        };
        let local = |date_time: NaiveDateTime| CalendarDateTime::WithTimezone {
            date_time,
            tzid: tzid.to_string(),
        };

        let event = Event::new()
            .uid(&self.uid)
            .timestamp(stamp)
            .starts(local(self.start))
            .ends(local(self.end))
            .summary(&self.summary)
            .location(&self.location)
            .description(&self.description)
            .add_property("URL", self.url.as_str())
            .status(status)
            .done();

        Calendar::new().push(event).done().to_string()
    }
}

pub fn event_uid(appointment_id: &str, domain: &str) -> String {
    format!("appointment-{appointment_id}@{domain}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    Add,
    Update,
    Remove,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalendarChange {
    Created,
    Updated,
}

/// What the owner's settings ask for after a change, if anything.
pub fn plan(
    settings: &CalendarSettingsRow,
    status: AppointmentStatus,
    change: CalendarChange,
) -> Option<SyncAction> {
    if settings.calendar_kind == CalendarKind::None {
        return None;
    }

    match change {
        CalendarChange::Created => settings.add_appointments.then_some(SyncAction::Add),
        CalendarChange::Updated
            if status == AppointmentStatus::Canceled && settings.remove_canceled =>
        {
            Some(SyncAction::Remove)
        }
        CalendarChange::Updated => settings.update_appointments.then_some(SyncAction::Update),
    }
}

pub trait CalendarSink: Send + Sync {
    fn deliver(
        &self,
        settings: &CalendarSettingsRow,
        action: SyncAction,
        event: &CalendarEvent,
    ) -> Result<(), CalendarError>;
}

/// Default sink: records what would have been sent.
pub struct LogCalendarSink;

impl CalendarSink for LogCalendarSink {
    fn deliver(
        &self,
        settings: &CalendarSettingsRow,
        action: SyncAction,
        event: &CalendarEvent,
    ) -> Result<(), CalendarError> {
        event.check()?;
        log::info!(
            "Calendar {:?} for user {} via {}: {} at {} (reminder {} min)",
            action,
            settings.user_id,
            settings.calendar_kind.as_str(),
            event.uid,
            event.start,
            settings.reminder_minutes
        );
        Ok(())
    }
}

/// Pushes a change to the appointment owner's calendar. Never fails the caller.
pub async fn sync_appointment(
    state: &AppState,
    appointment: &AppointmentRow,
    change: CalendarChange,
) -> Option<SyncAction> {
    let settings = match db::calendar_settings(&state.db, &appointment.client_id).await {
        Ok(settings) => settings,
        Err(err) => {
            log::warn!("Calendar settings unavailable for {}: {err}", appointment.client_id);
            return None;
        }
    };
    let action = plan(&settings, appointment.status, change)?;

    let snapshot = {
        let mut conn = match state.db.acquire().await {
            Ok(conn) => conn,
            Err(err) => {
                log::warn!("Calendar sync skipped for {}: {err}", appointment.id);
                return None;
            }
        };
        match db::load_snapshot(&mut conn, appointment.clone()).await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                log::warn!("Calendar sync skipped for {}: {err}", appointment.id);
                return None;
            }
        }
    };

    let event = CalendarEvent::from_snapshot(&snapshot, &state.config);
    match state.calendar.deliver(&settings, action, &event) {
        Ok(()) => Some(action),
        Err(err) => {
            log::warn!("Calendar sync failed for {}: {err}", appointment.id);
            None
        }
    }
}
