use chrono::{NaiveDate, NaiveTime, Utc};
use serde::Deserialize;
use sqlx::SqlitePool;

use crate::{
    auth::new_id,
    db,
    error::{BookingError, BookingResult},
    models::{AppointmentRow, AppointmentStatus},
    notify,
    policy::{authorize, Actor, Intent, Record},
};

#[derive(Debug, Clone, Deserialize)]
pub struct NewAppointment {
    pub service_id: String,
    pub location_id: String,
    pub date: String,
    pub time: String,
    #[serde(default)]
    pub notes: String,
}

/// Staff-side update. `None` leaves the stored value alone.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusChange {
    pub status: AppointmentStatus,
    #[serde(default)]
    pub admin_notes: Option<String>,
    #[serde(default)]
    pub notified: Option<bool>,
}

pub fn parse_slot(date: &str, time: &str) -> BookingResult<(NaiveDate, NaiveTime)> {
    let date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
        .map_err(|_| BookingError::Validation("Please pick a valid date.".to_string()))?;
    let time = NaiveTime::parse_from_str(time.trim(), "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(time.trim(), "%H:%M:%S"))
        .map_err(|_| BookingError::Validation("Please pick a valid time.".to_string()))?;
    Ok((date, time))
}

pub async fn create_appointment(
    pool: &SqlitePool,
    actor: &Actor,
    input: NewAppointment,
) -> BookingResult<AppointmentRow> {
    let user = actor.require_user()?;
    let (date, time) = parse_slot(&input.date, &input.time)?;

    let mut tx = pool.begin().await?;

    let service_ok = db::find_service(&mut tx, &input.service_id)
        .await?
        .is_some_and(|service| service.is_active);
    if !service_ok {
        return Err(BookingError::Validation("Please select a valid service.".to_string()));
    }
    let location_ok = db::find_location(&mut tx, &input.location_id)
        .await?
        .is_some_and(|location| location.is_active);
    if !location_ok {
        return Err(BookingError::Validation("Please select a valid location.".to_string()));
    }

    let appointment_id = new_id();
    let now = Utc::now();
    sqlx::query(
        r#"INSERT INTO appointments
           (id, client_id, service_id, location_id, date, time, status, notes, admin_notes, notified, created_at, updated_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, '', 0, ?, ?)"#,
    )
    .bind(&appointment_id)
    .bind(&user.id)
    .bind(&input.service_id)
    .bind(&input.location_id)
    .bind(date)
    .bind(time)
    .bind(AppointmentStatus::Pending)
    .bind(input.notes.trim())
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    let appointment = db::find_appointment(&mut tx, &appointment_id)
        .await?
        .ok_or(BookingError::NotFound("Appointment"))?;
    tx.commit().await?;

    log::info!(
        "{} booked appointment {} for {} {}",
        user.display_name,
        appointment.id,
        appointment.date,
        appointment.time
    );
    Ok(appointment)
}

pub async fn cancel_appointment(
    pool: &SqlitePool,
    actor: &Actor,
    appointment_id: &str,
) -> BookingResult<AppointmentRow> {
    let user = actor.require_user()?;
    let mut tx = pool.begin().await?;

    let appointment = db::find_appointment(&mut tx, appointment_id)
        .await?
        .ok_or(BookingError::NotFound("Appointment"))?;
    authorize(actor, Record::Appointment(&appointment), Intent::Write)?;

    if appointment.status.is_terminal() {
        return Err(cannot_cancel());
    }

    let updated = sqlx::query(
        r#"UPDATE appointments SET status = ?, updated_at = ?
           WHERE id = ? AND status IN (?, ?)"#,
    )
    .bind(AppointmentStatus::Canceled)
    .bind(Utc::now())
    .bind(appointment_id)
    .bind(AppointmentStatus::Pending)
    .bind(AppointmentStatus::Confirmed)
    .execute(&mut *tx)
    .await?;
    if updated.rows_affected() == 0 {
        return Err(cannot_cancel());
    }

    let appointment = db::find_appointment(&mut tx, appointment_id)
        .await?
        .ok_or(BookingError::NotFound("Appointment"))?;
    tx.commit().await?;

    log::info!("{} canceled appointment {}", user.display_name, appointment_id);
    Ok(appointment)
}

fn cannot_cancel() -> BookingError {
    BookingError::Precondition(
        "Cannot cancel a completed or already canceled appointment.".to_string(),
    )
}

pub async fn set_status(
    pool: &SqlitePool,
    actor: &Actor,
    appointment_id: &str,
    change: StatusChange,
) -> BookingResult<AppointmentRow> {
    let staff = actor.require_staff()?;
    let mut tx = pool.begin().await?;

    let before = db::find_appointment(&mut tx, appointment_id)
        .await?
        .ok_or(BookingError::NotFound("Appointment"))?;
    authorize(actor, Record::Appointment(&before), Intent::Administer)?;

    sqlx::query(
        r#"UPDATE appointments
           SET status = ?,
               admin_notes = COALESCE(?, admin_notes),
               notified = COALESCE(?, notified),
               updated_at = ?
           WHERE id = ?"#,
    )
    .bind(change.status)
    .bind(change.admin_notes.as_deref().map(str::trim))
    .bind(change.notified)
    .bind(Utc::now())
    .bind(appointment_id)
    .execute(&mut *tx)
    .await?;

    let after = db::find_appointment(&mut tx, appointment_id)
        .await?
        .ok_or(BookingError::NotFound("Appointment"))?;
    tx.commit().await?;

    log::info!(
        "{} moved appointment {} from {} to {}",
        staff.display_name,
        appointment_id,
        before.status,
        after.status
    );
    if !before.notified && after.notified {
        notify::appointment_notified(&after);
    }
    Ok(after)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{client, staff, Fixture};

    fn booking(fixture: &Fixture) -> NewAppointment {
        NewAppointment {
            service_id: fixture.service_id.clone(),
            location_id: fixture.location_id.clone(),
            date: "2030-03-01".to_string(),
            time: "14:30".to_string(),
            notes: "  first visit ".to_string(),
        }
    }

    #[tokio::test]
    async fn create_always_enters_pending() {
        let fixture = Fixture::new().await;
        let appointment = create_appointment(&fixture.pool, &client("alice"), booking(&fixture))
            .await
            .expect("create");

        assert_eq!(appointment.status, AppointmentStatus::Pending);
        assert_eq!(appointment.client_id, "alice");
        assert_eq!(appointment.notes, "first visit");
        assert_eq!(appointment.time, NaiveTime::from_hms_opt(14, 30, 0).unwrap());
        assert!(!appointment.notified);
        assert!(appointment.admin_notes.is_empty());
    }

    #[tokio::test]
    async fn create_does_not_prevent_double_booking() {
        let fixture = Fixture::new().await;
        create_appointment(&fixture.pool, &client("alice"), booking(&fixture))
            .await
            .expect("first");
        create_appointment(&fixture.pool, &client("bob"), booking(&fixture))
            .await
            .expect("same slot");
        assert_eq!(fixture.count("appointments").await, 2);
    }

    #[tokio::test]
    async fn create_rejects_unknown_or_inactive_catalog_entries() {
        let fixture = Fixture::new().await;
        let mut input = booking(&fixture);
        input.service_id = "missing".to_string();
        let err = create_appointment(&fixture.pool, &client("alice"), input)
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::Validation(_)));

        sqlx::query("UPDATE locations SET is_active = 0")
            .execute(&fixture.pool)
            .await
            .unwrap();
        let err = create_appointment(&fixture.pool, &client("alice"), booking(&fixture))
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::Validation(_)));
        assert_eq!(fixture.count("appointments").await, 0);
    }

    #[tokio::test]
    async fn create_requires_identity_and_valid_slot() {
        let fixture = Fixture::new().await;
        let err = create_appointment(&fixture.pool, &Actor::Anonymous, booking(&fixture))
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::Unauthenticated));

        let mut input = booking(&fixture);
        input.date = "01/03/2030".to_string();
        let err = create_appointment(&fixture.pool, &client("alice"), input)
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::Validation(_)));
    }

    #[tokio::test]
    async fn cancel_succeeds_only_from_pending_or_confirmed() {
        let fixture = Fixture::new().await;
        for status in AppointmentStatus::ALL {
            let before = fixture.appointment("alice", status).await;
            let result = cancel_appointment(&fixture.pool, &client("alice"), &before.id).await;

            let mut conn = fixture.pool.acquire().await.unwrap();
            let stored = db::find_appointment(&mut conn, &before.id)
                .await
                .unwrap()
                .unwrap();
            drop(conn);

            if status.is_terminal() {
                assert!(matches!(result, Err(BookingError::Precondition(_))), "{status}");
                assert_eq!(stored, before, "{status} must be left untouched");
            } else {
                let after = result.expect("cancel");
                assert_eq!(after.status, AppointmentStatus::Canceled);
                assert_eq!(
                    AppointmentRow {
                        status: before.status,
                        updated_at: before.updated_at,
                        ..after.clone()
                    },
                    before,
                    "only the status may change"
                );
            }
        }
    }

    #[tokio::test]
    async fn another_client_cannot_cancel() {
        let fixture = Fixture::new().await;
        let appointment = fixture.appointment("alice", AppointmentStatus::Pending).await;

        let err = cancel_appointment(&fixture.pool, &client("bob"), &appointment.id)
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::Ownership(_)));

        let mut conn = fixture.pool.acquire().await.unwrap();
        let stored = db::find_appointment(&mut conn, &appointment.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, AppointmentStatus::Pending);
    }

    #[tokio::test]
    async fn staff_may_cancel_any_appointment() {
        let fixture = Fixture::new().await;
        let appointment = fixture.appointment("alice", AppointmentStatus::Confirmed).await;
        let after = cancel_appointment(&fixture.pool, &staff(), &appointment.id)
            .await
            .expect("staff cancel");
        assert_eq!(after.status, AppointmentStatus::Canceled);
    }

    #[tokio::test]
    async fn cancel_of_missing_appointment_is_not_found() {
        let fixture = Fixture::new().await;
        let err = cancel_appointment(&fixture.pool, &client("alice"), "nope")
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::NotFound("Appointment")));
    }

    #[tokio::test]
    async fn set_status_is_staff_only() {
        let fixture = Fixture::new().await;
        let appointment = fixture.appointment("alice", AppointmentStatus::Pending).await;
        let change = StatusChange {
            status: AppointmentStatus::Completed,
            admin_notes: None,
            notified: None,
        };

        let err = set_status(&fixture.pool, &client("alice"), &appointment.id, change)
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::Ownership(_)));
    }

    #[tokio::test]
    async fn staff_status_change_writes_notes_and_flag_together() {
        let fixture = Fixture::new().await;
        let appointment = fixture.appointment("alice", AppointmentStatus::Pending).await;

        let after = set_status(
            &fixture.pool,
            &staff(),
            &appointment.id,
            StatusChange {
                status: AppointmentStatus::Confirmed,
                admin_notes: Some("prefers mornings".to_string()),
                notified: Some(true),
            },
        )
        .await
        .expect("set status");

        assert_eq!(after.status, AppointmentStatus::Confirmed);
        assert_eq!(after.admin_notes, "prefers mornings");
        assert!(after.notified);

        let after = set_status(
            &fixture.pool,
            &staff(),
            &appointment.id,
            StatusChange {
                status: AppointmentStatus::Completed,
                admin_notes: None,
                notified: None,
            },
        )
        .await
        .expect("complete");
        assert_eq!(after.admin_notes, "prefers mornings");
        assert!(after.notified);
    }

    #[tokio::test]
    async fn staff_may_reopen_terminal_appointments() {
        let fixture = Fixture::new().await;
        let appointment = fixture.appointment("alice", AppointmentStatus::Canceled).await;
        let after = set_status(
            &fixture.pool,
            &staff(),
            &appointment.id,
            StatusChange {
                status: AppointmentStatus::Pending,
                admin_notes: None,
                notified: None,
            },
        )
        .await
        .expect("reopen");
        assert_eq!(after.status, AppointmentStatus::Pending);
    }

    #[test]
    fn slot_accepts_html_time_inputs() {
        let (_, time) = parse_slot("2030-01-01", "09:15").unwrap();
        assert_eq!(time, NaiveTime::from_hms_opt(9, 15, 0).unwrap());
        let (_, time) = parse_slot("2030-01-01", "09:15:30").unwrap();
        assert_eq!(time, NaiveTime::from_hms_opt(9, 15, 30).unwrap());
        assert!(parse_slot("2030-01-01", "quarter past nine").is_err());
    }
}
