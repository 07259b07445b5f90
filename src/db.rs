use std::{env, fs, path::Path};

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    auth::{hash_password, new_id},
    error::{BookingError, BookingResult},
    models::{
        AppointmentRow, AppointmentSnapshot, CalendarSettingsRow, ClientRow, LocationRow,
        ResultRow, ReviewRow, ServiceReviewRow, ServiceRow,
    },
};

pub const APPOINTMENT_SELECT: &str = r#"SELECT a.id, a.client_id, u.display_name AS client_name,
       a.service_id, s.name AS service_name, a.location_id, l.name AS location_name,
       a.date, a.time, a.status, a.notes, a.admin_notes, a.notified,
       a.created_at, a.updated_at
FROM appointments a
JOIN users u ON u.id = a.client_id
JOIN services s ON s.id = a.service_id
JOIN locations l ON l.id = a.location_id"#;

pub const REVIEW_SELECT: &str = r#"SELECT r.id, r.appointment_id, a.client_id,
       u.display_name AS client_name, s.name AS service_name, a.location_id,
       r.rating, r.comment, r.is_published, r.created_at, r.updated_at
FROM reviews r
JOIN appointments a ON a.id = r.appointment_id
JOIN users u ON u.id = a.client_id
JOIN services s ON s.id = a.service_id"#;

pub const SERVICE_REVIEW_SELECT: &str = r#"SELECT sr.id, sr.user_id, u.display_name AS user_name,
       sr.service_id, s.name AS service_name, sr.location_id, sr.rating, sr.comment,
       sr.is_published, sr.created_at, sr.updated_at
FROM service_reviews sr
JOIN users u ON u.id = sr.user_id
JOIN services s ON s.id = sr.service_id"#;

pub const RESULT_SELECT: &str = r#"SELECT r.id, r.title, r.service_id, s.name AS service_name,
       s.category_id, c.name AS category_name, r.before_image, r.after_image,
       r.sessions_count, r.period, r.description, r.client_gender, r.client_age,
       r.is_published, r.created_at
FROM results r
JOIN services s ON s.id = r.service_id
JOIN service_categories c ON c.id = s.category_id"#;

pub const SERVICE_COLUMNS: &str =
    "id, category_id, name, description, price_cents, duration_minutes, is_active";

pub const LOCATION_COLUMNS: &str =
    "id, name, address, phone, email, working_hours, description, is_active, latitude, longitude";

pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

pub fn ensure_sqlite_dir(db_url: &str) -> std::io::Result<()> {
    let Some(path) = db_url
        .strip_prefix("sqlite://")
        .or_else(|| db_url.strip_prefix("sqlite:"))
    else {
        return Ok(());
    };

    let path = path.split('?').next().unwrap_or(path);
    if path == ":memory:" || path.is_empty() {
        return Ok(());
    }

    let path = path.strip_prefix("file:").unwrap_or(path);
    if let Some(parent) = Path::new(path).parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

pub async fn find_appointment(
    conn: &mut SqliteConnection,
    appointment_id: &str,
) -> Result<Option<AppointmentRow>, sqlx::Error> {
    let sql = format!("{APPOINTMENT_SELECT} WHERE a.id = ? LIMIT 1");
    sqlx::query_as::<_, AppointmentRow>(&sql)
        .bind(appointment_id)
        .fetch_optional(&mut *conn)
        .await
}

pub async fn find_review(
    conn: &mut SqliteConnection,
    review_id: &str,
) -> Result<Option<ReviewRow>, sqlx::Error> {
    let sql = format!("{REVIEW_SELECT} WHERE r.id = ? LIMIT 1");
    sqlx::query_as::<_, ReviewRow>(&sql)
        .bind(review_id)
        .fetch_optional(&mut *conn)
        .await
}

/// The review attached to an appointment, if one has been left.
pub async fn find_review_for_appointment(
    conn: &mut SqliteConnection,
    appointment_id: &str,
) -> Result<Option<ReviewRow>, sqlx::Error> {
    let sql = format!("{REVIEW_SELECT} WHERE r.appointment_id = ? LIMIT 1");
    sqlx::query_as::<_, ReviewRow>(&sql)
        .bind(appointment_id)
        .fetch_optional(&mut *conn)
        .await
}

pub async fn find_service_review(
    conn: &mut SqliteConnection,
    review_id: &str,
) -> Result<Option<ServiceReviewRow>, sqlx::Error> {
    let sql = format!("{SERVICE_REVIEW_SELECT} WHERE sr.id = ? LIMIT 1");
    sqlx::query_as::<_, ServiceReviewRow>(&sql)
        .bind(review_id)
        .fetch_optional(&mut *conn)
        .await
}

pub async fn find_service_review_by_user(
    conn: &mut SqliteConnection,
    user_id: &str,
    service_id: &str,
) -> Result<Option<ServiceReviewRow>, sqlx::Error> {
    let sql = format!("{SERVICE_REVIEW_SELECT} WHERE sr.user_id = ? AND sr.service_id = ? LIMIT 1");
    sqlx::query_as::<_, ServiceReviewRow>(&sql)
        .bind(user_id)
        .bind(service_id)
        .fetch_optional(&mut *conn)
        .await
}

pub async fn find_result(
    conn: &mut SqliteConnection,
    result_id: &str,
) -> Result<Option<ResultRow>, sqlx::Error> {
    let sql = format!("{RESULT_SELECT} WHERE r.id = ? LIMIT 1");
    sqlx::query_as::<_, ResultRow>(&sql)
        .bind(result_id)
        .fetch_optional(&mut *conn)
        .await
}

pub async fn find_service(
    conn: &mut SqliteConnection,
    service_id: &str,
) -> Result<Option<ServiceRow>, sqlx::Error> {
    let sql = format!("SELECT {SERVICE_COLUMNS} FROM services WHERE id = ? LIMIT 1");
    sqlx::query_as::<_, ServiceRow>(&sql)
        .bind(service_id)
        .fetch_optional(&mut *conn)
        .await
}

pub async fn find_location(
    conn: &mut SqliteConnection,
    location_id: &str,
) -> Result<Option<LocationRow>, sqlx::Error> {
    let sql = format!("SELECT {LOCATION_COLUMNS} FROM locations WHERE id = ? LIMIT 1");
    sqlx::query_as::<_, LocationRow>(&sql)
        .bind(location_id)
        .fetch_optional(&mut *conn)
        .await
}

/// Appointment plus the service and location rows it points at.
pub async fn load_snapshot(
    conn: &mut SqliteConnection,
    appointment: AppointmentRow,
) -> BookingResult<AppointmentSnapshot> {
    let service = find_service(conn, &appointment.service_id)
        .await?
        .ok_or(BookingError::NotFound("Service"))?;
    let location = find_location(conn, &appointment.location_id)
        .await?
        .ok_or(BookingError::NotFound("Location"))?;
    Ok(AppointmentSnapshot {
        appointment,
        service,
        location,
    })
}

/// Client profile for a user, created on first access.
pub async fn ensure_client_profile(
    conn: &mut SqliteConnection,
    user_id: &str,
) -> Result<ClientRow, sqlx::Error> {
    let now = Utc::now();
    sqlx::query(
        r#"INSERT INTO clients (id, user_id, phone, created_at, updated_at)
           VALUES (?, ?, '', ?, ?)
           ON CONFLICT(user_id) DO NOTHING"#,
    )
    .bind(new_id())
    .bind(user_id)
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    sqlx::query_as::<_, ClientRow>(
        "SELECT id, user_id, phone, created_at, updated_at FROM clients WHERE user_id = ?",
    )
    .bind(user_id)
    .fetch_one(&mut *conn)
    .await
}

pub async fn calendar_settings(
    pool: &SqlitePool,
    user_id: &str,
) -> Result<CalendarSettingsRow, sqlx::Error> {
    sqlx::query("INSERT INTO calendar_settings (user_id) VALUES (?) ON CONFLICT(user_id) DO NOTHING")
        .bind(user_id)
        .execute(pool)
        .await?;

    sqlx::query_as::<_, CalendarSettingsRow>(
        r#"SELECT user_id, calendar_kind, add_appointments, update_appointments,
                  remove_canceled, reminder_minutes
           FROM calendar_settings
           WHERE user_id = ?"#,
    )
    .bind(user_id)
    .fetch_one(pool)
    .await
}

pub async fn save_calendar_settings(
    pool: &SqlitePool,
    settings: &CalendarSettingsRow,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"INSERT INTO calendar_settings
           (user_id, calendar_kind, add_appointments, update_appointments, remove_canceled, reminder_minutes)
           VALUES (?, ?, ?, ?, ?, ?)
           ON CONFLICT(user_id) DO UPDATE SET
             calendar_kind = excluded.calendar_kind,
             add_appointments = excluded.add_appointments,
             update_appointments = excluded.update_appointments,
             remove_canceled = excluded.remove_canceled,
             reminder_minutes = excluded.reminder_minutes"#,
    )
    .bind(&settings.user_id)
    .bind(settings.calendar_kind)
    .bind(settings.add_appointments)
    .bind(settings.update_appointments)
    .bind(settings.remove_canceled)
    .bind(settings.reminder_minutes)
    .execute(pool)
    .await?;
    Ok(())
}

pub struct NewUser<'a> {
    pub username: &'a str,
    pub display_name: &'a str,
    pub email: &'a str,
    pub password: &'a str,
    pub is_staff: bool,
}

pub async fn create_user(
    conn: &mut SqliteConnection,
    user: NewUser<'_>,
) -> BookingResult<String> {
    let password_hash =
        hash_password(user.password).map_err(|err| BookingError::PasswordHash(err.to_string()))?;
    let id = new_id();

    sqlx::query(
        r#"INSERT INTO users (id, username, display_name, email, password_hash, is_staff, active, created_at)
           VALUES (?, ?, ?, ?, ?, ?, 1, ?)"#,
    )
    .bind(&id)
    .bind(user.username)
    .bind(user.display_name)
    .bind(user.email)
    .bind(password_hash)
    .bind(user.is_staff)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await
    .map_err(|err| crate::error::duplicate_on_conflict(err, "That username is already taken."))?;

    Ok(id)
}

pub async fn seed_defaults(pool: &SqlitePool, seed_catalog: bool) -> BookingResult<()> {
    seed_staff(pool).await?;
    if seed_catalog {
        seed_catalog_rows(pool).await?;
    }
    Ok(())
}

async fn seed_staff(pool: &SqlitePool) -> BookingResult<()> {
    let existing = sqlx::query_as::<_, (String,)>("SELECT id FROM users WHERE is_staff = 1 LIMIT 1")
        .fetch_optional(pool)
        .await?;

    if existing.is_some() {
        return Ok(());
    }

    let username = env::var("ADMIN_USER").unwrap_or_else(|_| "admin".to_string());
    let password = env::var("ADMIN_PASSWORD").unwrap_or_else(|_| "admin".to_string());
    let display_name =
        env::var("ADMIN_DISPLAY_NAME").unwrap_or_else(|_| "Front Desk".to_string());

    if password == "admin" {
        log::warn!("ADMIN_PASSWORD not set. Using default password 'admin'. Set ADMIN_PASSWORD in production.");
    }

    let user = NewUser {
        username: &username,
        display_name: &display_name,
        email: "",
        password: &password,
        is_staff: true,
    };
    let mut conn = pool.acquire().await?;
    create_user(&mut conn, user).await?;
    Ok(())
}

async fn seed_catalog_rows(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let existing = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM services")
        .fetch_one(pool)
        .await?;
    if existing > 0 {
        return Ok(());
    }

    let mut tx = pool.begin().await?;

    let locations = [
        (
            "Central Studio",
            "12 Market Street",
            "+7 900 000-00-01",
            "central@salonbook.local",
            "Mon-Sat 09:00-21:00",
        ),
        (
            "Riverside Studio",
            "4 Embankment Road",
            "+7 900 000-00-02",
            "riverside@salonbook.local",
            "Daily 10:00-20:00",
        ),
    ];
    for (name, address, phone, email, hours) in locations {
        sqlx::query(
            r#"INSERT INTO locations (id, name, address, phone, email, working_hours, is_active)
               VALUES (?, ?, ?, ?, ?, ?, 1)"#,
        )
        .bind(new_id())
        .bind(name)
        .bind(address)
        .bind(phone)
        .bind(email)
        .bind(hours)
        .execute(&mut *tx)
        .await?;
    }

    let categories = [
        (
            "Body contouring",
            "Vacuum-roller sessions for body shaping.",
            "bi-person-arms-up",
            vec![
                ("Full body session", "Complete contouring programme.", 350_000, 45),
                ("Express session", "Focused treatment of one zone.", 180_000, 25),
            ],
        ),
        (
            "Face care",
            "Lifting and toning for the face.",
            "bi-emoji-smile",
            vec![("Face lifting", "Gentle vacuum lifting for the face.", 220_000, 30)],
        ),
    ];
    for (name, description, icon, services) in categories {
        let category_id = new_id();
        sqlx::query(
            "INSERT INTO service_categories (id, name, description, icon) VALUES (?, ?, ?, ?)",
        )
        .bind(&category_id)
        .bind(name)
        .bind(description)
        .bind(icon)
        .execute(&mut *tx)
        .await?;

        for (service_name, service_description, price_cents, minutes) in services {
            sqlx::query(
                r#"INSERT INTO services (id, category_id, name, description, price_cents, duration_minutes, is_active)
                   VALUES (?, ?, ?, ?, ?, ?, 1)"#,
            )
            .bind(new_id())
            .bind(&category_id)
            .bind(service_name)
            .bind(service_description)
            .bind(price_cents as i64)
            .bind(minutes as i64)
            .execute(&mut *tx)
            .await?;
        }
    }

    tx.commit().await?;
    log::info!("Seeded demo catalog");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AppointmentStatus;
    use crate::test_support;

    #[test]
    fn sqlite_dir_is_skipped_for_memory_and_foreign_urls() {
        assert!(ensure_sqlite_dir("sqlite::memory:").is_ok());
        assert!(ensure_sqlite_dir("postgres://localhost/db").is_ok());
    }

    #[tokio::test]
    async fn review_lookup_is_an_explicit_option() {
        let fixture = test_support::Fixture::new().await;
        let appointment = fixture
            .appointment("alice", AppointmentStatus::Completed)
            .await;
        {
            let mut conn = fixture.pool.acquire().await.expect("conn");
            let missing = find_review_for_appointment(&mut conn, &appointment.id)
                .await
                .expect("query");
            assert!(missing.is_none());
        }

        fixture.review(&appointment.id, true).await;
        let mut conn = fixture.pool.acquire().await.expect("conn");
        let found = find_review_for_appointment(&mut conn, &appointment.id)
            .await
            .expect("query");
        assert_eq!(found.map(|review| review.client_id), Some("alice".to_string()));
    }

    #[tokio::test]
    async fn client_profile_is_created_once() {
        let fixture = test_support::Fixture::new().await;
        let mut conn = fixture.pool.acquire().await.expect("conn");
        let first = ensure_client_profile(&mut conn, "alice").await.expect("create");
        let second = ensure_client_profile(&mut conn, "alice").await.expect("fetch");
        assert_eq!(first.id, second.id);
        assert_eq!(second.phone, "");
    }

    #[tokio::test]
    async fn calendar_settings_default_to_no_calendar() {
        let fixture = test_support::Fixture::new().await;
        let settings = calendar_settings(&fixture.pool, "alice").await.expect("settings");
        assert_eq!(settings.calendar_kind, crate::models::CalendarKind::None);
        assert!(settings.add_appointments);
        assert_eq!(settings.reminder_minutes, 60);
    }

    #[tokio::test]
    async fn staff_seed_creates_one_account() {
        let pool = test_support::pool().await;
        seed_defaults(&pool, false).await.expect("seed");
        seed_defaults(&pool, false).await.expect("seed again");
        let staff = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE is_staff = 1")
            .fetch_one(&pool)
            .await
            .expect("count");
        assert_eq!(staff, 1);
    }

    #[tokio::test]
    async fn catalog_seed_runs_once() {
        let pool = test_support::pool().await;
        seed_catalog_rows(&pool).await.expect("seed");
        seed_catalog_rows(&pool).await.expect("seed again");
        let services = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM services")
            .fetch_one(&pool)
            .await
            .expect("count");
        assert_eq!(services, 3);
    }
}
