use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::{
    auth::AuthUser,
    db::{self, NewUser},
    error::{BookingError, BookingResult},
    models::{CalendarKind, CalendarSettingsRow},
    policy::Actor,
};

pub const MIN_PASSWORD_LEN: usize = 6;
const MAX_REMINDER_MINUTES: i64 = 7 * 24 * 60;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Registration {
    pub username: String,
    pub display_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Profile {
    pub user_id: String,
    pub username: String,
    pub display_name: String,
    pub email: String,
    pub phone: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub display_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CalendarPreferences {
    pub calendar_kind: CalendarKind,
    pub add_appointments: bool,
    pub update_appointments: bool,
    pub remove_canceled: bool,
    pub reminder_minutes: i64,
}

/// Creates a client account together with its profile row.
pub async fn register(pool: &SqlitePool, input: Registration) -> BookingResult<AuthUser> {
    let mut errors = Vec::new();
    let username = input.username.trim();
    let display_name = input.display_name.trim();
    if username.is_empty() || username.contains(char::is_whitespace) {
        errors.push("Username is required and cannot contain spaces.");
    }
    if display_name.is_empty() {
        errors.push("Display name is required.");
    }
    if input.password.trim().len() < MIN_PASSWORD_LEN {
        errors.push("Password must be at least 6 characters.");
    }
    if !errors.is_empty() {
        return Err(BookingError::Validation(errors.join(" ")));
    }

    let mut tx = pool.begin().await?;
    let user_id = db::create_user(
        &mut tx,
        NewUser {
            username,
            display_name,
            email: input.email.trim(),
            password: &input.password,
            is_staff: false,
        },
    )
    .await?;

    db::ensure_client_profile(&mut tx, &user_id).await?;
    sqlx::query("UPDATE clients SET phone = ?, updated_at = ? WHERE user_id = ?")
        .bind(input.phone.trim())
        .bind(Utc::now())
        .bind(&user_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    log::info!("Registered client {username}");
    Ok(AuthUser {
        id: user_id,
        display_name: display_name.to_string(),
        is_staff: false,
    })
}

pub async fn load_profile(pool: &SqlitePool, actor: &Actor) -> BookingResult<Profile> {
    let user = actor.require_user()?;
    {
        let mut conn = pool.acquire().await?;
        db::ensure_client_profile(&mut conn, &user.id).await?;
    }

    let profile = sqlx::query_as::<_, Profile>(
        r#"SELECT u.id AS user_id, u.username, u.display_name, u.email, c.phone
           FROM users u
           JOIN clients c ON c.user_id = u.id
           WHERE u.id = ?"#,
    )
    .bind(&user.id)
    .fetch_optional(pool)
    .await?
    .ok_or(BookingError::NotFound("Profile"))?;
    Ok(profile)
}

pub async fn update_profile(
    pool: &SqlitePool,
    actor: &Actor,
    input: ProfileUpdate,
) -> BookingResult<Profile> {
    let user = actor.require_user()?;
    let display_name = input.display_name.trim();
    if display_name.is_empty() {
        return Err(BookingError::Validation("Display name is required.".to_string()));
    }
    let mut tx = pool.begin().await?;
    db::ensure_client_profile(&mut tx, &user.id).await?;
    sqlx::query("UPDATE users SET display_name = ?, email = ? WHERE id = ?")
        .bind(display_name)
        .bind(input.email.trim())
        .bind(&user.id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("UPDATE clients SET phone = ?, updated_at = ? WHERE user_id = ?")
        .bind(input.phone.trim())
        .bind(Utc::now())
        .bind(&user.id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    load_profile(pool, actor).await
}

pub async fn calendar_preferences(
    pool: &SqlitePool,
    actor: &Actor,
) -> BookingResult<CalendarSettingsRow> {
    let user = actor.require_user()?;
    Ok(db::calendar_settings(pool, &user.id).await?)
}

pub async fn update_calendar_preferences(
    pool: &SqlitePool,
    actor: &Actor,
    input: CalendarPreferences,
) -> BookingResult<CalendarSettingsRow> {
    let user = actor.require_user()?;
    if !(0..=MAX_REMINDER_MINUTES).contains(&input.reminder_minutes) {
        return Err(BookingError::Validation(
            "Reminder must be between 0 minutes and one week.".to_string(),
        ));
    }

    let settings = CalendarSettingsRow {
        user_id: user.id.clone(),
        calendar_kind: input.calendar_kind,
        add_appointments: input.add_appointments,
        update_appointments: input.update_appointments,
        remove_canceled: input.remove_canceled,
        reminder_minutes: input.reminder_minutes,
    };
    db::save_calendar_settings(pool, &settings).await?;
    log::info!(
        "{} set calendar sync to {}",
        user.display_name,
        settings.calendar_kind.as_str()
    );
    Ok(settings)
}
