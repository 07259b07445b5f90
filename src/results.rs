use std::ops::RangeInclusive;

use chrono::Utc;
use serde::Deserialize;
use sqlx::SqlitePool;

use crate::{
    auth::new_id,
    db,
    error::{BookingError, BookingResult},
    models::{ClientGender, ResultRow},
    policy::{authorize, Actor, Intent, Record},
};

pub const SESSIONS_RANGE: RangeInclusive<i64> = 1..=100;
pub const CLIENT_AGE_RANGE: RangeInclusive<i64> = 18..=100;

#[derive(Debug, Clone, Deserialize)]
pub struct NewResult {
    pub title: String,
    pub service_id: String,
    pub before_image: String,
    pub after_image: String,
    pub sessions_count: i64,
    pub period: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub client_gender: ClientGender,
    #[serde(default)]
    pub client_age: Option<i64>,
    #[serde(default = "published_by_default")]
    pub is_published: bool,
}

fn published_by_default() -> bool {
    true
}

impl NewResult {
    fn validate(&self) -> BookingResult<()> {
        let mut errors = Vec::new();
        if self.title.trim().is_empty() {
            errors.push("Title is required.");
        }
        if self.before_image.trim().is_empty() || self.after_image.trim().is_empty() {
            errors.push("Both photos are required.");
        }
        if !SESSIONS_RANGE.contains(&self.sessions_count) {
            errors.push("Sessions must be between 1 and 100.");
        }
        if self.period.trim().is_empty() {
            errors.push("Period is required.");
        }
        if self
            .client_age
            .is_some_and(|age| !CLIENT_AGE_RANGE.contains(&age))
        {
            errors.push("Client age must be between 18 and 100.");
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(BookingError::Validation(errors.join(" ")))
        }
    }
}

pub async fn create_result(
    pool: &SqlitePool,
    actor: &Actor,
    input: NewResult,
) -> BookingResult<ResultRow> {
    let staff = actor.require_staff()?;
    input.validate()?;

    let mut tx = pool.begin().await?;
    if db::find_service(&mut tx, &input.service_id).await?.is_none() {
        return Err(BookingError::Validation("Please select a valid service.".to_string()));
    }

    let result_id = new_id();
    sqlx::query(
        r#"INSERT INTO results
           (id, title, service_id, before_image, after_image, sessions_count, period,
            description, client_gender, client_age, is_published, created_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&result_id)
    .bind(input.title.trim())
    .bind(&input.service_id)
    .bind(input.before_image.trim())
    .bind(input.after_image.trim())
    .bind(input.sessions_count)
    .bind(input.period.trim())
    .bind(input.description.trim())
    .bind(input.client_gender)
    .bind(input.client_age)
    .bind(input.is_published)
    .bind(Utc::now())
    .execute(&mut *tx)
    .await?;

    let result = db::find_result(&mut tx, &result_id)
        .await?
        .ok_or(BookingError::NotFound("Result"))?;
    tx.commit().await?;

    log::info!(
        "{} added result '{}' for {}",
        staff.display_name,
        result.title,
        result.service_name
    );
    Ok(result)
}

pub async fn set_result_published(
    pool: &SqlitePool,
    actor: &Actor,
    result_id: &str,
    published: bool,
) -> BookingResult<ResultRow> {
    let staff = actor.require_staff()?;
    let mut tx = pool.begin().await?;

    let result = db::find_result(&mut tx, result_id)
        .await?
        .ok_or(BookingError::NotFound("Result"))?;
    authorize(actor, Record::Result(&result), Intent::Administer)?;

    sqlx::query("UPDATE results SET is_published = ? WHERE id = ?")
        .bind(published)
        .bind(result_id)
        .execute(&mut *tx)
        .await?;

    let result = db::find_result(&mut tx, result_id)
        .await?
        .ok_or(BookingError::NotFound("Result"))?;
    tx.commit().await?;

    log::info!(
        "{} {} result {}",
        staff.display_name,
        if published { "published" } else { "unpublished" },
        result_id
    );
    Ok(result)
}
