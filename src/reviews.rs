use std::ops::RangeInclusive;

use chrono::Utc;
use serde::Deserialize;
use sqlx::SqlitePool;

use crate::{
    auth::new_id,
    db,
    error::{duplicate_on_conflict, BookingError, BookingResult},
    models::{AppointmentStatus, ReviewRow, ServiceReviewRow},
    policy::{authorize, Actor, Intent, Owned, Record},
};

pub const RATING_RANGE: RangeInclusive<i64> = 1..=5;

const DUPLICATE_REVIEW: &str = "You have already reviewed this procedure.";
const DUPLICATE_SERVICE_REVIEW: &str = "You have already reviewed this service.";

#[derive(Debug, Clone, Deserialize)]
pub struct NewReview {
    pub appointment_id: String,
    pub rating: i64,
    #[serde(default)]
    pub comment: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewServiceReview {
    pub service_id: String,
    pub location_id: String,
    pub rating: i64,
    #[serde(default)]
    pub comment: String,
}

fn validate_feedback(rating: i64, comment: &str) -> BookingResult<()> {
    if !RATING_RANGE.contains(&rating) {
        return Err(BookingError::Validation(
            "Rating must be between 1 and 5.".to_string(),
        ));
    }
    if comment.trim().is_empty() {
        return Err(BookingError::Validation("Please write a comment.".to_string()));
    }
    Ok(())
}

pub async fn create_review(
    pool: &SqlitePool,
    actor: &Actor,
    input: NewReview,
) -> BookingResult<ReviewRow> {
    let user = actor.require_user()?;
    let mut tx = pool.begin().await?;

    let appointment = db::find_appointment(&mut tx, &input.appointment_id)
        .await?
        .ok_or(BookingError::NotFound("Appointment"))?;

    if db::find_review_for_appointment(&mut tx, &appointment.id)
        .await?
        .is_some()
    {
        return Err(BookingError::Duplicate(DUPLICATE_REVIEW.to_string()));
    }
    if !appointment.is_owned_by(actor) {
        return Err(BookingError::Ownership(
            "You can only review your own appointments.".to_string(),
        ));
    }
    if appointment.status != AppointmentStatus::Completed {
        return Err(BookingError::Precondition(
            "Only completed procedures can be reviewed.".to_string(),
        ));
    }
    validate_feedback(input.rating, &input.comment)?;

    let review_id = new_id();
    let now = Utc::now();
    sqlx::query(
        r#"INSERT INTO reviews (id, appointment_id, rating, comment, is_published, created_at, updated_at)
           VALUES (?, ?, ?, ?, 0, ?, ?)"#,
    )
    .bind(&review_id)
    .bind(&appointment.id)
    .bind(input.rating)
    .bind(input.comment.trim())
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await
    .map_err(|err| duplicate_on_conflict(err, DUPLICATE_REVIEW))?;

    let review = db::find_review(&mut tx, &review_id)
        .await?
        .ok_or(BookingError::NotFound("Review"))?;
    tx.commit().await?;

    log::info!(
        "{} reviewed appointment {} ({} stars), awaiting moderation",
        user.display_name,
        appointment.id,
        review.rating
    );
    Ok(review)
}

pub async fn create_service_review(
    pool: &SqlitePool,
    actor: &Actor,
    input: NewServiceReview,
) -> BookingResult<ServiceReviewRow> {
    let user = actor.require_user()?;
    validate_feedback(input.rating, &input.comment)?;

    let mut tx = pool.begin().await?;

    if db::find_service(&mut tx, &input.service_id).await?.is_none() {
        return Err(BookingError::Validation("Please select a valid service.".to_string()));
    }
    if db::find_location(&mut tx, &input.location_id).await?.is_none() {
        return Err(BookingError::Validation("Please select a valid location.".to_string()));
    }
    if db::find_service_review_by_user(&mut tx, &user.id, &input.service_id)
        .await?
        .is_some()
    {
        return Err(BookingError::Duplicate(DUPLICATE_SERVICE_REVIEW.to_string()));
    }

    let review_id = new_id();
    let now = Utc::now();
    sqlx::query(
        r#"INSERT INTO service_reviews
           (id, user_id, service_id, location_id, rating, comment, is_published, created_at, updated_at)
           VALUES (?, ?, ?, ?, ?, ?, 0, ?, ?)"#,
    )
    .bind(&review_id)
    .bind(&user.id)
    .bind(&input.service_id)
    .bind(&input.location_id)
    .bind(input.rating)
    .bind(input.comment.trim())
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await
    .map_err(|err| duplicate_on_conflict(err, DUPLICATE_SERVICE_REVIEW))?;

    let review = db::find_service_review(&mut tx, &review_id)
        .await?
        .ok_or(BookingError::NotFound("Service review"))?;
    tx.commit().await?;

    log::info!(
        "{} reviewed service {}, awaiting moderation",
        user.display_name,
        input.service_id
    );
    Ok(review)
}

pub async fn set_review_published(
    pool: &SqlitePool,
    actor: &Actor,
    review_id: &str,
    published: bool,
) -> BookingResult<ReviewRow> {
    let staff = actor.require_staff()?;
    let mut tx = pool.begin().await?;

    let review = db::find_review(&mut tx, review_id)
        .await?
        .ok_or(BookingError::NotFound("Review"))?;
    authorize(actor, Record::Review(&review), Intent::Administer)?;

    sqlx::query("UPDATE reviews SET is_published = ?, updated_at = ? WHERE id = ?")
        .bind(published)
        .bind(Utc::now())
        .bind(review_id)
        .execute(&mut *tx)
        .await?;

    let review = db::find_review(&mut tx, review_id)
        .await?
        .ok_or(BookingError::NotFound("Review"))?;
    tx.commit().await?;

    log::info!(
        "{} {} review {}",
        staff.display_name,
        if published { "published" } else { "unpublished" },
        review_id
    );
    Ok(review)
}

pub async fn set_service_review_published(
    pool: &SqlitePool,
    actor: &Actor,
    review_id: &str,
    published: bool,
) -> BookingResult<ServiceReviewRow> {
    let staff = actor.require_staff()?;
    let mut tx = pool.begin().await?;

    let review = db::find_service_review(&mut tx, review_id)
        .await?
        .ok_or(BookingError::NotFound("Service review"))?;
    authorize(actor, Record::ServiceReview(&review), Intent::Administer)?;

    sqlx::query("UPDATE service_reviews SET is_published = ?, updated_at = ? WHERE id = ?")
        .bind(published)
        .bind(Utc::now())
        .bind(review_id)
        .execute(&mut *tx)
        .await?;

    let review = db::find_service_review(&mut tx, review_id)
        .await?
        .ok_or(BookingError::NotFound("Service review"))?;
    tx.commit().await?;

    log::info!(
        "{} {} service review {}",
        staff.display_name,
        if published { "published" } else { "unpublished" },
        review_id
    );
    Ok(review)
}
