use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::{
    db::{
        self, APPOINTMENT_SELECT, LOCATION_COLUMNS, RESULT_SELECT, REVIEW_SELECT, SERVICE_COLUMNS,
        SERVICE_REVIEW_SELECT,
    },
    error::{BookingError, BookingResult},
    models::{
        AppointmentRow, AppointmentStatus, CategoryRow, LocationRow, ResultRow, ReviewRow,
        ServiceReviewRow, ServiceRow,
    },
    policy::{can_access, Actor, Intent, Record},
};

/// Query-string filters for appointment lists. Blank values mean "any".
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppointmentFilter {
    pub status: Option<String>,
    pub location_id: Option<String>,
    pub date: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReviewFilter {
    pub is_published: Option<String>,
    pub rating: Option<String>,
    pub location_id: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RatingSummary {
    pub count: i64,
    pub average: Option<f64>,
}

impl RatingSummary {
    pub fn average_display(&self) -> String {
        match self.average {
            Some(average) => format!("{average:.1}"),
            None => "-".to_string(),
        }
    }
}

/// Results of one service category, in list order.
#[derive(Debug, Clone, Serialize)]
pub struct ResultGroup {
    pub category_id: String,
    pub category_name: String,
    pub results: Vec<ResultRow>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|value| !value.is_empty())
}

fn parse_flag(value: &str) -> BookingResult<bool> {
    match value {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(BookingError::Validation(format!("Unknown flag value '{other}'."))),
    }
}

pub async fn list_appointments(
    pool: &SqlitePool,
    actor: &Actor,
    filter: &AppointmentFilter,
) -> BookingResult<Vec<AppointmentRow>> {
    let owner = match actor {
        Actor::Anonymous => return Ok(Vec::new()),
        Actor::Client(user) => Some(user.id.as_str()),
        Actor::Staff(_) => None,
    };

    let status = non_empty(&filter.status)
        .map(str::parse::<AppointmentStatus>)
        .transpose()
        .map_err(BookingError::Validation)?;
    let date = non_empty(&filter.date)
        .map(|value| NaiveDate::parse_from_str(value, "%Y-%m-%d"))
        .transpose()
        .map_err(|_| BookingError::Validation("Please pick a valid date.".to_string()))?;
    let location_id = non_empty(&filter.location_id);
    let search = non_empty(&filter.search).map(|term| format!("%{term}%"));

    let sql = format!(
        r#"{APPOINTMENT_SELECT}
WHERE (? IS NULL OR a.client_id = ?)
  AND (? IS NULL OR a.status = ?)
  AND (? IS NULL OR a.location_id = ?)
  AND (? IS NULL OR a.date = ?)
  AND (? IS NULL OR u.username LIKE ? OR u.display_name LIKE ? OR u.email LIKE ?)
ORDER BY a.date DESC, a.time DESC, a.created_at DESC"#
    );

    let rows = sqlx::query_as::<_, AppointmentRow>(&sql)
        .bind(owner)
        .bind(owner)
        .bind(status)
        .bind(status)
        .bind(location_id)
        .bind(location_id)
        .bind(date)
        .bind(date)
        .bind(search.as_deref())
        .bind(search.as_deref())
        .bind(search.as_deref())
        .bind(search.as_deref())
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// Staff see every review; clients see their own plus published ones.
pub async fn list_reviews(
    pool: &SqlitePool,
    actor: &Actor,
    filter: &ReviewFilter,
) -> BookingResult<Vec<ReviewRow>> {
    let viewer = match actor {
        Actor::Anonymous => return Ok(Vec::new()),
        Actor::Client(user) => Some(user.id.as_str()),
        Actor::Staff(_) => None,
    };

    let published = non_empty(&filter.is_published).map(parse_flag).transpose()?;
    let rating = non_empty(&filter.rating)
        .map(|value| {
            value
                .parse::<i64>()
                .map_err(|_| BookingError::Validation("Rating must be a number.".to_string()))
        })
        .transpose()?;
    let location_id = non_empty(&filter.location_id);

    let sql = format!(
        r#"{REVIEW_SELECT}
WHERE (? IS NULL OR a.client_id = ? OR r.is_published = 1)
  AND (? IS NULL OR r.is_published = ?)
  AND (? IS NULL OR r.rating = ?)
  AND (? IS NULL OR a.location_id = ?)
ORDER BY r.created_at DESC"#
    );

    let rows = sqlx::query_as::<_, ReviewRow>(&sql)
        .bind(viewer)
        .bind(viewer)
        .bind(published)
        .bind(published)
        .bind(rating)
        .bind(rating)
        .bind(location_id)
        .bind(location_id)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// Published reviews of one service, for the public service page.
pub async fn list_service_reviews_for(
    pool: &SqlitePool,
    service_id: &str,
) -> BookingResult<Vec<ServiceReviewRow>> {
    let sql = format!(
        "{SERVICE_REVIEW_SELECT} WHERE sr.service_id = ? AND sr.is_published = 1 ORDER BY sr.created_at DESC"
    );
    let rows = sqlx::query_as::<_, ServiceReviewRow>(&sql)
        .bind(service_id)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

pub async fn list_service_reviews(
    pool: &SqlitePool,
    actor: &Actor,
) -> BookingResult<Vec<ServiceReviewRow>> {
    let sql = format!(
        r#"{SERVICE_REVIEW_SELECT}
WHERE ? = 1 OR sr.is_published = 1 OR sr.user_id = ?
ORDER BY sr.created_at DESC"#
    );
    let rows = sqlx::query_as::<_, ServiceReviewRow>(&sql)
        .bind(actor.is_staff())
        .bind(actor.user_id())
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

pub async fn get_appointment(
    pool: &SqlitePool,
    actor: &Actor,
    appointment_id: &str,
) -> BookingResult<AppointmentRow> {
    let mut conn = pool.acquire().await?;
    db::find_appointment(&mut conn, appointment_id)
        .await?
        .filter(|appointment| can_access(actor, Record::Appointment(appointment), Intent::Read))
        .ok_or(BookingError::NotFound("Appointment"))
}

pub async fn get_review(
    pool: &SqlitePool,
    actor: &Actor,
    review_id: &str,
) -> BookingResult<ReviewRow> {
    let mut conn = pool.acquire().await?;
    db::find_review(&mut conn, review_id)
        .await?
        .filter(|review| can_access(actor, Record::Review(review), Intent::Read))
        .ok_or(BookingError::NotFound("Review"))
}

pub async fn get_service_review(
    pool: &SqlitePool,
    actor: &Actor,
    review_id: &str,
) -> BookingResult<ServiceReviewRow> {
    let mut conn = pool.acquire().await?;
    db::find_service_review(&mut conn, review_id)
        .await?
        .filter(|review| can_access(actor, Record::ServiceReview(review), Intent::Read))
        .ok_or(BookingError::NotFound("Service review"))
}

pub async fn list_categories(pool: &SqlitePool) -> BookingResult<Vec<CategoryRow>> {
    let rows = sqlx::query_as::<_, CategoryRow>(
        "SELECT id, name, description, icon FROM service_categories ORDER BY name",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn list_services(
    pool: &SqlitePool,
    actor: &Actor,
    category_id: Option<&str>,
) -> BookingResult<Vec<ServiceRow>> {
    let sql = format!(
        r#"SELECT {SERVICE_COLUMNS} FROM services
WHERE (? = 1 OR is_active = 1)
  AND (? IS NULL OR category_id = ?)
ORDER BY name"#
    );
    let rows = sqlx::query_as::<_, ServiceRow>(&sql)
        .bind(actor.is_staff())
        .bind(category_id)
        .bind(category_id)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

pub async fn get_service(
    pool: &SqlitePool,
    actor: &Actor,
    service_id: &str,
) -> BookingResult<ServiceRow> {
    let mut conn = pool.acquire().await?;
    db::find_service(&mut conn, service_id)
        .await?
        .filter(|service| can_access(actor, Record::Service(service), Intent::Read))
        .ok_or(BookingError::NotFound("Service"))
}

pub async fn list_locations(pool: &SqlitePool, actor: &Actor) -> BookingResult<Vec<LocationRow>> {
    let sql = format!(
        "SELECT {LOCATION_COLUMNS} FROM locations WHERE ? = 1 OR is_active = 1 ORDER BY name"
    );
    let rows = sqlx::query_as::<_, LocationRow>(&sql)
        .bind(actor.is_staff())
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

pub async fn get_location(
    pool: &SqlitePool,
    actor: &Actor,
    location_id: &str,
) -> BookingResult<LocationRow> {
    let mut conn = pool.acquire().await?;
    db::find_location(&mut conn, location_id)
        .await?
        .filter(|location| can_access(actor, Record::Location(location), Intent::Read))
        .ok_or(BookingError::NotFound("Location"))
}

/// Newest first. Drafts are listed for staff only.
pub async fn list_results(
    pool: &SqlitePool,
    actor: &Actor,
    service_id: Option<&str>,
) -> BookingResult<Vec<ResultRow>> {
    let service_id = service_id.map(str::trim).filter(|value| !value.is_empty());
    let sql = format!(
        r#"{RESULT_SELECT}
WHERE (? = 1 OR r.is_published = 1)
  AND (? IS NULL OR r.service_id = ?)
ORDER BY r.created_at DESC"#
    );
    let rows = sqlx::query_as::<_, ResultRow>(&sql)
        .bind(actor.is_staff())
        .bind(service_id)
        .bind(service_id)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

pub async fn get_result(
    pool: &SqlitePool,
    actor: &Actor,
    result_id: &str,
) -> BookingResult<ResultRow> {
    let mut conn = pool.acquire().await?;
    db::find_result(&mut conn, result_id)
        .await?
        .filter(|result| can_access(actor, Record::Result(result), Intent::Read))
        .ok_or(BookingError::NotFound("Result"))
}

/// Buckets results by service category. Categories keep the order of their
/// first result and are omitted when empty.
pub fn group_results(results: Vec<ResultRow>) -> Vec<ResultGroup> {
    let mut groups: Vec<ResultGroup> = Vec::new();
    for result in results {
        match groups
            .iter_mut()
            .find(|group| group.category_id == result.category_id)
        {
            Some(group) => group.results.push(result),
            None => groups.push(ResultGroup {
                category_id: result.category_id.clone(),
                category_name: result.category_name.clone(),
                results: vec![result],
            }),
        }
    }
    groups
}

/// Count and mean rating over the published reviews of a service.
pub async fn service_rating(pool: &SqlitePool, service_id: &str) -> BookingResult<RatingSummary> {
    let (count, average) = sqlx::query_as::<_, (i64, Option<f64>)>(
        "SELECT COUNT(*), AVG(rating) FROM service_reviews WHERE service_id = ? AND is_published = 1",
    )
    .bind(service_id)
    .fetch_one(pool)
    .await?;
    Ok(RatingSummary { count, average })
}
