use chrono::{NaiveDate, NaiveTime, Utc};
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

use crate::{
    auth::{hash_password, new_id, AuthUser},
    config::Config,
    db,
    models::{AppointmentRow, AppointmentStatus, ClientGender, ResultRow, ReviewRow, ServiceReviewRow},
    policy::Actor,
    state::AppState,
};

/// Single-connection in-memory database with migrations applied.
pub async fn pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite");
    db::run_migrations(&pool).await.expect("migrations");
    pool
}

pub fn user(id: &str, is_staff: bool) -> AuthUser {
    AuthUser {
        id: id.to_string(),
        display_name: id.to_string(),
        is_staff,
    }
}

pub fn client(id: &str) -> Actor {
    Actor::from(user(id, false))
}

pub fn staff() -> Actor {
    Actor::from(user("staff-1", true))
}

pub async fn insert_user(pool: &SqlitePool, id: &str, is_staff: bool) {
    sqlx::query(
        r#"INSERT INTO users (id, username, display_name, email, password_hash, is_staff, active, created_at)
           VALUES (?, ?, ?, '', 'not-a-hash', ?, 1, ?)"#,
    )
    .bind(id)
    .bind(id)
    .bind(id)
    .bind(is_staff)
    .bind(Utc::now())
    .execute(pool)
    .await
    .expect("insert user");
}

pub async fn insert_user_with_password(pool: &SqlitePool, id: &str, password: &str, is_staff: bool) {
    insert_user(pool, id, is_staff).await;
    sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
        .bind(hash_password(password).expect("hash"))
        .bind(id)
        .execute(pool)
        .await
        .expect("set password");
}

pub fn basic_header(username: &str, password: &str) -> (actix_web::http::header::HeaderName, String) {
    use base64::Engine;
    let token = base64::engine::general_purpose::STANDARD.encode(format!("{username}:{password}"));
    (
        actix_web::http::header::AUTHORIZATION,
        format!("Basic {token}"),
    )
}

pub struct Fixture {
    pub pool: SqlitePool,
    pub service_id: String,
    pub location_id: String,
}

impl Fixture {
    /// Users `alice` and `bob` (clients), `staff-1`, one 45 minute service and one location.
    pub async fn new() -> Self {
        let pool = pool().await;
        insert_user(&pool, "alice", false).await;
        insert_user(&pool, "bob", false).await;
        insert_user(&pool, "staff-1", true).await;

        sqlx::query("INSERT INTO service_categories (id, name) VALUES ('cat-1', 'Body contouring')")
            .execute(&pool)
            .await
            .expect("category");
        sqlx::query(
            r#"INSERT INTO services (id, category_id, name, description, price_cents, duration_minutes, is_active)
               VALUES ('svc-1', 'cat-1', 'Full body session', 'Contouring', 350000, 45, 1)"#,
        )
        .execute(&pool)
        .await
        .expect("service");
        sqlx::query(
            r#"INSERT INTO locations (id, name, address, phone, email, working_hours, is_active)
               VALUES ('loc-1', 'Central Studio', '12 Market Street', '+7 900 000-00-01',
                       'central@salonbook.local', 'Mon-Sat 09:00-21:00', 1)"#,
        )
        .execute(&pool)
        .await
        .expect("location");

        Self {
            pool,
            service_id: "svc-1".to_string(),
            location_id: "loc-1".to_string(),
        }
    }

    pub fn state(&self) -> AppState {
        AppState::new(self.pool.clone(), Config::default())
    }

    pub async fn appointment(&self, client_id: &str, status: AppointmentStatus) -> AppointmentRow {
        self.appointment_at(client_id, status, "2030-01-10", "10:00:00").await
    }

    pub async fn appointment_at(
        &self,
        client_id: &str,
        status: AppointmentStatus,
        date: &str,
        time: &str,
    ) -> AppointmentRow {
        let id = new_id();
        let now = Utc::now();
        let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").expect("date");
        let time = NaiveTime::parse_from_str(time, "%H:%M:%S").expect("time");
        sqlx::query(
            r#"INSERT INTO appointments
               (id, client_id, service_id, location_id, date, time, status, notes, admin_notes, notified, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, '', '', 0, ?, ?)"#,
        )
        .bind(&id)
        .bind(client_id)
        .bind(&self.service_id)
        .bind(&self.location_id)
        .bind(date)
        .bind(time)
        .bind(status)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .expect("insert appointment");

        let mut conn = self.pool.acquire().await.expect("conn");
        db::find_appointment(&mut conn, &id)
            .await
            .expect("query")
            .expect("appointment row")
    }

    pub async fn review(&self, appointment_id: &str, published: bool) -> ReviewRow {
        let id = new_id();
        let now = Utc::now();
        sqlx::query(
            r#"INSERT INTO reviews (id, appointment_id, rating, comment, is_published, created_at, updated_at)
               VALUES (?, ?, 4, 'Lovely', ?, ?, ?)"#,
        )
        .bind(&id)
        .bind(appointment_id)
        .bind(published)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .expect("insert review");

        let mut conn = self.pool.acquire().await.expect("conn");
        db::find_review(&mut conn, &id)
            .await
            .expect("query")
            .expect("review row")
    }

    pub async fn service_review(&self, user_id: &str, published: bool) -> ServiceReviewRow {
        let id = new_id();
        let now = Utc::now();
        sqlx::query(
            r#"INSERT INTO service_reviews
               (id, user_id, service_id, location_id, rating, comment, is_published, created_at, updated_at)
               VALUES (?, ?, ?, ?, 5, 'Great', ?, ?, ?)"#,
        )
        .bind(&id)
        .bind(user_id)
        .bind(&self.service_id)
        .bind(&self.location_id)
        .bind(published)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .expect("insert service review");

        let mut conn = self.pool.acquire().await.expect("conn");
        db::find_service_review(&mut conn, &id)
            .await
            .expect("query")
            .expect("service review row")
    }

    /// A before/after result for the fixture service, created `minutes_ago`.
    pub async fn result(&self, title: &str, published: bool, minutes_ago: i64) -> ResultRow {
        let id = new_id();
        sqlx::query(
            r#"INSERT INTO results
               (id, title, service_id, before_image, after_image, sessions_count, period,
                description, client_gender, client_age, is_published, created_at)
               VALUES (?, ?, ?, '/static/results/before.jpg', '/static/results/after.jpg',
                       6, '2 months', '', 'female', NULL, ?, ?)"#,
        )
        .bind(&id)
        .bind(title)
        .bind(&self.service_id)
        .bind(published)
        .bind(Utc::now() - chrono::Duration::minutes(minutes_ago))
        .execute(&self.pool)
        .await
        .expect("insert result");

        let mut conn = self.pool.acquire().await.expect("conn");
        db::find_result(&mut conn, &id)
            .await
            .expect("query")
            .expect("result row")
    }

    pub async fn set_password(&self, user_id: &str, password: &str) {
        sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
            .bind(hash_password(password).expect("hash"))
            .bind(user_id)
            .execute(&self.pool)
            .await
            .expect("set password");
    }

    pub async fn count(&self, table: &str) -> i64 {
        sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(&self.pool)
            .await
            .expect("count")
    }
}

pub fn appointment_row(id: &str, client_id: &str, status: AppointmentStatus) -> AppointmentRow {
    let now = Utc::now();
    AppointmentRow {
        id: id.to_string(),
        client_id: client_id.to_string(),
        client_name: client_id.to_string(),
        service_id: "svc-1".to_string(),
        service_name: "Full body session".to_string(),
        location_id: "loc-1".to_string(),
        location_name: "Central Studio".to_string(),
        date: NaiveDate::from_ymd_opt(2030, 1, 10).expect("date"),
        time: NaiveTime::from_hms_opt(10, 0, 0).expect("time"),
        status,
        notes: String::new(),
        admin_notes: String::new(),
        notified: false,
        created_at: now,
        updated_at: now,
    }
}

pub fn review_row(id: &str, appointment_id: &str, client_id: &str, published: bool) -> ReviewRow {
    let now = Utc::now();
    ReviewRow {
        id: id.to_string(),
        appointment_id: appointment_id.to_string(),
        client_id: client_id.to_string(),
        client_name: client_id.to_string(),
        service_name: "Full body session".to_string(),
        location_id: "loc-1".to_string(),
        rating: 5,
        comment: "Lovely".to_string(),
        is_published: published,
        created_at: now,
        updated_at: now,
    }
}

pub fn service_review_row(id: &str, user_id: &str, published: bool) -> ServiceReviewRow {
    let now = Utc::now();
    ServiceReviewRow {
        id: id.to_string(),
        user_id: user_id.to_string(),
        user_name: user_id.to_string(),
        service_id: "svc-1".to_string(),
        service_name: "Full body session".to_string(),
        location_id: "loc-1".to_string(),
        rating: 5,
        comment: "Great".to_string(),
        is_published: published,
        created_at: now,
        updated_at: now,
    }
}

pub fn result_row(id: &str, published: bool) -> ResultRow {
    ResultRow {
        id: id.to_string(),
        title: "Waist contour".to_string(),
        service_id: "svc-1".to_string(),
        service_name: "Full body session".to_string(),
        category_id: "cat-1".to_string(),
        category_name: "Body contouring".to_string(),
        before_image: "/static/results/before.jpg".to_string(),
        after_image: "/static/results/after.jpg".to_string(),
        sessions_count: 6,
        period: "2 months".to_string(),
        description: String::new(),
        client_gender: ClientGender::Female,
        client_age: Some(34),
        is_published: published,
        created_at: Utc::now(),
    }
}
