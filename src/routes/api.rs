use actix_web::{
    error::{JsonPayloadError, PathError, QueryPayloadError},
    http::header,
    web, HttpRequest, HttpResponse,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::{
    accounts::{self, CalendarPreferences, ProfileUpdate, Registration},
    calendar::{self, CalendarChange, CalendarEvent},
    db,
    error::BookingError,
    lifecycle::{self, NewAppointment, StatusChange},
    models::AppointmentRow,
    policy::Actor,
    results::{self, NewResult},
    reviews::{self, NewReview, NewServiceReview},
    routes::AppointmentView,
    state::AppState,
    visibility::{self, AppointmentFilter, ReviewFilter},
};

type ApiResult = Result<HttpResponse, BookingError>;

#[derive(Deserialize)]
struct ServiceQuery {
    category_id: Option<String>,
}

#[derive(Deserialize)]
struct ResultQuery {
    service_id: Option<String>,
}

#[derive(Deserialize)]
struct PublishPayload {
    is_published: bool,
}

/// Malformed bodies, query strings and paths answer with the JSON error body.
fn payload_error<E: std::fmt::Display>(err: E, _req: &HttpRequest) -> actix_web::Error {
    BookingError::Validation(err.to_string()).into()
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .app_data(web::JsonConfig::default().error_handler(payload_error::<JsonPayloadError>))
            .app_data(web::QueryConfig::default().error_handler(payload_error::<QueryPayloadError>))
            .app_data(web::PathConfig::default().error_handler(payload_error::<PathError>))
            .service(web::resource("/categories").route(web::get().to(list_categories)))
            .service(web::resource("/services").route(web::get().to(list_services)))
            .service(web::resource("/services/{id}").route(web::get().to(service_detail)))
            .service(
                web::resource("/services/{id}/reviews").route(web::get().to(service_reviews_for)),
            )
            .service(web::resource("/locations").route(web::get().to(list_locations)))
            .service(web::resource("/locations/{id}").route(web::get().to(location_detail)))
            .service(
                web::resource("/appointments")
                    .route(web::get().to(list_appointments))
                    .route(web::post().to(create_appointment)),
            )
            .service(web::resource("/appointments/{id}").route(web::get().to(appointment_detail)))
            .service(
                web::resource("/appointments/{id}/cancel")
                    .route(web::post().to(cancel_appointment)),
            )
            .service(web::resource("/appointments/{id}/status").route(web::post().to(set_status)))
            .service(
                web::resource("/appointments/{id}/calendar.ics")
                    .route(web::get().to(appointment_ics)),
            )
            .service(
                web::resource("/reviews")
                    .route(web::get().to(list_reviews))
                    .route(web::post().to(create_review)),
            )
            .service(web::resource("/reviews/{id}").route(web::get().to(review_detail)))
            .service(web::resource("/reviews/{id}/publish").route(web::post().to(publish_review)))
            .service(
                web::resource("/service-reviews")
                    .route(web::get().to(list_service_reviews))
                    .route(web::post().to(create_service_review)),
            )
            .service(
                web::resource("/service-reviews/{id}").route(web::get().to(service_review_detail)),
            )
            .service(
                web::resource("/service-reviews/{id}/publish")
                    .route(web::post().to(publish_service_review)),
            )
            .service(
                web::resource("/results")
                    .route(web::get().to(list_results))
                    .route(web::post().to(create_result)),
            )
            .service(web::resource("/results/{id}").route(web::get().to(result_detail)))
            .service(web::resource("/results/{id}/publish").route(web::post().to(publish_result)))
            .service(
                web::resource("/profile")
                    .route(web::get().to(profile))
                    .route(web::post().to(update_profile)),
            )
            .service(
                web::resource("/calendar/settings")
                    .route(web::get().to(calendar_settings))
                    .route(web::post().to(update_calendar_settings)),
            )
            .service(web::resource("/register").route(web::post().to(register))),
    );
}

async fn list_categories(state: web::Data<AppState>) -> ApiResult {
    let categories = visibility::list_categories(&state.db).await?;
    Ok(HttpResponse::Ok().json(categories))
}

async fn list_services(
    state: web::Data<AppState>,
    actor: Actor,
    query: web::Query<ServiceQuery>,
) -> ApiResult {
    let category_id = query.category_id.as_deref().filter(|value| !value.is_empty());
    let services = visibility::list_services(&state.db, &actor, category_id).await?;
    Ok(HttpResponse::Ok().json(services))
}

async fn service_detail(
    state: web::Data<AppState>,
    actor: Actor,
    path: web::Path<String>,
) -> ApiResult {
    let service = visibility::get_service(&state.db, &actor, &path).await?;
    let rating = visibility::service_rating(&state.db, &service.id).await?;
    Ok(HttpResponse::Ok().json(json!({ "service": service, "rating": rating })))
}

async fn service_reviews_for(
    state: web::Data<AppState>,
    actor: Actor,
    path: web::Path<String>,
) -> ApiResult {
    let service = visibility::get_service(&state.db, &actor, &path).await?;
    let reviews = visibility::list_service_reviews_for(&state.db, &service.id).await?;
    Ok(HttpResponse::Ok().json(reviews))
}

async fn list_locations(state: web::Data<AppState>, actor: Actor) -> ApiResult {
    let locations = visibility::list_locations(&state.db, &actor).await?;
    Ok(HttpResponse::Ok().json(locations))
}

async fn location_detail(
    state: web::Data<AppState>,
    actor: Actor,
    path: web::Path<String>,
) -> ApiResult {
    let location = visibility::get_location(&state.db, &actor, &path).await?;
    Ok(HttpResponse::Ok().json(location))
}

async fn list_appointments(
    state: web::Data<AppState>,
    actor: Actor,
    query: web::Query<AppointmentFilter>,
) -> ApiResult {
    actor.require_user()?;
    let rows = visibility::list_appointments(&state.db, &actor, &query).await?;
    let views: Vec<_> = rows
        .into_iter()
        .map(|row| AppointmentView::new(row, &actor))
        .collect();
    Ok(HttpResponse::Ok().json(views))
}

async fn create_appointment(
    state: web::Data<AppState>,
    actor: Actor,
    payload: web::Json<NewAppointment>,
) -> ApiResult {
    let appointment = lifecycle::create_appointment(&state.db, &actor, payload.into_inner()).await?;
    calendar::sync_appointment(&state, &appointment, CalendarChange::Created).await;
    Ok(HttpResponse::Created().json(AppointmentView::new(appointment, &actor)))
}

async fn appointment_detail(
    state: web::Data<AppState>,
    actor: Actor,
    path: web::Path<String>,
) -> ApiResult {
    actor.require_user()?;
    let appointment = visibility::get_appointment(&state.db, &actor, &path).await?;
    Ok(HttpResponse::Ok().json(AppointmentView::new(appointment, &actor)))
}

async fn cancel_appointment(
    state: web::Data<AppState>,
    actor: Actor,
    path: web::Path<String>,
) -> ApiResult {
    let appointment = lifecycle::cancel_appointment(&state.db, &actor, &path).await?;
    calendar::sync_appointment(&state, &appointment, CalendarChange::Updated).await;
    Ok(HttpResponse::Ok().json(AppointmentView::new(appointment, &actor)))
}

async fn set_status(
    state: web::Data<AppState>,
    actor: Actor,
    path: web::Path<String>,
    payload: web::Json<StatusChange>,
) -> ApiResult {
    let appointment =
        lifecycle::set_status(&state.db, &actor, &path, payload.into_inner()).await?;
    calendar::sync_appointment(&state, &appointment, CalendarChange::Updated).await;
    Ok(HttpResponse::Ok().json(AppointmentView::new(appointment, &actor)))
}

async fn appointment_ics(
    state: web::Data<AppState>,
    actor: Actor,
    path: web::Path<String>,
) -> ApiResult {
    actor.require_user()?;
    let appointment = visibility::get_appointment(&state.db, &actor, &path).await?;
    ics_response(&state, appointment).await
}

/// Serves one appointment as a downloadable `.ics` file.
pub async fn ics_response(state: &AppState, appointment: AppointmentRow) -> ApiResult {
    let mut conn = state.db.acquire().await?;
    let snapshot = db::load_snapshot(&mut conn, appointment).await?;
    drop(conn);

    let event = CalendarEvent::from_snapshot(&snapshot, &state.config);
    let body = event.to_ics(&state.config.calendar_tzid, Utc::now());
    Ok(HttpResponse::Ok()
        .content_type("text/calendar; charset=utf-8")
        .insert_header((
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"appointment-{}.ics\"", snapshot.appointment.id),
        ))
        .body(body))
}

async fn list_reviews(
    state: web::Data<AppState>,
    actor: Actor,
    query: web::Query<ReviewFilter>,
) -> ApiResult {
    actor.require_user()?;
    let reviews = visibility::list_reviews(&state.db, &actor, &query).await?;
    Ok(HttpResponse::Ok().json(reviews))
}

async fn create_review(
    state: web::Data<AppState>,
    actor: Actor,
    payload: web::Json<NewReview>,
) -> ApiResult {
    let review = reviews::create_review(&state.db, &actor, payload.into_inner()).await?;
    Ok(HttpResponse::Created().json(review))
}

async fn review_detail(
    state: web::Data<AppState>,
    actor: Actor,
    path: web::Path<String>,
) -> ApiResult {
    actor.require_user()?;
    let review = visibility::get_review(&state.db, &actor, &path).await?;
    Ok(HttpResponse::Ok().json(review))
}

async fn publish_review(
    state: web::Data<AppState>,
    actor: Actor,
    path: web::Path<String>,
    payload: web::Json<PublishPayload>,
) -> ApiResult {
    let review =
        reviews::set_review_published(&state.db, &actor, &path, payload.is_published).await?;
    Ok(HttpResponse::Ok().json(review))
}

async fn list_service_reviews(state: web::Data<AppState>, actor: Actor) -> ApiResult {
    let reviews = visibility::list_service_reviews(&state.db, &actor).await?;
    Ok(HttpResponse::Ok().json(reviews))
}

async fn create_service_review(
    state: web::Data<AppState>,
    actor: Actor,
    payload: web::Json<NewServiceReview>,
) -> ApiResult {
    let review = reviews::create_service_review(&state.db, &actor, payload.into_inner()).await?;
    Ok(HttpResponse::Created().json(review))
}

async fn service_review_detail(
    state: web::Data<AppState>,
    actor: Actor,
    path: web::Path<String>,
) -> ApiResult {
    let review = visibility::get_service_review(&state.db, &actor, &path).await?;
    Ok(HttpResponse::Ok().json(review))
}

async fn publish_service_review(
    state: web::Data<AppState>,
    actor: Actor,
    path: web::Path<String>,
    payload: web::Json<PublishPayload>,
) -> ApiResult {
    let review =
        reviews::set_service_review_published(&state.db, &actor, &path, payload.is_published)
            .await?;
    Ok(HttpResponse::Ok().json(review))
}

async fn list_results(
    state: web::Data<AppState>,
    actor: Actor,
    query: web::Query<ResultQuery>,
) -> ApiResult {
    let results = visibility::list_results(&state.db, &actor, query.service_id.as_deref()).await?;
    Ok(HttpResponse::Ok().json(results))
}

async fn create_result(
    state: web::Data<AppState>,
    actor: Actor,
    payload: web::Json<NewResult>,
) -> ApiResult {
    let result = results::create_result(&state.db, &actor, payload.into_inner()).await?;
    Ok(HttpResponse::Created().json(result))
}

async fn result_detail(
    state: web::Data<AppState>,
    actor: Actor,
    path: web::Path<String>,
) -> ApiResult {
    let result = visibility::get_result(&state.db, &actor, &path).await?;
    Ok(HttpResponse::Ok().json(result))
}

async fn publish_result(
    state: web::Data<AppState>,
    actor: Actor,
    path: web::Path<String>,
    payload: web::Json<PublishPayload>,
) -> ApiResult {
    let result =
        results::set_result_published(&state.db, &actor, &path, payload.is_published).await?;
    Ok(HttpResponse::Ok().json(result))
}

async fn profile(state: web::Data<AppState>, actor: Actor) -> ApiResult {
    let profile = accounts::load_profile(&state.db, &actor).await?;
    profile_response(&state, &actor, profile).await
}

async fn update_profile(
    state: web::Data<AppState>,
    actor: Actor,
    payload: web::Json<ProfileUpdate>,
) -> ApiResult {
    let profile = accounts::update_profile(&state.db, &actor, payload.into_inner()).await?;
    profile_response(&state, &actor, profile).await
}

async fn profile_response(
    state: &AppState,
    actor: &Actor,
    profile: accounts::Profile,
) -> ApiResult {
    let recent: Vec<_> = visibility::list_appointments(&state.db, actor, &AppointmentFilter::default())
        .await?
        .into_iter()
        .take(5)
        .map(|row| AppointmentView::new(row, actor))
        .collect();
    Ok(HttpResponse::Ok().json(json!({ "profile": profile, "recent_appointments": recent })))
}

async fn calendar_settings(state: web::Data<AppState>, actor: Actor) -> ApiResult {
    let settings = accounts::calendar_preferences(&state.db, &actor).await?;
    Ok(HttpResponse::Ok().json(settings))
}

async fn update_calendar_settings(
    state: web::Data<AppState>,
    actor: Actor,
    payload: web::Json<CalendarPreferences>,
) -> ApiResult {
    let settings =
        accounts::update_calendar_preferences(&state.db, &actor, payload.into_inner()).await?;
    Ok(HttpResponse::Ok().json(settings))
}

async fn register(state: web::Data<AppState>, payload: web::Json<Registration>) -> ApiResult {
    let user = accounts::register(&state.db, payload.into_inner()).await?;
    Ok(HttpResponse::Created().json(json!({ "id": user.id, "display_name": user.display_name })))
}
