use actix_web::{http::header, web, HttpResponse};
use actix_web_httpauth::middleware::HttpAuthentication;
use askama::Template;
use serde::Deserialize;

use crate::{
    auth::staff_validator,
    calendar::{self, CalendarChange},
    error::{BookingError, BookingResult},
    lifecycle::{self, StatusChange},
    models::AppointmentStatus,
    policy::Actor,
    results, reviews,
    routes::{status_options, AppointmentView, ResultView, ReviewView, SelectOption},
    state::AppState,
    templates::{error_page, render},
    visibility::{self, AppointmentFilter, ReviewFilter},
};

#[derive(Clone, Debug)]
struct StatCard {
    label: String,
    value: usize,
}

#[derive(Template)]
#[template(path = "staff_dashboard.html")]
struct DashboardTemplate {
    staff_name: String,
    stats: Vec<StatCard>,
    upcoming: Vec<AppointmentView>,
}

#[derive(Clone, Debug, Default)]
struct FilterView {
    date: String,
    search: String,
}

#[derive(Template)]
#[template(path = "staff_appointments.html")]
struct AppointmentsTemplate {
    appointments: Vec<AppointmentView>,
    statuses: Vec<SelectOption>,
    locations: Vec<SelectOption>,
    filter: FilterView,
    errors: Vec<String>,
}

#[derive(Template)]
#[template(path = "staff_appointment.html")]
struct AppointmentTemplate {
    appointment: AppointmentView,
    statuses: Vec<SelectOption>,
    errors: Vec<String>,
}

#[derive(Template)]
#[template(path = "staff_reviews.html")]
struct ReviewsTemplate {
    reviews: Vec<ReviewView>,
    service_reviews: Vec<ReviewView>,
    published: Vec<SelectOption>,
}

#[derive(Template)]
#[template(path = "staff_results.html")]
struct ResultsTemplate {
    results: Vec<ResultView>,
}

#[derive(Deserialize)]
struct StatusForm {
    status: AppointmentStatus,
    admin_notes: String,
    notified: Option<String>,
}

#[derive(Deserialize)]
struct PublishForm {
    is_published: String,
}

impl PublishForm {
    fn value(&self) -> bool {
        self.is_published == "1"
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/staff")
            .wrap(HttpAuthentication::basic(staff_validator))
            .service(web::resource("").route(web::get().to(index)))
            .service(web::resource("/").route(web::get().to(index)))
            .service(web::resource("/dashboard").route(web::get().to(dashboard)))
            .service(web::resource("/appointments").route(web::get().to(list_appointments)))
            .service(
                web::resource("/appointments/{id}")
                    .route(web::get().to(appointment_detail))
                    .route(web::post().to(update_appointment)),
            )
            .service(web::resource("/reviews").route(web::get().to(list_reviews)))
            .service(web::resource("/reviews/{id}/publish").route(web::post().to(publish_review)))
            .service(
                web::resource("/service-reviews/{id}/publish")
                    .route(web::post().to(publish_service_review)),
            )
            .service(web::resource("/results").route(web::get().to(list_results)))
            .service(web::resource("/results/{id}/publish").route(web::post().to(publish_result))),
    );
}

async fn index() -> HttpResponse {
    HttpResponse::Found()
        .append_header((header::LOCATION, "/staff/dashboard"))
        .finish()
}

fn see_other(location: &str) -> HttpResponse {
    HttpResponse::SeeOther()
        .append_header((header::LOCATION, location))
        .finish()
}

async fn dashboard(state: web::Data<AppState>, actor: Actor) -> HttpResponse {
    dashboard_page(&state, &actor).await.unwrap_or_else(error_page)
}

async fn dashboard_page(state: &AppState, actor: &Actor) -> BookingResult<HttpResponse> {
    let staff = actor.require_staff()?;
    let rows =
        visibility::list_appointments(&state.db, actor, &AppointmentFilter::default()).await?;
    let unpublished = ReviewFilter {
        is_published: Some("0".to_string()),
        ..Default::default()
    };
    let awaiting_moderation = visibility::list_reviews(&state.db, actor, &unpublished)
        .await?
        .len();

    let count = |status: AppointmentStatus| rows.iter().filter(|row| row.status == status).count();
    let stats = vec![
        StatCard {
            label: "Total appointments".to_string(),
            value: rows.len(),
        },
        StatCard {
            label: "Awaiting confirmation".to_string(),
            value: count(AppointmentStatus::Pending),
        },
        StatCard {
            label: "Confirmed".to_string(),
            value: count(AppointmentStatus::Confirmed),
        },
        StatCard {
            label: "Completed".to_string(),
            value: count(AppointmentStatus::Completed),
        },
        StatCard {
            label: "Reviews to moderate".to_string(),
            value: awaiting_moderation,
        },
    ];

    // Lists come newest first; the dashboard wants the nearest open slots.
    let mut upcoming: Vec<_> = rows
        .iter()
        .filter(|row| !row.status.is_terminal())
        .cloned()
        .collect();
    upcoming.reverse();
    upcoming.truncate(10);

    Ok(render(DashboardTemplate {
        staff_name: staff.display_name.clone(),
        stats,
        upcoming: upcoming
            .into_iter()
            .map(|row| AppointmentView::new(row, actor))
            .collect(),
    }))
}

async fn list_appointments(
    state: web::Data<AppState>,
    actor: Actor,
    query: web::Query<AppointmentFilter>,
) -> HttpResponse {
    let filter = query.into_inner();
    let (rows, errors) = match visibility::list_appointments(&state.db, &actor, &filter).await {
        Ok(rows) => (rows, Vec::new()),
        Err(err) if err.is_user_facing() => (Vec::new(), vec![err.to_string()]),
        Err(err) => return error_page(err),
    };
    let locations = match visibility::list_locations(&state.db, &actor).await {
        Ok(locations) => locations,
        Err(err) => return error_page(err),
    };

    let current_location = filter.location_id.clone().unwrap_or_default();
    let mut location_options = vec![SelectOption::new("", "All locations", &current_location)];
    location_options.extend(
        locations
            .into_iter()
            .map(|location| SelectOption::new(location.id, location.name, &current_location)),
    );
    let current_status = filter.status.clone().unwrap_or_default();
    let mut statuses = vec![SelectOption::new("", "All statuses", &current_status)];
    statuses.extend(status_options(&current_status));

    render(AppointmentsTemplate {
        appointments: rows
            .into_iter()
            .map(|row| AppointmentView::new(row, &actor))
            .collect(),
        statuses,
        locations: location_options,
        filter: FilterView {
            date: filter.date.unwrap_or_default(),
            search: filter.search.unwrap_or_default(),
        },
        errors,
    })
}

async fn appointment_detail(
    state: web::Data<AppState>,
    actor: Actor,
    path: web::Path<String>,
) -> HttpResponse {
    render_detail(&state, &actor, &path, Vec::new())
        .await
        .unwrap_or_else(error_page)
}

async fn render_detail(
    state: &AppState,
    actor: &Actor,
    appointment_id: &str,
    errors: Vec<String>,
) -> BookingResult<HttpResponse> {
    let appointment = visibility::get_appointment(&state.db, actor, appointment_id).await?;
    let view = AppointmentView::new(appointment, actor);
    Ok(render(AppointmentTemplate {
        statuses: status_options(view.status.as_str()),
        appointment: view,
        errors,
    }))
}

async fn update_appointment(
    state: web::Data<AppState>,
    actor: Actor,
    path: web::Path<String>,
    form: web::Form<StatusForm>,
) -> HttpResponse {
    let form = form.into_inner();
    let change = StatusChange {
        status: form.status,
        admin_notes: Some(form.admin_notes),
        notified: Some(form.notified.is_some()),
    };

    match lifecycle::set_status(&state.db, &actor, &path, change).await {
        Ok(appointment) => {
            calendar::sync_appointment(&state, &appointment, CalendarChange::Updated).await;
            see_other(&format!("/staff/appointments/{}", appointment.id))
        }
        Err(err @ BookingError::Validation(_)) => {
            render_detail(&state, &actor, &path, vec![err.to_string()])
                .await
                .unwrap_or_else(error_page)
        }
        Err(err) => error_page(err),
    }
}

async fn list_reviews(
    state: web::Data<AppState>,
    actor: Actor,
    query: web::Query<ReviewFilter>,
) -> HttpResponse {
    let filter = query.into_inner();
    let reviews = match visibility::list_reviews(&state.db, &actor, &filter).await {
        Ok(rows) => rows,
        Err(err) => return error_page(err),
    };
    let service_reviews = match visibility::list_service_reviews(&state.db, &actor).await {
        Ok(rows) => rows,
        Err(err) => return error_page(err),
    };

    let current = filter.is_published.unwrap_or_default();
    render(ReviewsTemplate {
        reviews: reviews.into_iter().map(ReviewView::from).collect(),
        service_reviews: service_reviews.into_iter().map(ReviewView::from).collect(),
        published: vec![
            SelectOption::new("", "All reviews", &current),
            SelectOption::new("0", "Awaiting moderation", &current),
            SelectOption::new("1", "Published", &current),
        ],
    })
}

async fn publish_review(
    state: web::Data<AppState>,
    actor: Actor,
    path: web::Path<String>,
    form: web::Form<PublishForm>,
) -> HttpResponse {
    match reviews::set_review_published(&state.db, &actor, &path, form.value()).await {
        Ok(_) => see_other("/staff/reviews"),
        Err(err) => error_page(err),
    }
}

async fn publish_service_review(
    state: web::Data<AppState>,
    actor: Actor,
    path: web::Path<String>,
    form: web::Form<PublishForm>,
) -> HttpResponse {
    match reviews::set_service_review_published(&state.db, &actor, &path, form.value()).await {
        Ok(_) => see_other("/staff/reviews"),
        Err(err) => error_page(err),
    }
}

async fn list_results(state: web::Data<AppState>, actor: Actor) -> HttpResponse {
    match visibility::list_results(&state.db, &actor, None).await {
        Ok(rows) => render(ResultsTemplate {
            results: rows.into_iter().map(ResultView::from).collect(),
        }),
        Err(err) => error_page(err),
    }
}

async fn publish_result(
    state: web::Data<AppState>,
    actor: Actor,
    path: web::Path<String>,
    form: web::Form<PublishForm>,
) -> HttpResponse {
    match results::set_result_published(&state.db, &actor, &path, form.value()).await {
        Ok(_) => see_other("/staff/results"),
        Err(err) => error_page(err),
    }
}
