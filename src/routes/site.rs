use actix_web::{http::header, web, HttpResponse};
use actix_web_httpauth::middleware::HttpAuthentication;
use askama::Template;
use serde::Deserialize;

use crate::{
    accounts::{self, CalendarPreferences, Profile, ProfileUpdate, Registration},
    auth::basic_validator,
    calendar::{self, CalendarChange},
    db,
    error::{BookingError, BookingResult},
    lifecycle::{self, NewAppointment},
    models::{CalendarKind, CalendarSettingsRow, LocationRow, ServiceRow},
    policy::Actor,
    reviews::{self, NewReview, NewServiceReview},
    routes::{api::ics_response, AppointmentView, ResultView, ReviewView, SelectOption},
    state::AppState,
    templates::{error_page, render},
    visibility::{self, AppointmentFilter},
};

#[derive(Clone, Debug)]
struct ServiceCard {
    id: String,
    name: String,
    description: String,
    price: String,
    duration_minutes: i64,
}

impl From<ServiceRow> for ServiceCard {
    fn from(row: ServiceRow) -> Self {
        Self {
            price: row.price_display(),
            id: row.id,
            name: row.name,
            description: row.description,
            duration_minutes: row.duration_minutes,
        }
    }
}

#[derive(Clone, Debug)]
struct CategoryBlock {
    name: String,
    description: String,
    services: Vec<ServiceCard>,
}

#[derive(Template)]
#[template(path = "home.html")]
struct HomeTemplate {
    categories: Vec<CategoryBlock>,
    locations: Vec<LocationRow>,
}

#[derive(Clone, Debug)]
struct ResultSection {
    name: String,
    results: Vec<ResultView>,
}

#[derive(Template)]
#[template(path = "results.html")]
struct ResultsTemplate {
    sections: Vec<ResultSection>,
    service_name: String,
}

#[derive(Deserialize)]
struct ResultsQuery {
    service_id: Option<String>,
}

#[derive(Clone, Debug, Default)]
struct FeedbackView {
    rating: String,
    comment: String,
}

#[derive(Template)]
#[template(path = "service.html")]
struct ServiceTemplate {
    service: ServiceCard,
    rating_count: i64,
    rating_average: String,
    reviews: Vec<ReviewView>,
    locations: Vec<SelectOption>,
    form: FeedbackView,
    errors: Vec<String>,
    submitted: bool,
}

#[derive(Clone, Debug, Default)]
struct RegisterView {
    username: String,
    display_name: String,
    email: String,
    phone: String,
}

#[derive(Template)]
#[template(path = "register.html")]
struct RegisterTemplate {
    form: RegisterView,
    errors: Vec<String>,
    registered: bool,
}

#[derive(Template)]
#[template(path = "my_appointments.html")]
struct MyAppointmentsTemplate {
    user_name: String,
    appointments: Vec<AppointmentView>,
}

#[derive(Clone, Debug, Default)]
struct BookingView {
    date: String,
    time: String,
    notes: String,
}

#[derive(Template)]
#[template(path = "book.html")]
struct BookTemplate {
    services: Vec<SelectOption>,
    locations: Vec<SelectOption>,
    form: BookingView,
    errors: Vec<String>,
}

#[derive(Template)]
#[template(path = "my_appointment.html")]
struct AppointmentTemplate {
    appointment: AppointmentView,
    review: Vec<ReviewView>,
    can_review: bool,
    form: FeedbackView,
    errors: Vec<String>,
}

#[derive(Template)]
#[template(path = "profile.html")]
struct ProfileTemplate {
    profile: Profile,
    recent: Vec<AppointmentView>,
    calendar: CalendarSettingsRow,
    calendar_kinds: Vec<SelectOption>,
    errors: Vec<String>,
    saved: bool,
}

#[derive(Deserialize)]
struct BookingForm {
    service_id: String,
    location_id: String,
    date: String,
    time: String,
    notes: Option<String>,
}

#[derive(Deserialize)]
struct FeedbackForm {
    rating: String,
    comment: String,
}

#[derive(Deserialize)]
struct ServiceReviewForm {
    location_id: String,
    rating: String,
    comment: String,
}

#[derive(Deserialize)]
struct CalendarForm {
    calendar_kind: CalendarKind,
    add_appointments: Option<String>,
    update_appointments: Option<String>,
    remove_canceled: Option<String>,
    reminder_minutes: String,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/").route(web::get().to(home)))
        .service(web::resource("/health").route(web::get().to(health)))
        .service(web::resource("/services/{id}").route(web::get().to(service_page)))
        .service(web::resource("/results").route(web::get().to(results_page)))
        .service(
            web::resource("/register")
                .route(web::get().to(show_register))
                .route(web::post().to(register)),
        )
        .service(
            web::scope("/my")
                .wrap(HttpAuthentication::basic(basic_validator))
                .service(web::resource("").route(web::get().to(index)))
                .service(web::resource("/").route(web::get().to(index)))
                .service(web::resource("/appointments").route(web::get().to(my_appointments)))
                .service(
                    web::resource("/book")
                        .route(web::get().to(show_booking))
                        .route(web::post().to(create_booking)),
                )
                .service(
                    web::resource("/appointments/{id}").route(web::get().to(appointment_page)),
                )
                .service(
                    web::resource("/appointments/{id}/cancel")
                        .route(web::post().to(cancel_appointment)),
                )
                .service(
                    web::resource("/appointments/{id}/review").route(web::post().to(leave_review)),
                )
                .service(
                    web::resource("/appointments/{id}/calendar.ics")
                        .route(web::get().to(appointment_ics)),
                )
                .service(
                    web::resource("/services/{id}/review")
                        .route(web::post().to(leave_service_review)),
                )
                .service(
                    web::resource("/profile")
                        .route(web::get().to(show_profile))
                        .route(web::post().to(update_profile)),
                )
                .service(web::resource("/calendar").route(web::post().to(update_calendar))),
        );
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().body("ok")
}

async fn index() -> HttpResponse {
    redirect("/my/appointments")
}

fn redirect(location: &str) -> HttpResponse {
    HttpResponse::SeeOther()
        .append_header((header::LOCATION, location))
        .finish()
}

fn parse_rating(value: &str) -> BookingResult<i64> {
    value
        .trim()
        .parse()
        .map_err(|_| BookingError::Validation("Please choose a rating.".to_string()))
}

fn checked(value: &Option<String>) -> bool {
    value.is_some()
}

async fn home(state: web::Data<AppState>, actor: Actor) -> HttpResponse {
    home_page(&state, &actor).await.unwrap_or_else(error_page)
}

async fn home_page(state: &AppState, actor: &Actor) -> BookingResult<HttpResponse> {
    let categories = visibility::list_categories(&state.db).await?;
    let mut blocks = Vec::with_capacity(categories.len());
    for category in categories {
        let services =
            visibility::list_services(&state.db, actor, Some(category.id.as_str())).await?;
        if services.is_empty() {
            continue;
        }
        blocks.push(CategoryBlock {
            name: category.name,
            description: category.description,
            services: services.into_iter().map(ServiceCard::from).collect(),
        });
    }
    let locations = visibility::list_locations(&state.db, actor).await?;

    Ok(render(HomeTemplate {
        categories: blocks,
        locations,
    }))
}

async fn results_page(
    state: web::Data<AppState>,
    actor: Actor,
    query: web::Query<ResultsQuery>,
) -> HttpResponse {
    render_results(&state, &actor, query.service_id.as_deref())
        .await
        .unwrap_or_else(error_page)
}

async fn render_results(
    state: &AppState,
    actor: &Actor,
    service_id: Option<&str>,
) -> BookingResult<HttpResponse> {
    let service_id = service_id.map(str::trim).filter(|value| !value.is_empty());
    let service_name = match service_id {
        Some(id) => visibility::get_service(&state.db, actor, id).await?.name,
        None => String::new(),
    };
    let results = visibility::list_results(&state.db, actor, service_id).await?;
    let sections = visibility::group_results(results)
        .into_iter()
        .map(|group| ResultSection {
            name: group.category_name,
            results: group.results.into_iter().map(ResultView::from).collect(),
        })
        .collect();

    Ok(render(ResultsTemplate {
        sections,
        service_name,
    }))
}

async fn service_page(
    state: web::Data<AppState>,
    actor: Actor,
    path: web::Path<String>,
) -> HttpResponse {
    render_service(&state, &actor, &path, FeedbackView::default(), Vec::new(), false)
        .await
        .unwrap_or_else(error_page)
}

async fn render_service(
    state: &AppState,
    actor: &Actor,
    service_id: &str,
    form: FeedbackView,
    errors: Vec<String>,
    submitted: bool,
) -> BookingResult<HttpResponse> {
    let service = visibility::get_service(&state.db, actor, service_id).await?;
    let rating = visibility::service_rating(&state.db, &service.id).await?;
    let reviews = visibility::list_service_reviews_for(&state.db, &service.id)
        .await?
        .into_iter()
        .map(ReviewView::from)
        .collect();
    let locations = location_options(state, actor, "").await?;

    Ok(render(ServiceTemplate {
        service: ServiceCard::from(service),
        rating_count: rating.count,
        rating_average: rating.average_display(),
        reviews,
        locations,
        form,
        errors,
        submitted,
    }))
}

async fn location_options(
    state: &AppState,
    actor: &Actor,
    current: &str,
) -> BookingResult<Vec<SelectOption>> {
    Ok(visibility::list_locations(&state.db, actor)
        .await?
        .into_iter()
        .map(|location| SelectOption::new(location.id, location.name, current))
        .collect())
}

async fn service_options(
    state: &AppState,
    actor: &Actor,
    current: &str,
) -> BookingResult<Vec<SelectOption>> {
    Ok(visibility::list_services(&state.db, actor, None)
        .await?
        .into_iter()
        .map(|service| {
            let label = format!(
                "{} ({} min, {})",
                service.name,
                service.duration_minutes,
                service.price_display()
            );
            SelectOption::new(service.id, label, current)
        })
        .collect())
}

async fn show_register() -> HttpResponse {
    render(RegisterTemplate {
        form: RegisterView::default(),
        errors: Vec::new(),
        registered: false,
    })
}

async fn register(state: web::Data<AppState>, form: web::Form<Registration>) -> HttpResponse {
    let form = form.into_inner();
    let view = RegisterView {
        username: form.username.clone(),
        display_name: form.display_name.clone(),
        email: form.email.clone(),
        phone: form.phone.clone(),
    };

    match accounts::register(&state.db, form).await {
        Ok(_) => render(RegisterTemplate {
            form: RegisterView::default(),
            errors: Vec::new(),
            registered: true,
        }),
        Err(err) if err.is_user_facing() => render(RegisterTemplate {
            form: view,
            errors: vec![err.to_string()],
            registered: false,
        }),
        Err(err) => error_page(err),
    }
}

async fn my_appointments(state: web::Data<AppState>, actor: Actor) -> HttpResponse {
    let filter = AppointmentFilter::default();
    let rows = match visibility::list_appointments(&state.db, &actor, &filter).await {
        Ok(rows) => rows,
        Err(err) => return error_page(err),
    };
    let user_name = actor
        .user()
        .map(|user| user.display_name.clone())
        .unwrap_or_default();

    render(MyAppointmentsTemplate {
        user_name,
        appointments: rows
            .into_iter()
            .map(|row| AppointmentView::new(row, &actor))
            .collect(),
    })
}

async fn show_booking(state: web::Data<AppState>, actor: Actor) -> HttpResponse {
    render_booking(&state, &actor, "", "", BookingView::default(), Vec::new())
        .await
        .unwrap_or_else(error_page)
}

async fn render_booking(
    state: &AppState,
    actor: &Actor,
    service_id: &str,
    location_id: &str,
    form: BookingView,
    errors: Vec<String>,
) -> BookingResult<HttpResponse> {
    Ok(render(BookTemplate {
        services: service_options(state, actor, service_id).await?,
        locations: location_options(state, actor, location_id).await?,
        form,
        errors,
    }))
}

async fn create_booking(
    state: web::Data<AppState>,
    actor: Actor,
    form: web::Form<BookingForm>,
) -> HttpResponse {
    let form = form.into_inner();
    let input = NewAppointment {
        service_id: form.service_id.clone(),
        location_id: form.location_id.clone(),
        date: form.date.clone(),
        time: form.time.clone(),
        notes: form.notes.clone().unwrap_or_default(),
    };

    match lifecycle::create_appointment(&state.db, &actor, input).await {
        Ok(appointment) => {
            calendar::sync_appointment(&state, &appointment, CalendarChange::Created).await;
            redirect(&format!("/my/appointments/{}", appointment.id))
        }
        Err(err) if err.is_user_facing() => {
            let view = BookingView {
                date: form.date,
                time: form.time,
                notes: form.notes.unwrap_or_default(),
            };
            render_booking(
                &state,
                &actor,
                &form.service_id,
                &form.location_id,
                view,
                vec![err.to_string()],
            )
            .await
            .unwrap_or_else(error_page)
        }
        Err(err) => error_page(err),
    }
}

async fn appointment_page(
    state: web::Data<AppState>,
    actor: Actor,
    path: web::Path<String>,
) -> HttpResponse {
    render_appointment(&state, &actor, &path, FeedbackView::default(), Vec::new())
        .await
        .unwrap_or_else(error_page)
}

async fn render_appointment(
    state: &AppState,
    actor: &Actor,
    appointment_id: &str,
    form: FeedbackView,
    errors: Vec<String>,
) -> BookingResult<HttpResponse> {
    let appointment = visibility::get_appointment(&state.db, actor, appointment_id).await?;
    let review = {
        let mut conn = state.db.acquire().await?;
        db::find_review_for_appointment(&mut conn, &appointment.id).await?
    };
    let view = AppointmentView::new(appointment, actor);

    Ok(render(AppointmentTemplate {
        can_review: view.is_completed() && review.is_none(),
        review: review.into_iter().map(ReviewView::from).collect(),
        appointment: view,
        form,
        errors,
    }))
}

async fn cancel_appointment(
    state: web::Data<AppState>,
    actor: Actor,
    path: web::Path<String>,
) -> HttpResponse {
    match lifecycle::cancel_appointment(&state.db, &actor, &path).await {
        Ok(appointment) => {
            calendar::sync_appointment(&state, &appointment, CalendarChange::Updated).await;
            redirect(&format!("/my/appointments/{}", appointment.id))
        }
        Err(err @ (BookingError::Precondition(_) | BookingError::Validation(_))) => {
            let errors = vec![err.to_string()];
            render_appointment(&state, &actor, &path, FeedbackView::default(), errors)
                .await
                .unwrap_or_else(error_page)
        }
        Err(err) => error_page(err),
    }
}

async fn leave_review(
    state: web::Data<AppState>,
    actor: Actor,
    path: web::Path<String>,
    form: web::Form<FeedbackForm>,
) -> HttpResponse {
    let form = form.into_inner();
    let result = match parse_rating(&form.rating) {
        Ok(rating) => {
            let input = NewReview {
                appointment_id: path.to_string(),
                rating,
                comment: form.comment.clone(),
            };
            reviews::create_review(&state.db, &actor, input).await.map(|_| ())
        }
        Err(err) => Err(err),
    };

    match result {
        Ok(()) => redirect(&format!("/my/appointments/{}", path.as_str())),
        Err(err @ (BookingError::Validation(_)
        | BookingError::Precondition(_)
        | BookingError::Duplicate(_))) => {
            let view = FeedbackView {
                rating: form.rating,
                comment: form.comment,
            };
            render_appointment(&state, &actor, &path, view, vec![err.to_string()])
                .await
                .unwrap_or_else(error_page)
        }
        Err(err) => error_page(err),
    }
}

async fn appointment_ics(
    state: web::Data<AppState>,
    actor: Actor,
    path: web::Path<String>,
) -> HttpResponse {
    let result = match visibility::get_appointment(&state.db, &actor, &path).await {
        Ok(appointment) => ics_response(&state, appointment).await,
        Err(err) => Err(err),
    };
    result.unwrap_or_else(error_page)
}

async fn leave_service_review(
    state: web::Data<AppState>,
    actor: Actor,
    path: web::Path<String>,
    form: web::Form<ServiceReviewForm>,
) -> HttpResponse {
    let form = form.into_inner();
    let result = match parse_rating(&form.rating) {
        Ok(rating) => {
            let input = NewServiceReview {
                service_id: path.to_string(),
                location_id: form.location_id.clone(),
                rating,
                comment: form.comment.clone(),
            };
            reviews::create_service_review(&state.db, &actor, input).await.map(|_| ())
        }
        Err(err) => Err(err),
    };

    let (view, errors, submitted) = match result {
        Ok(()) => (FeedbackView::default(), Vec::new(), true),
        Err(err) if err.is_user_facing() => (
            FeedbackView {
                rating: form.rating,
                comment: form.comment,
            },
            vec![err.to_string()],
            false,
        ),
        Err(err) => return error_page(err),
    };
    render_service(&state, &actor, &path, view, errors, submitted)
        .await
        .unwrap_or_else(error_page)
}

async fn show_profile(state: web::Data<AppState>, actor: Actor) -> HttpResponse {
    render_profile(&state, &actor, Vec::new(), false)
        .await
        .unwrap_or_else(error_page)
}

async fn render_profile(
    state: &AppState,
    actor: &Actor,
    errors: Vec<String>,
    saved: bool,
) -> BookingResult<HttpResponse> {
    let profile = accounts::load_profile(&state.db, actor).await?;
    let recent = visibility::list_appointments(&state.db, actor, &AppointmentFilter::default())
        .await?
        .into_iter()
        .take(5)
        .map(|row| AppointmentView::new(row, actor))
        .collect();
    let calendar = accounts::calendar_preferences(&state.db, actor).await?;
    let calendar_kinds = [
        (CalendarKind::None, "Do not sync"),
        (CalendarKind::Google, "Google Calendar"),
        (CalendarKind::Ical, "iCal feed"),
    ]
    .into_iter()
    .map(|(kind, label)| SelectOption::new(kind.as_str(), label, calendar.calendar_kind.as_str()))
    .collect();

    Ok(render(ProfileTemplate {
        profile,
        recent,
        calendar,
        calendar_kinds,
        errors,
        saved,
    }))
}

async fn update_profile(
    state: web::Data<AppState>,
    actor: Actor,
    form: web::Form<ProfileUpdate>,
) -> HttpResponse {
    let outcome = accounts::update_profile(&state.db, &actor, form.into_inner()).await;
    profile_outcome(&state, &actor, outcome.map(|_| ())).await
}

async fn update_calendar(
    state: web::Data<AppState>,
    actor: Actor,
    form: web::Form<CalendarForm>,
) -> HttpResponse {
    let form = form.into_inner();
    let outcome = match form.reminder_minutes.trim().parse::<i64>() {
        Ok(reminder_minutes) => {
            let input = CalendarPreferences {
                calendar_kind: form.calendar_kind,
                add_appointments: checked(&form.add_appointments),
                update_appointments: checked(&form.update_appointments),
                remove_canceled: checked(&form.remove_canceled),
                reminder_minutes,
            };
            accounts::update_calendar_preferences(&state.db, &actor, input)
                .await
                .map(|_| ())
        }
        Err(_) => Err(BookingError::Validation(
            "Reminder must be a number of minutes.".to_string(),
        )),
    };
    profile_outcome(&state, &actor, outcome).await
}

async fn profile_outcome(
    state: &AppState,
    actor: &Actor,
    outcome: BookingResult<()>,
) -> HttpResponse {
    let rendered = match outcome {
        Ok(()) => render_profile(state, actor, Vec::new(), true).await,
        Err(err) if err.is_user_facing() => {
            render_profile(state, actor, vec![err.to_string()], false).await
        }
        Err(err) => Err(err),
    };
    rendered.unwrap_or_else(error_page)
}

#[cfg(test)]
mod tests {
    use actix_web::{
        test::{self, TestRequest},
        App,
    };

    use super::*;
    use crate::models::AppointmentStatus;
    use crate::test_support::{basic_header, Fixture};

    macro_rules! app {
        ($fixture:expr) => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new($fixture.state()))
                    .configure(configure),
            )
            .await
        };
    }

    async fn text(response: actix_web::dev::ServiceResponse) -> String {
        let body = test::read_body(response).await;
        String::from_utf8_lossy(&body).into_owned()
    }

    #[actix_web::test]
    async fn home_lists_the_active_catalog() {
        let fixture = Fixture::new().await;
        let app = app!(fixture);

        let response = test::call_service(&app, TestRequest::get().uri("/").to_request()).await;
        assert_eq!(response.status(), 200);
        let page = text(response).await;
        assert!(page.contains("Full body session"));
        assert!(page.contains("12 Market Street"));
    }

    #[actix_web::test]
    async fn client_area_demands_credentials() {
        let fixture = Fixture::new().await;
        let app = app!(fixture);

        let response =
            test::call_service(&app, TestRequest::get().uri("/my/appointments").to_request()).await;
        assert_eq!(response.status(), 401);
        assert!(response.headers().contains_key(header::WWW_AUTHENTICATE));
    }

    #[actix_web::test]
    async fn invalid_booking_re_renders_the_form() {
        let fixture = Fixture::new().await;
        fixture.set_password("alice", "secret1").await;
        let app = app!(fixture);

        let response = test::call_service(
            &app,
            TestRequest::post()
                .uri("/my/book")
                .insert_header(basic_header("alice", "secret1"))
                .set_form([
                    ("service_id", "svc-1"),
                    ("location_id", "loc-1"),
                    ("date", "not-a-date"),
                    ("time", "10:00"),
                ])
                .to_request(),
        )
        .await;
        assert_eq!(response.status(), 200);
        assert!(text(response).await.contains("Please pick a valid date."));
        assert_eq!(fixture.count("appointments").await, 0);

        let response = test::call_service(
            &app,
            TestRequest::post()
                .uri("/my/book")
                .insert_header(basic_header("alice", "secret1"))
                .set_form([
                    ("service_id", "svc-1"),
                    ("location_id", "loc-1"),
                    ("date", "2030-06-01"),
                    ("time", "10:00"),
                ])
                .to_request(),
        )
        .await;
        assert_eq!(response.status(), 303);
        assert_eq!(fixture.count("appointments").await, 1);
    }

    #[actix_web::test]
    async fn review_form_reports_ineligible_appointments() {
        let fixture = Fixture::new().await;
        fixture.set_password("alice", "secret1").await;
        let app = app!(fixture);
        let pending = fixture.appointment("alice", AppointmentStatus::Pending).await;

        let response = test::call_service(
            &app,
            TestRequest::post()
                .uri(&format!("/my/appointments/{}/review", pending.id))
                .insert_header(basic_header("alice", "secret1"))
                .set_form([("rating", "5"), ("comment", "lovely")])
                .to_request(),
        )
        .await;
        assert_eq!(response.status(), 200);
        assert!(text(response).await.contains("Only completed procedures can be reviewed."));
        assert_eq!(fixture.count("reviews").await, 0);
    }

    #[actix_web::test]
    async fn cancel_of_a_finished_appointment_re_renders_the_page() {
        let fixture = Fixture::new().await;
        fixture.set_password("alice", "secret1").await;
        let app = app!(fixture);
        let done = fixture.appointment("alice", AppointmentStatus::Completed).await;

        let response = test::call_service(
            &app,
            TestRequest::post()
                .uri(&format!("/my/appointments/{}/cancel", done.id))
                .insert_header(basic_header("alice", "secret1"))
                .to_request(),
        )
        .await;
        assert_eq!(response.status(), 200);
        assert!(text(response)
            .await
            .contains("Cannot cancel a completed or already canceled appointment."));

        let status: String = sqlx::query_scalar("SELECT status FROM appointments WHERE id = ?")
            .bind(&done.id)
            .fetch_one(&fixture.pool)
            .await
            .expect("status");
        assert_eq!(status, "completed");
    }

    #[actix_web::test]
    async fn results_page_groups_published_work_by_category() {
        let fixture = Fixture::new().await;
        let app = app!(fixture);
        fixture.result("Waist contour", true, 10).await;
        fixture.result("Unfinished draft", false, 5).await;

        let response = test::call_service(&app, TestRequest::get().uri("/results").to_request()).await;
        assert_eq!(response.status(), 200);
        let page = text(response).await;
        assert!(page.contains("Body contouring"));
        assert!(page.contains("Waist contour"));
        assert!(!page.contains("Unfinished draft"));

        let response = test::call_service(
            &app,
            TestRequest::get().uri("/results?service_id=svc-1").to_request(),
        )
        .await;
        assert_eq!(response.status(), 200);
        assert!(text(response).await.contains("Full body session"));

        let response = test::call_service(
            &app,
            TestRequest::get().uri("/results?service_id=missing").to_request(),
        )
        .await;
        assert_eq!(response.status(), 404);
    }

    #[actix_web::test]
    async fn foreign_appointment_page_is_not_found() {
        let fixture = Fixture::new().await;
        fixture.set_password("alice", "secret1").await;
        let app = app!(fixture);
        let bobs = fixture.appointment("bob", AppointmentStatus::Pending).await;

        let response = test::call_service(
            &app,
            TestRequest::get()
                .uri(&format!("/my/appointments/{}", bobs.id))
                .insert_header(basic_header("alice", "secret1"))
                .to_request(),
        )
        .await;
        assert_eq!(response.status(), 404);
    }

    #[actix_web::test]
    async fn registration_form_creates_an_account() {
        let fixture = Fixture::new().await;
        let app = app!(fixture);

        let response = test::call_service(
            &app,
            TestRequest::post()
                .uri("/register")
                .set_form([
                    ("username", "dana"),
                    ("display_name", "Dana"),
                    ("email", ""),
                    ("phone", ""),
                    ("password", "123"),
                ])
                .to_request(),
        )
        .await;
        assert!(text(response).await.contains("Password must be at least 6 characters."));

        let response = test::call_service(
            &app,
            TestRequest::post()
                .uri("/register")
                .set_form([
                    ("username", "dana"),
                    ("display_name", "Dana"),
                    ("email", ""),
                    ("phone", ""),
                    ("password", "123456"),
                ])
                .to_request(),
        )
        .await;
        assert_eq!(response.status(), 200);
        assert_eq!(fixture.count("clients").await, 1);
    }
}
