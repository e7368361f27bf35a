use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use actix_web::http::{header, StatusCode};
use actix_web::{test, web, App};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use governor::clock::FakeRelativeClock;
use serde_json::{json, Value};

use pispas_bookings::api::{self, AdminCredentials, AppState};
use pispas_bookings::db::{
    InMemoryReservationService, NewReservation, Reservation, ReservationError, ReservationRules,
    ReservationService, ReservationStatus, ServiceWindow, Slot,
};
use pispas_bookings::email::{EmailError, EmailService};
use pispas_bookings::rate_limit::{GovernorRateLimiter, RateLimitConfig, RateLimitRule};

const ADMIN_PASSWORD: &str = "correct-horse";

/// Qué debe devolver `create_reservation` en el servicio falso
#[derive(Clone, Copy)]
enum CreateOutcome {
    Created,
    Duplicate,
    InvalidTime,
}

struct StubReservations {
    available: bool,
    outcome: CreateOutcome,
    create_calls: AtomicUsize,
}

impl StubReservations {
    fn new(available: bool, outcome: CreateOutcome) -> Arc<Self> {
        Arc::new(Self {
            available,
            outcome,
            create_calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl ReservationService for StubReservations {
    async fn check_slot_availability(
        &self,
        _date: NaiveDate,
        _time: NaiveTime,
    ) -> Result<bool, ReservationError> {
        Ok(self.available)
    }

    async fn create_reservation(
        &self,
        new: NewReservation,
    ) -> Result<Reservation, ReservationError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        match self.outcome {
            CreateOutcome::Created => Ok(Reservation {
                id: "res-42".to_string(),
                name: new.name,
                email: new.email,
                phone: new.phone,
                reservation_date: new.reservation_date,
                reservation_time: new.reservation_time,
                party_size: new.party_size,
                special_requests: new.special_requests,
                status: ReservationStatus::Pending,
                created_at: 0,
            }),
            CreateOutcome::Duplicate => Err(ReservationError::DuplicateReservation),
            CreateOutcome::InvalidTime => Err(ReservationError::InvalidReservationTime),
        }
    }

    async fn get_available_slots(&self, _date: NaiveDate) -> Result<Vec<Slot>, ReservationError> {
        Ok(vec![Slot {
            time: "20:00".to_string(),
            remaining: 3,
        }])
    }
}

struct RecordingEmails {
    fail: bool,
    sent: AtomicUsize,
}

impl RecordingEmails {
    fn new(fail: bool) -> Arc<Self> {
        Arc::new(Self {
            fail,
            sent: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl EmailService for RecordingEmails {
    async fn send_reservation_emails(&self, _reservation: &Reservation) -> Result<(), EmailError> {
        self.sent.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(EmailError::Rejected {
                to: "ana@example.com".to_string(),
                status: 503,
                body: "unavailable".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

fn rate_limit(max_requests: u32) -> RateLimitConfig {
    let rule = RateLimitRule::new(max_requests, 60);
    RateLimitConfig {
        enabled: true,
        admin_login: rule,
        reservation_create: rule,
        reservation_check: rule,
    }
}

fn state_with(
    limits: RateLimitConfig,
    reservations: Arc<dyn ReservationService>,
    emails: Arc<dyn EmailService>,
) -> AppState {
    AppState::new(
        AdminCredentials::new(ADMIN_PASSWORD),
        Arc::new(GovernorRateLimiter::with_clock(limits, FakeRelativeClock::default())),
        reservations,
        emails,
    )
}

fn default_state() -> AppState {
    state_with(
        rate_limit(100),
        StubReservations::new(true, CreateOutcome::Created),
        RecordingEmails::new(false),
    )
}

macro_rules! app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($state))
                .configure(api::init_routes),
        )
        .await
    };
}

fn reservation_body() -> Value {
    json!({
        "name": "Ana García",
        "email": "ana@example.com",
        "reservation_date": "2099-06-01",
        "reservation_time": "20:00",
        "party_size": 4
    })
}

fn login(password: Value) -> test::TestRequest {
    test::TestRequest::post()
        .uri("/api/admin/login")
        .insert_header(("x-forwarded-for", "198.51.100.1"))
        .set_json(json!({ "password": password }))
}

// ---------------------------------------------------------------------------
// Admin login
// ---------------------------------------------------------------------------

#[actix_web::test]
async fn correct_password_sets_session_cookie() {
    let app = app!(default_state());

    let resp = test::call_service(&app, login(json!(ADMIN_PASSWORD)).to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let cookie = resp
        .headers()
        .get(header::SET_COOKIE)
        .expect("Set-Cookie")
        .to_str()
        .unwrap()
        .to_string();
    assert!(cookie.starts_with("admin_session=true"));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Strict"));
    assert!(cookie.contains("Max-Age=3600"));
    assert!(cookie.contains("Path=/admin"));

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], true);
}

#[actix_web::test]
async fn wrong_password_is_unauthorized_without_cookie() {
    let app = app!(default_state());

    let resp = test::call_service(&app, login(json!("nope")).to_request()).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(resp.headers().get(header::SET_COOKIE).is_none());

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], false);
}

#[actix_web::test]
async fn invalid_login_bodies_are_rejected_with_details() {
    let app = app!(default_state());

    for body in [json!({}), json!({ "password": 123 }), json!({ "password": "" }), json!([])] {
        let req = test::TestRequest::post()
            .uri("/api/admin/login")
            .set_json(&body)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "body {body}");

        let json: Value = test::read_body_json(resp).await;
        assert!(json["details"].as_array().is_some_and(|d| !d.is_empty()));
    }
}

#[actix_web::test]
async fn malformed_json_login_is_internal_error() {
    let app = app!(default_state());

    let req = test::TestRequest::post()
        .uri("/api/admin/login")
        .insert_header((header::CONTENT_TYPE, "application/json"))
        .set_payload("{\"password\":")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[actix_web::test]
async fn login_rate_limit_applies_regardless_of_payload() {
    let app = app!(state_with(
        rate_limit(2),
        StubReservations::new(true, CreateOutcome::Created),
        RecordingEmails::new(false),
    ));

    for _ in 0..2 {
        let resp = test::call_service(&app, login(json!("nope")).to_request()).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    // Contraseña correcta, pero el cliente ya agotó el límite
    let resp = test::call_service(&app, login(json!(ADMIN_PASSWORD)).to_request()).await;
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(resp.headers().get(header::RETRY_AFTER).is_some());
    assert!(resp.headers().get(header::SET_COOKIE).is_none());

    // Otro cliente no está afectado
    let req = test::TestRequest::post()
        .uri("/api/admin/login")
        .insert_header(("x-forwarded-for", "198.51.100.2"))
        .set_json(json!({ "password": ADMIN_PASSWORD }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
}

#[actix_web::test]
async fn logout_clears_cookie() {
    let app = app!(default_state());

    let req = test::TestRequest::post().uri("/api/admin/logout").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let cookie = resp.headers().get(header::SET_COOKIE).unwrap().to_str().unwrap();
    assert!(cookie.starts_with("admin_session="));
    assert!(cookie.contains("Max-Age=0"));
}

// ---------------------------------------------------------------------------
// Creación de reservas
// ---------------------------------------------------------------------------

#[actix_web::test]
async fn creates_reservation() {
    let emails = RecordingEmails::new(false);
    let app = app!(state_with(
        rate_limit(100),
        StubReservations::new(true, CreateOutcome::Created),
        emails.clone(),
    ));

    let req = test::TestRequest::post()
        .uri("/api/reservations")
        .set_json(reservation_body())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], true);
    assert_eq!(
        body["reservation"],
        json!({
            "id": "res-42",
            "name": "Ana García",
            "reservation_date": "2099-06-01",
            "reservation_time": "20:00",
            "party_size": 4,
            "status": "pending"
        })
    );
    assert_eq!(emails.sent.load(Ordering::SeqCst), 1);
}

#[actix_web::test]
async fn email_failure_does_not_fail_creation() {
    let emails = RecordingEmails::new(true);
    let app = app!(state_with(
        rate_limit(100),
        StubReservations::new(true, CreateOutcome::Created),
        emails.clone(),
    ));

    let req = test::TestRequest::post()
        .uri("/api/reservations")
        .set_json(reservation_body())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    assert_eq!(emails.sent.load(Ordering::SeqCst), 1);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["reservation"]["id"], "res-42");
}

#[actix_web::test]
async fn unavailable_slot_is_conflict_without_creating() {
    let reservations = StubReservations::new(false, CreateOutcome::Created);
    let emails = RecordingEmails::new(false);
    let app = app!(state_with(rate_limit(100), reservations.clone(), emails.clone()));

    let req = test::TestRequest::post()
        .uri("/api/reservations")
        .set_json(reservation_body())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    assert_eq!(reservations.create_calls.load(Ordering::SeqCst), 0);
    assert_eq!(emails.sent.load(Ordering::SeqCst), 0);
}

#[actix_web::test]
async fn duplicate_reservation_is_conflict() {
    let app = app!(state_with(
        rate_limit(100),
        StubReservations::new(true, CreateOutcome::Duplicate),
        RecordingEmails::new(false),
    ));

    let req = test::TestRequest::post()
        .uri("/api/reservations")
        .set_json(reservation_body())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let body: Value = test::read_body_json(resp).await;
    assert!(body["message"].as_str().unwrap().contains("Ya existe una reserva"));
}

#[actix_web::test]
async fn non_future_reservation_is_bad_request() {
    let app = app!(state_with(
        rate_limit(100),
        StubReservations::new(true, CreateOutcome::InvalidTime),
        RecordingEmails::new(false),
    ));

    let req = test::TestRequest::post()
        .uri("/api/reservations")
        .set_json(reservation_body())
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn invalid_reservation_bodies_are_rejected_with_details() {
    let reservations = StubReservations::new(true, CreateOutcome::Created);
    let app = app!(state_with(
        rate_limit(100),
        reservations.clone(),
        RecordingEmails::new(false),
    ));

    let mut bad_party = reservation_body();
    bad_party["party_size"] = json!(-1);
    let mut bad_email = reservation_body();
    bad_email["email"] = json!("ana");

    for body in [json!({}), bad_party, bad_email] {
        let req = test::TestRequest::post()
            .uri("/api/reservations")
            .set_json(&body)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let json: Value = test::read_body_json(resp).await;
        assert!(json["details"][0]["field"].is_string());
    }
    assert_eq!(reservations.create_calls.load(Ordering::SeqCst), 0);
}

#[actix_web::test]
async fn create_rate_limit_applies_before_validation() {
    let app = app!(state_with(
        rate_limit(1),
        StubReservations::new(true, CreateOutcome::Created),
        RecordingEmails::new(false),
    ));

    let req = test::TestRequest::post()
        .uri("/api/reservations")
        .set_json(json!({}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::post()
        .uri("/api/reservations")
        .set_json(json!({}))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::TOO_MANY_REQUESTS
    );
}

#[actix_web::test]
async fn in_memory_store_end_to_end() {
    let rules = ReservationRules {
        windows: vec![ServiceWindow {
            start: NaiveTime::from_hms_opt(20, 0, 0).unwrap(),
            end: NaiveTime::from_hms_opt(20, 30, 0).unwrap(),
        }],
        slot_interval_minutes: 30,
        max_reservations_per_slot: 1,
        auto_confirm: true,
    };
    let app = app!(state_with(
        rate_limit(100),
        Arc::new(InMemoryReservationService::new(rules)),
        RecordingEmails::new(false),
    ));

    let req = test::TestRequest::post()
        .uri("/api/reservations")
        .set_json(reservation_body())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["reservation"]["status"], "confirmed");

    // La franja de las 20:00 ya está llena
    let req = test::TestRequest::post()
        .uri("/api/reservations")
        .set_json(reservation_body())
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CONFLICT);

    let req = test::TestRequest::get()
        .uri("/api/reservations?date=2099-06-01")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["slots"], json!([{ "time": "20:30", "remaining": 1 }]));

    // Fecha pasada: el servicio rechaza la hora
    let mut past = reservation_body();
    past["reservation_date"] = json!("2001-01-01");
    let req = test::TestRequest::post()
        .uri("/api/reservations")
        .set_json(past)
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Disponibilidad
// ---------------------------------------------------------------------------

#[actix_web::test]
async fn availability_returns_slots() {
    let app = app!(default_state());

    let req = test::TestRequest::get()
        .uri("/api/reservations?date=2024-06-01")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["date"], "2024-06-01");
    assert!(body["slots"].is_array());
    assert_eq!(body["slots"][0]["time"], "20:00");
}

#[actix_web::test]
async fn availability_rejects_missing_or_invalid_date() {
    let app = app!(default_state());

    for uri in [
        "/api/reservations",
        "/api/reservations?date=",
        "/api/reservations?date=2024-13-40",
        "/api/reservations?date=01-06-2024",
    ] {
        let req = test::TestRequest::get().uri(uri).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{uri}");
    }
}

#[actix_web::test]
async fn availability_rate_limit() {
    let app = app!(state_with(
        rate_limit(1),
        StubReservations::new(true, CreateOutcome::Created),
        RecordingEmails::new(false),
    ));

    let req = test::TestRequest::get()
        .uri("/api/reservations?date=2024-06-01")
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = test::TestRequest::get()
        .uri("/api/reservations?date=2024-06-01")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(resp.headers().get("x-ratelimit-remaining").unwrap(), "0");
}

#[actix_web::test]
async fn health_check() {
    let app = app!(default_state());
    let req = test::TestRequest::get().uri("/health").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["status"], "ok");
}
