// Route-level tests: real router, real auth middleware, in-memory backends.
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use appointment_cell::cache::InMemoryAppointmentCache;
use appointment_cell::identity::InMemoryIdentityDirectory;
use appointment_cell::store::InMemoryAppointmentStore;
use appointment_cell::{appointment_routes, AppointmentCellState, SchedulingService};
use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};

struct TestApp {
    router: Router,
    secret: String,
    patient: TestUser,
    doctor: TestUser,
    patient_id: Uuid,
    doctor_id: Uuid,
    directory: Arc<InMemoryIdentityDirectory>,
}

impl TestApp {
    async fn spawn() -> Self {
        let config = TestConfig::default();
        let secret = config.jwt_secret.clone();

        let patient = TestUser::new("patient@example.com", "patient");
        let doctor = TestUser::new("doctor@example.com", "doctor");

        let directory = Arc::new(InMemoryIdentityDirectory::new());
        let patient_id = Uuid::new_v4();
        let doctor_id = Uuid::new_v4();
        directory.add_patient(patient_id, &patient.id).await;
        directory.add_doctor(doctor_id, &doctor.id).await;

        let scheduling = Arc::new(SchedulingService::new(
            Arc::new(InMemoryAppointmentStore::new()),
            Arc::new(InMemoryAppointmentCache::new()),
            directory.clone(),
        ));
        let router = appointment_routes(AppointmentCellState::new(config.to_arc(), scheduling));

        Self {
            router,
            secret,
            patient,
            doctor,
            patient_id,
            doctor_id,
            directory,
        }
    }

    fn token_for(&self, user: &TestUser) -> String {
        JwtTestUtils::create_token(user, &self.secret)
    }

    async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }

        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    async fn book(&self, token: &str, body: Value) -> (StatusCode, Value) {
        self.send("POST", "/", Some(token), Some(body)).await
    }
}

fn tomorrow_at(hour: u32, minute: u32) -> DateTime<Utc> {
    (Utc::now() + Duration::days(1))
        .date_naive()
        .and_hms_opt(hour, minute, 0)
        .unwrap()
        .and_utc()
}

fn booking_body(patient_id: Uuid, doctor_id: Uuid, start: DateTime<Utc>) -> Value {
    json!({
        "patientId": patient_id,
        "doctorId": doctor_id,
        "scheduledAt": start,
        "reason": "annual checkup",
    })
}

#[tokio::test]
async fn requests_without_a_token_are_unauthorized() {
    let app = TestApp::spawn().await;

    let (status, _) = app.send("GET", "/", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn expired_tokens_are_unauthorized() {
    let app = TestApp::spawn().await;
    let token = JwtTestUtils::create_expired_token(&app.patient, &app.secret);

    let (status, _) = app.send("GET", "/", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn patient_books_an_appointment() {
    let app = TestApp::spawn().await;
    let token = app.token_for(&app.patient);

    let (status, body) = app
        .book(&token, booking_body(app.patient_id, app.doctor_id, tomorrow_at(10, 0)))
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "SCHEDULED");
    assert_eq!(body["type"], "IN_PERSON");
    assert_eq!(body["duration"], 30);
    assert_eq!(body["patientId"], json!(app.patient_id));
}

#[tokio::test]
async fn booking_for_someone_else_is_forbidden() {
    let app = TestApp::spawn().await;
    let other_patient_id = Uuid::new_v4();
    app.directory.add_patient(other_patient_id, "someone-else").await;
    let token = app.token_for(&app.patient);

    let (status, body) = app
        .book(&token, booking_body(other_patient_id, app.doctor_id, tomorrow_at(10, 0)))
        .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn double_booking_returns_conflict() {
    let app = TestApp::spawn().await;
    let token = app.token_for(&app.patient);
    let body = booking_body(app.patient_id, app.doctor_id, tomorrow_at(10, 0));

    let (status, _) = app.book(&token, body.clone()).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = app.book(&token, body).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn booking_with_an_unknown_doctor_is_not_found() {
    let app = TestApp::spawn().await;
    let token = app.token_for(&app.patient);

    let (status, _) = app
        .book(&token, booking_body(app.patient_id, Uuid::new_v4(), tomorrow_at(10, 0)))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn booking_in_the_past_is_a_bad_request() {
    let app = TestApp::spawn().await;
    let token = app.token_for(&app.patient);

    let (status, _) = app
        .book(
            &token,
            booking_body(app.patient_id, app.doctor_id, Utc::now() - Duration::hours(2)),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn strangers_cannot_read_an_appointment() {
    let app = TestApp::spawn().await;
    let owner_token = app.token_for(&app.patient);

    let (_, created) = app
        .book(&owner_token, booking_body(app.patient_id, app.doctor_id, tomorrow_at(10, 0)))
        .await;
    let uri = format!("/{}", created["id"].as_str().unwrap());

    let stranger = TestUser::new("stranger@example.com", "patient");
    app.directory.add_patient(Uuid::new_v4(), &stranger.id).await;
    let stranger_token = app.token_for(&stranger);

    let (status, _) = app.send("GET", &uri, Some(&stranger_token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.send("GET", &uri, Some(&owner_token), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn cancelling_twice_is_a_bad_request() {
    let app = TestApp::spawn().await;
    let token = app.token_for(&app.patient);

    let (_, created) = app
        .book(&token, booking_body(app.patient_id, app.doctor_id, tomorrow_at(10, 0)))
        .await;
    let uri = format!("/{}/cancel", created["id"].as_str().unwrap());
    let reason = json!({ "reason": "schedule conflict" });

    let (status, body) = app.send("PATCH", &uri, Some(&token), Some(reason.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "CANCELLED");
    assert_eq!(body["cancelReason"], "schedule conflict");

    let (status, _) = app.send("PATCH", &uri, Some(&token), Some(reason)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn confirm_and_complete_are_doctor_operations() {
    let app = TestApp::spawn().await;
    let patient_token = app.token_for(&app.patient);
    let doctor_token = app.token_for(&app.doctor);

    let (_, created) = app
        .book(&patient_token, booking_body(app.patient_id, app.doctor_id, tomorrow_at(10, 0)))
        .await;
    let id = created["id"].as_str().unwrap().to_string();

    let (status, _) = app
        .send("PATCH", &format!("/{id}/confirm"), Some(&patient_token), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .send("PATCH", &format!("/{id}/confirm"), Some(&doctor_token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "CONFIRMED");

    let (status, body) = app
        .send(
            "PATCH",
            &format!("/{id}/complete"),
            Some(&doctor_token),
            Some(json!({ "notes": "patient doing well" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "COMPLETED");
    assert_eq!(body["notes"], "patient doing well");
}

#[tokio::test]
async fn rescheduling_through_put_keeps_other_fields() {
    let app = TestApp::spawn().await;
    let token = app.token_for(&app.patient);

    let (_, created) = app
        .book(&token, booking_body(app.patient_id, app.doctor_id, tomorrow_at(10, 0)))
        .await;
    let uri = format!("/{}", created["id"].as_str().unwrap());

    let (status, body) = app
        .send(
            "PUT",
            &uri,
            Some(&token),
            Some(json!({ "scheduledAt": tomorrow_at(15, 0) })),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["scheduledAt"], json!(tomorrow_at(15, 0)));
    assert_eq!(body["reason"], "annual checkup");
}

#[tokio::test]
async fn availability_lists_the_working_day() {
    let app = TestApp::spawn().await;
    let token = app.token_for(&app.patient);
    let date = (Utc::now() + Duration::days(1)).date_naive();

    app.book(&token, booking_body(app.patient_id, app.doctor_id, tomorrow_at(9, 0)))
        .await;

    let uri = format!("/availability/{}?date={}", app.doctor_id, date);
    let (status, body) = app.send("GET", &uri, Some(&token), None).await;

    assert_eq!(status, StatusCode::OK);
    let slots = body["slots"].as_array().unwrap();
    assert_eq!(slots.len(), 16);
    assert_eq!(slots[0]["available"], false);
    assert_eq!(slots[1]["available"], true);

    let uri = format!("/availability/{}?date={}", Uuid::new_v4(), date);
    let (status, _) = app.send("GET", &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn listing_returns_only_the_callers_appointments() {
    let app = TestApp::spawn().await;
    let token = app.token_for(&app.patient);

    app.book(&token, booking_body(app.patient_id, app.doctor_id, tomorrow_at(10, 0)))
        .await;

    let other = TestUser::new("other@example.com", "patient");
    let other_id = Uuid::new_v4();
    app.directory.add_patient(other_id, &other.id).await;
    let other_token = app.token_for(&other);
    app.book(&other_token, booking_body(other_id, app.doctor_id, tomorrow_at(11, 0)))
        .await;

    let (status, body) = app.send("GET", "/", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"][0]["patientId"], json!(app.patient_id));
}
