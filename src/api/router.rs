//! API router.
//!
//! Returns a composable `Router` that can be mounted on any axum server.
//! Routes are nested under `/api/`; registration, login, and the one-time
//! token flows are public, everything else sits behind the bearer-token
//! middleware. The WebSocket upgrade lives at `/ws/connect` and is gated
//! by one-time tickets instead.
//!
//! Handlers use `State<ApiContext>`; the middleware reads the same context
//! from an `Extension` layer applied outermost.

use std::sync::Arc;

use axum::routing::{get, patch, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::api::websocket;
use crate::core_state::AppState;

/// Build the API router.
pub fn api_router(state: Arc<AppState>) -> Router {
    build_router(ApiContext::new(state))
}

/// Build the router from a pre-constructed context. Used by tests that
/// need the shared context (e.g. to issue WS tickets directly).
#[cfg(test)]
pub(crate) fn api_router_with_ctx(ctx: ApiContext) -> Router {
    build_router(ctx)
}

fn build_router(ctx: ApiContext) -> Router {
    let public = Router::new()
        .route("/health", get(endpoints::health::check))
        .route("/auth/register", post(endpoints::auth::register))
        .route("/auth/login", post(endpoints::auth::login))
        .route("/auth/refresh", post(endpoints::auth::refresh))
        .route("/auth/verify-email", post(endpoints::auth::verify_email))
        .route("/auth/forgot-password", post(endpoints::auth::forgot_password))
        .route("/auth/reset-password", post(endpoints::auth::reset_password))
        .with_state(ctx.clone());

    let protected = Router::new()
        .route("/auth/logout", post(endpoints::auth::logout))
        .route("/auth/me", get(endpoints::auth::me))
        .route("/auth/ws-ticket", post(endpoints::auth::ws_ticket))
        .route("/users/doctors", get(endpoints::users::doctors))
        .route("/users/search", get(endpoints::users::search))
        .route(
            "/users/:id",
            get(endpoints::users::profile).put(endpoints::users::update),
        )
        .route("/users/:id/active", patch(endpoints::users::set_active))
        .route(
            "/appointments",
            get(endpoints::appointments::list).post(endpoints::appointments::create),
        )
        .route(
            "/appointments/availability",
            get(endpoints::appointments::availability),
        )
        .route("/appointments/:id", get(endpoints::appointments::get))
        .route(
            "/appointments/:id/status",
            patch(endpoints::appointments::update_status),
        )
        .route(
            "/medical-records",
            get(endpoints::medical_records::list).post(endpoints::medical_records::create),
        )
        .route(
            "/medical-records/:id",
            get(endpoints::medical_records::get)
                .put(endpoints::medical_records::update)
                .delete(endpoints::medical_records::delete),
        )
        .route(
            "/medical-records/patient/:id/summary",
            get(endpoints::medical_records::patient_summary),
        )
        .route("/reports/dashboard", get(endpoints::reports::dashboard))
        .route("/reports/appointments", get(endpoints::reports::appointments))
        .route("/reports/revenue", get(endpoints::reports::revenue))
        .route("/reports/users", get(endpoints::reports::users))
        .route("/reports/export", get(endpoints::reports::export))
        .route("/manager/overview", get(endpoints::manager::overview))
        .route("/manager/patient-visits", get(endpoints::manager::patient_visits))
        .route(
            "/manager/staff-utilization",
            get(endpoints::manager::staff_utilization),
        )
        .route("/manager/financial", get(endpoints::manager::financial))
        .route("/chatbot/message", post(endpoints::chatbot::message))
        .route("/chatbot/history", get(endpoints::chatbot::history))
        .route("/chatbot/health-tips", get(endpoints::chatbot::health_tips))
        .route("/chatbot/symptoms/:name", get(endpoints::chatbot::symptom))
        .route(
            "/chatbot/emergency-check",
            post(endpoints::chatbot::emergency_check),
        )
        .route(
            "/payments",
            get(endpoints::payments::list).post(endpoints::payments::create),
        )
        .route("/payments/:id/status", patch(endpoints::payments::update_status))
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::auth::require_auth))
        // Extension must be outermost so the middleware can read the context
        .layer(axum::Extension(ctx.clone()));

    let ws_routes = Router::new()
        .route("/ws/connect", get(websocket::ws_upgrade))
        .with_state(ctx);

    Router::new()
        .nest("/api", public)
        .nest("/api", protected)
        .merge(ws_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use chrono::NaiveDate;
    use tower::ServiceExt;
    use uuid::Uuid;

    use crate::auth;
    use crate::db;
    use crate::mailer::LogMailer;
    use crate::models::*;

    const SEED_PASSWORD: &str = "seeded-password";

    fn test_app() -> (Router, Arc<AppState>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let state = Arc::new(AppState::new(
            dir.path().join("router-test.db"),
            Arc::new(LogMailer),
        ));
        // Run migrations up front so seeding can use the state directly
        state.open_db().unwrap();
        (api_router(state.clone()), state, dir)
    }

    fn seed_user(state: &AppState, profile: RoleProfile, email: &str) -> Uuid {
        let conn = state.open_db().unwrap();
        let now = chrono::Utc::now().naive_utc();
        let mut user = User {
            id: Uuid::new_v4(),
            email: email.into(),
            password_hash: auth::hash_password(SEED_PASSWORD).unwrap(),
            first_name: "Seeded".into(),
            last_name: "User".into(),
            phone: None,
            is_active: true,
            email_verified: true,
            profile,
            created_at: now,
            updated_at: now,
        };
        db::insert_user(&conn, &mut user).unwrap();
        user.id
    }

    fn seed_doctor(state: &AppState, email: &str) -> Uuid {
        seed_user(
            state,
            RoleProfile::Doctor {
                specialization: "General Practice".into(),
                consultation_fee: 100.0,
                department: Some("Outpatient".into()),
            },
            email,
        )
    }

    fn request(method: &str, uri: &str, token: Option<&str>, body: Option<serde_json::Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }
        match body {
            Some(json) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn response_json(response: axum::http::Response<Body>) -> serde_json::Value {
        use http_body_util::BodyExt;
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    fn patient_registration(email: &str) -> serde_json::Value {
        serde_json::json!({
            "email": email,
            "password": "correct-horse",
            "first_name": "Jane",
            "last_name": "Doe",
            "role": "patient",
            "date_of_birth": "1992-07-04",
            "blood_type": "O-"
        })
    }

    async fn register_and_login(app: &Router, email: &str) -> String {
        let response = app
            .clone()
            .oneshot(request(
                "POST",
                "/api/auth/register",
                None,
                Some(patient_registration(email)),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        login(app, email, "correct-horse").await
    }

    async fn login(app: &Router, email: &str, password: &str) -> String {
        let response = app
            .clone()
            .oneshot(request(
                "POST",
                "/api/auth/login",
                None,
                Some(serde_json::json!({"email": email, "password": password})),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = response_json(response).await;
        json["data"]["access_token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn health_is_public() {
        let (app, _state, _dir) = test_app();
        let response = app
            .oneshot(request("GET", "/api/health", None, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = response_json(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["status"], "ok");
    }

    #[tokio::test]
    async fn protected_routes_require_auth() {
        let (app, _state, _dir) = test_app();
        for uri in [
            "/api/auth/me",
            "/api/appointments",
            "/api/medical-records",
            "/api/reports/dashboard",
        ] {
            let response = app
                .clone()
                .oneshot(request("GET", uri, None, None))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
            let json = response_json(response).await;
            assert_eq!(json["success"], false);
        }
    }

    #[tokio::test]
    async fn invalid_token_rejected() {
        let (app, _state, _dir) = test_app();
        let response = app
            .oneshot(request("GET", "/api/auth/me", Some("garbage"), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let (app, _state, _dir) = test_app();
        let response = app
            .oneshot(request("GET", "/api/nonexistent", None, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn register_login_me_flow() {
        let (app, _state, _dir) = test_app();
        let token = register_and_login(&app, "jane@x.com").await;

        let response = app
            .oneshot(request("GET", "/api/auth/me", Some(&token), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = response_json(response).await;
        assert_eq!(json["data"]["email"], "jane@x.com");
        assert_eq!(json["data"]["role"], "patient");
        // Health card assigned on first save, never exposed as credential data
        assert!(json["data"]["health_card_id"].as_str().unwrap().starts_with("HC-"));
        assert!(json["data"].get("password_hash").is_none());
    }

    #[tokio::test]
    async fn duplicate_email_returns_field_errors() {
        let (app, _state, _dir) = test_app();
        register_and_login(&app, "jane@x.com").await;

        let response = app
            .oneshot(request(
                "POST",
                "/api/auth/register",
                None,
                Some(patient_registration("jane@x.com")),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = response_json(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["errors"][0]["field"], "email");
    }

    #[tokio::test]
    async fn logout_invalidates_token() {
        let (app, _state, _dir) = test_app();
        let token = register_and_login(&app, "jane@x.com").await;

        let response = app
            .clone()
            .oneshot(request("POST", "/api/auth/logout", Some(&token), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(request("GET", "/api/auth/me", Some(&token), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn booking_scenario_over_http() {
        let (app, state, _dir) = test_app();
        let doctor = seed_doctor(&state, "doctor@x.com");
        let token = register_and_login(&app, "jane@x.com").await;

        let book = |time: &str| {
            serde_json::json!({
                "doctor_id": doctor.to_string(),
                "date": "2025-02-01",
                "start_time": time,
                "duration_minutes": 30
            })
        };

        let response = app
            .clone()
            .oneshot(request("POST", "/api/appointments", Some(&token), Some(book("10:00:00"))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = response_json(response).await;
        assert_eq!(json["data"]["status"], "scheduled");

        // Overlapping slot rejected with the conflict message
        let response = app
            .clone()
            .oneshot(request("POST", "/api/appointments", Some(&token), Some(book("10:15:00"))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = response_json(response).await;
        assert_eq!(json["error"], "The requested slot is unavailable");

        // Back-to-back slot accepted
        let response = app
            .clone()
            .oneshot(request("POST", "/api/appointments", Some(&token), Some(book("10:30:00"))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        // Patient's list shows both bookings with participant names
        let response = app
            .oneshot(request("GET", "/api/appointments", Some(&token), None))
            .await
            .unwrap();
        let json = response_json(response).await;
        assert_eq!(json["data"].as_array().unwrap().len(), 2);
        assert!(json["data"][0]["doctor_name"].is_string());
    }

    #[tokio::test]
    async fn availability_reflects_bookings() {
        let (app, state, _dir) = test_app();
        let doctor = seed_doctor(&state, "doctor@x.com");
        let token = register_and_login(&app, "jane@x.com").await;

        let uri = format!("/api/appointments/availability?doctor_id={doctor}&date=2025-02-01");
        let response = app
            .clone()
            .oneshot(request("GET", &uri, Some(&token), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = response_json(response).await;
        assert_eq!(json["data"].as_array().unwrap().len(), 16);
    }

    #[tokio::test]
    async fn staff_cannot_view_user_report() {
        let (app, state, _dir) = test_app();
        seed_user(
            &state,
            RoleProfile::Staff {
                department: "Front desk".into(),
            },
            "staff@x.com",
        );
        let token = login(&app, "staff@x.com", SEED_PASSWORD).await;

        let response = app
            .oneshot(request("GET", "/api/reports/users", Some(&token), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let json = response_json(response).await;
        assert_eq!(json["success"], false);
    }

    #[tokio::test]
    async fn admin_views_user_report() {
        let (app, state, _dir) = test_app();
        seed_user(&state, RoleProfile::Admin, "admin@x.com");
        register_and_login(&app, "jane@x.com").await;
        let token = login(&app, "admin@x.com", SEED_PASSWORD).await;

        let response = app
            .oneshot(request("GET", "/api/reports/users", Some(&token), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = response_json(response).await;
        assert!(json["data"]["total_users"].as_u64().unwrap() >= 2);
    }

    #[tokio::test]
    async fn patient_cannot_create_medical_record() {
        let (app, state, _dir) = test_app();
        let token = register_and_login(&app, "jane@x.com").await;
        let conn = state.open_db().unwrap();
        let patient = db::get_user_by_email(&conn, "jane@x.com").unwrap().unwrap();
        drop(conn);

        let response = app
            .oneshot(request(
                "POST",
                "/api/medical-records",
                Some(&token),
                Some(serde_json::json!({
                    "patient_id": patient.id.to_string(),
                    "record_type": "consultation",
                    "title": "Self-diagnosis"
                })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn record_flow_with_audit_trail() {
        let (app, state, _dir) = test_app();
        seed_doctor(&state, "doctor@x.com");
        let doctor_token = login(&app, "doctor@x.com", SEED_PASSWORD).await;
        let patient_token = register_and_login(&app, "jane@x.com").await;
        let conn = state.open_db().unwrap();
        let patient = db::get_user_by_email(&conn, "jane@x.com").unwrap().unwrap();
        drop(conn);

        let response = app
            .clone()
            .oneshot(request(
                "POST",
                "/api/medical-records",
                Some(&doctor_token),
                Some(serde_json::json!({
                    "patient_id": patient.id.to_string(),
                    "record_type": "consultation",
                    "title": "Annual physical",
                    "diagnosis": "Healthy"
                })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let record_id = response_json(response).await["data"]["id"]
            .as_str()
            .unwrap()
            .to_string();

        // Owner patient reads their record
        let response = app
            .clone()
            .oneshot(request(
                "GET",
                &format!("/api/medical-records/{record_id}"),
                Some(&patient_token),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        // One audit row for the create, one for the read
        let conn = state.open_db().unwrap();
        let trail =
            db::list_audit_for_resource(&conn, AuditResource::MedicalRecord, &record_id).unwrap();
        assert_eq!(trail.len(), 2);
        assert_eq!(trail[0].action, AuditAction::Create);
        assert_eq!(trail[1].action, AuditAction::Read);
    }

    #[tokio::test]
    async fn chatbot_classifies_over_http() {
        let (app, _state, _dir) = test_app();
        let token = register_and_login(&app, "jane@x.com").await;

        let response = app
            .clone()
            .oneshot(request(
                "POST",
                "/api/chatbot/message",
                Some(&token),
                Some(serde_json::json!({"message": "I'm having chest pain"})),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = response_json(response).await;
        assert_eq!(json["data"]["kind"], "emergency");
        assert_eq!(json["data"]["priority"], "critical");
        assert!(json["data"]["actions"]
            .as_array()
            .unwrap()
            .contains(&serde_json::json!("call911")));

        let response = app
            .oneshot(request(
                "POST",
                "/api/chatbot/message",
                Some(&token),
                Some(serde_json::json!({"message": "I have a severe headache"})),
            ))
            .await
            .unwrap();
        let json = response_json(response).await;
        assert_eq!(json["data"]["kind"], "symptom");
        assert!(json["data"]["message"].as_str().unwrap().contains("headache"));
    }

    #[tokio::test]
    async fn ws_ticket_issued_for_authenticated_user() {
        let (app, _state, _dir) = test_app();
        let token = register_and_login(&app, "jane@x.com").await;

        let response = app
            .oneshot(request("POST", "/api/auth/ws-ticket", Some(&token), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = response_json(response).await;
        assert!(!json["data"]["ticket"].as_str().unwrap().is_empty());
        assert_eq!(json["data"]["expires_in"], 30);
    }

    #[tokio::test]
    async fn doctor_directory_lists_seeded_doctor() {
        let (app, state, _dir) = test_app();
        seed_doctor(&state, "doctor@x.com");
        let token = register_and_login(&app, "jane@x.com").await;

        let response = app
            .oneshot(request("GET", "/api/users/doctors", Some(&token), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = response_json(response).await;
        assert_eq!(json["data"][0]["specialization"], "General Practice");
    }

    #[tokio::test]
    async fn patient_cannot_search_users() {
        let (app, _state, _dir) = test_app();
        let token = register_and_login(&app, "jane@x.com").await;

        let response = app
            .oneshot(request("GET", "/api/users/search?q=jane", Some(&token), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn deactivated_account_loses_access() {
        let (app, state, _dir) = test_app();
        seed_user(&state, RoleProfile::Admin, "admin@x.com");
        let admin_token = login(&app, "admin@x.com", SEED_PASSWORD).await;
        let patient_token = register_and_login(&app, "jane@x.com").await;
        let conn = state.open_db().unwrap();
        let patient = db::get_user_by_email(&conn, "jane@x.com").unwrap().unwrap();
        drop(conn);

        // Staff-level callers cannot manage accounts; only admin can
        let response = app
            .clone()
            .oneshot(request(
                "PATCH",
                &format!("/api/users/{}/active", patient.id),
                Some(&patient_token),
                Some(serde_json::json!({"is_active": false})),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = app
            .clone()
            .oneshot(request(
                "PATCH",
                &format!("/api/users/{}/active", patient.id),
                Some(&admin_token),
                Some(serde_json::json!({"is_active": false})),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        // The disabled account can neither use its token nor log back in
        let response = app
            .clone()
            .oneshot(request("GET", "/api/auth/me", Some(&patient_token), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = app
            .oneshot(request(
                "POST",
                "/api/auth/login",
                None,
                Some(serde_json::json!({"email": "jane@x.com", "password": "correct-horse"})),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn payment_recorded_and_listed_for_patient() {
        let (app, state, _dir) = test_app();
        seed_user(
            &state,
            RoleProfile::Staff {
                department: "Billing".into(),
            },
            "staff@x.com",
        );
        let staff_token = login(&app, "staff@x.com", SEED_PASSWORD).await;
        let patient_token = register_and_login(&app, "jane@x.com").await;
        let conn = state.open_db().unwrap();
        let patient = db::get_user_by_email(&conn, "jane@x.com").unwrap().unwrap();
        drop(conn);

        let response = app
            .clone()
            .oneshot(request(
                "POST",
                "/api/payments",
                Some(&staff_token),
                Some(serde_json::json!({
                    "patient_id": patient.id.to_string(),
                    "amount": 120.0,
                    "method": "card",
                    "description": "Consultation fee"
                })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        // The patient sees their own payment even with a foreign filter
        let response = app
            .oneshot(request(
                "GET",
                &format!("/api/payments?patient_id={}", Uuid::new_v4()),
                Some(&patient_token),
                None,
            ))
            .await
            .unwrap();
        let json = response_json(response).await;
        assert_eq!(json["data"].as_array().unwrap().len(), 1);
        assert_eq!(json["data"][0]["status"], "pending");
    }
}
