//! Integration tests for `/v1/auth/login` and the bearer-token gate it
//! issues tokens for, driven through the real `api::router()` with
//! in-memory mock repositories rather than a live Postgres instance
//! (`SPEC_FULL.md` §8).

#![cfg(feature = "unit-tests")]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use heimdall_observe::auth::hash_password;
use heimdall_observe::config::Settings;
use heimdall_observe::observability::MetricsRegistry;
use heimdall_observe::state::AppState;
use heimdall_observe::store::mock::MockDomainRepo;
use heimdall_observe::store::notify_config::mock::{MockNotifyConfigRepo, MockTemplateRepo};
use heimdall_observe::store::delivery::mock::MockDeliveryRepo;
use heimdall_observe::store::user::User;
use heimdall_observe::store::user::mock::MockUserRepo;
use heimdall_observe::store::{NotifyConfigRepo, TemplateRepo};
use serde_json::{Value, json};
use tower::ServiceExt;

fn seeded_user(username: &str, role: &str, status: &str) -> User {
	let salt = "integration-salt".to_string();
	User {
		id: uuid::Uuid::new_v4(),
		username: username.to_string(),
		password_hash: hash_password("correct horse", &salt),
		password_salt: salt,
		role: role.to_string(),
		status: status.to_string(),
	}
}

fn router_with_users(users: Vec<User>) -> axum::Router {
	let state = AppState::new(
		Arc::new(MockDomainRepo::new()),
		Arc::new(MockNotifyConfigRepo::default()) as Arc<dyn NotifyConfigRepo>,
		Arc::new(MockTemplateRepo::default()) as Arc<dyn TemplateRepo>,
		Arc::new(MockUserRepo::seeded(users)),
		Arc::new(MockDeliveryRepo::default()),
		Arc::new(Settings::default()),
		Arc::new(MetricsRegistry::new()),
	);
	heimdall_observe::api::router().with_state(state)
}

fn login_request(username: &str, password: &str) -> Request<Body> {
	Request::builder()
		.method("POST")
		.uri("/v1/auth/login")
		.header(header::CONTENT_TYPE, "application/json")
		.body(Body::from(
			json!({ "username": username, "password": password }).to_string(),
		))
		.unwrap()
}

#[tokio::test]
async fn login_issues_a_bearer_token_for_correct_credentials() {
	let app = router_with_users(vec![seeded_user("alice", "admin", "active")]);

	let response = app.oneshot(login_request("alice", "correct horse")).await.unwrap();
	assert_eq!(response.status(), StatusCode::OK);

	let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
	let parsed: Value = serde_json::from_slice(&body).unwrap();
	assert_eq!(parsed["username"], "alice");
	assert_eq!(parsed["role"], "admin");
	assert!(parsed["token"].as_str().is_some_and(|t| !t.is_empty()));
}

#[tokio::test]
async fn login_rejects_wrong_password_with_401() {
	let app = router_with_users(vec![seeded_user("alice", "admin", "active")]);

	let response = app.oneshot(login_request("alice", "wrong password")).await.unwrap();
	assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn login_rejects_pending_account_with_403() {
	let app = router_with_users(vec![seeded_user("bob", "user", "pending")]);

	let response = app.oneshot(login_request("bob", "correct horse")).await.unwrap();
	assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn domains_route_rejects_missing_bearer_token_with_401() {
	let app = router_with_users(vec![]);

	let request = Request::builder()
		.method("GET")
		.uri("/v1/domains")
		.body(Body::empty())
		.unwrap();

	let response = app.oneshot(request).await.unwrap();
	assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_route_rejects_non_admin_token_with_403() {
	let user = seeded_user("carol", "user", "active");
	let app = router_with_users(vec![user.clone()]);

	let login_response = app.clone().oneshot(login_request("carol", "correct horse")).await.unwrap();
	assert_eq!(login_response.status(), StatusCode::OK);
	let body = axum::body::to_bytes(login_response.into_body(), usize::MAX).await.unwrap();
	let parsed: Value = serde_json::from_slice(&body).unwrap();
	let token = parsed["token"].as_str().unwrap().to_string();

	let request = Request::builder()
		.method("GET")
		.uri("/v1/admin/notifications/configs")
		.header(header::AUTHORIZATION, format!("Bearer {token}"))
		.body(Body::empty())
		.unwrap();

	let response = app.oneshot(request).await.unwrap();
	assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
