//! Integration tests for the ad-hoc `/v1/scan` endpoint, driven through the
//! real `api::router()` with in-memory mocks (`SPEC_FULL.md` §8). The probe
//! targets below are RFC 5737 TEST-NET-1 addresses, which fail fast and
//! deterministically rather than depending on a reachable host.

#![cfg(feature = "unit-tests")]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use heimdall_observe::auth::issue_token;
use heimdall_observe::config::Settings;
use heimdall_observe::observability::MetricsRegistry;
use heimdall_observe::state::AppState;
use heimdall_observe::store::mock::MockDomainRepo;
use heimdall_observe::store::notify_config::mock::{MockNotifyConfigRepo, MockTemplateRepo};
use heimdall_observe::store::delivery::mock::MockDeliveryRepo;
use heimdall_observe::store::user::mock::MockUserRepo;
use heimdall_observe::store::{NotifyConfigRepo, TemplateRepo};
use serde_json::Value;
use tower::ServiceExt;

fn router_and_token() -> (axum::Router, String) {
	let settings = Arc::new(Settings::default());
	let state = AppState::new(
		Arc::new(MockDomainRepo::new()),
		Arc::new(MockNotifyConfigRepo::default()) as Arc<dyn NotifyConfigRepo>,
		Arc::new(MockTemplateRepo::default()) as Arc<dyn TemplateRepo>,
		Arc::new(MockUserRepo::default()),
		Arc::new(MockDeliveryRepo::default()),
		settings.clone(),
		Arc::new(MetricsRegistry::new()),
	);
	let token = issue_token(uuid::Uuid::new_v4(), "admin", &settings.jwt_secret).unwrap();
	(heimdall_observe::api::router().with_state(state), token)
}

#[tokio::test]
async fn scan_returns_a_result_per_requested_domain() {
	let (app, token) = router_and_token();

	let request = Request::builder()
		.method("GET")
		.uri("/v1/scan?domains=192.0.2.1,192.0.2.2")
		.header(header::AUTHORIZATION, format!("Bearer {token}"))
		.body(Body::empty())
		.unwrap();

	let response = app.oneshot(request).await.unwrap();
	assert_eq!(response.status(), StatusCode::OK);

	let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
	let parsed: Value = serde_json::from_slice(&body).unwrap();
	assert_eq!(parsed["summary"]["total_scanned"], 2);
	assert_eq!(parsed["results"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn scan_rejects_blank_domains_query_with_400() {
	let (app, token) = router_and_token();

	let request = Request::builder()
		.method("GET")
		.uri("/v1/scan?domains=%20%20,%20%20")
		.header(header::AUTHORIZATION, format!("Bearer {token}"))
		.body(Body::empty())
		.unwrap();

	let response = app.oneshot(request).await.unwrap();
	assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn scan_rejects_unauthenticated_requests_with_401() {
	let (app, _token) = router_and_token();

	let request = Request::builder()
		.method("GET")
		.uri("/v1/scan?domains=192.0.2.1")
		.body(Body::empty())
		.unwrap();

	let response = app.oneshot(request).await.unwrap();
	assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
