pub mod api;
pub mod auth;
pub mod config;
pub mod devops;
pub mod error;
pub mod health;
pub mod notifier;
pub mod observability;
pub mod orchestrator;
pub mod probe;
pub mod state;
pub mod state_engine;
pub mod store;
pub mod tls_utils;
pub mod whois;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::BoxError;
use axum::Router;
use axum::error_handling::HandleErrorLayer;
use axum::http::StatusCode;
use axum::http::header::{HeaderName, HeaderValue};
use axum::routing::get;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::normalize_path::NormalizePathLayer;
use tower_http::sensitive_headers::{SetSensitiveRequestHeadersLayer, SetSensitiveResponseHeadersLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::timeout::{RequestBodyTimeoutLayer, TimeoutLayer};
use tower_http::trace::TraceLayer;

use crate::config::Settings;
use crate::state::AppState;
use crate::store::{PgDeliveryRepo, PgUserRepo, PostgresDomainRepo};
use crate::store::notify_config::{PgNotifyConfigRepo, PgTemplateRepo};

/// Start the domain- and certificate-observability core: connect the
/// Postgres store, mount the `/v1/**` façade alongside `/health`,
/// `/health/db`, and `/metrics`, spawn the two periodic sweep loops, and
/// serve over plain HTTP.
///
/// Grounded on the teacher's `run()` (`src/lib.rs`): same hardened
/// tower-http layer stack and DB-connect retry loop, with the manual
/// TLS-terminating `hyper_util` accept loop removed — this core has no
/// counterpart to the teacher's self-served TLS termination
/// (`SPEC_FULL.md` §6) and serves plain HTTP behind whatever TLS-terminating
/// proxy fronts the deployment.
///
/// Returns `Err` on bind or store-initialization failure so `main.rs` can
/// translate that into a non-zero process exit code (`spec.md` §6).
pub async fn run() -> anyhow::Result<()> {
	let obs_state = match crate::observability::init_observability().await {
		Ok(s) => s,
		Err(e) => {
			eprintln!("warning: failed to initialize observability: {e}");
			crate::observability::ObservabilityState::default()
		}
	};

	let settings = Arc::new(crate::config::load()?);

	let pool = connect_with_retry(&settings).await?;
	sqlx::migrate!("./migrations").run(&pool).await?;

	let state = AppState::new(
		Arc::new(PostgresDomainRepo::new(pool.clone())),
		Arc::new(PgNotifyConfigRepo::new(pool.clone())),
		Arc::new(PgTemplateRepo::new(pool.clone())),
		Arc::new(PgUserRepo::new(pool.clone())),
		Arc::new(PgDeliveryRepo::new(pool.clone())),
		settings.clone(),
		obs_state.metrics.clone(),
	);

	crate::orchestrator::spawn_sweep_loops(state.clone());

	let app = Router::new()
		.merge(crate::api::router())
		.route("/health", get(|| async { "OK" }))
		.route("/health/db", get(crate::health::db_health))
		.route("/metrics", get(metrics_handler))
		.with_state(state.clone())
		// Defense-in-depth: normalize paths and add conservative security
		// headers, unchanged from the teacher's layer stack.
		.layer(TraceLayer::new_for_http())
		.layer(NormalizePathLayer::trim_trailing_slash())
		.layer(SetResponseHeaderLayer::if_not_present(
			HeaderName::from_static("strict-transport-security"),
			HeaderValue::from_static("max-age=63072000; includeSubDomains; preload"),
		))
		.layer(SetResponseHeaderLayer::if_not_present(
			HeaderName::from_static("x-frame-options"),
			HeaderValue::from_static("DENY"),
		))
		.layer(SetResponseHeaderLayer::if_not_present(
			HeaderName::from_static("x-content-type-options"),
			HeaderValue::from_static("nosniff"),
		))
		.layer(SetResponseHeaderLayer::if_not_present(
			HeaderName::from_static("referrer-policy"),
			HeaderValue::from_static("strict-origin-when-cross-origin"),
		))
		.layer(SetResponseHeaderLayer::if_not_present(
			HeaderName::from_static("permissions-policy"),
			HeaderValue::from_static("geolocation=(), microphone=()"),
		));

	let req_headers: Arc<[HeaderName]> =
		Arc::from(vec![HeaderName::from_static("authorization"), HeaderName::from_static("cookie")].into_boxed_slice());
	let res_headers: Arc<[HeaderName]> = Arc::from(vec![HeaderName::from_static("set-cookie")].into_boxed_slice());

	// The whole-request timeout needs a `HandleErrorLayer` ahead of it so a
	// `tower::timeout::Elapsed` becomes a 408 response instead of an error
	// type `Router::layer` can't accept; the other layers here pass their
	// own errors straight through (body limiting/timeout act on the body
	// stream, not the service call) and don't need one.
	let app = app
		.layer(CatchPanicLayer::new())
		.layer(RequestBodyLimitLayer::new(10 * 1024 * 1024))
		.layer(RequestBodyTimeoutLayer::new(Duration::from_secs(30)))
		.layer(
			ServiceBuilder::new()
				.layer(HandleErrorLayer::new(handle_request_timeout))
				.layer(TimeoutLayer::new(Duration::from_secs(30))),
		)
		.layer(crate::devops::SharedRateLimitLayer::new(
			settings.rate_limit_burst as usize,
			settings.rate_limit_rps,
		))
		.layer(SetSensitiveRequestHeadersLayer::from_shared(req_headers))
		.layer(SetSensitiveResponseHeadersLayer::from_shared(res_headers));

	let bind_addr: SocketAddr = format!("{}:{}", settings.host, settings.port)
		.parse()
		.map_err(|e| anyhow::anyhow!("invalid listen address {}:{}: {e}", settings.host, settings.port))?;

	let listener = TcpListener::bind(bind_addr)
		.await
		.map_err(|e| anyhow::anyhow!("failed to bind {bind_addr}: {e}"))?;

	tracing::info!(addr = %bind_addr, "heimdall-observe listening");

	axum::serve(listener, app.into_make_service())
		.await
		.map_err(|e| anyhow::anyhow!("server error: {e}"))?;

	Ok(())
}

async fn handle_request_timeout(err: BoxError) -> (StatusCode, String) {
	(StatusCode::REQUEST_TIMEOUT, format!("request timed out: {err}"))
}

async fn metrics_handler(axum::extract::State(state): axum::extract::State<AppState>) -> String {
	state.metrics.encode()
}

async fn connect_with_retry(settings: &Settings) -> anyhow::Result<sqlx::PgPool> {
	let database_url = settings
		.database_url
		.clone()
		.ok_or_else(|| anyhow::anyhow!("DATABASE_URL/HMD_DATABASE_URL must be set"))?;

	let mut last_err = None;
	for attempt in 1..=settings.db_connect_retries {
		match PgPoolOptions::new().max_connections(10).connect(&database_url).await {
			Ok(pool) => return Ok(pool),
			Err(e) => {
				tracing::warn!(attempt, max = settings.db_connect_retries, error = %e, "DB connect attempt failed");
				last_err = Some(e);
				if attempt < settings.db_connect_retries {
					tokio::time::sleep(Duration::from_millis(settings.db_connect_backoff_ms)).await;
				}
			}
		}
	}

	Err(anyhow::anyhow!(
		"failed to connect to database after {} attempts: {}",
		settings.db_connect_retries,
		last_err.map(|e| e.to_string()).unwrap_or_else(|| "unknown error".to_string())
	))
}
