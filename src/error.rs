use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

/// Error kinds surfaced across probe, store, notifier, and façade boundaries.
///
/// Probe- and notifier-layer failures are folded into observations rather
/// than raised through this type (see `spec.md` §7); `AppError` exists for
/// the store, auth, and façade boundaries where a failure really must
/// short-circuit the caller.
#[derive(Debug, Error)]
pub enum AppError {
	#[error("validation error: {0}")]
	Validation(String),

	#[error("unauthorized: {0}")]
	Auth(String),

	#[error("forbidden: {0}")]
	Forbidden(String),

	#[error("not found: {0}")]
	NotFound(String),

	#[error("conflict: {0}")]
	Conflict(String),

	#[error("upstream failure: {0}")]
	Upstream(String),

	#[error("store unavailable: {0}")]
	StoreUnavailable(#[from] sqlx::Error),

	#[error("internal error: {0}")]
	Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
	fn into_response(self) -> Response {
		let (status, details) = match &self {
			AppError::Validation(d) => (StatusCode::BAD_REQUEST, Some(d.clone())),
			AppError::Auth(d) => (StatusCode::UNAUTHORIZED, Some(d.clone())),
			AppError::Forbidden(d) => (StatusCode::FORBIDDEN, Some(d.clone())),
			AppError::NotFound(d) => (StatusCode::NOT_FOUND, Some(d.clone())),
			AppError::Conflict(d) => (StatusCode::CONFLICT, Some(d.clone())),
			AppError::Upstream(d) => (StatusCode::BAD_GATEWAY, Some(d.clone())),
			AppError::StoreUnavailable(e) => (StatusCode::INTERNAL_SERVER_ERROR, Some(e.to_string())),
			AppError::Internal(e) => (StatusCode::INTERNAL_SERVER_ERROR, Some(e.to_string())),
		};

		let body = Json(json!({
			"error": self.to_string(),
			"details": details,
		}));

		(status, body).into_response()
	}
}
