use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::AppError;
use crate::state::AppState;

/// JWT claims issued by `/v1/auth/login` and validated on every other
/// `/v1/**` route. HS256, secret from `ZENSTACK_JWT_SECRET`
/// (`spec.md` §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
	pub user_id: uuid::Uuid,
	pub role: String,
	pub iat: i64,
	pub exp: i64,
}

/// The authenticated principal for a request, extracted from the bearer
/// token. Grounded on the teacher's `tower-http` middleware-construction
/// style, adapted to an axum extractor since per-request claims are needed
/// inside handler bodies rather than as a blanket `tower::Layer`.
#[derive(Debug, Clone)]
pub struct AuthUser {
	pub user_id: uuid::Uuid,
	pub role: String,
}

impl AuthUser {
	pub fn require_admin(&self) -> Result<(), AppError> {
		if self.role == "admin" {
			Ok(())
		} else {
			Err(AppError::Forbidden("admin role required".to_string()))
		}
	}
}

pub fn issue_token(user_id: uuid::Uuid, role: &str, secret: &str) -> Result<String, AppError> {
	let now = Utc::now().timestamp();
	let claims = Claims {
		user_id,
		role: role.to_string(),
		iat: now,
		exp: now + 24 * 3600,
	};
	encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))
		.map_err(|e| AppError::Internal(anyhow::anyhow!("failed to sign token: {e}")))
}

fn decode_token(token: &str, secret: &str) -> Result<Claims, AppError> {
	let data = decode::<Claims>(
		token,
		&DecodingKey::from_secret(secret.as_bytes()),
		&Validation::new(jsonwebtoken::Algorithm::HS256),
	)
	.map_err(|e| AppError::Auth(format!("invalid token: {e}")))?;
	Ok(data.claims)
}

impl FromRequestParts<AppState> for AuthUser {
	type Rejection = AppError;

	async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
		let header = parts
			.headers
			.get(axum::http::header::AUTHORIZATION)
			.and_then(|v| v.to_str().ok())
			.ok_or_else(|| AppError::Auth("missing Authorization header".to_string()))?;

		let token = header
			.strip_prefix("Bearer ")
			.ok_or_else(|| AppError::Auth("Authorization header must be a Bearer token".to_string()))?;

		let claims = decode_token(token, &state.settings.jwt_secret)?;
		Ok(AuthUser {
			user_id: claims.user_id,
			role: claims.role,
		})
	}
}

/// SHA-256-with-per-user-salt password hashing, matching the teacher's
/// existing `sha2` dependency rather than introducing a heavier
/// `argon2`/`bcrypt` crate for this ambient, non-focal surface
/// (`SPEC_FULL.md` §6).
pub fn hash_password(password: &str, salt: &str) -> String {
	let mut hasher = Sha256::new();
	hasher.update(salt.as_bytes());
	hasher.update(password.as_bytes());
	format!("{:x}", hasher.finalize())
}

pub fn verify_password(password: &str, salt: &str, expected_hash: &str) -> bool {
	hash_password(password, salt) == expected_hash
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn token_round_trips_through_issue_and_decode() {
		let secret = "test-secret";
		let user_id = uuid::Uuid::new_v4();
		let token = issue_token(user_id, "admin", secret).unwrap();
		let claims = decode_token(&token, secret).unwrap();
		assert_eq!(claims.user_id, user_id);
		assert_eq!(claims.role, "admin");
		assert_eq!(claims.exp - claims.iat, 24 * 3600);
	}

	#[test]
	fn decode_rejects_token_signed_with_a_different_secret() {
		let token = issue_token(uuid::Uuid::new_v4(), "user", "secret-a").unwrap();
		assert!(decode_token(&token, "secret-b").is_err());
	}

	#[test]
	fn password_hash_is_salt_sensitive() {
		let h1 = hash_password("hunter2", "salt-a");
		let h2 = hash_password("hunter2", "salt-b");
		assert_ne!(h1, h2);
		assert!(verify_password("hunter2", "salt-a", &h1));
		assert!(!verify_password("wrong", "salt-a", &h1));
	}
}
