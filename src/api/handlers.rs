use std::collections::BTreeMap;

use axum::Json;
use axum::extract::{Path, Query, State};
use chrono::{Datelike, Utc};
use uuid::Uuid;

use crate::api::dto::*;
use crate::auth::{AuthUser, hash_password, issue_token, verify_password};
use crate::error::AppError;
use crate::notifier::channels::send_telegram;
use crate::notifier::model::{MessageTemplate, NotificationConfig, NotificationPlatform};
use crate::orchestrator::scan_adhoc;
use crate::state::AppState;
use crate::store::{DomainFilter, DomainOrder};

/// `POST /v1/auth/login`. Unauthenticated — the one `/v1/**` route that
/// doesn't take `AuthUser` (`spec.md` §6).
pub async fn login(
	State(state): State<AppState>,
	Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
	let user = state
		.user_repo
		.get_by_username(&req.username)
		.await
		.map_err(AppError::Internal)?
		.ok_or_else(|| AppError::Auth("invalid username or password".to_string()))?;

	match user.status.as_str() {
		"pending" => return Err(AppError::Forbidden("Account pending approval".to_string())),
		"disabled" => return Err(AppError::Forbidden("Account disabled".to_string())),
		_ => {}
	}

	if !verify_password(&req.password, &user.password_salt, &user.password_hash) {
		return Err(AppError::Auth("invalid username or password".to_string()));
	}

	let token = issue_token(user.id, &user.role, &state.settings.jwt_secret)?;
	Ok(Json(LoginResponse {
		token,
		username: user.username,
		role: user.role,
	}))
}

/// `GET /v1/scan?domains=a,b,c`. Runs an ad-hoc scan (`spec.md` §4.4) and
/// upserts every result into the monitored set (Open Question resolution,
/// `SPEC_FULL.md` §9.3).
pub async fn scan(
	State(state): State<AppState>,
	_auth: AuthUser,
	Query(q): Query<ScanQuery>,
) -> Result<Json<ScanResponse>, AppError> {
	let names: Vec<String> = q
		.domains
		.split(',')
		.map(|s| s.trim().to_string())
		.filter(|s| !s.is_empty())
		.collect();

	if names.is_empty() {
		return Err(AppError::Validation(
			"domains query parameter must list at least one name".to_string(),
		));
	}

	let raw = scan_adhoc(&state, names).await;
	let total_scanned = raw.len();
	let at_risk = raw
		.iter()
		.filter(|r| r.status.map(|s| s.at_risk()).unwrap_or(false))
		.count();

	let results = raw
		.into_iter()
		.map(|r| ScanResultDto {
			domain_name: r.name,
			status: r.status.map(|s| s.as_str()),
			expiry_date: r.expiry.map(|e| e.to_rfc3339()),
			expiry_date_human: r.expiry.map(|e| e.format("%Y-%m-%d").to_string()),
			days_remaining: r.days_remaining,
			issuer: r.issuer_org,
			registrar: r.registrar,
			domain_expiry_date: r.registrar_expiry.map(|e| e.to_rfc3339()),
			name_servers: r.nameservers,
		})
		.collect();

	Ok(Json(ScanResponse {
		results,
		summary: ScanSummary { total_scanned, at_risk },
	}))
}

/// `GET /v1/domains`. Lists the live (non-soft-deleted) monitored set.
pub async fn list_domains(
	State(state): State<AppState>,
	_auth: AuthUser,
) -> Result<Json<Vec<DomainDto>>, AppError> {
	let rows = state
		.repo
		.list(DomainFilter::default(), DomainOrder::default())
		.await
		.map_err(AppError::Internal)?;
	Ok(Json(rows.into_iter().map(DomainDto::from).collect()))
}

pub async fn set_auto_renew(
	State(state): State<AppState>,
	_auth: AuthUser,
	Path(id): Path<Uuid>,
	Json(req): Json<AutoRenewRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
	state
		.repo
		.set_auto_renew(id, req.auto_renew)
		.await
		.map_err(AppError::Internal)?;
	Ok(Json(serde_json::json!({ "id": id, "auto_renew": req.auto_renew })))
}

/// `GET /v1/dashboard/stats`. Aggregated entirely from the current
/// `DomainRepo::list` snapshot — no separate materialized-stats store.
pub async fn dashboard_stats(
	State(state): State<AppState>,
	_auth: AuthUser,
) -> Result<Json<DashboardStats>, AppError> {
	let rows = state
		.repo
		.list(DomainFilter::default(), DomainOrder::default())
		.await
		.map_err(AppError::Internal)?;

	let total_domains = rows.len();
	let ssl_critical = rows
		.iter()
		.filter(|d| d.tls.status == Some(crate::store::TlsStatus::Critical))
		.count();
	let ssl_warning = rows
		.iter()
		.filter(|d| d.tls.status == Some(crate::store::TlsStatus::Warning))
		.count();
	let live_count = rows.iter().filter(|d| d.http.is_live == Some(true)).count();
	let sites_down = rows.iter().filter(|d| d.http.is_live == Some(false)).count();
	let global_availability = if total_domains == 0 {
		0.0
	} else {
		(live_count as f64 / total_domains as f64) * 100.0
	};

	let mut suffix_distribution: BTreeMap<String, usize> = BTreeMap::new();
	for d in &rows {
		let suffix = addr::parse_domain_name(&d.name)
			.ok()
			.and_then(|n| n.suffix().map(|s| s.to_string()))
			.unwrap_or_else(|| "unknown".to_string());
		*suffix_distribution.entry(suffix).or_insert(0) += 1;
	}

	let now = Utc::now();
	let mut monthly_expiry: BTreeMap<String, usize> = BTreeMap::new();
	for i in 0..12 {
		let month_date = add_months(now, i);
		monthly_expiry.insert(format!("{:04}-{:02}", month_date.year(), month_date.month()), 0);
	}
	for d in &rows {
		if let Some(expiry) = d.tls.not_after {
			if expiry >= now && expiry < add_months(now, 12) {
				let key = format!("{:04}-{:02}", expiry.year(), expiry.month());
				if let Some(count) = monthly_expiry.get_mut(&key) {
					*count += 1;
				}
			}
		}
	}

	Ok(Json(DashboardStats {
		total_domains,
		ssl_critical,
		ssl_warning,
		project_count: 0,
		global_availability,
		sites_down,
		suffix_distribution,
		monthly_expiry,
	}))
}

fn add_months(from: chrono::DateTime<Utc>, months: i32) -> chrono::DateTime<Utc> {
	let total = from.year() * 12 + (from.month0() as i32) + months;
	let year = total.div_euclid(12);
	let month0 = total.rem_euclid(12) as u32;
	from.with_year(year)
		.and_then(|d| d.with_month0(month0))
		.unwrap_or(from)
}

// --- Admin: notification configs -------------------------------------------

pub async fn list_notification_configs(
	State(state): State<AppState>,
	auth: AuthUser,
) -> Result<Json<Vec<NotificationConfig>>, AppError> {
	auth.require_admin()?;
	let rows = state.notify_repo.list().await.map_err(AppError::Internal)?;
	Ok(Json(rows.into_iter().filter(|c| c.platform != NotificationPlatform::Telegram).collect()))
}

pub async fn create_notification_config(
	State(state): State<AppState>,
	auth: AuthUser,
	Json(req): Json<NotificationConfigRequest>,
) -> Result<Json<NotificationConfig>, AppError> {
	auth.require_admin()?;
	let cfg = req.into_config(Uuid::new_v4());
	let created = state.notify_repo.create(cfg).await.map_err(AppError::Internal)?;
	Ok(Json(created))
}

pub async fn update_notification_config(
	State(state): State<AppState>,
	auth: AuthUser,
	Path(id): Path<Uuid>,
	Json(req): Json<NotificationConfigRequest>,
) -> Result<Json<NotificationConfig>, AppError> {
	auth.require_admin()?;
	state
		.notify_repo
		.get(id)
		.await
		.map_err(AppError::Internal)?
		.ok_or_else(|| AppError::NotFound(format!("notification config {id} not found")))?;
	let updated = state
		.notify_repo
		.update(req.into_config(id))
		.await
		.map_err(AppError::Internal)?;
	Ok(Json(updated))
}

pub async fn delete_notification_config(
	State(state): State<AppState>,
	auth: AuthUser,
	Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
	auth.require_admin()?;
	state.notify_repo.delete(id).await.map_err(AppError::Internal)?;
	Ok(Json(serde_json::json!({ "id": id, "deleted": true })))
}

// --- Admin: message templates -----------------------------------------------

pub async fn list_templates(
	State(state): State<AppState>,
	auth: AuthUser,
) -> Result<Json<Vec<MessageTemplate>>, AppError> {
	auth.require_admin()?;
	let rows = state.template_repo.list().await.map_err(AppError::Internal)?;
	Ok(Json(rows))
}

pub async fn create_template(
	State(state): State<AppState>,
	auth: AuthUser,
	Json(req): Json<MessageTemplateRequest>,
) -> Result<Json<MessageTemplate>, AppError> {
	auth.require_admin()?;
	let tmpl = MessageTemplate {
		id: Uuid::new_v4(),
		event_name: req.event_name,
		title_tmpl: req.title_tmpl,
		body_tmpl: req.body_tmpl,
		text_tmpl: req.text_tmpl,
	};
	let created = state.template_repo.create(tmpl).await.map_err(AppError::Internal)?;
	Ok(Json(created))
}

pub async fn update_template(
	State(state): State<AppState>,
	auth: AuthUser,
	Path(id): Path<Uuid>,
	Json(req): Json<MessageTemplateRequest>,
) -> Result<Json<MessageTemplate>, AppError> {
	auth.require_admin()?;
	let tmpl = MessageTemplate {
		id,
		event_name: req.event_name,
		title_tmpl: req.title_tmpl,
		body_tmpl: req.body_tmpl,
		text_tmpl: req.text_tmpl,
	};
	let updated = state.template_repo.update(tmpl).await.map_err(AppError::Internal)?;
	Ok(Json(updated))
}

pub async fn delete_template(
	State(state): State<AppState>,
	auth: AuthUser,
	Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
	auth.require_admin()?;
	state.template_repo.delete(id).await.map_err(AppError::Internal)?;
	Ok(Json(serde_json::json!({ "id": id, "deleted": true })))
}

// --- Admin: Telegram configs -------------------------------------------------
//
// Telegram configs are plain `NotificationConfig` rows with
// `platform = Telegram`, `endpoint = bot token`, `secret = chat_id`
// (`notifier::channels::send_telegram`'s documented convention). This
// surface filters/tags that convention rather than adding Telegram-specific
// schema.

pub async fn list_telegram_configs(
	State(state): State<AppState>,
	auth: AuthUser,
) -> Result<Json<Vec<NotificationConfig>>, AppError> {
	auth.require_admin()?;
	let rows = state.notify_repo.list().await.map_err(AppError::Internal)?;
	Ok(Json(rows.into_iter().filter(|c| c.platform == NotificationPlatform::Telegram).collect()))
}

pub async fn create_telegram_config(
	State(state): State<AppState>,
	auth: AuthUser,
	Json(req): Json<TelegramConfigRequest>,
) -> Result<Json<NotificationConfig>, AppError> {
	auth.require_admin()?;
	let cfg = NotificationConfig {
		id: Uuid::new_v4(),
		platform: NotificationPlatform::Telegram,
		endpoint: req.bot_token,
		secret: Some(req.chat_id),
		active: req.active,
	};
	let created = state.notify_repo.create(cfg).await.map_err(AppError::Internal)?;
	Ok(Json(created))
}

pub async fn update_telegram_config(
	State(state): State<AppState>,
	auth: AuthUser,
	Path(id): Path<Uuid>,
	Json(req): Json<TelegramConfigRequest>,
) -> Result<Json<NotificationConfig>, AppError> {
	auth.require_admin()?;
	let cfg = NotificationConfig {
		id,
		platform: NotificationPlatform::Telegram,
		endpoint: req.bot_token,
		secret: Some(req.chat_id),
		active: req.active,
	};
	let updated = state.notify_repo.update(cfg).await.map_err(AppError::Internal)?;
	Ok(Json(updated))
}

pub async fn delete_telegram_config(
	State(state): State<AppState>,
	auth: AuthUser,
	Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
	auth.require_admin()?;
	state.notify_repo.delete(id).await.map_err(AppError::Internal)?;
	Ok(Json(serde_json::json!({ "id": id, "deleted": true })))
}

pub async fn test_telegram_config(
	State(state): State<AppState>,
	auth: AuthUser,
	Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
	auth.require_admin()?;
	let cfg = state
		.notify_repo
		.get(id)
		.await
		.map_err(AppError::Internal)?
		.ok_or_else(|| AppError::NotFound(format!("telegram config {id} not found")))?;

	let chat_id = cfg.secret.clone().unwrap_or_default();
	send_telegram(
		&state.http_client,
		&cfg.endpoint,
		&chat_id,
		"Heimdall Observe: this is a test notification.",
		state.settings.telegram_timeout(),
	)
	.await
	.map_err(|e| AppError::Upstream(e.to_string()))?;

	Ok(Json(serde_json::json!({ "id": id, "sent": true })))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::observability::MetricsRegistry;
	use crate::store::mock::MockDomainRepo;
	use crate::store::notify_config::mock::{MockNotifyConfigRepo, MockTemplateRepo};
	use crate::store::user::mock::MockUserRepo;
	use crate::store::user::User;
	use crate::store::{MonitoredDomain, NotifyConfigRepo, TemplateRepo};
	use axum::extract::{Query, State};
	use chrono::Utc;
	use std::sync::Arc;

	fn state_with_user(user: User) -> AppState {
		AppState::new(
			Arc::new(MockDomainRepo::new()),
			Arc::new(MockNotifyConfigRepo::default()) as Arc<dyn NotifyConfigRepo>,
			Arc::new(MockTemplateRepo::default()) as Arc<dyn TemplateRepo>,
			Arc::new(MockUserRepo::seeded(vec![user])),
			Arc::new(crate::store::delivery::mock::MockDeliveryRepo::default()),
			Arc::new(crate::config::Settings::default()),
			Arc::new(MetricsRegistry::new()),
		)
	}

	fn active_user(username: &str, role: &str) -> User {
		let salt = "test-salt".to_string();
		User {
			id: Uuid::new_v4(),
			username: username.to_string(),
			password_hash: hash_password("hunter2", &salt),
			password_salt: salt,
			role: role.to_string(),
			status: "active".to_string(),
		}
	}

	#[tokio::test]
	async fn login_succeeds_with_correct_credentials() {
		let state = state_with_user(active_user("alice", "admin"));
		let resp = login(
			State(state),
			Json(LoginRequest {
				username: "alice".to_string(),
				password: "hunter2".to_string(),
			}),
		)
		.await
		.unwrap();
		assert_eq!(resp.0.username, "alice");
		assert_eq!(resp.0.role, "admin");
	}

	#[tokio::test]
	async fn login_rejects_wrong_password_with_401() {
		let state = state_with_user(active_user("alice", "admin"));
		let err = login(
			State(state),
			Json(LoginRequest {
				username: "alice".to_string(),
				password: "wrong".to_string(),
			}),
		)
		.await
		.unwrap_err();
		assert!(matches!(err, AppError::Auth(_)));
	}

	#[tokio::test]
	async fn login_rejects_pending_account_with_403() {
		let mut user = active_user("bob", "user");
		user.status = "pending".to_string();
		let state = state_with_user(user);
		let err = login(
			State(state),
			Json(LoginRequest {
				username: "bob".to_string(),
				password: "hunter2".to_string(),
			}),
		)
		.await
		.unwrap_err();
		assert!(matches!(err, AppError::Forbidden(_)));
	}

	#[tokio::test]
	async fn dashboard_stats_computes_global_availability_and_suffix_distribution() {
		let repo = MockDomainRepo::new();
		let mut d1 = MonitoredDomain::new_unseen("a.example.com", Utc::now());
		d1.http.is_live = Some(true);
		let mut d2 = MonitoredDomain::new_unseen("b.example.com", Utc::now());
		d2.http.is_live = Some(false);
		let repo = MockDomainRepo::seeded(vec![d1, d2]);

		let state = AppState::new(
			Arc::new(repo),
			Arc::new(MockNotifyConfigRepo::default()) as Arc<dyn NotifyConfigRepo>,
			Arc::new(MockTemplateRepo::default()) as Arc<dyn TemplateRepo>,
			Arc::new(MockUserRepo::seeded(vec![active_user("admin", "admin")])),
			Arc::new(crate::store::delivery::mock::MockDeliveryRepo::default()),
			Arc::new(crate::config::Settings::default()),
			Arc::new(MetricsRegistry::new()),
		);
		let token = issue_token(Uuid::new_v4(), "admin", &state.settings.jwt_secret).unwrap();
		let _ = token;
		let auth = AuthUser {
			user_id: Uuid::new_v4(),
			role: "admin".to_string(),
		};
		let stats = dashboard_stats(State(state), auth).await.unwrap();
		assert_eq!(stats.0.total_domains, 2);
		assert_eq!(stats.0.sites_down, 1);
		assert!((stats.0.global_availability - 50.0).abs() < f64::EPSILON);
		assert_eq!(stats.0.suffix_distribution.get("com"), Some(&2));
	}

	#[tokio::test]
	async fn scan_rejects_empty_domains_query_with_validation_error() {
		let state = state_with_user(active_user("alice", "admin"));
		let auth = AuthUser {
			user_id: Uuid::new_v4(),
			role: "admin".to_string(),
		};
		let err = scan(State(state), auth, Query(ScanQuery { domains: "  ,  ".to_string() }))
			.await
			.unwrap_err();
		assert!(matches!(err, AppError::Validation(_)));
	}
}
