use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::notifier::model::{EventName, NotificationConfig, NotificationPlatform};
use crate::store::model::{MonitoredDomain, TlsStatus};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
	pub username: String,
	pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
	pub token: String,
	pub username: String,
	pub role: String,
}

/// `GET /v1/scan?domains=a,b,c` query parameters.
#[derive(Debug, Deserialize)]
pub struct ScanQuery {
	pub domains: String,
}

/// One entry of `GET /v1/scan`'s `results[]`, field names fixed by
/// `spec.md` §6.
#[derive(Debug, Serialize)]
pub struct ScanResultDto {
	pub domain_name: String,
	pub status: Option<&'static str>,
	pub expiry_date: Option<String>,
	pub expiry_date_human: Option<String>,
	pub days_remaining: Option<i64>,
	pub issuer: Option<String>,
	pub registrar: Option<String>,
	pub domain_expiry_date: Option<String>,
	pub name_servers: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ScanSummary {
	pub total_scanned: usize,
	pub at_risk: usize,
}

#[derive(Debug, Serialize)]
pub struct ScanResponse {
	pub results: Vec<ScanResultDto>,
	pub summary: ScanSummary,
}

/// `MonitoredDomain` as returned by `GET /v1/domains`, flattening the
/// nested `tls`/`reg`/`http` structs into the field names listed in
/// `spec.md` §3.
#[derive(Debug, Serialize)]
pub struct DomainDto {
	pub id: uuid::Uuid,
	pub name: String,
	pub tls_not_after: Option<DateTime<Utc>>,
	pub tls_issuer_org: Option<String>,
	pub tls_days_remaining: Option<i64>,
	pub tls_status: Option<TlsStatus>,
	pub registrar: Option<String>,
	pub registrar_expires_at: Option<DateTime<Utc>>,
	pub nameservers: Vec<String>,
	pub is_live: Option<bool>,
	pub last_status_code: Option<i32>,
	pub response_time_ms: Option<i64>,
	pub auto_renew: bool,
	pub last_check_at: Option<DateTime<Utc>>,
	pub last_notification_at: Option<DateTime<Utc>>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

impl From<MonitoredDomain> for DomainDto {
	fn from(d: MonitoredDomain) -> Self {
		Self {
			id: d.id,
			name: d.name,
			tls_not_after: d.tls.not_after,
			tls_issuer_org: d.tls.issuer_org,
			tls_days_remaining: d.tls.days_remaining,
			tls_status: d.tls.status,
			registrar: d.reg.registrar,
			registrar_expires_at: d.reg.expires_at,
			nameservers: d.reg.nameservers,
			is_live: d.http.is_live,
			last_status_code: d.http.last_status_code,
			response_time_ms: d.http.response_time_ms,
			auto_renew: d.auto_renew,
			last_check_at: d.last_check_at,
			last_notification_at: d.last_notification_at,
			created_at: d.created_at,
			updated_at: d.updated_at,
		}
	}
}

#[derive(Debug, Deserialize)]
pub struct AutoRenewRequest {
	pub auto_renew: bool,
}

/// `GET /v1/dashboard/stats` response, field names and casing fixed by
/// `spec.md` §6 (mixed snake/camel case is the contract, not an oversight).
#[derive(Debug, Serialize)]
pub struct DashboardStats {
	pub total_domains: usize,
	#[serde(rename = "sslCritical")]
	pub ssl_critical: usize,
	#[serde(rename = "sslWarning")]
	pub ssl_warning: usize,
	/// Count of scaffolded services/projects. The scaffolder that owns this
	/// concept is an external collaborator out of this core's scope
	/// (`spec.md` §1 Non-goals); this core always reports 0 here rather
	/// than guessing at a value it has no source of truth for.
	pub project_count: usize,
	pub global_availability: f64,
	pub sites_down: usize,
	pub suffix_distribution: std::collections::BTreeMap<String, usize>,
	pub monthly_expiry: std::collections::BTreeMap<String, usize>,
}

#[derive(Debug, Deserialize)]
pub struct NotificationConfigRequest {
	pub platform: NotificationPlatform,
	pub endpoint: String,
	pub secret: Option<String>,
	#[serde(default = "default_true")]
	pub active: bool,
}

fn default_true() -> bool {
	true
}

impl NotificationConfigRequest {
	pub fn into_config(self, id: uuid::Uuid) -> NotificationConfig {
		NotificationConfig {
			id,
			platform: self.platform,
			endpoint: self.endpoint,
			secret: self.secret,
			active: self.active,
		}
	}
}

#[derive(Debug, Deserialize)]
pub struct MessageTemplateRequest {
	pub event_name: EventName,
	pub title_tmpl: String,
	pub body_tmpl: String,
	pub text_tmpl: String,
}

#[derive(Debug, Deserialize)]
pub struct TelegramConfigRequest {
	/// Bot token, stored in `NotificationConfig.endpoint` (spec.md §4.6
	/// step 4 convention — see `notifier::channels::send_telegram`).
	pub bot_token: String,
	/// Target chat id, stored in `NotificationConfig.secret`.
	pub chat_id: String,
	#[serde(default = "default_true")]
	pub active: bool,
}

