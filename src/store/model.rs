use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// TLS classification for a monitored domain. Ordering here is presentation
/// order only; classification rules live in `state_engine`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TlsStatus {
	Valid,
	Warning,
	Critical,
	Expired,
	Offline,
}

impl TlsStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			TlsStatus::Valid => "valid",
			TlsStatus::Warning => "warning",
			TlsStatus::Critical => "critical",
			TlsStatus::Expired => "expired",
			TlsStatus::Offline => "offline",
		}
	}

	pub fn at_risk(&self) -> bool {
		matches!(self, TlsStatus::Warning | TlsStatus::Critical | TlsStatus::Expired)
	}
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TlsInfo {
	pub not_after: Option<DateTime<Utc>>,
	pub issuer_org: Option<String>,
	pub days_remaining: Option<i64>,
	pub status: Option<TlsStatus>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RegistrationInfo {
	pub registrar: Option<String>,
	pub expires_at: Option<DateTime<Utc>>,
	pub nameservers: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HttpInfo {
	pub is_live: Option<bool>,
	pub last_status_code: Option<i32>,
	pub response_time_ms: Option<i64>,
}

/// A monitored domain row. `name` is the natural key (invariant 1, §3).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonitoredDomain {
	pub id: uuid::Uuid,
	pub name: String,
	pub tls: TlsInfo,
	pub reg: RegistrationInfo,
	pub http: HttpInfo,
	pub auto_renew: bool,
	pub last_check_at: Option<DateTime<Utc>>,
	pub last_notification_at: Option<DateTime<Utc>>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
	pub deleted_at: Option<DateTime<Utc>>,
}

impl MonitoredDomain {
	/// A freshly-seen domain with no prior observation, used as the "prior"
	/// when a name is first encountered by an ad-hoc scan or sweep.
	pub fn new_unseen(name: &str, now: DateTime<Utc>) -> Self {
		Self {
			id: uuid::Uuid::new_v4(),
			name: name.to_string(),
			tls: TlsInfo::default(),
			reg: RegistrationInfo::default(),
			http: HttpInfo::default(),
			auto_renew: false,
			last_check_at: None,
			last_notification_at: None,
			created_at: now,
			updated_at: now,
			deleted_at: None,
		}
	}
}

/// Partial update applied by `Upsert`. All fields absent (`None`) are left
/// untouched on the existing row — see invariant 4, §8.
#[derive(Debug, Clone, Default)]
pub struct DomainPatch {
	pub tls_not_after: Option<Option<DateTime<Utc>>>,
	pub tls_issuer_org: Option<Option<String>>,
	pub tls_days_remaining: Option<Option<i64>>,
	pub tls_status: Option<Option<TlsStatus>>,

	pub reg_registrar: Option<Option<String>>,
	pub reg_expires_at: Option<Option<DateTime<Utc>>>,
	pub reg_nameservers: Option<Vec<String>>,

	pub http_is_live: Option<Option<bool>>,
	pub http_last_status_code: Option<Option<i32>>,
	pub http_response_time_ms: Option<Option<i64>>,

	pub auto_renew: Option<bool>,
	pub last_check_at: Option<DateTime<Utc>>,
	pub last_notification_at: Option<DateTime<Utc>>,
}

impl DomainPatch {
	/// The set of field-updates a TLS/WHOIS sweep writes — disjoint from
	/// `http_only()`, per invariant 3, §8.
	pub fn from_tls_observation(
		not_after: Option<DateTime<Utc>>,
		issuer_org: Option<String>,
		days_remaining: Option<i64>,
		status: TlsStatus,
		registrar: Option<String>,
		expires_at: Option<DateTime<Utc>>,
		nameservers: Vec<String>,
		now: DateTime<Utc>,
	) -> Self {
		Self {
			tls_not_after: Some(not_after),
			tls_issuer_org: Some(issuer_org),
			tls_days_remaining: Some(days_remaining),
			tls_status: Some(Some(status)),
			reg_registrar: Some(registrar),
			reg_expires_at: Some(expires_at),
			reg_nameservers: Some(nameservers),
			last_check_at: Some(now),
			..Default::default()
		}
	}

	/// The set of field-updates an HTTP sweep writes.
	pub fn from_http_observation(
		is_live: bool,
		status_code: i32,
		rtt_ms: i64,
		now: DateTime<Utc>,
	) -> Self {
		Self {
			http_is_live: Some(Some(is_live)),
			http_last_status_code: Some(Some(status_code)),
			http_response_time_ms: Some(Some(rtt_ms)),
			last_check_at: Some(now),
			..Default::default()
		}
	}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DomainOrder {
	#[default]
	UpdatedAtDesc,
}

#[derive(Debug, Clone, Default)]
pub struct DomainFilter {
	pub status: Option<TlsStatus>,
	pub is_live: Option<bool>,
	pub include_deleted: bool,
}
