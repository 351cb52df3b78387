use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum NotificationPlatform {
	DingTalk,
	Feishu,
	Slack,
	Webhook,
	Telegram,
}

impl NotificationPlatform {
	pub fn as_str(&self) -> &'static str {
		match self {
			NotificationPlatform::DingTalk => "dingtalk",
			NotificationPlatform::Feishu => "feishu",
			NotificationPlatform::Slack => "slack",
			NotificationPlatform::Webhook => "webhook",
			NotificationPlatform::Telegram => "telegram",
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct NotificationConfig {
	pub id: uuid::Uuid,
	pub platform: NotificationPlatform,
	pub endpoint: String,
	pub secret: Option<String>,
	pub active: bool,
}

/// Event kinds that drive template lookup and notification dispatch.
///
/// `SiteDown` has no re-notification dedup anywhere in the pipeline — a
/// flapping site produces one notification per HTTP sweep tick (default
/// every 2 min). Reproduced exactly as specified; not silently mitigated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventName {
	SiteDown,
	SiteRecovered,
	SslCritical,
	SslWarning,
}

impl EventName {
	pub fn as_str(&self) -> &'static str {
		match self {
			EventName::SiteDown => "SITE_DOWN",
			EventName::SiteRecovered => "SITE_RECOVERED",
			EventName::SslCritical => "SSL_CRITICAL",
			EventName::SslWarning => "SSL_WARNING",
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct MessageTemplate {
	pub id: uuid::Uuid,
	pub event_name: EventName,
	pub title_tmpl: String,
	pub body_tmpl: String,
	pub text_tmpl: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryRecord {
	pub event: EventName,
	pub domain: String,
	pub channel: NotificationPlatform,
	pub at: DateTime<Utc>,
	pub ok: bool,
	pub error: Option<String>,
}
