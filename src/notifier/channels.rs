use std::time::Duration;

use serde::Serialize;
use serde_json::json;

use crate::notifier::model::NotificationPlatform;

/// Outbound webhook payload (`spec.md` §6): `{title, body, event, domain, time, extra}`.
#[derive(Debug, Serialize)]
pub struct WebhookPayload {
	pub title: String,
	pub body: String,
	pub event: String,
	pub domain: String,
	pub time: String,
	pub extra: serde_json::Value,
}

/// Dispatch `payload` to a single `NotificationConfig` endpoint, applying
/// the per-platform auth-header convention from `spec.md` §4.6 step 3.
///
/// Grounded on the `lai3d-sigma` reference file's `send_webhook`/
/// `send_telegram` functions, generalized to DingTalk/Feishu/Slack's
/// distinct header conventions.
pub async fn send_webhook(
	client: &reqwest::Client,
	platform: NotificationPlatform,
	endpoint: &str,
	secret: Option<&str>,
	payload: &WebhookPayload,
	timeout: Duration,
) -> anyhow::Result<()> {
	let mut req = client.post(endpoint).timeout(timeout).json(payload);

	req = match platform {
		NotificationPlatform::Slack => {
			if let Some(s) = secret {
				req.bearer_auth(s)
			} else {
				req
			}
		}
		NotificationPlatform::DingTalk | NotificationPlatform::Feishu => {
			if let Some(s) = secret {
				req.header("X-Secret-Key", s)
			} else {
				req
			}
		}
		NotificationPlatform::Webhook => {
			if let Some(s) = secret {
				req.bearer_auth(s)
			} else {
				req
			}
		}
		NotificationPlatform::Telegram => req,
	};

	let resp = req.send().await?;
	if !resp.status().is_success() {
		anyhow::bail!("webhook endpoint returned status {}", resp.status());
	}
	Ok(())
}

/// POST `{chat_id, text}` to `https://api.telegram.org/bot<token>/sendMessage`
/// (`spec.md` §4.6 step 4). `endpoint` carries the bot token; `chat_id` is
/// the configured secret, matching the teacher's Telegram config convention
/// of reusing the existing `endpoint`/`secret` columns rather than adding
/// Telegram-specific schema.
pub async fn send_telegram(
	client: &reqwest::Client,
	bot_token: &str,
	chat_id: &str,
	text: &str,
	timeout: Duration,
) -> anyhow::Result<()> {
	let url = format!("https://api.telegram.org/bot{bot_token}/sendMessage");
	let resp = client
		.post(&url)
		.timeout(timeout)
		.json(&json!({ "chat_id": chat_id, "text": text }))
		.send()
		.await?;
	if !resp.status().is_success() {
		anyhow::bail!("telegram sendMessage returned status {}", resp.status());
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn webhook_payload_serializes_the_fixed_shape() {
		let payload = WebhookPayload {
			title: "t".to_string(),
			body: "b".to_string(),
			event: "SSL_CRITICAL".to_string(),
			domain: "example.com".to_string(),
			time: "2025-01-01T00:00:00Z".to_string(),
			extra: json!({}),
		};
		let v = serde_json::to_value(&payload).unwrap();
		assert_eq!(v["domain"], "example.com");
		assert_eq!(v["event"], "SSL_CRITICAL");
	}
}
