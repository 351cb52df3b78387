pub mod channels;
pub mod model;
pub mod templates;

use chrono::Utc;

use crate::notifier::channels::WebhookPayload;
use crate::notifier::model::{DeliveryRecord, NotificationPlatform};
use crate::state::AppState;
use crate::state_engine::TransitionEvent;
use crate::store::{DomainPatch, MonitoredDomain};

/// Consume one transition event: load-or-fallback template, render,
/// fan out to every active channel, and advance `last_notification_at` on
/// first success. Unchanged 6-step algorithm from `spec.md` §4.6.
///
/// Partial-failure fan-out: at least one channel succeeding counts as
/// delivered overall (`SPEC_FULL.md` §4.6) — a single misconfigured
/// webhook must not suppress delivery on the others.
pub async fn handle_event(state: &AppState, event: TransitionEvent, row: &MonitoredDomain) {
	let template = match state.template_repo.get_by_event(event.kind).await {
		Ok(Some(t)) => t,
		Ok(None) => {
			tracing::warn!(event = event.kind.as_str(), "no message template configured, using fallback");
			fallback_template(event.kind)
		}
		Err(e) => {
			tracing::error!(error = %e, event = event.kind.as_str(), "template lookup failed, using fallback");
			fallback_template(event.kind)
		}
	};

	let data = templates::substitution_map(&event);
	let title = templates::render(&template.title_tmpl, &data);
	let body = templates::render(&template.body_tmpl, &data);
	let text = templates::render(&template.text_tmpl, &data);

	let configs = match state.notify_repo.list_active().await {
		Ok(c) => c,
		Err(e) => {
			tracing::error!(error = %e, "failed to load active notification configs");
			return;
		}
	};

	if configs.is_empty() {
		return;
	}

	let now = Utc::now();
	let mut any_success = false;

	for cfg in &configs {
		let timeout = if cfg.platform == NotificationPlatform::Telegram {
			state.settings.telegram_timeout()
		} else {
			state.settings.webhook_timeout()
		};

		let result = if cfg.platform == NotificationPlatform::Telegram {
			let chat_id = cfg.secret.clone().unwrap_or_default();
			channels::send_telegram(&state.http_client, &cfg.endpoint, &chat_id, &text, timeout).await
		} else {
			let payload = WebhookPayload {
				title: title.clone(),
				body: body.clone(),
				event: event.kind.as_str().to_string(),
				domain: event.domain.clone(),
				time: now.to_rfc3339(),
				extra: serde_json::json!({
					"ssl_expiry": event.expiry.map(|e| e.to_rfc3339()),
					"ssl_status": event.status.map(|s| s.as_str()),
					"days_remaining": event.days_remaining,
					"registrar": event.registrar,
				}),
			};
			channels::send_webhook(
				&state.http_client,
				cfg.platform,
				&cfg.endpoint,
				cfg.secret.as_deref(),
				&payload,
				timeout,
			)
			.await
		};

		let delivery_ok;
		let delivery_err;
		match result {
			Ok(()) => {
				any_success = true;
				delivery_ok = true;
				delivery_err = None;
				state
					.metrics
					.notify_sent_total
					.with_label_values(&[cfg.platform.as_str(), event.kind.as_str()])
					.inc();
			}
			Err(e) => {
				delivery_ok = false;
				delivery_err = Some(e.to_string());
				state
					.metrics
					.notify_failed_total
					.with_label_values(&[cfg.platform.as_str(), event.kind.as_str()])
					.inc();
				tracing::warn!(
					channel = cfg.platform.as_str(),
					event = event.kind.as_str(),
					domain = event.domain,
					error = %e,
					"notification delivery failed"
				);
			}
		}

		if let Err(e) = state
			.delivery_repo
			.record(DeliveryRecord {
				event: event.kind,
				domain: event.domain.clone(),
				channel: cfg.platform,
				at: now,
				ok: delivery_ok,
				error: delivery_err,
			})
			.await
		{
			tracing::warn!(error = %e, "failed to persist delivery record");
		}
	}

	if any_success {
		let patch = DomainPatch {
			last_notification_at: Some(now),
			..Default::default()
		};
		match state.repo.upsert(&event.domain, patch).await {
			Ok(_) => state.metrics.store_upsert_total.inc(),
			Err(e) => {
				tracing::error!(error = %e, domain = event.domain, "failed to record notification timestamp");
			}
		}
	}

	let _ = row;
}

fn fallback_template(event: model::EventName) -> model::MessageTemplate {
	model::MessageTemplate {
		id: uuid::Uuid::nil(),
		event_name: event,
		title_tmpl: templates::fallback_title(event).to_string(),
		body_tmpl: templates::fallback_body(event).to_string(),
		text_tmpl: templates::fallback_text(event).to_string(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::notifier::model::{EventName, MessageTemplate, NotificationConfig};
	use crate::observability::MetricsRegistry;
	use crate::store::mock::MockDomainRepo;
	use crate::store::notify_config::mock::{MockNotifyConfigRepo, MockTemplateRepo};
	use crate::store::{NotifyConfigRepo, TemplateRepo};
	use crate::store::DomainRepo;
	use std::sync::Arc;

	fn state_with(
		configs: Vec<NotificationConfig>,
		templates: Vec<MessageTemplate>,
	) -> AppState {
		AppState::new(
			Arc::new(MockDomainRepo::new()),
			Arc::new(MockNotifyConfigRepo::seeded(configs)) as Arc<dyn NotifyConfigRepo>,
			Arc::new(MockTemplateRepo::seeded(templates)) as Arc<dyn TemplateRepo>,
			Arc::new(crate::store::user::mock::MockUserRepo::default()),
			Arc::new(crate::store::delivery::mock::MockDeliveryRepo::default()),
			Arc::new(crate::config::Settings::default()),
			Arc::new(MetricsRegistry::new()),
		)
	}

	fn event() -> TransitionEvent {
		TransitionEvent {
			kind: EventName::SiteDown,
			domain: "x.example.com".to_string(),
			status: None,
			status_code: 0,
			days_remaining: None,
			expiry: None,
			registrar: None,
		}
	}

	#[tokio::test]
	async fn no_active_configs_sends_nothing_and_does_not_panic() {
		let state = state_with(vec![], vec![]);
		let row = MonitoredDomain::new_unseen("x.example.com", Utc::now());
		handle_event(&state, event(), &row).await;
	}

	#[tokio::test]
	async fn failed_channel_delivery_is_recorded_with_ok_false() {
		use crate::notifier::model::NotificationPlatform;
		use crate::store::delivery::mock::MockDeliveryRepo;

		let delivery = Arc::new(MockDeliveryRepo::default());
		let state = AppState::new(
			Arc::new(MockDomainRepo::new()),
			Arc::new(MockNotifyConfigRepo::seeded(vec![NotificationConfig {
				id: uuid::Uuid::new_v4(),
				platform: NotificationPlatform::Webhook,
				endpoint: "http://127.0.0.1:0/unreachable".to_string(),
				secret: None,
				active: true,
			}])) as Arc<dyn NotifyConfigRepo>,
			Arc::new(MockTemplateRepo::default()) as Arc<dyn TemplateRepo>,
			Arc::new(crate::store::user::mock::MockUserRepo::default()),
			delivery.clone(),
			Arc::new(crate::config::Settings::default()),
			Arc::new(MetricsRegistry::new()),
		);
		let row = MonitoredDomain::new_unseen("x.example.com", Utc::now());
		handle_event(&state, event(), &row).await;

		let rows = delivery.rows.lock().await;
		assert_eq!(rows.len(), 1);
		assert!(!rows[0].ok);
		assert_eq!(rows[0].channel, NotificationPlatform::Webhook);
	}

	#[tokio::test]
	async fn missing_template_falls_back_without_erroring() {
		let state = state_with(vec![], vec![]);
		let row = MonitoredDomain::new_unseen("x.example.com", Utc::now());
		// No configs active, but exercises the fallback-template path.
		handle_event(&state, event(), &row).await;
		assert!(state.repo.get_by_name("x.example.com").await.unwrap().is_none());
	}
}
