use async_trait::async_trait;
use sqlx::PgPool;

use crate::notifier::model::{MessageTemplate, NotificationConfig};

/// CRUD repository for `NotificationConfig` rows (including Telegram
/// configs, which are plain `NotificationConfig` rows with
/// `platform = Telegram`). Shares the Postgres pool and repository-trait
/// idiom with `DomainRepo`.
#[async_trait]
pub trait NotifyConfigRepo: Send + Sync + 'static {
	async fn list(&self) -> anyhow::Result<Vec<NotificationConfig>>;
	async fn list_active(&self) -> anyhow::Result<Vec<NotificationConfig>>;
	async fn get(&self, id: uuid::Uuid) -> anyhow::Result<Option<NotificationConfig>>;
	async fn create(&self, cfg: NotificationConfig) -> anyhow::Result<NotificationConfig>;
	async fn update(&self, cfg: NotificationConfig) -> anyhow::Result<NotificationConfig>;
	async fn delete(&self, id: uuid::Uuid) -> anyhow::Result<()>;
}

#[async_trait]
pub trait TemplateRepo: Send + Sync + 'static {
	async fn list(&self) -> anyhow::Result<Vec<MessageTemplate>>;
	async fn get_by_event(
		&self,
		event: crate::notifier::model::EventName,
	) -> anyhow::Result<Option<MessageTemplate>>;
	async fn create(&self, tmpl: MessageTemplate) -> anyhow::Result<MessageTemplate>;
	async fn update(&self, tmpl: MessageTemplate) -> anyhow::Result<MessageTemplate>;
	async fn delete(&self, id: uuid::Uuid) -> anyhow::Result<()>;
}

pub struct PgNotifyConfigRepo {
	pool: PgPool,
}

impl PgNotifyConfigRepo {
	pub fn new(pool: PgPool) -> Self {
		Self { pool }
	}
}

#[async_trait]
impl NotifyConfigRepo for PgNotifyConfigRepo {
	async fn list(&self) -> anyhow::Result<Vec<NotificationConfig>> {
		let rows = sqlx::query_as::<_, NotificationConfig>(
			"SELECT id, platform, endpoint, secret, active FROM notification_configs ORDER BY platform",
		)
		.fetch_all(&self.pool)
		.await?;
		Ok(rows)
	}

	async fn list_active(&self) -> anyhow::Result<Vec<NotificationConfig>> {
		let rows = sqlx::query_as::<_, NotificationConfig>(
			"SELECT id, platform, endpoint, secret, active FROM notification_configs WHERE active ORDER BY platform",
		)
		.fetch_all(&self.pool)
		.await?;
		Ok(rows)
	}

	async fn get(&self, id: uuid::Uuid) -> anyhow::Result<Option<NotificationConfig>> {
		let row = sqlx::query_as::<_, NotificationConfig>(
			"SELECT id, platform, endpoint, secret, active FROM notification_configs WHERE id = $1",
		)
		.bind(id)
		.fetch_optional(&self.pool)
		.await?;
		Ok(row)
	}

	async fn create(&self, cfg: NotificationConfig) -> anyhow::Result<NotificationConfig> {
		let row = sqlx::query_as::<_, NotificationConfig>(
			r#"INSERT INTO notification_configs (id, platform, endpoint, secret, active)
			   VALUES ($1, $2, $3, $4, $5)
			   RETURNING id, platform, endpoint, secret, active"#,
		)
		.bind(cfg.id)
		.bind(cfg.platform)
		.bind(cfg.endpoint)
		.bind(cfg.secret)
		.bind(cfg.active)
		.fetch_one(&self.pool)
		.await?;
		Ok(row)
	}

	async fn update(&self, cfg: NotificationConfig) -> anyhow::Result<NotificationConfig> {
		let row = sqlx::query_as::<_, NotificationConfig>(
			r#"UPDATE notification_configs
			   SET platform = $2, endpoint = $3, secret = $4, active = $5
			   WHERE id = $1
			   RETURNING id, platform, endpoint, secret, active"#,
		)
		.bind(cfg.id)
		.bind(cfg.platform)
		.bind(cfg.endpoint)
		.bind(cfg.secret)
		.bind(cfg.active)
		.fetch_one(&self.pool)
		.await?;
		Ok(row)
	}

	async fn delete(&self, id: uuid::Uuid) -> anyhow::Result<()> {
		sqlx::query("DELETE FROM notification_configs WHERE id = $1")
			.bind(id)
			.execute(&self.pool)
			.await?;
		Ok(())
	}
}

pub struct PgTemplateRepo {
	pool: PgPool,
}

impl PgTemplateRepo {
	pub fn new(pool: PgPool) -> Self {
		Self { pool }
	}
}

#[async_trait]
impl TemplateRepo for PgTemplateRepo {
	async fn list(&self) -> anyhow::Result<Vec<MessageTemplate>> {
		let rows = sqlx::query_as::<_, MessageTemplate>(
			"SELECT id, event_name, title_tmpl, body_tmpl, text_tmpl FROM message_templates ORDER BY event_name",
		)
		.fetch_all(&self.pool)
		.await?;
		Ok(rows)
	}

	async fn get_by_event(
		&self,
		event: crate::notifier::model::EventName,
	) -> anyhow::Result<Option<MessageTemplate>> {
		let row = sqlx::query_as::<_, MessageTemplate>(
			"SELECT id, event_name, title_tmpl, body_tmpl, text_tmpl FROM message_templates WHERE event_name = $1",
		)
		.bind(event)
		.fetch_optional(&self.pool)
		.await?;
		Ok(row)
	}

	async fn create(&self, tmpl: MessageTemplate) -> anyhow::Result<MessageTemplate> {
		let row = sqlx::query_as::<_, MessageTemplate>(
			r#"INSERT INTO message_templates (id, event_name, title_tmpl, body_tmpl, text_tmpl)
			   VALUES ($1, $2, $3, $4, $5)
			   ON CONFLICT (event_name) DO UPDATE SET
			     title_tmpl = EXCLUDED.title_tmpl,
			     body_tmpl = EXCLUDED.body_tmpl,
			     text_tmpl = EXCLUDED.text_tmpl
			   RETURNING id, event_name, title_tmpl, body_tmpl, text_tmpl"#,
		)
		.bind(tmpl.id)
		.bind(tmpl.event_name)
		.bind(tmpl.title_tmpl)
		.bind(tmpl.body_tmpl)
		.bind(tmpl.text_tmpl)
		.fetch_one(&self.pool)
		.await?;
		Ok(row)
	}

	async fn update(&self, tmpl: MessageTemplate) -> anyhow::Result<MessageTemplate> {
		let row = sqlx::query_as::<_, MessageTemplate>(
			r#"UPDATE message_templates
			   SET title_tmpl = $2, body_tmpl = $3, text_tmpl = $4
			   WHERE id = $1
			   RETURNING id, event_name, title_tmpl, body_tmpl, text_tmpl"#,
		)
		.bind(tmpl.id)
		.bind(tmpl.title_tmpl)
		.bind(tmpl.body_tmpl)
		.bind(tmpl.text_tmpl)
		.fetch_one(&self.pool)
		.await?;
		Ok(row)
	}

	async fn delete(&self, id: uuid::Uuid) -> anyhow::Result<()> {
		sqlx::query("DELETE FROM message_templates WHERE id = $1")
			.bind(id)
			.execute(&self.pool)
			.await?;
		Ok(())
	}
}

#[cfg(any(test, feature = "unit-tests"))]
pub mod mock {
	use super::*;
	use crate::notifier::model::EventName;
	use tokio::sync::Mutex;

	#[derive(Default)]
	pub struct MockNotifyConfigRepo {
		rows: Mutex<Vec<NotificationConfig>>,
	}

	impl MockNotifyConfigRepo {
		pub fn seeded(rows: Vec<NotificationConfig>) -> Self {
			Self {
				rows: Mutex::new(rows),
			}
		}
	}

	#[async_trait]
	impl NotifyConfigRepo for MockNotifyConfigRepo {
		async fn list(&self) -> anyhow::Result<Vec<NotificationConfig>> {
			Ok(self.rows.lock().await.clone())
		}
		async fn list_active(&self) -> anyhow::Result<Vec<NotificationConfig>> {
			Ok(self
				.rows
				.lock()
				.await
				.iter()
				.filter(|c| c.active)
				.cloned()
				.collect())
		}
		async fn get(&self, id: uuid::Uuid) -> anyhow::Result<Option<NotificationConfig>> {
			Ok(self.rows.lock().await.iter().find(|c| c.id == id).cloned())
		}
		async fn create(&self, cfg: NotificationConfig) -> anyhow::Result<NotificationConfig> {
			self.rows.lock().await.push(cfg.clone());
			Ok(cfg)
		}
		async fn update(&self, cfg: NotificationConfig) -> anyhow::Result<NotificationConfig> {
			let mut rows = self.rows.lock().await;
			if let Some(existing) = rows.iter_mut().find(|c| c.id == cfg.id) {
				*existing = cfg.clone();
			}
			Ok(cfg)
		}
		async fn delete(&self, id: uuid::Uuid) -> anyhow::Result<()> {
			self.rows.lock().await.retain(|c| c.id != id);
			Ok(())
		}
	}

	#[derive(Default)]
	pub struct MockTemplateRepo {
		rows: Mutex<Vec<MessageTemplate>>,
	}

	impl MockTemplateRepo {
		pub fn seeded(rows: Vec<MessageTemplate>) -> Self {
			Self {
				rows: Mutex::new(rows),
			}
		}
	}

	#[async_trait]
	impl TemplateRepo for MockTemplateRepo {
		async fn list(&self) -> anyhow::Result<Vec<MessageTemplate>> {
			Ok(self.rows.lock().await.clone())
		}
		async fn get_by_event(&self, event: EventName) -> anyhow::Result<Option<MessageTemplate>> {
			Ok(self
				.rows
				.lock()
				.await
				.iter()
				.find(|t| t.event_name == event)
				.cloned())
		}
		async fn create(&self, tmpl: MessageTemplate) -> anyhow::Result<MessageTemplate> {
			self.rows.lock().await.push(tmpl.clone());
			Ok(tmpl)
		}
		async fn update(&self, tmpl: MessageTemplate) -> anyhow::Result<MessageTemplate> {
			let mut rows = self.rows.lock().await;
			if let Some(existing) = rows.iter_mut().find(|t| t.id == tmpl.id) {
				*existing = tmpl.clone();
			}
			Ok(tmpl)
		}
		async fn delete(&self, id: uuid::Uuid) -> anyhow::Result<()> {
			self.rows.lock().await.retain(|t| t.id != id);
			Ok(())
		}
	}
}
