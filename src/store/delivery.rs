use async_trait::async_trait;
use sqlx::PgPool;

use crate::notifier::model::DeliveryRecord;

/// Append-only log of notification fan-out outcomes (`spec.md` §3
/// `DeliveryRecord`). Unlike `DomainRepo`/`NotifyConfigRepo`, this repo has
/// no read path the façade exposes yet — it exists so an operator can query
/// `delivery_records` directly when diagnosing why a channel went quiet,
/// mirroring the teacher's audit-trail tables that the HTTP layer never
/// reads back either.
#[async_trait]
pub trait DeliveryRepo: Send + Sync + 'static {
	async fn record(&self, rec: DeliveryRecord) -> anyhow::Result<()>;
}

pub struct PgDeliveryRepo {
	pool: PgPool,
}

impl PgDeliveryRepo {
	pub fn new(pool: PgPool) -> Self {
		Self { pool }
	}
}

#[async_trait]
impl DeliveryRepo for PgDeliveryRepo {
	async fn record(&self, rec: DeliveryRecord) -> anyhow::Result<()> {
		sqlx::query(
			r#"INSERT INTO delivery_records (event, domain, channel, at, ok, error)
			   VALUES ($1, $2, $3, $4, $5, $6)"#,
		)
		.bind(rec.event)
		.bind(rec.domain)
		.bind(rec.channel)
		.bind(rec.at)
		.bind(rec.ok)
		.bind(rec.error)
		.execute(&self.pool)
		.await?;
		Ok(())
	}
}

#[cfg(any(test, feature = "unit-tests"))]
pub mod mock {
	use super::*;
	use tokio::sync::Mutex;

	#[derive(Default)]
	pub struct MockDeliveryRepo {
		pub rows: Mutex<Vec<DeliveryRecord>>,
	}

	#[async_trait]
	impl DeliveryRepo for MockDeliveryRepo {
		async fn record(&self, rec: DeliveryRecord) -> anyhow::Result<()> {
			self.rows.lock().await.push(rec);
			Ok(())
		}
	}
}
