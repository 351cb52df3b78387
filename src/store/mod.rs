pub mod delivery;
pub mod model;
pub mod notify_config;
pub mod postgres;
pub mod user;

use async_trait::async_trait;

pub use delivery::{DeliveryRepo, PgDeliveryRepo};
pub use model::{DomainFilter, DomainOrder, DomainPatch, MonitoredDomain, TlsStatus};
pub use notify_config::{NotifyConfigRepo, TemplateRepo};
pub use postgres::PostgresDomainRepo;
pub use user::{PgUserRepo, User, UserRepo};

/// Durable, upsert-by-name collection of monitored-domain records.
///
/// Grounded on the teacher's `AgeRepo` trait (`src/age_client.rs`): a single
/// trait object held behind `Arc<dyn DomainRepo>` in `AppState`, with a
/// Postgres-backed production implementation and an in-memory mock used by
/// every other component's unit tests.
#[async_trait]
pub trait DomainRepo: Send + Sync + 'static {
	/// Apply `patch` to the row named `name`, creating it if absent, as one
	/// atomic write. Fields absent from `patch` MUST NOT be clobbered.
	async fn upsert(&self, name: &str, patch: DomainPatch) -> anyhow::Result<MonitoredDomain>;

	async fn list(
		&self,
		filter: DomainFilter,
		order: DomainOrder,
	) -> anyhow::Result<Vec<MonitoredDomain>>;

	async fn get_by_name(&self, name: &str) -> anyhow::Result<Option<MonitoredDomain>>;

	async fn soft_delete(&self, name: &str) -> anyhow::Result<()>;

	async fn set_auto_renew(&self, id: uuid::Uuid, auto_renew: bool) -> anyhow::Result<()>;

	/// Health check used by `GET /health/db`.
	async fn ping(&self) -> anyhow::Result<()>;
}

#[cfg(any(test, feature = "unit-tests"))]
pub mod mock {
	use super::*;
	use chrono::Utc;
	use std::collections::HashMap;
	use tokio::sync::Mutex;

	/// In-memory `DomainRepo` used by state-engine, orchestrator, and
	/// notifier unit tests — mirrors the teacher's `MockAgeRepo` pattern.
	#[derive(Default)]
	pub struct MockDomainRepo {
		rows: Mutex<HashMap<String, MonitoredDomain>>,
		pub fail_upserts: std::sync::atomic::AtomicBool,
	}

	impl MockDomainRepo {
		pub fn new() -> Self {
			Self::default()
		}

		pub fn seeded(domains: Vec<MonitoredDomain>) -> Self {
			let mut rows = HashMap::new();
			for d in domains {
				rows.insert(d.name.clone(), d);
			}
			Self {
				rows: Mutex::new(rows),
				fail_upserts: std::sync::atomic::AtomicBool::new(false),
			}
		}
	}

	fn apply_patch(row: &mut MonitoredDomain, patch: DomainPatch, now: chrono::DateTime<Utc>) {
		if let Some(v) = patch.tls_not_after {
			row.tls.not_after = v;
		}
		if let Some(v) = patch.tls_issuer_org {
			row.tls.issuer_org = v;
		}
		if let Some(v) = patch.tls_days_remaining {
			row.tls.days_remaining = v;
		}
		if let Some(v) = patch.tls_status {
			row.tls.status = v;
		}
		if let Some(v) = patch.reg_registrar {
			row.reg.registrar = v;
		}
		if let Some(v) = patch.reg_expires_at {
			row.reg.expires_at = v;
		}
		if let Some(v) = patch.reg_nameservers {
			row.reg.nameservers = v;
		}
		if let Some(v) = patch.http_is_live {
			row.http.is_live = v;
		}
		if let Some(v) = patch.http_last_status_code {
			row.http.last_status_code = v;
		}
		if let Some(v) = patch.http_response_time_ms {
			row.http.response_time_ms = v;
		}
		if let Some(v) = patch.auto_renew {
			row.auto_renew = v;
		}
		if let Some(v) = patch.last_check_at {
			row.last_check_at = Some(v);
		}
		if let Some(v) = patch.last_notification_at {
			row.last_notification_at = Some(v);
		}
		row.updated_at = now;
	}

	#[async_trait]
	impl DomainRepo for MockDomainRepo {
		async fn upsert(&self, name: &str, patch: DomainPatch) -> anyhow::Result<MonitoredDomain> {
			if self
				.fail_upserts
				.load(std::sync::atomic::Ordering::SeqCst)
			{
				anyhow::bail!("mock upsert failure");
			}
			let now = Utc::now();
			let mut rows = self.rows.lock().await;
			let entry = rows
				.entry(name.to_string())
				.or_insert_with(|| MonitoredDomain::new_unseen(name, now));
			apply_patch(entry, patch, now);
			Ok(entry.clone())
		}

		async fn list(
			&self,
			filter: DomainFilter,
			_order: DomainOrder,
		) -> anyhow::Result<Vec<MonitoredDomain>> {
			let rows = self.rows.lock().await;
			let mut out: Vec<MonitoredDomain> = rows
				.values()
				.filter(|d| filter.include_deleted || d.deleted_at.is_none())
				.filter(|d| filter.status.is_none() || d.tls.status == filter.status)
				.filter(|d| filter.is_live.is_none() || d.http.is_live == filter.is_live)
				.cloned()
				.collect();
			out.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
			Ok(out)
		}

		async fn get_by_name(&self, name: &str) -> anyhow::Result<Option<MonitoredDomain>> {
			Ok(self.rows.lock().await.get(name).cloned())
		}

		async fn soft_delete(&self, name: &str) -> anyhow::Result<()> {
			if let Some(row) = self.rows.lock().await.get_mut(name) {
				row.deleted_at = Some(Utc::now());
			}
			Ok(())
		}

		async fn set_auto_renew(&self, id: uuid::Uuid, auto_renew: bool) -> anyhow::Result<()> {
			let mut rows = self.rows.lock().await;
			if let Some(row) = rows.values_mut().find(|d| d.id == id) {
				row.auto_renew = auto_renew;
			}
			Ok(())
		}

		async fn ping(&self) -> anyhow::Result<()> {
			Ok(())
		}
	}

	#[tokio::test]
	async fn upsert_preserves_fields_absent_from_patch() {
		let repo = MockDomainRepo::new();
		let p1 = DomainPatch {
			tls_issuer_org: Some(Some("Let's Encrypt".to_string())),
			..Default::default()
		};
		repo.upsert("example.com", p1).await.unwrap();

		// Patch touching only HTTP fields must not clobber tls_issuer_org.
		let p2 = DomainPatch::from_http_observation(true, 200, 42, Utc::now());
		let row = repo.upsert("example.com", p2).await.unwrap();

		assert_eq!(row.tls.issuer_org.as_deref(), Some("Let's Encrypt"));
		assert_eq!(row.http.is_live, Some(true));
	}

	#[tokio::test]
	async fn tls_and_http_sweeps_touch_disjoint_fields() {
		let repo = MockDomainRepo::new();
		let now = Utc::now();
		let tls_patch = DomainPatch::from_tls_observation(
			Some(now),
			Some("DigiCert".to_string()),
			Some(10),
			TlsStatus::Warning,
			Some("Example Registrar".to_string()),
			None,
			vec!["ns1.example.com".to_string()],
			now,
		);
		let after_tls = repo.upsert("example.com", tls_patch).await.unwrap();
		assert_eq!(after_tls.http.is_live, None);

		let http_patch = DomainPatch::from_http_observation(true, 200, 10, now);
		let after_http = repo.upsert("example.com", http_patch).await.unwrap();
		assert_eq!(after_http.tls.issuer_org.as_deref(), Some("DigiCert"));
		assert_eq!(after_http.http.is_live, Some(true));
	}
}
