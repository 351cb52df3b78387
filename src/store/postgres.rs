use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::Row;

use super::model::{DomainFilter, DomainOrder, DomainPatch, MonitoredDomain, TlsStatus};
use super::DomainRepo;

/// Postgres-backed `DomainRepo`, grounded on the teacher's `AgeClient`
/// (`src/age_client.rs`): a thin wrapper around a `PgPool` whose methods
/// build parameterized SQL rather than Cypher strings.
pub struct PostgresDomainRepo {
	pool: PgPool,
}

impl PostgresDomainRepo {
	pub fn new(pool: PgPool) -> Self {
		Self { pool }
	}

	pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
		let pool = PgPool::connect(database_url).await?;
		Ok(Self { pool })
	}

	pub fn pool(&self) -> &PgPool {
		&self.pool
	}

	fn row_to_domain(row: &sqlx::postgres::PgRow) -> anyhow::Result<MonitoredDomain> {
		use super::model::{HttpInfo, RegistrationInfo, TlsInfo};

		let status: Option<String> = row.try_get("tls_status")?;
		let status = status.and_then(|s| match s.as_str() {
			"valid" => Some(TlsStatus::Valid),
			"warning" => Some(TlsStatus::Warning),
			"critical" => Some(TlsStatus::Critical),
			"expired" => Some(TlsStatus::Expired),
			"offline" => Some(TlsStatus::Offline),
			_ => None,
		});

		Ok(MonitoredDomain {
			id: row.try_get("id")?,
			name: row.try_get("name")?,
			tls: TlsInfo {
				not_after: row.try_get("tls_not_after")?,
				issuer_org: row.try_get("tls_issuer_org")?,
				days_remaining: row.try_get("tls_days_remaining")?,
				status,
			},
			reg: RegistrationInfo {
				registrar: row.try_get("reg_registrar")?,
				expires_at: row.try_get("reg_expires_at")?,
				nameservers: row
					.try_get::<Option<Vec<String>>, _>("reg_nameservers")?
					.unwrap_or_default(),
			},
			http: HttpInfo {
				is_live: row.try_get("http_is_live")?,
				last_status_code: row.try_get("http_last_status_code")?,
				response_time_ms: row.try_get("http_response_time_ms")?,
			},
			auto_renew: row.try_get("auto_renew")?,
			last_check_at: row.try_get("last_check_at")?,
			last_notification_at: row.try_get("last_notification_at")?,
			created_at: row.try_get("created_at")?,
			updated_at: row.try_get("updated_at")?,
			deleted_at: row.try_get("deleted_at")?,
		})
	}
}

#[async_trait]
impl DomainRepo for PostgresDomainRepo {
	/// Single `INSERT ... ON CONFLICT (name) DO UPDATE`. The three-valued
	/// fields (`DomainPatch`'s `Option<Option<T>>` members) each carry an
	/// extra `$_present` boolean alongside their value, and the `UPDATE SET`
	/// clause uses `CASE WHEN $present THEN $value ELSE col END` rather than
	/// `COALESCE` — `COALESCE` cannot tell "field absent from patch" (leave
	/// column alone) apart from "field present and explicitly `None`" (write
	/// NULL), and a failed TLS probe needs the latter to clear a stale
	/// `tls_not_after`/`tls_issuer_org`/`tls_days_remaining` when the status
	/// flips to `offline` (invariant 2, §3). Plain `Option<T>` fields (no
	/// inner option, so "absent" is their only non-write state) keep
	/// `COALESCE`. `updated_at` is bumped unconditionally so it stays
	/// monotone under field-level last-writer-wins (§5).
	async fn upsert(&self, name: &str, patch: DomainPatch) -> anyhow::Result<MonitoredDomain> {
		let tls_not_after_present = patch.tls_not_after.is_some();
		let tls_not_after = patch.tls_not_after.flatten();
		let tls_issuer_org_present = patch.tls_issuer_org.is_some();
		let tls_issuer_org = patch.tls_issuer_org.flatten();
		let tls_days_remaining_present = patch.tls_days_remaining.is_some();
		let tls_days_remaining = patch.tls_days_remaining.flatten();
		let tls_status_present = patch.tls_status.is_some();
		let status_str = patch.tls_status.flatten().map(|s| s.as_str().to_string());
		let reg_registrar_present = patch.reg_registrar.is_some();
		let reg_registrar = patch.reg_registrar.flatten();
		let reg_expires_at_present = patch.reg_expires_at.is_some();
		let reg_expires_at = patch.reg_expires_at.flatten();
		let nameservers = patch.reg_nameservers;
		let http_is_live_present = patch.http_is_live.is_some();
		let http_is_live = patch.http_is_live.flatten();
		let http_last_status_code_present = patch.http_last_status_code.is_some();
		let http_last_status_code = patch.http_last_status_code.flatten();
		let http_response_time_ms_present = patch.http_response_time_ms.is_some();
		let http_response_time_ms = patch.http_response_time_ms.flatten();

		let row = sqlx::query(
			r#"
			INSERT INTO monitored_domains (
				id, name,
				tls_not_after, tls_issuer_org, tls_days_remaining, tls_status,
				reg_registrar, reg_expires_at, reg_nameservers,
				http_is_live, http_last_status_code, http_response_time_ms,
				auto_renew, last_check_at, last_notification_at,
				created_at, updated_at
			) VALUES (
				gen_random_uuid(), $1,
				$2, $4, $6, $8,
				$10, $12, $14,
				$15, $17, $19,
				COALESCE($21, false), $22, $23,
				now(), now()
			)
			ON CONFLICT (name) DO UPDATE SET
				tls_not_after = CASE WHEN $3 THEN $2 ELSE monitored_domains.tls_not_after END,
				tls_issuer_org = CASE WHEN $5 THEN $4 ELSE monitored_domains.tls_issuer_org END,
				tls_days_remaining = CASE WHEN $7 THEN $6 ELSE monitored_domains.tls_days_remaining END,
				tls_status = CASE WHEN $9 THEN $8 ELSE monitored_domains.tls_status END,
				reg_registrar = CASE WHEN $11 THEN $10 ELSE monitored_domains.reg_registrar END,
				reg_expires_at = CASE WHEN $13 THEN $12 ELSE monitored_domains.reg_expires_at END,
				reg_nameservers = COALESCE($14, monitored_domains.reg_nameservers),
				http_is_live = CASE WHEN $16 THEN $15 ELSE monitored_domains.http_is_live END,
				http_last_status_code = CASE WHEN $18 THEN $17 ELSE monitored_domains.http_last_status_code END,
				http_response_time_ms = CASE WHEN $20 THEN $19 ELSE monitored_domains.http_response_time_ms END,
				auto_renew = COALESCE($21, monitored_domains.auto_renew),
				last_check_at = COALESCE($22, monitored_domains.last_check_at),
				last_notification_at = COALESCE($23, monitored_domains.last_notification_at),
				updated_at = now()
			RETURNING
				id, name,
				tls_not_after, tls_issuer_org, tls_days_remaining, tls_status,
				reg_registrar, reg_expires_at, reg_nameservers,
				http_is_live, http_last_status_code, http_response_time_ms,
				auto_renew, last_check_at, last_notification_at,
				created_at, updated_at, deleted_at
			"#,
		)
		.bind(name)
		.bind(tls_not_after)
		.bind(tls_not_after_present)
		.bind(tls_issuer_org)
		.bind(tls_issuer_org_present)
		.bind(tls_days_remaining)
		.bind(tls_days_remaining_present)
		.bind(status_str)
		.bind(tls_status_present)
		.bind(reg_registrar)
		.bind(reg_registrar_present)
		.bind(reg_expires_at)
		.bind(reg_expires_at_present)
		.bind(nameservers)
		.bind(http_is_live)
		.bind(http_is_live_present)
		.bind(http_last_status_code)
		.bind(http_last_status_code_present)
		.bind(http_response_time_ms)
		.bind(http_response_time_ms_present)
		.bind(patch.auto_renew)
		.bind(patch.last_check_at)
		.bind(patch.last_notification_at)
		.fetch_one(&self.pool)
		.await?;

		Self::row_to_domain(&row)
	}

	async fn list(
		&self,
		filter: DomainFilter,
		_order: DomainOrder,
	) -> anyhow::Result<Vec<MonitoredDomain>> {
		let status_str = filter.status.map(|s| s.as_str().to_string());
		let rows = sqlx::query(
			r#"
			SELECT id, name,
				tls_not_after, tls_issuer_org, tls_days_remaining, tls_status,
				reg_registrar, reg_expires_at, reg_nameservers,
				http_is_live, http_last_status_code, http_response_time_ms,
				auto_renew, last_check_at, last_notification_at,
				created_at, updated_at, deleted_at
			FROM monitored_domains
			WHERE ($1 OR deleted_at IS NULL)
				AND ($2::text IS NULL OR tls_status = $2)
				AND ($3::bool IS NULL OR http_is_live = $3)
			ORDER BY updated_at DESC
			"#,
		)
		.bind(filter.include_deleted)
		.bind(status_str)
		.bind(filter.is_live)
		.fetch_all(&self.pool)
		.await?;

		rows.iter().map(Self::row_to_domain).collect()
	}

	async fn get_by_name(&self, name: &str) -> anyhow::Result<Option<MonitoredDomain>> {
		let row = sqlx::query(
			r#"
			SELECT id, name,
				tls_not_after, tls_issuer_org, tls_days_remaining, tls_status,
				reg_registrar, reg_expires_at, reg_nameservers,
				http_is_live, http_last_status_code, http_response_time_ms,
				auto_renew, last_check_at, last_notification_at,
				created_at, updated_at, deleted_at
			FROM monitored_domains WHERE name = $1
			"#,
		)
		.bind(name)
		.fetch_optional(&self.pool)
		.await?;

		row.as_ref().map(Self::row_to_domain).transpose()
	}

	async fn soft_delete(&self, name: &str) -> anyhow::Result<()> {
		sqlx::query("UPDATE monitored_domains SET deleted_at = now() WHERE name = $1")
			.bind(name)
			.execute(&self.pool)
			.await?;
		Ok(())
	}

	async fn set_auto_renew(&self, id: uuid::Uuid, auto_renew: bool) -> anyhow::Result<()> {
		sqlx::query("UPDATE monitored_domains SET auto_renew = $2, updated_at = now() WHERE id = $1")
			.bind(id)
			.bind(auto_renew)
			.execute(&self.pool)
			.await?;
		Ok(())
	}

	async fn ping(&self) -> anyhow::Result<()> {
		sqlx::query("SELECT 1").execute(&self.pool).await?;
		Ok(())
	}
}
