use async_trait::async_trait;
use sqlx::PgPool;

/// A row in `users`, backing `POST /v1/auth/login`. `status` drives the
/// 403 branches (`pending` / `disabled`) ahead of password verification.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
	pub id: uuid::Uuid,
	pub username: String,
	pub password_hash: String,
	pub password_salt: String,
	pub role: String,
	pub status: String,
}

/// Read-only lookup repository for the login surface. Shares the
/// Postgres-pool/mock-trait-object idiom used by `DomainRepo` and
/// `NotifyConfigRepo`.
#[async_trait]
pub trait UserRepo: Send + Sync + 'static {
	async fn get_by_username(&self, username: &str) -> anyhow::Result<Option<User>>;
}

pub struct PgUserRepo {
	pool: PgPool,
}

impl PgUserRepo {
	pub fn new(pool: PgPool) -> Self {
		Self { pool }
	}
}

#[async_trait]
impl UserRepo for PgUserRepo {
	async fn get_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
		let row = sqlx::query_as::<_, User>(
			r#"SELECT id, username, password_hash, password_salt, role, status
			   FROM users WHERE username = $1"#,
		)
		.bind(username)
		.fetch_optional(&self.pool)
		.await?;
		Ok(row)
	}
}

#[cfg(any(test, feature = "unit-tests"))]
pub mod mock {
	use super::*;
	use tokio::sync::Mutex;

	#[derive(Default)]
	pub struct MockUserRepo {
		rows: Mutex<Vec<User>>,
	}

	impl MockUserRepo {
		pub fn seeded(rows: Vec<User>) -> Self {
			Self {
				rows: Mutex::new(rows),
			}
		}
	}

	#[async_trait]
	impl UserRepo for MockUserRepo {
		async fn get_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
			Ok(self
				.rows
				.lock()
				.await
				.iter()
				.find(|u| u.username == username)
				.cloned())
		}
	}
}
