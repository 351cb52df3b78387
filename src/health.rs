use axum::{extract::State, http::StatusCode, response::IntoResponse};

/// DB health endpoint: returns 200 OK when the configured repo can run a
/// simple query, otherwise returns 503 Service Unavailable.
pub async fn db_health(State(state): State<crate::state::AppState>) -> impl IntoResponse {
	match state.repo.ping().await {
		Ok(()) => (StatusCode::OK, "OK").into_response(),
		Err(e) => (StatusCode::SERVICE_UNAVAILABLE, format!("db error: {}", e)).into_response(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::state::AppState;
	use crate::store::mock::MockDomainRepo;
	use crate::store::notify_config::mock::{MockNotifyConfigRepo, MockTemplateRepo};
	use crate::store::{DomainRepo, NotifyConfigRepo, TemplateRepo};
	use std::sync::Arc;

	#[tokio::test]
	async fn health_check_returns_ok_when_db_healthy() {
		let state = AppState::for_tests(
			Arc::new(MockDomainRepo::new()) as Arc<dyn DomainRepo>,
			Arc::new(MockNotifyConfigRepo::default()) as Arc<dyn NotifyConfigRepo>,
			Arc::new(MockTemplateRepo::default()) as Arc<dyn TemplateRepo>,
		);

		let response = db_health(State(state)).await.into_response();
		assert_eq!(response.status(), StatusCode::OK);
	}

	struct DownRepo;

	#[async_trait::async_trait]
	impl DomainRepo for DownRepo {
		async fn upsert(
			&self,
			_name: &str,
			_patch: crate::store::DomainPatch,
		) -> anyhow::Result<crate::store::MonitoredDomain> {
			anyhow::bail!("database unavailable")
		}
		async fn list(
			&self,
			_filter: crate::store::DomainFilter,
			_order: crate::store::DomainOrder,
		) -> anyhow::Result<Vec<crate::store::MonitoredDomain>> {
			anyhow::bail!("database unavailable")
		}
		async fn get_by_name(&self, _name: &str) -> anyhow::Result<Option<crate::store::MonitoredDomain>> {
			anyhow::bail!("database unavailable")
		}
		async fn soft_delete(&self, _name: &str) -> anyhow::Result<()> {
			anyhow::bail!("database unavailable")
		}
		async fn set_auto_renew(&self, _id: uuid::Uuid, _auto_renew: bool) -> anyhow::Result<()> {
			anyhow::bail!("database unavailable")
		}
		async fn ping(&self) -> anyhow::Result<()> {
			anyhow::bail!("database unavailable")
		}
	}

	#[tokio::test]
	async fn health_check_returns_service_unavailable_when_db_fails() {
		let state = AppState::for_tests(
			Arc::new(DownRepo) as Arc<dyn DomainRepo>,
			Arc::new(MockNotifyConfigRepo::default()) as Arc<dyn NotifyConfigRepo>,
			Arc::new(MockTemplateRepo::default()) as Arc<dyn TemplateRepo>,
		);

		let response = db_health(State(state)).await.into_response();
		assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
	}
}
