use std::sync::Arc;

use crate::config::Settings;
use crate::observability::MetricsRegistry;
use crate::store::{DeliveryRepo, DomainRepo, NotifyConfigRepo, TemplateRepo, UserRepo};

/// Application state passed to handlers via Axum's `State` extractor, and
/// threaded through the orchestrator's sweep loops and ad-hoc scan path.
///
/// Grounded on the teacher's `AppState` (`src/state.rs`): the same
/// repository-trait-object-behind-`Arc` shape, generalized from the single
/// `AgeRepo` to the four repositories this service needs plus a shared
/// `reqwest::Client` for probing and notification delivery.
#[derive(Clone)]
pub struct AppState {
	pub repo: Arc<dyn DomainRepo>,
	pub notify_repo: Arc<dyn NotifyConfigRepo>,
	pub template_repo: Arc<dyn TemplateRepo>,
	pub user_repo: Arc<dyn UserRepo>,
	pub delivery_repo: Arc<dyn DeliveryRepo>,
	pub http_client: reqwest::Client,
	pub settings: Arc<Settings>,
	pub metrics: Arc<MetricsRegistry>,
}

impl AppState {
	pub fn new(
		repo: Arc<dyn DomainRepo>,
		notify_repo: Arc<dyn NotifyConfigRepo>,
		template_repo: Arc<dyn TemplateRepo>,
		user_repo: Arc<dyn UserRepo>,
		delivery_repo: Arc<dyn DeliveryRepo>,
		settings: Arc<Settings>,
		metrics: Arc<MetricsRegistry>,
	) -> Self {
		let http_client = reqwest::Client::builder()
			.build()
			.expect("reqwest client with default TLS backend must build");
		Self {
			repo,
			notify_repo,
			template_repo,
			user_repo,
			delivery_repo,
			http_client,
			settings,
			metrics,
		}
	}

	#[cfg(test)]
	pub fn for_tests(
		repo: Arc<dyn DomainRepo>,
		notify_repo: Arc<dyn NotifyConfigRepo>,
		template_repo: Arc<dyn TemplateRepo>,
	) -> Self {
		Self::new(
			repo,
			notify_repo,
			template_repo,
			Arc::new(crate::store::user::mock::MockUserRepo::default()),
			Arc::new(crate::store::delivery::mock::MockDeliveryRepo::default()),
			Arc::new(Settings::default()),
			Arc::new(MetricsRegistry::new()),
		)
	}
}
