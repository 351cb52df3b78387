pub mod dto;
pub mod handlers;

use axum::Router;
use axum::routing::{get, post, put};

use crate::state::AppState;

/// The `/v1/**` command/query façade (`spec.md` §6): scaffolder, catalog
/// proxy, and dashboard HTML live outside this core's scope (§1 Non-goals)
/// — only their JSON contract with the observability core is implemented.
pub fn router() -> Router<AppState> {
	Router::new()
		.route("/v1/auth/login", post(handlers::login))
		.route("/v1/scan", get(handlers::scan))
		.route("/v1/domains", get(handlers::list_domains))
		.route("/v1/domains/{id}/auto-renew", put(handlers::set_auto_renew))
		.route("/v1/dashboard/stats", get(handlers::dashboard_stats))
		.route(
			"/v1/admin/notifications/configs",
			get(handlers::list_notification_configs).post(handlers::create_notification_config),
		)
		.route(
			"/v1/admin/notifications/configs/{id}",
			put(handlers::update_notification_config).delete(handlers::delete_notification_config),
		)
		.route(
			"/v1/admin/notifications/templates",
			get(handlers::list_templates).post(handlers::create_template),
		)
		.route(
			"/v1/admin/notifications/templates/{id}",
			put(handlers::update_template).delete(handlers::delete_template),
		)
		.route(
			"/v1/admin/notifications/telegram",
			get(handlers::list_telegram_configs).post(handlers::create_telegram_config),
		)
		.route(
			"/v1/admin/notifications/telegram/{id}",
			put(handlers::update_telegram_config).delete(handlers::delete_telegram_config),
		)
		.route(
			"/v1/admin/notifications/telegram/{id}/test",
			post(handlers::test_telegram_config),
		)
}
