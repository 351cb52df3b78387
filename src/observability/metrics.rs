use prometheus::{
	HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

/// Central registry for all Prometheus metrics, exposed unauthenticated at
/// `GET /metrics`. Names and label sets are fixed by `spec.md` §6/§9.
pub struct MetricsRegistry {
	registry: Registry,

	pub probe_tls_total: IntCounter,
	pub probe_http_total: IntCounter,
	pub sweep_duration_seconds: HistogramVec,
	pub sweep_overlap_dropped_total: IntCounterVec,
	pub notify_sent_total: IntCounterVec,
	pub notify_failed_total: IntCounterVec,
	pub store_upsert_total: IntCounter,
}

impl MetricsRegistry {
	pub fn new() -> Self {
		let registry = Registry::new();

		let probe_tls_total = IntCounter::with_opts(
			Opts::new("heimdall_probe_tls_total", "Total TLS probes performed").namespace("heimdall"),
		)
		.unwrap();

		let probe_http_total = IntCounter::with_opts(
			Opts::new("heimdall_probe_http_total", "Total HTTP liveness probes performed")
				.namespace("heimdall"),
		)
		.unwrap();

		let sweep_duration_seconds = HistogramVec::new(
			HistogramOpts::new("heimdall_sweep_duration_seconds", "Sweep wall-clock duration")
				.namespace("heimdall")
				.buckets(vec![0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 300.0, 900.0]),
			&["kind"],
		)
		.unwrap();

		let sweep_overlap_dropped_total = IntCounterVec::new(
			Opts::new(
				"heimdall_sweep_overlap_dropped_total",
				"Sweep ticks dropped because the previous run of the same kind was still in flight",
			)
			.namespace("heimdall"),
			&["kind"],
		)
		.unwrap();

		let notify_sent_total = IntCounterVec::new(
			Opts::new("heimdall_notify_sent_total", "Notifications delivered successfully")
				.namespace("heimdall"),
			&["channel", "event"],
		)
		.unwrap();

		let notify_failed_total = IntCounterVec::new(
			Opts::new("heimdall_notify_failed_total", "Notification delivery failures")
				.namespace("heimdall"),
			&["channel", "event"],
		)
		.unwrap();

		let store_upsert_total = IntCounter::with_opts(
			Opts::new("heimdall_store_upsert_total", "Total domain store upserts").namespace("heimdall"),
		)
		.unwrap();

		registry.register(Box::new(probe_tls_total.clone())).unwrap();
		registry.register(Box::new(probe_http_total.clone())).unwrap();
		registry.register(Box::new(sweep_duration_seconds.clone())).unwrap();
		registry
			.register(Box::new(sweep_overlap_dropped_total.clone()))
			.unwrap();
		registry.register(Box::new(notify_sent_total.clone())).unwrap();
		registry.register(Box::new(notify_failed_total.clone())).unwrap();
		registry.register(Box::new(store_upsert_total.clone())).unwrap();

		Self {
			registry,
			probe_tls_total,
			probe_http_total,
			sweep_duration_seconds,
			sweep_overlap_dropped_total,
			notify_sent_total,
			notify_failed_total,
			store_upsert_total,
		}
	}

	/// Encode metrics in Prometheus text format
	pub fn encode(&self) -> String {
		let encoder = TextEncoder::new();
		let metric_families = self.registry.gather();
		match encoder.encode_to_string(&metric_families) {
			Ok(s) => s,
			Err(e) => {
				eprintln!("Failed to encode metrics: {}", e);
				String::new()
			}
		}
	}
}

impl Default for MetricsRegistry {
	fn default() -> Self {
		Self::new()
	}
}

/// Initialize the global metrics registry
pub fn init_metrics() -> anyhow::Result<Arc<MetricsRegistry>> {
	Ok(Arc::new(MetricsRegistry::new()))
}

#[cfg(feature = "unit-tests")]
mod tests {
	#[test]
	fn metrics_registry_creation() {
		let registry = super::MetricsRegistry::new();
		assert!(!registry.encode().is_empty());
	}

	#[test]
	fn metrics_increment() {
		let registry = super::MetricsRegistry::new();
		registry.probe_tls_total.inc();
		registry
			.sweep_overlap_dropped_total
			.with_label_values(&["tls"])
			.inc();
		assert!(!registry.encode().is_empty());
	}
}
