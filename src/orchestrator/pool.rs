use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;

use crate::notifier;
use crate::probe;
use crate::state::AppState;
use crate::state_engine::{self, TransitionEvent};
use crate::store::TlsStatus;
use crate::whois;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepKind {
	Tls,
	Http,
}

impl SweepKind {
	pub fn as_str(&self) -> &'static str {
		match self {
			SweepKind::Tls => "tls",
			SweepKind::Http => "http",
		}
	}
}

pub struct ScanJob {
	pub name: String,
}

#[derive(Debug, Clone)]
pub struct ScanResult {
	pub name: String,
	pub status: Option<TlsStatus>,
	pub expiry: Option<chrono::DateTime<Utc>>,
	pub days_remaining: Option<i64>,
	pub issuer_org: Option<String>,
	pub registrar: Option<String>,
	pub registrar_expiry: Option<chrono::DateTime<Utc>>,
	pub nameservers: Vec<String>,
	pub is_live: bool,
	pub status_code: i32,
}

/// Run `names` through a bounded pool of `worker_count` workers, invoking
/// C1 (TLS sweep also invokes C2) per job with a per-probe deadline,
/// streaming results through the State Engine one at a time and upserting
/// into the Domain Store. Used unchanged by both the periodic sweep loops
/// and the ad-hoc scan path (`spec.md` §4.4).
///
/// Grounded on the teacher's job/result `mpsc` channel pair
/// (`src/persist/mod.rs`'s batcher) generalized into an explicit
/// worker-task pool, per the "goroutine-style channels" guidance in
/// `spec.md` §9.
pub async fn run_sweep(
	state: &AppState,
	kind: SweepKind,
	names: Vec<String>,
	worker_count: usize,
	probe_deadline: Duration,
) -> Vec<ScanResult> {
	let (job_tx, job_rx) = mpsc::channel::<ScanJob>(names.len().max(1));
	let (result_tx, mut result_rx) = mpsc::channel::<ScanResult>(names.len().max(1));

	let job_rx = Arc::new(tokio::sync::Mutex::new(job_rx));

	let mut workers = Vec::with_capacity(worker_count);
	for _ in 0..worker_count {
		let job_rx = job_rx.clone();
		let result_tx = result_tx.clone();
		let state = state.clone();
		workers.push(tokio::spawn(async move {
			loop {
				let job = {
					let mut rx = job_rx.lock().await;
					rx.recv().await
				};
				let Some(job) = job else { break };
				let result = match kind {
					SweepKind::Tls => run_tls_job(&state, &job.name, probe_deadline).await,
					SweepKind::Http => run_http_job(&state, &job.name, probe_deadline).await,
				};
				if result_tx.send(result).await.is_err() {
					break;
				}
			}
		}));
	}
	drop(result_tx);

	for name in names {
		if job_tx.send(ScanJob { name }).await.is_err() {
			break;
		}
	}
	drop(job_tx);

	let mut results = Vec::new();
	while let Some(r) = result_rx.recv().await {
		results.push(r);
	}

	for w in workers {
		let _ = w.await;
	}

	results
}

async fn run_tls_job(state: &AppState, name: &str, deadline: Duration) -> ScanResult {
	let obs = probe::tls::probe(name, deadline).await;
	let whois_result = whois::resolve(name, state.settings.whois_timeout()).await;

	let prior = state.repo.get_by_name(name).await.ok().flatten();
	let now = Utc::now();

	let (patch, events) = state_engine::classify_tls(
		name,
		prior.as_ref(),
		&obs,
		&whois_result,
		now,
		state.settings.critical_threshold_days,
		state.settings.warning_threshold_days,
		chrono::Duration::seconds(state.settings.ssl_critical_dedup_secs),
	);

	let written = state.repo.upsert(name, patch).await;
	state.metrics.probe_tls_total.inc();

	let mut scan_result = ScanResult {
		name: name.to_string(),
		status: None,
		expiry: obs.not_after,
		days_remaining: None,
		issuer_org: obs.issuer_org.clone(),
		registrar: whois_result.registrar.clone(),
		registrar_expiry: whois_result.expires_at,
		nameservers: whois_result.nameservers.clone(),
		is_live: prior.as_ref().and_then(|p| p.http.is_live).unwrap_or(false),
		status_code: prior
			.as_ref()
			.and_then(|p| p.http.last_status_code)
			.unwrap_or(0),
	};

	match written {
		Ok(row) => {
			state.metrics.store_upsert_total.inc();
			scan_result.status = row.tls.status;
			scan_result.days_remaining = row.tls.days_remaining;
			dispatch_events(state, events, &row).await;
		}
		Err(e) => {
			// Upsert failure suppresses event emission for this observation
			// (at-most-once delivery relative to the persisted view).
			tracing::warn!(domain = name, error = %e, "store upsert failed during TLS sweep, dropping events");
		}
	}

	scan_result
}

async fn run_http_job(state: &AppState, name: &str, deadline: Duration) -> ScanResult {
	let obs = probe::http::probe(&state.http_client, name, deadline).await;

	let prior = state.repo.get_by_name(name).await.ok().flatten();
	let now = Utc::now();

	let (patch, events) = state_engine::classify_http(name, prior.as_ref(), &obs, now);
	let written = state.repo.upsert(name, patch).await;
	state.metrics.probe_http_total.inc();

	let mut scan_result = ScanResult {
		name: name.to_string(),
		status: prior.as_ref().and_then(|p| p.tls.status),
		expiry: prior.as_ref().and_then(|p| p.tls.not_after),
		days_remaining: prior.as_ref().and_then(|p| p.tls.days_remaining),
		issuer_org: prior.as_ref().and_then(|p| p.tls.issuer_org.clone()),
		registrar: prior.as_ref().and_then(|p| p.reg.registrar.clone()),
		registrar_expiry: prior.as_ref().and_then(|p| p.reg.expires_at),
		nameservers: prior
			.as_ref()
			.map(|p| p.reg.nameservers.clone())
			.unwrap_or_default(),
		is_live: obs.is_live,
		status_code: obs.status_code,
	};

	match written {
		Ok(row) => {
			state.metrics.store_upsert_total.inc();
			scan_result.status = row.tls.status;
			dispatch_events(state, events, &row).await;
		}
		Err(e) => {
			tracing::warn!(domain = name, error = %e, "store upsert failed during HTTP sweep, dropping events");
		}
	}

	scan_result
}

async fn dispatch_events(
	state: &AppState,
	events: Vec<TransitionEvent>,
	row: &crate::store::MonitoredDomain,
) {
	if events.is_empty() {
		return;
	}
	for event in events {
		notifier::handle_event(state, event, row).await;
	}
}
