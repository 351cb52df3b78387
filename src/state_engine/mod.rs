//! Per-domain state machine: `classify(prior, obs) -> (patch, events)`.
//!
//! ```text
//!      +---- Valid ----+
//!      |               |
//!      v               v
//!   Warning <-------> Critical ---> Expired
//!      ^               ^              |
//!      |               |              v
//!      +-------- Offline <------------+
//! ```
//! Every edge is data-driven by the classification rules below; `Offline` is
//! absorbing only for the duration a probe keeps failing.

use chrono::{DateTime, Utc};

use crate::notifier::model::EventName;
use crate::probe::http::HttpObservation;
use crate::probe::tls::TlsObservation;
use crate::store::model::{DomainPatch, MonitoredDomain, TlsStatus};
use crate::whois::WhoisResult;

#[derive(Debug, Clone)]
pub struct TransitionEvent {
	pub kind: EventName,
	pub domain: String,
	pub status: Option<TlsStatus>,
	pub status_code: i32,
	pub days_remaining: Option<i64>,
	pub expiry: Option<DateTime<Utc>>,
	pub registrar: Option<String>,
}

/// Ceiling-on-hours day arithmetic: `⌈(not_after - now) / 1 day⌉`, rounding
/// toward positive infinity including negative remainders, so "1.2 days
/// remaining" reads as 2 and "-0.3 days" (just expired) reads as -1, not 0.
/// This is a contract per `spec.md` §9, not incidental.
pub fn days_remaining(not_after: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
	let hours = (not_after - now).num_hours();
	div_ceil_i64(hours, 24)
}

fn div_ceil_i64(n: i64, d: i64) -> i64 {
	let q = n / d;
	let r = n % d;
	if (r > 0 && d > 0) || (r < 0 && d < 0) {
		q + 1
	} else {
		q
	}
}

/// TLS classification per §3 invariants 2-6.
pub fn classify_tls_status(
	not_after: Option<DateTime<Utc>>,
	now: DateTime<Utc>,
	critical_threshold_days: i64,
	warning_threshold_days: i64,
) -> (TlsStatus, Option<i64>) {
	let Some(not_after) = not_after else {
		return (TlsStatus::Offline, None);
	};
	if not_after <= now {
		return (TlsStatus::Expired, Some(days_remaining(not_after, now)));
	}
	let days = days_remaining(not_after, now);
	let status = if days < critical_threshold_days {
		TlsStatus::Critical
	} else if days < warning_threshold_days {
		TlsStatus::Warning
	} else {
		TlsStatus::Valid
	};
	(status, Some(days))
}

/// Classify a TLS/WHOIS sweep observation for `name` against its prior
/// record, producing the store patch and any transition events.
///
/// The `SSL_CRITICAL` 24h dedup check against `last_notification_at` is
/// performed here, at classification time, so the Notifier does not need a
/// second dedup pass for that event (Open Question 2, `SPEC_FULL.md` §9).
pub fn classify_tls(
	name: &str,
	prior: Option<&MonitoredDomain>,
	obs: &TlsObservation,
	whois: &WhoisResult,
	now: DateTime<Utc>,
	critical_threshold_days: i64,
	warning_threshold_days: i64,
	dedup_window: chrono::Duration,
) -> (DomainPatch, Vec<TransitionEvent>) {
	let not_after = if obs.reachable { obs.not_after } else { None };
	let (status, days) = if obs.reachable {
		classify_tls_status(not_after, now, critical_threshold_days, warning_threshold_days)
	} else {
		(TlsStatus::Offline, None)
	};

	let patch = DomainPatch::from_tls_observation(
		not_after,
		obs.issuer_org.clone(),
		days,
		status,
		whois.registrar.clone(),
		whois.expires_at,
		whois.nameservers.clone(),
		now,
	);

	let prior_status = prior.and_then(|p| p.tls.status);
	let mut events = Vec::new();

	let at_risk_now = matches!(status, TlsStatus::Critical | TlsStatus::Expired);

	if at_risk_now {
		// `last_notification_at` is set on the first SSL_CRITICAL and never
		// cleared on recovery, so it still gates a later re-entry into
		// Critical/Expired even when the domain dipped back to Valid in
		// between (e.g. a renew-then-expire flap). Firing unconditionally on
		// "status just became at-risk" would bypass the 24h floor in that
		// case and violate invariant 8.
		let dedup_expired = prior
			.and_then(|p| p.last_notification_at)
			.map(|t| now - t >= dedup_window)
			.unwrap_or(true);
		if dedup_expired {
			events.push(TransitionEvent {
				kind: EventName::SslCritical,
				domain: name.to_string(),
				status: Some(status),
				status_code: prior.map(|p| p.http.last_status_code.unwrap_or(0)).unwrap_or(0),
				days_remaining: days,
				expiry: not_after,
				registrar: whois.registrar.clone(),
			});
		}
	} else if status == TlsStatus::Warning
		&& !matches!(
			prior_status,
			Some(TlsStatus::Warning) | Some(TlsStatus::Critical) | Some(TlsStatus::Expired)
		)
	{
		events.push(TransitionEvent {
			kind: EventName::SslWarning,
			domain: name.to_string(),
			status: Some(status),
			status_code: 0,
			days_remaining: days,
			expiry: not_after,
			registrar: whois.registrar.clone(),
		});
	}

	(patch, events)
}

/// Classify an HTTP liveness sweep observation for `name` against its prior
/// record. `SITE_DOWN` has no dedup window anywhere in this pipeline —
/// reproduced exactly per `spec.md` §9 Open Question 2; a flapping site can
/// generate one notification per HTTP sweep tick (default every 2 min).
pub fn classify_http(
	name: &str,
	prior: Option<&MonitoredDomain>,
	obs: &HttpObservation,
	now: DateTime<Utc>,
) -> (DomainPatch, Vec<TransitionEvent>) {
	let patch =
		DomainPatch::from_http_observation(obs.is_live, obs.status_code, obs.rtt_ms, now);

	let prior_live = prior.and_then(|p| p.http.is_live);
	let mut events = Vec::new();

	if prior_live == Some(true) && !obs.is_live {
		events.push(TransitionEvent {
			kind: EventName::SiteDown,
			domain: name.to_string(),
			status: prior.and_then(|p| p.tls.status),
			status_code: obs.status_code,
			days_remaining: prior.and_then(|p| p.tls.days_remaining),
			expiry: prior.and_then(|p| p.tls.not_after),
			registrar: prior.and_then(|p| p.reg.registrar.clone()),
		});
	} else if prior_live == Some(false) && obs.is_live {
		events.push(TransitionEvent {
			kind: EventName::SiteRecovered,
			domain: name.to_string(),
			status: prior.and_then(|p| p.tls.status),
			status_code: obs.status_code,
			days_remaining: prior.and_then(|p| p.tls.days_remaining),
			expiry: prior.and_then(|p| p.tls.not_after),
			registrar: prior.and_then(|p| p.reg.registrar.clone()),
		});
	}

	(patch, events)
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::TimeZone;

	fn dt(s: &str) -> DateTime<Utc> {
		DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
	}

	#[test]
	fn s1_classification_valid() {
		let now = dt("2025-01-01T00:00:00Z");
		let not_after = dt("2025-03-15T00:00:00Z");
		let (status, days) = classify_tls_status(Some(not_after), now, 7, 30);
		assert_eq!(status, TlsStatus::Valid);
		assert_eq!(days, Some(73));
	}

	#[test]
	fn s2_classification_warning_with_ceil_on_hours() {
		let now = dt("2025-01-01T00:00:00Z");
		let not_after = dt("2025-01-20T00:00:00Z");
		let (status, days) = classify_tls_status(Some(not_after), now, 7, 30);
		assert_eq!(status, TlsStatus::Warning);
		assert_eq!(days, Some(19));
	}

	#[test]
	fn s3_classification_critical_and_dedup() {
		let now = dt("2025-01-01T00:00:00Z");
		let not_after = dt("2025-01-04T00:00:00Z");
		let (status, days) = classify_tls_status(Some(not_after), now, 7, 30);
		assert_eq!(status, TlsStatus::Critical);
		assert_eq!(days, Some(3));

		let obs = TlsObservation {
			reachable: true,
			not_after: Some(not_after),
			issuer_org: None,
			err: None,
		};
		let whois = WhoisResult::default();

		let (_patch, events) = classify_tls(
			"example.com",
			None,
			&obs,
			&whois,
			now,
			7,
			30,
			chrono::Duration::hours(24),
		);
		assert_eq!(events.len(), 1);
		assert_eq!(events[0].kind, EventName::SslCritical);

		// second identical observation 1h later, already notified: no emit.
		let prior = MonitoredDomain {
			last_notification_at: Some(now),
			tls: crate::store::model::TlsInfo {
				status: Some(TlsStatus::Critical),
				..Default::default()
			},
			..MonitoredDomain::new_unseen("example.com", now)
		};
		let (_patch2, events2) = classify_tls(
			"example.com",
			Some(&prior),
			&obs,
			&whois,
			now + chrono::Duration::hours(1),
			7,
			30,
			chrono::Duration::hours(24),
		);
		assert!(events2.is_empty());
	}

	#[test]
	fn ssl_critical_dedup_survives_a_recovery_flap() {
		// T0: Critical, notified. T0+2h: briefly Valid (renewed), then back
		// to Critical before the 24h window elapses. `became_at_risk` would
		// be true again at T0+2h because the prior observation was Valid,
		// but `last_notification_at` is still within the window, so the
		// event must not fire a second time (invariant 8).
		let t0 = dt("2025-01-01T00:00:00Z");
		let not_after = dt("2025-01-04T00:00:00Z");
		let critical_obs = TlsObservation {
			reachable: true,
			not_after: Some(not_after),
			issuer_org: None,
			err: None,
		};
		let whois = WhoisResult::default();

		let notified = MonitoredDomain {
			last_notification_at: Some(t0),
			tls: crate::store::model::TlsInfo {
				status: Some(TlsStatus::Valid),
				..Default::default()
			},
			..MonitoredDomain::new_unseen("example.com", t0)
		};

		let (_patch, events) = classify_tls(
			"example.com",
			Some(&notified),
			&critical_obs,
			&whois,
			t0 + chrono::Duration::hours(2),
			7,
			30,
			chrono::Duration::hours(24),
		);
		assert!(events.is_empty());
	}

	#[test]
	fn s4_expired() {
		let now = dt("2025-01-01T00:00:00Z");
		let not_after = dt("2024-12-31T00:00:00Z");
		let (status, days) = classify_tls_status(Some(not_after), now, 7, 30);
		assert_eq!(status, TlsStatus::Expired);
		assert_eq!(days, Some(-1));
	}

	#[test]
	fn s5_site_down_transition() {
		let now = dt("2025-01-01T00:00:00Z");
		let prior = MonitoredDomain {
			http: crate::store::model::HttpInfo {
				is_live: Some(true),
				last_status_code: Some(200),
				response_time_ms: Some(12),
			},
			..MonitoredDomain::new_unseen("x.example.com", now)
		};
		let obs = HttpObservation {
			is_live: false,
			status_code: 0,
			rtt_ms: 0,
		};
		let (patch, events) = classify_http("x.example.com", Some(&prior), &obs, now);
		assert_eq!(patch.http_is_live, Some(Some(false)));
		assert_eq!(events.len(), 1);
		assert_eq!(events[0].kind, EventName::SiteDown);
	}

	#[test]
	fn offline_when_tls_dial_fails_independent_of_http() {
		let now = dt("2025-01-01T00:00:00Z");
		let obs = TlsObservation {
			reachable: false,
			not_after: None,
			issuer_org: None,
			err: Some("connect timeout".to_string()),
		};
		let whois = WhoisResult::default();
		let (patch, _events) =
			classify_tls("example.com", None, &obs, &whois, now, 7, 30, chrono::Duration::hours(24));
		assert_eq!(patch.tls_status, Some(Some(TlsStatus::Offline)));
	}

	#[test]
	fn invariant_determinism() {
		let now = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
		for days in [-5, 0, 6, 7, 29, 30, 100] {
			let not_after = now + chrono::Duration::days(days) + chrono::Duration::hours(1);
			let (status, _) = classify_tls_status(Some(not_after), now, 7, 30);
			let (status2, _) = classify_tls_status(Some(not_after), now, 7, 30);
			assert_eq!(status, status2);
		}
	}
}
