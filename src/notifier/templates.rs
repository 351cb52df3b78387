use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::notifier::model::EventName;
use crate::state_engine::TransitionEvent;

static KEY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{\{\s*([a-zA-Z0-9_]+)\s*\}\}").unwrap());

/// Literal `{{key}}` substitution, not a full template language, so behavior
/// stays trivially identical across reimplementations (`spec.md` §9).
/// Whitespace around the key is ignored; unknown keys are left untouched.
pub fn render(tmpl: &str, data: &HashMap<&str, String>) -> String {
	KEY_RE
		.replace_all(tmpl, |caps: &regex::Captures| {
			let key = &caps[1];
			data.get(key).cloned().unwrap_or_else(|| caps[0].to_string())
		})
		.into_owned()
}

/// Build the substitution map from a transition event (`spec.md` §4.6
/// step 2): `status`/`status_code`/`code` all carry the HTTP status code,
/// `days`/`days_remaining` the TLS day count, `expiry`/`expiry_date` the TLS
/// expiry timestamp, `ssl_status` the TLS classification string.
pub fn substitution_map(event: &TransitionEvent) -> HashMap<&'static str, String> {
	let mut m = HashMap::new();
	m.insert("domain", event.domain.clone());
	m.insert("status", event.status_code.to_string());
	m.insert("status_code", event.status_code.to_string());
	m.insert("code", event.status_code.to_string());
	m.insert(
		"days",
		event
			.days_remaining
			.map(|d| d.to_string())
			.unwrap_or_default(),
	);
	m.insert(
		"days_remaining",
		event
			.days_remaining
			.map(|d| d.to_string())
			.unwrap_or_default(),
	);
	m.insert(
		"expiry",
		event
			.expiry
			.map(|t| t.to_rfc3339())
			.unwrap_or_default(),
	);
	m.insert(
		"expiry_date",
		event
			.expiry
			.map(|t| t.to_rfc3339())
			.unwrap_or_default(),
	);
	m.insert("registrar", event.registrar.clone().unwrap_or_default());
	m.insert(
		"ssl_status",
		event.status.map(|s| s.as_str().to_string()).unwrap_or_default(),
	);
	m
}

/// Hard-coded fallback used when no `MessageTemplate` row exists for an
/// event kind (`spec.md` §4.6 step 1, §7 "template-missing uses the
/// fallback and logs once per event kind").
pub fn fallback_title(event: EventName) -> &'static str {
	match event {
		EventName::SiteDown => "Site down",
		EventName::SiteRecovered => "Site recovered",
		EventName::SslCritical => "Certificate critical",
		EventName::SslWarning => "Certificate expiring soon",
	}
}

pub fn fallback_body(event: EventName) -> &'static str {
	match event {
		EventName::SiteDown => "{{domain}} is unreachable (status {{status}}).",
		EventName::SiteRecovered => "{{domain}} has recovered.",
		EventName::SslCritical => "{{domain}} certificate is critical: {{days}} day(s) remaining.",
		EventName::SslWarning => "{{domain}} certificate expires in {{days}} day(s).",
	}
}

pub fn fallback_text(event: EventName) -> &'static str {
	fallback_body(event)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::notifier::model::EventName as Ev;

	fn map(pairs: &[(&'static str, &str)]) -> HashMap<&'static str, String> {
		pairs.iter().map(|(k, v)| (*k, v.to_string())).collect()
	}

	#[test]
	fn s5_chinese_text_template_renders_literally() {
		let tmpl = "🚨 告警：站点 {{domain}} 无法访问！状态码：{{status}}";
		let data = map(&[("domain", "x.example.com"), ("status", "0")]);
		assert_eq!(render(tmpl, &data), "🚨 告警：站点 x.example.com 无法访问！状态码：0");
	}

	#[test]
	fn unknown_keys_are_left_as_literal() {
		let data = map(&[("domain", "example.com")]);
		assert_eq!(render("{{domain}} / {{nope}}", &data), "example.com / {{nope}}");
	}

	#[test]
	fn whitespace_around_key_is_ignored() {
		let data = map(&[("domain", "example.com")]);
		assert_eq!(render("{{ domain }}", &data), "example.com");
	}

	#[test]
	fn render_is_idempotent_when_all_keys_resolve() {
		let data = map(&[("domain", "example.com"), ("status", "200")]);
		let once = render("{{domain}} -> {{status}}", &data);
		let twice = render(&once, &data);
		assert_eq!(once, twice);
	}

	#[test]
	fn fallback_tables_cover_every_event() {
		for ev in [Ev::SiteDown, Ev::SiteRecovered, Ev::SslCritical, Ev::SslWarning] {
			assert!(!fallback_title(ev).is_empty());
			assert!(!fallback_body(ev).is_empty());
		}
	}
}
