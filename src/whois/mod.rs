use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Result of `Resolve(name)`: registrar, expiration, and nameservers.
/// Never raised across the boundary — any failure returns the default,
/// empty struct (`spec.md` §4.2 step 7).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WhoisResult {
	pub registrar: Option<String>,
	pub expires_at: Option<DateTime<Utc>>,
	pub nameservers: Vec<String>,
}

/// Normalize `name` to its registrable apex using the public-suffix list,
/// e.g. `api.internal.example.co.uk` -> `example.co.uk`.
///
/// Grounded on `wepavel-rust_ssl_checker`'s `to_root_domain`.
pub fn derive_apex(name: &str) -> Option<String> {
	let parsed = addr::parse_domain_name(name.trim_end_matches('.')).ok()?;
	parsed.root().map(|s| s.to_string())
}

/// Static fallback table used when IANA referral parsing fails, mirroring
/// `voocel-domain-forge`'s convention-based mapping for high-usage TLDs.
fn whois_server_for_tld(tld: &str) -> Option<&'static str> {
	match tld {
		"com" | "net" => Some("whois.verisign-grs.com"),
		"org" => Some("whois.pir.org"),
		"io" => Some("whois.nic.io"),
		"ai" => Some("whois.nic.ai"),
		"co" => Some("whois.nic.co"),
		"me" => Some("whois.nic.me"),
		"xyz" => Some("whois.nic.xyz"),
		"dev" | "app" => Some("whois.nic.google"),
		"info" => Some("whois.afilias.net"),
		"biz" => Some("whois.nic.biz"),
		_ => None,
	}
}

/// Resolve registrar, expiration date, and authoritative nameservers for
/// `name`, falling back to a DNS `NS` lookup when WHOIS yields none.
/// Algorithm unchanged from `spec.md` §4.2 steps 1-7.
pub async fn resolve(name: &str, timeout: Duration) -> WhoisResult {
	match tokio::time::timeout(timeout, resolve_inner(name)).await {
		Ok(r) => r,
		Err(_) => WhoisResult::default(),
	}
}

async fn resolve_inner(name: &str) -> WhoisResult {
	let Some(apex) = derive_apex(name) else {
		return WhoisResult::default();
	};

	let Some(tld) = apex.rsplit('.').next().map(|s| s.to_lowercase()) else {
		return WhoisResult::default();
	};

	let raw = match whois_server_for_tld(&tld) {
		Some(server) => query_whois(server, &apex).await,
		None => resolve_via_iana(&apex, &tld).await,
	};

	let Ok(raw) = raw else {
		return WhoisResult::default();
	};

	let mut result = parse_whois_response(&raw);

	if result.nameservers.is_empty() {
		result.nameservers = ns_lookup_fallback(&apex).await;
	}

	result
}

async fn resolve_via_iana(apex: &str, tld: &str) -> anyhow::Result<String> {
	let iana = query_whois("whois.iana.org", tld).await?;
	let server = parse_iana_whois_server(&iana)
		.or_else(|| parse_iana_refer_server(&iana))
		.ok_or_else(|| anyhow::anyhow!("no WHOIS server discovered for TLD {tld}"))?;
	query_whois(&server, apex).await
}

/// Raw WHOIS query over TCP/43. Grounded on `voocel-domain-forge`'s
/// `WhoisClient::query_whois`.
async fn query_whois(server: &str, query: &str) -> anyhow::Result<String> {
	let addr = format!("{server}:43");
	let mut stream = TcpStream::connect(&addr).await?;
	stream.write_all(format!("{query}\r\n").as_bytes()).await?;

	let mut buf = Vec::new();
	stream.read_to_end(&mut buf).await?;
	Ok(String::from_utf8_lossy(&buf).to_string())
}

fn parse_iana_whois_server(iana: &str) -> Option<String> {
	iana.lines().map(str::trim).find_map(|line| {
		let lower = line.to_lowercase();
		lower
			.starts_with("whois:")
			.then(|| line.splitn(2, ':').nth(1))
			.flatten()
			.map(|s| s.trim().to_string())
			.filter(|s| !s.is_empty())
	})
}

fn parse_iana_refer_server(iana: &str) -> Option<String> {
	iana.lines().map(str::trim).find_map(|line| {
		let lower = line.to_lowercase();
		lower
			.starts_with("refer:")
			.then(|| line.splitn(2, ':').nth(1))
			.flatten()
			.map(|s| s.trim().to_string())
			.filter(|s| !s.is_empty())
	})
}

fn parse_whois_response(output: &str) -> WhoisResult {
	WhoisResult {
		registrar: extract_field(output, &["registrar:", "registrar name:", "sponsoring registrar:"]),
		expires_at: extract_field(
			output,
			&["expiration date:", "expiry date:", "registry expiry date:", "expires:"],
		)
		.and_then(|s| parse_whois_date(&s)),
		nameservers: extract_nameservers(output),
	}
}

fn extract_field(output: &str, patterns: &[&str]) -> Option<String> {
	for pattern in patterns {
		if let Some(line) = output.lines().find(|l| l.to_lowercase().contains(pattern)) {
			if let Some(value) = line.splitn(2, ':').nth(1) {
				let v = value.trim();
				if !v.is_empty() {
					return Some(v.to_string());
				}
			}
		}
	}
	None
}

fn extract_nameservers(output: &str) -> Vec<String> {
	let patterns = ["name server:", "nameserver:", "nserver:"];
	let mut out = Vec::new();
	for line in output.lines() {
		let lower = line.to_lowercase();
		if patterns.iter().any(|p| lower.contains(p)) {
			if let Some(ns) = line.splitn(2, ':').nth(1) {
				let ns = ns.trim().trim_end_matches('.').to_lowercase();
				if !ns.is_empty() && !out.contains(&ns) {
					out.push(ns);
				}
			}
		}
	}
	out
}

/// Try, in order: RFC 3339; `YYYY-MM-DDTHH:MM:SSZ`; `YYYY-MM-DD HH:MM:SS MST`;
/// `YYYY-MM-DD HH:MM:SS`; `YYYY-MM-DD`. The first that parses wins.
fn parse_whois_date(s: &str) -> Option<DateTime<Utc>> {
	let s = s.trim();

	if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
		return Some(dt.with_timezone(&Utc));
	}
	if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%SZ") {
		return Some(dt.with_timezone(&Utc));
	}
	if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S %Z") {
		return Some(dt.with_timezone(&Utc));
	}
	if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
		return Some(Utc.from_utc_datetime(&ndt));
	}
	if let Ok(nd) = chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d") {
		return Some(Utc.from_utc_datetime(&nd.and_hms_opt(0, 0, 0)?));
	}
	None
}

/// Authoritative `NS` DNS lookup fallback, used when the WHOIS record
/// carries no nameservers.
async fn ns_lookup_fallback(apex: &str) -> Vec<String> {
	let Ok(resolver) = hickory_resolver::TokioAsyncResolver::tokio_from_system_conf() else {
		return Vec::new();
	};
	match resolver.ns_lookup(apex).await {
		Ok(lookup) => {
			let mut out = Vec::new();
			for ns in lookup.iter() {
				let s = ns.to_string().trim_end_matches('.').to_lowercase();
				if !s.is_empty() && !out.contains(&s) {
					out.push(s);
				}
			}
			out
		}
		Err(_) => Vec::new(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn s6_apex_derivation() {
		assert_eq!(
			derive_apex("api.internal.example.co.uk").as_deref(),
			Some("example.co.uk")
		);
		assert_eq!(derive_apex("example.com").as_deref(), Some("example.com"));
	}

	#[test]
	fn iana_whois_line_parsing() {
		let sample = "domain:       COM\nwhois:        whois.verisign-grs.com\nstatus: ACTIVE\n";
		assert_eq!(
			parse_iana_whois_server(sample).as_deref(),
			Some("whois.verisign-grs.com")
		);
	}

	#[test]
	fn iana_refer_line_parsing() {
		let sample = "refer: whois.nic.io\n";
		assert_eq!(parse_iana_refer_server(sample).as_deref(), Some("whois.nic.io"));
	}

	#[test]
	fn nameserver_extraction_dedupes_preserving_first_occurrence() {
		let sample = "Name Server: NS1.EXAMPLE.COM.\nName Server: ns2.example.com\nName Server: ns1.example.com.\n";
		let ns = extract_nameservers(sample);
		assert_eq!(ns, vec!["ns1.example.com", "ns2.example.com"]);
	}

	#[test]
	fn date_parse_cascade_tries_each_format() {
		assert!(parse_whois_date("2025-06-01T00:00:00Z").is_some());
		assert!(parse_whois_date("2025-06-01 00:00:00").is_some());
		assert!(parse_whois_date("2025-06-01").is_some());
		assert!(parse_whois_date("not a date").is_none());
	}
}
