use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, Default)]
pub struct HttpObservation {
	pub is_live: bool,
	pub status_code: i32,
	pub rtt_ms: i64,
}

/// Probe `name` over HTTP: `https://` first, `http://` on failure.
/// `is_live` iff any attempt returned a status in `[200, 400)`. Never
/// raises across the boundary — transport failures simply leave
/// `is_live = false`, `status_code = 0` (`spec.md` §4.1/§7).
pub async fn probe(client: &reqwest::Client, name: &str, timeout: Duration) -> HttpObservation {
	let start = Instant::now();
	let mut last_status: i32 = 0;

	for scheme in ["https", "http"] {
		let url = format!("{scheme}://{name}");
		if let Ok(resp) = client.get(&url).timeout(timeout).send().await {
			let status = resp.status().as_u16() as i32;
			last_status = status;
			if (200..400).contains(&status) {
				return HttpObservation {
					is_live: true,
					status_code: status,
					rtt_ms: start.elapsed().as_millis() as i64,
				};
			}
		}
	}

	HttpObservation {
		is_live: false,
		status_code: last_status,
		rtt_ms: start.elapsed().as_millis() as i64,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn unreachable_host_reports_not_live() {
		let client = reqwest::Client::new();
		let obs = probe(&client, "192.0.2.1", Duration::from_millis(200)).await;
		assert!(!obs.is_live);
		assert_eq!(obs.status_code, 0);
	}
}
