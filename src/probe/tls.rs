use std::sync::Arc;
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::rustls::client::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use tokio_rustls::rustls::internal::msgs::handshake::DigitallySignedStruct;
use tokio_rustls::rustls::{Certificate, ClientConfig, Error as RustlsError, ServerName};

use crate::tls_utils;

/// A verifier that accepts any certificate and hostname. The TLS probe's
/// purpose is to observe the certificate a server presents, including
/// expired or mismatched ones — rejecting them at the handshake would hide
/// exactly the data this probe exists to collect.
///
/// Grounded on `ssinger-trust-dns`'s `DangerousVerifier` (same rustls 0.21
/// `ServerCertVerifier` shape), repurposed here for a client dial instead
/// of a DNS-over-TLS nameserver connection.
struct AcceptAnyServerCert;

impl ServerCertVerifier for AcceptAnyServerCert {
	fn verify_server_cert(
		&self,
		_end_entity: &Certificate,
		_intermediates: &[Certificate],
		_server_name: &ServerName,
		_scts: &mut dyn Iterator<Item = &[u8]>,
		_ocsp_response: &[u8],
		_now: SystemTime,
	) -> Result<ServerCertVerified, RustlsError> {
		Ok(ServerCertVerified::assertion())
	}

	fn verify_tls12_signature(
		&self,
		_message: &[u8],
		_cert: &Certificate,
		_dss: &DigitallySignedStruct,
	) -> Result<HandshakeSignatureValid, RustlsError> {
		Ok(HandshakeSignatureValid::assertion())
	}

	fn verify_tls13_signature(
		&self,
		_message: &[u8],
		_cert: &Certificate,
		_dss: &DigitallySignedStruct,
	) -> Result<HandshakeSignatureValid, RustlsError> {
		Ok(HandshakeSignatureValid::assertion())
	}
}

fn dangerous_client_config() -> Arc<ClientConfig> {
	let mut cfg = ClientConfig::builder()
		.with_safe_defaults()
		.with_root_certificates(tokio_rustls::rustls::RootCertStore::empty())
		.with_no_client_auth();
	cfg.dangerous()
		.set_certificate_verifier(Arc::new(AcceptAnyServerCert));
	Arc::new(cfg)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsErrorKind {
	Dns,
	Timeout,
	Tcp,
	Tls,
}

#[derive(Debug, Clone, Default)]
pub struct TlsObservation {
	pub reachable: bool,
	pub not_after: Option<DateTime<Utc>>,
	pub issuer_org: Option<String>,
	pub err: Option<String>,
}

/// Dial `name:443`, skip chain/hostname verification, and report what the
/// leaf certificate says. Never raises across the boundary (`spec.md`
/// §4.1/§7): any failure folds into `reachable = false` with a classified
/// error kind recorded in `err`.
pub async fn probe(name: &str, timeout: Duration) -> TlsObservation {
	match tokio::time::timeout(timeout, dial(name)).await {
		Ok(Ok(obs)) => obs,
		Ok(Err((kind, msg))) => TlsObservation {
			reachable: false,
			not_after: None,
			issuer_org: None,
			err: Some(format!("{kind:?}: {msg}")),
		},
		Err(_) => TlsObservation {
			reachable: false,
			not_after: None,
			issuer_org: None,
			err: Some("Timeout: probe deadline exceeded".to_string()),
		},
	}
}

async fn dial(name: &str) -> Result<TlsObservation, (TlsErrorKind, String)> {
	let addr = format!("{name}:443");
	let tcp = TcpStream::connect(&addr)
		.await
		.map_err(|e| (TlsErrorKind::Tcp, e.to_string()))?;

	let server_name = ServerName::try_from(name)
		.map_err(|e| (TlsErrorKind::Dns, e.to_string()))?;

	let connector = TlsConnector::from(dangerous_client_config());
	let tls_stream = connector
		.connect(server_name, tcp)
		.await
		.map_err(|e| (TlsErrorKind::Tls, e.to_string()))?;

	let (_, session) = tls_stream.get_ref();
	let certs = session
		.peer_certificates()
		.ok_or((TlsErrorKind::Tls, "no peer certificates presented".to_string()))?;

	let Some(leaf) = certs.first() else {
		return Ok(TlsObservation {
			reachable: false,
			not_after: None,
			issuer_org: None,
			err: Some("empty peer certificate chain".to_string()),
		});
	};

	let parsed = tls_utils::parse_first_cert_x509(leaf)
		.map_err(|e| (TlsErrorKind::Tls, e.to_string()))?;

	let not_after = parsed.validity().not_after.to_datetime();
	let not_after = DateTime::from_timestamp(not_after.unix_timestamp(), 0);

	let issuer_org = parsed
		.issuer()
		.iter_organization()
		.next()
		.and_then(|o| o.as_str().ok())
		.map(|s| s.to_string());

	Ok(TlsObservation {
		reachable: true,
		not_after,
		issuer_org,
		err: None,
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn unreachable_host_yields_not_reachable_observation() {
		// RFC 5737 TEST-NET-1, reserved and expected to fail fast.
		let obs = probe("192.0.2.1", Duration::from_millis(200)).await;
		assert!(!obs.reachable);
		assert!(obs.err.is_some());
	}

	#[tokio::test]
	async fn invalid_server_name_is_classified_as_dns_error() {
		let obs = probe("not a valid hostname!!", Duration::from_secs(1)).await;
		assert!(!obs.reachable);
	}
}
