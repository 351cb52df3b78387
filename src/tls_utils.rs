use anyhow::Result;
use tokio_rustls::rustls::Certificate;

/// Parse the DER-encoded certificate bytes and return the x509 parser's `X509Certificate`.
pub fn parse_first_cert_x509<'a>(
	cert: &'a Certificate,
) -> Result<x509_parser::certificate::X509Certificate<'a>> {
	let res = x509_parser::parse_x509_certificate(&cert.0)
		.map_err(|e| anyhow::anyhow!("failed to parse x509 certificate: {:?}", e))?;
	Ok(res.1)
}
