pub mod http;
pub mod tls;

pub use http::HttpObservation;
pub use tls::TlsObservation;
