//! TLS client setup for broker connections
//!
//! Trust comes from the platform root store plus an optional PEM bundle
//! (`KAFKA_SSL_CA_LOCATION`). Certificate and hostname verification are always on.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use rustls::pki_types::ServerName;
use rustls::{ClientConfig, RootCertStore};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;
use tracing::{debug, warn};

use crate::error::TransportAuthError;

/// Build a verifying rustls client config
pub fn client_config(ca_location: Option<&Path>) -> Result<Arc<ClientConfig>, TransportAuthError> {
    let mut roots = RootCertStore::empty();

    match rustls_native_certs::load_native_certs() {
        Ok(certs) => {
            let (added, ignored) = roots.add_parsable_certificates(certs);
            debug!(added, ignored, "Loaded platform root certificates");
        }
        Err(e) => warn!(error = %e, "Could not load platform root certificates"),
    }

    if let Some(path) = ca_location {
        let file = File::open(path).map_err(|e| {
            TransportAuthError::Tls(format!("cannot open CA bundle {}: {}", path.display(), e))
        })?;
        let mut reader = BufReader::new(file);

        let mut added = 0usize;
        for cert in rustls_pemfile::certs(&mut reader) {
            let cert = cert.map_err(|e| {
                TransportAuthError::Tls(format!("invalid PEM in {}: {}", path.display(), e))
            })?;
            roots
                .add(cert)
                .map_err(|e| TransportAuthError::Tls(format!("rejected CA certificate: {}", e)))?;
            added += 1;
        }

        if added == 0 {
            return Err(TransportAuthError::Tls(format!(
                "no certificates found in {}",
                path.display()
            )));
        }
        debug!(path = %path.display(), added, "Loaded broker CA bundle");
    }

    if roots.is_empty() {
        return Err(TransportAuthError::Tls(
            "no trusted root certificates available".into(),
        ));
    }

    let config = ClientConfig::builder_with_provider(Arc::new(
        rustls::crypto::aws_lc_rs::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .map_err(|e| TransportAuthError::Tls(e.to_string()))?
    .with_root_certificates(roots)
    .with_no_client_auth();

    Ok(Arc::new(config))
}

/// Open a TCP connection to `host:port` and complete a verified TLS handshake
pub async fn connect_tls(
    config: Arc<ClientConfig>,
    host: &str,
    port: u16,
) -> Result<TlsStream<TcpStream>, TransportAuthError> {
    let server_name = ServerName::try_from(host.to_string())
        .map_err(|_| TransportAuthError::InvalidAddress(host.to_string()))?;

    let tcp = TcpStream::connect((host, port)).await?;
    tcp.set_nodelay(true)?;

    TlsConnector::from(config)
        .connect(server_name, tcp)
        .await
        .map_err(|e| TransportAuthError::Tls(e.to_string()))
}
