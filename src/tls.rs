use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::ServerConfig;
use rustls_pemfile::{certs, private_key};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use tokio_rustls::TlsAcceptor;

use crate::server::ListenError;

/// Load TLS certificates and private key from PEM files.
///
/// The key may be PKCS#8, PKCS#1 (RSA) or SEC1 (EC); the first one found
/// is used.
pub fn load_certs_and_key(
    cert_path: &Path,
    key_path: &Path,
) -> Result<(Vec<CertificateDer<'static>>, PrivateKeyDer<'static>), ListenError> {
    let material_error = |path: &Path, reason: String| ListenError::TlsMaterial {
        path: path.display().to_string(),
        reason,
    };

    let cert_file = File::open(cert_path).map_err(|e| material_error(cert_path, e.to_string()))?;
    let mut cert_reader = BufReader::new(cert_file);
    let certs: Vec<CertificateDer> = certs(&mut cert_reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| material_error(cert_path, e.to_string()))?;

    if certs.is_empty() {
        return Err(material_error(cert_path, "no certificates found".to_string()));
    }

    let key_file = File::open(key_path).map_err(|e| material_error(key_path, e.to_string()))?;
    let mut key_reader = BufReader::new(key_file);
    let key = private_key(&mut key_reader)
        .map_err(|e| material_error(key_path, e.to_string()))?
        .ok_or_else(|| material_error(key_path, "no private key found".to_string()))?;

    Ok((certs, key))
}

/// Create the TLS acceptor for the proxy listener (HTTP/1.1 only)
pub fn create_tls_acceptor(cert_path: &Path, key_path: &Path) -> Result<TlsAcceptor, ListenError> {
    let (certs, key) = load_certs_and_key(cert_path, key_path)?;

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let mut tls_config = ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(ListenError::TlsConfig)?
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(ListenError::TlsConfig)?;

    tls_config.alpn_protocols = vec![b"http/1.1".to_vec()];

    Ok(TlsAcceptor::from(Arc::new(tls_config)))
}
