//! Request signing
//!
//! [`Signer`] is the seam between the forwarding pipeline and the signing
//! algorithm. [`EdgeGridSigner`] implements Akamai's `EG1-HMAC-SHA256`
//! scheme:
//!
//! ```text
//! auth_header  = "EG1-HMAC-SHA256 client_token=..;access_token=..;timestamp=..;nonce=..;"
//! signing_key  = base64(hmac_sha256(client_secret, timestamp))
//! data_to_sign = METHOD \t scheme \t host \t path?query \t headers \t content_hash \t auth_header
//! signature    = base64(hmac_sha256(signing_key, data_to_sign))
//! ```
//!
//! The signed request carries `Authorization: <auth_header>signature=<signature>`.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use http::header::{HeaderName, HeaderValue, AUTHORIZATION};
use http::uri::PathAndQuery;
use http::{Method, Request, Uri};
use secrecy::ExposeSecret;
use sha2::{Digest, Sha256};
use thiserror::Error;
use url::form_urlencoded;

use crate::credentials::CredentialSet;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "EG1-HMAC-SHA256";
const ACCOUNT_SWITCH_PARAM: &str = "accountSwitchKey";

#[derive(Debug, Error)]
pub enum SignError {
    #[error("request has no scheme")]
    MissingScheme,

    #[error("request has no authority")]
    MissingAuthority,

    #[error("invalid request URI: {0}")]
    InvalidUri(String),

    #[error("invalid signing key")]
    InvalidKey,

    #[error("signature is not a valid header value")]
    InvalidHeader(#[from] http::header::InvalidHeaderValue),
}

/// Attaches an authentication header to an outbound request.
///
/// Called after the request has been pointed at the API host, since the
/// signature covers the host.
pub trait Signer: Send + Sync {
    fn sign(
        &self,
        request: &mut Request<Bytes>,
        credentials: &CredentialSet,
    ) -> Result<(), SignError>;
}

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;
type NonceSource = Arc<dyn Fn() -> String + Send + Sync>;

/// EdgeGrid v1 request signer
#[derive(Clone)]
pub struct EdgeGridSigner {
    headers_to_sign: Vec<HeaderName>,
    clock: Clock,
    nonce: NonceSource,
}

impl Default for EdgeGridSigner {
    fn default() -> Self {
        Self {
            headers_to_sign: Vec::new(),
            clock: Arc::new(Utc::now),
            nonce: Arc::new(|| uuid::Uuid::new_v4().to_string()),
        }
    }
}

impl std::fmt::Debug for EdgeGridSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EdgeGridSigner")
            .field("headers_to_sign", &self.headers_to_sign)
            .finish_non_exhaustive()
    }
}

impl EdgeGridSigner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request headers whose values are covered by the signature
    pub fn with_headers_to_sign(mut self, headers: Vec<HeaderName>) -> Self {
        self.headers_to_sign = headers;
        self
    }

    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> DateTime<Utc> + Send + Sync + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    pub fn with_nonce_source<F>(mut self, nonce: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.nonce = Arc::new(nonce);
        self
    }

    /// Compute the `Authorization` header value for `request` as it stands
    pub fn authorization(
        &self,
        request: &Request<Bytes>,
        credentials: &CredentialSet,
    ) -> Result<String, SignError> {
        let timestamp = format_timestamp((self.clock)());
        let nonce = (self.nonce)();

        let auth_header = format!(
            "{} client_token={};access_token={};timestamp={};nonce={};",
            ALGORITHM,
            credentials.client_token(),
            credentials.access_token().expose_secret(),
            timestamp,
            nonce,
        );

        let uri = request.uri();
        let scheme = uri.scheme_str().ok_or(SignError::MissingScheme)?;
        let host = uri.authority().ok_or(SignError::MissingAuthority)?;
        let path = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");

        let data_to_sign = [
            request.method().as_str().to_ascii_uppercase(),
            scheme.to_ascii_lowercase(),
            host.as_str().to_ascii_lowercase(),
            path.to_string(),
            self.canonicalize_headers(request),
            content_hash(request, credentials.max_body()),
            auth_header.clone(),
        ]
        .join("\t");

        let signing_key = hmac_base64(
            credentials.client_secret().expose_secret().as_bytes(),
            timestamp.as_bytes(),
        )?;
        let signature = hmac_base64(signing_key.as_bytes(), data_to_sign.as_bytes())?;

        Ok(format!("{}signature={}", auth_header, signature))
    }

    fn canonicalize_headers(&self, request: &Request<Bytes>) -> String {
        self.headers_to_sign
            .iter()
            .filter_map(|name| {
                let value = request.headers().get(name)?.to_str().ok()?;
                let value = value.split_whitespace().collect::<Vec<_>>().join(" ");
                Some(format!("{}:{}", name.as_str(), value))
            })
            .collect::<Vec<_>>()
            .join("\t")
    }
}

impl Signer for EdgeGridSigner {
    fn sign(
        &self,
        request: &mut Request<Bytes>,
        credentials: &CredentialSet,
    ) -> Result<(), SignError> {
        if let Some(key) = credentials.account_key() {
            let uri = with_account_switch_key(request.uri(), key)?;
            *request.uri_mut() = uri;
        }

        let authorization = self.authorization(request, credentials)?;
        request
            .headers_mut()
            .insert(AUTHORIZATION, HeaderValue::from_str(&authorization)?);
        Ok(())
    }
}

/// `YYYYMMDDTHH:MM:SS+0000`
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y%m%dT%H:%M:%S+0000").to_string()
}

fn hmac_base64(key: &[u8], data: &[u8]) -> Result<String, SignError> {
    let mut mac = HmacSha256::new_from_slice(key).map_err(|_| SignError::InvalidKey)?;
    mac.update(data);
    Ok(BASE64.encode(mac.finalize().into_bytes()))
}

// Only POST bodies are hashed, truncated to max_body bytes
fn content_hash(request: &Request<Bytes>, max_body: usize) -> String {
    let body = request.body();
    if request.method() != Method::POST || body.is_empty() {
        return String::new();
    }

    let covered = &body[..body.len().min(max_body)];
    BASE64.encode(Sha256::digest(covered))
}

// Appended to the raw query so the path and existing parameters are sent
// (and signed) exactly as received
fn with_account_switch_key(uri: &Uri, key: &str) -> Result<Uri, SignError> {
    let query = uri.query().unwrap_or("");
    if form_urlencoded::parse(query.as_bytes()).any(|(name, _)| name == ACCOUNT_SWITCH_PARAM) {
        return Ok(uri.clone());
    }

    let pair = form_urlencoded::Serializer::new(String::new())
        .append_pair(ACCOUNT_SWITCH_PARAM, key)
        .finish();
    let path_and_query = if query.is_empty() {
        format!("{}?{}", uri.path(), pair)
    } else {
        format!("{}?{}&{}", uri.path(), query, pair)
    };

    let mut parts = uri.clone().into_parts();
    parts.path_and_query = Some(
        path_and_query
            .parse::<PathAndQuery>()
            .map_err(|e| SignError::InvalidUri(e.to_string()))?,
    );
    Uri::from_parts(parts).map_err(|e| SignError::InvalidUri(e.to_string()))
}
