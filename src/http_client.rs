use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use http::{HeaderMap, Request, Response, StatusCode, Version};
use tracing::{debug, warn};

use crate::config::Config;
use crate::rewrite::strip_hop_by_hop;

#[derive(Debug, thiserror::Error)]
pub enum HttpClientError {
    #[error("Upstream request timed out")]
    Timeout,

    #[error("Failed to connect to upstream: {0}")]
    Connect(String),

    #[error("Upstream response too large: {size} bytes (limit: {limit})")]
    ResponseTooLarge { size: usize, limit: usize },

    #[error("Invalid upstream request: {0}")]
    InvalidRequest(String),

    #[error("Upstream request failed: {0}")]
    Request(String),

    #[error("Failed to build upstream client: {0}")]
    Build(String),
}

impl HttpClientError {
    /// Status returned to the client when forwarding fails
    pub fn status_code(&self) -> StatusCode {
        match self {
            HttpClientError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::BAD_GATEWAY,
        }
    }
}

impl From<reqwest::Error> for HttpClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            HttpClientError::Timeout
        } else if e.is_connect() {
            HttpClientError::Connect(e.to_string())
        } else if e.is_builder() {
            HttpClientError::InvalidRequest(e.to_string())
        } else {
            HttpClientError::Request(e.to_string())
        }
    }
}

/// Sends a fully prepared request to the API host.
///
/// Implementations must not follow redirects; the proxy rewrites them for
/// the client instead.
#[async_trait]
pub trait Upstream: Send + Sync {
    async fn send(&self, request: Request<Bytes>) -> Result<Response<Bytes>, HttpClientError>;
}

/// Upstream backed by a pooled `reqwest` client
#[derive(Debug, Clone)]
pub struct ReqwestUpstream {
    client: reqwest::Client,
    max_response_body_size: usize,
}

impl ReqwestUpstream {
    pub fn new(config: &Config) -> Result<Self, HttpClientError> {
        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| HttpClientError::Build(e.to_string()))?;

        Ok(Self {
            client,
            max_response_body_size: config.max_response_body_size,
        })
    }
}

#[async_trait]
impl Upstream for ReqwestUpstream {
    async fn send(&self, mut request: Request<Bytes>) -> Result<Response<Bytes>, HttpClientError> {
        // Inbound HTTP/1.0 must not downgrade the upstream hop
        *request.version_mut() = Version::HTTP_11;

        let request = reqwest::Request::try_from(request)?;
        debug!("[HTTP Client] {} {}", request.method(), request.url().path());

        let mut upstream = self.client.execute(request).await?;

        let status = upstream.status();
        let mut headers = upstream.headers().clone();
        strip_hop_by_hop(&mut headers);

        let body = read_response_body(&mut upstream, self.max_response_body_size).await?;

        Ok(build_response(status, headers, body))
    }
}

async fn read_response_body(
    response: &mut reqwest::Response,
    limit: usize,
) -> Result<Bytes, HttpClientError> {
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            warn!(
                "[HTTP Client] Response Content-Length {} exceeds limit {}",
                len, limit
            );
            return Err(HttpClientError::ResponseTooLarge {
                size: len as usize,
                limit,
            });
        }
    }

    let mut body = BytesMut::new();
    while let Some(chunk) = response.chunk().await? {
        if body.len() + chunk.len() > limit {
            warn!("[HTTP Client] Response body exceeded limit {}", limit);
            return Err(HttpClientError::ResponseTooLarge {
                size: body.len() + chunk.len(),
                limit,
            });
        }
        body.extend_from_slice(&chunk);
    }

    Ok(body.freeze())
}

fn build_response(status: StatusCode, headers: HeaderMap, body: Bytes) -> Response<Bytes> {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}
