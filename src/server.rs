use std::convert::Infallible;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use http::{Request, Response, StatusCode};
use http_body_util::Full;
use hyper::body::{Body, Bytes};
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, error, info, warn};

use crate::body_limiter::{read_body_with_limit, BoxError};
use crate::config::{Config, ListenConfig, ProxyScheme};
use crate::credentials::CredentialSet;
use crate::http_client::Upstream;
use crate::rewrite::{rewrite_location, rewrite_request};
use crate::signer::Signer;
use crate::tls;

/// Failures while opening the listening socket. Fatal at startup.
#[derive(Debug, Error)]
pub enum ListenError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid TLS material in {path}: {reason}")]
    TlsMaterial { path: String, reason: String },

    #[error("failed to build TLS configuration: {0}")]
    TlsConfig(#[source] rustls::Error),
}

/// The forwarding pipeline: rewrite → sign → upstream → rewrite `Location`.
///
/// Holds only read-only state, so one instance serves every connection.
pub struct ProxyService {
    credentials: Arc<CredentialSet>,
    signer: Arc<dyn Signer>,
    upstream: Arc<dyn Upstream>,
    scheme: ProxyScheme,
    advertised_addr: String,
    max_request_body_size: usize,
}

impl ProxyService {
    pub fn new(config: &Config, signer: Arc<dyn Signer>, upstream: Arc<dyn Upstream>) -> Self {
        Self {
            credentials: Arc::clone(&config.credentials),
            signer,
            upstream,
            scheme: config.listen.scheme(),
            advertised_addr: config.listen.addr().to_string(),
            max_request_body_size: config.max_request_body_size,
        }
    }

    /// Forward one inbound request. Failures are turned into error
    /// responses for this request only.
    pub async fn handle<B>(&self, req: Request<B>) -> Response<Full<Bytes>>
    where
        B: Body<Data = Bytes>,
        B::Error: Into<BoxError>,
    {
        let start_time = Instant::now();
        let method = req.method().clone();
        let (parts, body) = req.into_parts();

        debug!("Received {} request for {}", method, parts.uri);

        let body = match read_body_with_limit(body, self.max_request_body_size).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("[HTTP] Body limit error: {}", e);
                return error_response(e.status_code(), e.to_response_message());
            }
        };

        let mut outbound = Request::from_parts(parts, body);

        if let Err(e) = rewrite_request(&mut outbound, self.credentials.host()) {
            warn!("[HTTP] Cannot target upstream: {}", e);
            return error_response(StatusCode::BAD_REQUEST, e.to_string());
        }

        if let Err(e) = self.signer.sign(&mut outbound, &self.credentials) {
            error!("[HTTP] Signing failed: {}", e);
            return error_response(
                StatusCode::BAD_GATEWAY,
                format!("Failed to sign request: {}", e),
            );
        }

        let path = outbound.uri().path().to_string();

        match self.upstream.send(outbound).await {
            Ok(mut response) => {
                rewrite_location(response.headers_mut(), self.scheme, &self.advertised_addr);

                info!(
                    method = %method,
                    host = %self.credentials.host(),
                    path = %path,
                    status = response.status().as_u16(),
                    duration_ms = start_time.elapsed().as_millis() as u64,
                    "Forwarded request"
                );

                response.map(Full::new)
            }
            Err(e) => {
                error!(
                    method = %method,
                    path = %path,
                    duration_ms = start_time.elapsed().as_millis() as u64,
                    "[HTTP] Forward failed: {}",
                    e
                );
                error_response(e.status_code(), e.to_string())
            }
        }
    }
}

fn error_response(status: StatusCode, message: impl Into<Bytes>) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(message.into()));
    *response.status_mut() = status;
    response
}

/// A bound listener ready to serve
pub struct ProxyServer {
    listener: TcpListener,
    tls_acceptor: Option<TlsAcceptor>,
    scheme: ProxyScheme,
    service: Arc<ProxyService>,
}

impl ProxyServer {
    /// Bind the listening socket, loading TLS material first when enabled
    pub async fn bind(listen: &ListenConfig, service: ProxyService) -> Result<Self, ListenError> {
        let tls_acceptor = match listen.tls_paths() {
            Some((cert, key)) => Some(tls::create_tls_acceptor(cert, key)?),
            None => None,
        };

        let listener = TcpListener::bind(listen.addr())
            .await
            .map_err(|source| ListenError::Bind {
                addr: listen.addr().to_string(),
                source,
            })?;

        Ok(Self {
            listener,
            tls_acceptor,
            scheme: listen.scheme(),
            service: Arc::new(service),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn scheme(&self) -> ProxyScheme {
        self.scheme
    }

    /// Accept connections until `shutdown` resolves
    pub async fn serve_with_shutdown<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        match self.local_addr() {
            Ok(addr) => info!("Starting EdgeGrid proxy on {}://{}", self.scheme, addr),
            Err(_) => info!("Starting EdgeGrid proxy ({})", self.scheme),
        }

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => {
                            debug!("Accepted connection from {}", peer_addr);

                            let service = Arc::clone(&self.service);
                            let tls_acceptor = self.tls_acceptor.clone();

                            tokio::spawn(async move {
                                match tls_acceptor {
                                    Some(acceptor) => match acceptor.accept(stream).await {
                                        Ok(tls_stream) => serve_http1(tls_stream, service, peer_addr).await,
                                        Err(e) => warn!("TLS handshake with {} failed: {}", peer_addr, e),
                                    },
                                    None => serve_http1(stream, service, peer_addr).await,
                                }
                            });
                        }
                        Err(e) => {
                            error!("Failed to accept connection: {}", e);
                        }
                    }
                }
                _ = &mut shutdown => {
                    info!("Shutting down server...");
                    break;
                }
            }
        }
    }

    /// Accept connections for the lifetime of the process
    pub async fn serve(self) {
        self.serve_with_shutdown(std::future::pending()).await
    }
}

/// Serve HTTP/1.1 on one connection, plain or TLS
async fn serve_http1<I>(io: I, service: Arc<ProxyService>, peer_addr: SocketAddr)
where
    I: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let io = TokioIo::new(io);

    let conn = hyper::server::conn::http1::Builder::new().serve_connection(
        io,
        service_fn(move |req| {
            let service = Arc::clone(&service);
            async move { Ok::<_, Infallible>(service.handle(req).await) }
        }),
    );

    if let Err(e) = conn.await {
        debug!("HTTP/1.1 connection error from {}: {}", peer_addr, e);
    }
}
