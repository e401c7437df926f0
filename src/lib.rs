//! edgegrid-proxy - local signing reverse proxy for Akamai APIs
//!
//! Clients talk plain HTTP (or HTTPS) to the proxy; every request is
//! re-targeted at the EdgeGrid API host, signed with `EG1-HMAC-SHA256` and
//! forwarded over HTTPS. Redirects coming back are rewritten so the client
//! stays on the proxy.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use clap::Parser;
//! use edgegrid_proxy::{Cli, Config, EdgeGridSigner, ProxyServer, ProxyService, ReqwestUpstream};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_cli(&Cli::parse())?;
//!     let upstream = ReqwestUpstream::new(&config)?;
//!     let service = ProxyService::new(&config, Arc::new(EdgeGridSigner::new()), Arc::new(upstream));
//!
//!     ProxyServer::bind(&config.listen, service).await?.serve().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - `credentials` / `edgerc` - layered credential resolution
//! - `signer` - the signing seam and the EdgeGrid implementation
//! - `rewrite` - request re-targeting and `Location` rewriting
//! - `http_client` - upstream transport
//! - `server` - forwarding pipeline and listener

pub mod cli;
pub mod config;
pub mod credentials;
pub mod edgerc;
pub mod logger;

// Forwarding pipeline
pub mod body_limiter;
pub mod http_client;
pub mod rewrite;
pub mod server;
pub mod signer;

// TLS termination
pub mod tls;

/// Configuration types
pub use cli::{Cli, LogFormat};
pub use config::{Config, ConfigError, ListenConfig, ProxyScheme};

/// Credentials
pub use credentials::{merge_credentials, CredentialLayer, CredentialSet};

/// Signing
pub use signer::{EdgeGridSigner, SignError, Signer};

/// Forwarding
pub use http_client::{HttpClientError, ReqwestUpstream, Upstream};
pub use rewrite::{rewrite_location, rewrite_request, RewriteError};
pub use server::{ListenError, ProxyServer, ProxyService};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
