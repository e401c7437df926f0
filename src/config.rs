use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::cli::Cli;
use crate::credentials::{self, CredentialSet};

/// Startup configuration errors. All of them are fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("incomplete credentials: missing {}", .missing.join(", "))]
    Incomplete { missing: Vec<&'static str> },

    #[error("failed to read credential file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("credential file {path}, line {line}: {reason}")]
    Parse {
        path: String,
        line: usize,
        reason: String,
    },

    #[error("section '{section}' not found in credential file {path}")]
    MissingSection { path: String, section: String },

    #[error("invalid value for {key}: '{value}'")]
    InvalidValue { key: String, value: String },

    #[error("could not determine the home directory")]
    HomeDirUnavailable,
}

/// Scheme the proxy itself is reachable on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyScheme {
    Http,
    Https,
}

impl ProxyScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProxyScheme::Http => "http",
            ProxyScheme::Https => "https",
        }
    }
}

impl fmt::Display for ProxyScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Listener settings. The scheme is fixed when the value is built.
#[derive(Debug, Clone)]
pub struct ListenConfig {
    addr: String,
    tls: Option<(PathBuf, PathBuf)>,
}

impl ListenConfig {
    /// TLS is enabled only when both paths are present and non-empty
    pub fn new(addr: impl Into<String>, tls_cert: Option<&str>, tls_key: Option<&str>) -> Self {
        let present = |p: Option<&str>| p.map(str::trim).filter(|p| !p.is_empty()).map(PathBuf::from);

        let tls = match (present(tls_cert), present(tls_key)) {
            (Some(cert), Some(key)) => Some((cert, key)),
            _ => None,
        };

        Self {
            addr: addr.into(),
            tls,
        }
    }

    /// Bind address, also advertised in rewritten redirects
    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn scheme(&self) -> ProxyScheme {
        if self.tls.is_some() {
            ProxyScheme::Https
        } else {
            ProxyScheme::Http
        }
    }

    /// Certificate and key paths when TLS is enabled
    pub fn tls_paths(&self) -> Option<(&Path, &Path)> {
        self.tls
            .as_ref()
            .map(|(cert, key)| (cert.as_path(), key.as_path()))
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub listen: ListenConfig,
    pub credentials: Arc<CredentialSet>,

    // Upstream
    pub connect_timeout: Duration,
    pub request_timeout: Duration,

    // Body limits
    pub max_request_body_size: usize,
    pub max_response_body_size: usize,
}

impl Config {
    /// Build the configuration from flags and the process environment
    pub fn from_cli(cli: &Cli) -> Result<Self, ConfigError> {
        Self::from_cli_with_env(cli, |key| env::var(key).ok())
    }

    /// Same as [`Config::from_cli`] with an explicit environment lookup
    pub fn from_cli_with_env<F>(cli: &Cli, env_lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let credentials = credentials::resolve(
            &cli.edgerc,
            &cli.section,
            env_lookup,
            cli.credential_overrides(),
        )?;

        let listen = ListenConfig::new(
            cli.addr.clone(),
            cli.tls_cert.as_deref(),
            cli.tls_key.as_deref(),
        );

        if cli.tls_cert.is_some() != cli.tls_key.is_some() {
            tracing::warn!(
                "Only one of --tls-crt/--tls-key was given; serving plain HTTP"
            );
        }

        Ok(Config {
            listen,
            credentials: Arc::new(credentials),
            connect_timeout: Duration::from_secs(cli.connect_timeout),
            request_timeout: Duration::from_secs(cli.request_timeout),
            max_request_body_size: cli.max_request_body,
            max_response_body_size: cli.max_response_body,
        })
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn cli(args: &[&str]) -> Cli {
        let dir = std::env::temp_dir().join("edgegrid-proxy-no-such-dir");
        let edgerc = dir.join("missing.edgerc");
        let mut argv = vec![
            "edgegrid-proxy".to_string(),
            "--file".to_string(),
            edgerc.display().to_string(),
        ];
        argv.extend(args.iter().map(|a| a.to_string()));
        Cli::try_parse_from(argv).unwrap()
    }

    const CREDS: [&str; 8] = [
        "--host",
        "akab-host.luna.akamaiapis.net",
        "--client-token",
        "ct",
        "--client-secret",
        "cs",
        "--access-token",
        "at",
    ];

    #[test]
    fn test_scheme_plain_without_tls_paths() {
        let listen = ListenConfig::new("127.0.0.1:8080", None, None);
        assert_eq!(listen.scheme(), ProxyScheme::Http);
        assert!(listen.tls_paths().is_none());
    }

    #[test]
    fn test_scheme_requires_both_paths() {
        assert_eq!(
            ListenConfig::new("a", Some("cert.pem"), None).scheme(),
            ProxyScheme::Http
        );
        assert_eq!(
            ListenConfig::new("a", None, Some("key.pem")).scheme(),
            ProxyScheme::Http
        );
        assert_eq!(
            ListenConfig::new("a", Some(""), Some("key.pem")).scheme(),
            ProxyScheme::Http
        );

        let listen = ListenConfig::new("a", Some("cert.pem"), Some("key.pem"));
        assert_eq!(listen.scheme(), ProxyScheme::Https);
        assert_eq!(
            listen.tls_paths(),
            Some((Path::new("cert.pem"), Path::new("key.pem")))
        );
    }

    #[test]
    fn test_scheme_display() {
        assert_eq!(ProxyScheme::Http.to_string(), "http");
        assert_eq!(ProxyScheme::Https.to_string(), "https");
    }

    #[test]
    fn test_from_cli_with_flags_only() {
        let config = Config::from_cli_with_env(&cli(&CREDS), no_env).unwrap();

        assert_eq!(config.listen.addr(), "127.0.0.1:8080");
        assert_eq!(config.listen.scheme(), ProxyScheme::Http);
        assert_eq!(config.credentials.host(), "akab-host.luna.akamaiapis.net");
        assert_eq!(config.credentials.access_token().expose_secret(), "at");
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.max_request_body_size, 100 * 1024 * 1024);
    }

    #[test]
    fn test_from_cli_flags_override_env() {
        let env: HashMap<&str, &str> = [
            ("EDGEGRID_HOST", "env.host"),
            ("EDGEGRID_CLIENT_TOKEN", "env-ct"),
            ("EDGEGRID_CLIENT_SECRET", "env-cs"),
            ("EDGEGRID_ACCESS_TOKEN", "env-at"),
        ]
        .into_iter()
        .collect();

        let config = Config::from_cli_with_env(&cli(&["--host", "flag.host"]), |k| {
            env.get(k).map(|v| v.to_string())
        })
        .unwrap();

        assert_eq!(config.credentials.host(), "flag.host");
        assert_eq!(config.credentials.client_token(), "env-ct");
    }

    #[test]
    fn test_from_cli_incomplete_credentials_fail() {
        let err = Config::from_cli_with_env(&cli(&["--host", "h"]), no_env).unwrap_err();
        assert!(matches!(err, ConfigError::Incomplete { .. }));
    }

    #[test]
    fn test_from_cli_tls_mode() {
        let mut args = CREDS.to_vec();
        args.extend(["--tls-crt", "/tmp/cert.pem", "--tls-key", "/tmp/key.pem"]);
        let config = Config::from_cli_with_env(&cli(&args), no_env).unwrap();

        assert_eq!(config.listen.scheme(), ProxyScheme::Https);
    }
}
