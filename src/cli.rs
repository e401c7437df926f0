use clap::{Parser, ValueEnum};
use secrecy::SecretString;

use crate::credentials::CredentialLayer;

pub const DEFAULT_PROXY_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_EDGERC_PATH: &str = "~/.edgerc";
pub const DEFAULT_SECTION: &str = "default";

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Command-line flags.
///
/// Credential flags are the highest-priority layer; they override both the
/// credential file and the `EDGEGRID_*` environment variables.
#[derive(Parser, Debug, Clone)]
#[command(name = "edgegrid-proxy", version, about = "EdgeGrid signing reverse proxy")]
pub struct Cli {
    /// Proxy listen address
    #[arg(short = 'a', long = "addr", default_value = DEFAULT_PROXY_ADDR)]
    pub addr: String,

    /// Location of the EdgeGrid credential file
    #[arg(short = 'r', long = "file", default_value = DEFAULT_EDGERC_PATH)]
    pub edgerc: String,

    /// Section of the EdgeGrid credential file
    #[arg(short = 's', long = "section", default_value = DEFAULT_SECTION)]
    pub section: String,

    /// Account switch key
    #[arg(short = 'k', long = "key")]
    pub account_key: Option<String>,

    /// EdgeGrid API host
    #[arg(long)]
    pub host: Option<String>,

    /// EdgeGrid client token
    #[arg(long)]
    pub client_token: Option<String>,

    /// EdgeGrid client secret
    #[arg(long)]
    pub client_secret: Option<String>,

    /// EdgeGrid access token
    #[arg(long)]
    pub access_token: Option<String>,

    /// TLS certificate file for the proxy listener (PEM)
    #[arg(long = "tls-crt")]
    pub tls_cert: Option<String>,

    /// TLS private key file for the proxy listener (PEM)
    #[arg(long = "tls-key")]
    pub tls_key: Option<String>,

    /// Upstream connect timeout in seconds
    #[arg(long, default_value_t = 10)]
    pub connect_timeout: u64,

    /// Upstream request timeout in seconds
    #[arg(long, default_value_t = 60)]
    pub request_timeout: u64,

    /// Maximum inbound request body size in bytes
    #[arg(long, default_value_t = 100 * 1024 * 1024)]
    pub max_request_body: usize,

    /// Maximum upstream response body size in bytes
    #[arg(long, default_value_t = 100 * 1024 * 1024)]
    pub max_response_body: usize,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl Cli {
    /// Credential values given explicitly on the command line
    pub fn credential_overrides(&self) -> CredentialLayer {
        CredentialLayer {
            host: self.host.clone(),
            client_token: self.client_token.clone(),
            client_secret: self.client_secret.clone().map(SecretString::new),
            access_token: self.access_token.clone().map(SecretString::new),
            account_key: self.account_key.clone(),
            max_body: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["edgegrid-proxy"]).unwrap();

        assert_eq!(cli.addr, "127.0.0.1:8080");
        assert_eq!(cli.edgerc, "~/.edgerc");
        assert_eq!(cli.section, "default");
        assert!(cli.tls_cert.is_none());
        assert!(cli.tls_key.is_none());
        assert_eq!(cli.log_format, LogFormat::Text);
        assert_eq!(cli.connect_timeout, 10);
    }

    #[test]
    fn test_short_and_long_flags() {
        let cli = Cli::try_parse_from([
            "edgegrid-proxy",
            "-a",
            "0.0.0.0:9000",
            "-r",
            "/etc/edgerc",
            "-s",
            "ccu",
            "-k",
            "1-ABCD",
            "--host",
            "akab-host.luna.akamaiapis.net",
            "--tls-crt",
            "cert.pem",
            "--tls-key",
            "key.pem",
            "--log-format",
            "json",
        ])
        .unwrap();

        assert_eq!(cli.addr, "0.0.0.0:9000");
        assert_eq!(cli.edgerc, "/etc/edgerc");
        assert_eq!(cli.section, "ccu");
        assert_eq!(cli.account_key.as_deref(), Some("1-ABCD"));
        assert_eq!(cli.tls_cert.as_deref(), Some("cert.pem"));
        assert_eq!(cli.tls_key.as_deref(), Some("key.pem"));
        assert_eq!(cli.log_format, LogFormat::Json);
    }

    #[test]
    fn test_credential_overrides() {
        let cli = Cli::try_parse_from([
            "edgegrid-proxy",
            "--client-token",
            "ct",
            "--client-secret",
            "cs",
            "--access-token",
            "at",
        ])
        .unwrap();

        let layer = cli.credential_overrides();
        assert!(layer.host.is_none());
        assert_eq!(layer.client_token.as_deref(), Some("ct"));
        assert_eq!(layer.client_secret.unwrap().expose_secret(), "cs");
        assert_eq!(layer.access_token.unwrap().expose_secret(), "at");
        assert!(layer.account_key.is_none());
    }

    #[test]
    fn test_unknown_flag_rejected() {
        assert!(Cli::try_parse_from(["edgegrid-proxy", "--bogus"]).is_err());
    }
}
