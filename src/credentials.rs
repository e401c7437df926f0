//! EdgeGrid credential resolution
//!
//! Credentials come from three layers, lowest priority first:
//!
//! 1. a named section of the `.edgerc` file
//! 2. `EDGEGRID_*` environment variables
//! 3. explicit command-line flags
//!
//! Each layer is a [`CredentialLayer`]; [`merge_credentials`] folds them into
//! a validated, immutable [`CredentialSet`].

use std::fmt;
use std::path::{Path, PathBuf};

use http::uri::Authority;
use secrecy::{ExposeSecret, SecretString};
use tracing::info;

use crate::config::ConfigError;
use crate::edgerc::{self, Section};
use crate::logger::mask;

/// Default number of body bytes covered by the content hash
pub const DEFAULT_MAX_BODY: usize = 131_072;

const ENV_PREFIX: &str = "EDGEGRID";

/// One source of credential values. `None` means "not provided here".
#[derive(Debug, Clone, Default)]
pub struct CredentialLayer {
    pub host: Option<String>,
    pub client_token: Option<String>,
    pub client_secret: Option<SecretString>,
    pub access_token: Option<SecretString>,
    pub account_key: Option<String>,
    pub max_body: Option<usize>,
}

impl CredentialLayer {
    /// Build a layer from a parsed `.edgerc` section
    pub fn from_section(section: &Section) -> Result<Self, ConfigError> {
        let get = |key: &str| section.get(key).cloned();

        Ok(Self {
            host: get("host"),
            client_token: get("client_token"),
            client_secret: get("client_secret").map(SecretString::new),
            access_token: get("access_token").map(SecretString::new),
            account_key: get("account_key").or_else(|| get("account_switch_key")),
            max_body: get("max_body")
                .map(|v| parse_max_body("max_body", &v))
                .transpose()?,
        }
        .normalized())
    }

    /// Build a layer from environment variables.
    ///
    /// For the `default` section the plain `EDGEGRID_<FIELD>` names are used.
    /// Other sections first look up `EDGEGRID_<SECTION>_<FIELD>` and fall back
    /// to the plain name.
    pub fn from_env<F>(section: &str, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let scope = env_scope(section);
        let get = |field: &str| {
            scope
                .as_ref()
                .and_then(|scope| lookup(&format!("{}_{}_{}", ENV_PREFIX, scope, field)))
                .filter(|v| !v.is_empty())
                .or_else(|| lookup(&format!("{}_{}", ENV_PREFIX, field)))
        };

        let max_body = match get("MAX_BODY") {
            Some(v) => Some(parse_max_body("EDGEGRID_MAX_BODY", &v)?),
            None => None,
        };

        Ok(Self {
            host: get("HOST"),
            client_token: get("CLIENT_TOKEN"),
            client_secret: get("CLIENT_SECRET").map(SecretString::new),
            access_token: get("ACCESS_TOKEN").map(SecretString::new),
            account_key: get("ACCOUNT_KEY"),
            max_body,
        }
        .normalized())
    }

    /// Drop empty values so they never shadow a lower layer
    fn normalized(self) -> Self {
        fn text(v: Option<String>) -> Option<String> {
            v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
        }
        fn secret(v: Option<SecretString>) -> Option<SecretString> {
            v.filter(|s| !s.expose_secret().trim().is_empty())
        }

        Self {
            host: text(self.host),
            client_token: text(self.client_token),
            client_secret: secret(self.client_secret),
            access_token: secret(self.access_token),
            account_key: text(self.account_key),
            max_body: self.max_body,
        }
    }

    /// Values from `upper` win; anything `upper` leaves unset falls through
    fn overlay(self, upper: CredentialLayer) -> CredentialLayer {
        let upper = upper.normalized();
        CredentialLayer {
            host: upper.host.or(self.host),
            client_token: upper.client_token.or(self.client_token),
            client_secret: upper.client_secret.or(self.client_secret),
            access_token: upper.access_token.or(self.access_token),
            account_key: upper.account_key.or(self.account_key),
            max_body: upper.max_body.or(self.max_body),
        }
    }
}

/// Complete, validated EdgeGrid credentials. Immutable once built.
#[derive(Clone)]
pub struct CredentialSet {
    host: String,
    client_token: String,
    client_secret: SecretString,
    access_token: SecretString,
    account_key: Option<String>,
    max_body: usize,
}

impl CredentialSet {
    /// API host without scheme, e.g. `akab-xxxx.luna.akamaiapis.net`
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn client_token(&self) -> &str {
        &self.client_token
    }

    pub fn client_secret(&self) -> &SecretString {
        &self.client_secret
    }

    pub fn access_token(&self) -> &SecretString {
        &self.access_token
    }

    pub fn account_key(&self) -> Option<&str> {
        self.account_key.as_deref()
    }

    pub fn max_body(&self) -> usize {
        self.max_body
    }
}

impl TryFrom<CredentialLayer> for CredentialSet {
    type Error = ConfigError;

    fn try_from(layer: CredentialLayer) -> Result<Self, Self::Error> {
        let layer = layer.normalized();

        let mut missing = Vec::new();
        if layer.host.is_none() {
            missing.push("host");
        }
        if layer.client_token.is_none() {
            missing.push("client_token");
        }
        if layer.client_secret.is_none() {
            missing.push("client_secret");
        }
        if layer.access_token.is_none() {
            missing.push("access_token");
        }

        match (
            layer.host,
            layer.client_token,
            layer.client_secret,
            layer.access_token,
        ) {
            (Some(host), Some(client_token), Some(client_secret), Some(access_token)) => {
                let host = normalize_host(&host);
                if host.is_empty() {
                    return Err(ConfigError::Incomplete {
                        missing: vec!["host"],
                    });
                }
                if Authority::try_from(host.as_str()).is_err() {
                    return Err(ConfigError::InvalidValue {
                        key: "host".to_string(),
                        value: host,
                    });
                }
                Ok(Self {
                    host,
                    client_token,
                    client_secret,
                    access_token,
                    account_key: layer.account_key,
                    max_body: layer.max_body.unwrap_or(DEFAULT_MAX_BODY),
                })
            }
            _ => Err(ConfigError::Incomplete { missing }),
        }
    }
}

impl fmt::Debug for CredentialSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialSet")
            .field("host", &self.host)
            .field("client_token", &mask(&self.client_token))
            .field("client_secret", &"[REDACTED]")
            .field("access_token", &"[REDACTED]")
            .field("account_key", &self.account_key.as_deref().map(mask))
            .field("max_body", &self.max_body)
            .finish()
    }
}

/// Merge the three layers (flags > env > file) and validate the result
pub fn merge_credentials(
    file: CredentialLayer,
    env: CredentialLayer,
    flags: CredentialLayer,
) -> Result<CredentialSet, ConfigError> {
    CredentialSet::try_from(file.normalized().overlay(env).overlay(flags))
}

/// Resolve credentials from the credential file, environment and flags
pub fn resolve<F>(
    edgerc_path: &str,
    section: &str,
    env_lookup: F,
    flags: CredentialLayer,
) -> Result<CredentialSet, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let path = expand_home(edgerc_path)?;

    let file_layer = match edgerc::read_section(&path, section)? {
        Some(values) => {
            info!(
                section = %section,
                path = %path.display(),
                "Reading EdgeGrid credentials from file"
            );
            CredentialLayer::from_section(&values)?
        }
        None => CredentialLayer::default(),
    };
    let env_layer = CredentialLayer::from_env(section, env_lookup)?;

    let credentials = merge_credentials(file_layer, env_layer, flags)?;

    info!(
        host = %credentials.host(),
        client_token = %mask(credentials.client_token()),
        "EdgeGrid credentials resolved"
    );
    if let Some(key) = credentials.account_key() {
        info!(account_switch_key = %mask(key), "Using account switch key");
    }

    Ok(credentials)
}

/// Expand a leading `~` to the current user's home directory
pub fn expand_home(path: &str) -> Result<PathBuf, ConfigError> {
    let rest = match path.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') || rest.starts_with('\\') => rest,
        _ => return Ok(PathBuf::from(path)),
    };

    let home = dirs::home_dir().ok_or(ConfigError::HomeDirUnavailable)?;
    let rest = rest.trim_start_matches(['/', '\\']);
    Ok(if rest.is_empty() {
        home
    } else {
        home.join(Path::new(rest))
    })
}

fn env_scope(section: &str) -> Option<String> {
    if section.eq_ignore_ascii_case("default") {
        return None;
    }
    Some(
        section
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect(),
    )
}

fn parse_max_body(key: &str, value: &str) -> Result<usize, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        })
}

// `.edgerc` files generated by some tools carry the scheme or a trailing slash
fn normalize_host(host: &str) -> String {
    let host = host.trim();
    let host = host
        .strip_prefix("https://")
        .or_else(|| host.strip_prefix("http://"))
        .unwrap_or(host);
    host.trim_end_matches('/').to_string()
}
