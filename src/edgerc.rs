//! `.edgerc` credential file parsing
//!
//! The file is INI-style: `[section]` headers followed by `key = value`
//! lines. Lines starting with `#` or `;` are comments. Keys that appear
//! before the first header belong to the `default` section.

use std::collections::HashMap;
use std::path::Path;

use tracing::debug;

use crate::config::ConfigError;

const DEFAULT_SECTION: &str = "default";

/// Key/value pairs of one named section
pub type Section = HashMap<String, String>;

/// Parsed credential file
#[derive(Debug, Default)]
pub struct Edgerc {
    sections: HashMap<String, Section>,
}

impl Edgerc {
    /// Parse file contents. `origin` is only used in error messages.
    pub fn parse(contents: &str, origin: &str) -> Result<Self, ConfigError> {
        let mut sections: HashMap<String, Section> = HashMap::new();
        let mut current = DEFAULT_SECTION.to_string();

        for (idx, raw) in contents.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            if let Some(name) = line.strip_prefix('[') {
                let name = name.strip_suffix(']').ok_or_else(|| ConfigError::Parse {
                    path: origin.to_string(),
                    line: idx + 1,
                    reason: "unterminated section header".to_string(),
                })?;
                current = name.trim().to_string();
                sections.entry(current.clone()).or_default();
                continue;
            }

            let (key, value) = line.split_once('=').ok_or_else(|| ConfigError::Parse {
                path: origin.to_string(),
                line: idx + 1,
                reason: "expected 'key = value'".to_string(),
            })?;

            sections
                .entry(current.clone())
                .or_default()
                .insert(normalize_key(key), unquote(value.trim()).to_string());
        }

        Ok(Self { sections })
    }

    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.get(name)
    }

    pub fn section_names(&self) -> impl Iterator<Item = &str> {
        self.sections.keys().map(String::as_str)
    }
}

/// Read `section` from the file at `path`.
///
/// Returns `Ok(None)` when the file does not exist. A present file that
/// cannot be read, fails to parse, or lacks the section is an error.
pub fn read_section(path: &Path, section: &str) -> Result<Option<Section>, ConfigError> {
    if !path.exists() {
        debug!(path = %path.display(), "Credential file not found, skipping");
        return Ok(None);
    }

    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;

    let mut edgerc = Edgerc::parse(&contents, &path.display().to_string())?;
    match edgerc.sections.remove(section) {
        Some(values) => Ok(Some(values)),
        None => Err(ConfigError::MissingSection {
            path: path.display().to_string(),
            section: section.to_string(),
        }),
    }
}

// `max-body` and `max_body` are both seen in the wild
fn normalize_key(key: &str) -> String {
    key.trim().to_ascii_lowercase().replace('-', "_")
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}
