use tracing_subscriber::EnvFilter;

use crate::cli::LogFormat;

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` takes precedence; without it everything at `info` and above is
/// written to stderr.
pub fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// Mask an identifier for log output, keeping a short prefix so operators can
/// tell credentials apart.
pub fn mask(value: &str) -> String {
    const VISIBLE: usize = 4;

    if value.chars().count() <= VISIBLE * 2 {
        return "****".to_string();
    }
    let prefix: String = value.chars().take(VISIBLE).collect();
    format!("{prefix}****")
}
