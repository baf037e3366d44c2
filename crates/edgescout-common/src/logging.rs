use tracing_subscriber::EnvFilter;

/// Output format for log events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human readable, multi-line events
    Pretty,
    /// One JSON object per event, fields flattened
    Json,
}

/// Build the filter used when `RUST_LOG` is not set
///
/// Dependencies stay at `warn`; the edgescout crates log at `log_level`.
pub fn default_filter(log_level: &str) -> String {
    format!(
        "warn,edgescout_agent={level},edgescout_common={level}",
        level = log_level
    )
}

/// Configure and initialize logging for the application
pub fn setup_logging(log_level: &str, format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter(log_level)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    match format {
        LogFormat::Pretty => builder.pretty().init(),
        LogFormat::Json => builder.json().flatten_event(true).init(),
    }
}
