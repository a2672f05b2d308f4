//! Structured logging for the docket node.
//!
//! The node logs either human-readable lines for development or
//! newline-delimited JSON for aggregation pipelines, picked by the
//! `log_format` configuration key. `RUST_LOG`, when set, overrides the
//! configured `log_level` filter.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::NodeConfig;

/// Output format for structured logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Human,
    Json,
}

impl LogFormat {
    /// Parse the `log_format` configuration value. Anything other than
    /// `"json"` means human output, so a typo degrades readably instead
    /// of failing startup.
    pub fn from_config(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Human,
        }
    }
}

/// Initialise the global subscriber from the node configuration.
///
/// # Panics
///
/// Panics if a global subscriber has already been set in this process.
pub fn init_logging(config: &NodeConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str()));
    let registry = tracing_subscriber::registry().with(filter);
    match LogFormat::from_config(&config.log_format) {
        LogFormat::Human => {
            registry
                .with(fmt::layer().with_target(true).with_thread_ids(true))
                .init();
        }
        LogFormat::Json => {
            registry
                .with(fmt::layer().json().flatten_event(true).with_target(true))
                .init();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_parsing_defaults_to_human() {
        assert_eq!(LogFormat::from_config("json"), LogFormat::Json);
        assert_eq!(LogFormat::from_config("JSON"), LogFormat::Json);
        assert_eq!(LogFormat::from_config("human"), LogFormat::Human);
        assert_eq!(LogFormat::from_config("garbage"), LogFormat::Human);
    }
}
