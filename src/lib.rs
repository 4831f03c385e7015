pub mod config;
pub mod error;
pub mod plans;
pub mod rate_limit;

use crate::config::{LogFormat, LoggingConfig};

const DEFAULT_LOG_FILTER: &str = "quotaguard=debug";

/// Initialize tracing/logging
pub fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        logging
            .filter
            .as_deref()
            .unwrap_or(DEFAULT_LOG_FILTER)
            .into()
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    match logging.format {
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Json => builder.json().init(),
    }
}
