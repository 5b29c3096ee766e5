//! Log subscriber setup for the binary.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::HearthError;
use crate::config::LoggingSettings;

/// Installs the global `tracing` subscriber.
///
/// `RUST_LOG` wins over `settings.level` when it is set. Fails if a global
/// subscriber is already installed.
pub fn init_logging(settings: &LoggingSettings) -> Result<(), HearthError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.level));
    let registry = tracing_subscriber::registry().with(filter);

    let result = if settings.json_format {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_file(false)
                    .with_line_number(false)
                    .with_thread_ids(true),
            )
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_target(true).with_thread_ids(false))
            .try_init()
    };

    result.map_err(|e| HearthError::Logging(e.to_string()))
}
