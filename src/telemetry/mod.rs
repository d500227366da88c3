//! Tracing subscriber setup.
//!
//! | Setting | Description | Default |
//! |---------|-------------|---------|
//! | `RUST_LOG` | Filter directives, overrides `logging.filter` | unset |
//! | `APP__LOGGING__FILTER` | Filter used when `RUST_LOG` is unset | `info` |
//! | `APP__LOGGING__JSON` | Emit one JSON object per log line | `false` |

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingSettings;

/// Result type for telemetry operations
pub type TelemetryResult<T> = Result<T, TelemetryError>;

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("Invalid log filter '{filter}': {reason}")]
    InvalidFilter { filter: String, reason: String },
    #[error("Failed to install tracing subscriber: {0}")]
    Install(String),
}

/// Build the filter: `RUST_LOG` wins, then the configured directive
pub fn build_filter(settings: &LoggingSettings) -> TelemetryResult<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&settings.filter).map_err(|e| TelemetryError::InvalidFilter {
        filter: settings.filter.clone(),
        reason: e.to_string(),
    })
}

/// Install the global subscriber. Call once at startup.
pub fn init_tracing(settings: &LoggingSettings) -> TelemetryResult<()> {
    let env_filter = build_filter(settings)?;
    let registry = tracing_subscriber::registry().with(env_filter);

    let installed = if settings.json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };

    installed.map_err(|e| TelemetryError::Install(e.to_string()))
}
