use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

use crate::config::ObservabilityConfig;
use crate::definition::{InstanceId, UserId};

/// Initialize structured logging.
///
/// `RUST_LOG` wins over the configured level. Installing twice is not an
/// error, so tests and embedding hosts can call this freely.
pub fn init_telemetry(config: &ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))?;

    let installed = if config.json_logs {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_writer(std::io::stderr),
            )
            .with(filter)
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .with(filter)
            .try_init()
    };

    if installed.is_ok() {
        tracing::debug!(json = config.json_logs, "Process engine telemetry initialized");
    }
    Ok(())
}

/// Generate a correlation ID for linking the log lines of one action
pub fn generate_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

/// Create a span carrying the common instance attributes
pub fn create_instance_span(
    operation: &str,
    instance_id: Option<InstanceId>,
    actor_id: Option<UserId>,
    correlation_id: &str,
) -> tracing::Span {
    tracing::info_span!(
        "process_instance",
        operation = operation,
        instance.id = instance_id,
        actor.id = actor_id,
        correlation.id = correlation_id,
    )
}
