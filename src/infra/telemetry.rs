use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "hireboard_cache_requests_total",
            Unit::Count,
            "Edge cache lookups, labelled hit or miss."
        );
        describe_counter!(
            "hireboard_cache_errors_total",
            Unit::Count,
            "Cache backend failures absorbed by fail-open handling."
        );
        describe_counter!(
            "hireboard_cache_invalidations_total",
            Unit::Count,
            "Invalidation fan-outs executed after mutations."
        );
        describe_counter!(
            "hireboard_unlocks_total",
            Unit::Count,
            "Unlock attempts, labelled by outcome."
        );
        describe_counter!(
            "hireboard_credits_spent_total",
            Unit::Count,
            "Credits deducted by granted unlocks."
        );
        describe_counter!(
            "hireboard_ledger_compensations_total",
            Unit::Count,
            "Provisional debits re-credited after a lost insert race."
        );
        describe_counter!(
            "hireboard_ledger_conflicts_total",
            Unit::Count,
            "Compensation failures requiring out-of-band reconciliation."
        );
        describe_counter!(
            "hireboard_errors_total",
            Unit::Count,
            "Error responses returned to clients, labelled by code."
        );
        describe_histogram!(
            "hireboard_unlock_duration_seconds",
            Unit::Seconds,
            "End-to-end latency of ledger spend calls."
        );
    });
}
