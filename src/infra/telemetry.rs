use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::cache::stats::{
    METRIC_LOCAL_EVICT, METRIC_LOCAL_HIT, METRIC_MISS, METRIC_REMOTE_ERROR, METRIC_REMOTE_HIT,
};
use crate::coalesce::{METRIC_COMPUTE_MS, METRIC_JOINED};
use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
///
/// Logs go to stderr so command output on stdout stays machine readable.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed(),
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

/// Register metric descriptions with the installed recorder. Idempotent.
pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            METRIC_REMOTE_HIT,
            Unit::Count,
            "Total number of reads served by the remote tier."
        );
        describe_counter!(
            METRIC_LOCAL_HIT,
            Unit::Count,
            "Total number of reads served by the local tier."
        );
        describe_counter!(
            METRIC_MISS,
            Unit::Count,
            "Total number of reads found in neither tier."
        );
        describe_counter!(
            METRIC_LOCAL_EVICT,
            Unit::Count,
            "Total number of local entries dropped due to capacity."
        );
        describe_counter!(
            METRIC_REMOTE_ERROR,
            Unit::Count,
            "Total number of failed or timed out remote tier calls."
        );
        describe_counter!(
            METRIC_JOINED,
            Unit::Count,
            "Total number of callers that joined an in-flight computation."
        );
        describe_histogram!(
            METRIC_COMPUTE_MS,
            Unit::Milliseconds,
            "Coalesced computation latency in milliseconds."
        );
    });
}
