use crate::config::{LoggingConfig, MetricsConfig};
use lead_relay::metrics_defs::ALL_METRICS;
use metrics_exporter_statsd::StatsdBuilder;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const METRICS_PREFIX: &str = "lead_relay";

#[derive(thiserror::Error, Debug)]
pub enum ObservabilityError {
    #[error("could not set up statsd exporter: {0}")]
    Statsd(#[from] metrics_exporter_statsd::StatsdError),
    #[error("a metrics recorder is already installed")]
    RecorderInstalled,
    #[error("could not install tracing subscriber: {0}")]
    Subscriber(#[from] tracing_subscriber::util::TryInitError),
}

/// Keeps the Sentry client alive; events are flushed when dropped.
pub struct Guard {
    _sentry: Option<sentry::ClientInitGuard>,
}

pub fn init(
    logging: &LoggingConfig,
    metrics: Option<&MetricsConfig>,
) -> Result<Guard, ObservabilityError> {
    let sentry = logging.sentry_dsn.as_deref().map(|dsn| {
        sentry::init((
            dsn,
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });

    let filter = EnvFilter::try_new(&logging.level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry.as_ref().map(|_| sentry::integrations::tracing::layer()))
        .try_init()?;

    if let Some(metrics) = metrics {
        let recorder = StatsdBuilder::from(metrics.statsd_host.clone(), metrics.statsd_port)
            .build(Some(METRICS_PREFIX))?;
        metrics::set_global_recorder(recorder).map_err(|_| ObservabilityError::RecorderInstalled)?;
        tracing::info!(
            host = %metrics.statsd_host,
            port = metrics.statsd_port,
            count = ALL_METRICS.len(),
            "Metrics exporter installed"
        );
    }

    Ok(Guard { _sentry: sentry })
}
