//! Observability infrastructure: tracing, metrics, health checks.

use crate::config::Config;
use crate::error::{Result, VmonError};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub mod health;
pub mod metrics;

/// Initialize the global observability infrastructure.
///
/// `RUST_LOG` takes precedence over the configured log level. The Prometheus
/// exporter is only installed when `metrics_listen` is set. Call once at
/// startup; a second call fails because the global subscriber is taken.
pub fn init(config: &Config) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .map_err(|e| VmonError::Observability { reason: format!("Invalid log filter: {}", e) })?;

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true).with_level(true))
        .try_init()
        .map_err(|e| VmonError::Observability { reason: e.to_string() })?;

    if let Some(addr) = config.metrics_listen {
        PrometheusBuilder::new().with_http_listener(addr).install().map_err(|e| {
            VmonError::Observability { reason: format!("Failed to install metrics exporter: {}", e) }
        })?;
        tracing::info!(%addr, "Prometheus exporter listening");
    }

    metrics::register_core_metrics();
    tracing::info!("Observability initialized");
    Ok(())
}
