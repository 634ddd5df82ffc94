//! NetBalance extender - balance-aware network scoring for kube-scheduler
//!
//! This binary runs next to the scheduler and answers its extender
//! prioritize calls, scoring candidate nodes by balanced residual capacity.

use anyhow::{Context, Result};
use netbalance_extender::{api, config::ExtenderConfig};
use plugin_lib::framework::SnapshotLister;
use plugin_lib::health::{dependencies, HealthRegistry};
use plugin_lib::telemetry::{CachedUsageSource, InstanceResolver, NetUsageSource, PrometheusClient};
use plugin_lib::{BalanceNetPlugin, StructuredLogger, PLUGIN_NAME};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const EXTENDER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting netbalance-extender");

    let config = ExtenderConfig::load()?;
    info!(port = config.port, endpoint = %config.telemetry.endpoint, "Extender configured");

    let health_registry = HealthRegistry::new();
    health_registry.register(dependencies::TELEMETRY);
    health_registry.register(dependencies::CAPACITY);

    let client = PrometheusClient::new(config.telemetry.clone())
        .context("Failed to create metrics backend client")?;
    let ttl = config.telemetry.cache_ttl();
    let usage: Arc<dyn NetUsageSource> = if ttl.is_zero() {
        Arc::new(client)
    } else {
        let cache = Arc::new(CachedUsageSource::new(client, ttl));
        let evictor = Arc::clone(&cache);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(ttl);
            loop {
                interval.tick().await;
                evictor.evict_expired();
            }
        });
        cache
    };

    let plugin = BalanceNetPlugin::new(
        config.scoring.clone(),
        Arc::new(SnapshotLister::default()),
        config.capacity.build_provider(),
        usage,
        InstanceResolver::new(config.telemetry.instances.clone()),
    )
    .context("Invalid plugin configuration")?
    .with_health(health_registry.clone());

    let logger = StructuredLogger::new(PLUGIN_NAME);
    logger.log_startup(EXTENDER_VERSION, &config.telemetry.endpoint);

    let app_state = Arc::new(api::AppState::new(plugin, health_registry.clone()));
    health_registry.set_ready(true);

    let api_handle = tokio::spawn(api::serve(config.port, app_state));

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            logger.log_shutdown("SIGINT received");
        }
        served = api_handle => {
            match served {
                Ok(Ok(())) => logger.log_shutdown("API server stopped"),
                Ok(Err(e)) => {
                    error!(error = %e, "API server failed");
                    return Err(e);
                }
                Err(e) => return Err(e).context("API server task panicked"),
            }
        }
    }

    info!("Shutting down");
    Ok(())
}
