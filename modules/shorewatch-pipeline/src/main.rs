use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use shorewatch_common::Config;
use shorewatch_pipeline::{
    AlertPipeline, HttpOracle, MemoryAlertStore, MemoryReportStore, NoopMediaStore,
    NotificationBus, PipelineDeps,
};
use shorewatch_spatial::SpatialIndex;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("shorewatch=info".parse()?))
        .init();

    info!("Shorewatch maintenance worker starting...");

    // Load config
    let config = Config::from_env();

    let index = Arc::new(SpatialIndex::new());
    let bus = NotificationBus::new(config.bus_capacity);
    let oracle = Arc::new(HttpOracle::from_config(&config)?);

    let deps = PipelineDeps::builder()
        .alert_store(Arc::new(MemoryAlertStore::new()))
        .report_store(Arc::new(MemoryReportStore::new()))
        .spatial_reader(index.clone())
        .spatial_writer(index)
        .media_store(Arc::new(NoopMediaStore))
        .oracle(oracle)
        .bus(bus.clone())
        .config(config.clone())
        .build();

    let alerts = AlertPipeline::new(deps);

    // Tail the bus so operators watching the worker see every event.
    let mut subscriber = bus.subscribe();
    let bus_log = tokio::spawn(async move {
        while let Some(event) = subscriber.recv().await {
            info!(kind = event.kind(), "Bus event");
        }
    });

    let sweep_secs = config.sweep_interval_secs;
    info!(interval_secs = sweep_secs, "Starting expiry sweep loop");
    let sweeper = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(sweep_secs));
        loop {
            ticker.tick().await;
            if let Err(e) = alerts.sweep_expired(Utc::now()).await {
                warn!(error = %e, "Expiry sweep failed");
            }
        }
    });

    tokio::select! {
        _ = sweeper => {},
        _ = bus_log => {},
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received, stopping");
        }
    }

    Ok(())
}
