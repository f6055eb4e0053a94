//! Display manager service entry point.
//!
//! Loads the configuration, wires the service against the in-memory renderer
//! (headless backend) and runs until Ctrl-C.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load_config()                 -- TOML, defaults when absent
//!  └─ DisplayManagerService::new()  -- controllers + worker thread
//!  └─ service.init()                -- renderer subscription
//!  └─ agent event pump              (Tokio task, logs every event)
//! ```

use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use dms_core::{RsScreenId, ScreenMode};
use dms_server::application::service::DisplayManagerService;
use dms_server::infrastructure::notification::ChannelEventSink;
use dms_server::infrastructure::renderer::mock::MockRenderer;
use dms_server::infrastructure::sensor::mock::MockGravitySensor;
use dms_server::infrastructure::sensor::GravitySensor;
use dms_server::infrastructure::storage::config::{load_config, DmsConfig};

/// Output the headless renderer exposes at start-up.
const HEADLESS_SCREEN: RsScreenId = RsScreenId(0);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("failed to load configuration, using defaults: {e}");
            DmsConfig::default()
        }
    };

    // Level is overridden by `RUST_LOG`.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.service.log_level)),
        )
        .init();

    info!("display manager service starting");

    let renderer = Arc::new(MockRenderer::new());
    let sensor: Option<Arc<dyn GravitySensor>> = if config.rotation.sensor_enabled {
        Some(Arc::new(MockGravitySensor::new()))
    } else {
        None
    };
    let (sink, mut events) = ChannelEventSink::new();

    let (service, worker) = DisplayManagerService::new(renderer.clone(), Arc::new(sink), sensor, config)?;
    service.init()?;

    // ── Agent event pump ──────────────────────────────────────────────────────
    let pump = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            info!(?event, "agent event");
        }
    });

    renderer.plug(HEADLESS_SCREEN, vec![ScreenMode::new(1920, 1080, 60)], 0);
    let queue = service.worker_queue().clone();
    let settled = tokio::task::spawn_blocking(move || queue.flush(std::time::Duration::from_secs(2)))
        .await
        .unwrap_or(false);
    if settled {
        info!("topology:\n{}", service.dump());
    } else {
        warn!("worker did not settle after start-up");
    }

    info!("display manager service ready.  Press Ctrl-C to exit.");
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to wait for shutdown signal: {e}");
    }

    info!("shutdown signal received");
    service.shutdown();
    drop(service);
    drop(renderer);
    if tokio::task::spawn_blocking(move || worker.join()).await.is_err() {
        error!("worker join task failed");
    }
    if pump.await.is_err() {
        error!("agent event pump panicked");
    }

    info!("display manager service stopped");
    Ok(())
}
