use anyhow::{Context, Result};
use lumina_core::{FaceMeshDetector, LandmarkDetector};
use lumina_hw::Camera;
use lumina_store::Store;
use tracing_subscriber::EnvFilter;

mod config;
mod dbus_interface;
mod engine;

use config::Config;
use dbus_interface::{DsdService, BUS_NAME, OBJECT_PATH};
use engine::{DetectorFactory, EngineConfig, RenderLoop};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("luminad starting");

    let config = Config::load()?;
    let store = Store::open(&config.data_dir).context("failed to open data store")?;

    let camera = Camera::open(&config.camera_device, config.facing)
        .with_context(|| format!("failed to open camera {}", config.camera_device))?;
    tracing::info!(
        device = %config.camera_device,
        width = camera.width,
        height = camera.height,
        facing = %config.facing,
        "camera ready"
    );

    let font = match config.font_path.as_deref() {
        Some(path) => match lumina_overlay::load_font(path) {
            Ok(font) => Some(font),
            Err(e) => {
                tracing::warn!(error = %e, "overlay labels disabled");
                None
            }
        },
        None => None,
    };

    // The detector is created on the render thread; a missing model keeps
    // the loop idle until the file appears.
    let model_path = config.model_path.to_string_lossy().into_owned();
    let factory: DetectorFactory = Box::new(move || {
        let detector = FaceMeshDetector::load(&model_path)?;
        Ok(Box::new(detector) as Box<dyn LandmarkDetector>)
    });

    let (config_tx, config_rx) = engine::config_channel(EngineConfig {
        overlays: config.overlays,
        facing: config.facing,
    });
    let render_loop = RenderLoop::new(Box::new(camera), factory, config.init_retry(), config_rx, font);
    let (handle, render_thread) = engine::spawn(render_loop, config_tx, config.frame_interval())?;

    let service = DsdService::new(handle, store, config.jpeg_quality);
    let _conn = zbus::connection::Builder::session()?
        .name(BUS_NAME)?
        .serve_at(OBJECT_PATH, service)?
        .build()
        .await
        .context("failed to register on the session bus")?;

    tracing::info!(bus = BUS_NAME, path = OBJECT_PATH, "luminad ready");

    tokio::signal::ctrl_c().await?;
    tracing::info!("luminad shutting down");
    render_thread.stop();

    Ok(())
}
