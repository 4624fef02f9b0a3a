use crate::engine::{EngineError, EngineHandle};
use chrono::Local;
use lumina_core::report::render_report;
use lumina_hw::Facing;
use lumina_overlay::OverlayConfig;
use lumina_store::{Snapshot, Store};
use zbus::interface;

pub const BUS_NAME: &str = "org.lumina.Dsd1";
pub const OBJECT_PATH: &str = "/org/lumina/Dsd1";

/// D-Bus interface for the Lumina smile-design daemon.
///
/// Bus name: org.lumina.Dsd1
/// Object path: /org/lumina/Dsd1
pub struct DsdService {
    engine: EngineHandle,
    store: Store,
    jpeg_quality: u8,
}

impl DsdService {
    pub fn new(engine: EngineHandle, store: Store, jpeg_quality: u8) -> Self {
        Self {
            engine,
            store,
            jpeg_quality,
        }
    }
}

fn failed(e: impl std::fmt::Display) -> zbus::fdo::Error {
    zbus::fdo::Error::Failed(e.to_string())
}

#[interface(name = "org.lumina.Dsd1")]
impl DsdService {
    /// Render loop status as JSON.
    async fn status(&self) -> zbus::fdo::Result<String> {
        let status = self.engine.status();
        Ok(serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "engine": status,
            "data_dir": self.store.dir().display().to_string(),
        })
        .to_string())
    }

    /// Latest analysis as JSON, or an empty string before the first face.
    async fn latest_analysis(&self) -> zbus::fdo::Result<String> {
        match self.engine.latest_analysis() {
            Some(analysis) => serde_json::to_string(&analysis).map_err(failed),
            None => Ok(String::new()),
        }
    }

    /// Clinical text report for the latest analysis, or an empty string.
    async fn report(&self) -> zbus::fdo::Result<String> {
        tracing::info!("report requested");
        Ok(self
            .engine
            .latest_analysis()
            .map(|analysis| render_report(&analysis, Local::now().naive_local()))
            .unwrap_or_default())
    }

    /// Capture the composited frame with its analysis into the store.
    /// Returns the snapshot id.
    async fn snapshot(&self) -> zbus::fdo::Result<i64> {
        let (image, analysis) = match self.engine.snapshot(self.jpeg_quality) {
            Ok(captured) => captured,
            Err(EngineError::NoAnalysis) => {
                return Err(failed("no analysis available; nothing to capture"));
            }
            Err(e) => return Err(failed(e)),
        };
        let snapshot = Snapshot::new(image, Some(analysis), Local::now());
        let id = snapshot.id;
        self.store.add_snapshot(snapshot).map_err(failed)?;
        tracing::info!(id, "snapshot captured");
        Ok(id)
    }

    /// Current overlay toggles as JSON.
    async fn overlays(&self) -> zbus::fdo::Result<String> {
        serde_json::to_string(&self.engine.overlays()).map_err(failed)
    }

    /// Replace the overlay toggles. Takes effect on the next frame.
    async fn set_overlays(
        &self,
        facial_guides: bool,
        dental_guides: bool,
        gingival: bool,
        measurements: bool,
        deviation: bool,
    ) -> zbus::fdo::Result<bool> {
        self.engine.set_overlays(OverlayConfig {
            facial_guides,
            dental_guides,
            gingival,
            measurements,
            deviation,
        });
        Ok(true)
    }

    /// Current camera facing ("user" or "environment").
    async fn facing(&self) -> String {
        self.engine.facing().to_string()
    }

    /// Set camera facing by name. Mirroring changes on the next frame.
    async fn set_facing(&self, facing: &str) -> zbus::fdo::Result<String> {
        let facing: Facing = facing.parse().map_err(zbus::fdo::Error::InvalidArgs)?;
        self.engine.set_facing(facing);
        Ok(facing.to_string())
    }

    /// Flip between front and back camera. Returns the new facing.
    async fn switch_camera(&self) -> String {
        self.engine.switch_camera().to_string()
    }
}
