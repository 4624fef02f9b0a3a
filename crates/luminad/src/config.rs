use anyhow::Context;
use lumina_hw::Facing;
use lumina_overlay::OverlayConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Daemon configuration.
///
/// Resolved in three layers: built-in defaults, then the TOML file named by
/// `LUMINA_CONFIG` (default `$XDG_CONFIG_HOME/lumina/luminad.toml`), then
/// `LUMINA_*` environment variables.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// V4L2 device path (default: /dev/video0).
    pub camera_device: String,
    /// `user` mirrors the preview and overlays.
    pub facing: Facing,
    /// Face-mesh ONNX model.
    pub model_path: PathBuf,
    /// Directory holding the JSON store.
    pub data_dir: PathBuf,
    /// Target interval between render iterations.
    pub frame_interval_ms: u64,
    /// Delay between detector initialization attempts.
    pub init_retry_ms: u64,
    /// TrueType font for overlay labels. Labels are skipped without one.
    pub font_path: Option<PathBuf>,
    /// JPEG quality for snapshots (1-100).
    pub jpeg_quality: u8,
    /// Initial overlay toggles.
    pub overlays: OverlayConfig,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = data_home().join("lumina");
        Self {
            camera_device: "/dev/video0".to_string(),
            facing: Facing::User,
            model_path: data_dir.join("models").join("face_landmarker.onnx"),
            data_dir,
            frame_interval_ms: 16,
            init_retry_ms: 500,
            font_path: None,
            jpeg_quality: 85,
            overlays: OverlayConfig::default(),
        }
    }
}

impl Config {
    /// Load defaults, the config file if present, then environment overrides.
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("LUMINA_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_home().join("lumina").join("luminad.toml"));

        let mut config = if path.exists() {
            let config = Self::from_file(&path)?;
            tracing::info!(path = %path.display(), "loaded config file");
            config
        } else {
            tracing::debug!(path = %path.display(), "no config file; using defaults");
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Apply `LUMINA_*` overrides. Unparseable values are ignored with a warning.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("LUMINA_CAMERA_DEVICE") {
            self.camera_device = v;
        }
        if let Some(v) = lookup("LUMINA_FACING") {
            match v.parse() {
                Ok(facing) => self.facing = facing,
                Err(e) => tracing::warn!(error = %e, "ignoring LUMINA_FACING"),
            }
        }
        if let Some(v) = lookup("LUMINA_MODEL_PATH") {
            self.model_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("LUMINA_DATA_DIR") {
            self.data_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("LUMINA_FONT_PATH") {
            self.font_path = (!v.is_empty()).then(|| PathBuf::from(v));
        }
        self.frame_interval_ms = env_parse(&lookup, "LUMINA_FRAME_INTERVAL_MS", self.frame_interval_ms);
        self.init_retry_ms = env_parse(&lookup, "LUMINA_INIT_RETRY_MS", self.init_retry_ms);
        self.jpeg_quality = env_parse(&lookup, "LUMINA_JPEG_QUALITY", self.jpeg_quality).clamp(1, 100);
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms.max(1))
    }

    pub fn init_retry(&self) -> Duration {
        Duration::from_millis(self.init_retry_ms)
    }
}

fn env_parse<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, current: T) -> T {
    match lookup(key) {
        Some(v) => v.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %v, "ignoring unparseable override");
            current
        }),
        None => current,
    }
}

fn home() -> PathBuf {
    PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string()))
}

fn data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home().join(".local/share"))
}

fn config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home().join(".config"))
}
