//! Runtime configuration.
//!
//! Loaded from a TOML file; every field has a default, so a partial file (or none at
//! all) yields a complete [`Config`].

use crate::error::{BoresightError, Result};
use crate::geometry::{CompositionOrder, OrientationTransform, Rotation, RoiLimits};
use crate::input::DecoderConfig;
use crate::overlay::OverlayStyle;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_DIR: &str = "boresight";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub overlay: OverlayConfig,
    pub zoom: ZoomConfig,
    pub camera: CameraConfig,
    pub input: InputConfig,
    pub timing: TimingConfig,
    pub adjust: AdjustConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    pub width: u32,
    pub height: u32,
    #[serde(flatten)]
    pub style: OverlayStyle,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            style: OverlayStyle::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoomConfig {
    pub max_level: f64,
    pub step: f64,
    /// Crop width/height ratio in sensor-normalized units.
    pub roi_aspect: f64,
    pub min_roi_height: f64,
}

impl Default for ZoomConfig {
    fn default() -> Self {
        Self {
            max_level: 8.0,
            step: 1.0,
            roi_aspect: 1.0,
            min_roi_height: 0.01,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub rotation: Rotation,
    pub mirror_x: bool,
    pub mirror_y: bool,
    pub order: CompositionOrder,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            rotation: Rotation::Deg180,
            mirror_x: false,
            mirror_y: false,
            order: CompositionOrder::FlipThenRotate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    pub long_hold_secs: f64,
    pub double_tap_secs: f64,
    /// How long a two-button combo must be held before it acts.
    pub combo_secs: f64,
    pub edge_queue_capacity: usize,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            long_hold_secs: 3.0,
            double_tap_secs: 0.4,
            combo_secs: 3.0,
            edge_queue_capacity: 64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub adjust_tick_ms: u64,
    pub idle_tick_ms: u64,
    pub heartbeat_ms: u64,
    pub persist_secs: u64,
    pub exit_grace_ms: u64,
    pub join_timeout_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            adjust_tick_ms: 20,
            idle_tick_ms: 125,
            heartbeat_ms: 1000,
            persist_secs: 10,
            exit_grace_ms: 1500,
            join_timeout_ms: 1000,
        }
    }
}

impl TimingConfig {
    pub fn adjust_tick(&self) -> Duration {
        Duration::from_millis(self.adjust_tick_ms.max(1))
    }

    pub fn idle_tick(&self) -> Duration {
        Duration::from_millis(self.idle_tick_ms.max(1))
    }

    pub fn heartbeat(&self) -> Duration {
        Duration::from_millis(self.heartbeat_ms.max(1))
    }

    pub fn persist_every(&self) -> Duration {
        Duration::from_secs(self.persist_secs)
    }

    pub fn exit_grace(&self) -> Duration {
        Duration::from_millis(self.exit_grace_ms)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdjustConfig {
    /// Reticle movement per tick while a direction button is held.
    pub nudge_step_px: i32,
}

impl Default for AdjustConfig {
    fn default() -> Self {
        Self { nudge_step_px: 2 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Recordings and the aim-point record live here.
    pub directory: PathBuf,
    pub aim_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let directory = dirs::home_dir()
            .map(|home| home.join("Saved_Videos"))
            .unwrap_or_else(|| PathBuf::from("Saved_Videos"));
        Self {
            directory,
            aim_file: "overlay_offset.json".to_string(),
        }
    }
}

fn secs(value: f64) -> Duration {
    if value.is_finite() && value > 0.0 {
        Duration::from_secs_f64(value)
    } else {
        Duration::ZERO
    }
}

impl Config {
    /// `<config dir>/boresight/config.toml`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    /// Parse and validate a config file.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|err| {
            BoresightError::file_error(format!("reading config {}", path.display()), err)
        })?;
        Self::from_toml(&text)
            .map_err(|err| BoresightError::config(format!("{}: {}", path.display(), err)))
    }

    /// Load the default config file, falling back to defaults when it does not exist.
    pub fn load() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load_from_path(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(text).map_err(|err| BoresightError::config(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|err| BoresightError::config(err.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.overlay.width == 0 || self.overlay.height == 0 {
            return Err(BoresightError::config("overlay width and height must be non-zero"));
        }
        if !(self.zoom.max_level.is_finite() && self.zoom.max_level >= 1.0) {
            return Err(BoresightError::config("zoom.max_level must be >= 1"));
        }
        if !(self.zoom.step.is_finite() && self.zoom.step > 0.0) {
            return Err(BoresightError::config("zoom.step must be > 0"));
        }
        if !(self.zoom.roi_aspect.is_finite() && self.zoom.roi_aspect > 0.0) {
            return Err(BoresightError::config("zoom.roi_aspect must be > 0"));
        }
        if !(self.zoom.min_roi_height > 0.0 && self.zoom.min_roi_height <= 1.0) {
            return Err(BoresightError::config("zoom.min_roi_height must be in (0, 1]"));
        }
        if self.input.edge_queue_capacity == 0 {
            return Err(BoresightError::config("input.edge_queue_capacity must be > 0"));
        }
        if self.adjust.nudge_step_px <= 0 {
            return Err(BoresightError::config("adjust.nudge_step_px must be > 0"));
        }
        Ok(())
    }

    pub fn decoder_config(&self) -> DecoderConfig {
        DecoderConfig {
            long_hold: secs(self.input.long_hold_secs),
            double_tap_window: secs(self.input.double_tap_secs),
        }
    }

    pub fn combo_hold(&self) -> Duration {
        secs(self.input.combo_secs)
    }

    pub fn roi_limits(&self) -> RoiLimits {
        RoiLimits {
            max_level: self.zoom.max_level,
            aspect: self.zoom.roi_aspect,
            min_height: self.zoom.min_roi_height,
        }
    }

    pub fn orientation(&self) -> OrientationTransform {
        OrientationTransform::new(
            self.camera.rotation,
            self.camera.mirror_x,
            self.camera.mirror_y,
        )
    }

    pub fn aim_path(&self) -> PathBuf {
        self.storage.directory.join(&self.storage.aim_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_file_yields_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.camera.rotation, Rotation::Deg180);
        assert_eq!(config.decoder_config().long_hold, Duration::from_secs(3));
        assert_eq!(
            config.decoder_config().double_tap_window,
            Duration::from_millis(400)
        );
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = Config::from_toml(
            r#"
            [camera]
            rotation = 90
            order = "rotate_then_flip"

            [overlay]
            radius = 30
            "#,
        )
        .unwrap();

        assert_eq!(config.camera.rotation, Rotation::Deg90);
        assert_eq!(config.camera.order, CompositionOrder::RotateThenFlip);
        assert!(!config.camera.mirror_x);
        assert_eq!(config.overlay.style.radius, 30);
        assert_eq!(config.overlay.width, 1280);
        assert_eq!(config.zoom.max_level, 8.0);
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(Config::from_toml("[camera]\nrotation = 45\n").is_err());
        assert!(Config::from_toml("[zoom]\nmax_level = 0.5\n").is_err());
        assert!(Config::from_toml("[adjust]\nnudge_step_px = 0\n").is_err());
        assert!(Config::from_toml("not toml at all [").is_err());
    }

    #[test]
    fn round_trips_through_toml() {
        let mut config = Config::default();
        config.timing.exit_grace_ms = 250;
        config.camera.mirror_y = true;
        let text = config.to_toml().unwrap();
        assert_eq!(Config::from_toml(&text).unwrap(), config);
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[storage]\naim_file = \"aim.json\"\ndirectory = \"/tmp/bs\"").unwrap();

        let config = Config::load_from_path(file.path()).unwrap();
        assert_eq!(config.aim_path(), PathBuf::from("/tmp/bs/aim.json"));
    }

    #[test]
    fn missing_file_is_an_error_when_explicit() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load_from_path(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, BoresightError::FileError { .. }));
    }
}
