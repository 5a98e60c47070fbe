//! Durable aim-point record.
//!
//! The record is a small JSON object, `{"horizontal_y": <int>, "vertical_x": <int>}`,
//! kept in the storage directory. Loading never fails the caller: a missing or corrupt
//! file falls back to the overlay center. Saving reports errors so the caller can log
//! them, while the in-memory aim point stays authoritative.

use crate::error::{BoresightError, Result};
use crate::overlay::{AimPoint, Overlay};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// On-disk shape. Fields are optional so a partial record still restores one axis.
#[derive(Debug, Serialize, Deserialize)]
struct AimRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    horizontal_y: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    vertical_x: Option<i32>,
}

/// Reads and writes the aim-point record at a fixed path.
#[derive(Debug, Clone)]
pub struct AimPointStore {
    path: PathBuf,
}

impl AimPointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the record, `Ok(None)` when no file exists yet.
    ///
    /// Missing fields fall back to the matching coordinate of the overlay center; the
    /// result is clamped to the overlay's reticle bounds.
    pub fn try_load(&self, overlay: &Overlay) -> Result<Option<AimPoint>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(BoresightError::file_error(
                    format!("reading {}", self.path.display()),
                    err,
                ))
            }
        };

        let record: AimRecord = serde_json::from_str(&contents)
            .map_err(|err| BoresightError::persistence(&self.path, err.to_string()))?;

        let center = overlay.center();
        let point = AimPoint::new(
            record.vertical_x.unwrap_or(center.x),
            record.horizontal_y.unwrap_or(center.y),
        );
        Ok(Some(overlay.clamp(point)))
    }

    /// Load the persisted aim point or the overlay center.
    pub fn load_or_center(&self, overlay: &Overlay) -> AimPoint {
        match self.try_load(overlay) {
            Ok(Some(point)) => {
                info!(
                    "Loaded saved aim point x={} y={} from {}",
                    point.x,
                    point.y,
                    self.path.display()
                );
                point
            }
            Ok(None) => {
                debug!("No saved aim point at {}, using center", self.path.display());
                overlay.center()
            }
            Err(err) => {
                warn!("Ignoring unreadable aim point record: {}", err);
                overlay.center()
            }
        }
    }

    /// Write the record, creating the parent directory when needed.
    pub fn save(&self, point: AimPoint) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|err| {
                    BoresightError::file_error(format!("creating {}", parent.display()), err)
                })?;
            }
        }

        let record = AimRecord {
            horizontal_y: Some(point.y),
            vertical_x: Some(point.x),
        };
        let body = serde_json::to_string(&record)?;

        // Write beside the target and rename so a crash never leaves half a record.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, body)
            .map_err(|err| BoresightError::file_error(format!("writing {}", tmp.display()), err))?;
        fs::rename(&tmp, &self.path).map_err(|err| {
            BoresightError::file_error(format!("replacing {}", self.path.display()), err)
        })?;

        debug!("Saved aim point x={} y={}", point.x, point.y);
        Ok(())
    }

    /// Save and log on failure. Used by the control loops, which must not stop on I/O.
    pub fn save_best_effort(&self, point: AimPoint) -> bool {
        match self.save(point) {
            Ok(()) => true,
            Err(err) => {
                warn!("Failed to persist aim point: {}", err);
                false
            }
        }
    }
}
