//! Camera backend seam.

use crate::error::Result;
use crate::geometry::{OrientationTransform, Roi};
use log::info;

/// What the control loop needs from the camera.
pub trait CameraBackend: Send {
    /// Apply a sensor-normalized crop. All components are within `[0, 1]`.
    fn apply_roi(&mut self, roi: Roi) -> Result<()>;

    /// Orientation the camera pipeline applies; fixed for the session.
    fn orientation(&self) -> OrientationTransform;
}

/// Host backend that logs every crop instead of driving a sensor.
#[derive(Debug, Clone)]
pub struct LoggingCamera {
    orientation: OrientationTransform,
    last_roi: Roi,
}

impl LoggingCamera {
    pub fn new(orientation: OrientationTransform) -> Self {
        Self {
            orientation,
            last_roi: Roi::FULL,
        }
    }

    pub fn last_roi(&self) -> Roi {
        self.last_roi
    }
}

impl CameraBackend for LoggingCamera {
    fn apply_roi(&mut self, roi: Roi) -> Result<()> {
        info!(
            "camera roi x={:.4} y={:.4} w={:.4} h={:.4}",
            roi.x, roi.y, roi.w, roi.h
        );
        self.last_roi = roi;
        Ok(())
    }

    fn orientation(&self) -> OrientationTransform {
        self.orientation
    }
}
