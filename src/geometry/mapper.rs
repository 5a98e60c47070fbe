//! Display <-> sensor coordinate mapping under a fixed camera orientation.
//!
//! The camera pipeline applies a rotation (quarter turns) and optional mirroring between
//! the sensor and the preview. Different hardware stacks apply the two in a different
//! order, so the order is part of the configuration and never guessed at call time.

use crate::geometry::clamp01;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Quarter-turn rotation applied by the camera pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    pub const ALL: [Rotation; 4] = [
        Rotation::Deg0,
        Rotation::Deg90,
        Rotation::Deg180,
        Rotation::Deg270,
    ];

    /// Number of clockwise quarter turns.
    pub fn quarter_turns(self) -> u8 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 1,
            Rotation::Deg180 => 2,
            Rotation::Deg270 => 3,
        }
    }

    pub fn degrees(self) -> u16 {
        u16::from(self.quarter_turns()) * 90
    }

    /// The rotation that undoes this one.
    pub fn inverse(self) -> Rotation {
        match self {
            Rotation::Deg0 => Rotation::Deg0,
            Rotation::Deg90 => Rotation::Deg270,
            Rotation::Deg180 => Rotation::Deg180,
            Rotation::Deg270 => Rotation::Deg90,
        }
    }

    /// Whether the rotation swaps the horizontal and vertical axes.
    pub fn swaps_axes(self) -> bool {
        matches!(self, Rotation::Deg90 | Rotation::Deg270)
    }

    fn apply(self, x: f64, y: f64) -> (f64, f64) {
        match self {
            Rotation::Deg0 => (x, y),
            Rotation::Deg90 => (y, 1.0 - x),
            Rotation::Deg180 => (1.0 - x, 1.0 - y),
            Rotation::Deg270 => (1.0 - y, x),
        }
    }
}

impl TryFrom<u16> for Rotation {
    type Error = String;

    fn try_from(degrees: u16) -> std::result::Result<Self, Self::Error> {
        match degrees {
            0 => Ok(Rotation::Deg0),
            90 => Ok(Rotation::Deg90),
            180 => Ok(Rotation::Deg180),
            270 => Ok(Rotation::Deg270),
            other => Err(format!(
                "rotation must be one of 0, 90, 180, 270 (got {})",
                other
            )),
        }
    }
}

impl From<Rotation> for u16 {
    fn from(rotation: Rotation) -> Self {
        rotation.degrees()
    }
}

impl fmt::Display for Rotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}°", self.degrees())
    }
}

/// Order in which mirroring and rotation are applied when going display -> sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompositionOrder {
    #[default]
    FlipThenRotate,
    RotateThenFlip,
}

/// Fixed per-session orientation of the camera relative to the display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OrientationTransform {
    pub rotation: Rotation,
    pub mirror_x: bool,
    pub mirror_y: bool,
}

impl OrientationTransform {
    pub fn new(rotation: Rotation, mirror_x: bool, mirror_y: bool) -> Self {
        Self {
            rotation,
            mirror_x,
            mirror_y,
        }
    }

    fn flip(&self, x: f64, y: f64) -> (f64, f64) {
        let x = if self.mirror_x { 1.0 - x } else { x };
        let y = if self.mirror_y { 1.0 - y } else { y };
        (x, y)
    }
}

/// Bidirectional transform between display-normalized and sensor-normalized points.
///
/// `to_sensor` and `to_display` are an exact inverse pair for a fixed instance. Inputs
/// outside `[0, 1]` are clamped, as are outputs, so neither direction can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinateMapper {
    orientation: OrientationTransform,
    order: CompositionOrder,
}

impl CoordinateMapper {
    pub fn new(orientation: OrientationTransform, order: CompositionOrder) -> Self {
        Self { orientation, order }
    }

    /// Mapper for an upright, unmirrored camera.
    pub fn identity() -> Self {
        Self::new(OrientationTransform::default(), CompositionOrder::default())
    }

    pub fn orientation(&self) -> OrientationTransform {
        self.orientation
    }

    pub fn order(&self) -> CompositionOrder {
        self.order
    }

    /// Display-normalized -> sensor-normalized.
    pub fn to_sensor(&self, nx: f64, ny: f64) -> (f64, f64) {
        let (x, y) = (clamp01(nx), clamp01(ny));
        let rotation = self.orientation.rotation;
        let (x, y) = match self.order {
            CompositionOrder::FlipThenRotate => {
                let (x, y) = self.orientation.flip(x, y);
                rotation.apply(x, y)
            }
            CompositionOrder::RotateThenFlip => {
                let (x, y) = rotation.apply(x, y);
                self.orientation.flip(x, y)
            }
        };
        (clamp01(x), clamp01(y))
    }

    /// Sensor-normalized -> display-normalized.
    pub fn to_display(&self, sx: f64, sy: f64) -> (f64, f64) {
        let (x, y) = (clamp01(sx), clamp01(sy));
        let undo = self.orientation.rotation.inverse();
        let (x, y) = match self.order {
            CompositionOrder::FlipThenRotate => {
                let (x, y) = undo.apply(x, y);
                self.orientation.flip(x, y)
            }
            CompositionOrder::RotateThenFlip => {
                let (x, y) = self.orientation.flip(x, y);
                undo.apply(x, y)
            }
        };
        (clamp01(x), clamp01(y))
    }

    /// Convert a sensor-space extent (width, height) into display-space terms.
    pub fn extent_to_display(&self, w: f64, h: f64) -> (f64, f64) {
        if self.orientation.rotation.swaps_axes() {
            (h, w)
        } else {
            (w, h)
        }
    }
}

impl Default for CoordinateMapper {
    fn default() -> Self {
        Self::identity()
    }
}
