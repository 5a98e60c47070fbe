//! Zoom crop rectangle solver.
//!
//! Given a zoom level and an anchor in sensor-normalized space, produce the crop that the
//! camera should apply. The anchor always ends up at the exact center of the crop: when
//! the anchor sits too close to an edge for the requested size, the crop shrinks
//! uniformly instead of sliding. A slid crop would move the anchor off the view center
//! and the reticle would no longer mark the boresighted point.

use crate::geometry::clamp01;

/// Levels this close to 1 are treated as "not zoomed".
const BASE_LEVEL_EPSILON: f64 = 1e-4;

/// Largest floating overshoot past a unit edge that is silently snapped back.
const OVERSHOOT_TOLERANCE: f64 = 4.0 * f64::EPSILON;

/// Normalized crop rectangle `(x, y, w, h)` in sensor space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Roi {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Roi {
    /// The whole sensor.
    pub const FULL: Roi = Roi {
        x: 0.0,
        y: 0.0,
        w: 1.0,
        h: 1.0,
    };

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.w / 2.0, self.y + self.h / 2.0)
    }

    pub fn is_full(&self) -> bool {
        *self == Roi::FULL
    }

    /// True when the rectangle lies entirely within `[0, 1]²`.
    pub fn within_unit(&self) -> bool {
        self.x >= 0.0 && self.y >= 0.0 && self.x + self.w <= 1.0 && self.y + self.h <= 1.0
    }

    pub fn as_tuple(&self) -> (f64, f64, f64, f64) {
        (self.x, self.y, self.w, self.h)
    }
}

/// Static limits the solver works within.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoiLimits {
    /// Highest zoom level; requests above it are clamped.
    pub max_level: f64,
    /// Crop width / height in sensor-normalized units.
    pub aspect: f64,
    /// Smallest crop height ever returned, keeps the ROI from degenerating.
    pub min_height: f64,
}

impl Default for RoiLimits {
    fn default() -> Self {
        Self {
            max_level: 8.0,
            aspect: 1.0,
            min_height: 0.01,
        }
    }
}

impl RoiLimits {
    fn sanitized(&self) -> (f64, f64, f64) {
        let max_level = if self.max_level.is_finite() && self.max_level >= 1.0 {
            self.max_level
        } else {
            1.0
        };
        let aspect = if self.aspect.is_finite() && self.aspect > 0.0 {
            self.aspect
        } else {
            1.0
        };
        let min_height = if self.min_height.is_finite() && self.min_height > 0.0 {
            self.min_height.min(1.0)
        } else {
            RoiLimits::default().min_height
        };
        (max_level, aspect, min_height)
    }
}

/// Result of solving for a crop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoiSolution {
    pub roi: Roi,
    /// Zoom level actually used after clamping.
    pub level: f64,
    /// Anchor the crop is centered on. Echoes the input untouched at base zoom.
    pub anchor: (f64, f64),
    /// True when the crop had to shrink below its nominal size to stay centered.
    pub shrunk: bool,
}

/// Box of the requested height at `aspect`, scaled down uniformly if it is wider than
/// the sensor.
fn box_for_height(h: f64, aspect: f64) -> (f64, f64) {
    let w = h * aspect;
    if w > 1.0 {
        let s = 1.0 / w;
        (1.0, h * s)
    } else {
        (w, h)
    }
}

/// Nominal crop size for a zoom level, ignoring the anchor.
pub fn nominal_size(level: f64, limits: &RoiLimits) -> (f64, f64) {
    let (max_level, aspect, _) = limits.sanitized();
    let z = if level.is_nan() {
        1.0
    } else {
        level.clamp(1.0, max_level)
    };
    box_for_height(1.0 / z, aspect)
}

/// Solve for the crop at `level` centered on the sensor-normalized `anchor`.
pub fn compute_roi(level: f64, anchor: (f64, f64), limits: &RoiLimits) -> RoiSolution {
    let (max_level, aspect, min_height) = limits.sanitized();
    let z = if level.is_nan() {
        1.0
    } else {
        level.clamp(1.0, max_level)
    };

    if z <= 1.0 + BASE_LEVEL_EPSILON {
        return RoiSolution {
            roi: Roi::FULL,
            level: 1.0,
            anchor,
            shrunk: false,
        };
    }

    let (mut w, mut h) = box_for_height(1.0 / z, aspect);
    let (min_w, min_h) = box_for_height(min_height, aspect);

    // Keep the anchor far enough from the edges for the minimum crop to fit centered.
    let sx = clamp01(anchor.0).clamp(min_w / 2.0, 1.0 - min_w / 2.0);
    let sy = clamp01(anchor.1).clamp(min_h / 2.0, 1.0 - min_h / 2.0);

    // Largest crop with the same aspect that stays centered on the anchor.
    let max_w_all = 2.0 * sx.min(1.0 - sx);
    let max_h_all = 2.0 * sy.min(1.0 - sy);
    let max_w_from_h = max_h_all * aspect;
    let (max_w, max_h) = if max_w_all > max_w_from_h {
        (max_w_from_h, max_h_all)
    } else {
        (max_w_all, max_w_all / aspect)
    };

    let mut shrunk = false;
    if w > max_w || h > max_h {
        let s = (max_w / w).min(max_h / h);
        w *= s;
        h *= s;
        shrunk = true;
    }

    if h < min_h {
        w = min_w;
        h = min_h;
    }

    let x = snap_overshoot(sx - w / 2.0, w);
    let y = snap_overshoot(sy - h / 2.0, h);

    RoiSolution {
        roi: Roi { x, y, w, h },
        level: z,
        anchor: (sx, sy),
        shrunk,
    }
}

/// Pull an origin back inside `[0, 1 - extent]` only when it is off by rounding noise.
fn snap_overshoot(origin: f64, extent: f64) -> f64 {
    if origin < 0.0 && origin > -OVERSHOOT_TOLERANCE {
        return 0.0;
    }
    let overshoot = origin + extent - 1.0;
    if overshoot > 0.0 && overshoot < OVERSHOOT_TOLERANCE {
        return 1.0 - extent;
    }
    origin
}
