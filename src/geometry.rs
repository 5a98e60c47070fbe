//! Normalized-coordinate geometry.
//!
//! Everything here works in `[0, 1]²`: display-normalized coordinates describe a point
//! on the preview as the operator sees it, sensor-normalized coordinates describe the
//! same point on the camera sensor before orientation is applied.

pub mod mapper;
pub mod roi;

pub use mapper::{CompositionOrder, CoordinateMapper, OrientationTransform, Rotation};
pub use roi::{compute_roi, Roi, RoiLimits, RoiSolution};

/// Clamp a coordinate into the unit interval. NaN collapses to 0.
pub(crate) fn clamp01(v: f64) -> f64 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}
