//! Reticle overlay state.
//!
//! Rendering is someone else's job; this module owns the aim point the renderer draws,
//! keeps it inside the overlay so the reticle never clips, and converts between pixel
//! and display-normalized positions.

pub mod caption;
pub mod store;

pub use caption::StatusCaption;
pub use store::AimPointStore;

use serde::{Deserialize, Serialize};

/// Reticle position in overlay pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AimPoint {
    pub x: i32,
    pub y: i32,
}

impl AimPoint {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Visual parameters of the reticle. Recorded in the metadata header of every video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayStyle {
    pub radius: u32,
    pub ring_thickness: u32,
    pub tick_length: u32,
    pub tick_thickness: u32,
    pub gap: u32,
    /// RGBA
    pub color: [u8; 4],
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            radius: 40,
            ring_thickness: 2,
            tick_length: 12,
            tick_thickness: 2,
            gap: 6,
            color: [255, 0, 0, 255],
        }
    }
}

/// Overlay dimensions plus the current aim point.
#[derive(Debug, Clone)]
pub struct Overlay {
    width: u32,
    height: u32,
    style: OverlayStyle,
    aim: AimPoint,
}

impl Overlay {
    /// Create an overlay with the aim point at its center.
    pub fn new(width: u32, height: u32, style: OverlayStyle) -> Self {
        let mut overlay = Self {
            width: width.max(1),
            height: height.max(1),
            style,
            aim: AimPoint::default(),
        };
        overlay.recenter();
        overlay
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn style(&self) -> &OverlayStyle {
        &self.style
    }

    pub fn aim(&self) -> AimPoint {
        self.aim
    }

    pub fn center(&self) -> AimPoint {
        AimPoint::new((self.width / 2) as i32, (self.height / 2) as i32)
    }

    /// Move the aim point, clamped so the reticle stays fully on screen.
    pub fn set_aim(&mut self, x: i32, y: i32) {
        self.aim = self.clamp(AimPoint::new(x, y));
    }

    pub fn nudge(&mut self, dx: i32, dy: i32) {
        let AimPoint { x, y } = self.aim;
        self.set_aim(x.saturating_add(dx), y.saturating_add(dy));
    }

    pub fn recenter(&mut self) {
        let center = self.center();
        self.set_aim(center.x, center.y);
    }

    pub fn recenter_x(&mut self) {
        let y = self.aim.y;
        self.set_aim(self.center().x, y);
    }

    pub fn recenter_y(&mut self) {
        let x = self.aim.x;
        self.set_aim(x, self.center().y);
    }

    /// Clamp a point to `[radius, dim - 1 - radius]` on both axes.
    pub fn clamp(&self, point: AimPoint) -> AimPoint {
        AimPoint::new(
            clamp_axis(point.x, self.width, self.style.radius),
            clamp_axis(point.y, self.height, self.style.radius),
        )
    }

    /// Pixel -> display-normalized.
    pub fn to_normalized(&self, point: AimPoint) -> (f64, f64) {
        (
            f64::from(point.x) / f64::from(self.width),
            f64::from(point.y) / f64::from(self.height),
        )
    }

    /// Display-normalized -> pixel, clamped to the reticle bounds.
    pub fn from_normalized(&self, nx: f64, ny: f64) -> AimPoint {
        let x = (nx * f64::from(self.width)).round();
        let y = (ny * f64::from(self.height)).round();
        // `as` saturates for out-of-range floats and maps NaN to 0.
        self.clamp(AimPoint::new(x as i32, y as i32))
    }
}

fn clamp_axis(value: i32, dimension: u32, radius: u32) -> i32 {
    let low = radius as i64;
    let high = dimension as i64 - 1 - radius as i64;
    if high < low {
        // Reticle larger than the overlay: pin to the middle.
        return (dimension / 2) as i32;
    }
    (value as i64).clamp(low, high) as i32
}
