//! Anchored digital zoom.
//!
//! A zoom session starts on the first step above level 1. At that moment the reticle's
//! position is converted once into a sensor-space anchor; every later step reuses that
//! anchor instead of re-reading the live reticle, so repeated zooming never drifts.
//! Because the crop is always centered on the anchor, the reticle is drawn at the
//! overlay center for the duration of the session.
//!
//! Leaving the session (back to level 1) restores the exact pre-zoom pixel position,
//! unless the operator nudged the reticle while zoomed. In that case the moved anchor
//! is projected back to display space and becomes the new baseline.

use crate::geometry::{compute_roi, CoordinateMapper, Roi, RoiLimits};
use crate::overlay::{AimPoint, Overlay};
use log::debug;

/// Levels this close to 1 end the session.
const BASE_LEVEL_EPSILON: f64 = 1e-4;

/// State that only exists while zoomed in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomSession {
    pub level: f64,
    /// Sensor-normalized point the crop is centered on.
    pub anchor: (f64, f64),
    /// Set once the operator moves the reticle while zoomed.
    pub anchor_dirty: bool,
    /// Where the reticle was when the session began.
    pub pre_zoom_aim: AimPoint,
}

/// What the camera should do after a zoom operation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomOutcome {
    pub level: f64,
    pub roi: Roi,
    /// The crop is smaller than nominal because the anchor is near an edge.
    pub shrunk: bool,
    /// The session ended with a moved anchor; the new aim point should be persisted.
    pub rebaselined: bool,
}

impl ZoomOutcome {
    fn base() -> Self {
        Self {
            level: 1.0,
            roi: Roi::FULL,
            shrunk: false,
            rebaselined: false,
        }
    }
}

/// Drives the crop for zoom steps and owns the active session.
#[derive(Debug, Clone)]
pub struct ZoomEngine {
    mapper: CoordinateMapper,
    limits: RoiLimits,
    step: f64,
    session: Option<ZoomSession>,
}

impl ZoomEngine {
    pub fn new(mapper: CoordinateMapper, limits: RoiLimits, step: f64) -> Self {
        let step = if step.is_finite() && step > 0.0 {
            step
        } else {
            1.0
        };
        Self {
            mapper,
            limits,
            step,
            session: None,
        }
    }

    pub fn level(&self) -> f64 {
        self.session.map_or(1.0, |session| session.level)
    }

    pub fn is_zoomed(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&ZoomSession> {
        self.session.as_ref()
    }

    /// The aim point that would be in effect at level 1: the overlay's own point when
    /// not zoomed, otherwise whatever [`exit`](Self::exit) would restore. This is what
    /// gets persisted while a session is open.
    pub fn baseline_aim(&self, overlay: &Overlay) -> AimPoint {
        match self.session {
            None => overlay.aim(),
            Some(session) if session.anchor_dirty => {
                let (nx, ny) = self
                    .mapper
                    .to_display(session.anchor.0, session.anchor.1);
                overlay.from_normalized(nx, ny)
            }
            Some(session) => overlay.clamp(session.pre_zoom_aim),
        }
    }

    /// Crop for the current state without changing anything.
    pub fn current_roi(&self) -> Roi {
        match self.session {
            Some(session) => compute_roi(session.level, session.anchor, &self.limits).roi,
            None => Roi::FULL,
        }
    }

    pub fn zoom_in(&mut self, overlay: &mut Overlay) -> ZoomOutcome {
        self.set_level(self.level() + self.step, overlay)
    }

    pub fn zoom_out(&mut self, overlay: &mut Overlay) -> ZoomOutcome {
        self.set_level(self.level() - self.step, overlay)
    }

    /// Move to `target` (clamped to `[1, max_level]`), starting or ending a session as
    /// needed.
    pub fn set_level(&mut self, target: f64, overlay: &mut Overlay) -> ZoomOutcome {
        let max_level = self.limits.max_level.max(1.0);
        let target = if target.is_nan() {
            1.0
        } else {
            target.clamp(1.0, max_level)
        };

        if target <= 1.0 + BASE_LEVEL_EPSILON {
            return self.exit(overlay);
        }

        let session = match self.session.as_mut() {
            Some(session) => {
                session.level = target;
                *session
            }
            None => {
                let pre_zoom_aim = overlay.aim();
                let (nx, ny) = overlay.to_normalized(pre_zoom_aim);
                let anchor = self.mapper.to_sensor(nx, ny);
                let session = ZoomSession {
                    level: target,
                    anchor,
                    anchor_dirty: false,
                    pre_zoom_aim,
                };
                debug!(
                    "Zoom session started at aim ({}, {}) anchor ({:.4}, {:.4})",
                    pre_zoom_aim.x, pre_zoom_aim.y, anchor.0, anchor.1
                );
                self.session = Some(session);
                overlay.recenter();
                session
            }
        };

        let solution = compute_roi(session.level, session.anchor, &self.limits);
        debug!(
            "Zoom {:.2}x roi ({:.4}, {:.4}, {:.4}, {:.4}){}",
            solution.level,
            solution.roi.x,
            solution.roi.y,
            solution.roi.w,
            solution.roi.h,
            if solution.shrunk { " shrunk" } else { "" }
        );
        ZoomOutcome {
            level: solution.level,
            roi: solution.roi,
            shrunk: solution.shrunk,
            rebaselined: false,
        }
    }

    /// Return to level 1, restoring or rebaselining the aim point.
    pub fn exit(&mut self, overlay: &mut Overlay) -> ZoomOutcome {
        let Some(session) = self.session.take() else {
            return ZoomOutcome::base();
        };

        let mut outcome = ZoomOutcome::base();
        if session.anchor_dirty {
            let (nx, ny) = self
                .mapper
                .to_display(session.anchor.0, session.anchor.1);
            let aim = overlay.from_normalized(nx, ny);
            overlay.set_aim(aim.x, aim.y);
            outcome.rebaselined = true;
            debug!("Zoom session ended, new baseline ({}, {})", aim.x, aim.y);
        } else {
            overlay.set_aim(session.pre_zoom_aim.x, session.pre_zoom_aim.y);
            debug!(
                "Zoom session ended, restored ({}, {})",
                session.pre_zoom_aim.x, session.pre_zoom_aim.y
            );
        }
        outcome
    }

    /// Move the reticle by a pixel delta.
    ///
    /// Outside a session this is a plain overlay nudge and returns `None`. While zoomed,
    /// the displaced reticle marks a new world point: the anchor moves there (scaled by
    /// the crop extent), the session is marked dirty, the reticle returns to center and
    /// the new crop is returned.
    pub fn nudge(&mut self, dx: i32, dy: i32, overlay: &mut Overlay) -> Option<ZoomOutcome> {
        let Some(session) = self.session.as_mut() else {
            overlay.nudge(dx, dy);
            return None;
        };

        let current = compute_roi(session.level, session.anchor, &self.limits);
        let (extent_w, extent_h) = self.mapper.extent_to_display(current.roi.w, current.roi.h);

        let center = overlay.center();
        overlay.nudge(dx, dy);
        let moved = overlay.aim();
        let offset_x = f64::from(moved.x - center.x) / f64::from(overlay.width());
        let offset_y = f64::from(moved.y - center.y) / f64::from(overlay.height());

        let (ax, ay) = self.mapper.to_display(current.anchor.0, current.anchor.1);
        session.anchor = self
            .mapper
            .to_sensor(ax + offset_x * extent_w, ay + offset_y * extent_h);
        session.anchor_dirty = true;
        overlay.recenter();

        let solution = compute_roi(session.level, session.anchor, &self.limits);
        Some(ZoomOutcome {
            level: solution.level,
            roi: solution.roi,
            shrunk: solution.shrunk,
            rebaselined: false,
        })
    }
}
