//! Audible and visual feedback bound to transitions.

use crate::device::{Actuator, Repeat};
use log::warn;
use std::time::Duration;

/// One buzzer or LED pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlinkPattern {
    pub on: Duration,
    pub off: Duration,
    pub repeat: Repeat,
}

impl BlinkPattern {
    const fn new(on_ms: u64, off_ms: u64, repeat: Repeat) -> Self {
        Self {
            on: Duration::from_millis(on_ms),
            off: Duration::from_millis(off_ms),
            repeat,
        }
    }

    /// Start this pattern; failures are logged, never propagated.
    pub fn play(self, actuator: &mut dyn Actuator) {
        if let Err(err) = actuator.start_blink(self.on, self.off, self.repeat) {
            warn!("feedback pattern failed to start: {}", err);
        }
    }
}

/// LED pattern while either adjust mode is active.
pub const ADJUST_INDICATOR: BlinkPattern = BlinkPattern::new(250, 250, Repeat::Forever);

/// Buzzer cues, one per kind of transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feedback {
    StartupAck,
    EnterHorizontal,
    EnterVertical,
    ExitAdjust,
    RecordStart,
    RecordStop,
    Saved,
    Recenter,
    ExitWarning,
}

impl Feedback {
    pub fn pattern(self) -> BlinkPattern {
        match self {
            Feedback::StartupAck => BlinkPattern::new(100, 100, Repeat::Times(3)),
            Feedback::EnterHorizontal => BlinkPattern::new(150, 100, Repeat::Times(1)),
            Feedback::EnterVertical => BlinkPattern::new(150, 100, Repeat::Times(2)),
            Feedback::ExitAdjust => BlinkPattern::new(400, 100, Repeat::Times(1)),
            Feedback::RecordStart => BlinkPattern::new(500, 100, Repeat::Times(1)),
            Feedback::RecordStop => BlinkPattern::new(100, 100, Repeat::Times(2)),
            Feedback::Saved => BlinkPattern::new(50, 50, Repeat::Times(1)),
            Feedback::Recenter => BlinkPattern::new(60, 60, Repeat::Times(2)),
            Feedback::ExitWarning => BlinkPattern::new(80, 80, Repeat::Times(6)),
        }
    }
}
