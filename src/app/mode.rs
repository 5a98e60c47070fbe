use crate::config::TimingConfig;
use crate::overlay::StatusCaption;
use std::fmt;
use std::time::Duration;

/// Operating mode of the device. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Mode {
    #[default]
    Startup,
    Normal,
    HorizontalAdjust,
    VerticalAdjust,
    Recording,
    Saving,
}

impl Mode {
    /// Sleep between state-machine ticks in this mode.
    ///
    /// Adjust modes poll fast so held buttons nudge smoothly; everything else idles.
    pub fn tick_interval(self, timing: &TimingConfig) -> Duration {
        match self {
            Mode::HorizontalAdjust | Mode::VerticalAdjust => timing.adjust_tick(),
            Mode::Startup | Mode::Normal | Mode::Recording | Mode::Saving => timing.idle_tick(),
        }
    }

    /// Caption shown on entering the mode.
    pub fn caption(self) -> StatusCaption {
        match self {
            Mode::Startup => StatusCaption::Starting,
            Mode::Normal => StatusCaption::Live,
            Mode::HorizontalAdjust => StatusCaption::HorizontalAdjust,
            Mode::VerticalAdjust => StatusCaption::VerticalAdjust,
            Mode::Recording => StatusCaption::Recording,
            Mode::Saving => StatusCaption::Saving,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mode::Startup => "Startup",
            Mode::Normal => "Normal",
            Mode::HorizontalAdjust => "HorizontalAdjust",
            Mode::VerticalAdjust => "VerticalAdjust",
            Mode::Recording => "Recording",
            Mode::Saving => "Saving",
        };
        f.write_str(name)
    }
}
