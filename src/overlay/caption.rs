//! Status caption vocabulary and the heartbeat status line.

use chrono::{DateTime, TimeZone};
use std::fmt;
use std::fs;
use std::path::Path;

/// Sysfs node exposing the SoC temperature in millidegrees Celsius.
pub const CPU_TEMP_PATH: &str = "/sys/class/thermal/thermal_zone0/temp";

/// Closed set of captions shown on the overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StatusCaption {
    #[default]
    Starting,
    Live,
    HorizontalAdjust,
    VerticalAdjust,
    Recording,
    RecordFailed,
    Saving,
    Exiting,
}

impl StatusCaption {
    pub fn as_str(self) -> &'static str {
        match self {
            StatusCaption::Starting => "STARTING",
            StatusCaption::Live => "LIVE",
            StatusCaption::HorizontalAdjust => "ADJUST H",
            StatusCaption::VerticalAdjust => "ADJUST V",
            StatusCaption::Recording => "REC",
            StatusCaption::RecordFailed => "REC FAILED",
            StatusCaption::Saving => "SAVING...",
            StatusCaption::Exiting => "EXITING",
        }
    }
}

impl fmt::Display for StatusCaption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compose the line the heartbeat publishes: caption, zoom (when zoomed), clock and
/// CPU temperature (when the sensor is readable).
pub fn status_line<Tz: TimeZone>(
    caption: StatusCaption,
    zoom_level: f64,
    now: &DateTime<Tz>,
    cpu_temp_c: Option<i32>,
) -> String
where
    Tz::Offset: fmt::Display,
{
    let mut parts = vec![caption.as_str().to_string()];
    if zoom_level > 1.0 {
        parts.push(format!("{:.1}x", zoom_level));
    }
    parts.push(now.format("%H:%M:%S").to_string());
    if let Some(temp) = cpu_temp_c {
        parts.push(format!("{}C", temp));
    }
    parts.join(" | ")
}

/// Parse a sysfs millidegree reading, rounding up to whole degrees.
pub fn parse_millidegrees(raw: &str) -> Option<i32> {
    let milli: f64 = raw.trim().parse().ok()?;
    Some((milli / 1000.0).ceil() as i32)
}

/// Read the CPU temperature from `path`; `None` when the node is missing or garbled.
pub fn read_cpu_temp(path: &Path) -> Option<i32> {
    fs::read_to_string(path)
        .ok()
        .and_then(|raw| parse_millidegrees(&raw))
}
