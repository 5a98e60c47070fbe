//! The mode state machine.
//!
//! Single owner of the input decoder, the zoom engine and the overlay. Edges arrive via
//! [`ModeStateMachine::ingest`]; [`ModeStateMachine::tick`] polls the decoder, applies
//! the transition table for the current mode and publishes a [`ControlSnapshot`] that
//! the heartbeat and the recorder read. Every mode accepts every event: anything that
//! does not apply is ignored for that tick.

use crate::app::feedback::{Feedback, ADJUST_INDICATOR};
use crate::app::mode::Mode;
use crate::config::{Config, TimingConfig};
use crate::device::{Actuator, CameraBackend, LiveSnapshot, Recorder, RecordingParams, SnapshotFn};
use crate::geometry::{CoordinateMapper, Roi};
use crate::input::{ButtonId, ComboKind, DecodedEvent, HeldButtons, InputDecoder, RawEdge};
use crate::overlay::{AimPoint, AimPointStore, Overlay, StatusCaption};
use crate::zoom::{ZoomEngine, ZoomOutcome};
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// External collaborators driven by the machine.
pub struct Peripherals {
    pub camera: Box<dyn CameraBackend>,
    pub recorder: Box<dyn Recorder>,
    pub buzzer: Box<dyn Actuator>,
    pub led: Box<dyn Actuator>,
}

/// State published after every tick for the heartbeat and the recorder.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlSnapshot {
    pub mode: Mode,
    pub caption: StatusCaption,
    /// Where the reticle is drawn right now.
    pub aim: AimPoint,
    /// Aim point in effect at level 1; the value that gets persisted.
    pub baseline_aim: AimPoint,
    pub zoom_level: f64,
    /// Caption enriched by the heartbeat with clock and temperature.
    pub status_line: String,
}

impl ControlSnapshot {
    fn new(aim: AimPoint) -> Self {
        Self {
            mode: Mode::Startup,
            caption: StatusCaption::Starting,
            aim,
            baseline_aim: aim,
            zoom_level: 1.0,
            status_line: StatusCaption::Starting.as_str().to_string(),
        }
    }
}

pub type SharedControl = Arc<Mutex<ControlSnapshot>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    /// The exit combo was held long enough; the warning cue has started.
    ExitRequested,
}

/// A zoom button edge counts only when select and the opposite zoom button were up
/// at the moment it was pressed.
fn zoom_edge_allowed(held: HeldButtons, other: ButtonId) -> bool {
    !held.contains(ButtonId::Select) && !held.contains(other)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Both,
    X,
    Y,
}

pub struct ModeStateMachine {
    mode: Mode,
    caption: StatusCaption,
    decoder: InputDecoder,
    zoom: ZoomEngine,
    overlay: Overlay,
    store: AimPointStore,
    peripherals: Peripherals,
    shared: SharedControl,
    timing: TimingConfig,
    combo_hold: Duration,
    nudge_step: i32,
    record_latched: bool,
    exit_latched: bool,
    /// An exit combo ended during the current tick's events.
    exit_released: bool,
    recording_started: bool,
}

impl ModeStateMachine {
    /// Build the machine in `Startup`. The aim point is restored from `store`, falling
    /// back to the overlay center.
    pub fn new(config: &Config, peripherals: Peripherals, store: AimPointStore) -> Self {
        let mut overlay = Overlay::new(
            config.overlay.width,
            config.overlay.height,
            config.overlay.style.clone(),
        );
        let aim = store.load_or_center(&overlay);
        overlay.set_aim(aim.x, aim.y);

        let mapper = CoordinateMapper::new(peripherals.camera.orientation(), config.camera.order);
        let zoom = ZoomEngine::new(mapper, config.roi_limits(), config.zoom.step);
        let shared = Arc::new(Mutex::new(ControlSnapshot::new(overlay.aim())));

        Self {
            mode: Mode::Startup,
            caption: StatusCaption::Starting,
            decoder: InputDecoder::new(config.decoder_config()),
            zoom,
            overlay,
            store,
            peripherals,
            shared,
            timing: config.timing.clone(),
            combo_hold: config.combo_hold(),
            nudge_step: config.adjust.nudge_step_px,
            record_latched: false,
            exit_latched: false,
            exit_released: false,
            recording_started: false,
        }
    }

    pub fn shared(&self) -> SharedControl {
        Arc::clone(&self.shared)
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn caption(&self) -> StatusCaption {
        self.caption
    }

    pub fn overlay(&self) -> &Overlay {
        &self.overlay
    }

    pub fn zoom(&self) -> &ZoomEngine {
        &self.zoom
    }

    /// Sleep before the next tick; depends only on the current mode.
    pub fn tick_interval(&self) -> Duration {
        self.mode.tick_interval(&self.timing)
    }

    pub fn ingest(&mut self, edge: RawEdge) {
        self.decoder.ingest(edge);
    }

    pub fn tick(&mut self, now: Instant) -> TickOutcome {
        let events = self.decoder.poll(now);

        let outcome = if self.mode == Mode::Startup {
            // Edges seen before the first tick are dropped.
            self.transition(Mode::Normal);
            TickOutcome::Continue
        } else {
            let entered = self.mode;
            let mut outcome = TickOutcome::Continue;
            self.exit_released = false;
            for event in events {
                if self.on_event(event) == TickOutcome::ExitRequested {
                    // Nothing after the exit gesture is acted on.
                    outcome = TickOutcome::ExitRequested;
                    break;
                }
            }
            // A mode entered by an event starts polling on the next tick.
            if outcome == TickOutcome::Continue && self.mode == entered {
                outcome = self.on_poll(now);
            }
            outcome
        };

        self.publish();
        outcome
    }

    /// Stop actuators and any recording, leave zoom and persist the aim point.
    pub fn shutdown(&mut self) {
        self.peripherals.led.stop();
        self.peripherals.buzzer.stop();

        if self.recording_started {
            if let Err(err) = self.peripherals.recorder.stop() {
                warn!("Failed to stop recording at shutdown: {}", err);
            }
            self.recording_started = false;
        }

        if self.zoom.is_zoomed() {
            let outcome = self.zoom.exit(&mut self.overlay);
            self.apply_roi(outcome.roi);
        }
        self.persist();
        self.publish();
        info!("State machine stopped in {}", self.mode);
    }

    fn on_event(&mut self, event: DecodedEvent) -> TickOutcome {
        if let DecodedEvent::ComboEnd { kind, duration } = event {
            debug!("{:?} combo released after {:?}", kind, duration);
            // A combo released between polls still counts if it was held long enough.
            let outcome = if self.mode == Mode::Normal && duration >= self.combo_hold {
                self.fire_combo(kind)
            } else {
                TickOutcome::Continue
            };
            match kind {
                ComboKind::Record => self.record_latched = false,
                ComboKind::Exit => {
                    self.exit_latched = false;
                    self.exit_released = true;
                }
            }
            return outcome;
        }

        match self.mode {
            Mode::Startup | Mode::Saving => {}
            Mode::Normal => self.on_normal_event(event),
            Mode::HorizontalAdjust => self.on_adjust_event(event, Axis::X),
            Mode::VerticalAdjust => self.on_adjust_event(event, Axis::Y),
            Mode::Recording => {
                if let DecodedEvent::Tap {
                    button: ButtonId::Select,
                    ..
                } = event
                {
                    if self.decoder.take_tap(ButtonId::Select).is_some() {
                        self.stop_recording();
                    }
                }
            }
        }
        TickOutcome::Continue
    }

    fn on_normal_event(&mut self, event: DecodedEvent) {
        match event {
            DecodedEvent::Press {
                button: ButtonId::Primary,
                held,
            } => {
                if zoom_edge_allowed(held, ButtonId::Secondary) {
                    let outcome = self.zoom.zoom_in(&mut self.overlay);
                    self.apply_zoom(outcome);
                }
            }
            DecodedEvent::Press {
                button: ButtonId::Secondary,
                held,
            } => {
                if zoom_edge_allowed(held, ButtonId::Primary) {
                    let outcome = self.zoom.zoom_out(&mut self.overlay);
                    self.apply_zoom(outcome);
                }
            }
            DecodedEvent::DoubleTap(ButtonId::Select) => {
                if self.decoder.take_double_tap(ButtonId::Select) {
                    self.recenter(Axis::Both);
                }
            }
            DecodedEvent::LongHold(ButtonId::Select) => {
                if self.decoder.combo_active(ComboKind::Exit)
                    || self.exit_latched
                    || self.exit_released
                {
                    debug!("Select hold ignored while the exit combo is held");
                } else {
                    self.transition(Mode::HorizontalAdjust);
                }
            }
            DecodedEvent::Press {
                button: ButtonId::Select,
                ..
            }
            | DecodedEvent::Tap { .. }
            | DecodedEvent::LongHold(_)
            | DecodedEvent::DoubleTap(_)
            | DecodedEvent::ComboStart(_)
            | DecodedEvent::ComboEnd { .. } => {}
        }
    }

    fn on_adjust_event(&mut self, event: DecodedEvent, axis: Axis) {
        match event {
            DecodedEvent::DoubleTap(ButtonId::Select) => {
                if self.decoder.take_double_tap(ButtonId::Select) {
                    self.recenter(axis);
                }
            }
            DecodedEvent::LongHold(ButtonId::Select) => {
                let next = match axis {
                    Axis::X => Mode::VerticalAdjust,
                    Axis::Y | Axis::Both => Mode::Normal,
                };
                self.transition(next);
            }
            DecodedEvent::Press { .. }
            | DecodedEvent::Tap { .. }
            | DecodedEvent::LongHold(_)
            | DecodedEvent::DoubleTap(_)
            | DecodedEvent::ComboStart(_)
            | DecodedEvent::ComboEnd { .. } => {}
        }
    }

    /// Level-triggered work: combo thresholds, held nudges, recorder polling.
    fn on_poll(&mut self, now: Instant) -> TickOutcome {
        match self.mode {
            Mode::Startup => {}
            Mode::Normal => {
                if !self.exit_latched && self.combo_reached(ComboKind::Exit, now) {
                    return self.fire_combo(ComboKind::Exit);
                }
                if !self.record_latched && self.combo_reached(ComboKind::Record, now) {
                    return self.fire_combo(ComboKind::Record);
                }
            }
            Mode::HorizontalAdjust => self.nudge_held(Axis::X),
            Mode::VerticalAdjust => self.nudge_held(Axis::Y),
            Mode::Recording => {
                if !self.recording_started {
                    self.start_recording();
                }
            }
            Mode::Saving => {
                if !self.peripherals.recorder.is_active() {
                    self.transition(Mode::Normal);
                }
            }
        }
        TickOutcome::Continue
    }

    fn combo_reached(&self, kind: ComboKind, now: Instant) -> bool {
        self.decoder
            .combo_held_for(kind, now)
            .is_some_and(|held| held >= self.combo_hold)
    }

    fn fire_combo(&mut self, kind: ComboKind) -> TickOutcome {
        match kind {
            ComboKind::Record => {
                if self.record_latched {
                    return TickOutcome::Continue;
                }
                self.record_latched = true;
                self.transition(Mode::Recording);
                TickOutcome::Continue
            }
            ComboKind::Exit => {
                if self.exit_latched {
                    return TickOutcome::Continue;
                }
                self.exit_latched = true;
                info!("Exit combo held, shutting down");
                Feedback::ExitWarning
                    .pattern()
                    .play(&mut *self.peripherals.buzzer);
                self.set_caption(StatusCaption::Exiting);
                TickOutcome::ExitRequested
            }
        }
    }

    fn nudge_held(&mut self, axis: Axis) {
        let direction = i32::from(self.decoder.is_pressed(ButtonId::Secondary))
            - i32::from(self.decoder.is_pressed(ButtonId::Primary));
        if direction == 0 {
            return;
        }
        let step = direction * self.nudge_step;
        let (dx, dy) = match axis {
            Axis::X => (step, 0),
            Axis::Y => (0, step),
            Axis::Both => (step, step),
        };
        if let Some(outcome) = self.zoom.nudge(dx, dy, &mut self.overlay) {
            self.apply_roi(outcome.roi);
        }
    }

    fn recenter(&mut self, axis: Axis) {
        if self.zoom.is_zoomed() {
            let outcome = self.zoom.exit(&mut self.overlay);
            self.apply_roi(outcome.roi);
        }
        match axis {
            Axis::Both => self.overlay.recenter(),
            Axis::X => self.overlay.recenter_x(),
            Axis::Y => self.overlay.recenter_y(),
        }
        let aim = self.overlay.aim();
        info!("Aim recentered ({:?}) to ({}, {})", axis, aim.x, aim.y);
        Feedback::Recenter
            .pattern()
            .play(&mut *self.peripherals.buzzer);
        self.persist();
    }

    fn apply_zoom(&mut self, outcome: ZoomOutcome) {
        debug!("Zoom level {:.1}", outcome.level);
        self.apply_roi(outcome.roi);
        if outcome.rebaselined {
            self.persist();
        }
    }

    fn apply_roi(&mut self, roi: Roi) {
        if let Err(err) = self.peripherals.camera.apply_roi(roi) {
            warn!("Camera rejected ROI {:?}: {}", roi.as_tuple(), err);
        }
    }

    fn persist(&self) {
        self.store
            .save_best_effort(self.zoom.baseline_aim(&self.overlay));
    }

    fn snapshot_fn(&self) -> SnapshotFn {
        let shared = Arc::clone(&self.shared);
        Arc::new(move || {
            let control = shared.lock();
            LiveSnapshot {
                aim: control.aim,
                caption: control.status_line.clone(),
            }
        })
    }

    fn start_recording(&mut self) {
        let params = RecordingParams {
            overlay_style: self.overlay.style().clone(),
            snapshot: self.snapshot_fn(),
        };
        match self.peripherals.recorder.start(params) {
            Ok(path) => {
                info!("Recording to {}", path.display());
                self.recording_started = true;
                self.set_caption(StatusCaption::Recording);
            }
            Err(err) => {
                if self.caption != StatusCaption::RecordFailed {
                    warn!("Recorder failed to start, will retry: {}", err);
                } else {
                    debug!("Recorder retry failed: {}", err);
                }
                self.set_caption(StatusCaption::RecordFailed);
            }
        }
    }

    fn stop_recording(&mut self) {
        if self.recording_started {
            if let Err(err) = self.peripherals.recorder.stop() {
                warn!("Recorder failed to stop cleanly: {}", err);
            }
            self.recording_started = false;
        }
        self.transition(Mode::Saving);
    }

    fn transition(&mut self, next: Mode) {
        let prev = self.mode;
        if prev == next {
            return;
        }
        info!("Mode {} -> {}", prev, next);
        self.mode = next;
        self.set_caption(next.caption());

        let cue = match next {
            Mode::Startup => None,
            Mode::Normal => match prev {
                Mode::Startup => {
                    self.apply_roi(self.zoom.current_roi());
                    Some(Feedback::StartupAck)
                }
                Mode::HorizontalAdjust | Mode::VerticalAdjust => {
                    self.peripherals.led.stop();
                    self.persist();
                    Some(Feedback::ExitAdjust)
                }
                Mode::Saving => Some(Feedback::Saved),
                Mode::Normal | Mode::Recording => None,
            },
            Mode::HorizontalAdjust => {
                ADJUST_INDICATOR.play(&mut *self.peripherals.led);
                Some(Feedback::EnterHorizontal)
            }
            Mode::VerticalAdjust => Some(Feedback::EnterVertical),
            Mode::Recording => {
                self.recording_started = false;
                Some(Feedback::RecordStart)
            }
            Mode::Saving => Some(Feedback::RecordStop),
        };
        if let Some(cue) = cue {
            cue.pattern().play(&mut *self.peripherals.buzzer);
        }

        if next == Mode::Recording {
            self.start_recording();
        }
    }

    fn set_caption(&mut self, caption: StatusCaption) {
        if self.caption == caption {
            return;
        }
        self.caption = caption;
        let mut control = self.shared.lock();
        control.caption = caption;
        control.status_line = caption.as_str().to_string();
    }

    fn publish(&self) {
        let mut control = self.shared.lock();
        control.mode = self.mode;
        control.caption = self.caption;
        control.aim = self.overlay.aim();
        control.baseline_aim = self.zoom.baseline_aim(&self.overlay);
        control.zoom_level = self.zoom.level();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{LoggingCamera, Repeat};
    use crate::error::{BoresightError, Result};
    use crate::geometry::OrientationTransform;
    use std::path::PathBuf;

    #[derive(Default)]
    struct NullActuator;

    impl Actuator for NullActuator {
        fn start_blink(&mut self, _on: Duration, _off: Duration, _repeat: Repeat) -> Result<()> {
            Ok(())
        }
        fn stop(&mut self) {}
        fn is_active(&self) -> bool {
            false
        }
    }

    struct RefusingRecorder {
        attempts: Arc<Mutex<u32>>,
    }

    impl Recorder for RefusingRecorder {
        fn start(&mut self, _params: RecordingParams) -> Result<PathBuf> {
            *self.attempts.lock() += 1;
            Err(BoresightError::recorder("no encoder"))
        }
        fn stop(&mut self) -> Result<()> {
            Ok(())
        }
        fn is_active(&self) -> bool {
            false
        }
    }

    fn machine(dir: &std::path::Path, attempts: Arc<Mutex<u32>>) -> ModeStateMachine {
        let peripherals = Peripherals {
            camera: Box::new(LoggingCamera::new(OrientationTransform::default())),
            recorder: Box::new(RefusingRecorder { attempts }),
            buzzer: Box::new(NullActuator),
            led: Box::new(NullActuator),
        };
        ModeStateMachine::new(
            &Config::default(),
            peripherals,
            AimPointStore::new(dir.join("aim.json")),
        )
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn recorder_failure_stays_in_recording_and_retries() {
        let dir = tempfile::tempdir().unwrap();
        let attempts = Arc::new(Mutex::new(0));
        let mut sm = machine(dir.path(), Arc::clone(&attempts));
        let t0 = Instant::now();
        sm.tick(t0);

        sm.ingest(RawEdge::press(ButtonId::Primary, t0 + ms(10)));
        sm.ingest(RawEdge::press(ButtonId::Secondary, t0 + ms(20)));
        sm.tick(t0 + ms(3100));
        assert_eq!(sm.mode(), Mode::Recording);
        assert_eq!(sm.caption(), StatusCaption::RecordFailed);

        sm.tick(t0 + ms(3225));
        sm.tick(t0 + ms(3350));
        assert_eq!(*attempts.lock(), 3);
        assert_eq!(sm.mode(), Mode::Recording);

        sm.ingest(RawEdge::release(ButtonId::Primary, t0 + ms(3400)));
        sm.ingest(RawEdge::release(ButtonId::Secondary, t0 + ms(3400)));
        sm.ingest(RawEdge::press(ButtonId::Select, t0 + ms(3500)));
        sm.ingest(RawEdge::release(ButtonId::Select, t0 + ms(3600)));
        sm.tick(t0 + ms(3700));
        assert_eq!(sm.mode(), Mode::Saving);
        sm.tick(t0 + ms(3825));
        assert_eq!(sm.mode(), Mode::Normal);
        assert_eq!(sm.caption(), StatusCaption::Live);
    }

    #[test]
    fn select_hold_during_exit_combo_does_not_enter_adjust() {
        let dir = tempfile::tempdir().unwrap();
        let mut sm = machine(dir.path(), Arc::new(Mutex::new(0)));
        let t0 = Instant::now();
        sm.tick(t0);

        sm.ingest(RawEdge::press(ButtonId::Select, t0 + ms(10)));
        sm.ingest(RawEdge::press(ButtonId::Primary, t0 + ms(50)));
        assert_eq!(sm.tick(t0 + ms(100)), TickOutcome::Continue);
        assert_eq!(sm.zoom().level(), 1.0, "primary with select held must not zoom");

        assert_eq!(sm.tick(t0 + ms(3010)), TickOutcome::Continue);
        assert_eq!(sm.mode(), Mode::Normal);
        assert_eq!(sm.tick(t0 + ms(3100)), TickOutcome::ExitRequested);
        assert_eq!(sm.caption(), StatusCaption::Exiting);
        // Latched: holding longer does not request exit again.
        assert_eq!(sm.tick(t0 + ms(3300)), TickOutcome::Continue);
    }

    #[test]
    fn tick_interval_follows_mode() {
        let dir = tempfile::tempdir().unwrap();
        let mut sm = machine(dir.path(), Arc::new(Mutex::new(0)));
        let t0 = Instant::now();
        assert_eq!(sm.tick_interval(), ms(125));
        sm.tick(t0);

        sm.ingest(RawEdge::press(ButtonId::Select, t0 + ms(10)));
        sm.tick(t0 + ms(3020));
        assert_eq!(sm.mode(), Mode::HorizontalAdjust);
        assert_eq!(sm.tick_interval(), ms(20));
    }

    #[test]
    fn shared_snapshot_tracks_machine() {
        let dir = tempfile::tempdir().unwrap();
        let mut sm = machine(dir.path(), Arc::new(Mutex::new(0)));
        let shared = sm.shared();
        assert_eq!(shared.lock().mode, Mode::Startup);

        let t0 = Instant::now();
        sm.tick(t0);
        sm.ingest(RawEdge::press(ButtonId::Primary, t0 + ms(10)));
        sm.tick(t0 + ms(125));

        let control = shared.lock().clone();
        assert_eq!(control.mode, Mode::Normal);
        assert_eq!(control.status_line, "LIVE");
        assert_eq!(control.zoom_level, 2.0);
        assert_eq!(control.aim, sm.overlay().center());
    }
}
