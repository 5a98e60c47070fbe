use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use boresight::app::{Mode, ModeStateMachine, Peripherals, TickOutcome};
use boresight::device::{Actuator, CameraBackend, Recorder, RecordingParams, Repeat};
use boresight::geometry::{OrientationTransform, Roi, Rotation};
use boresight::input::{ButtonId, RawEdge};
use boresight::overlay::{AimPoint, AimPointStore, StatusCaption};
use boresight::{Config, Result};

const EPS: f64 = 1e-6;

#[derive(Default)]
struct CameraLog {
    rois: Vec<Roi>,
}

struct MockCamera {
    orientation: OrientationTransform,
    log: Arc<Mutex<CameraLog>>,
}

impl CameraBackend for MockCamera {
    fn apply_roi(&mut self, roi: Roi) -> Result<()> {
        self.log.lock().rois.push(roi);
        Ok(())
    }

    fn orientation(&self) -> OrientationTransform {
        self.orientation
    }
}

#[derive(Default)]
struct RecorderLog {
    starts: u32,
    stops: u32,
    active: bool,
    last_caption: Option<String>,
}

struct MockRecorder {
    log: Arc<Mutex<RecorderLog>>,
}

impl Recorder for MockRecorder {
    fn start(&mut self, params: RecordingParams) -> Result<PathBuf> {
        let mut log = self.log.lock();
        log.starts += 1;
        log.active = true;
        log.last_caption = Some((params.snapshot)().caption);
        Ok(PathBuf::from("/tmp/VID_test.mp4"))
    }

    fn stop(&mut self) -> Result<()> {
        // Stays active until the test finishes "finalizing".
        self.log.lock().stops += 1;
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.log.lock().active
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ActuatorCall {
    Blink(Repeat),
    Stop,
}

struct MockActuator {
    calls: Arc<Mutex<Vec<ActuatorCall>>>,
    active: bool,
}

impl Actuator for MockActuator {
    fn start_blink(&mut self, _on: Duration, _off: Duration, repeat: Repeat) -> Result<()> {
        self.calls.lock().push(ActuatorCall::Blink(repeat));
        self.active = true;
        Ok(())
    }

    fn stop(&mut self) {
        self.calls.lock().push(ActuatorCall::Stop);
        self.active = false;
    }

    fn is_active(&self) -> bool {
        self.active
    }
}

struct Harness {
    sm: ModeStateMachine,
    camera: Arc<Mutex<CameraLog>>,
    recorder: Arc<Mutex<RecorderLog>>,
    buzzer: Arc<Mutex<Vec<ActuatorCall>>>,
    led: Arc<Mutex<Vec<ActuatorCall>>>,
    store: AimPointStore,
    t0: Instant,
    _dir: tempfile::TempDir,
}

impl Harness {
    fn new(rotation: Rotation) -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        Self::in_dir(dir, rotation)
    }

    fn in_dir(dir: tempfile::TempDir, rotation: Rotation) -> Self {
        let camera = Arc::new(Mutex::new(CameraLog::default()));
        let recorder = Arc::new(Mutex::new(RecorderLog::default()));
        let buzzer = Arc::new(Mutex::new(Vec::new()));
        let led = Arc::new(Mutex::new(Vec::new()));
        let store = AimPointStore::new(dir.path().join("overlay_offset.json"));

        let peripherals = Peripherals {
            camera: Box::new(MockCamera {
                orientation: OrientationTransform::new(rotation, false, false),
                log: Arc::clone(&camera),
            }),
            recorder: Box::new(MockRecorder {
                log: Arc::clone(&recorder),
            }),
            buzzer: Box::new(MockActuator {
                calls: Arc::clone(&buzzer),
                active: false,
            }),
            led: Box::new(MockActuator {
                calls: Arc::clone(&led),
                active: false,
            }),
        };
        let sm = ModeStateMachine::new(&Config::default(), peripherals, store.clone());

        Self {
            sm,
            camera,
            recorder,
            buzzer,
            led,
            store,
            t0: Instant::now(),
            _dir: dir,
        }
    }

    fn at(&self, ms: u64) -> Instant {
        self.t0 + Duration::from_millis(ms)
    }

    fn press(&mut self, button: ButtonId, ms: u64) {
        let at = self.at(ms);
        self.sm.ingest(RawEdge::press(button, at));
    }

    fn release(&mut self, button: ButtonId, ms: u64) {
        let at = self.at(ms);
        self.sm.ingest(RawEdge::release(button, at));
    }

    fn tick(&mut self, ms: u64) -> TickOutcome {
        let at = self.at(ms);
        self.sm.tick(at)
    }

    fn last_roi(&self) -> Roi {
        *self.camera.lock().rois.last().expect("no ROI applied")
    }

    fn started(mut self) -> Self {
        self.tick(0);
        self
    }
}

fn stored_aim(path: &Path) -> serde_json::Value {
    let text = std::fs::read_to_string(path).expect("aim record");
    serde_json::from_str(&text).expect("aim json")
}

#[test]
fn startup_enters_live_with_acknowledgement() {
    let mut h = Harness::new(Rotation::Deg180);
    assert_eq!(h.sm.mode(), Mode::Startup);

    h.tick(0);
    assert_eq!(h.sm.mode(), Mode::Normal);
    assert_eq!(h.sm.caption(), StatusCaption::Live);
    assert_eq!(h.buzzer.lock().as_slice(), &[ActuatorCall::Blink(Repeat::Times(3))]);
    assert!(h.last_roi().is_full());
}

#[test]
fn record_combo_then_select_tap_saves_and_returns_live() {
    let mut h = Harness::new(Rotation::Deg180).started();

    h.press(ButtonId::Primary, 100);
    h.press(ButtonId::Secondary, 110);
    h.tick(125);
    h.tick(2000);
    assert_eq!(h.sm.mode(), Mode::Normal);

    h.tick(3210);
    assert_eq!(h.sm.mode(), Mode::Recording);
    assert_eq!(h.sm.caption(), StatusCaption::Recording);
    assert_eq!(h.recorder.lock().starts, 1);
    assert_eq!(h.recorder.lock().last_caption.as_deref(), Some("REC"));

    // Still holding: no second start.
    h.tick(3335);
    h.release(ButtonId::Primary, 3400);
    h.release(ButtonId::Secondary, 3400);
    h.tick(3460);
    assert_eq!(h.recorder.lock().starts, 1);
    assert_eq!(h.sm.mode(), Mode::Recording);

    h.press(ButtonId::Select, 4000);
    h.release(ButtonId::Select, 4150);
    h.tick(4200);
    assert_eq!(h.sm.mode(), Mode::Saving);
    assert_eq!(h.sm.caption(), StatusCaption::Saving);
    assert_eq!(h.recorder.lock().stops, 1);

    // Finalizing takes a while; Saving waits without a timeout.
    h.tick(4325);
    h.tick(9000);
    assert_eq!(h.sm.mode(), Mode::Saving);

    h.recorder.lock().active = false;
    h.tick(9125);
    assert_eq!(h.sm.mode(), Mode::Normal);
    assert_eq!(h.sm.caption(), StatusCaption::Live);
    assert_eq!(h.recorder.lock().stops, 1);
}

#[test]
fn short_combo_does_not_record() {
    let mut h = Harness::new(Rotation::Deg0).started();
    h.press(ButtonId::Primary, 100);
    h.press(ButtonId::Secondary, 110);
    h.release(ButtonId::Secondary, 2000);
    h.tick(2100);
    h.release(ButtonId::Primary, 2200);
    h.tick(3500);
    assert_eq!(h.sm.mode(), Mode::Normal);
    assert_eq!(h.recorder.lock().starts, 0);
}

#[test]
fn zoom_steps_reuse_anchor_and_restore_aim() {
    let mut h = Harness::new(Rotation::Deg180).started();
    let before = h.sm.overlay().aim();
    let center = h.sm.overlay().center();
    assert_eq!(before, center);

    h.press(ButtonId::Primary, 100);
    h.release(ButtonId::Primary, 150);
    h.tick(200);
    assert_eq!(h.sm.zoom().level(), 2.0);
    let roi = h.last_roi();
    let (cx, cy) = roi.center();
    assert!((cx - 0.5).abs() < EPS && (cy - 0.5).abs() < EPS);
    assert!((roi.h - 0.5).abs() < EPS);

    h.press(ButtonId::Primary, 300);
    h.release(ButtonId::Primary, 350);
    h.tick(400);
    assert_eq!(h.sm.zoom().level(), 3.0);
    let anchor = h.sm.zoom().session().expect("session").anchor;

    h.press(ButtonId::Secondary, 500);
    h.release(ButtonId::Secondary, 550);
    h.tick(600);
    assert_eq!(h.sm.zoom().level(), 2.0);
    assert_eq!(h.sm.zoom().session().expect("session").anchor, anchor);

    h.press(ButtonId::Secondary, 700);
    h.release(ButtonId::Secondary, 750);
    h.tick(800);
    assert_eq!(h.sm.zoom().level(), 1.0);
    assert!(h.last_roi().is_full());
    assert_eq!(h.sm.overlay().aim(), before);
}

#[test]
fn zoom_off_center_restores_exact_pixel() {
    let dir = tempfile::tempdir().expect("temp dir");
    std::fs::write(
        dir.path().join("overlay_offset.json"),
        r#"{"horizontal_y": 211, "vertical_x": 903}"#,
    )
    .expect("seed record");
    let mut h = Harness::in_dir(dir, Rotation::Deg180).started();
    assert_eq!(h.sm.overlay().aim(), AimPoint::new(903, 211));

    h.press(ButtonId::Primary, 100);
    h.release(ButtonId::Primary, 150);
    h.tick(200);
    h.press(ButtonId::Primary, 300);
    h.release(ButtonId::Primary, 350);
    h.tick(400);

    // Rotated 180 degrees: display (903, 211) is sensor (1 - 903/1280, 1 - 211/720).
    let (cx, cy) = h.last_roi().center();
    assert!((cx - (1.0 - 903.0 / 1280.0)).abs() < EPS);
    assert!((cy - (1.0 - 211.0 / 720.0)).abs() < EPS);

    h.press(ButtonId::Secondary, 500);
    h.release(ButtonId::Secondary, 550);
    h.tick(600);
    h.press(ButtonId::Secondary, 700);
    h.release(ButtonId::Secondary, 750);
    h.tick(800);
    assert_eq!(h.sm.overlay().aim(), AimPoint::new(903, 211));
}

#[test]
fn adjust_cycle_nudges_each_axis_and_persists() {
    let mut h = Harness::new(Rotation::Deg0).started();
    let center = h.sm.overlay().center();

    h.press(ButtonId::Select, 100);
    h.tick(3100);
    assert_eq!(h.sm.mode(), Mode::HorizontalAdjust);
    assert_eq!(h.sm.caption(), StatusCaption::HorizontalAdjust);
    assert_eq!(
        h.led.lock().as_slice(),
        &[ActuatorCall::Blink(Repeat::Forever)]
    );
    // Holding select longer must not advance again.
    h.tick(5000);
    h.release(ButtonId::Select, 5100);
    h.tick(5120);
    assert_eq!(h.sm.mode(), Mode::HorizontalAdjust);

    // Secondary held for five ticks: five steps right.
    h.press(ButtonId::Secondary, 5130);
    for i in 0..5 {
        h.tick(5140 + i * 20);
    }
    h.release(ButtonId::Secondary, 5230);
    h.tick(5240);
    assert_eq!(h.sm.overlay().aim(), AimPoint::new(center.x + 10, center.y));

    h.press(ButtonId::Select, 6000);
    h.tick(9000);
    assert_eq!(h.sm.mode(), Mode::VerticalAdjust);
    h.release(ButtonId::Select, 9010);

    // Primary held: up.
    h.press(ButtonId::Primary, 9020);
    for i in 0..3 {
        h.tick(9030 + i * 20);
    }
    h.release(ButtonId::Primary, 9090);
    h.tick(9100);
    assert_eq!(h.sm.overlay().aim(), AimPoint::new(center.x + 10, center.y - 6));

    h.press(ButtonId::Select, 9200);
    h.tick(12300);
    assert_eq!(h.sm.mode(), Mode::Normal);
    assert_eq!(h.sm.caption(), StatusCaption::Live);
    assert_eq!(h.led.lock().last(), Some(&ActuatorCall::Stop));

    let record = stored_aim(h.store.path());
    assert_eq!(record["vertical_x"], center.x + 10);
    assert_eq!(record["horizontal_y"], center.y - 6);
}

#[test]
fn double_tap_recenters_and_axis_recenter_is_partial() {
    let dir = tempfile::tempdir().expect("temp dir");
    std::fs::write(
        dir.path().join("overlay_offset.json"),
        r#"{"horizontal_y": 300, "vertical_x": 700}"#,
    )
    .expect("seed record");
    let mut h = Harness::in_dir(dir, Rotation::Deg0).started();
    let center = h.sm.overlay().center();

    // Horizontal adjust: double tap recenters x only.
    h.press(ButtonId::Select, 100);
    h.tick(3100);
    h.release(ButtonId::Select, 3200);
    h.tick(3220);
    assert_eq!(h.sm.mode(), Mode::HorizontalAdjust);
    h.press(ButtonId::Select, 3300);
    h.release(ButtonId::Select, 3350);
    h.press(ButtonId::Select, 3450);
    h.release(ButtonId::Select, 3500);
    h.tick(3520);
    assert_eq!(h.sm.overlay().aim(), AimPoint::new(center.x, 300));

    // Back to Normal through vertical adjust.
    h.press(ButtonId::Select, 4000);
    h.tick(7000);
    h.release(ButtonId::Select, 7100);
    h.press(ButtonId::Select, 7200);
    h.tick(10200);
    h.release(ButtonId::Select, 10300);
    h.tick(10400);
    assert_eq!(h.sm.mode(), Mode::Normal);

    h.press(ButtonId::Select, 11000);
    h.release(ButtonId::Select, 11050);
    h.press(ButtonId::Select, 11200);
    h.release(ButtonId::Select, 11250);
    h.tick(11300);
    assert_eq!(h.sm.overlay().aim(), center);

    let record = stored_aim(h.store.path());
    assert_eq!(record["vertical_x"], center.x);
    assert_eq!(record["horizontal_y"], center.y);
}

#[test]
fn exit_combo_requests_exit_once() {
    let mut h = Harness::new(Rotation::Deg0).started();
    h.press(ButtonId::Select, 100);
    h.press(ButtonId::Primary, 200);
    assert_eq!(h.tick(1000), TickOutcome::Continue);
    assert_eq!(h.tick(3150), TickOutcome::Continue);
    assert_eq!(h.sm.mode(), Mode::Normal);
    assert_eq!(h.tick(3250), TickOutcome::ExitRequested);
    assert_eq!(h.sm.caption(), StatusCaption::Exiting);
    assert_eq!(
        h.buzzer.lock().last(),
        Some(&ActuatorCall::Blink(Repeat::Times(6)))
    );
}

#[test]
fn shutdown_stops_actuators_and_persists_baseline() {
    let mut h = Harness::new(Rotation::Deg90).started();
    let before = h.sm.overlay().aim();

    h.press(ButtonId::Primary, 100);
    h.release(ButtonId::Primary, 150);
    h.tick(200);
    assert!(h.sm.zoom().is_zoomed());

    h.sm.shutdown();
    assert!(!h.sm.zoom().is_zoomed());
    assert!(h.last_roi().is_full());
    assert_eq!(h.led.lock().last(), Some(&ActuatorCall::Stop));
    assert_eq!(h.buzzer.lock().last(), Some(&ActuatorCall::Stop));

    let record = stored_aim(h.store.path());
    assert_eq!(record["vertical_x"], before.x);
    assert_eq!(record["horizontal_y"], before.y);
}

#[test]
fn zoom_edges_sharing_a_tick_each_count() {
    let mut h = Harness::new(Rotation::Deg0).started();
    h.press(ButtonId::Primary, 100);
    h.release(ButtonId::Primary, 150);
    h.tick(200);
    assert_eq!(h.sm.zoom().level(), 2.0);

    // Tap primary, then press secondary before the next tick: +1 then -1.
    h.press(ButtonId::Primary, 300);
    h.release(ButtonId::Primary, 340);
    h.press(ButtonId::Secondary, 380);
    h.tick(400);
    assert_eq!(h.sm.zoom().level(), 2.0);

    h.release(ButtonId::Secondary, 450);
    h.tick(500);
    assert_eq!(h.sm.zoom().level(), 2.0);
}

#[test]
fn zoom_press_with_select_down_is_ignored_even_if_released_before_tick() {
    let mut h = Harness::new(Rotation::Deg0).started();
    h.press(ButtonId::Select, 100);
    h.press(ButtonId::Primary, 150);
    h.release(ButtonId::Primary, 180);
    h.release(ButtonId::Select, 190);
    h.tick(200);
    assert_eq!(h.sm.zoom().level(), 1.0);
    assert!(h.last_roi().is_full());
}

#[test]
fn record_combo_zooms_alike_however_edges_fall_into_ticks() {
    let mut together = Harness::new(Rotation::Deg0).started();
    together.press(ButtonId::Primary, 100);
    together.press(ButtonId::Secondary, 110);
    together.tick(125);

    let mut apart = Harness::new(Rotation::Deg0).started();
    apart.press(ButtonId::Primary, 100);
    apart.tick(105);
    apart.press(ButtonId::Secondary, 110);
    apart.tick(125);

    for h in [&mut together, &mut apart] {
        // The first press was alone; the second completes the combo.
        assert_eq!(h.sm.zoom().level(), 2.0);
        h.tick(3200);
        assert_eq!(h.sm.mode(), Mode::Recording);
        assert_eq!(h.recorder.lock().starts, 1);
    }
}

#[test]
fn exit_combo_released_between_polls_still_exits() {
    let mut h = Harness::new(Rotation::Deg0).started();
    h.press(ButtonId::Select, 0);
    h.press(ButtonId::Primary, 50);
    assert_eq!(h.tick(2990), TickOutcome::Continue);

    // Select goes first, completing its own long hold in the same release.
    h.release(ButtonId::Select, 3080);
    h.release(ButtonId::Primary, 3090);
    assert_eq!(h.tick(3115), TickOutcome::ExitRequested);
    assert_eq!(h.sm.mode(), Mode::Normal);
    assert_eq!(h.sm.caption(), StatusCaption::Exiting);
    assert!(h.led.lock().is_empty(), "adjust indicator never started");
}

#[test]
fn short_exit_combo_does_not_turn_into_adjust_entry() {
    let mut h = Harness::new(Rotation::Deg0).started();
    h.press(ButtonId::Select, 0);
    h.press(ButtonId::Primary, 500);
    assert_eq!(h.tick(2990), TickOutcome::Continue);

    // Combo held 2.58 s, select alone crossed the hold threshold at release.
    h.release(ButtonId::Select, 3080);
    h.release(ButtonId::Primary, 3090);
    assert_eq!(h.tick(3115), TickOutcome::Continue);
    assert_eq!(h.sm.mode(), Mode::Normal);
    assert_eq!(h.sm.caption(), StatusCaption::Live);

    // A plain select hold afterwards still enters adjust.
    h.press(ButtonId::Select, 4000);
    h.tick(7100);
    assert_eq!(h.sm.mode(), Mode::HorizontalAdjust);
}
