use std::sync::atomic::Ordering;
use std::time::Instant;
use tokio::time::{timeout, Duration};

use boresight::app::{ExitReason, ModeStateMachine, Peripherals, Runtime};
use boresight::device::{BlinkActuator, LogPin, LoggingCamera, NullVideoSink, RecordingManager};
use boresight::input::{edge_channel, ButtonId, EdgeReceiver, EdgeSender};
use boresight::overlay::AimPointStore;
use boresight::Config;

struct Rig {
    machine: ModeStateMachine,
    store: AimPointStore,
    led: std::sync::Arc<parking_lot::Mutex<LogPin>>,
    buzzer: std::sync::Arc<parking_lot::Mutex<LogPin>>,
    tx: EdgeSender,
    rx: EdgeReceiver,
    config: Config,
}

fn rig(dir: &std::path::Path) -> Rig {
    let mut config = Config::default();
    config.storage.directory = dir.to_path_buf();
    config.input.combo_secs = 0.3;
    config.timing.exit_grace_ms = 50;
    config.timing.heartbeat_ms = 50;

    let store = AimPointStore::new(config.aim_path());
    let led = BlinkActuator::new("led", LogPin::new("led"))
        .with_join_timeout(config.timing.join_timeout());
    let buzzer = BlinkActuator::new("buzzer", LogPin::new("buzzer"))
        .with_join_timeout(config.timing.join_timeout());
    let led_pin = led.pin();
    let buzzer_pin = buzzer.pin();

    let peripherals = Peripherals {
        camera: Box::new(LoggingCamera::new(config.orientation())),
        recorder: Box::new(RecordingManager::new(
            dir.join("videos"),
            Box::new(NullVideoSink::default()),
        )),
        buzzer: Box::new(buzzer),
        led: Box::new(led),
    };
    let machine = ModeStateMachine::new(&config, peripherals, store.clone());
    let (tx, rx) = edge_channel(config.input.edge_queue_capacity);

    Rig {
        machine,
        store,
        led: led_pin,
        buzzer: buzzer_pin,
        tx,
        rx,
        config,
    }
}

#[tokio::test]
async fn clearing_running_flag_stops_promptly() {
    let dir = tempfile::tempdir().expect("temp dir");
    let rig = rig(dir.path());
    let runtime = Runtime::new(rig.config.timing.clone());
    let running = runtime.running();

    let stopper = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        running.store(false, Ordering::SeqCst);
        Instant::now()
    });

    let result = timeout(
        Duration::from_secs(3),
        runtime.run(rig.machine, rig.rx, rig.store.clone()),
    )
    .await
    .expect("runtime did not stop");
    let reason = tokio_test::assert_ok!(result);
    let stopped_at = stopper.await.expect("stopper task");

    assert_eq!(reason, ExitReason::Stopped);
    assert!(stopped_at.elapsed() < Duration::from_secs(2));
    assert!(!rig.led.lock().level());
    assert!(!rig.buzzer.lock().level());
    assert!(rig.store.path().exists(), "aim point persisted at shutdown");
}

#[tokio::test]
async fn exit_combo_ends_run_with_actuators_off() {
    let dir = tempfile::tempdir().expect("temp dir");
    let rig = rig(dir.path());
    let runtime = Runtime::new(rig.config.timing.clone());

    let tx = rig.tx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        tx.on_press(ButtonId::Select);
        tx.on_press(ButtonId::Primary);
    });

    let result = timeout(
        Duration::from_secs(5),
        runtime.run(rig.machine, rig.rx, rig.store.clone()),
    )
    .await
    .expect("exit combo did not end the run");
    let reason = tokio_test::assert_ok!(result);

    assert_eq!(reason, ExitReason::ExitCombo);
    assert!(!runtime.running().load(Ordering::SeqCst));
    assert!(!rig.buzzer.lock().level());
    assert!(!rig.led.lock().level());
    drop(rig.tx);
}
