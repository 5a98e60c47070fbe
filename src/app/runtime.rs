use crate::app::machine::{ModeStateMachine, SharedControl, TickOutcome};
use crate::config::TimingConfig;
use crate::error::Result;
use crate::input::EdgeReceiver;
use crate::overlay::caption::{read_cpu_temp, status_line, CPU_TEMP_PATH};
use crate::overlay::AimPointStore;
use chrono::Local;
use log::{debug, error, info, warn};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;

/// Longest the heartbeat sleeps before re-checking the running flag.
const HEARTBEAT_POLL_SLICE: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// The running flag was cleared from outside (signal, caller).
    Stopped,
    /// The operator held the exit combo.
    ExitCombo,
}

/// Runs the state-machine loop and the heartbeat until the shared running flag drops.
pub struct Runtime {
    timing: TimingConfig,
    running: Arc<AtomicBool>,
    cpu_temp_path: PathBuf,
}

impl Runtime {
    pub fn new(timing: TimingConfig) -> Self {
        Self {
            timing,
            running: Arc::new(AtomicBool::new(true)),
            cpu_temp_path: PathBuf::from(CPU_TEMP_PATH),
        }
    }

    pub fn with_cpu_temp_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cpu_temp_path = path.into();
        self
    }

    /// The flag every loop watches; clearing it stops the runtime within one tick.
    pub fn running(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Drive `machine` until stopped. The machine loop runs on a blocking thread since
    /// its collaborators block (file I/O, actuator joins); the heartbeat is a task.
    pub async fn run(
        &self,
        machine: ModeStateMachine,
        edges: EdgeReceiver,
        store: AimPointStore,
    ) -> Result<ExitReason> {
        let shared = machine.shared();
        let heartbeat = tokio::spawn(heartbeat_loop(
            shared,
            store,
            self.timing.clone(),
            Arc::clone(&self.running),
            self.cpu_temp_path.clone(),
        ));

        let timing = self.timing.clone();
        let running = Arc::clone(&self.running);
        let machine_task =
            tokio::task::spawn_blocking(move || machine_loop(machine, edges, &timing, &running));

        let reason = match machine_task.await {
            Ok(reason) => reason,
            Err(err) => {
                error!("State machine loop panicked: {}", err);
                ExitReason::Stopped
            }
        };
        self.stop();

        match timeout(self.timing.join_timeout(), heartbeat).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => error!("Heartbeat task failed: {}", err),
            Err(_) => warn!("Heartbeat did not stop within {:?}", self.timing.join_timeout()),
        }

        info!("Runtime stopped: {:?}", reason);
        Ok(reason)
    }
}

fn machine_loop(
    mut machine: ModeStateMachine,
    mut edges: EdgeReceiver,
    timing: &TimingConfig,
    running: &AtomicBool,
) -> ExitReason {
    let mut reason = ExitReason::Stopped;
    while running.load(Ordering::SeqCst) {
        for edge in edges.drain() {
            machine.ingest(edge);
        }
        if machine.tick(Instant::now()) == TickOutcome::ExitRequested {
            reason = ExitReason::ExitCombo;
            // Let the warning cue play out before everything goes quiet.
            std::thread::sleep(timing.exit_grace());
            running.store(false, Ordering::SeqCst);
            break;
        }
        std::thread::sleep(machine.tick_interval());
    }
    machine.shutdown();
    reason
}

async fn heartbeat_loop(
    shared: SharedControl,
    store: AimPointStore,
    timing: TimingConfig,
    running: Arc<AtomicBool>,
    cpu_temp_path: PathBuf,
) {
    let period = timing.heartbeat();
    let mut last_beat: Option<Instant> = None;
    let mut last_persist = Instant::now();
    let mut persisted = shared.lock().baseline_aim;

    while running.load(Ordering::SeqCst) {
        let now = Instant::now();
        if last_beat.map_or(true, |beat| now.duration_since(beat) >= period) {
            last_beat = Some(now);
            let temp = read_cpu_temp(&cpu_temp_path);
            let baseline = {
                let mut control = shared.lock();
                control.status_line =
                    status_line(control.caption, control.zoom_level, &Local::now(), temp);
                control.baseline_aim
            };

            if now.duration_since(last_persist) >= timing.persist_every() {
                last_persist = now;
                if baseline != persisted && store.save_best_effort(baseline) {
                    debug!("Aim point persisted ({}, {})", baseline.x, baseline.y);
                    persisted = baseline;
                }
            }
        }
        tokio::time::sleep(HEARTBEAT_POLL_SLICE.min(period)).await;
    }
}
