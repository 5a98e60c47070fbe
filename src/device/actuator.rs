//! On/off actuators (buzzer, indicator LED) with timed blink patterns.
//!
//! A blink pattern runs on its own thread. `stop` always drives the output OFF before
//! waiting for that thread, and the wait is bounded, so shutdown never leaves an
//! actuator switched on and never hangs on a sleeping worker.

use crate::error::{BoresightError, Result};
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc as std_mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Granularity of the worker's sleeps; bounds how long a stop request goes unnoticed.
const BLINK_SLICE_MS: u64 = 5;

/// Default bound on joining a blink worker.
const DEFAULT_JOIN_TIMEOUT: Duration = Duration::from_secs(1);

/// How many on/off cycles a blink pattern runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Repeat {
    Times(u32),
    Forever,
}

/// Timed on/off output.
pub trait Actuator: Send {
    /// Start a pattern, replacing any pattern already running.
    fn start_blink(&mut self, on: Duration, off: Duration, repeat: Repeat) -> Result<()>;

    /// Stop any pattern and force the output OFF. Idempotent.
    fn stop(&mut self);

    /// True while a pattern is running.
    fn is_active(&self) -> bool;
}

/// A single digital output line.
pub trait OutputPin: Send + 'static {
    fn set(&mut self, on: bool) -> Result<()>;
}

/// Host output that logs level changes.
#[derive(Debug, Clone)]
pub struct LogPin {
    name: String,
    level: bool,
}

impl LogPin {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            level: false,
        }
    }

    pub fn level(&self) -> bool {
        self.level
    }
}

impl OutputPin for LogPin {
    fn set(&mut self, on: bool) -> Result<()> {
        if on != self.level {
            debug!("{} {}", self.name, if on { "ON" } else { "OFF" });
        }
        self.level = on;
        Ok(())
    }
}

struct BlinkWorker {
    stop: Arc<AtomicBool>,
    done: std_mpsc::Receiver<()>,
    handle: thread::JoinHandle<()>,
}

/// [`Actuator`] that drives an [`OutputPin`] from a worker thread.
pub struct BlinkActuator<P: OutputPin> {
    name: String,
    pin: Arc<Mutex<P>>,
    worker: Option<BlinkWorker>,
    join_timeout: Duration,
}

impl<P: OutputPin> BlinkActuator<P> {
    pub fn new(name: impl Into<String>, pin: P) -> Self {
        Self {
            name: name.into(),
            pin: Arc::new(Mutex::new(pin)),
            worker: None,
            join_timeout: DEFAULT_JOIN_TIMEOUT,
        }
    }

    pub fn with_join_timeout(mut self, join_timeout: Duration) -> Self {
        self.join_timeout = join_timeout;
        self
    }

    /// Shared handle to the pin, mostly for inspection in tests.
    pub fn pin(&self) -> Arc<Mutex<P>> {
        Arc::clone(&self.pin)
    }

    fn force_off(&self) {
        if let Err(err) = self.pin.lock().set(false) {
            warn!("{}: failed to force OFF: {}", self.name, err);
        }
    }
}

/// Sleep for `duration` unless `stop` is raised first. Returns false if stopped.
fn sleep_unless(stop: &AtomicBool, duration: Duration) -> bool {
    let deadline = Instant::now() + duration;
    loop {
        if stop.load(Ordering::SeqCst) {
            return false;
        }
        let left = deadline.saturating_duration_since(Instant::now());
        if left.is_zero() {
            return true;
        }
        thread::sleep(left.min(Duration::from_millis(BLINK_SLICE_MS)));
    }
}

fn run_pattern<P: OutputPin>(
    pin: &Mutex<P>,
    stop: &AtomicBool,
    on: Duration,
    off: Duration,
    repeat: Repeat,
) {
    let mut cycles = 0u32;
    loop {
        if let Repeat::Times(n) = repeat {
            if cycles >= n {
                break;
            }
        }
        {
            // Check the flag under the pin lock so a concurrent stop cannot be undone.
            let mut pin = pin.lock();
            if stop.load(Ordering::SeqCst) {
                break;
            }
            if pin.set(true).is_err() {
                break;
            }
        }
        if !sleep_unless(stop, on) {
            break;
        }
        let _ = pin.lock().set(false);
        if !sleep_unless(stop, off) {
            break;
        }
        cycles = cycles.saturating_add(1);
    }
    let _ = pin.lock().set(false);
}

impl<P: OutputPin> Actuator for BlinkActuator<P> {
    fn start_blink(&mut self, on: Duration, off: Duration, repeat: Repeat) -> Result<()> {
        self.stop();

        let stop = Arc::new(AtomicBool::new(false));
        let (done_tx, done) = std_mpsc::channel();
        let pin = Arc::clone(&self.pin);
        let worker_stop = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name(format!("{}-blink", self.name))
            .spawn(move || {
                run_pattern(&pin, &worker_stop, on, off, repeat);
                let _ = done_tx.send(());
            })
            .map_err(|err| {
                BoresightError::actuator(format!(
                    "{}: cannot start blink thread: {}",
                    self.name, err
                ))
            })?;

        self.worker = Some(BlinkWorker { stop, done, handle });
        Ok(())
    }

    fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            self.force_off();
            return;
        };

        worker.stop.store(true, Ordering::SeqCst);
        self.force_off();

        match worker.done.recv_timeout(self.join_timeout) {
            Ok(()) | Err(std_mpsc::RecvTimeoutError::Disconnected) => {
                let _ = worker.handle.join();
            }
            Err(std_mpsc::RecvTimeoutError::Timeout) => {
                info!("{}: blink worker did not exit in time, detaching", self.name);
            }
        }
        self.force_off();
    }

    fn is_active(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|worker| !worker.handle.is_finished())
    }
}

impl<P: OutputPin> Drop for BlinkActuator<P> {
    fn drop(&mut self) {
        self.stop();
    }
}
