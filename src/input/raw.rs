//! Low-level button edges: identifiers, the bounded edge queue, and a script-driven
//! edge source used when no GPIO is attached.
//!
//! Edge callbacks may run on any thread. They only stamp the edge and push it into the
//! queue; the state-machine loop is the single consumer and the only place decoder
//! state changes.

use crate::error::{BoresightError, Result};
use log::{debug, warn};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{self, error::TrySendError};

/// Sleep slice used by the replay thread so shutdown is noticed promptly.
const REPLAY_POLL_SLICE_MS: u64 = 10;

/// The three physical buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ButtonId {
    /// Mode / confirm button.
    Select,
    /// Left / up / zoom in.
    Primary,
    /// Right / down / zoom out.
    Secondary,
}

impl ButtonId {
    pub const ALL: [ButtonId; 3] = [ButtonId::Select, ButtonId::Primary, ButtonId::Secondary];

    pub fn index(self) -> usize {
        match self {
            ButtonId::Select => 0,
            ButtonId::Primary => 1,
            ButtonId::Secondary => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ButtonId::Select => "select",
            ButtonId::Primary => "primary",
            ButtonId::Secondary => "secondary",
        }
    }
}

impl fmt::Display for ButtonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ButtonId {
    type Err = BoresightError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "select" | "sel" | "s" => Ok(ButtonId::Select),
            "primary" | "left" | "up" | "p" => Ok(ButtonId::Primary),
            "secondary" | "right" | "down" => Ok(ButtonId::Secondary),
            other => Err(BoresightError::input(format!("unknown button '{}'", other))),
        }
    }
}

/// Direction of a debounced edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    Press,
    Release,
}

impl FromStr for EdgeKind {
    type Err = BoresightError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "press" | "down" => Ok(EdgeKind::Press),
            "release" | "up" => Ok(EdgeKind::Release),
            other => Err(BoresightError::input(format!("unknown edge '{}'", other))),
        }
    }
}

/// A time-stamped edge as delivered by the upstream debouncer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawEdge {
    pub button: ButtonId,
    pub kind: EdgeKind,
    pub at: Instant,
}

impl RawEdge {
    pub fn press(button: ButtonId, at: Instant) -> Self {
        Self {
            button,
            kind: EdgeKind::Press,
            at,
        }
    }

    pub fn release(button: ButtonId, at: Instant) -> Self {
        Self {
            button,
            kind: EdgeKind::Release,
            at,
        }
    }
}

/// Producer half of the edge queue. Cheap to clone and safe to call from callbacks.
#[derive(Debug, Clone)]
pub struct EdgeSender {
    tx: mpsc::Sender<RawEdge>,
}

impl EdgeSender {
    /// Queue an edge. Returns false if the queue is full or the consumer is gone; a
    /// dropped edge is logged rather than blocking the caller.
    pub fn post(&self, edge: RawEdge) -> bool {
        match self.tx.try_send(edge) {
            Ok(()) => true,
            Err(TrySendError::Full(edge)) => {
                warn!("Edge queue full, dropping {:?} {}", edge.kind, edge.button);
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// `onPress` entry point for an edge source.
    pub fn on_press(&self, button: ButtonId) -> bool {
        self.post(RawEdge::press(button, Instant::now()))
    }

    /// `onRelease` entry point for an edge source.
    pub fn on_release(&self, button: ButtonId) -> bool {
        self.post(RawEdge::release(button, Instant::now()))
    }
}

/// Consumer half of the edge queue, drained once per state-machine tick.
#[derive(Debug)]
pub struct EdgeReceiver {
    rx: mpsc::Receiver<RawEdge>,
}

impl EdgeReceiver {
    /// Take everything currently queued, oldest first, without waiting.
    pub fn drain(&mut self) -> Vec<RawEdge> {
        let mut edges = Vec::new();
        while let Ok(edge) = self.rx.try_recv() {
            edges.push(edge);
        }
        edges
    }
}

/// Create the bounded single-consumer edge queue.
pub fn edge_channel(capacity: usize) -> (EdgeSender, EdgeReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (EdgeSender { tx }, EdgeReceiver { rx })
}

/// One line of an edge script: wait `delay`, then deliver the edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptStep {
    pub delay: Duration,
    pub kind: EdgeKind,
    pub button: ButtonId,
}

/// Parse `"<delay_ms> <press|release> <button>"`. Blank lines and `#` comments yield
/// `Ok(None)`.
pub fn parse_script_line(line: &str) -> Result<Option<ScriptStep>> {
    let line = line.split('#').next().unwrap_or("").trim();
    if line.is_empty() {
        return Ok(None);
    }

    let fields: Vec<&str> = line.split_whitespace().collect();
    let [delay, kind, button] = fields.as_slice() else {
        return Err(BoresightError::input(format!(
            "expected '<delay_ms> <press|release> <button>', got '{}'",
            line
        )));
    };

    let delay_ms: u64 = delay
        .parse()
        .map_err(|_| BoresightError::input(format!("invalid delay '{}'", delay)))?;

    Ok(Some(ScriptStep {
        delay: Duration::from_millis(delay_ms),
        kind: kind.parse()?,
        button: button.parse()?,
    }))
}

/// Parse a whole script, reporting the first bad line with its number.
pub fn parse_script(text: &str) -> Result<Vec<ScriptStep>> {
    let mut steps = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        match parse_script_line(line) {
            Ok(Some(step)) => steps.push(step),
            Ok(None) => {}
            Err(err) => {
                return Err(BoresightError::input(format!("line {}: {}", idx + 1, err)));
            }
        }
    }
    Ok(steps)
}

/// Spawn a blocking thread that replays an edge script into the queue.
pub fn spawn_replay_thread(
    steps: Vec<ScriptStep>,
    sender: EdgeSender,
    running: Arc<AtomicBool>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        for step in steps {
            let deadline = Instant::now() + step.delay;
            while Instant::now() < deadline {
                if !running.load(Ordering::SeqCst) {
                    return;
                }
                let left = deadline.saturating_duration_since(Instant::now());
                thread::sleep(left.min(Duration::from_millis(REPLAY_POLL_SLICE_MS)));
            }
            if !running.load(Ordering::SeqCst) {
                return;
            }

            debug!("Replaying {:?} {}", step.kind, step.button);
            let delivered = match step.kind {
                EdgeKind::Press => sender.on_press(step.button),
                EdgeKind::Release => sender.on_release(step.button),
            };
            if !delivered && sender.tx.is_closed() {
                return;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_script_lines() {
        assert_eq!(
            parse_script_line("250 press select").unwrap(),
            Some(ScriptStep {
                delay: Duration::from_millis(250),
                kind: EdgeKind::Press,
                button: ButtonId::Select,
            })
        );
        assert_eq!(parse_script_line("   # just a comment").unwrap(), None);
        assert_eq!(parse_script_line("").unwrap(), None);
        assert!(parse_script_line("abc press select").is_err());
        assert!(parse_script_line("10 press trigger").is_err());
        assert!(parse_script_line("10 press").is_err());
    }

    #[test]
    fn parse_script_reports_line_number() {
        let err = parse_script("0 press primary\n\n5 wiggle primary\n").unwrap_err();
        assert!(err.to_string().contains("line 3"), "{}", err);
    }

    #[test]
    fn queue_preserves_order_and_drains() {
        let (tx, mut rx) = edge_channel(8);
        let t0 = Instant::now();
        assert!(tx.post(RawEdge::press(ButtonId::Primary, t0)));
        assert!(tx.post(RawEdge::release(ButtonId::Primary, t0)));

        let drained = rx.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].kind, EdgeKind::Press);
        assert_eq!(drained[1].kind, EdgeKind::Release);
        assert!(rx.drain().is_empty());
    }

    #[test]
    fn full_queue_drops_instead_of_blocking() {
        let (tx, mut rx) = edge_channel(1);
        let t0 = Instant::now();
        assert!(tx.post(RawEdge::press(ButtonId::Select, t0)));
        assert!(!tx.post(RawEdge::release(ButtonId::Select, t0)));
        assert_eq!(rx.drain().len(), 1);
    }

    #[test]
    fn replay_thread_delivers_script() {
        let (tx, mut rx) = edge_channel(8);
        let running = Arc::new(AtomicBool::new(true));
        let steps = parse_script("0 press secondary\n5 release secondary\n").unwrap();

        spawn_replay_thread(steps, tx, running).join().unwrap();
        let edges = rx.drain();
        assert_eq!(edges.len(), 2);
        assert!(edges.iter().all(|edge| edge.button == ButtonId::Secondary));
        assert!(edges[1].at >= edges[0].at);
    }
}
