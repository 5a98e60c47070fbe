//! Video recording lifecycle and the metadata sidecar.
//!
//! Each recording produces `<stem>.mp4` (written by a [`VideoSink`]) and `<stem>.jsonl`:
//! one header line describing the overlay, then one tick per second with the reticle
//! position and the live status caption. Stopping is asynchronous: the recorder stays
//! active until the sidecar is flushed and the sink has finished, which is what the
//! Saving mode waits for.

use crate::error::{BoresightError, Result};
use crate::overlay::{AimPoint, OverlayStyle};
use chrono::{DateTime, Local, SecondsFormat, Utc};
use log::{error, info, warn};
use parking_lot::Mutex;
use serde_json::json;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Schema tag written into every sidecar header.
pub const METADATA_SCHEMA: &str = "Boresight_Camera_V1";

/// Stem prefix for recordings.
const STEM_PREFIX: &str = "VID";

/// Longest sleep of the metadata thread between checks of its stop flag.
const METADATA_SLICE_MS: u64 = 10;

/// Values sampled into every metadata tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveSnapshot {
    pub aim: AimPoint,
    pub caption: String,
}

/// Accessor the recorder polls for the live reticle position and caption.
pub type SnapshotFn = Arc<dyn Fn() -> LiveSnapshot + Send + Sync>;

/// Everything a recording needs from the control loop.
#[derive(Clone)]
pub struct RecordingParams {
    pub overlay_style: OverlayStyle,
    pub snapshot: SnapshotFn,
}

/// Paths of a finished (or in-progress) recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingFiles {
    pub video: PathBuf,
    pub metadata: PathBuf,
}

/// What the control loop needs from a recorder.
pub trait Recorder: Send {
    /// Start recording and return the video path. Starting while already recording
    /// returns the current path.
    fn start(&mut self, params: RecordingParams) -> Result<PathBuf>;

    /// Request a stop. Finalization may continue in the background; `is_active`
    /// reports true until it completes. Stopping while idle does nothing.
    fn stop(&mut self) -> Result<()>;

    fn is_active(&self) -> bool;
}

/// Encoder seam; camera-side encoding lives outside this crate.
pub trait VideoSink: Send + 'static {
    fn begin(&mut self, path: &Path) -> Result<()>;
    fn finish(&mut self) -> Result<()>;
}

/// Sink that only logs, used when no encoder is attached.
#[derive(Debug, Default)]
pub struct NullVideoSink {
    current: Option<PathBuf>,
}

impl VideoSink for NullVideoSink {
    fn begin(&mut self, path: &Path) -> Result<()> {
        info!("video sink: begin {}", path.display());
        self.current = Some(path.to_path_buf());
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if let Some(path) = self.current.take() {
            info!("video sink: finish {}", path.display());
        }
        Ok(())
    }
}

/// `VID_<local time to the millisecond>`, suffixed `-1`, `-2`, ... if either output
/// file already exists.
pub fn unique_stem(base_dir: &Path, now: DateTime<Local>) -> String {
    let stem = format!("{}_{}", STEM_PREFIX, now.format("%Y%m%d_%H%M%S_%3f"));
    let taken = |candidate: &str| {
        base_dir.join(format!("{}.mp4", candidate)).exists()
            || base_dir.join(format!("{}.jsonl", candidate)).exists()
    };

    let mut candidate = stem.clone();
    let mut n = 1;
    while taken(&candidate) {
        candidate = format!("{}-{}", stem, n);
        n += 1;
    }
    candidate
}

fn utc_stamp(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// Background writer for the `.jsonl` sidecar.
struct MetadataRecorder {
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl MetadataRecorder {
    fn start(
        path: &Path,
        video: &Path,
        params: &RecordingParams,
        period: Duration,
    ) -> Result<Self> {
        let file = File::create(path).map_err(|err| {
            BoresightError::file_error(format!("creating {}", path.display()), err)
        })?;
        let mut out = BufWriter::new(file);

        let style = &params.overlay_style;
        let header = json!({
            "type": "header",
            "schema": METADATA_SCHEMA,
            "created_local": Local::now().to_rfc3339_opts(SecondsFormat::Millis, false),
            "created_utc": utc_stamp(Utc::now()),
            "video_file": video.file_name().map(|n| n.to_string_lossy().into_owned()),
            "base_stem": video.file_stem().map(|n| n.to_string_lossy().into_owned()),
            "overlay_style": {
                "radius": style.radius,
                "ring_thickness": style.ring_thickness,
                "tick_length": style.tick_length,
                "tick_thickness": style.tick_thickness,
                "gap": style.gap,
                "color": style.color,
            },
        });
        writeln!(out, "{}", header)?;
        out.flush()?;

        let stop = Arc::new(AtomicBool::new(false));
        let worker_stop = Arc::clone(&stop);
        let snapshot = Arc::clone(&params.snapshot);
        let handle = thread::Builder::new()
            .name("recording-metadata".to_string())
            .spawn(move || write_ticks(out, snapshot, &worker_stop, period))?;

        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    fn stop(mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("metadata writer panicked");
            }
        }
    }
}

fn write_ticks(
    mut out: BufWriter<File>,
    snapshot: SnapshotFn,
    stop: &AtomicBool,
    period: Duration,
) {
    let t0 = Instant::now();
    let mut next = t0;
    while !stop.load(Ordering::SeqCst) {
        let now = Instant::now();
        if now < next {
            thread::sleep((next - now).min(Duration::from_millis(METADATA_SLICE_MS)));
            continue;
        }

        let live = snapshot();
        let row = json!({
            "type": "tick",
            "utc": utc_stamp(Utc::now()),
            "t_rel": ((now - t0).as_secs_f64() * 1000.0).round() / 1000.0,
            "overlay": { "cx": live.aim.x, "cy": live.aim.y },
            "state_text": live.caption,
        });
        if let Err(err) = writeln!(out, "{}", row) {
            warn!("metadata write failed, stopping sidecar: {}", err);
            break;
        }
        next += period;
    }
    if let Err(err) = out.flush() {
        warn!("metadata flush failed: {}", err);
    }
}

struct ActiveRecording {
    files: RecordingFiles,
    metadata: MetadataRecorder,
}

/// [`Recorder`] writing videos through a [`VideoSink`] plus a metadata sidecar.
pub struct RecordingManager {
    base_dir: PathBuf,
    sink: Arc<Mutex<Box<dyn VideoSink>>>,
    tick_period: Duration,
    active: Arc<AtomicBool>,
    current: Option<ActiveRecording>,
    finalizer: Option<thread::JoinHandle<()>>,
    last_files: Arc<Mutex<Option<RecordingFiles>>>,
}

impl RecordingManager {
    pub fn new(base_dir: impl Into<PathBuf>, sink: Box<dyn VideoSink>) -> Self {
        Self {
            base_dir: base_dir.into(),
            sink: Arc::new(Mutex::new(sink)),
            tick_period: Duration::from_secs(1),
            active: Arc::new(AtomicBool::new(false)),
            current: None,
            finalizer: None,
            last_files: Arc::new(Mutex::new(None)),
        }
    }

    /// Override the metadata sampling period (1 s by default).
    pub fn with_tick_period(mut self, period: Duration) -> Self {
        self.tick_period = period.max(Duration::from_millis(1));
        self
    }

    /// Files of the recording in progress, if any.
    pub fn current_files(&self) -> Option<RecordingFiles> {
        self.current.as_ref().map(|rec| rec.files.clone())
    }

    /// Files of the most recently finalized recording.
    pub fn last_files(&self) -> Option<RecordingFiles> {
        self.last_files.lock().clone()
    }

    /// Block until a pending finalize completes.
    pub fn wait_finalized(&mut self) {
        if let Some(handle) = self.finalizer.take() {
            let _ = handle.join();
        }
    }
}

impl Recorder for RecordingManager {
    fn start(&mut self, params: RecordingParams) -> Result<PathBuf> {
        if let Some(rec) = &self.current {
            return Ok(rec.files.video.clone());
        }
        if self.active.load(Ordering::SeqCst) {
            return Err(BoresightError::recorder(
                "previous recording is still being finalized",
            ));
        }
        if let Some(handle) = self.finalizer.take() {
            let _ = handle.join();
        }

        fs::create_dir_all(&self.base_dir).map_err(|err| {
            BoresightError::file_error(format!("creating {}", self.base_dir.display()), err)
        })?;

        let stem = unique_stem(&self.base_dir, Local::now());
        let files = RecordingFiles {
            video: self.base_dir.join(format!("{}.mp4", stem)),
            metadata: self.base_dir.join(format!("{}.jsonl", stem)),
        };

        self.sink
            .lock()
            .begin(&files.video)
            .map_err(|err| BoresightError::recorder(format!("video sink refused: {}", err)))?;

        let metadata =
            match MetadataRecorder::start(&files.metadata, &files.video, &params, self.tick_period)
            {
                Ok(metadata) => metadata,
                Err(err) => {
                    let _ = self.sink.lock().finish();
                    return Err(BoresightError::recorder(format!(
                        "metadata sidecar failed: {}",
                        err
                    )));
                }
            };

        info!("Recording started: {}", files.video.display());
        self.active.store(true, Ordering::SeqCst);
        let video = files.video.clone();
        self.current = Some(ActiveRecording { files, metadata });
        Ok(video)
    }

    fn stop(&mut self) -> Result<()> {
        let Some(rec) = self.current.take() else {
            return Ok(());
        };

        let sink = Arc::clone(&self.sink);
        let active = Arc::clone(&self.active);
        let last_files = Arc::clone(&self.last_files);
        let handle = thread::Builder::new()
            .name("recording-finalize".to_string())
            .spawn(move || {
                // Metadata first so its last tick lands before the video closes.
                rec.metadata.stop();
                if let Err(err) = sink.lock().finish() {
                    error!("video sink failed to finish: {}", err);
                }
                info!("Recording saved: {}", rec.files.video.display());
                *last_files.lock() = Some(rec.files);
                active.store(false, Ordering::SeqCst);
            })?;
        self.finalizer = Some(handle);
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

impl Drop for RecordingManager {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            warn!("failed to stop recording on drop: {}", err);
        }
        self.wait_finalized();
    }
}
