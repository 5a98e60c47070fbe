//! Collaborators the control loop drives: camera, actuators, recorder.
//!
//! Each is a trait so the state machine can run against real hardware, the logging
//! host implementations in this module, or test doubles.

pub mod actuator;
pub mod camera;
pub mod recorder;

pub use actuator::{Actuator, BlinkActuator, LogPin, OutputPin, Repeat};
pub use camera::{CameraBackend, LoggingCamera};
pub use recorder::{
    unique_stem, LiveSnapshot, NullVideoSink, Recorder, RecordingFiles, RecordingManager,
    RecordingParams, SnapshotFn, VideoSink,
};
