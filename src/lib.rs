//! # boresight - Camera Boresighting Controller
//!
//! Control core for a boresighting camera: a fixed camera feed with an aiming reticle
//! that an operator aligns to a point of impact using three buttons, with anchored
//! digital zoom, video recording and buzzer/LED feedback.
//!
//! ## Architecture
//!
//! Modules, leaves first:
//!
//! - [`error`] - Centralized error types and handling
//! - [`config`] - TOML configuration with defaults for every field
//! - [`geometry`] - Display/sensor coordinate mapping and ROI solving
//! - [`zoom`] - Zoom sessions anchored in sensor space
//! - [`input`] - Button edges, the edge queue and the gesture decoder
//! - [`overlay`] - Reticle position, its persisted record and status captions
//! - [`device`] - Camera, actuator and recorder seams with host implementations
//! - [`app`] - Mode state machine and the runtime driving it

// Core modules
pub mod config;
pub mod error;

// Pure engines
pub mod geometry;
pub mod input;
pub mod overlay;
pub mod zoom;

// Collaborators and orchestration
pub mod app;
pub mod device;

// Re-export commonly used types for convenience
pub use error::{BoresightError, Result};

pub use app::{ExitReason, Mode, ModeStateMachine, Peripherals, Runtime};
pub use config::Config;
pub use geometry::{compute_roi, CoordinateMapper, Roi};
pub use input::{edge_channel, InputDecoder};
pub use zoom::ZoomEngine;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
