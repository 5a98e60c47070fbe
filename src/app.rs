//! Application layer: the mode state machine and the runtime that drives it.
//!
//! [`machine`] owns all control state and is advanced one tick at a time;
//! [`runtime`] puts it on its own loop next to the heartbeat and handles shutdown.

pub mod feedback;
pub mod machine;
pub mod mode;
pub mod runtime;

pub use feedback::{BlinkPattern, Feedback};
pub use machine::{ControlSnapshot, ModeStateMachine, Peripherals, SharedControl, TickOutcome};
pub use mode::Mode;
pub use runtime::{ExitReason, Runtime};
