//! Button input: raw edges in, gestures out.
//!
//! - [`raw`] - button ids, the bounded edge queue, and the script replay source
//! - [`decoder`] - press/release timing turned into taps, holds, double taps and combos

pub mod decoder;
pub mod raw;

// Modules outside this crate should prefer importing from `crate::input` rather than
// reaching into submodules.
pub use decoder::{ComboKind, DecodedEvent, DecoderConfig, HeldButtons, InputDecoder};
pub use raw::{
    edge_channel, parse_script, spawn_replay_thread, ButtonId, EdgeKind, EdgeReceiver,
    EdgeSender, RawEdge, ScriptStep,
};
