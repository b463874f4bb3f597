//! Timed playback of decoded songs.
//!
//! This module provides the per-listener scheduler. It supports:
//! - One independent timer thread per active session
//! - Replace-on-start: at most one session per listener
//! - Immediate cancellation with exactly one completion signal per session
//! - Injected registries, so separate schedulers can be isolated or shared

mod registry;
mod scheduler;
mod session;

pub use registry::SessionRegistry;
pub use scheduler::{
    tick_interval, CompletionSink, ListenerId, NoteSink, PlaybackError, PlaybackScheduler,
    SinkErrorPolicy,
};
pub use session::{CompletionReason, SessionId, SessionState};
