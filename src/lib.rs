//! nbsplay - Note Block Studio song decoding and playback.
//!
//! This library decodes `.nbs` files into an immutable [`Song`] and plays
//! them to any number of independent listeners on tempo-driven timers.

pub mod nbs;
pub mod playback;

// Re-export commonly used types
pub use nbs::{decode, DecodeError, Note, Song, Tick};
pub use playback::{
    CompletionReason, ListenerId, PlaybackError, PlaybackScheduler, SessionId, SessionRegistry,
};
