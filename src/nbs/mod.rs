//! Note Block Studio song model and decoder.
//!
//! This module provides the types for a decoded `.nbs` song (header metadata
//! plus a sparse, tick-indexed timeline of notes) and the one-pass decoder
//! that produces them from raw bytes.

mod cursor;
mod decoder;
mod note;
mod song;

#[cfg(test)]
pub(crate) mod test_encoder;

pub use cursor::ByteCursor;
pub use decoder::{decode, read_note_stream, DecodeError};
pub use note::{Note, Tick, NATIVE_KEY, PANNING_CENTER};
pub use song::Song;

use std::time::Duration;

/// Stored tempo values are ticks per second scaled by this factor.
pub const TEMPO_SCALE: f64 = 100.0;

/// Converts a tempo to the wall-clock interval between two ticks.
///
/// `1000 / ticks_per_second` milliseconds, or `None` for a tempo that is
/// zero, negative or not finite. Callers outside the crate go through
/// [`crate::playback::tick_interval`].
pub(crate) fn interval_for_tempo(ticks_per_second: f64) -> Option<Duration> {
    if !ticks_per_second.is_finite() || ticks_per_second <= 0.0 {
        return None;
    }
    Duration::try_from_secs_f64(1.0 / ticks_per_second).ok()
}

/// Converts a tick count to wall-clock time at a given tempo.
pub fn ticks_to_duration(ticks: u32, ticks_per_second: f64) -> Option<Duration> {
    if !ticks_per_second.is_finite() || ticks_per_second <= 0.0 {
        return None;
    }
    Duration::try_from_secs_f64(ticks as f64 / ticks_per_second).ok()
}
