//! Note block events.
//!
//! A note is a single note-block hit: which instrument, which key, how loud,
//! where in the stereo field and how far it is detuned. Notes carry no timing
//! of their own; the [`Tick`] that owns them places them on the timeline.

use serde::{Deserialize, Serialize};

/// Key that plays at the instrument's native pitch (F#4 in note block terms).
pub const NATIVE_KEY: u8 = 45;

/// Offset between the stored panning byte and the signed panning value.
pub const PANNING_CENTER: i16 = 100;

/// A single note-block event within a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Instrument index. Values past the built-in set refer to custom instruments.
    pub instrument: u8,

    /// Piano key, 0-87. Key 45 plays at the sample's native pitch.
    pub key: u8,

    /// Velocity as a percentage, 0-100.
    pub velocity: u8,

    /// Stereo position, -100 (left) through 100 (right). 0 is centered.
    pub panning: i16,

    /// Fine pitch in cents. 100 cents is one semitone.
    pub pitch: i16,
}

impl Note {
    /// Pitch multiplier to apply to the instrument sample.
    ///
    /// Combines the key offset from [`NATIVE_KEY`] with the fine pitch in
    /// cents, so key 45 with zero detune yields 1.0 and each octave doubles it.
    pub fn pitch_multiplier(&self) -> f32 {
        let semitones = self.key as f32 - NATIVE_KEY as f32 + self.pitch as f32 / 100.0;
        2f32.powf(semitones / 12.0)
    }

    /// Velocity as a 0.0-1.0 gain.
    pub fn volume(&self) -> f32 {
        self.velocity as f32 / 100.0
    }
}

/// All notes that sound at one tick of the timeline.
///
/// Only materialized when at least one note lands on the tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tick {
    /// Position of the tick on the song timeline.
    pub index: u32,

    /// Notes in ascending layer order.
    pub notes: Vec<Note>,
}
