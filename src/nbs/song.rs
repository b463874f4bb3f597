//! Decoded song container.
//!
//! A song holds the header metadata of an `.nbs` file and its sparse
//! timeline of ticks. Once decoded it is never mutated; playback shares it
//! behind an `Arc`.

use super::decoder::{decode, DecodeError};
use super::note::Tick;
use super::{interval_for_tempo, ticks_to_duration};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// A fully decoded song.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Song {
    /// File format revision as stored in the header.
    pub format_version: u8,

    /// Number of built-in instruments the song was authored against.
    pub instrument_count: u8,

    /// Song length in ticks (stored value plus one).
    pub length: u32,

    /// Number of layers declared by the header.
    pub layer_count: u32,

    pub name: String,
    pub author: String,
    pub original_author: String,
    pub description: String,

    /// Playback speed in ticks per second.
    pub tempo_ticks_per_second: f64,

    pub auto_save_enabled: bool,
    pub auto_save_interval_minutes: u8,

    /// Beats per measure, as shown by the editor.
    pub time_signature: u8,

    // Editor usage statistics.
    pub minutes_spent: i32,
    pub left_clicks: i32,
    pub right_clicks: i32,
    pub blocks_added: i32,
    pub blocks_removed: i32,

    /// Name of the MIDI or schematic file this song was imported from, if any.
    pub imported_midi_name: String,

    pub loop_enabled: bool,

    /// Number of times to loop. 0 loops forever.
    pub max_loop_count: u8,

    pub loop_start_tick: u32,

    /// One slot per tick, `length + 1` in total. `None` means silence.
    pub ticks: Vec<Option<Tick>>,
}

impl Song {
    /// Decodes a song from an in-memory buffer.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        decode(bytes)
    }

    /// Reads and decodes a song file.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Io`] if the file cannot be read, or any decode
    /// error for malformed contents.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, DecodeError> {
        let bytes = fs::read(path.as_ref())?;
        decode(&bytes)
    }

    /// Returns the tick at `index`, or `None` if it is silent or past the end.
    pub fn tick(&self, index: u32) -> Option<&Tick> {
        self.ticks.get(index as usize).and_then(Option::as_ref)
    }

    /// Iterates over the ticks that contain notes, in timeline order.
    pub fn populated_ticks(&self) -> impl Iterator<Item = &Tick> {
        self.ticks.iter().flatten()
    }

    /// Total number of notes across all ticks.
    pub fn note_count(&self) -> usize {
        self.populated_ticks().map(|t| t.notes.len()).sum()
    }

    /// Time between two ticks at the song's tempo, or `None` if the tempo is
    /// not a positive finite number.
    pub fn tick_interval(&self) -> Option<Duration> {
        interval_for_tempo(self.tempo_ticks_per_second)
    }

    /// Wall-clock length of the song at its tempo.
    pub fn duration(&self) -> Option<Duration> {
        ticks_to_duration(self.length, self.tempo_ticks_per_second)
    }
}
