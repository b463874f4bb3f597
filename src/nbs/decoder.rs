//! One-pass `.nbs` decoder.
//!
//! Reads the fixed-order header and then the jump-delta encoded note stream.
//! Decoding is all-or-nothing: any short read or impossible value fails the
//! whole call and no partial [`Song`] is returned.
//!
//! # Format Details
//!
//! All multi-byte values are little-endian.
//!
//! - Header: 2-byte leading marker (discarded), version, instrument count,
//!   length - 1, layer count, four length-prefixed strings, tempo x 100,
//!   auto-save flag and interval, time signature, five `i32` usage counters,
//!   imported file name, loop flag, loop count, loop start tick.
//! - Note stream: a `u16` tick jump (0 ends the stream), then per tick a list
//!   of `u16` layer jumps (0 ends the tick), each followed by a 6-byte note.
//!
//! Anything after the note stream (layer and custom instrument tables) is
//! left unread.

use super::cursor::ByteCursor;
use super::note::{Note, Tick, PANNING_CENTER};
use super::song::Song;
use super::TEMPO_SCALE;
use thiserror::Error;

/// Errors that can occur while decoding a song.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The buffer ended in the middle of a field.
    #[error("input truncated at byte {offset}: needed {needed} byte(s), {remaining} left")]
    Truncated {
        offset: usize,
        needed: usize,
        remaining: usize,
    },

    /// A declared length could never be satisfied.
    #[error("malformed length {length} at byte {offset}")]
    MalformedLength { offset: usize, length: i32 },

    /// A tick jump landed past the last tick the header declares.
    #[error("tick {tick} at byte {offset} is past the end of a {length}-tick song")]
    TickOutOfRange { offset: usize, tick: u64, length: u32 },

    /// The song file could not be read.
    #[error("failed to read song file: {0}")]
    Io(#[from] std::io::Error),
}

impl DecodeError {
    /// Byte offset of the field that failed to decode, if the error came from
    /// the buffer rather than the filesystem.
    pub fn offset(&self) -> Option<usize> {
        match self {
            DecodeError::Truncated { offset, .. }
            | DecodeError::MalformedLength { offset, .. }
            | DecodeError::TickOutOfRange { offset, .. } => Some(*offset),
            DecodeError::Io(_) => None,
        }
    }
}

/// Decodes a complete song from `bytes`.
///
/// # Errors
///
/// Returns [`DecodeError::Truncated`] if the buffer ends early,
/// [`DecodeError::MalformedLength`] for a negative string length, and
/// [`DecodeError::TickOutOfRange`] if the note stream addresses a tick past
/// the declared length.
pub fn decode(bytes: &[u8]) -> Result<Song, DecodeError> {
    let mut cursor = ByteCursor::new(bytes);

    // Classic files store a zero length here; newer ones reuse it as a
    // version marker. Either way the real header starts after it.
    cursor.skip(2)?;

    let format_version = cursor.read_u8()?;
    let instrument_count = cursor.read_u8()?;
    let length = cursor.read_u16()? as u32 + 1;
    let layer_count = cursor.read_u16()? as u32;
    let name = cursor.read_length_prefixed_string()?;
    let author = cursor.read_length_prefixed_string()?;
    let original_author = cursor.read_length_prefixed_string()?;
    let description = cursor.read_length_prefixed_string()?;
    let tempo_ticks_per_second = cursor.read_u16()? as f64 / TEMPO_SCALE;
    let auto_save_enabled = cursor.read_u8()? == 1;
    let auto_save_interval_minutes = cursor.read_u8()?;
    let time_signature = cursor.read_u8()?;
    let minutes_spent = cursor.read_i32()?;
    let left_clicks = cursor.read_i32()?;
    let right_clicks = cursor.read_i32()?;
    let blocks_added = cursor.read_i32()?;
    let blocks_removed = cursor.read_i32()?;
    let imported_midi_name = cursor.read_length_prefixed_string()?;
    let loop_enabled = cursor.read_u8()? == 1;
    let max_loop_count = cursor.read_u8()?;
    let loop_start_tick = cursor.read_u16()? as u32;

    let ticks = read_note_stream(&mut cursor, length)?;

    let song = Song {
        format_version,
        instrument_count,
        length,
        layer_count,
        name,
        author,
        original_author,
        description,
        tempo_ticks_per_second,
        auto_save_enabled,
        auto_save_interval_minutes,
        time_signature,
        minutes_spent,
        left_clicks,
        right_clicks,
        blocks_added,
        blocks_removed,
        imported_midi_name,
        loop_enabled,
        max_loop_count,
        loop_start_tick,
        ticks,
    };

    tracing::debug!(
        name = %song.name,
        version = song.format_version,
        length = song.length,
        notes = song.note_count(),
        trailing_bytes = cursor.remaining(),
        "Decoded song"
    );

    Ok(song)
}

/// Decodes the jump-delta note stream into `length + 1` tick slots.
///
/// Reads tick jumps until a literal 0. Each jump advances the current tick
/// (starting before tick 0), then that tick's layer list is read. Ticks whose
/// layer list is empty are not materialized.
///
/// # Errors
///
/// Fails with [`DecodeError::TickOutOfRange`] if a jump passes tick `length`,
/// or [`DecodeError::Truncated`] if the stream ends before its terminator.
pub fn read_note_stream(
    cursor: &mut ByteCursor<'_>,
    length: u32,
) -> Result<Vec<Option<Tick>>, DecodeError> {
    let mut ticks: Vec<Option<Tick>> = vec![None; length as usize + 1];
    let mut current_tick: i64 = -1;

    loop {
        let offset = cursor.position();
        let jump = cursor.read_u16()?;
        if jump == 0 {
            break;
        }
        current_tick += jump as i64;
        if current_tick > length as i64 {
            return Err(DecodeError::TickOutOfRange {
                offset,
                tick: current_tick as u64,
                length,
            });
        }

        let notes = read_tick_layers(cursor)?;
        if !notes.is_empty() {
            let index = current_tick as u32;
            ticks[index as usize] = Some(Tick { index, notes });
        }
    }

    Ok(ticks)
}

/// Reads one tick's layer list, returning its notes in layer order.
fn read_tick_layers(cursor: &mut ByteCursor<'_>) -> Result<Vec<Note>, DecodeError> {
    let mut notes = Vec::new();
    // The layer index only positions the note; it is not kept.
    let mut current_layer: i64 = -1;

    loop {
        let jump = cursor.read_u16()?;
        if jump == 0 {
            break;
        }
        current_layer += jump as i64;
        notes.push(read_note(cursor)?);
    }

    tracing::trace!(layers = current_layer + 1, notes = notes.len(), "Read tick");
    Ok(notes)
}

/// Reads a single 6-byte note record.
fn read_note(cursor: &mut ByteCursor<'_>) -> Result<Note, DecodeError> {
    let instrument = cursor.read_u8()?;
    let key = cursor.read_u8()?;
    let velocity = cursor.read_u8()?;
    let panning = cursor.read_u8()? as i16 - PANNING_CENTER;
    let pitch = cursor.read_i16()?;

    Ok(Note {
        instrument,
        key,
        velocity,
        panning,
        pitch,
    })
}
