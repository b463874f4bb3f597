//! Reference encoder used by tests to build `.nbs` buffers.
//!
//! Writes the same layout the decoder reads. Notes within a tick are placed
//! on consecutive layers starting at layer 0.

use super::note::{Note, PANNING_CENTER};
use super::song::Song;

/// Little-endian byte sink with chainable writes.
#[derive(Debug, Default)]
pub(crate) struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    pub(crate) fn u8(&mut self, v: u8) -> &mut Self {
        self.buf.push(v);
        self
    }

    pub(crate) fn u16(&mut self, v: u16) -> &mut Self {
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub(crate) fn i16(&mut self, v: i16) -> &mut Self {
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub(crate) fn i32(&mut self, v: i32) -> &mut Self {
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }

    /// Writes a length-prefixed ISO-8859-1 string.
    pub(crate) fn string(&mut self, s: &str) -> &mut Self {
        let bytes: Vec<u8> = s
            .chars()
            .map(|c| u8::try_from(c as u32).expect("test strings must be Latin-1"))
            .collect();
        self.i32(bytes.len() as i32);
        self.buf.extend_from_slice(&bytes);
        self
    }

    pub(crate) fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// A song with default header values and no notes.
pub(crate) fn blank_song(stored_length: u32) -> Song {
    let length = stored_length + 1;
    Song {
        format_version: 4,
        instrument_count: 16,
        length,
        layer_count: 1,
        name: String::new(),
        author: String::new(),
        original_author: String::new(),
        description: String::new(),
        tempo_ticks_per_second: 10.0,
        auto_save_enabled: false,
        auto_save_interval_minutes: 0,
        time_signature: 4,
        minutes_spent: 0,
        left_clicks: 0,
        right_clicks: 0,
        blocks_added: 0,
        blocks_removed: 0,
        imported_midi_name: String::new(),
        loop_enabled: false,
        max_loop_count: 0,
        loop_start_tick: 0,
        ticks: vec![None; length as usize + 1],
    }
}

/// A centered, full-velocity note.
pub(crate) fn note(instrument: u8, key: u8) -> Note {
    Note {
        instrument,
        key,
        velocity: 100,
        panning: 0,
        pitch: 0,
    }
}

/// Writes every header field of `song`, up to but excluding the note stream.
pub(crate) fn encode_header(song: &Song, w: &mut ByteWriter) {
    w.u16(0)
        .u8(song.format_version)
        .u8(song.instrument_count)
        .u16((song.length - 1) as u16)
        .u16(song.layer_count as u16)
        .string(&song.name)
        .string(&song.author)
        .string(&song.original_author)
        .string(&song.description)
        .u16((song.tempo_ticks_per_second * 100.0).round() as u16)
        .u8(song.auto_save_enabled as u8)
        .u8(song.auto_save_interval_minutes)
        .u8(song.time_signature)
        .i32(song.minutes_spent)
        .i32(song.left_clicks)
        .i32(song.right_clicks)
        .i32(song.blocks_added)
        .i32(song.blocks_removed)
        .string(&song.imported_midi_name)
        .u8(song.loop_enabled as u8)
        .u8(song.max_loop_count)
        .u16(song.loop_start_tick as u16);
}

fn encode_note(note: &Note, w: &mut ByteWriter) {
    w.u8(note.instrument)
        .u8(note.key)
        .u8(note.velocity)
        .u8((note.panning + PANNING_CENTER) as u8)
        .i16(note.pitch);
}

/// Encodes a complete song, header and note stream.
pub(crate) fn encode(song: &Song) -> Vec<u8> {
    let mut w = ByteWriter::default();
    encode_header(song, &mut w);

    let mut previous: i64 = -1;
    for tick in song.populated_ticks() {
        w.u16((tick.index as i64 - previous) as u16);
        previous = tick.index as i64;
        for note in &tick.notes {
            w.u16(1);
            encode_note(note, &mut w);
        }
        w.u16(0);
    }
    w.u16(0);

    w.into_bytes()
}
