//! nbsplay - inspect and play Note Block Studio songs from the terminal.
//!
//! Decodes an `.nbs` file, logs its header, and optionally dumps it as JSON
//! or plays it with every note printed to stdout as its tick fires.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- song.nbs                # Print a header summary
//! cargo run -- --json song.nbs         # Dump the decoded song as JSON
//! RUST_LOG=debug cargo run -- --play song.nbs
//! ```

use anyhow::{Context, Result};
use nbsplay::nbs::Note;
use nbsplay::{CompletionReason, ListenerId, PlaybackScheduler, Song};
use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Command-line options for the application.
struct CliOptions {
    /// Song file to decode.
    path: PathBuf,
    /// Print the decoded song as JSON.
    json: bool,
    /// Play the song to stdout.
    play: bool,
}

impl CliOptions {
    /// Parses command-line arguments.
    ///
    /// Supports:
    /// - `--json` or `-j`: Print the decoded song as JSON
    /// - `--play` or `-p`: Play the song, printing each note
    /// - `--help` or `-h`: Print help and exit
    fn parse() -> Result<Self> {
        let args: Vec<String> = std::env::args().collect();
        let program = args.first().map(String::as_str).unwrap_or("nbsplay");
        let mut path: Option<PathBuf> = None;
        let mut json = false;
        let mut play = false;

        for arg in args.iter().skip(1) {
            match arg.as_str() {
                "--json" | "-j" => json = true,
                "--play" | "-p" => play = true,
                "--help" | "-h" => {
                    eprintln!("nbsplay - Note Block Studio song player");
                    eprintln!();
                    eprintln!("Usage: {} [OPTIONS] <SONG.nbs>", program);
                    eprintln!();
                    eprintln!("Options:");
                    eprintln!("  -j, --json    Print the decoded song as JSON");
                    eprintln!("  -p, --play    Play the song, printing each note as it fires");
                    eprintln!("  -h, --help    Print this help message");
                    eprintln!();
                    eprintln!("Set RUST_LOG=debug for playback lifecycle logs.");
                    std::process::exit(0);
                }
                other if other.starts_with('-') => {
                    anyhow::bail!("Unknown option: {} (use --help for usage)", other);
                }
                other => {
                    if path.replace(PathBuf::from(other)).is_some() {
                        anyhow::bail!("Only one song file may be given");
                    }
                }
            }
        }

        let path = path.context("No song file given (use --help for usage)")?;
        Ok(Self { path, json, play })
    }
}

/// Prints each note as a line on stdout.
fn print_note(tick: u32, note: &Note) -> Result<()> {
    println!(
        "tick {:>5}  instrument {:>2}  key {:>2}  velocity {:>3}  panning {:>4}  pitch {:>5}",
        tick, note.instrument, note.key, note.velocity, note.panning, note.pitch
    );
    Ok(())
}

/// Plays `song` to a fresh listener and blocks until it finishes.
fn play(song: Song) -> Result<()> {
    let scheduler = PlaybackScheduler::new();
    let listener = Uuid::new_v4();
    let (done_tx, done_rx) = mpsc::channel();
    let done_tx = Mutex::new(done_tx);

    scheduler
        .start_playback(
            Arc::new(song),
            listener,
            print_note,
            move |listener: ListenerId, reason: CompletionReason| {
                if let Ok(tx) = done_tx.lock() {
                    let _ = tx.send((listener, reason));
                }
            },
        )
        .context("Failed to start playback")?;

    let (_, reason) = done_rx
        .recv()
        .context("Playback ended without a completion signal")?;
    tracing::info!(reason = ?reason, "Playback finished");
    Ok(())
}

/// Main entry point.
fn main() -> Result<()> {
    let cli = CliOptions::parse()?;

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let song = Song::load(&cli.path)
        .with_context(|| format!("Failed to decode song: {}", cli.path.display()))?;

    tracing::info!(
        name = %song.name,
        author = %song.author,
        version = song.format_version,
        ticks = song.length,
        notes = song.note_count(),
        tempo = song.tempo_ticks_per_second,
        "Loaded song"
    );
    if let Some(duration) = song.duration() {
        eprintln!(
            "{} by {} - {} ticks at {} t/s ({:.1}s)",
            display_or(&song.name, "Untitled"),
            display_or(&song.author, "unknown"),
            song.length,
            song.tempo_ticks_per_second,
            duration.as_secs_f64()
        );
    }

    if cli.json {
        let json = serde_json::to_string_pretty(&song).context("Failed to serialize song")?;
        println!("{}", json);
    }

    if cli.play {
        play(song)?;
    }

    Ok(())
}

fn display_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.is_empty() {
        fallback
    } else {
        value
    }
}
