//! Per-listener playback scheduler.
//!
//! Each session gets its own timer thread that walks the song's ticks at
//! `1000 / tempo` millisecond intervals and hands every note to the session's
//! note sink. Sessions for different listeners run independently; starting a
//! session for a listener that already has one cancels the old one first.

use super::registry::SessionRegistry;
use super::session::{CompletionReason, Session, SessionId, SessionState};
use crate::nbs::{Note, Song};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use uuid::Uuid;

/// Identity of whoever a song is played to.
pub type ListenerId = Uuid;

/// Receives the notes of a playback session, one call per note per tick.
///
/// Runs on the session's timer thread. The next tick is scheduled by wall
/// clock, not by when this returns, so long-running work should be handed off.
pub trait NoteSink: Send + 'static {
    fn play_note(&mut self, tick: u32, note: &Note) -> anyhow::Result<()>;
}

impl<F> NoteSink for F
where
    F: FnMut(u32, &Note) -> anyhow::Result<()> + Send + 'static,
{
    fn play_note(&mut self, tick: u32, note: &Note) -> anyhow::Result<()> {
        self(tick, note)
    }
}

/// Receives exactly one end-of-playback signal per session.
///
/// Called from the timer thread on natural completion, or from the thread
/// that stopped or replaced the session.
pub trait CompletionSink: Send + Sync + 'static {
    fn playback_finished(&self, listener: ListenerId, reason: CompletionReason);
}

impl<F> CompletionSink for F
where
    F: Fn(ListenerId, CompletionReason) + Send + Sync + 'static,
{
    fn playback_finished(&self, listener: ListenerId, reason: CompletionReason) {
        self(listener, reason)
    }
}

/// What a session does when its note sink fails or panics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SinkErrorPolicy {
    /// Log the failure and keep playing.
    #[default]
    Continue,
    /// Log the failure and end the session as cancelled.
    Stop,
}

/// Errors that prevent a playback session from starting.
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// Tempo is zero, negative, not finite, or too slow to schedule.
    #[error("invalid tempo {0} ticks/s: must be a positive, finite rate")]
    InvalidTempo(f64),

    /// The song has no tick slots at all.
    #[error("song has no ticks to play")]
    EmptySong,

    /// The timer thread could not be spawned.
    #[error("failed to start playback timer: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Validates a tempo and converts it to the interval between ticks.
///
/// # Example
///
/// ```
/// use nbsplay::playback::tick_interval;
/// use std::time::Duration;
///
/// assert_eq!(tick_interval(20.0).unwrap(), Duration::from_millis(50));
/// assert!(tick_interval(0.0).is_err());
/// ```
///
/// # Errors
///
/// Returns [`PlaybackError::InvalidTempo`] unless the tempo is a positive,
/// finite number of ticks per second.
pub fn tick_interval(ticks_per_second: f64) -> Result<Duration, PlaybackError> {
    crate::nbs::interval_for_tempo(ticks_per_second)
        .ok_or(PlaybackError::InvalidTempo(ticks_per_second))
}

/// Starts, replaces and stops playback sessions, one per listener.
pub struct PlaybackScheduler {
    registry: Arc<SessionRegistry>,
    sink_error_policy: SinkErrorPolicy,
}

impl Default for PlaybackScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackScheduler {
    /// Creates a scheduler with its own, empty registry.
    pub fn new() -> Self {
        Self::with_registry(Arc::new(SessionRegistry::new()))
    }

    /// Creates a scheduler backed by an existing registry.
    pub fn with_registry(registry: Arc<SessionRegistry>) -> Self {
        Self {
            registry,
            sink_error_policy: SinkErrorPolicy::default(),
        }
    }

    /// Sets how sessions started from now on react to note sink failures.
    pub fn with_sink_error_policy(mut self, policy: SinkErrorPolicy) -> Self {
        self.sink_error_policy = policy;
        self
    }

    /// The registry this scheduler records sessions in.
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Starts playing `song` to `listener`.
    ///
    /// Any session the listener already has is cancelled first. Its
    /// completion sink has returned before the new session plays its first
    /// tick, including when the old session was ending on its own and its
    /// sink is still running on another thread; this call blocks until then.
    ///
    /// # Arguments
    ///
    /// * `song` - The song to play; shared read-only with the timer thread
    /// * `listener` - Who the song is played to
    /// * `note_sink` - Receives each note as its tick fires
    /// * `completion_sink` - Receives the single end-of-playback signal
    ///
    /// # Errors
    ///
    /// Returns [`PlaybackError::InvalidTempo`] or [`PlaybackError::EmptySong`]
    /// without touching the registry, or [`PlaybackError::Spawn`] if the timer
    /// thread could not be created (the new session is rolled back).
    pub fn start_playback<N, C>(
        &self,
        song: Arc<Song>,
        listener: ListenerId,
        note_sink: N,
        completion_sink: C,
    ) -> Result<SessionId, PlaybackError>
    where
        N: NoteSink,
        C: CompletionSink,
    {
        let interval = tick_interval(song.tempo_ticks_per_second)?;
        if song.ticks.is_empty() {
            return Err(PlaybackError::EmptySong);
        }
        // The whole schedule must fit on the clock.
        let schedule_fits = interval
            .checked_mul(song.length.saturating_add(1))
            .and_then(|total| Instant::now().checked_add(total))
            .is_some();
        if !schedule_fits {
            return Err(PlaybackError::InvalidTempo(song.tempo_ticks_per_second));
        }

        let session = Arc::new(Session::new(listener, Box::new(completion_sink)));
        let session_id = session.id();

        if let Some(previous) = self.registry.replace(Arc::clone(&session)) {
            tracing::info!(listener = %listener, "Replacing active playback");
            if !cancel(&previous) {
                // Already ending elsewhere; its signal goes out first.
                previous.wait_signalled();
            }
        }

        let spawned = thread::Builder::new()
            .name(format!("nbs-playback-{listener}"))
            .spawn({
                let session = Arc::clone(&session);
                let registry = Arc::clone(&self.registry);
                let policy = self.sink_error_policy;
                let sink: Box<dyn NoteSink> = Box::new(note_sink);
                move || run_session(session, song, interval, sink, registry, policy)
            });

        match spawned {
            Ok(handle) => {
                session.attach_timer(handle.thread().clone());
                tracing::info!(
                    listener = %listener,
                    session = session_id.as_u64(),
                    interval_ms = interval.as_secs_f64() * 1000.0,
                    "Started playback"
                );
                Ok(session_id)
            }
            Err(e) => {
                self.registry.remove_session(&session);
                // Never started, so no completion signal.
                if session.finish(CompletionReason::Cancelled) {
                    session.discard();
                }
                Err(PlaybackError::Spawn(e))
            }
        }
    }

    /// Stops `listener`'s session, if it has one.
    ///
    /// Returns true if this call cancelled a session. False if there was none
    /// or it was already finishing on its own.
    pub fn stop_playback(&self, listener: ListenerId) -> bool {
        match self.registry.get(listener) {
            Some(session) => {
                let cancelled =
                    end_registered(&session, &self.registry, CompletionReason::Cancelled);
                if cancelled {
                    tracing::info!(listener = %listener, "Stopped playback");
                }
                cancelled
            }
            None => false,
        }
    }

    /// Stops every active session. Returns how many were cancelled.
    pub fn stop_all(&self) -> usize {
        self.registry
            .sessions()
            .iter()
            .filter(|session| {
                end_registered(session, &self.registry, CompletionReason::Cancelled)
            })
            .count()
    }

    /// Returns true if `listener` has a session that has not ended.
    pub fn is_playing(&self, listener: ListenerId) -> bool {
        self.registry.contains(listener)
    }

    /// State of `listener`'s active session, if any.
    pub fn session_state(&self, listener: ListenerId) -> Option<SessionState> {
        self.registry.state_of(listener)
    }

    /// Number of active sessions.
    pub fn active_sessions(&self) -> usize {
        self.registry.len()
    }
}

/// Cancels a session that was already taken out of the registry. Fires its
/// completion signal if this call won the terminal transition.
fn cancel(session: &Session) -> bool {
    if !session.finish(CompletionReason::Cancelled) {
        return false;
    }
    session.wake();
    session.notify(CompletionReason::Cancelled);
    true
}

/// Ends a session that is still registered.
///
/// The entry is removed only after the completion sink returns, so a start
/// for the same listener meanwhile finds it and waits for the signal.
fn end_registered(
    session: &Session,
    registry: &SessionRegistry,
    reason: CompletionReason,
) -> bool {
    if !session.finish(reason) {
        return false;
    }
    if reason == CompletionReason::Cancelled {
        session.wake();
    }
    session.notify(reason);
    registry.remove_session(session);
    true
}

/// Timer thread body: fires ticks `0..=length` at fixed wall-clock offsets.
fn run_session(
    session: Arc<Session>,
    song: Arc<Song>,
    interval: Duration,
    mut sink: Box<dyn NoteSink>,
    registry: Arc<SessionRegistry>,
    policy: SinkErrorPolicy,
) {
    if !session.begin() {
        return;
    }
    let listener = session.listener();
    tracing::debug!(listener = %listener, length = song.length, "Playback timer running");

    let started = Instant::now();
    for index in 0..=song.length {
        // Start-up validation guarantees the schedule fits.
        let deadline = started
            .checked_add(interval.saturating_mul(index))
            .unwrap_or_else(Instant::now);
        if !session.wait_until(deadline) {
            return;
        }

        let Some(tick) = song.tick(index) else {
            continue;
        };
        for note in &tick.notes {
            if !session.is_running() {
                return;
            }
            if !deliver(&mut *sink, listener, index, note) && policy == SinkErrorPolicy::Stop {
                end_registered(&session, &registry, CompletionReason::Cancelled);
                return;
            }
        }
    }

    end_registered(&session, &registry, CompletionReason::Natural);
}

/// Hands one note to the sink. Returns false if the sink failed or panicked.
fn deliver(sink: &mut dyn NoteSink, listener: ListenerId, tick: u32, note: &Note) -> bool {
    match panic::catch_unwind(AssertUnwindSafe(|| sink.play_note(tick, note))) {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            tracing::warn!(listener = %listener, tick, "Note sink failed: {e:#}");
            false
        }
        Err(_) => {
            tracing::error!(listener = %listener, tick, "Note sink panicked");
            false
        }
    }
}
