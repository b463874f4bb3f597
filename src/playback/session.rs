//! Per-listener playback session state machine.
//!
//! A session moves `Scheduled -> Running -> {Completed, Cancelled}`. The
//! status lives in a single atomic; terminal transitions are compare-and-swap
//! so exactly one caller wins and fires the completion signal.

use super::scheduler::{CompletionSink, ListenerId};
use serde::{Deserialize, Serialize};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Condvar, Mutex, PoisonError};
use std::thread::{self, Thread, ThreadId};
use std::time::Instant;

/// Global counter for generating unique session IDs.
static SESSION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for one playback session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(u64);

impl SessionId {
    /// Generates a new unique session ID.
    pub fn new() -> Self {
        Self(SESSION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

/// Lifecycle state of a playback session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum SessionState {
    /// Registered, timer not yet running.
    Scheduled = 0,
    /// Timer is firing and ticks are being delivered.
    Running = 1,
    /// Every tick was processed.
    Completed = 2,
    /// Stopped before the end.
    Cancelled = 3,
}

impl SessionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => SessionState::Scheduled,
            1 => SessionState::Running,
            2 => SessionState::Completed,
            _ => SessionState::Cancelled,
        }
    }

    /// Returns true for `Completed` and `Cancelled`.
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Completed | SessionState::Cancelled)
    }
}

/// Why a session ended. Passed to the completion sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompletionReason {
    /// The last tick was played.
    Natural,
    /// The session was stopped or replaced.
    Cancelled,
}

impl CompletionReason {
    fn terminal_state(self) -> SessionState {
        match self {
            CompletionReason::Natural => SessionState::Completed,
            CompletionReason::Cancelled => SessionState::Cancelled,
        }
    }
}

/// Progress of the completion signal after the terminal transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Signal {
    Pending,
    /// The completion sink is running on this thread.
    Firing(ThreadId),
    Delivered,
}

/// One playback of a song to one listener.
pub(crate) struct Session {
    id: SessionId,
    listener: ListenerId,
    state: AtomicU8,
    /// Timer thread, once spawned. Used to wake it early on cancel.
    timer: Mutex<Option<Thread>>,
    completion: Box<dyn CompletionSink>,
    signal: Mutex<Signal>,
    signalled: Condvar,
}

impl Session {
    pub(crate) fn new(listener: ListenerId, completion: Box<dyn CompletionSink>) -> Self {
        Self {
            id: SessionId::new(),
            listener,
            state: AtomicU8::new(SessionState::Scheduled as u8),
            timer: Mutex::new(None),
            completion,
            signal: Mutex::new(Signal::Pending),
            signalled: Condvar::new(),
        }
    }

    pub(crate) fn id(&self) -> SessionId {
        self.id
    }

    pub(crate) fn listener(&self) -> ListenerId {
        self.listener
    }

    pub(crate) fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub(crate) fn is_running(&self) -> bool {
        self.state() == SessionState::Running
    }

    /// Moves `Scheduled -> Running`. False if the session already ended.
    pub(crate) fn begin(&self) -> bool {
        self.state
            .compare_exchange(
                SessionState::Scheduled as u8,
                SessionState::Running as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Moves the session into the terminal state for `reason`.
    ///
    /// Returns true for exactly one caller per session; that caller owns the
    /// completion bookkeeping.
    pub(crate) fn finish(&self, reason: CompletionReason) -> bool {
        let target = reason.terminal_state() as u8;
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            if SessionState::from_u8(current).is_terminal() {
                return false;
            }
            match self.state.compare_exchange_weak(
                current,
                target,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    /// Fires the completion sink. Call only after winning [`Session::finish`].
    pub(crate) fn notify(&self, reason: CompletionReason) {
        tracing::debug!(
            listener = %self.listener,
            session = self.id.as_u64(),
            reason = ?reason,
            "Playback session ended"
        );
        self.set_signal(Signal::Firing(thread::current().id()));
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.completion.playback_finished(self.listener, reason)
        }));
        if outcome.is_err() {
            tracing::error!(listener = %self.listener, "Completion sink panicked");
        }
        self.set_signal(Signal::Delivered);
    }

    /// Marks a session that ended without ever running as signalled, so
    /// nothing waits on it.
    pub(crate) fn discard(&self) {
        self.set_signal(Signal::Delivered);
    }

    fn set_signal(&self, next: Signal) {
        let mut signal = self.signal.lock().unwrap_or_else(PoisonError::into_inner);
        *signal = next;
        if next == Signal::Delivered {
            self.signalled.notify_all();
        }
    }

    /// Blocks until the completion sink has returned.
    ///
    /// Returns at once when called from inside the sink itself, so a sink
    /// may restart its own listener.
    pub(crate) fn wait_signalled(&self) {
        let me = thread::current().id();
        let mut signal = self.signal.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            match *signal {
                Signal::Delivered => return,
                Signal::Firing(owner) if owner == me => return,
                _ => {
                    signal = self
                        .signalled
                        .wait(signal)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            }
        }
    }

    /// Records the timer thread so a cancel can wake it.
    pub(crate) fn attach_timer(&self, thread: Thread) {
        let mut timer = self.timer.lock().unwrap_or_else(PoisonError::into_inner);
        *timer = Some(thread);
        // A cancel that raced the spawn found no thread to wake.
        if self.state().is_terminal() {
            if let Some(thread) = timer.as_ref() {
                thread.unpark();
            }
        }
    }

    /// Wakes the timer thread if it is parked.
    pub(crate) fn wake(&self) {
        let timer = self.timer.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(thread) = timer.as_ref() {
            thread.unpark();
        }
    }

    /// Parks the calling thread until `deadline`.
    ///
    /// Returns false as soon as the session is terminal, including when it
    /// already was on entry.
    pub(crate) fn wait_until(&self, deadline: Instant) -> bool {
        loop {
            if self.state().is_terminal() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::park_timeout(deadline - now);
        }
    }
}
