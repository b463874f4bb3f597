//! Listener to active-session registry.
//!
//! The only mutable state shared between callers and timer threads. Every
//! operation is a single lookup-and-swap under one mutex, so at most one
//! session is registered per listener at any instant. The lock is never held
//! while a sink runs.

use super::scheduler::ListenerId;
use super::session::{Session, SessionState};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Registry of the active playback session for each listener.
///
/// Create one per scheduler, or share one between schedulers through
/// [`PlaybackScheduler::with_registry`](super::PlaybackScheduler::with_registry).
#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<ListenerId, Arc<Session>>>,
}

impl SessionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ListenerId, Arc<Session>>> {
        // No user code runs under this lock, so the map is consistent even if
        // a holder panicked.
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers `session` for its listener, returning the session it displaced.
    pub(crate) fn replace(&self, session: Arc<Session>) -> Option<Arc<Session>> {
        self.lock().insert(session.listener(), session)
    }

    /// The session registered for `listener`, ended or not.
    pub(crate) fn get(&self, listener: ListenerId) -> Option<Arc<Session>> {
        self.lock().get(&listener).cloned()
    }

    /// Removes `session` only if it is still the one registered for its
    /// listener. A newer session for the same listener is left in place.
    pub(crate) fn remove_session(&self, session: &Session) -> bool {
        let mut sessions = self.lock();
        match sessions.get(&session.listener()) {
            Some(current) if current.id() == session.id() => {
                sessions.remove(&session.listener());
                true
            }
            _ => false,
        }
    }

    /// Snapshot of every registered session.
    pub(crate) fn sessions(&self) -> Vec<Arc<Session>> {
        self.lock().values().cloned().collect()
    }

    /// Returns true if `listener` has a session that has not ended.
    ///
    /// A session stays registered until its completion sink returns, so this
    /// is narrower than "has an entry".
    pub fn contains(&self, listener: ListenerId) -> bool {
        self.lock()
            .get(&listener)
            .is_some_and(|session| !session.state().is_terminal())
    }

    /// State of the session registered for `listener`, if any. May be a
    /// terminal state while that session's completion signal is in flight.
    pub fn state_of(&self, listener: ListenerId) -> Option<SessionState> {
        self.lock().get(&listener).map(|session| session.state())
    }

    /// Listeners whose session has not ended.
    pub fn listeners(&self) -> Vec<ListenerId> {
        self.lock()
            .values()
            .filter(|session| !session.state().is_terminal())
            .map(|session| session.listener())
            .collect()
    }

    /// Number of sessions that have not ended.
    pub fn len(&self) -> usize {
        self.lock()
            .values()
            .filter(|session| !session.state().is_terminal())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
