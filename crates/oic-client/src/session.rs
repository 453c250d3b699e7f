use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

use oic::status::Status;

use crate::discovery::DiscoverySession;
use crate::observe::ObservationSession;
use crate::presence::PresenceSubscription;
use crate::request::PendingRequest;

// Serializes the deliveries of a session with its closure.
//
// Callbacks run while the state lock is held. Closing the gate takes the
// same lock, so once `close` returns no callback is running and none will
// run anymore. The listener thread never waits on a gate, since a callback
// closing its own session would wait on itself.
pub(crate) struct Gate<T> {
    closed: AtomicBool,
    state: Mutex<T>,
}

impl<T> Gate<T> {
    pub(crate) const fn new(state: T) -> Self {
        Self {
            closed: AtomicBool::new(false),
            state: Mutex::new(state),
        }
    }

    pub(crate) fn deliver<R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let mut state = self.lock();
        if self.closed.load(Ordering::Acquire) {
            return None;
        }
        Some(f(&mut *state))
    }

    pub(crate) fn close(&self, listener: ThreadId) {
        self.closed.store(true, Ordering::Release);
        if thread::current().id() != listener {
            drop(self.lock());
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    // A panicking callback poisons the lock, but it cannot leave the
    // delivery state half-updated.
    fn lock(&self) -> MutexGuard<'_, T> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// The kind of operation a token belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SessionKind {
    Request,
    Observe,
    Presence,
    Discovery,
}

impl SessionKind {
    // Whether an event with the given status ends the operation.
    pub(crate) const fn is_terminal(self, status: Status) -> bool {
        match self {
            Self::Request => true,
            Self::Observe => status.is_error(),
            Self::Presence => matches!(status, Status::PresenceStopped),
            Self::Discovery => false,
        }
    }
}

// A registry entry.
#[derive(Clone)]
pub(crate) enum Session {
    Request(Arc<PendingRequest>),
    Observe(Arc<ObservationSession>),
    Presence(Arc<PresenceSubscription>),
    Discovery(Arc<DiscoverySession>),
}

impl Session {
    pub(crate) const fn kind(&self) -> SessionKind {
        match self {
            Self::Request(_) => SessionKind::Request,
            Self::Observe(_) => SessionKind::Observe,
            Self::Presence(_) => SessionKind::Presence,
            Self::Discovery(_) => SessionKind::Discovery,
        }
    }

    // Stops every further delivery of the session.
    pub(crate) fn close(&self, listener: ThreadId) {
        match self {
            Self::Request(pending) => pending.abandon(),
            Self::Observe(session) => session.cancel(listener),
            Self::Presence(subscription) => subscription.close(listener),
            Self::Discovery(session) => session.close(listener),
        }
    }
}
