use std::sync::{Arc, Mutex, Weak};

use hashbrown::HashMap;

use oic::status::Status;

use tracing::debug;

use crate::error::{Error, Result};
use crate::session::SessionKind;
use crate::stack::{Stack, StackEvent, Token};

// Identifier of a client sharing a stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct EngineId(u64);

// Routes stack events to the client which registered their token.
//
// Each client drains the whole stack when polling, so events belonging to
// a sibling client are parked in its mailbox until it polls.
#[derive(Default)]
pub(crate) struct Routes {
    owners: HashMap<Token, (EngineId, SessionKind)>,
    mailboxes: HashMap<EngineId, Vec<StackEvent>>,
}

impl Routes {
    pub(crate) fn bind(&mut self, token: Token, engine: EngineId, kind: SessionKind) {
        self.owners.insert(token, (engine, kind));
    }

    pub(crate) fn unbind(&mut self, token: Token) {
        self.owners.remove(&token);
    }

    pub(crate) fn distribute(&mut self, events: Vec<StackEvent>) {
        for event in events {
            let Some(&(engine, kind)) = self.owners.get(&event.token) else {
                debug!("Dropping an event for the unknown token {}", event.token);
                continue;
            };

            if kind.is_terminal(event.status) {
                self.owners.remove(&event.token);
            }

            self.mailboxes.entry(engine).or_default().push(event);
        }
    }

    pub(crate) fn collect(&mut self, engine: EngineId) -> Vec<StackEvent> {
        self.mailboxes.remove(&engine).unwrap_or_default()
    }

    pub(crate) fn forget(&mut self, engine: EngineId) {
        self.owners.retain(|_, (owner, _)| *owner != engine);
        self.mailboxes.remove(&engine);
    }
}

// The content guarded by the shared stack lock.
pub(crate) struct StackCell<S: Stack> {
    pub(crate) stack: S,
    pub(crate) routes: Routes,
    next_engine: u64,
}

impl<S: Stack> StackCell<S> {
    pub(crate) fn next_engine(&mut self) -> EngineId {
        let engine = EngineId(self.next_engine);
        self.next_engine += 1;
        engine
    }
}

/// The owner of a protocol stack.
///
/// A platform is the only owner of the stack and of the lock serializing
/// every call to it. Clients only receive a [`SharedStack`], so they stop
/// reaching the stack as soon as the platform is dropped.
///
/// Several clients can share the same platform.
pub struct Platform<S: Stack> {
    cell: Arc<Mutex<StackCell<S>>>,
}

impl<S: Stack> Platform<S> {
    /// Creates a [`Platform`] owning the given [`Stack`].
    #[must_use]
    pub fn new(stack: S) -> Self {
        Self {
            cell: Arc::new(Mutex::new(StackCell {
                stack,
                routes: Routes::default(),
                next_engine: 0,
            })),
        }
    }

    /// Returns a [`SharedStack`] referring to the owned stack.
    #[must_use]
    pub fn shared(&self) -> SharedStack<S> {
        SharedStack {
            cell: Arc::downgrade(&self.cell),
        }
    }

    /// Runs a function on the owned stack, holding the stack lock.
    ///
    /// # Errors
    ///
    /// An error is returned when the stack lock is poisoned.
    pub fn with_stack<R>(&self, f: impl FnOnce(&mut S) -> R) -> Result<R> {
        let mut cell = self.cell.lock().map_err(|_| poisoned())?;
        Ok(f(&mut cell.stack))
    }
}

/// A non-owning reference to the stack of a [`Platform`].
pub struct SharedStack<S: Stack> {
    cell: Weak<Mutex<StackCell<S>>>,
}

impl<S: Stack> Clone for SharedStack<S> {
    fn clone(&self) -> Self {
        Self {
            cell: self.cell.clone(),
        }
    }
}

impl<S: Stack> SharedStack<S> {
    /// Checks whether the owning [`Platform`] is still alive.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.cell.strong_count() > 0
    }

    // Resolves the reference and runs a function holding the stack lock.
    pub(crate) fn with<R>(&self, f: impl FnOnce(&mut StackCell<S>) -> Result<R>) -> Result<R> {
        let cell = self.cell.upgrade().ok_or_else(|| {
            Error::new(
                Status::GenericError,
                "The platform owning the stack has been dropped",
            )
        })?;
        let mut guard = cell.lock().map_err(|_| poisoned())?;
        f(&mut *guard)
    }
}

fn poisoned() -> Error {
    Error::new(Status::GenericError, "The stack lock is poisoned")
}
