use std::sync::{Mutex, MutexGuard, PoisonError};

use hashbrown::HashMap;

use oic::status::Status;

use crate::error::{Error, Result};
use crate::stack::Token;

// Outstanding operations of a client, indexed by token.
//
// The registry lock is always taken after the stack lock, never before.
pub(crate) struct Registry<E> {
    entries: Mutex<HashMap<Token, E>>,
}

impl<E: Clone> Registry<E> {
    pub(crate) fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn register(&self, token: Token, entry: E) -> Result<()> {
        let mut entries = self.entries();
        if entries.contains_key(&token) {
            return Err(Error::new(
                Status::GenericError,
                format!("The token {token} is already registered"),
            ));
        }
        entries.insert(token, entry);
        Ok(())
    }

    pub(crate) fn lookup(&self, token: Token) -> Option<E> {
        self.entries().get(&token).cloned()
    }

    pub(crate) fn retire(&self, token: Token) -> Option<E> {
        self.entries().remove(&token)
    }

    // Retires an entry only when it is still the expected one.
    pub(crate) fn retire_if(&self, token: Token, expected: impl FnOnce(&E) -> bool) -> Option<E> {
        let mut entries = self.entries();
        if entries.get(&token).is_some_and(expected) {
            entries.remove(&token)
        } else {
            None
        }
    }

    pub(crate) fn drain(&self) -> Vec<(Token, E)> {
        self.entries().drain().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries().len()
    }

    // Entries are inserted and removed atomically, so a poisoned lock still
    // guards a consistent map.
    fn entries(&self) -> MutexGuard<'_, HashMap<Token, E>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
