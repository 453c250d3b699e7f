use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle, ThreadId};

use oic::header::HeaderOptions;
use oic::status::Status;

use tracing::{debug, error, info, warn};

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::listener;
use crate::platform::{EngineId, SharedStack};
use crate::registry::Registry;
use crate::session::{Session, SessionKind};
use crate::stack::{QualityOfService, Stack, Token};

// The state shared between a client and its listener thread.
pub(crate) struct Engine<S: Stack> {
    pub(crate) id: EngineId,
    pub(crate) stack: SharedStack<S>,
    pub(crate) registry: Registry<Session>,
    pub(crate) config: ClientConfig,
    pub(crate) running: AtomicBool,
}

impl<S: Stack> Engine<S> {
    // Calls the stack and registers the session under the returned token.
    //
    // Both happen under the stack lock, so the listener cannot surface an
    // event for the token before the session is known.
    pub(crate) fn register(
        &self,
        session: Session,
        call: impl FnOnce(&mut S) -> Result<Token>,
    ) -> Result<Token> {
        self.stack.with(|cell| {
            if !self.running.load(Ordering::Acquire) {
                return Err(Error::new(
                    Status::GenericError,
                    "The client has been shut down",
                ));
            }

            let token = call(&mut cell.stack)?;
            let kind = session.kind();
            if let Err(e) = self.registry.register(token, session) {
                // The stack already tracks the operation, but nothing here will.
                if let Err(release) =
                    release(&mut cell.stack, token, kind, self.config.quality_of_service)
                {
                    warn!("Impossible to release the token {token}: {release}");
                }
                return Err(e);
            }
            cell.routes.bind(token, self.id, kind);

            Ok(token)
        })
    }
}

// Ends at the stack an operation which outlives its response.
fn release<S: Stack>(
    stack: &mut S,
    token: Token,
    kind: SessionKind,
    quality_of_service: QualityOfService,
) -> Result<()> {
    match kind {
        SessionKind::Observe => {
            stack.cancel_observe(token, &HeaderOptions::new(), quality_of_service)
        }
        SessionKind::Presence => stack.unsubscribe_presence(token),
        SessionKind::Request | SessionKind::Discovery => Ok(()),
    }
}

/// A resource client.
///
/// A client discovers resources, sends them requests, observes their
/// changes, and tracks the presence of their hosts.
///
/// Every operation returns as soon as its request has been handed over to
/// the protocol stack. Results are delivered to callbacks, always on the
/// listener thread of the client, which polls the stack at a fixed
/// interval.
///
/// The listener thread starts with [`Client::new`] and stops with
/// [`Client::shutdown`], or when the client is dropped. No callback runs
/// once the client has been stopped.
///
/// A callback must not own the client it has been registered with,
/// otherwise the client is never dropped.
pub struct Client<S: Stack> {
    engine: Arc<Engine<S>>,
    listener: Option<JoinHandle<()>>,
    listener_id: ThreadId,
}

impl<S: Stack> Client<S> {
    /// Creates a [`Client`] and starts its listener thread.
    ///
    /// # Errors
    ///
    /// An error is returned when the [`Platform`](crate::platform::Platform)
    /// owning the stack has been dropped, or when the listener thread cannot
    /// be spawned.
    pub fn new(stack: SharedStack<S>, config: ClientConfig) -> Result<Self> {
        let id = stack.with(|cell| Ok(cell.next_engine()))?;

        let thread_name = config.thread_name.to_string();
        let engine = Arc::new(Engine {
            id,
            stack,
            registry: Registry::new(),
            config,
            running: AtomicBool::new(true),
        });

        let listener = thread::Builder::new()
            .name(thread_name)
            .spawn({
                let engine = Arc::clone(&engine);
                move || listener::run(&engine)
            })
            .map_err(|e| {
                Error::new(
                    Status::GenericError,
                    format!("Impossible to start the listener thread: {e}"),
                )
            })?;
        let listener_id = listener.thread().id();

        Ok(Self {
            engine,
            listener: Some(listener),
            listener_id,
        })
    }

    /// Returns the [`ClientConfig`].
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.engine.config
    }

    /// Returns the number of outstanding operations: pending requests,
    /// active observations, presence subscriptions, and discovery listens.
    #[must_use]
    pub fn outstanding_operations(&self) -> usize {
        self.engine.registry.len()
    }

    /// Shuts down the [`Client`].
    ///
    /// Active observations and presence subscriptions are cancelled, pending
    /// requests are abandoned without invoking their callbacks, and the
    /// listener thread is joined.
    pub fn shutdown(mut self) {
        self.stop();
    }

    pub(crate) fn engine(&self) -> &Engine<S> {
        &self.engine
    }

    pub(crate) const fn listener(&self) -> ThreadId {
        self.listener_id
    }

    fn stop(&mut self) {
        let Some(listener) = self.listener.take() else {
            return;
        };

        let engine = &self.engine;
        let quality_of_service = engine.config.quality_of_service;

        // The stop flag is raised under the stack lock: once it is released,
        // the listener cannot reach the stack anymore.
        let released = engine.stack.with(|cell| {
            engine.running.store(false, Ordering::Release);

            let sessions = engine.registry.drain();
            for (token, session) in &sessions {
                if let Err(e) = release(&mut cell.stack, *token, session.kind(), quality_of_service)
                {
                    warn!("Impossible to release the token {token}: {e}");
                }
            }
            cell.routes.forget(engine.id);

            Ok(sessions)
        });

        let sessions = released.unwrap_or_else(|_| {
            engine.running.store(false, Ordering::Release);
            engine.registry.drain()
        });

        for (_, session) in sessions {
            session.close(self.listener_id);
        }

        if thread::current().id() == self.listener_id {
            debug!("The client has been dropped by one of its callbacks");
            return;
        }

        if listener.join().is_err() {
            error!("The listener thread panicked");
        }
        info!("Client stopped");
    }
}

impl<S: Stack> Drop for Client<S> {
    fn drop(&mut self) {
        self.stop();
    }
}
