use std::sync::Arc;
use std::thread::ThreadId;

use oic::connectivity::ConnectivityType;
use oic::status::Status;

use tracing::{debug, info};

use crate::client::Client;
use crate::error::{Error, Result};
use crate::registry::Registry;
use crate::session::{Gate, Session};
use crate::stack::{PresenceRequest, Stack, StackEvent, Token};

/// A presence report of a host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceEvent {
    status: Status,
    nonce: Option<u32>,
    host: String,
}

impl PresenceEvent {
    /// Returns the presence [`Status`].
    ///
    /// It is [`Status::Ok`] while the host is alive,
    /// [`Status::PresenceTimeout`] when a report is overdue, and
    /// [`Status::PresenceStopped`] when the host has stopped its feed.
    #[must_use]
    pub const fn status(&self) -> Status {
        self.status
    }

    /// Returns the nonce identifying the current run of the host.
    #[must_use]
    pub const fn nonce(&self) -> Option<u32> {
        self.nonce
    }

    /// Returns the reporting host.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Checks whether the host has stopped its presence feed.
    #[must_use]
    pub const fn is_stopped(&self) -> bool {
        matches!(self.status, Status::PresenceStopped)
    }
}

type PresenceCallback = Box<dyn FnMut(Result<PresenceEvent>) + Send>;

// An active presence subscription.
pub(crate) struct PresenceSubscription {
    host: String,
    gate: Gate<PresenceCallback>,
}

impl PresenceSubscription {
    pub(crate) fn close(&self, listener: ThreadId) {
        self.gate.close(listener);
    }

    pub(crate) fn notify(
        self: &Arc<Self>,
        registry: &Registry<Session>,
        event: StackEvent,
        listener: ThreadId,
    ) {
        let token = event.token;
        let host = event
            .origin
            .map_or_else(|| self.host.clone(), |origin| origin.host);

        match event.status {
            Status::PresenceStopped => {
                let retired = registry.retire_if(token, |entry| {
                    matches!(entry, Session::Presence(subscription) if Arc::ptr_eq(subscription, self))
                });
                if retired.is_none() {
                    return;
                }

                info!("The host {host} stopped its presence feed");
                let stopped = PresenceEvent {
                    status: Status::PresenceStopped,
                    nonce: event.sequence,
                    host,
                };
                self.gate.deliver(|callback| callback(Ok(stopped)));
                self.close(listener);
            }
            status if status.is_error() => {
                let error = Error::new(
                    status,
                    format!("The presence subscription {token} to {host} failed"),
                );
                self.gate.deliver(|callback| callback(Err(error)));
            }
            status => {
                let report = PresenceEvent {
                    status,
                    nonce: event.sequence,
                    host,
                };
                self.gate.deliver(|callback| callback(Ok(report)));
            }
        }
    }
}

/// A handle to a presence subscription.
pub struct PresenceHandle {
    token: Token,
    subscription: Arc<PresenceSubscription>,
}

impl std::fmt::Debug for PresenceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresenceHandle")
            .field("token", &self.token)
            .field("host", &self.subscription.host)
            .finish()
    }
}

impl PresenceHandle {
    /// Returns the subscription [`Token`].
    #[must_use]
    pub const fn token(&self) -> Token {
        self.token
    }

    /// Returns the tracked host.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.subscription.host
    }

    /// Checks whether presence reports are still being delivered.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.subscription.gate.is_closed()
    }
}

impl<S: Stack> Client<S> {
    /// Subscribes to the presence feed of a host.
    ///
    /// The callback is invoked on the listener thread for every presence
    /// report. A [`Status::PresenceStopped`] report is the last one: the
    /// subscription ends right after it.
    ///
    /// # Errors
    ///
    /// An [`Status::InvalidUri`] error is returned when the host is empty or
    /// malformed. An error is also returned when the stack rejects the
    /// subscription.
    pub fn subscribe_presence(
        &self,
        host: &str,
        connectivity: ConnectivityType,
        callback: impl FnMut(Result<PresenceEvent>) + Send + 'static,
    ) -> Result<PresenceHandle> {
        if host.is_empty() || host.contains(char::is_whitespace) {
            return Err(Error::new(
                Status::InvalidUri,
                format!("`{host}` is not a valid presence host"),
            ));
        }

        let engine = self.engine();
        let request = PresenceRequest {
            host: host.to_owned(),
            uri: engine.config.presence_uri.to_string(),
            connectivity,
        };

        let callback: PresenceCallback = Box::new(callback);
        let subscription = Arc::new(PresenceSubscription {
            host: host.to_owned(),
            gate: Gate::new(callback),
        });
        let token = engine.register(Session::Presence(Arc::clone(&subscription)), |stack| {
            stack.subscribe_presence(request)
        })?;

        debug!("Presence of {host} tracked with the token {token}");
        Ok(PresenceHandle {
            token,
            subscription,
        })
    }

    /// Cancels a presence subscription.
    ///
    /// Once this method returns, the subscription callback is not running
    /// and it will never be invoked again.
    ///
    /// # Errors
    ///
    /// A [`Status::NoResource`] error is returned when the subscription has
    /// already ended. An error is also returned when the stack does not know
    /// the subscription. In the last case, the subscription ends anyway.
    pub fn unsubscribe_presence(&self, handle: &PresenceHandle) -> Result<()> {
        let engine = self.engine();

        let retired = engine.registry.retire_if(handle.token, |entry| {
            matches!(entry, Session::Presence(subscription) if Arc::ptr_eq(subscription, &handle.subscription))
        });
        if retired.is_none() {
            return Err(Error::new(
                Status::NoResource,
                format!("The presence subscription {} is not active", handle.token),
            ));
        }

        handle.subscription.close(self.listener());

        engine.stack.with(|cell| {
            cell.routes.unbind(handle.token);
            cell.stack.unsubscribe_presence(handle.token)
        })
    }
}
