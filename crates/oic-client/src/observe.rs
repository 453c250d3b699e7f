use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::thread::ThreadId;

use oic::header::{HeaderOption, HeaderOptions, assemble_header_options};
use oic::query::{QueryParams, assemble_uri};
use oic::representation::Representation;
use oic::resource::ResourceHandle;
use oic::status::Status;

use tracing::{debug, warn};

use crate::client::Client;
use crate::error::{Error, Result};
use crate::registry::Registry;
use crate::request::check_query;
use crate::session::{Gate, Session};
use crate::stack::{ObserveRequest, Stack, StackEvent, Token};

/// The kind of observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObserveKind {
    /// Notifications start with the next change of the resource.
    Observe,
    /// The current representation is delivered first, then every change.
    ObserveAll,
}

/// The state of an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObserveState {
    /// Notifications are being delivered.
    Observing,
    /// The observation has been cancelled by the caller.
    Cancelled,
    /// The observation has been ended by an error.
    Failed,
}

impl ObserveState {
    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Observing,
            1 => Self::Cancelled,
            _ => Self::Failed,
        }
    }
}

/// A change notification of an observed resource.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    sequence: Option<u32>,
    representation: Representation,
    header_options: HeaderOptions,
}

impl Notification {
    /// Returns the sequence number of the notification.
    #[must_use]
    pub const fn sequence(&self) -> Option<u32> {
        self.sequence
    }

    /// Returns the new [`Representation`] of the resource.
    #[must_use]
    pub const fn representation(&self) -> &Representation {
        &self.representation
    }

    /// Returns the header options sent by the device.
    #[must_use]
    pub const fn header_options(&self) -> &HeaderOptions {
        &self.header_options
    }

    fn from_event(event: StackEvent) -> Result<Self> {
        let representation = match event.document.as_deref() {
            None | Some("") => Representation::new(),
            Some(document) => Representation::from_payload(document)?,
        };

        Ok(Self {
            sequence: event.sequence,
            representation,
            header_options: event.header_options,
        })
    }
}

type NotificationCallback = Box<dyn FnMut(Result<Notification>) + Send>;

struct Observer {
    last_sequence: Option<u32>,
    callback: NotificationCallback,
}

// An active observation.
pub(crate) struct ObservationSession {
    state: AtomicU8,
    gate: Gate<Observer>,
}

impl ObservationSession {
    fn new(callback: impl FnMut(Result<Notification>) + Send + 'static) -> Self {
        Self {
            state: AtomicU8::new(ObserveState::Observing as u8),
            gate: Gate::new(Observer {
                last_sequence: None,
                callback: Box::new(callback),
            }),
        }
    }

    fn state(&self) -> ObserveState {
        ObserveState::from_u8(self.state.load(Ordering::Acquire))
    }

    // Leaves the observing state, at most once.
    fn end(&self, state: ObserveState) -> bool {
        self.state
            .compare_exchange(
                ObserveState::Observing as u8,
                state as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    pub(crate) fn cancel(&self, listener: ThreadId) {
        self.end(ObserveState::Cancelled);
        self.gate.close(listener);
    }

    pub(crate) fn notify(
        self: &Arc<Self>,
        registry: &Registry<Session>,
        event: StackEvent,
        listener: ThreadId,
    ) {
        let token = event.token;

        if event.status.is_error() {
            let retired = registry.retire_if(token, |entry| {
                matches!(entry, Session::Observe(session) if Arc::ptr_eq(session, self))
            });
            if retired.is_none() || !self.end(ObserveState::Failed) {
                return;
            }

            warn!("The observation {token} failed with status {}", event.status);
            let error = Error::new(
                event.status,
                format!("The observation {token} has been ended by the device"),
            );
            self.gate.deliver(|observer| (observer.callback)(Err(error)));
            self.gate.close(listener);
            return;
        }

        let sequence = event.sequence;
        let notification = Notification::from_event(event);

        self.gate.deliver(|observer| {
            if let Some(sequence) = sequence {
                if observer.last_sequence.is_some_and(|last| sequence <= last) {
                    debug!("Dropping the stale notification {sequence} of the observation {token}");
                    return;
                }
                observer.last_sequence = Some(sequence);
            }
            (observer.callback)(notification);
        });
    }
}

/// A handle to an observation.
///
/// It is needed to cancel the observation, and tells whether the
/// observation is still active.
pub struct ObserveHandle {
    token: Token,
    resource: ResourceHandle,
    session: Arc<ObservationSession>,
}

impl std::fmt::Debug for ObserveHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserveHandle")
            .field("token", &self.token)
            .field("resource", &self.resource)
            .field("state", &self.state())
            .finish()
    }
}

impl ObserveHandle {
    /// Returns the observation [`Token`].
    #[must_use]
    pub const fn token(&self) -> Token {
        self.token
    }

    /// Returns the observed resource.
    #[must_use]
    pub const fn resource(&self) -> &ResourceHandle {
        &self.resource
    }

    /// Returns the [`ObserveState`].
    #[must_use]
    pub fn state(&self) -> ObserveState {
        self.session.state()
    }

    /// Checks whether notifications are still being delivered.
    #[must_use]
    pub fn is_observing(&self) -> bool {
        self.state() == ObserveState::Observing
    }
}

impl<S: Stack> Client<S> {
    /// Starts observing a resource.
    ///
    /// The callback is invoked on the listener thread for every notification
    /// whose sequence number is greater than the last delivered one. A
    /// device error ends the observation: it is delivered to the callback,
    /// which is then never invoked again.
    ///
    /// # Errors
    ///
    /// An error is returned, and no observation exists, when the query
    /// parameters or the header options are invalid, or when the stack
    /// rejects the registration.
    pub fn observe_resource(
        &self,
        kind: ObserveKind,
        resource: &ResourceHandle,
        query: &QueryParams,
        header_options: &[HeaderOption],
        callback: impl FnMut(Result<Notification>) + Send + 'static,
    ) -> Result<ObserveHandle> {
        check_query(query)?;
        let header_options = assemble_header_options(header_options)?;

        let engine = self.engine();
        let request = ObserveRequest {
            kind,
            host: resource.host().to_owned(),
            uri: assemble_uri(resource.path(), query),
            connectivity: resource.connectivity(),
            header_options,
            quality_of_service: engine.config.quality_of_service,
        };

        let session = Arc::new(ObservationSession::new(callback));
        let token = engine.register(Session::Observe(Arc::clone(&session)), |stack| {
            stack.register_observe(request)
        })?;

        debug!("Observing {resource} with the token {token}");
        Ok(ObserveHandle {
            token,
            resource: resource.clone(),
            session,
        })
    }

    /// Cancels an observation.
    ///
    /// Once this method returns, the observation callback is not running and
    /// it will never be invoked again, even when the stack reports an error.
    ///
    /// # Errors
    ///
    /// A [`Status::NoResource`] error is returned when the observation has
    /// already been cancelled or has failed. An error is also returned when
    /// the header options are invalid, or when the stack cannot send the
    /// cancellation. In the last case, the observation is cancelled anyway.
    pub fn cancel_observe_resource(
        &self,
        handle: &ObserveHandle,
        header_options: &[HeaderOption],
    ) -> Result<()> {
        let header_options = assemble_header_options(header_options)?;
        let engine = self.engine();

        let retired = engine.registry.retire_if(handle.token, |entry| {
            matches!(entry, Session::Observe(session) if Arc::ptr_eq(session, &handle.session))
        });
        if retired.is_none() {
            return Err(Error::new(
                Status::NoResource,
                format!("The observation {} is not active", handle.token),
            ));
        }

        handle.session.cancel(self.listener());

        engine.stack.with(|cell| {
            cell.routes.unbind(handle.token);
            cell.stack.cancel_observe(
                handle.token,
                &header_options,
                engine.config.quality_of_service,
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use oic::header::{HeaderOption, assemble_header_options};
    use oic::query::QueryParams;
    use oic::status::Status;

    use serde_json::json;

    use crate::channel::events_channel;
    use crate::error::Result;
    use crate::stack::{QualityOfService, StackEvent};
    use crate::tests::{Submitted, TIMEOUT, light, start_client, wait_until};

    use super::{Notification, ObserveKind, ObserveState};

    fn document(power: u32) -> String {
        json!({ "rep": { "power": power } }).to_string()
    }

    #[test]
    fn notifications_in_order() {
        let (_platform, control, client) = start_client();
        let (callback, notifications) = events_channel::<Result<Notification>>();

        let query = QueryParams::new().insert("if".into(), "oic.if.baseline".into());
        let handle = client
            .observe_resource(ObserveKind::ObserveAll, &light(), &query, &[], callback)
            .unwrap();
        assert!(handle.is_observing());

        let calls = control.calls();
        let Submitted::Observe(request) = &calls[0].1 else {
            panic!("Unexpected stack call: {calls:?}");
        };
        assert_eq!(request.kind, ObserveKind::ObserveAll);
        assert_eq!(request.uri, "/a/light?if=oic.if.baseline");

        let token = handle.token();
        for sequence in [1, 3, 2, 3, 5] {
            control.inject(
                StackEvent::new(token, Status::Ok)
                    .with_document(document(sequence))
                    .with_sequence(sequence),
            );
        }

        let delivered: Vec<_> = (0..3)
            .map(|_| {
                let notification = notifications.recv_timeout(TIMEOUT).unwrap().unwrap();
                assert_eq!(
                    notification.representation().get::<u32>("power").unwrap(),
                    notification.sequence().unwrap()
                );
                notification.sequence().unwrap()
            })
            .collect();
        assert_eq!(delivered, [1, 3, 5]);

        control.wait_for_polls(2);
        assert!(notifications.is_empty());
    }

    #[test]
    fn missing_sequence_is_delivered() {
        let (_platform, control, client) = start_client();
        let (callback, notifications) = events_channel::<Result<Notification>>();

        let handle = client
            .observe_resource(ObserveKind::Observe, &light(), &QueryParams::new(), &[], callback)
            .unwrap();

        control.inject(StackEvent::new(handle.token(), Status::Ok).with_sequence(4));
        control.inject(StackEvent::new(handle.token(), Status::Ok));
        control.inject(StackEvent::new(handle.token(), Status::Ok).with_sequence(4));
        control.inject(StackEvent::new(handle.token(), Status::Ok).with_sequence(5));

        let sequences: Vec<_> = (0..3)
            .map(|_| notifications.recv_timeout(TIMEOUT).unwrap().unwrap().sequence())
            .collect();
        assert_eq!(sequences, [Some(4), None, Some(5)]);
    }

    #[test]
    fn cancel_before_notifications() {
        let (_platform, control, client) = start_client();
        let count = Arc::new(AtomicUsize::new(0));

        let handle = {
            let count = Arc::clone(&count);
            client
                .observe_resource(
                    ObserveKind::Observe,
                    &light(),
                    &QueryParams::new(),
                    &[],
                    move |_| {
                        count.fetch_add(1, Ordering::SeqCst);
                    },
                )
                .unwrap()
        };

        let options = [HeaderOption::new(2049, "bye")];
        client.cancel_observe_resource(&handle, &options).unwrap();
        assert_eq!(handle.state(), ObserveState::Cancelled);

        // A delayed notification, then a terminal error.
        control.inject(StackEvent::new(handle.token(), Status::Ok).with_sequence(1));
        control.inject(StackEvent::new(handle.token(), Status::CommError));
        control.wait_for_polls(3);

        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(control.calls().contains(&(
            handle.token(),
            Submitted::CancelObserve(
                assemble_header_options(&options).unwrap(),
                QualityOfService::Low
            )
        )));

        // Cancelling twice is reported.
        assert_eq!(
            client
                .cancel_observe_resource(&handle, &[])
                .unwrap_err()
                .status(),
            Status::NoResource
        );
        assert_eq!(client.outstanding_operations(), 0);
    }

    #[test]
    fn device_error_ends_observation() {
        let (_platform, control, client) = start_client();
        let (callback, notifications) = events_channel::<Result<Notification>>();

        let handle = client
            .observe_resource(ObserveKind::Observe, &light(), &QueryParams::new(), &[], callback)
            .unwrap();

        control.inject(StackEvent::new(handle.token(), Status::Ok).with_sequence(1));
        control.inject(StackEvent::new(handle.token(), Status::ResourceError));
        control.inject(StackEvent::new(handle.token(), Status::Ok).with_sequence(2));

        assert!(notifications.recv_timeout(TIMEOUT).unwrap().is_ok());
        assert_eq!(
            notifications
                .recv_timeout(TIMEOUT)
                .unwrap()
                .unwrap_err()
                .status(),
            Status::ResourceError
        );

        control.wait_for_polls(2);
        assert!(notifications.is_empty());
        assert_eq!(handle.state(), ObserveState::Failed);
        assert_eq!(
            client
                .cancel_observe_resource(&handle, &[])
                .unwrap_err()
                .status(),
            Status::NoResource
        );
    }

    #[test]
    fn cancel_from_callback() {
        let (_platform, control, client) = start_client();
        let client = Arc::new(client);
        let count = Arc::new(AtomicUsize::new(0));
        let slot = Arc::new(Mutex::new(None));

        let handle = {
            let weak = Arc::downgrade(&client);
            let count = Arc::clone(&count);
            let slot = Arc::clone(&slot);
            client
                .observe_resource(
                    ObserveKind::Observe,
                    &light(),
                    &QueryParams::new(),
                    &[],
                    move |_| {
                        count.fetch_add(1, Ordering::SeqCst);
                        let slot = slot.lock().unwrap();
                        if let (Some(client), Some(handle)) = (weak.upgrade(), slot.as_ref()) {
                            client.cancel_observe_resource(handle, &[]).unwrap();
                        }
                    },
                )
                .unwrap()
        };
        let token = handle.token();
        *slot.lock().unwrap() = Some(handle);

        control.inject(StackEvent::new(token, Status::Ok).with_sequence(1));
        control.inject(StackEvent::new(token, Status::Ok).with_sequence(2));
        wait_until(|| count.load(Ordering::SeqCst) == 1);
        control.wait_for_polls(2);

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(
            slot.lock().unwrap().as_ref().unwrap().state(),
            ObserveState::Cancelled
        );
    }

    #[test]
    fn rejected_registration() {
        let (_platform, control, client) = start_client();
        control.fail_next(Status::CommError);

        let error = client
            .observe_resource(ObserveKind::Observe, &light(), &QueryParams::new(), &[], |_| {})
            .unwrap_err();

        assert_eq!(error.status(), Status::CommError);
        assert_eq!(client.outstanding_operations(), 0);
    }
}
