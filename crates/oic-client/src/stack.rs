use oic::connectivity::ConnectivityType;
use oic::header::HeaderOptions;
use oic::rest::RestKind;
use oic::status::Status;

use crate::error::Result;
use crate::observe::ObserveKind;

/// An identifier assigned by the protocol stack to an outstanding
/// operation.
///
/// Every event surfaced by the stack carries the token of the operation it
/// belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Token(pub u64);

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Delivery guarantees of an outgoing message.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QualityOfService {
    /// Non-confirmable message.
    #[default]
    Low,
    /// Confirmable message.
    High,
}

/// A discovery request.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveryRequest {
    /// Host to query. `None` means every reachable host.
    pub host: Option<String>,
    /// Discovery path, including the resource type query.
    pub uri: String,
    /// Transport family.
    pub connectivity: ConnectivityType,
    /// Delivery guarantees.
    pub quality_of_service: QualityOfService,
}

/// A `REST` request addressed to a single resource.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundRequest {
    /// Request method.
    pub method: RestKind,
    /// Resource host.
    pub host: String,
    /// Resource path together with its query.
    pub uri: String,
    /// Transport family.
    pub connectivity: ConnectivityType,
    /// Serialized representation, present for `PUT` and `POST`.
    pub payload: Option<String>,
    /// Header options, in the caller order.
    pub header_options: HeaderOptions,
    /// Delivery guarantees.
    pub quality_of_service: QualityOfService,
}

/// An observation registration.
#[derive(Debug, Clone, PartialEq)]
pub struct ObserveRequest {
    /// Observation kind.
    pub kind: ObserveKind,
    /// Resource host.
    pub host: String,
    /// Resource path together with its query.
    pub uri: String,
    /// Transport family.
    pub connectivity: ConnectivityType,
    /// Header options, in the caller order.
    pub header_options: HeaderOptions,
    /// Delivery guarantees.
    pub quality_of_service: QualityOfService,
}

/// A presence subscription.
#[derive(Debug, Clone, PartialEq)]
pub struct PresenceRequest {
    /// Host whose liveness is tracked.
    pub host: String,
    /// Presence feed path.
    pub uri: String,
    /// Transport family.
    pub connectivity: ConnectivityType,
}

/// The address an event came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    pub(crate) host: String,
    pub(crate) connectivity: ConnectivityType,
}

impl Origin {
    /// Creates an [`Origin`].
    #[must_use]
    #[inline]
    pub fn new(host: impl Into<String>, connectivity: ConnectivityType) -> Self {
        Self {
            host: host.into(),
            connectivity,
        }
    }
}

/// An event surfaced by the protocol stack while driving pending work.
///
/// Depending on the operation identified by the token, an event is a
/// discovery announcement, a response, a notification, or a presence report.
#[derive(Debug, Clone, PartialEq)]
pub struct StackEvent {
    pub(crate) token: Token,
    pub(crate) status: Status,
    pub(crate) document: Option<String>,
    pub(crate) origin: Option<Origin>,
    pub(crate) sequence: Option<u32>,
    pub(crate) header_options: HeaderOptions,
}

impl StackEvent {
    /// Creates a [`StackEvent`] for the given token.
    #[must_use]
    #[inline]
    pub fn new(token: Token, status: Status) -> Self {
        Self {
            token,
            status,
            document: None,
            origin: None,
            sequence: None,
            header_options: HeaderOptions::new(),
        }
    }

    /// Sets the raw document carried by the event.
    #[must_use]
    #[inline]
    pub fn with_document(mut self, document: impl Into<String>) -> Self {
        self.document = Some(document.into());
        self
    }

    /// Sets the [`Origin`] of the event.
    #[must_use]
    #[inline]
    pub fn with_origin(mut self, origin: Origin) -> Self {
        self.origin = Some(origin);
        self
    }

    /// Sets the sequence number of a notification, or the nonce of a
    /// presence report.
    #[must_use]
    pub const fn with_sequence(mut self, sequence: u32) -> Self {
        self.sequence = Some(sequence);
        self
    }

    /// Sets the header options received with the event.
    #[must_use]
    #[inline]
    pub fn with_header_options(mut self, header_options: HeaderOptions) -> Self {
        self.header_options = header_options;
        self
    }

    /// Returns the event token.
    #[must_use]
    pub const fn token(&self) -> Token {
        self.token
    }

    /// Returns the event status.
    #[must_use]
    pub const fn status(&self) -> Status {
        self.status
    }
}

/// The boundary towards the underlying protocol stack.
///
/// A stack is not thread-safe: the client only calls it while holding the
/// lock of the [`Platform`](crate::platform::Platform) owning it.
///
/// Every operation which registers something returns a [`Token`]. Tokens
/// must not be reused while the operation they identify is outstanding.
pub trait Stack: Send + 'static {
    /// Sends a discovery request.
    ///
    /// # Errors
    ///
    /// An error is returned when the request cannot be sent.
    fn initiate_discovery(&mut self, request: DiscoveryRequest) -> Result<Token>;

    /// Sends a `REST` request.
    ///
    /// # Errors
    ///
    /// An error is returned when the request cannot be sent.
    fn submit_request(&mut self, request: OutboundRequest) -> Result<Token>;

    /// Registers an observation.
    ///
    /// # Errors
    ///
    /// An error is returned when the registration cannot be sent.
    fn register_observe(&mut self, request: ObserveRequest) -> Result<Token>;

    /// Cancels an observation.
    ///
    /// # Errors
    ///
    /// An error is returned when the cancellation cannot be sent.
    fn cancel_observe(
        &mut self,
        token: Token,
        header_options: &HeaderOptions,
        quality_of_service: QualityOfService,
    ) -> Result<()>;

    /// Subscribes to the presence feed of a host.
    ///
    /// # Errors
    ///
    /// An error is returned when the subscription cannot be sent.
    fn subscribe_presence(&mut self, request: PresenceRequest) -> Result<Token>;

    /// Cancels a presence subscription.
    ///
    /// # Errors
    ///
    /// An error is returned when the token is unknown to the stack.
    fn unsubscribe_presence(&mut self, token: Token) -> Result<()>;

    /// Processes pending network work and returns the events surfaced
    /// meanwhile, in arrival order.
    fn drive_pending_work(&mut self) -> Vec<StackEvent>;
}
