use serde::{Deserialize, Serialize};

/// The outcome of an operation.
///
/// A status is either returned synchronously, when an operation is rejected
/// before reaching a device, or delivered asynchronously together with a
/// device response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    /// The operation succeeded.
    Ok,
    /// A resource has been created.
    Created,
    /// A resource has been deleted.
    Deleted,
    /// Malformed resource `URI`.
    InvalidUri,
    /// Malformed query parameters.
    InvalidQuery,
    /// Invalid input parameter.
    InvalidParam,
    /// Invalid callback.
    InvalidCallback,
    /// The resource does not support the requested method.
    InvalidMethod,
    /// Memory exhaustion.
    NoMemory,
    /// Communication failure.
    CommError,
    /// The operation is not implemented.
    NotImplemented,
    /// The resource does not exist.
    NoResource,
    /// The resource failed while serving a request.
    ResourceError,
    /// The resource is too slow to answer.
    SlowResource,
    /// The resource has no observers left.
    NoObservers,
    /// The presence feed of a host has been stopped.
    PresenceStopped,
    /// No presence notification arrived within the expected period.
    PresenceTimeout,
    /// Unclassified failure.
    GenericError,
}

impl Status {
    const fn description(self) -> &'static str {
        match self {
            Self::Ok => "Ok",
            Self::Created => "Created",
            Self::Deleted => "Deleted",
            Self::InvalidUri => "Invalid Uri",
            Self::InvalidQuery => "Invalid Query",
            Self::InvalidParam => "Invalid Param",
            Self::InvalidCallback => "Invalid Callback",
            Self::InvalidMethod => "Invalid Method",
            Self::NoMemory => "No Memory",
            Self::CommError => "Communication Error",
            Self::NotImplemented => "Not Implemented",
            Self::NoResource => "No Resource",
            Self::ResourceError => "Resource Error",
            Self::SlowResource => "Slow Resource",
            Self::NoObservers => "No Observers",
            Self::PresenceStopped => "Presence Stopped",
            Self::PresenceTimeout => "Presence Timeout",
            Self::GenericError => "Generic Error",
        }
    }

    /// Checks whether the status belongs to the successful class.
    #[must_use]
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok | Self::Created | Self::Deleted)
    }

    /// Checks whether the status reports a presence state change.
    #[must_use]
    pub const fn is_presence(self) -> bool {
        matches!(self, Self::PresenceStopped | Self::PresenceTimeout)
    }

    /// Checks whether the status reports a failure.
    #[must_use]
    pub const fn is_error(self) -> bool {
        !self.is_ok() && !self.is_presence()
    }
}

impl core::fmt::Display for Status {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        self.description().fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::Status;

    #[test]
    fn status_classes() {
        for status in [Status::Ok, Status::Created, Status::Deleted] {
            assert!(status.is_ok());
            assert!(!status.is_error());
        }

        for status in [Status::PresenceStopped, Status::PresenceTimeout] {
            assert!(!status.is_ok());
            assert!(status.is_presence());
            assert!(!status.is_error());
        }

        for status in [
            Status::InvalidUri,
            Status::CommError,
            Status::NoResource,
            Status::GenericError,
        ] {
            assert!(status.is_error());
        }
    }

    #[test]
    fn status_display() {
        assert_eq!(alloc::format!("{}", Status::CommError), "Communication Error");
        assert_eq!(alloc::format!("{}", Status::Ok), "Ok");
    }
}
