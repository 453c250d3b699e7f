use alloc::borrow::Cow;
use alloc::string::ToString;

use crate::status::Status;

/// A library error.
///
/// It carries the [`Status`] that an operation reports to its caller.
#[derive(Clone, PartialEq)]
pub struct Error {
    status: Status,
    description: Cow<'static, str>,
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        self.format(f)
    }
}

impl core::fmt::Debug for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        self.format(f)
    }
}

impl core::error::Error for Error {}

impl Error {
    /// Creates an [`Error`] from a [`Status`] and a description.
    #[inline]
    pub fn new(status: Status, description: impl Into<Cow<'static, str>>) -> Self {
        Self {
            status,
            description: description.into(),
        }
    }

    /// Returns the [`Status`] associated with the error.
    #[must_use]
    pub const fn status(&self) -> Status {
        self.status
    }

    /// Returns the error description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    fn format(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}: {}", self.status, self.description)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::new(Status::GenericError, e.to_string())
    }
}

/// A specialized [`Result`] type for [`Error`].
pub type Result<T> = core::result::Result<T, Error>;
