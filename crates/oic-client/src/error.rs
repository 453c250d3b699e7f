use std::borrow::Cow;

use oic::status::Status;

use tracing::error;

/// Client error.
///
/// The [`Status`] is the same one an asynchronous callback would receive,
/// hence callers can handle synchronous and asynchronous failures alike.
#[derive(Clone, PartialEq)]
pub struct Error {
    status: Status,
    description: Cow<'static, str>,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.format(f)
    }
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.format(f)
    }
}

impl Error {
    /// Creates an [`Error`] from a [`Status`] and a description.
    #[inline]
    pub fn new(status: Status, description: impl Into<Cow<'static, str>>) -> Self {
        let description = description.into();
        error!("{}", description.as_ref());
        Self {
            status,
            description,
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

    fn format(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.status, self.description)
    }
}

impl From<oic::error::Error> for Error {
    fn from(e: oic::error::Error) -> Self {
        Self::new(e.status(), e.description().to_owned())
    }
}

impl std::error::Error for Error {}

/// A specialized [`Result`] type for [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
