use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::status::Status;

/// Maximum number of header options attached to a single request.
pub const MAX_HEADER_OPTIONS: usize = 2;

/// Maximum length, in bytes, of a header option value.
pub const MAX_HEADER_OPTION_DATA_LENGTH: usize = 16;

/// Smallest identifier available to vendor header options.
pub const MIN_HEADER_OPTION_ID: u16 = 2048;

/// Largest identifier available to vendor header options.
pub const MAX_HEADER_OPTION_ID: u16 = 3000;

/// A header option.
///
/// A numeric identifier together with its value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HeaderOption {
    /// Option identifier.
    pub id: u16,
    /// Option value.
    pub value: String,
}

impl HeaderOption {
    /// Creates a [`HeaderOption`].
    #[must_use]
    #[inline]
    pub fn new(id: u16, value: impl Into<String>) -> Self {
        Self {
            id,
            value: value.into(),
        }
    }

    fn validate(&self) -> Result<()> {
        if !(MIN_HEADER_OPTION_ID..=MAX_HEADER_OPTION_ID).contains(&self.id) {
            return Err(Error::new(
                Status::InvalidParam,
                format!(
                    "Header option identifier {} is outside the range [{MIN_HEADER_OPTION_ID}, {MAX_HEADER_OPTION_ID}]",
                    self.id
                ),
            ));
        }

        if self.value.len() > MAX_HEADER_OPTION_DATA_LENGTH {
            return Err(Error::new(
                Status::InvalidParam,
                format!(
                    "Header option {} has a value of {} bytes, the maximum is {MAX_HEADER_OPTION_DATA_LENGTH}",
                    self.id,
                    self.value.len()
                ),
            ));
        }

        Ok(())
    }
}

/// An ordered, capacity-bounded sequence of [`HeaderOption`]s.
///
/// It can only be obtained through [`assemble_header_options`], hence it
/// never holds more than [`MAX_HEADER_OPTIONS`] options.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct HeaderOptions(Vec<HeaderOption>);

impl<'a> IntoIterator for &'a HeaderOptions {
    type Item = &'a HeaderOption;
    type IntoIter = core::slice::Iter<'a, HeaderOption>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl HeaderOptions {
    /// Creates an empty [`HeaderOptions`].
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Checks whether there are no options.
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of options.
    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns the options as a slice, in the order they were given.
    #[must_use]
    #[inline]
    pub fn as_slice(&self) -> &[HeaderOption] {
        &self.0
    }

    /// Returns the value of the first option with the given identifier.
    #[must_use]
    #[inline]
    pub fn get(&self, id: u16) -> Option<&str> {
        self.0
            .iter()
            .find(|option| option.id == id)
            .map(|option| option.value.as_str())
    }

    /// Returns an iterator over the options.
    #[inline]
    pub fn iter(&self) -> core::slice::Iter<'_, HeaderOption> {
        self.0.iter()
    }
}

impl TryFrom<Vec<HeaderOption>> for HeaderOptions {
    type Error = Error;

    fn try_from(options: Vec<HeaderOption>) -> Result<Self> {
        check_options(&options)?;
        Ok(Self(options))
    }
}

/// Assembles the given options into [`HeaderOptions`], preserving their
/// order.
///
/// # Errors
///
/// An [`Status::InvalidParam`] error is returned when there are more than
/// [`MAX_HEADER_OPTIONS`] options, or when an option has an identifier
/// outside the vendor range or a value which is too long.
pub fn assemble_header_options(options: &[HeaderOption]) -> Result<HeaderOptions> {
    check_options(options)?;
    Ok(HeaderOptions(options.to_vec()))
}

fn check_options(options: &[HeaderOption]) -> Result<()> {
    if options.len() > MAX_HEADER_OPTIONS {
        return Err(Error::new(
            Status::InvalidParam,
            format!(
                "{} header options have been given, the maximum is {MAX_HEADER_OPTIONS}",
                options.len()
            ),
        ));
    }

    options.iter().try_for_each(HeaderOption::validate)
}
