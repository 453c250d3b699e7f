//! `oic` is a library describing the data exchanged between a resource
//! client and the devices hosting its resources.
//!
//! A resource is an addressable and typed entity, identified by a host and
//! a path, which exposes a [`Representation`](representation::Representation)
//! and a set of operations on it: reading, writing, creating, deleting, and
//! observing.
//!
//! This crate contains only pure data and pure functions:
//!
//! - the status taxonomy shared by every operation
//! - resource handles and descriptors, together with the parser turning a
//!   discovery document into a descriptor
//! - the assemblers turning query parameters, header options, and
//!   representations into wire-ready values
//!
//! It does not send anything over a network. The engine driving the
//! underlying protocol stack lives in the `oic-client` crate.
//!
//! This crate is `no_std` and only requires an allocator.

#![no_std]
#![deny(unsafe_code)]
#![deny(missing_docs)]

extern crate alloc;

/// Transport families used to reach a resource.
pub mod connectivity;
/// Error management.
pub mod error;
/// Header options attached to a request.
pub mod header;
/// Query parameters and the URI assembler.
pub mod query;
/// Resource representations and their wire payload.
pub mod representation;
/// Resource handles, descriptors, and the discovery document parser.
pub mod resource;
/// The kinds of `REST` requests.
pub mod rest;
/// Status codes reported by every operation.
pub mod status;

mod macros;

#[cfg(test)]
pub(crate) fn serialize<T: serde::Serialize>(value: T) -> serde_json::Value {
    serde_json::to_value(value).unwrap()
}

#[cfg(test)]
pub(crate) fn deserialize<T: serde::de::DeserializeOwned>(value: serde_json::Value) -> T {
    serde_json::from_value(value).unwrap()
}
