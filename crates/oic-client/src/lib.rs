//! `oic-client` is the engine an application uses to discover, read,
//! write, and observe resources hosted by networked devices.
//!
//! A [`Platform`](platform::Platform) owns the underlying protocol stack,
//! abstracted by the [`Stack`](stack::Stack) trait. One or more
//! [`Client`](client::Client)s share the stack through the platform, and each
//! of them runs a background listener thread which drives the stack and
//! invokes the application callbacks.
//!
//! The engine offers:
//!
//! - resource discovery, filtered by host and resource type
//! - `GET`, `PUT`, `POST`, and `DELETE` requests, answered by exactly one
//!   callback invocation
//! - observations, delivering notifications in sequence order until they
//!   are cancelled
//! - presence subscriptions, reporting the liveness of a host
//!
//! Once an observation or a presence subscription has been cancelled, its
//! callback is guaranteed to never run again. Dropping a client cancels
//! everything it registered and waits for its listener thread to exit.
//!
//! The [`channel`] module turns callbacks into channels, either blocking or
//! asynchronous.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

/// Callback adapters delivering results through channels.
pub mod channel;
/// The client and its lifecycle.
pub mod client;
/// Client configuration.
pub mod config;
/// Error management.
pub mod error;
/// Resource observations.
pub mod observe;
/// The owner of the protocol stack.
pub mod platform;
/// Presence subscriptions.
pub mod presence;
/// Discovered resources bound to a client.
pub mod remote;
/// `REST` requests and their responses.
pub mod request;
/// The boundary towards the protocol stack.
pub mod stack;

mod discovery;
mod listener;
mod registry;
mod session;
