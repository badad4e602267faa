//! relaygate core: transport-agnostic protocol primitives and error types.
//!
//! This crate defines the wire-level contract (categories, message model,
//! resumable decoder, symmetric encoder) and the error surface shared by the
//! gateway and its tests. It carries no transport or async runtime
//! dependencies so it can be embedded behind any byte source.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! Malformed input surfaces as `RelayError` or as a discard sentinel, never as
//! a crash.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod protocol;

/// Shared result type.
pub use error::{ErrorKind, RelayError, Result};
