#![forbid(unsafe_code)]

//! Routing host for `weft` programs.
//!
//! Turns a stream of route values into a single long-lived [`Program`] that
//! mounts, replaces, and tears down sub-programs as the route changes:
//!
//! - [`routed_program`] — the host itself, configured via [`RoutedConfig`].
//! - [`RouteProgram`] — per-route classification: mount now, load
//!   asynchronously, or continue an existing keyed mount.
//! - [`ControlledRouter`] — a replay-one broadcast source, used both as a
//!   test double for the upstream route source and as the delivery channel
//!   for keyed continuations.
//! - [`LoadError`] — recoverable failure of an asynchronous program load.
//!
//! [`Program`]: weft_core::Program

pub mod error;
pub mod host;
pub mod router;

pub use error::LoadError;
pub use host::{
    PendingProgram, RouteFrame, RouteModel, RouteMsg, RouteProgram, RoutedConfig, routed_program,
};
pub use router::{ControlledRouter, RouteSource, RouterHandle};
