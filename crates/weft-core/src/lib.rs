#![forbid(unsafe_code)]

//! Composable Elm-style programs: pure state transitions with effects pushed
//! to the edges.
//!
//! A program bundles an initial `(model, effect)` pair, a pure reducer, a
//! render function, and an optional teardown. Everything else in this crate
//! is machinery for combining and hosting such programs:
//!
//! - [`Effect`] — deferred side effects; mapped with [`Effect::map`],
//!   combined with [`Effect::batch`].
//! - [`Program`] — the state-machine value, plus type erasure
//!   ([`Program::erased`]) for heterogeneous hosts.
//! - [`with_subscriptions`] — declarative long-lived effect sources,
//!   diffed against the running set after every state change.
//! - [`batch_programs`] — N independent programs behind one facade,
//!   addressed by position, with lazy child views.
//! - [`Simulator`] — a headless, deterministic driver with an explicit
//!   message queue, used by every behavioral test in this workspace.
//!
//! # Execution model
//!
//! Single-threaded and cooperative: no locks, no parallelism. Effects are
//! opaque procedures that may report messages synchronously or later from an
//! external completion source; the reporting callback ([`Dispatch`]) is
//! shared and clonable so it can outlive the effect invocation. Model values
//! are immutable snapshots — reducers take `&Model` and return a fresh one.
//!
//! The driver that loops "apply reducer → run effects → render" lives
//! outside this crate; [`Simulator`] plays that role for tests.

pub mod compose;
pub mod effect;
pub mod program;
pub mod simulator;
pub mod subscription;

pub use compose::{IndexedMsg, ViewThunk, batch_programs};
pub use effect::{Dispatch, Effect};
pub use program::{
    Change, DoneFn, DynMsg, DynProgram, Program, SharedModel, UpdateFn, ViewFn,
};
pub use simulator::Simulator;
pub use subscription::{
    CancelMap, Disposer, SharedDisposer, SubMap, Subscription, reconcile, with_subscriptions,
};
