//! Deterministic test doubles for the Conclave call core.
//!
//! - [`MockEngine`] stands in for the opaque cryptographic engine: it builds
//!   labeled, readable blocks, keeps an ordered log of everything applied,
//!   and lets tests script one-shot failures per operation.
//! - [`ManualScheduler`] records armed timers instead of running them, so
//!   tests decide exactly when each timer elapses.
//!
//! Both are deterministic; a test that drives the controller with them is
//! fully repeatable.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod engine;
mod scheduler;

pub use engine::{MockEngine, MockOp};
pub use scheduler::ManualScheduler;
