//! Shared vocabulary for the Conclave group-call synchronization core.
//!
//! Every participant in an end-to-end encrypted group call keeps an identical
//! ratchet state derived from two height-ordered chains of opaque blocks: the
//! membership chain (who may join and with what permissions) and the session
//! chain (ephemeral call-key material). This crate defines the types those
//! chains are described with, the boundary trait of the opaque cryptographic
//! engine that validates and applies blocks, and the timer abstraction the
//! synchronization state machine is driven by.
//!
//! The state machine itself lives in `conclave-call`; deterministic test
//! doubles for the engine and the scheduler live in `conclave-testkit`.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod block;
pub mod engine;
pub mod error;
pub mod events;
pub mod identifiers;
pub mod scheduler;

pub use block::{Block, BlockHeight, ParticipantDescriptor, Permissions, VerificationHash};
pub use engine::{CallEngine, EngineError};
pub use error::CallError;
pub use events::{BlockSource, CallFailure, SubchainRequest};
pub use identifiers::{CallId, ChainId, KeyId, PrivateKeyHandle, PublicKey, UserId};
pub use scheduler::{TimerHandle, TimerKind, TimerScheduler, TimerToken, TokioScheduler};
