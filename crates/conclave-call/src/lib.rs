//! Per-call block-chain synchronization for end-to-end encrypted group calls.
//!
//! Every participant must hold an identical ratchet state derived from two
//! independent, height-ordered chains of opaque, engine-validated blocks:
//! the membership chain (chain 0) and the session-key chain (chain 1). The
//! network reorders, duplicates, and drops blocks; this crate keeps the
//! local view of both chains monotonically and eventually synchronized
//! without blocking, without applying a block twice, and with a sticky
//! terminal failure the moment any transition is rejected by the engine.
//!
//! The public surface is [`CallController`]:
//!
//! - construction bootstraps an ephemeral call identity from the engine
//!   (fatal on error, surfaced synchronously);
//! - [`CallController::make_join_block`] builds the block a participant
//!   sends to join (a zero block for the first participant, otherwise a
//!   self-add block extending the latest observed membership block);
//! - [`CallController::handle_block`] routes incoming blocks into the
//!   per-chain synchronizer, which buffers out-of-order deliveries and
//!   applies blocks to the engine in strictly ascending height order;
//! - missing predecessors are requested from the transport through the
//!   [`SubchainRequest`](conclave_core::SubchainRequest) stream, re-polled
//!   on a timer for as long as the gap persists;
//! - [`CallController::encrypt`] / [`CallController::decrypt`] serve payload
//!   cryptography from the engine once the call exists.
//!
//! The whole subsystem is single-threaded and timer-driven: the embedder
//! owns the controller, feeds it transport events, and forwards elapsed
//! timer tokens from the configured scheduler. No operation blocks.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod chain;
pub mod config;
pub mod controller;
pub mod factory;
pub mod identity;

pub use chain::ChainStats;
pub use config::SyncConfig;
pub use controller::CallController;
pub use factory::BlockFactory;
pub use identity::CallIdentity;
