//! Events exchanged with the transport collaborator and the failure channel.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::block::BlockHeight;
use crate::identifiers::ChainId;

/// How a block was delivered to the synchronizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockSource {
    /// Delivered in real time by the transport, not in response to a
    /// request. May arrive out of order and is buffered when ahead of the
    /// local chain.
    Push,
    /// Fed back by the transport in response to a [`SubchainRequest`].
    /// Never buffered; applied only when it is the next expected block (or
    /// before the call exists, on the membership chain).
    PollReply,
}

impl BlockSource {
    /// Whether this is a real-time push delivery.
    pub fn is_push(self) -> bool {
        matches!(self, BlockSource::Push)
    }
}

/// Request for the transport to fetch blocks of one chain, starting at the
/// given height, feed each back as a [`BlockSource::PollReply`], and then
/// report completion exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubchainRequest {
    /// The chain to fetch.
    pub chain: ChainId,
    /// First height the local side is missing.
    pub from_height: BlockHeight,
}

/// Terminal reason a call stopped trusting further input.
///
/// Sticky: once set, no block is applied on either chain again. Engine error
/// causes are deliberately not distinguished here; they are logged at the
/// point of failure instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum CallFailure {
    /// An engine operation on a chain block failed.
    #[error("call failed for an unknown reason")]
    Unknown,
}
