//! Caller-facing error type for call-core operations.

use thiserror::Error;

use crate::engine::EngineError;
use crate::events::CallFailure;

/// Error returned by operations on a call object.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CallError {
    /// The call has permanently failed; no further mutation is possible.
    #[error("call already failed: {0}")]
    Failed(CallFailure),

    /// A block could not be built because no membership block has been
    /// observed yet.
    #[error("no membership block observed yet")]
    NoMembershipBlock,

    /// An engine operation failed while building a block.
    #[error(transparent)]
    Engine(#[from] EngineError),
}
