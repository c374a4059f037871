//! Boundary trait of the opaque cryptographic engine.
//!
//! The engine validates signatures, advances the ratchet, and performs all
//! payload cryptography. It is called synchronously and treated as fallible
//! everywhere; the call core never inspects why an operation failed beyond
//! logging the code and message.

use thiserror::Error;

use crate::block::{Block, ParticipantDescriptor, VerificationHash};
use crate::identifiers::{CallId, KeyId, PrivateKeyHandle, PublicKey, UserId};

/// Error surfaced by any engine operation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("engine error {code}: {message}")]
pub struct EngineError {
    /// Engine-defined error code.
    pub code: i64,
    /// Human-readable description, for logging only.
    pub message: String,
}

impl EngineError {
    /// Creates an engine error from a code and message.
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// The opaque cryptographic core that validates and applies blocks and
/// performs payload encryption/decryption.
///
/// Implementations wrap the vendor library; the test double lives in
/// `conclave-testkit`.
pub trait CallEngine: Send + Sync {
    /// Generates an ephemeral private key in the engine's key store and
    /// returns a handle to it.
    fn generate_temporary_key(&self) -> Result<PrivateKeyHandle, EngineError>;

    /// Derives the public key belonging to a private key handle.
    fn public_key_of(&self, key: PrivateKeyHandle) -> Result<PublicKey, EngineError>;

    /// Resolves the engine-side identifier of a public key, as referenced
    /// from participant descriptors.
    fn key_id_from_public_key(&self, key: &PublicKey) -> Result<KeyId, EngineError>;

    /// Builds the first block of a membership chain, height 0, carrying the
    /// given initial participants.
    fn create_zero_block(
        &self,
        key: PrivateKeyHandle,
        participants: &[ParticipantDescriptor],
    ) -> Result<Block, EngineError>;

    /// Builds a membership block extending `prior` that appends one
    /// participant.
    fn create_self_add_block(
        &self,
        key: PrivateKeyHandle,
        prior: &Block,
        participant: &ParticipantDescriptor,
    ) -> Result<Block, EngineError>;

    /// Builds a membership block extending `prior` that removes the given
    /// participants.
    fn create_remove_block(
        &self,
        key: PrivateKeyHandle,
        prior: &Block,
        users: &[UserId],
    ) -> Result<Block, EngineError>;

    /// Turns the first observed membership block into call state and returns
    /// the handle of the new call.
    fn create_call(
        &self,
        key: PrivateKeyHandle,
        first_membership_block: &Block,
    ) -> Result<CallId, EngineError>;

    /// Applies one block to an existing call, advancing the ratchet.
    fn apply_block(&self, call: CallId, block: &Block) -> Result<(), EngineError>;

    /// Encrypts an outgoing payload with the current call keys.
    fn encrypt(&self, call: CallId, plaintext: &[u8]) -> Result<Vec<u8>, EngineError>;

    /// Decrypts an incoming payload with the current call keys.
    fn decrypt(&self, call: CallId, ciphertext: &[u8]) -> Result<Vec<u8>, EngineError>;

    /// Fingerprint of the current call state, for out-of-band comparison
    /// between participants.
    fn verification_hash(&self, call: CallId) -> Result<VerificationHash, EngineError>;

    /// The users granted access by the applied membership chain, in chain
    /// order.
    fn participants(&self, call: CallId) -> Result<Vec<UserId>, EngineError>;
}
