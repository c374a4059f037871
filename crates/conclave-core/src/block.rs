//! Blocks and the participant descriptors they are built from.

use std::fmt;
use std::ops::BitOr;

use serde::{Deserialize, Serialize};

use crate::identifiers::{KeyId, UserId};

/// Position of a block within its chain, starting at 0.
///
/// A chain's own height is the count of blocks applied so far, which is also
/// the height the next expected block carries.
pub type BlockHeight = u64;

/// An opaque, engine-validated unit of state transition.
///
/// The byte contents are meaningless to this subsystem; height and chain
/// metadata travel alongside the block, not inside it.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block(Vec<u8>);

impl Block {
    /// Wraps raw block bytes received from the engine or the transport.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// The raw bytes, for handing to the engine or the transport.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Length of the raw bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the block carries no bytes at all.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let preview = hex::encode(&self.0[..self.0.len().min(8)]);
        write!(f, "Block({} bytes, {preview}…)", self.0.len())
    }
}

impl From<Vec<u8>> for Block {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

/// Permission bitmask attached to a participant in a membership block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Permissions(u8);

impl Permissions {
    /// May append blocks that add participants.
    pub const ADD: Permissions = Permissions(1 << 0);
    /// May append blocks that remove participants.
    pub const REMOVE: Permissions = Permissions(1 << 1);

    /// No permissions.
    pub const fn empty() -> Self {
        Permissions(0)
    }

    /// Whether the bitmask contains every bit of `other`.
    pub fn contains(self, other: Permissions) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for Permissions {
    type Output = Permissions;

    fn bitor(self, rhs: Permissions) -> Permissions {
        Permissions(self.0 | rhs.0)
    }
}

/// Description of one participant, as input to membership block construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantDescriptor {
    /// The participant's externally assigned identifier.
    pub user_id: UserId,
    /// Engine-side reference to the participant's public key.
    pub key_id: KeyId,
    /// What the participant may do to the membership chain.
    pub permissions: Permissions,
}

/// Engine-computed fingerprint of the current call state, recomputed after
/// every applied block. Participants compare it out of band.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationHash(pub Vec<u8>);

impl fmt::Display for VerificationHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permissions_combine_and_query() {
        let both = Permissions::ADD | Permissions::REMOVE;
        assert!(both.contains(Permissions::ADD));
        assert!(both.contains(Permissions::REMOVE));
        assert!(!Permissions::ADD.contains(Permissions::REMOVE));
        assert!(both.contains(Permissions::empty()));
    }

    #[test]
    fn block_debug_is_bounded() {
        let block = Block::new(vec![0xab; 1024]);
        let rendered = format!("{block:?}");
        assert!(rendered.contains("1024 bytes"));
        assert!(rendered.len() < 64);
    }
}
