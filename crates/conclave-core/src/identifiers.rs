//! Opaque identifiers shared across the call core.
//!
//! All of these are handed out by collaborators (the application assigns
//! `UserId`, the engine assigns key handles, key ids, and call ids); this
//! subsystem only carries them around and compares them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Externally assigned identifier of a call participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "user-{}", self.0)
    }
}

impl From<u64> for UserId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Handle to a private key living inside the engine's key store.
///
/// The key material itself never crosses the engine boundary, and the handle
/// is deliberately not serializable: it is only meaningful for the lifetime
/// of the engine instance that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PrivateKeyHandle(pub u64);

/// Engine-assigned identifier of a public key, used when describing a
/// participant inside a membership block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyId(pub u64);

/// A 256-bit public key, represented as four 64-bit words.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicKey {
    /// The key material, most significant word first.
    pub words: [u64; 4],
}

impl PublicKey {
    /// Big-endian byte representation of the key.
    pub fn to_bytes(&self) -> [u8; 32] {
        let mut bytes = [0u8; 32];
        for (chunk, word) in bytes.chunks_exact_mut(8).zip(self.words) {
            chunk.copy_from_slice(&word.to_be_bytes());
        }
        bytes
    }

    /// Reconstructs a key from its big-endian byte representation.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        let mut words = [0u64; 4];
        for (word, chunk) in words.iter_mut().zip(bytes.chunks_exact(8)) {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(chunk);
            *word = u64::from_be_bytes(buf);
        }
        Self { words }
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.to_bytes()))
    }
}

/// Engine-assigned handle of an established call.
///
/// Absent until the first membership block has been turned into call state;
/// the session chain stays gated until then.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallId(pub u64);

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "call-{}", self.0)
    }
}

/// One of the two independent, height-ordered block chains of a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChainId {
    /// Chain 0: membership transitions (joins, removals, permissions).
    Membership,
    /// Chain 1: ephemeral call-key material. Gated on the call existing.
    Session,
}

/// Number of chains a call carries.
pub const CHAIN_COUNT: usize = 2;

impl ChainId {
    /// Both chains, in index order.
    pub const ALL: [ChainId; CHAIN_COUNT] = [ChainId::Membership, ChainId::Session];

    /// The wire-level chain index (0 or 1).
    pub fn index(self) -> usize {
        match self {
            ChainId::Membership => 0,
            ChainId::Session => 1,
        }
    }

    /// Maps a wire-level chain index back to a chain, rejecting out-of-range
    /// values from the transport.
    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(ChainId::Membership),
            1 => Some(ChainId::Session),
            _ => None,
        }
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainId::Membership => write!(f, "membership"),
            ChainId::Session => write!(f, "session"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_key_bytes_round_trip() {
        let key = PublicKey {
            words: [1, 2, u64::MAX, 0xdead_beef],
        };
        assert_eq!(PublicKey::from_bytes(key.to_bytes()), key);
    }

    #[test]
    fn chain_index_mapping() {
        for chain in ChainId::ALL {
            assert_eq!(ChainId::from_index(chain.index()), Some(chain));
        }
        assert_eq!(ChainId::from_index(2), None);
    }
}
