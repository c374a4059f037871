//! Scripted in-memory stand-in for the cryptographic engine.

use std::collections::HashSet;

use conclave_core::{
    Block, CallEngine, CallId, EngineError, KeyId, ParticipantDescriptor, PrivateKeyHandle,
    PublicKey, UserId, VerificationHash,
};
use parking_lot::Mutex;

/// Engine operations a test can script to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum MockOp {
    GenerateKey,
    PublicKey,
    KeyId,
    ZeroBlock,
    SelfAddBlock,
    RemoveBlock,
    CreateCall,
    ApplyBlock,
    Encrypt,
    Decrypt,
    VerificationHash,
    Participants,
}

#[derive(Default)]
struct MockState {
    next_key_handle: u64,
    next_call_id: u64,
    fail_once: HashSet<MockOp>,
    applied: Vec<Block>,
    calls_created: usize,
    members: Vec<UserId>,
}

impl MockState {
    /// Replays a labeled membership block onto the member list. Blocks
    /// without a recognized label (session material in tests) leave it
    /// untouched.
    fn note_membership(&mut self, block: &Block) {
        let Ok(text) = std::str::from_utf8(block.as_bytes()) else {
            return;
        };
        let csv_users = |field: &str| {
            field
                .split(',')
                .filter_map(|u| u.parse::<u64>().ok())
                .map(UserId)
                .collect::<Vec<_>>()
        };
        if let Some(rest) = text.strip_prefix("zero:") {
            self.members = csv_users(rest.split(':').next().unwrap_or(rest));
        } else if let Some(rest) = text.strip_prefix("add:") {
            for user in csv_users(rest.split(':').next().unwrap_or(rest)) {
                if !self.members.contains(&user) {
                    self.members.push(user);
                }
            }
        } else if let Some(rest) = text.strip_prefix("remove:") {
            let removed = csv_users(rest.split(':').next().unwrap_or(rest));
            self.members.retain(|user| !removed.contains(user));
        }
    }
}

/// Deterministic [`CallEngine`] double.
///
/// Blocks it builds carry readable labels (`zero:…`, `add:…`, `remove:…`) so
/// tests can assert on what was constructed without a wire format. The
/// applied-block log records, in order, every block handed to `create_call`
/// or `apply_block`.
#[derive(Default)]
pub struct MockEngine {
    state: Mutex<MockState>,
}

impl MockEngine {
    /// Creates an engine with empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next invocation of `op` fail with a scripted engine error.
    pub fn fail_once(&self, op: MockOp) {
        self.state.lock().fail_once.insert(op);
    }

    /// Ordered log of every block applied through `create_call` or
    /// `apply_block`.
    pub fn applied_blocks(&self) -> Vec<Block> {
        self.state.lock().applied.clone()
    }

    /// How many calls `create_call` established.
    pub fn calls_created(&self) -> usize {
        self.state.lock().calls_created
    }

    fn check(&self, op: MockOp) -> Result<(), EngineError> {
        if self.state.lock().fail_once.remove(&op) {
            return Err(EngineError::new(-1, format!("scripted failure of {op:?}")));
        }
        Ok(())
    }
}

fn labeled(label: &str, parts: &[&[u8]]) -> Block {
    let mut bytes = label.as_bytes().to_vec();
    for part in parts {
        bytes.push(b':');
        bytes.extend_from_slice(part);
    }
    Block::new(bytes)
}

impl CallEngine for MockEngine {
    fn generate_temporary_key(&self) -> Result<PrivateKeyHandle, EngineError> {
        self.check(MockOp::GenerateKey)?;
        let mut state = self.state.lock();
        state.next_key_handle += 1;
        Ok(PrivateKeyHandle(state.next_key_handle))
    }

    fn public_key_of(&self, key: PrivateKeyHandle) -> Result<PublicKey, EngineError> {
        self.check(MockOp::PublicKey)?;
        Ok(PublicKey {
            words: [key.0, !key.0, key.0.rotate_left(16), key.0.wrapping_mul(31)],
        })
    }

    fn key_id_from_public_key(&self, key: &PublicKey) -> Result<KeyId, EngineError> {
        self.check(MockOp::KeyId)?;
        Ok(KeyId(key.words[0]))
    }

    fn create_zero_block(
        &self,
        _key: PrivateKeyHandle,
        participants: &[ParticipantDescriptor],
    ) -> Result<Block, EngineError> {
        self.check(MockOp::ZeroBlock)?;
        let users = participants
            .iter()
            .map(|p| p.user_id.0.to_string())
            .collect::<Vec<_>>()
            .join(",");
        Ok(labeled("zero", &[users.as_bytes()]))
    }

    fn create_self_add_block(
        &self,
        _key: PrivateKeyHandle,
        prior: &Block,
        participant: &ParticipantDescriptor,
    ) -> Result<Block, EngineError> {
        self.check(MockOp::SelfAddBlock)?;
        let user = participant.user_id.0.to_string();
        Ok(labeled("add", &[user.as_bytes(), prior.as_bytes()]))
    }

    fn create_remove_block(
        &self,
        _key: PrivateKeyHandle,
        prior: &Block,
        users: &[UserId],
    ) -> Result<Block, EngineError> {
        self.check(MockOp::RemoveBlock)?;
        let users = users
            .iter()
            .map(|u| u.0.to_string())
            .collect::<Vec<_>>()
            .join(",");
        Ok(labeled("remove", &[users.as_bytes(), prior.as_bytes()]))
    }

    fn create_call(
        &self,
        _key: PrivateKeyHandle,
        first_membership_block: &Block,
    ) -> Result<CallId, EngineError> {
        self.check(MockOp::CreateCall)?;
        let mut state = self.state.lock();
        state.next_call_id += 1;
        state.calls_created += 1;
        state.applied.push(first_membership_block.clone());
        state.note_membership(first_membership_block);
        Ok(CallId(state.next_call_id))
    }

    fn apply_block(&self, _call: CallId, block: &Block) -> Result<(), EngineError> {
        self.check(MockOp::ApplyBlock)?;
        let mut state = self.state.lock();
        state.applied.push(block.clone());
        state.note_membership(block);
        Ok(())
    }

    fn encrypt(&self, _call: CallId, plaintext: &[u8]) -> Result<Vec<u8>, EngineError> {
        self.check(MockOp::Encrypt)?;
        let mut out = vec![0x01];
        out.extend_from_slice(plaintext);
        Ok(out)
    }

    fn decrypt(&self, _call: CallId, ciphertext: &[u8]) -> Result<Vec<u8>, EngineError> {
        self.check(MockOp::Decrypt)?;
        match ciphertext.split_first() {
            Some((0x01, rest)) => Ok(rest.to_vec()),
            _ => Err(EngineError::new(-2, "malformed mock ciphertext")),
        }
    }

    fn verification_hash(&self, _call: CallId) -> Result<VerificationHash, EngineError> {
        self.check(MockOp::VerificationHash)?;
        let applied = self.state.lock().applied.len();
        Ok(VerificationHash(format!("hash:{applied}").into_bytes()))
    }

    fn participants(&self, _call: CallId) -> Result<Vec<UserId>, EngineError> {
        self.check(MockOp::Participants)?;
        Ok(self.state.lock().members.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_failures_fire_once() {
        let engine = MockEngine::new();
        engine.fail_once(MockOp::GenerateKey);
        assert!(engine.generate_temporary_key().is_err());
        assert!(engine.generate_temporary_key().is_ok());
    }

    #[test]
    fn membership_labels_drive_the_member_list() {
        let engine = MockEngine::new();
        let zero = labeled("zero", &[b"1,2"]);
        let call = engine.create_call(PrivateKeyHandle(1), &zero).unwrap();
        assert_eq!(
            engine.participants(call).unwrap(),
            vec![UserId(1), UserId(2)]
        );
        engine
            .apply_block(call, &labeled("add", &[b"3", zero.as_bytes()]))
            .unwrap();
        engine
            .apply_block(call, &labeled("remove", &[b"1", zero.as_bytes()]))
            .unwrap();
        assert_eq!(
            engine.participants(call).unwrap(),
            vec![UserId(2), UserId(3)]
        );
    }

    #[test]
    fn payload_round_trip() {
        let engine = MockEngine::new();
        let call = CallId(1);
        let sealed = engine.encrypt(call, b"hello").unwrap();
        assert_eq!(engine.decrypt(call, &sealed).unwrap(), b"hello");
        assert!(engine.decrypt(call, b"garbage").is_err());
    }
}
