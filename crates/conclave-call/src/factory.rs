//! Construction of outbound membership blocks.

use conclave_core::{
    Block, CallEngine, CallError, EngineError, ParticipantDescriptor, Permissions, UserId,
};

use crate::identity::CallIdentity;

/// Builds the membership blocks this participant sends: the join block and,
/// with sufficient permissions, removal blocks.
///
/// The factory is pure with respect to chain state: it only reads the
/// cached "last known membership block" its caller passes in, which may be
/// ahead of what has been applied locally.
#[derive(Debug, Clone)]
pub struct BlockFactory {
    user_id: UserId,
}

impl BlockFactory {
    /// A factory building blocks on behalf of `user_id`.
    pub fn new(user_id: UserId) -> Self {
        Self { user_id }
    }

    /// The local participant's id.
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    fn self_descriptor(&self, identity: &CallIdentity) -> ParticipantDescriptor {
        ParticipantDescriptor {
            user_id: self.user_id,
            key_id: identity.key_id(),
            permissions: Permissions::ADD | Permissions::REMOVE,
        }
    }

    /// Builds the block a participant sends to join.
    ///
    /// With no membership block observed yet this is a zero block at height
    /// 0 whose only participant is the local user, with add and remove
    /// permission. Otherwise it is a self-add block extending
    /// `last_membership`.
    pub fn make_join_block(
        &self,
        engine: &dyn CallEngine,
        identity: &CallIdentity,
        last_membership: Option<&Block>,
    ) -> Result<Block, EngineError> {
        let descriptor = self.self_descriptor(identity);
        match last_membership {
            None => engine.create_zero_block(identity.private_key(), &[descriptor]),
            Some(prior) => engine.create_self_add_block(identity.private_key(), prior, &descriptor),
        }
    }

    /// Builds a block removing the given participants, extending the latest
    /// known membership block. There is nothing to remove anyone from until
    /// a membership block has been observed.
    pub fn make_remove_block(
        &self,
        engine: &dyn CallEngine,
        identity: &CallIdentity,
        last_membership: Option<&Block>,
        users: &[UserId],
    ) -> Result<Block, CallError> {
        let prior = last_membership.ok_or(CallError::NoMembershipBlock)?;
        Ok(engine.create_remove_block(identity.private_key(), prior, users)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use conclave_testkit::MockEngine;

    fn setup() -> (MockEngine, CallIdentity, BlockFactory) {
        let engine = MockEngine::new();
        let identity = CallIdentity::generate(&engine).unwrap();
        (engine, identity, BlockFactory::new(UserId(42)))
    }

    #[test]
    fn first_participant_builds_a_zero_block() {
        let (engine, identity, factory) = setup();
        let block = factory.make_join_block(&engine, &identity, None).unwrap();
        assert!(block.as_bytes().starts_with(b"zero:42"));
    }

    #[test]
    fn later_participants_extend_the_known_tip() {
        let (engine, identity, factory) = setup();
        let tip = Block::new(b"tip".to_vec());
        let block = factory
            .make_join_block(&engine, &identity, Some(&tip))
            .unwrap();
        assert!(block.as_bytes().starts_with(b"add:42"));
        assert!(block.as_bytes().ends_with(b"tip"));
    }

    #[test]
    fn removal_needs_an_observed_membership_block() {
        let (engine, identity, factory) = setup();
        let err = factory
            .make_remove_block(&engine, &identity, None, &[UserId(7)])
            .unwrap_err();
        assert_matches!(err, CallError::NoMembershipBlock);

        let tip = Block::new(b"tip".to_vec());
        let block = factory
            .make_remove_block(&engine, &identity, Some(&tip), &[UserId(7)])
            .unwrap();
        assert!(block.as_bytes().starts_with(b"remove:7"));
    }
}
