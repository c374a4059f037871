//! Local call identity bootstrap.

use conclave_core::{CallEngine, EngineError, KeyId, PrivateKeyHandle, PublicKey};

/// The ephemeral keypair a participant uses for one call.
///
/// Generated once when the call object is constructed and immutable from
/// then on. The private key stays inside the engine's key store; only the
/// handle is held here, and it is never serialized.
#[derive(Debug, Clone)]
pub struct CallIdentity {
    private_key: PrivateKeyHandle,
    public_key: PublicKey,
    key_id: KeyId,
}

impl CallIdentity {
    /// Asks the engine for a temporary private key and derives the public
    /// key and its engine-side id from it.
    ///
    /// An engine error here is fatal to creating the call object and is
    /// returned to the caller directly rather than through the call failure
    /// channel.
    pub fn generate(engine: &dyn CallEngine) -> Result<Self, EngineError> {
        let private_key = engine.generate_temporary_key()?;
        let public_key = engine.public_key_of(private_key)?;
        let key_id = engine.key_id_from_public_key(&public_key)?;
        Ok(Self {
            private_key,
            public_key,
            key_id,
        })
    }

    /// Handle of the ephemeral private key.
    pub fn private_key(&self) -> PrivateKeyHandle {
        self.private_key
    }

    /// The derived public key.
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Engine-side id of the public key, as referenced from membership
    /// blocks.
    pub fn key_id(&self) -> KeyId {
        self.key_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conclave_testkit::{MockEngine, MockOp};

    #[test]
    fn generates_a_consistent_identity() {
        let engine = MockEngine::new();
        let identity = CallIdentity::generate(&engine).unwrap();
        let expected = engine.public_key_of(identity.private_key()).unwrap();
        assert_eq!(identity.public_key(), &expected);
        assert_eq!(
            identity.key_id(),
            engine.key_id_from_public_key(&expected).unwrap()
        );
    }

    #[test]
    fn any_bootstrap_step_failing_is_fatal() {
        for op in [MockOp::GenerateKey, MockOp::PublicKey, MockOp::KeyId] {
            let engine = MockEngine::new();
            engine.fail_once(op);
            assert!(CallIdentity::generate(&engine).is_err(), "{op:?}");
        }
    }
}
