//! The public facade of the call core.
//!
//! `CallController` owns the call identity, the block factory, and one
//! synchronizer per chain. The embedder drives it from a single thread:
//! transport deliveries go to [`CallController::handle_block`] /
//! [`CallController::blocks_request_finished`], elapsed timer tokens to
//! [`CallController::timer_fired`]. Every entry point runs to completion
//! before the next; that serialization is what makes the height-ordering
//! invariant safe without locks.

use std::sync::Arc;

use conclave_core::{
    Block, BlockHeight, BlockSource, CallEngine, CallError, CallFailure, CallId, ChainId,
    EngineError, PublicKey, SubchainRequest, TimerHandle, TimerKind, TimerScheduler, TimerToken,
    UserId, VerificationHash,
};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::chain::{ChainStats, ChainSynchronizer};
use crate::config::SyncConfig;
use crate::factory::BlockFactory;
use crate::identity::CallIdentity;

/// State the chain synchronizers share: the engine, the call handle, the
/// cached membership tip, and the outbound notification channels.
///
/// Split out of [`CallController`] so a synchronizer can be borrowed
/// mutably alongside it.
pub(crate) struct CallShared {
    engine: Arc<dyn CallEngine>,
    scheduler: Arc<dyn TimerScheduler>,
    config: SyncConfig,
    identity: CallIdentity,
    call_id: Option<CallId>,
    last_membership_block: Option<(BlockHeight, Block)>,
    failure_tx: watch::Sender<Option<CallFailure>>,
    hash_tx: watch::Sender<Option<VerificationHash>>,
    participants_tx: watch::Sender<Vec<UserId>>,
    requests_tx: mpsc::UnboundedSender<SubchainRequest>,
}

impl CallShared {
    pub(crate) fn failed(&self) -> bool {
        self.failure_tx.borrow().is_some()
    }

    fn failure(&self) -> Option<CallFailure> {
        *self.failure_tx.borrow()
    }

    pub(crate) fn call_id(&self) -> Option<CallId> {
        self.call_id
    }

    /// Transitions to the terminal failed state. Idempotent; the first
    /// transition is the only one observers see.
    fn fail(&mut self, reason: CallFailure) {
        if self.failed() {
            return;
        }
        error!(%reason, "call entered terminal failed state");
        self.failure_tx.send_replace(Some(reason));
    }

    /// Refreshes the cached "last known membership block" used for building
    /// join blocks. Runs for every observed membership block, applied or
    /// not, so the cache can run ahead of the locally applied height.
    pub(crate) fn note_membership_block(&mut self, height: BlockHeight, block: &Block) {
        let stale = matches!(&self.last_membership_block, Some((cached, _)) if height < *cached);
        if !stale {
            self.last_membership_block = Some((height, block.clone()));
        }
    }

    /// Hands one block to the engine, establishing the call from the first
    /// membership block. An engine error here is the terminal call failure.
    pub(crate) fn apply_to_engine(
        &mut self,
        chain: ChainId,
        block: &Block,
    ) -> Result<(), CallFailure> {
        let result = match self.call_id {
            None => self
                .engine
                .create_call(self.identity.private_key(), block)
                .map(|id| {
                    info!(%chain, call = %id, "call established from first membership block");
                    self.call_id = Some(id);
                }),
            Some(id) => self.engine.apply_block(id, block),
        };
        match result {
            Ok(()) => {
                self.refresh_verification_hash();
                self.refresh_participants();
                Ok(())
            }
            Err(EngineError { code, message }) => {
                warn!(%chain, code, %message, "engine rejected block");
                self.fail(CallFailure::Unknown);
                Err(CallFailure::Unknown)
            }
        }
    }

    /// Recomputes the state fingerprint after a successful apply. A failed
    /// refresh is not a call failure; the previous hash simply stands.
    fn refresh_verification_hash(&mut self) {
        let Some(id) = self.call_id else { return };
        match self.engine.verification_hash(id) {
            Ok(hash) => {
                self.hash_tx.send_replace(Some(hash));
            }
            Err(error) => {
                debug!(code = error.code, message = %error.message, "verification hash refresh failed");
            }
        }
    }

    /// Recomputes the set of users with access after a successful apply.
    /// Like the hash refresh, a failure here is not a call failure.
    fn refresh_participants(&mut self) {
        let Some(id) = self.call_id else { return };
        match self.engine.participants(id) {
            Ok(users) => {
                self.participants_tx.send_if_modified(|current| {
                    if *current == users {
                        false
                    } else {
                        *current = users;
                        true
                    }
                });
            }
            Err(error) => {
                debug!(code = error.code, message = %error.message, "participant set refresh failed");
            }
        }
    }

    /// Emits a fetch request to the transport collaborator.
    pub(crate) fn request_blocks(&mut self, chain: ChainId, from_height: BlockHeight) {
        debug!(%chain, from_height, "requesting blocks from transport");
        let request = SubchainRequest { chain, from_height };
        if self.requests_tx.send(request).is_err() {
            warn!(%chain, "transport dropped the request stream");
        }
    }

    /// Arms a single-shot timer of the given kind for the given chain.
    pub(crate) fn schedule(&self, chain: ChainId, kind: TimerKind) -> TimerHandle {
        let after = match kind {
            TimerKind::WaitForBlocks => self.config.wait_for_blocks,
            TimerKind::HealthPoll => self.config.health_poll_interval,
        };
        self.scheduler.schedule_once(after, TimerToken { chain, kind })
    }
}

/// One end-to-end encrypted group call, from the local participant's point
/// of view.
pub struct CallController {
    shared: CallShared,
    chains: [ChainSynchronizer; 2],
    factory: BlockFactory,
    requests_rx: Option<mpsc::UnboundedReceiver<SubchainRequest>>,
}

impl CallController {
    /// Creates the call object, generating the ephemeral call identity.
    ///
    /// Identity generation failing means no usable call object exists at
    /// all; the error is returned synchronously and nothing is ever sent on
    /// the failure channel.
    pub fn new(
        user_id: UserId,
        engine: Arc<dyn CallEngine>,
        scheduler: Arc<dyn TimerScheduler>,
        config: SyncConfig,
    ) -> Result<Self, EngineError> {
        let identity = CallIdentity::generate(engine.as_ref())?;
        let (failure_tx, _) = watch::channel(None);
        let (hash_tx, _) = watch::channel(None);
        let (participants_tx, _) = watch::channel(Vec::new());
        let (requests_tx, requests_rx) = mpsc::unbounded_channel();
        Ok(Self {
            shared: CallShared {
                engine,
                scheduler,
                config,
                identity,
                call_id: None,
                last_membership_block: None,
                failure_tx,
                hash_tx,
                participants_tx,
                requests_tx,
            },
            chains: [
                ChainSynchronizer::new(ChainId::Membership),
                ChainSynchronizer::new(ChainId::Session),
            ],
            factory: BlockFactory::new(user_id),
            requests_rx: Some(requests_rx),
        })
    }

    /// Creates the call object with default timer intervals.
    pub fn with_defaults(
        user_id: UserId,
        engine: Arc<dyn CallEngine>,
        scheduler: Arc<dyn TimerScheduler>,
    ) -> Result<Self, EngineError> {
        Self::new(user_id, engine, scheduler, SyncConfig::default())
    }

    /// The local participant's id.
    pub fn user_id(&self) -> UserId {
        self.factory.user_id()
    }

    /// The local ephemeral public key, sent alongside the join block.
    pub fn public_key(&self) -> &PublicKey {
        self.shared.identity.public_key()
    }

    /// Engine handle of the established call, if any.
    pub fn call_id(&self) -> Option<CallId> {
        self.shared.call_id
    }

    /// The terminal failure, if the call has failed.
    pub fn failure(&self) -> Option<CallFailure> {
        self.shared.failure()
    }

    /// Subscription to the terminal failure. A subscriber that arrives
    /// after the failure observes it immediately.
    pub fn failures(&self) -> watch::Receiver<Option<CallFailure>> {
        self.shared.failure_tx.subscribe()
    }

    /// Subscription to the call-state fingerprint, refreshed after every
    /// applied block.
    pub fn verification_hashes(&self) -> watch::Receiver<Option<VerificationHash>> {
        self.shared.hash_tx.subscribe()
    }

    /// Subscription to the set of users with access, recomputed after every
    /// applied block. Observers only see it when it actually changes.
    pub fn participant_sets(&self) -> watch::Receiver<Vec<UserId>> {
        self.shared.participants_tx.subscribe()
    }

    /// The stream of fetch requests for the transport collaborator. Yields
    /// the receiver once; subsequent calls return `None`.
    pub fn take_subchain_requests(&mut self) -> Option<mpsc::UnboundedReceiver<SubchainRequest>> {
        self.requests_rx.take()
    }

    /// Builds the block this participant sends to join; see
    /// [`BlockFactory::make_join_block`]. Errors once the call has failed.
    pub fn make_join_block(&self) -> Result<Block, CallError> {
        if let Some(reason) = self.shared.failure() {
            return Err(CallError::Failed(reason));
        }
        let last = self.last_membership_block();
        Ok(self.factory.make_join_block(
            self.shared.engine.as_ref(),
            &self.shared.identity,
            last,
        )?)
    }

    /// Builds a block removing the given participants; see
    /// [`BlockFactory::make_remove_block`]. Errors once the call has
    /// failed.
    pub fn make_remove_block(&self, users: &[UserId]) -> Result<Block, CallError> {
        if let Some(reason) = self.shared.failure() {
            return Err(CallError::Failed(reason));
        }
        self.factory.make_remove_block(
            self.shared.engine.as_ref(),
            &self.shared.identity,
            self.last_membership_block(),
            users,
        )
    }

    /// Whether a membership block has been observed (not necessarily
    /// applied) so far.
    pub fn has_last_membership_block(&self) -> bool {
        self.shared.last_membership_block.is_some()
    }

    /// Installs (or clears) the cached membership tip without applying it,
    /// for when the caller re-fetched the latest block out of band after a
    /// rejected join.
    pub fn refresh_last_membership_block(&mut self, block: Option<(BlockHeight, Block)>) {
        self.shared.last_membership_block = block;
    }

    /// Called once the server accepted the join: catches both chains up.
    /// The session chain is only polled once the call exists; until then it
    /// stays uninitialized.
    pub fn joined(&mut self) {
        self.chains[ChainId::Membership.index()].short_poll(&mut self.shared);
        if self.shared.call_id.is_some() {
            self.chains[ChainId::Session.index()].short_poll(&mut self.shared);
        }
    }

    /// Routes one incoming block into its chain's synchronizer.
    pub fn handle_block(
        &mut self,
        chain: ChainId,
        height: BlockHeight,
        block: Block,
        source: BlockSource,
    ) {
        self.chains[chain.index()].handle_block(&mut self.shared, height, block, source);
    }

    /// The transport finished serving one fetch request for `chain`,
    /// however many blocks it yielded.
    pub fn blocks_request_finished(&mut self, chain: ChainId) {
        self.chains[chain.index()].request_finished(&mut self.shared);
    }

    /// Delivery of an elapsed timer token from the scheduler.
    pub fn timer_fired(&mut self, token: TimerToken) {
        self.chains[token.chain.index()].timer_fired(&mut self.shared, token.kind);
    }

    /// Diagnostic snapshot of one chain.
    pub fn stats(&self, chain: ChainId) -> ChainStats {
        self.chains[chain.index()].stats()
    }

    /// Encrypts an outgoing payload with the current call keys. Payload
    /// failures are not call failures: the result is simply empty.
    pub fn encrypt(&self, plaintext: &[u8]) -> Vec<u8> {
        self.payload_op(plaintext, |engine, id, bytes| engine.encrypt(id, bytes))
    }

    /// Decrypts an incoming payload with the current call keys. Payload
    /// failures are not call failures: the result is simply empty.
    pub fn decrypt(&self, ciphertext: &[u8]) -> Vec<u8> {
        self.payload_op(ciphertext, |engine, id, bytes| engine.decrypt(id, bytes))
    }

    fn payload_op(
        &self,
        bytes: &[u8],
        op: impl FnOnce(&dyn CallEngine, CallId, &[u8]) -> Result<Vec<u8>, EngineError>,
    ) -> Vec<u8> {
        let Some(id) = self.shared.call_id else {
            return Vec::new();
        };
        match op(self.shared.engine.as_ref(), id, bytes) {
            Ok(out) => out,
            Err(error) => {
                debug!(code = error.code, message = %error.message, "payload operation failed");
                Vec::new()
            }
        }
    }

    fn last_membership_block(&self) -> Option<&Block> {
        self.shared.last_membership_block.as_ref().map(|(_, b)| b)
    }
}
