//! Per-chain buffering and retry state machine.
//!
//! One synchronizer per chain. Heights are 0-based block positions; the
//! synchronizer's own `height` is the count of blocks applied so far, which
//! is also the height of the next block it can hand to the engine. Pushed
//! blocks ahead of that point park in an ordered buffer; a gap first waits
//! out a short timer (the missing block usually arrives by itself), then
//! turns into a fetch request to the transport, re-issued for as long as
//! the gap persists. A caught-up chain keeps a long health-poll timer armed
//! instead.

use std::collections::BTreeMap;
use std::time::Instant;

use conclave_core::{Block, BlockHeight, BlockSource, ChainId, TimerHandle, TimerKind};
use tracing::{debug, warn};

use crate::controller::CallShared;

/// Diagnostic snapshot of one chain's synchronization state.
#[derive(Debug, Clone)]
pub struct ChainStats {
    /// Which chain this describes.
    pub chain: ChainId,
    /// Count of blocks applied so far; the next expected height.
    pub height: BlockHeight,
    /// Blocks parked in the out-of-order buffer.
    pub buffered: usize,
    /// Whether a fetch request to the transport is outstanding.
    pub poll_in_flight: bool,
    /// When the transport last pushed a block for this chain.
    pub last_push_update: Option<Instant>,
}

pub(crate) struct ChainSynchronizer {
    chain: ChainId,
    height: BlockHeight,
    waiting: BTreeMap<BlockHeight, Block>,
    poll_in_flight: bool,
    last_push_update: Option<Instant>,
    wait_timer: Option<TimerHandle>,
    poll_timer: Option<TimerHandle>,
}

impl ChainSynchronizer {
    pub(crate) fn new(chain: ChainId) -> Self {
        Self {
            chain,
            height: 0,
            waiting: BTreeMap::new(),
            poll_in_flight: false,
            last_push_update: None,
            wait_timer: None,
            poll_timer: None,
        }
    }

    pub(crate) fn stats(&self) -> ChainStats {
        ChainStats {
            chain: self.chain,
            height: self.height,
            buffered: self.waiting.len(),
            poll_in_flight: self.poll_in_flight,
            last_push_update: self.last_push_update,
        }
    }

    /// Routes one incoming block.
    ///
    /// Membership blocks always refresh the controller's cached chain tip
    /// first, even when the call has already failed or the block is never
    /// applied: join-block construction depends on the freshest tip.
    pub(crate) fn handle_block(
        &mut self,
        shared: &mut CallShared,
        height: BlockHeight,
        block: Block,
        source: BlockSource,
    ) {
        if self.chain == ChainId::Membership {
            shared.note_membership_block(height, &block);
        }
        if shared.failed() {
            return;
        }
        if source == BlockSource::PollReply
            && self.chain == ChainId::Session
            && shared.call_id().is_none()
        {
            // The transport must not fetch the session chain before the
            // call exists; drop rather than corrupting the buffer.
            warn!(chain = %self.chain, height, "poll reply before call creation, dropping");
            return;
        }

        let mut applied = false;
        if source.is_push() {
            self.last_push_update = Some(Instant::now());
            if height > self.height
                || (self.chain == ChainId::Session && shared.call_id().is_none())
            {
                debug!(
                    chain = %self.chain,
                    height,
                    local_height = self.height,
                    "buffering pushed block"
                );
                self.waiting.insert(height, block);
                self.check_waiting_blocks(shared, false);
                return;
            }
        }
        if shared.call_id().is_none() || height == self.height {
            if shared.apply_to_engine(self.chain, &block).is_err() {
                return;
            }
            self.height = height + 1;
            applied = true;
        }
        if applied || source.is_push() {
            self.check_waiting_blocks(shared, false);
        }
    }

    /// Clears the outstanding-request marker and re-evaluates the buffer.
    pub(crate) fn request_finished(&mut self, shared: &mut CallShared) {
        debug!(chain = %self.chain, height = self.height, "block request finished");
        self.poll_in_flight = false;
        self.check_waiting_blocks(shared, false);
    }

    /// Delivery of an elapsed timer token for this chain. Tokens of timers
    /// that were re-armed or cancelled in the meantime are ignored.
    pub(crate) fn timer_fired(&mut self, shared: &mut CallShared, kind: TimerKind) {
        match kind {
            TimerKind::WaitForBlocks => {
                if self.wait_timer.take().is_some() {
                    self.check_waiting_blocks(shared, true);
                }
            }
            TimerKind::HealthPoll => {
                if self.poll_timer.take().is_some() {
                    self.short_poll(shared);
                }
            }
        }
    }

    /// Drains the buffer as far as the next expected height allows.
    ///
    /// `after_timeout` distinguishes the wait-timer elapsing (a persisting
    /// gap now escalates to a fetch request) from every other trigger (a
    /// persisting gap re-arms the wait timer).
    pub(crate) fn check_waiting_blocks(&mut self, shared: &mut CallShared, after_timeout: bool) {
        if shared.failed() {
            return;
        }
        if shared.call_id().is_none() {
            // Nothing can be applied before the call exists; check back
            // shortly. The first applied membership block unblocks this.
            self.arm_wait_timer(shared);
            return;
        }
        if self.poll_in_flight {
            return;
        }
        self.poll_timer = None;
        while let Some((level, block)) = self.waiting.pop_first() {
            if level > self.height {
                // Predecessor still missing; keep the block parked.
                self.waiting.insert(level, block);
                if after_timeout {
                    debug!(
                        chain = %self.chain,
                        missing = self.height,
                        buffered_from = level,
                        "gap outlived the wait timer, polling transport"
                    );
                    self.short_poll(shared);
                } else {
                    self.arm_wait_timer(shared);
                }
                return;
            }
            if level == self.height {
                if shared.apply_to_engine(self.chain, &block).is_err() {
                    return;
                }
                self.height = level + 1;
            }
            // Entries below the height are stale duplicates; dropped.
        }
        self.wait_timer = None;
        self.arm_poll_timer(shared);
    }

    /// Issues a fetch request for this chain from the current height,
    /// unless the session chain is not ready to ask yet.
    pub(crate) fn short_poll(&mut self, shared: &mut CallShared) {
        if shared.failed() {
            return;
        }
        self.poll_timer = None;
        self.wait_timer = None;
        if self.chain == ChainId::Session && shared.call_id().is_none() {
            self.arm_wait_timer(shared);
            return;
        }
        self.poll_in_flight = true;
        shared.request_blocks(self.chain, self.height);
    }

    fn arm_wait_timer(&mut self, shared: &CallShared) {
        self.wait_timer = Some(shared.schedule(self.chain, TimerKind::WaitForBlocks));
    }

    fn arm_poll_timer(&mut self, shared: &CallShared) {
        self.poll_timer = Some(shared.schedule(self.chain, TimerKind::HealthPoll));
    }
}
