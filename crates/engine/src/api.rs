use crate::{
    error::{EngineApiError, EngineApiResult},
    heartbeat::{self, ConsensusUpdates, HeartbeatConfig, HeartbeatHandle},
    invalid::InvalidChainTracker,
    metrics::EngineApiMetrics,
    queue::{HeaderQueue, PayloadQueue},
};
use std::{fmt, sync::Arc};
use tokio::sync::Mutex;
use tracing::{debug, info, trace, warn};
use zond_consensus::Consensus;
use zond_interfaces::{ChainStore, SyncMode, Syncer, TxPoolSync};
use zond_payload_builder::{BuildPayloadArgs, PayloadBuilder};
use zond_primitives::{BlockHash, SealedBlock, SealedHeader, B256};
use zond_rpc_types::engine::{
    ExecutionPayload, ExecutionPayloadBodyV1, ExecutionPayloadEnvelope, ForkchoiceState,
    ForkchoiceUpdated, PayloadAttributes, PayloadId, PayloadStatus, PayloadStatusEnum,
    CAPABILITIES,
};

/// The upper limit of payload bodies served per range request.
pub const MAX_PAYLOAD_BODIES_LIMIT: u64 = 1024;

/// Behaviour switches for [`ConsensusApi`].
#[derive(Debug, Clone, Default)]
pub struct ConsensusApiConfig {
    /// Deterministic single-process mode: block production waits out the
    /// transaction pool's background reset before building.
    pub simulator_mode: bool,
    /// Liveness monitor tunables.
    pub heartbeat: HeartbeatConfig,
}

/// The engine endpoint backend, mediating between the external consensus
/// client and the chain, sync and payload-building subsystems.
///
/// All forkchoice updates are serialized against each other, as are all
/// payload submissions; the two request families may interleave. Every
/// decision below relies on that serialization, not on storage transactions.
pub struct ConsensusApi {
    /// The chain this node maintains.
    chain: Arc<dyn ChainStore>,
    /// The block downloader.
    syncer: Arc<dyn Syncer>,
    /// Structural header validation.
    consensus: Arc<dyn Consensus>,
    /// Spawns payload build jobs for requested attributes.
    payload_builder: Arc<dyn PayloadBuilder>,
    /// Pool handle used only in simulator mode.
    tx_pool: Arc<dyn TxPoolSync>,
    /// Headers of remote payloads received before their block could be
    /// imported, kept around as future sync targets.
    remote_blocks: HeaderQueue,
    /// Build jobs for locally produced payloads.
    local_blocks: PayloadQueue,
    /// Blocks rejected since startup and the chain tips descending from
    /// them. Purely in-memory: a restart, cache eviction or a bad ancestor
    /// deeper than the tracked tip segment all fall back to sync re-running
    /// validation, which is slower but always correct.
    invalid_ancestors: Arc<InvalidChainTracker>,
    /// Timestamps the liveness monitor watches.
    updates: Arc<ConsensusUpdates>,
    metrics: EngineApiMetrics,
    simulator_mode: bool,
    heartbeat: HeartbeatConfig,
    /// Serializes forkchoice updates.
    forkchoice_lock: Mutex<()>,
    /// Serializes payload submissions.
    new_payload_lock: Mutex<()>,
}

// === impl ConsensusApi ===

impl ConsensusApi {
    /// Creates the engine backend with default configuration and hooks it
    /// into the downloader's bad-block reporting.
    pub fn new(
        chain: Arc<dyn ChainStore>,
        syncer: Arc<dyn Syncer>,
        consensus: Arc<dyn Consensus>,
        payload_builder: Arc<dyn PayloadBuilder>,
        tx_pool: Arc<dyn TxPoolSync>,
    ) -> Arc<Self> {
        Self::with_config(chain, syncer, consensus, payload_builder, tx_pool, Default::default())
    }

    /// Creates the engine backend with the given configuration.
    pub fn with_config(
        chain: Arc<dyn ChainStore>,
        syncer: Arc<dyn Syncer>,
        consensus: Arc<dyn Consensus>,
        payload_builder: Arc<dyn PayloadBuilder>,
        tx_pool: Arc<dyn TxPoolSync>,
        config: ConsensusApiConfig,
    ) -> Arc<Self> {
        let api = Arc::new(Self {
            chain,
            syncer,
            consensus,
            payload_builder,
            tx_pool,
            remote_blocks: HeaderQueue::new(),
            local_blocks: PayloadQueue::new(),
            invalid_ancestors: Arc::new(InvalidChainTracker::new()),
            updates: Arc::new(ConsensusUpdates::default()),
            metrics: EngineApiMetrics::default(),
            simulator_mode: config.simulator_mode,
            heartbeat: config.heartbeat,
            forkchoice_lock: Mutex::new(()),
            new_payload_lock: Mutex::new(()),
        });
        // Bad blocks found mid-sync poison the sync origin the same way a
        // failed direct import would.
        let tracker = Arc::clone(&api.invalid_ancestors);
        api.syncer.register_bad_block_hook(Box::new(move |invalid, origin| {
            tracker.record_bad_ancestor(invalid, origin);
        }));
        api
    }

    /// Spawns the consensus-client liveness monitor.
    pub fn spawn_heartbeat(&self) -> HeartbeatHandle {
        heartbeat::spawn(Arc::clone(&self.updates), self.heartbeat.clone())
    }

    /// Handler for `engine_forkchoiceUpdatedV2`.
    pub async fn fork_choice_updated_v2(
        &self,
        state: ForkchoiceState,
        attrs: Option<PayloadAttributes>,
    ) -> EngineApiResult<ForkchoiceUpdated> {
        if let Some(attrs) = &attrs {
            // Withdrawals activate at genesis on Zond, so V2 attributes
            // without them are malformed.
            if attrs.withdrawals.is_none() {
                return Err(EngineApiError::InvalidPayloadAttributes(
                    "missing withdrawals".to_string(),
                ))
            }
        }
        self.forkchoice_updated(state, attrs).await
    }

    async fn forkchoice_updated(
        &self,
        state: ForkchoiceState,
        attrs: Option<PayloadAttributes>,
    ) -> EngineApiResult<ForkchoiceUpdated> {
        let _permit = self.forkchoice_lock.lock().await;
        self.metrics.forkchoice_updated_messages.increment(1);
        trace!(
            target: "engine::api",
            head = %state.head_block_hash,
            safe = %state.safe_block_hash,
            finalized = %state.finalized_block_hash,
            "Engine API request received: ForkchoiceUpdated"
        );

        if state.head_block_hash.is_zero() {
            // Some consensus drivers probe the endpoint with an all-zero
            // state before they have a chain; reject without side effects.
            warn!(target: "engine::api", "Forkchoice requested update to zero hash");
            return Ok(ForkchoiceUpdated::from_status(PayloadStatusEnum::Invalid {
                validation_error: "forkchoice requested update to zero hash".to_string(),
            }))
        }
        self.updates.touch_forkchoice();

        let head_hash = state.head_block_hash;
        let Some(head) = self.chain.block_by_hash(head_hash) else {
            return Ok(self.forkchoice_to_unknown_head(state))
        };

        if self.chain.canonical_hash(head.number) != Some(head_hash) {
            // The head sits on a side chain: reorg to it.
            if let Err(err) = self.chain.set_canonical(&head) {
                warn!(target: "engine::api", %err, hash = %head_hash, "Failed to reorg to new head");
                return Ok(ForkchoiceUpdated::new(PayloadStatus {
                    status: PayloadStatusEnum::Invalid { validation_error: err.message.clone() },
                    latest_valid_hash: Some(err.latest_valid_hash),
                }))
            }
        } else if self.chain.current_header().hash() != head_hash {
            // Canonical but stale: the consensus client is likely replaying
            // old updates while catching up. Acknowledge without moving the
            // head backwards.
            info!(
                target: "engine::api",
                number = head.number,
                hash = %head_hash,
                "Ignoring beacon update to old head"
            );
            return Ok(valid_update(head_hash, None))
        }
        // Reaching a head we fully know means sync is over, whatever the
        // downloader thinks.
        self.syncer.set_synced();

        if !state.finalized_block_hash.is_zero() {
            let Some(finalized) = self.chain.block_by_hash(state.finalized_block_hash) else {
                warn!(target: "engine::api", hash = %state.finalized_block_hash, "Final block not available in database");
                return Ok(invalid_forkchoice("final block not available in database"))
            };
            if self.chain.canonical_hash(finalized.number) != Some(state.finalized_block_hash) {
                warn!(target: "engine::api", hash = %state.finalized_block_hash, "Final block not in canonical chain");
                return Ok(invalid_forkchoice("final block not in canonical chain"))
            }
            self.chain.set_finalized(&finalized.header);
        }
        if !state.safe_block_hash.is_zero() {
            let Some(safe) = self.chain.block_by_hash(state.safe_block_hash) else {
                warn!(target: "engine::api", hash = %state.safe_block_hash, "Safe block not available in database");
                return Ok(invalid_forkchoice("safe block not available in database"))
            };
            if self.chain.canonical_hash(safe.number) != Some(state.safe_block_hash) {
                warn!(target: "engine::api", hash = %state.safe_block_hash, "Safe block not in canonical chain");
                return Ok(invalid_forkchoice("safe block not in canonical chain"))
            }
            self.chain.set_safe(&safe.header);
        }

        let Some(attrs) = attrs else { return Ok(valid_update(head_hash, None)) };
        let id = self.start_payload_build(head_hash, attrs)?;
        Ok(valid_update(head_hash, Some(id)))
    }

    /// Handles a forkchoice update whose head is not stored locally: either
    /// the head extends a chain we already rejected, or it turns into a sync
    /// target.
    fn forkchoice_to_unknown_head(&self, state: ForkchoiceState) -> ForkchoiceUpdated {
        let head_hash = state.head_block_hash;
        if let Some(status) = self.invalid_ancestors.check_invalid_ancestor(head_hash, head_hash) {
            return ForkchoiceUpdated::new(status)
        }
        let Some(header) = self.remote_blocks.get(head_hash) else {
            // The header was never delivered (or already evicted). Nothing
            // to aim the downloader at; the consensus client will follow up.
            warn!(target: "engine::api", hash = %head_hash, "Forkchoice requested unknown head");
            return ForkchoiceUpdated::from_status(PayloadStatusEnum::Syncing)
        };
        // If the finalized block is cached too it bounds the header download.
        let finalized = if state.finalized_block_hash.is_zero() {
            None
        } else {
            self.remote_blocks.get(state.finalized_block_hash)
        };
        info!(
            target: "engine::api",
            number = header.number,
            hash = %head_hash,
            "Forkchoice requested sync to new head"
        );
        if let Err(err) = self.syncer.beacon_sync(self.syncer.sync_mode(), &header, finalized.as_ref())
        {
            // Not fatal: the consensus client keeps sending updates and the
            // next one retries.
            warn!(target: "engine::api", %err, "Failed to start sync to new head");
        }
        ForkchoiceUpdated::from_status(PayloadStatusEnum::Syncing)
    }

    /// Starts a payload build job for the new head, deduplicating against
    /// jobs already running for the same attributes.
    fn start_payload_build(
        &self,
        head_hash: BlockHash,
        attrs: PayloadAttributes,
    ) -> EngineApiResult<PayloadId> {
        let args = BuildPayloadArgs::new(head_hash, attrs);
        let id = args.payload_id();
        if self.local_blocks.has(id) {
            return Ok(id)
        }
        if self.simulator_mode {
            // Deterministic mode: the pool reset triggered by the head
            // update must settle before the build reads the pending set.
            if let Err(err) = self.tx_pool.wait_for_reset() {
                warn!(target: "engine::api", %err, "Failed to sync transaction pool");
                return Err(EngineApiError::InvalidPayloadAttributes(err.to_string()))
            }
        }
        let job = match self.payload_builder.build_payload(args) {
            Ok(job) => job,
            Err(err) => {
                // The head update above already took effect; only the build
                // request is reported as failed.
                warn!(target: "engine::api", %err, "Failed to build payload");
                return Err(EngineApiError::InvalidPayloadAttributes(err.to_string()))
            }
        };
        self.local_blocks.put(id, job);
        Ok(id)
    }

    /// Handler for `engine_newPayloadV2`.
    pub async fn new_payload_v2(&self, payload: ExecutionPayload) -> EngineApiResult<PayloadStatus> {
        if payload.withdrawals.is_none() {
            return Err(EngineApiError::InvalidParams("missing withdrawals".to_string()))
        }
        Ok(self.new_payload(payload).await)
    }

    async fn new_payload(&self, payload: ExecutionPayload) -> PayloadStatus {
        // A submission stalled on a slow database plus a timeout-and-retry
        // on the consensus side must not race a duplicate import past the
        // already-known check below.
        let _permit = self.new_payload_lock.lock().await;
        self.metrics.new_payload_messages.increment(1);
        trace!(
            target: "engine::api",
            number = payload.block_number,
            hash = %payload.block_hash,
            "Engine API request received: NewPayload"
        );

        let block = match payload.try_into_sealed_block() {
            Ok(block) => block,
            Err(err) => {
                warn!(target: "engine::api", %err, "Invalid NewPayload params");
                return PayloadStatus::from_status(PayloadStatusEnum::Invalid {
                    validation_error: err.to_string(),
                })
            }
        };
        self.updates.touch_new_payload();

        // Resubmission of a block we already have: skip execution entirely.
        // A rolled-back head may sit above this block, and importing would
        // drag the chain backwards.
        if self.chain.block_by_hash(block.hash()).is_some() {
            warn!(
                target: "engine::api",
                number = block.number,
                hash = %block.hash(),
                "Ignoring already known beacon payload"
            );
            return PayloadStatus::new(PayloadStatusEnum::Valid, block.hash())
        }

        if let Some(status) = self.invalid_ancestors.check_invalid_ancestor(block.hash(), block.hash())
        {
            return status
        }

        let parent_number = block.number.saturating_sub(1);
        let Some(parent) = self.chain.block(block.parent_hash, parent_number) else {
            return self.delay_payload_import(&block)
        };

        if let Err(err) = self.consensus.validate_header_against_parent(&block.header, &parent.header)
        {
            warn!(target: "engine::api", %err, hash = %block.hash(), "Rejecting payload");
            return invalid_status(err, Some(&parent.header))
        }

        // Snap sync owns the database until it finishes; a direct insert
        // would interleave with its bulk writes.
        if self.syncer.sync_mode() != SyncMode::Full {
            return self.delay_payload_import(&block)
        }

        if !self.chain.has_block_and_state(block.parent_hash, parent_number) {
            self.remote_blocks.put(block.hash(), block.header.clone());
            warn!(target: "engine::api", hash = %block.hash(), "State not available, ignoring new payload");
            return PayloadStatus::from_status(PayloadStatusEnum::Accepted)
        }

        trace!(target: "engine::api", number = block.number, hash = %block.hash(), "Inserting block without sethead");
        if let Err(err) = self.chain.insert_block_without_set_head(&block) {
            warn!(target: "engine::api", %err, hash = %block.hash(), "NewPayload: inserting block failed");
            self.metrics.invalid_blocks.increment(1);
            self.invalid_ancestors.record_invalid_block(&block.header);
            return invalid_status(err, Some(&parent.header))
        }
        // The block is stored but not canonical until a forkchoice update
        // names it head.
        PayloadStatus::new(PayloadStatusEnum::Valid, block.hash())
    }

    /// Stashes a payload that cannot be imported right now (missing parent,
    /// or snap sync owning the database) as a future sync target.
    fn delay_payload_import(&self, block: &SealedBlock) -> PayloadStatus {
        // A parent on a previously rejected chain poisons this block too.
        if let Some(status) =
            self.invalid_ancestors.check_invalid_ancestor(block.parent_hash, block.hash())
        {
            return status
        }
        // Kept for a later forkchoice update naming this hash as head.
        self.remote_blocks.put(block.hash(), block.header.clone());

        // Starting a sync from here is unsafe: submissions of competing
        // sibling payloads would keep restarting it against each other. Only
        // a forkchoice update may start one; extending a running cycle with
        // a later target is fine.
        match self.syncer.beacon_extend(self.syncer.sync_mode(), &block.header) {
            Ok(()) => {
                debug!(
                    target: "engine::api",
                    number = block.number,
                    hash = %block.hash(),
                    "Payload accepted for sync extension"
                );
            }
            Err(err) => {
                if self.syncer.sync_mode() == SyncMode::Full {
                    warn!(
                        target: "engine::api",
                        number = block.number,
                        hash = %block.hash(),
                        parent = %block.parent_hash,
                        %err,
                        "Ignoring payload with missing parent"
                    );
                } else {
                    info!(
                        target: "engine::api",
                        number = block.number,
                        hash = %block.hash(),
                        %err,
                        "Ignoring payload while snap syncing"
                    );
                }
            }
        }
        // Either way the node is syncing toward the payload, not judging it.
        PayloadStatus::from_status(PayloadStatusEnum::Syncing)
    }

    /// Handler for `engine_getPayloadV2`.
    pub async fn get_payload_v2(
        &self,
        payload_id: PayloadId,
    ) -> EngineApiResult<ExecutionPayloadEnvelope> {
        self.get_payload(payload_id, false).await
    }

    /// Returns the payload being built under the given id. With `want_full`
    /// set the build is finalized with maximal transaction inclusion first.
    pub async fn get_payload(
        &self,
        payload_id: PayloadId,
        want_full: bool,
    ) -> EngineApiResult<ExecutionPayloadEnvelope> {
        self.metrics.get_payload_messages.increment(1);
        trace!(target: "engine::api", %payload_id, "Engine API request received: GetPayload");
        self.local_blocks.get(payload_id, want_full).await.ok_or(EngineApiError::UnknownPayload)
    }

    /// Handler for `engine_getPayloadBodiesByHashV1`.
    pub fn get_payload_bodies_by_hash_v1(
        &self,
        hashes: Vec<B256>,
    ) -> Vec<Option<ExecutionPayloadBodyV1>> {
        hashes.into_iter().map(|hash| self.chain.block_by_hash(hash).map(Into::into)).collect()
    }

    /// Handler for `engine_getPayloadBodiesByRangeV1`.
    ///
    /// The range is clamped to the current head; bodies of missing canonical
    /// blocks are served as explicit gaps to keep positions aligned.
    pub fn get_payload_bodies_by_range_v1(
        &self,
        start: u64,
        count: u64,
    ) -> EngineApiResult<Vec<Option<ExecutionPayloadBodyV1>>> {
        if start == 0 || count == 0 {
            return Err(EngineApiError::InvalidParams(format!(
                "invalid start or count: start {start}, count {count}"
            )))
        }
        if count > MAX_PAYLOAD_BODIES_LIMIT {
            return Err(EngineApiError::TooLargeRequest { count })
        }
        // count >= 1 here; saturate so a start near u64::MAX cannot overflow
        let last = start.saturating_add(count - 1).min(self.chain.current_header().number);
        let mut bodies = Vec::with_capacity(last.saturating_add(1).saturating_sub(start) as usize);
        for number in start..=last {
            bodies.push(self.chain.block_by_number(number).map(Into::into));
        }
        Ok(bodies)
    }

    /// Handler for `engine_exchangeCapabilities`.
    ///
    /// Doubles as the consensus client's first contact, which the liveness
    /// monitor distinguishes from a client that never attached at all.
    pub fn exchange_capabilities(&self, _capabilities: Vec<String>) -> Vec<String> {
        self.updates.touch_handshake();
        CAPABILITIES.iter().map(|capability| capability.to_string()).collect()
    }
}

impl fmt::Debug for ConsensusApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsensusApi")
            .field("simulator_mode", &self.simulator_mode)
            .finish_non_exhaustive()
    }
}

/// A VALID forkchoice response for the given head, optionally carrying the
/// id of a started build job.
fn valid_update(head: BlockHash, id: Option<PayloadId>) -> ForkchoiceUpdated {
    let mut update =
        ForkchoiceUpdated::from_status(PayloadStatusEnum::Valid).with_latest_valid_hash(head);
    if let Some(id) = id {
        update = update.with_payload_id(id);
    }
    update
}

/// An INVALID forkchoice response for an unusable finalized or safe block.
/// This is an operator-level misconfiguration, not a retryable condition.
fn invalid_forkchoice(message: &str) -> ForkchoiceUpdated {
    ForkchoiceUpdated::from_status(PayloadStatusEnum::Invalid {
        validation_error: message.to_string(),
    })
}

/// An INVALID payload status pointing at `latest_valid` as the last valid
/// block of the branch.
fn invalid_status(err: impl fmt::Display, latest_valid: Option<&SealedHeader>) -> PayloadStatus {
    PayloadStatus {
        status: PayloadStatusEnum::Invalid { validation_error: err.to_string() },
        latest_valid_hash: latest_valid.map(|header| header.hash()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use zond_consensus::BeaconConsensus;
    use zond_interfaces::{
        test_utils::{child_block, genesis_block, MockChainStore, MockSyncer, MockTxPool},
        SetCanonicalError,
    };
    use zond_payload_builder::test_utils::TestPayloadBuilder;
    use zond_primitives::{Address, Withdrawal};

    struct TestHarness {
        chain: Arc<MockChainStore>,
        syncer: Arc<MockSyncer>,
        builder: Arc<TestPayloadBuilder>,
        pool: Arc<MockTxPool>,
        api: Arc<ConsensusApi>,
    }

    fn setup_with(config: ConsensusApiConfig) -> TestHarness {
        let chain = Arc::new(MockChainStore::default());
        let syncer = Arc::new(MockSyncer::default());
        let builder = Arc::new(TestPayloadBuilder::default());
        let pool = Arc::new(MockTxPool::default());
        let api = ConsensusApi::with_config(
            chain.clone(),
            syncer.clone(),
            Arc::new(BeaconConsensus::new()),
            builder.clone(),
            pool.clone(),
            config,
        );
        TestHarness { chain, syncer, builder, pool, api }
    }

    fn setup() -> TestHarness {
        setup_with(ConsensusApiConfig::default())
    }

    fn head_state(head: BlockHash) -> ForkchoiceState {
        ForkchoiceState { head_block_hash: head, ..Default::default() }
    }

    fn attributes(timestamp: u64) -> PayloadAttributes {
        PayloadAttributes {
            timestamp,
            prev_randao: B256::repeat_byte(0x11),
            suggested_fee_recipient: Address::repeat_byte(0x22),
            withdrawals: Some(vec![Withdrawal {
                index: 1,
                validator_index: 2,
                address: Address::repeat_byte(0x33),
                amount: 4,
            }]),
        }
    }

    fn payload_of(block: &SealedBlock) -> ExecutionPayload {
        block.clone().into()
    }

    mod forkchoice {
        use super::*;

        #[tokio::test]
        async fn zero_head_is_rejected_without_side_effects() {
            let t = setup();
            let update =
                t.api.fork_choice_updated_v2(ForkchoiceState::default(), None).await.unwrap();
            assert!(update.payload_status.status.is_invalid());
            assert!(update.payload_id.is_none());
            assert_eq!(t.chain.call_count(), 0);
            assert_eq!(t.syncer.sync_count(), 0);
            assert!(!t.syncer.is_synced());
        }

        #[tokio::test]
        async fn unknown_head_returns_syncing_without_a_target() {
            let t = setup();
            let update = t
                .api
                .fork_choice_updated_v2(head_state(B256::repeat_byte(0xaa)), None)
                .await
                .unwrap();
            assert_matches!(update.payload_status.status, PayloadStatusEnum::Syncing);
            // no stashed header, so nothing to sync toward yet
            assert_eq!(t.syncer.sync_count(), 0);
        }

        #[tokio::test]
        async fn current_head_is_acknowledged_without_reorg() {
            let t = setup();
            let genesis = genesis_block();
            let head = child_block(&genesis, genesis.timestamp + 12);
            t.chain.add_canonical_block(genesis);
            t.chain.add_canonical_block(head.clone());

            let update = t.api.fork_choice_updated_v2(head_state(head.hash()), None).await.unwrap();
            assert_matches!(update.payload_status.status, PayloadStatusEnum::Valid);
            assert_eq!(update.payload_status.latest_valid_hash, Some(head.hash()));
            assert!(update.payload_id.is_none());
            assert_eq!(t.chain.set_canonical_count(), 0);
            assert!(t.syncer.is_synced());
        }

        #[tokio::test]
        async fn stale_canonical_head_is_not_rolled_back() {
            let t = setup();
            let genesis = genesis_block();
            let head = child_block(&genesis, genesis.timestamp + 12);
            t.chain.add_canonical_block(genesis.clone());
            t.chain.add_canonical_block(head);

            // genesis is canonical but no longer the head
            let update =
                t.api.fork_choice_updated_v2(head_state(genesis.hash()), None).await.unwrap();
            assert_matches!(update.payload_status.status, PayloadStatusEnum::Valid);
            assert_eq!(t.chain.set_canonical_count(), 0);
            assert!(!t.syncer.is_synced());
        }

        #[tokio::test]
        async fn side_chain_head_triggers_reorg() {
            let t = setup();
            let genesis = genesis_block();
            let head = child_block(&genesis, genesis.timestamp + 12);
            let side = child_block(&genesis, genesis.timestamp + 13);
            t.chain.add_canonical_block(genesis);
            t.chain.add_canonical_block(head);
            t.chain.add_block(side.clone());

            let update = t.api.fork_choice_updated_v2(head_state(side.hash()), None).await.unwrap();
            assert_matches!(update.payload_status.status, PayloadStatusEnum::Valid);
            assert_eq!(t.chain.set_canonical_count(), 1);
            assert_eq!(t.chain.canonical_hash(side.number), Some(side.hash()));
            assert!(t.syncer.is_synced());
        }

        #[tokio::test]
        async fn failed_reorg_reports_latest_valid_block() {
            let t = setup();
            let genesis = genesis_block();
            let side = child_block(&genesis, genesis.timestamp + 13);
            t.chain.add_canonical_block(genesis.clone());
            t.chain.add_block(side.clone());
            t.chain.fail_reorg(SetCanonicalError {
                latest_valid_hash: genesis.hash(),
                message: "missing trie node".to_string(),
            });

            let update = t.api.fork_choice_updated_v2(head_state(side.hash()), None).await.unwrap();
            assert!(update.payload_status.status.is_invalid());
            assert_eq!(update.payload_status.latest_valid_hash, Some(genesis.hash()));
            assert!(!t.syncer.is_synced());
        }

        #[tokio::test]
        async fn stashed_header_becomes_sync_target() {
            let t = setup();
            let genesis = genesis_block();
            t.chain.add_block(genesis.clone());
            t.chain.make_canonical(&genesis);
            // block delivered but not executable: state of the parent missing
            let block = child_block(&genesis, genesis.timestamp + 12);
            let status = t.api.new_payload_v2(payload_of(&block)).await.unwrap();
            assert_matches!(status.status, PayloadStatusEnum::Accepted);

            let update =
                t.api.fork_choice_updated_v2(head_state(block.hash()), None).await.unwrap();
            assert_matches!(update.payload_status.status, PayloadStatusEnum::Syncing);
            assert_eq!(t.syncer.sync_count(), 1);
            assert_eq!(t.syncer.last_sync_target(), Some((block.hash(), None)));
        }

        #[tokio::test]
        async fn stashed_finalized_header_bounds_the_sync() {
            let t = setup();
            let genesis = genesis_block();
            t.chain.add_block(genesis.clone());
            t.chain.make_canonical(&genesis);
            let b1 = child_block(&genesis, genesis.timestamp + 12);
            let b2 = child_block(&b1, b1.timestamp + 12);
            t.api.new_payload_v2(payload_of(&b1)).await.unwrap();
            t.api.new_payload_v2(payload_of(&b2)).await.unwrap();

            let state = ForkchoiceState {
                head_block_hash: b2.hash(),
                finalized_block_hash: b1.hash(),
                ..Default::default()
            };
            let update = t.api.fork_choice_updated_v2(state, None).await.unwrap();
            assert_matches!(update.payload_status.status, PayloadStatusEnum::Syncing);
            assert_eq!(t.syncer.last_sync_target(), Some((b2.hash(), Some(b1.hash()))));
        }

        #[tokio::test]
        async fn unavailable_finalized_block_is_invalid() {
            let t = setup();
            let genesis = genesis_block();
            t.chain.add_canonical_block(genesis.clone());

            let state = ForkchoiceState {
                head_block_hash: genesis.hash(),
                finalized_block_hash: B256::repeat_byte(0xfe),
                ..Default::default()
            };
            let update = t.api.fork_choice_updated_v2(state, None).await.unwrap();
            assert!(update.payload_status.status.is_invalid());
            assert_eq!(t.chain.finalized_hash(), None);
        }

        #[tokio::test]
        async fn non_canonical_finalized_block_is_invalid() {
            let t = setup();
            let genesis = genesis_block();
            let head = child_block(&genesis, genesis.timestamp + 12);
            let side = child_block(&genesis, genesis.timestamp + 13);
            t.chain.add_canonical_block(genesis);
            t.chain.add_canonical_block(head.clone());
            t.chain.add_block(side.clone());

            let state = ForkchoiceState {
                head_block_hash: head.hash(),
                finalized_block_hash: side.hash(),
                ..Default::default()
            };
            let update = t.api.fork_choice_updated_v2(state, None).await.unwrap();
            assert!(update.payload_status.status.is_invalid());
            assert_eq!(t.chain.finalized_hash(), None);
        }

        #[tokio::test]
        async fn finalized_and_safe_markers_are_applied() {
            let t = setup();
            let genesis = genesis_block();
            let head = child_block(&genesis, genesis.timestamp + 12);
            t.chain.add_canonical_block(genesis.clone());
            t.chain.add_canonical_block(head.clone());

            let state = ForkchoiceState {
                head_block_hash: head.hash(),
                safe_block_hash: head.hash(),
                finalized_block_hash: genesis.hash(),
            };
            let update = t.api.fork_choice_updated_v2(state, None).await.unwrap();
            assert_matches!(update.payload_status.status, PayloadStatusEnum::Valid);
            assert_eq!(t.chain.finalized_hash(), Some(genesis.hash()));
            assert_eq!(t.chain.safe_hash(), Some(head.hash()));
        }
    }

    mod payload_build {
        use super::*;

        #[tokio::test]
        async fn attributes_without_withdrawals_are_malformed() {
            let t = setup();
            let genesis = genesis_block();
            t.chain.add_canonical_block(genesis.clone());
            let mut attrs = attributes(genesis.timestamp + 12);
            attrs.withdrawals = None;

            let err = t
                .api
                .fork_choice_updated_v2(head_state(genesis.hash()), Some(attrs))
                .await
                .unwrap_err();
            assert_matches!(err, EngineApiError::InvalidPayloadAttributes(_));
            assert_eq!(t.builder.build_count(), 0);
        }

        #[tokio::test]
        async fn identical_attributes_reuse_the_running_job() {
            let t = setup();
            let genesis = genesis_block();
            t.chain.add_canonical_block(genesis.clone());
            let attrs = attributes(genesis.timestamp + 12);

            let first = t
                .api
                .fork_choice_updated_v2(head_state(genesis.hash()), Some(attrs.clone()))
                .await
                .unwrap();
            let second = t
                .api
                .fork_choice_updated_v2(head_state(genesis.hash()), Some(attrs))
                .await
                .unwrap();
            assert_eq!(first.payload_id, second.payload_id);
            assert!(first.payload_id.is_some());
            assert_eq!(t.builder.build_count(), 1);
        }

        #[tokio::test]
        async fn distinct_attributes_spawn_distinct_jobs() {
            let t = setup();
            let genesis = genesis_block();
            t.chain.add_canonical_block(genesis.clone());

            let first = t
                .api
                .fork_choice_updated_v2(
                    head_state(genesis.hash()),
                    Some(attributes(genesis.timestamp + 12)),
                )
                .await
                .unwrap();
            let second = t
                .api
                .fork_choice_updated_v2(
                    head_state(genesis.hash()),
                    Some(attributes(genesis.timestamp + 24)),
                )
                .await
                .unwrap();
            assert_ne!(first.payload_id, second.payload_id);
            assert_eq!(t.builder.build_count(), 2);
        }

        #[tokio::test]
        async fn build_failure_keeps_the_head_update() {
            let t = setup();
            let genesis = genesis_block();
            t.chain.add_canonical_block(genesis.clone());
            t.builder.set_failing(true);

            let err = t
                .api
                .fork_choice_updated_v2(
                    head_state(genesis.hash()),
                    Some(attributes(genesis.timestamp + 12)),
                )
                .await
                .unwrap_err();
            assert_matches!(err, EngineApiError::InvalidPayloadAttributes(_));
            // head handling ran before the build was attempted
            assert!(t.syncer.is_synced());
        }

        #[tokio::test]
        async fn get_payload_serves_the_job() {
            let t = setup();
            let genesis = genesis_block();
            t.chain.add_canonical_block(genesis.clone());

            let update = t
                .api
                .fork_choice_updated_v2(
                    head_state(genesis.hash()),
                    Some(attributes(genesis.timestamp + 12)),
                )
                .await
                .unwrap();
            let id = update.payload_id.unwrap();
            let envelope = t.api.get_payload_v2(id).await.unwrap();
            assert_eq!(envelope.execution_payload.parent_hash, genesis.hash());
            assert_eq!(envelope.execution_payload.timestamp, genesis.timestamp + 12);
        }

        #[tokio::test]
        async fn get_payload_unknown_id_errors() {
            let t = setup();
            let err = t.api.get_payload_v2(PayloadId::new([9; 8])).await.unwrap_err();
            assert_matches!(err, EngineApiError::UnknownPayload);
        }

        #[tokio::test]
        async fn simulator_mode_waits_for_pool_reset() {
            let t = setup_with(ConsensusApiConfig { simulator_mode: true, ..Default::default() });
            let genesis = genesis_block();
            t.chain.add_canonical_block(genesis.clone());

            t.api
                .fork_choice_updated_v2(
                    head_state(genesis.hash()),
                    Some(attributes(genesis.timestamp + 12)),
                )
                .await
                .unwrap();
            assert_eq!(t.pool.wait_count(), 1);
        }

        #[tokio::test]
        async fn regular_mode_never_touches_the_pool() {
            let t = setup();
            let genesis = genesis_block();
            t.chain.add_canonical_block(genesis.clone());

            t.api
                .fork_choice_updated_v2(
                    head_state(genesis.hash()),
                    Some(attributes(genesis.timestamp + 12)),
                )
                .await
                .unwrap();
            assert_eq!(t.pool.wait_count(), 0);
        }
    }

    mod new_payload {
        use super::*;

        #[tokio::test]
        async fn valid_payload_is_inserted_without_moving_the_head() {
            let t = setup();
            let genesis = genesis_block();
            t.chain.add_canonical_block(genesis.clone());
            let block = child_block(&genesis, genesis.timestamp + 12);

            let status = t.api.new_payload_v2(payload_of(&block)).await.unwrap();
            assert_matches!(status.status, PayloadStatusEnum::Valid);
            assert_eq!(status.latest_valid_hash, Some(block.hash()));
            assert_eq!(t.chain.insert_count(), 1);
            // still genesis-headed until a forkchoice update says otherwise
            assert_eq!(t.chain.current_header().hash(), genesis.hash());
        }

        #[tokio::test]
        async fn missing_withdrawals_are_malformed() {
            let t = setup();
            let genesis = genesis_block();
            t.chain.add_canonical_block(genesis.clone());
            let mut payload = payload_of(&child_block(&genesis, genesis.timestamp + 12));
            payload.withdrawals = None;

            let err = t.api.new_payload_v2(payload).await.unwrap_err();
            assert_matches!(err, EngineApiError::InvalidParams(_));
            assert_eq!(t.chain.insert_count(), 0);
        }

        #[tokio::test]
        async fn tampered_block_hash_is_invalid() {
            let t = setup();
            let genesis = genesis_block();
            t.chain.add_canonical_block(genesis.clone());
            let mut payload = payload_of(&child_block(&genesis, genesis.timestamp + 12));
            payload.block_hash = B256::repeat_byte(0xbe);

            let status = t.api.new_payload_v2(payload).await.unwrap();
            assert!(status.status.is_invalid());
            assert_eq!(t.chain.insert_count(), 0);
        }

        #[tokio::test]
        async fn resubmission_skips_execution() {
            let t = setup();
            let genesis = genesis_block();
            t.chain.add_canonical_block(genesis.clone());
            let block = child_block(&genesis, genesis.timestamp + 12);

            let first = t.api.new_payload_v2(payload_of(&block)).await.unwrap();
            let second = t.api.new_payload_v2(payload_of(&block)).await.unwrap();
            assert_eq!(first, second);
            assert_eq!(t.chain.insert_count(), 1);
        }

        #[tokio::test]
        async fn stale_timestamp_is_invalid_against_parent() {
            let t = setup();
            let genesis = genesis_block();
            t.chain.add_canonical_block(genesis.clone());
            let block = child_block(&genesis, genesis.timestamp);

            let status = t.api.new_payload_v2(payload_of(&block)).await.unwrap();
            assert!(status.status.is_invalid());
            assert_eq!(status.latest_valid_hash, Some(genesis.hash()));
            assert_eq!(t.chain.insert_count(), 0);
        }

        #[tokio::test]
        async fn missing_parent_defers_to_sync() {
            let t = setup();
            let genesis = genesis_block();
            t.chain.add_canonical_block(genesis.clone());
            let orphan_parent = child_block(&genesis, genesis.timestamp + 12);
            let orphan = child_block(&orphan_parent, orphan_parent.timestamp + 12);

            let status = t.api.new_payload_v2(payload_of(&orphan)).await.unwrap();
            assert_matches!(status.status, PayloadStatusEnum::Syncing);
            assert_eq!(t.syncer.extend_count(), 1);
            assert_eq!(t.syncer.sync_count(), 0);
            assert_eq!(t.chain.insert_count(), 0);
        }

        #[tokio::test]
        async fn snap_sync_defers_even_with_parent_present() {
            let t = setup();
            t.syncer.set_mode(zond_interfaces::SyncMode::Snap);
            t.syncer.accept_extensions(true);
            let genesis = genesis_block();
            t.chain.add_canonical_block(genesis.clone());
            let block = child_block(&genesis, genesis.timestamp + 12);

            let status = t.api.new_payload_v2(payload_of(&block)).await.unwrap();
            assert_matches!(status.status, PayloadStatusEnum::Syncing);
            assert_eq!(t.syncer.extend_count(), 1);
            assert_eq!(t.chain.insert_count(), 0);
        }

        #[tokio::test]
        async fn missing_parent_state_is_accepted_not_executed() {
            let t = setup();
            let genesis = genesis_block();
            t.chain.add_block(genesis.clone());
            t.chain.make_canonical(&genesis);
            let block = child_block(&genesis, genesis.timestamp + 12);

            let status = t.api.new_payload_v2(payload_of(&block)).await.unwrap();
            assert_matches!(status.status, PayloadStatusEnum::Accepted);
            assert_eq!(t.chain.insert_count(), 0);
        }

        #[tokio::test]
        async fn failed_import_poisons_descendants() {
            let t = setup();
            let genesis = genesis_block();
            t.chain.add_canonical_block(genesis.clone());
            let bad = child_block(&genesis, genesis.timestamp + 12);
            t.chain.fail_insert(bad.hash(), "execution failed");

            let status = t.api.new_payload_v2(payload_of(&bad)).await.unwrap();
            assert!(status.status.is_invalid());
            assert_eq!(status.latest_valid_hash, Some(genesis.hash()));

            // the child never executes and reports past the bad ancestor
            let child = child_block(&bad, bad.timestamp + 12);
            let status = t.api.new_payload_v2(payload_of(&child)).await.unwrap();
            assert!(status.status.is_invalid());
            assert_eq!(status.latest_valid_hash, Some(genesis.hash()));
            assert_matches!(
                status.status,
                PayloadStatusEnum::Invalid { ref validation_error }
                    if validation_error.contains("previously rejected")
            );
            assert_eq!(t.chain.insert_count(), 1);

            // a forkchoice update to the poisoned tip is rejected the same way
            let update =
                t.api.fork_choice_updated_v2(head_state(child.hash()), None).await.unwrap();
            assert!(update.payload_status.status.is_invalid());
            assert_eq!(update.payload_status.latest_valid_hash, Some(genesis.hash()));
        }

        #[tokio::test]
        async fn downloader_bad_block_reports_poison_new_heads() {
            let t = setup();
            let genesis = genesis_block();
            t.chain.add_canonical_block(genesis.clone());
            let bad = child_block(&genesis, genesis.timestamp + 12);
            let origin = child_block(&bad, bad.timestamp + 12);

            // downloader found `bad` while syncing toward `origin`
            t.syncer.notify_bad_block(&bad.header, &origin.header);

            let update =
                t.api.fork_choice_updated_v2(head_state(origin.hash()), None).await.unwrap();
            assert!(update.payload_status.status.is_invalid());
            assert_eq!(update.payload_status.latest_valid_hash, Some(genesis.hash()));
        }
    }

    mod payload_bodies {
        use super::*;

        fn seeded_chain(t: &TestHarness) -> Vec<SealedBlock> {
            let genesis = genesis_block();
            let b1 = child_block(&genesis, genesis.timestamp + 12);
            let b2 = child_block(&b1, b1.timestamp + 12);
            let b3 = child_block(&b2, b2.timestamp + 12);
            for block in [&genesis, &b1, &b2, &b3] {
                t.chain.add_canonical_block(block.clone());
            }
            vec![genesis, b1, b2, b3]
        }

        #[tokio::test]
        async fn by_hash_preserves_order_and_gaps() {
            let t = setup();
            let chain = seeded_chain(&t);
            let bodies = t.api.get_payload_bodies_by_hash_v1(vec![
                chain[2].hash(),
                B256::repeat_byte(0x99),
                chain[1].hash(),
            ]);
            assert_eq!(bodies.len(), 3);
            assert_eq!(bodies[0].as_ref().unwrap().transactions, chain[2].transactions);
            assert!(bodies[1].is_none());
            assert_eq!(bodies[2].as_ref().unwrap().transactions, chain[1].transactions);
        }

        #[tokio::test]
        async fn by_range_clamps_to_head() {
            let t = setup();
            let chain = seeded_chain(&t);
            let bodies = t.api.get_payload_bodies_by_range_v1(1, 10).unwrap();
            // head is at height 3; genesis not included since start is 1
            assert_eq!(bodies.len(), 3);
            assert_eq!(bodies[0].as_ref().unwrap().transactions, chain[1].transactions);
            assert_eq!(bodies[2].as_ref().unwrap().transactions, chain[3].transactions);
        }

        #[tokio::test]
        async fn by_range_past_head_is_empty() {
            let t = setup();
            seeded_chain(&t);
            assert!(t.api.get_payload_bodies_by_range_v1(10, 5).unwrap().is_empty());
        }

        #[tokio::test]
        async fn by_range_near_max_start_does_not_overflow() {
            let t = setup();
            seeded_chain(&t);
            assert!(t.api.get_payload_bodies_by_range_v1(u64::MAX, 2).unwrap().is_empty());
            assert!(t
                .api
                .get_payload_bodies_by_range_v1(u64::MAX - 1, MAX_PAYLOAD_BODIES_LIMIT)
                .unwrap()
                .is_empty());
        }

        #[tokio::test]
        async fn by_range_rejects_zero_params() {
            let t = setup();
            seeded_chain(&t);
            assert_matches!(
                t.api.get_payload_bodies_by_range_v1(0, 5),
                Err(EngineApiError::InvalidParams(_))
            );
            assert_matches!(
                t.api.get_payload_bodies_by_range_v1(5, 0),
                Err(EngineApiError::InvalidParams(_))
            );
        }

        #[tokio::test]
        async fn by_range_rejects_oversized_requests() {
            let t = setup();
            seeded_chain(&t);
            assert_matches!(
                t.api.get_payload_bodies_by_range_v1(1, MAX_PAYLOAD_BODIES_LIMIT + 1),
                Err(EngineApiError::TooLargeRequest { count }) if count == MAX_PAYLOAD_BODIES_LIMIT + 1
            );
        }

        #[tokio::test]
        async fn withdrawals_are_present_and_possibly_empty() {
            let t = setup();
            let chain = seeded_chain(&t);
            let bodies = t.api.get_payload_bodies_by_hash_v1(vec![chain[1].hash()]);
            assert!(bodies[0].as_ref().unwrap().withdrawals.is_empty());
        }
    }

    #[tokio::test]
    async fn capabilities_list_the_served_methods() {
        let t = setup();
        let capabilities = t.api.exchange_capabilities(Vec::new());
        for method in [
            "engine_forkchoiceUpdatedV2",
            "engine_newPayloadV2",
            "engine_getPayloadV2",
            "engine_getPayloadBodiesByHashV1",
            "engine_getPayloadBodiesByRangeV1",
        ] {
            assert!(capabilities.iter().any(|c| c == method), "missing {method}");
        }
    }
}
