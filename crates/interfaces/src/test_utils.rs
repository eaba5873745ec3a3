//! Instrumented in-memory implementations of the node interfaces.

use crate::{
    chain::{ChainStore, InsertBlockError, SetCanonicalError},
    sync::{BadBlockHook, SyncError, SyncMode, Syncer},
    txpool::{PoolError, TxPoolSync},
};
use parking_lot::Mutex;
use std::{
    collections::{HashMap, HashSet},
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
};
use zond_primitives::{
    Block, BlockHash, BlockNumber, Bytes, Header, SealedBlock, SealedHeader, B256,
};

/// Returns a deterministic genesis block fixture.
pub fn genesis_block() -> SealedBlock {
    Block::assemble(
        Header { gas_limit: 30_000_000, timestamp: 1_700_000_000, ..Default::default() },
        Vec::new(),
        Vec::new(),
    )
    .seal_slow()
}

/// Builds a block on top of `parent` with the given timestamp.
pub fn child_block(parent: &SealedBlock, timestamp: u64) -> SealedBlock {
    Block::assemble(
        Header {
            parent_hash: parent.hash(),
            number: parent.number + 1,
            gas_limit: parent.gas_limit,
            timestamp,
            ..Default::default()
        },
        vec![Bytes::from(timestamp.to_be_bytes().to_vec())],
        Vec::new(),
    )
    .seal_slow()
}

/// In-memory [`ChainStore`] with call counters.
#[derive(Default)]
pub struct MockChainStore {
    blocks: Mutex<HashMap<BlockHash, SealedBlock>>,
    canonical: Mutex<HashMap<BlockNumber, BlockHash>>,
    states: Mutex<HashSet<BlockHash>>,
    head: Mutex<Option<BlockHash>>,
    finalized: Mutex<Option<BlockHash>>,
    safe: Mutex<Option<BlockHash>>,
    insert_failures: Mutex<HashMap<BlockHash, String>>,
    reorg_failure: Mutex<Option<SetCanonicalError>>,
    calls: AtomicUsize,
    insert_calls: AtomicUsize,
    set_canonical_calls: AtomicUsize,
}

// === impl MockChainStore ===

impl MockChainStore {
    /// Stores a block without touching the canonical chain or state.
    pub fn add_block(&self, block: SealedBlock) {
        self.blocks.lock().insert(block.hash(), block);
    }

    /// Marks the block's post-execution state as available.
    pub fn add_state(&self, hash: BlockHash) {
        self.states.lock().insert(hash);
    }

    /// Makes the block canonical at its height and the chain head.
    pub fn make_canonical(&self, block: &SealedBlock) {
        self.canonical.lock().insert(block.number, block.hash());
        *self.head.lock() = Some(block.hash());
    }

    /// Stores the block as an executed canonical head.
    pub fn add_canonical_block(&self, block: SealedBlock) {
        self.add_state(block.hash());
        self.make_canonical(&block);
        self.add_block(block);
    }

    /// Makes the next insertion of the given block fail.
    pub fn fail_insert(&self, hash: BlockHash, reason: &str) {
        self.insert_failures.lock().insert(hash, reason.to_string());
    }

    /// Makes the next reorg fail with the given error.
    pub fn fail_reorg(&self, error: SetCanonicalError) {
        *self.reorg_failure.lock() = Some(error);
    }

    /// Total number of trait method invocations.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }

    /// Number of block insertion attempts.
    pub fn insert_count(&self) -> usize {
        self.insert_calls.load(Ordering::Relaxed)
    }

    /// Number of reorg attempts.
    pub fn set_canonical_count(&self) -> usize {
        self.set_canonical_calls.load(Ordering::Relaxed)
    }

    /// Hash the store considers finalized, if any.
    pub fn finalized_hash(&self) -> Option<BlockHash> {
        *self.finalized.lock()
    }

    /// Hash the store considers safe, if any.
    pub fn safe_hash(&self) -> Option<BlockHash> {
        *self.safe.lock()
    }
}

impl ChainStore for MockChainStore {
    fn block_by_hash(&self, hash: BlockHash) -> Option<SealedBlock> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.blocks.lock().get(&hash).cloned()
    }

    fn block(&self, hash: BlockHash, number: BlockNumber) -> Option<SealedBlock> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.blocks.lock().get(&hash).filter(|block| block.number == number).cloned()
    }

    fn block_by_number(&self, number: BlockNumber) -> Option<SealedBlock> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        let hash = *self.canonical.lock().get(&number)?;
        self.blocks.lock().get(&hash).cloned()
    }

    fn has_block_and_state(&self, hash: BlockHash, _number: BlockNumber) -> bool {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.blocks.lock().contains_key(&hash) && self.states.lock().contains(&hash)
    }

    fn current_header(&self) -> SealedHeader {
        self.calls.fetch_add(1, Ordering::Relaxed);
        let head = self.head.lock().expect("mock chain has no head");
        self.blocks.lock().get(&head).expect("mock head block missing").header.clone()
    }

    fn canonical_hash(&self, number: BlockNumber) -> Option<BlockHash> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.canonical.lock().get(&number).copied()
    }

    fn set_canonical(&self, block: &SealedBlock) -> Result<(), SetCanonicalError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.set_canonical_calls.fetch_add(1, Ordering::Relaxed);
        if let Some(error) = self.reorg_failure.lock().take() {
            return Err(error)
        }
        self.add_state(block.hash());
        self.make_canonical(block);
        Ok(())
    }

    fn set_finalized(&self, header: &SealedHeader) {
        self.calls.fetch_add(1, Ordering::Relaxed);
        *self.finalized.lock() = Some(header.hash());
    }

    fn set_safe(&self, header: &SealedHeader) {
        self.calls.fetch_add(1, Ordering::Relaxed);
        *self.safe.lock() = Some(header.hash());
    }

    fn insert_block_without_set_head(&self, block: &SealedBlock) -> Result<(), InsertBlockError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.insert_calls.fetch_add(1, Ordering::Relaxed);
        if let Some(reason) = self.insert_failures.lock().get(&block.hash()) {
            return Err(InsertBlockError(reason.clone()))
        }
        self.add_state(block.hash());
        self.add_block(block.clone());
        Ok(())
    }
}

/// [`Syncer`] mock that records sync requests.
#[derive(Default)]
pub struct MockSyncer {
    mode: Mutex<SyncMode>,
    hook: Mutex<Option<BadBlockHook>>,
    synced: AtomicBool,
    accept_extensions: AtomicBool,
    sync_calls: AtomicUsize,
    extend_calls: AtomicUsize,
    last_sync_target: Mutex<Option<(B256, Option<B256>)>>,
}

// === impl MockSyncer ===

impl MockSyncer {
    /// Overrides the configured sync strategy.
    pub fn set_mode(&self, mode: SyncMode) {
        *self.mode.lock() = mode;
    }

    /// Makes `beacon_extend` succeed instead of reporting an inactive cycle.
    pub fn accept_extensions(&self, accept: bool) {
        self.accept_extensions.store(accept, Ordering::Relaxed);
    }

    /// Whether `set_synced` has been called.
    pub fn is_synced(&self) -> bool {
        self.synced.load(Ordering::Relaxed)
    }

    /// Number of sync starts requested.
    pub fn sync_count(&self) -> usize {
        self.sync_calls.load(Ordering::Relaxed)
    }

    /// Number of sync extensions requested.
    pub fn extend_count(&self) -> usize {
        self.extend_calls.load(Ordering::Relaxed)
    }

    /// Head and finalized hashes of the most recent sync start.
    pub fn last_sync_target(&self) -> Option<(B256, Option<B256>)> {
        *self.last_sync_target.lock()
    }

    /// Invokes the registered bad block hook, as the downloader would.
    pub fn notify_bad_block(&self, invalid: &SealedHeader, origin: &SealedHeader) {
        if let Some(hook) = self.hook.lock().as_ref() {
            hook(invalid, origin);
        }
    }
}

impl Syncer for MockSyncer {
    fn sync_mode(&self) -> SyncMode {
        *self.mode.lock()
    }

    fn beacon_sync(
        &self,
        _mode: SyncMode,
        head: &SealedHeader,
        finalized: Option<&SealedHeader>,
    ) -> Result<(), SyncError> {
        self.sync_calls.fetch_add(1, Ordering::Relaxed);
        *self.last_sync_target.lock() = Some((head.hash(), finalized.map(|h| h.hash())));
        Ok(())
    }

    fn beacon_extend(&self, _mode: SyncMode, _head: &SealedHeader) -> Result<(), SyncError> {
        self.extend_calls.fetch_add(1, Ordering::Relaxed);
        if self.accept_extensions.load(Ordering::Relaxed) {
            Ok(())
        } else {
            Err(SyncError::NotActive)
        }
    }

    fn register_bad_block_hook(&self, hook: BadBlockHook) {
        *self.hook.lock() = Some(hook);
    }

    fn set_synced(&self) {
        self.synced.store(true, Ordering::Relaxed);
    }
}

/// [`TxPoolSync`] mock with a failure switch.
#[derive(Default)]
pub struct MockTxPool {
    wait_calls: AtomicUsize,
    fail: AtomicBool,
}

// === impl MockTxPool ===

impl MockTxPool {
    /// Makes `wait_for_reset` fail.
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::Relaxed);
    }

    /// Number of reset waits requested.
    pub fn wait_count(&self) -> usize {
        self.wait_calls.load(Ordering::Relaxed)
    }
}

impl TxPoolSync for MockTxPool {
    fn wait_for_reset(&self) -> Result<(), PoolError> {
        self.wait_calls.fetch_add(1, Ordering::Relaxed);
        if self.fail.load(Ordering::Relaxed) {
            Err(PoolError("reset interrupted".to_string()))
        } else {
            Ok(())
        }
    }
}
