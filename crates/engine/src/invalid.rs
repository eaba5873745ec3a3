use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::warn;
use zond_primitives::{BlockHash, SealedHeader};
use zond_rpc_types::engine::{PayloadStatus, PayloadStatusEnum};

/// Number of times an invalid block may be referenced before its record is
/// dropped and a fresh import attempt is allowed. Guards against a locally
/// corrupted bad-block marker permanently splitting the node off the network.
const INVALID_BLOCK_HIT_EVICTION: usize = 128;

/// Maximum number of tracked chain tips descending from a bad block. Bounds
/// memory if a malicious peer keeps extending a rejected chain.
const INVALID_TIPSET_CAP: usize = 512;

/// Ephemeral tracker for invalid blocks and the chain tips descending from
/// them.
///
/// Records live only in memory and only cover tip segments seen since
/// startup; deep bad ancestries and restarts are handled by sync re-running
/// validation, not by this tracker. Its job is to answer "does this hash link
/// into a chain we already rejected?" cheaply, so the node neither re-executes
/// known-bad blocks nor syncs toward them.
#[derive(Debug, Default)]
pub struct InvalidChainTracker {
    inner: Mutex<TrackerInner>,
}

#[derive(Debug, Default)]
struct TrackerInner {
    /// Reference count per invalid block hash.
    block_hits: HashMap<BlockHash, usize>,
    /// Bad ancestor per tracked descendant chain tip.
    tipsets: HashMap<BlockHash, SealedHeader>,
}

impl TrackerInner {
    fn insert_tipset(&mut self, tip: BlockHash, ancestor: SealedHeader) {
        // Keep the map bounded; which entry goes is not important.
        while self.tipsets.len() >= INVALID_TIPSET_CAP {
            let Some(evicted) = self.tipsets.keys().next().copied() else { break };
            self.tipsets.remove(&evicted);
        }
        self.tipsets.insert(tip, ancestor);
    }
}

// === impl InvalidChainTracker ===

impl InvalidChainTracker {
    /// Creates an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a bad block the downloader tripped over, together with the
    /// sync origin that now counts as a tip descending from it.
    pub fn record_bad_ancestor(&self, invalid: &SealedHeader, origin: &SealedHeader) {
        let mut inner = self.inner.lock();
        *inner.block_hits.entry(invalid.hash()).or_default() += 1;
        inner.insert_tipset(origin.hash(), invalid.clone());
    }

    /// Records a block that just failed import as invalid. The block is its
    /// own (trivial) descendant tip, so resubmissions of the same payload
    /// resolve against the tracker instead of re-executing.
    pub fn record_invalid_block(&self, header: &SealedHeader) {
        let mut inner = self.inner.lock();
        inner.block_hits.insert(header.hash(), 1);
        inner.insert_tipset(header.hash(), header.clone());
    }

    /// Checks whether `check` links into a known-bad chain.
    ///
    /// If it does, returns the failure status to report for `head`, pointing
    /// at the parent of the bad ancestor as the last valid block, and marks
    /// `head` itself as descending from that ancestor so the poison follows
    /// the chain tip. Every positive answer counts as a hit; after
    /// [`INVALID_BLOCK_HIT_EVICTION`] hits the record is dropped and `None`
    /// is returned, allowing one fresh import attempt.
    pub fn check_invalid_ancestor(
        &self,
        check: BlockHash,
        head: BlockHash,
    ) -> Option<PayloadStatus> {
        let mut inner = self.inner.lock();
        let invalid = inner.tipsets.get(&check)?.clone();
        let bad_hash = invalid.hash();

        let hits = {
            let hits = inner.block_hits.entry(bad_hash).or_default();
            *hits += 1;
            *hits
        };
        if hits >= INVALID_BLOCK_HIT_EVICTION {
            warn!(
                target: "engine::api",
                number = invalid.number,
                hash = %bad_hash,
                "Too many bad block references, dropping the record to allow a retry"
            );
            inner.block_hits.remove(&bad_hash);
            inner.tipsets.retain(|_, ancestor| ancestor.hash() != bad_hash);
            return None
        }

        if check != head {
            warn!(
                target: "engine::api",
                head = %head,
                invalid = %bad_hash,
                "Marked new chain head as invalid"
            );
            inner.insert_tipset(head, invalid.clone());
        }
        Some(PayloadStatus {
            status: PayloadStatusEnum::Invalid {
                validation_error: "links to previously rejected block".to_string(),
            },
            latest_valid_hash: Some(invalid.parent_hash),
        })
    }
}
