use parking_lot::Mutex;
use std::{collections::VecDeque, fmt, sync::Arc};
use zond_payload_builder::PayloadJob;
use zond_primitives::{BlockHash, SealedHeader};
use zond_rpc_types::engine::{ExecutionPayloadEnvelope, PayloadId};

/// Maximum number of remote headers remembered ahead of their import.
const IN_MEMORY_HEADERS: usize = 256;

/// Maximum number of local payload build jobs tracked at a time.
const IN_MEMORY_PAYLOADS: usize = 256;

/// Bounded cache of headers received via payload submission before the block
/// itself could be imported.
///
/// A later forkchoice update naming one of these hashes uses the stashed
/// header to aim the downloader at it. The cache evicts oldest-first; a head
/// old enough to be evicted will be re-delivered by the consensus client
/// anyway.
#[derive(Debug, Default)]
pub struct HeaderQueue {
    headers: Mutex<VecDeque<(BlockHash, SealedHeader)>>,
}

// === impl HeaderQueue ===

impl HeaderQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a header, evicting the oldest entry at capacity.
    pub fn put(&self, hash: BlockHash, header: SealedHeader) {
        let mut headers = self.headers.lock();
        headers.push_front((hash, header));
        headers.truncate(IN_MEMORY_HEADERS);
    }

    /// Returns the header stored under the given hash, if still cached.
    pub fn get(&self, hash: BlockHash) -> Option<SealedHeader> {
        self.headers.lock().iter().find(|(h, _)| *h == hash).map(|(_, header)| header.clone())
    }
}

/// Bounded cache of in-progress payload build jobs, keyed by payload id.
///
/// At most one job exists per id; callers check [`Self::has`] before
/// registering a new job for an id, under the same forkchoice lock.
#[derive(Default)]
pub struct PayloadQueue {
    payloads: Mutex<VecDeque<(PayloadId, Arc<dyn PayloadJob>)>>,
}

// === impl PayloadQueue ===

impl PayloadQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a build job, evicting the oldest entry at capacity.
    pub fn put(&self, id: PayloadId, job: Arc<dyn PayloadJob>) {
        let mut payloads = self.payloads.lock();
        payloads.push_front((id, job));
        payloads.truncate(IN_MEMORY_PAYLOADS);
    }

    /// Whether a build job is registered under the given id.
    pub fn has(&self, id: PayloadId) -> bool {
        self.payloads.lock().iter().any(|(i, _)| *i == id)
    }

    /// Returns the current payload of the job registered under the id.
    ///
    /// With `want_full` set the job is resolved to its final, maximally
    /// filled payload first; otherwise the best payload built so far is
    /// returned immediately.
    pub async fn get(&self, id: PayloadId, want_full: bool) -> Option<ExecutionPayloadEnvelope> {
        let job = {
            self.payloads.lock().iter().find(|(i, _)| *i == id).map(|(_, job)| job.clone())
        }?;
        if want_full {
            Some(job.resolve().await)
        } else {
            Some(job.best_payload())
        }
    }
}

impl fmt::Debug for PayloadQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PayloadQueue").field("len", &self.payloads.lock().len()).finish()
    }
}
