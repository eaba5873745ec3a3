//! Controllable payload jobs and an instrumented builder for tests.

use crate::{BuildPayloadArgs, PayloadBuilder, PayloadBuilderError, PayloadJob};
use parking_lot::Mutex;
use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};
use zond_primitives::{Block, Header, U256};
use zond_rpc_types::engine::{ExecutionPayloadEnvelope, PayloadId};

/// Synthesizes the initial empty payload for the given build arguments.
pub fn empty_envelope(args: &BuildPayloadArgs) -> ExecutionPayloadEnvelope {
    let header = Header {
        parent_hash: args.parent,
        beneficiary: args.fee_recipient,
        mix_hash: args.prev_randao,
        timestamp: args.timestamp,
        ..Default::default()
    };
    let block = Block::assemble(header, Vec::new(), args.withdrawals.clone()).seal_slow();
    ExecutionPayloadEnvelope { execution_payload: block.into(), block_value: U256::ZERO }
}

/// A [`PayloadJob`] whose contents are controlled by the test.
pub struct TestPayloadJob {
    id: PayloadId,
    empty: ExecutionPayloadEnvelope,
    full: Mutex<Option<ExecutionPayloadEnvelope>>,
}

// === impl TestPayloadJob ===

impl TestPayloadJob {
    /// Creates a job holding the empty payload for the arguments.
    pub fn new(args: &BuildPayloadArgs) -> Self {
        Self { id: args.payload_id(), empty: empty_envelope(args), full: Mutex::new(None) }
    }

    /// Installs the payload a finishing build would produce.
    pub fn set_full(&self, envelope: ExecutionPayloadEnvelope) {
        *self.full.lock() = Some(envelope);
    }
}

#[async_trait::async_trait]
impl PayloadJob for TestPayloadJob {
    fn payload_id(&self) -> PayloadId {
        self.id
    }

    fn best_payload(&self) -> ExecutionPayloadEnvelope {
        self.full.lock().clone().unwrap_or_else(|| self.empty.clone())
    }

    async fn resolve(&self) -> ExecutionPayloadEnvelope {
        self.best_payload()
    }
}

/// A [`PayloadBuilder`] that spawns [`TestPayloadJob`]s and records calls.
#[derive(Default)]
pub struct TestPayloadBuilder {
    build_calls: AtomicUsize,
    fail: AtomicBool,
    last_job: Mutex<Option<Arc<TestPayloadJob>>>,
}

// === impl TestPayloadBuilder ===

impl TestPayloadBuilder {
    /// Makes `build_payload` fail.
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::Relaxed);
    }

    /// Number of build jobs requested.
    pub fn build_count(&self) -> usize {
        self.build_calls.load(Ordering::Relaxed)
    }

    /// The most recently spawned job, if any.
    pub fn last_job(&self) -> Option<Arc<TestPayloadJob>> {
        self.last_job.lock().clone()
    }
}

impl PayloadBuilder for TestPayloadBuilder {
    fn build_payload(
        &self,
        args: BuildPayloadArgs,
    ) -> Result<Arc<dyn PayloadJob>, PayloadBuilderError> {
        self.build_calls.fetch_add(1, Ordering::Relaxed);
        if self.fail.load(Ordering::Relaxed) {
            return Err(PayloadBuilderError::MissingParentBlock(args.parent))
        }
        let job = Arc::new(TestPayloadJob::new(&args));
        *self.last_job.lock() = Some(job.clone());
        Ok(job)
    }
}
