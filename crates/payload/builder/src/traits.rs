use crate::{BuildPayloadArgs, PayloadBuilderError};
use std::sync::Arc;
use zond_rpc_types::engine::{ExecutionPayloadEnvelope, PayloadId};

/// A handle to an in-progress block assembly job.
///
/// The job starts with an empty payload so there is always something to
/// deliver, and replaces it with better-filled candidates as the builder
/// progresses. Readers never observe a torn payload: each accessor returns a
/// complete snapshot.
#[async_trait::async_trait]
pub trait PayloadJob: Send + Sync + 'static {
    /// The id this job was registered under.
    fn payload_id(&self) -> PayloadId;

    /// Returns the best payload assembled so far, without waiting for the
    /// build to finish.
    fn best_payload(&self) -> ExecutionPayloadEnvelope;

    /// Finalizes the build with maximal transaction inclusion and returns the
    /// result. May wait for an in-flight full build; repeated calls are
    /// idempotent unless the builder produced a better payload in between.
    async fn resolve(&self) -> ExecutionPayloadEnvelope;
}

/// A type that can spawn payload build jobs.
#[auto_impl::auto_impl(&, Arc)]
pub trait PayloadBuilder: Send + Sync {
    /// Starts building a payload for the given arguments and returns a handle
    /// to the job.
    fn build_payload(
        &self,
        args: BuildPayloadArgs,
    ) -> Result<Arc<dyn PayloadJob>, PayloadBuilderError>;
}
