use jsonrpsee::{core::RpcResult, proc_macros::rpc};
use zond_primitives::{B256, U64};
use zond_rpc_types::engine::{
    ExecutionPayload, ExecutionPayloadBodyV1, ExecutionPayloadEnvelope, ForkchoiceState,
    ForkchoiceUpdated, PayloadAttributes, PayloadId, PayloadStatus,
};

/// The engine endpoint served to the external consensus client.
#[rpc(server)]
pub trait EngineApi {
    /// Submits a block the consensus layer deems potentially canonical.
    #[method(name = "engine_newPayloadV2")]
    async fn new_payload_v2(&self, payload: ExecutionPayload) -> RpcResult<PayloadStatus>;

    /// Updates the fork choice and optionally starts building a payload on
    /// top of the new head.
    #[method(name = "engine_forkchoiceUpdatedV2")]
    async fn fork_choice_updated_v2(
        &self,
        fork_choice_state: ForkchoiceState,
        payload_attributes: Option<PayloadAttributes>,
    ) -> RpcResult<ForkchoiceUpdated>;

    /// Returns the most recent version of the payload being built for the
    /// given id.
    #[method(name = "engine_getPayloadV2")]
    async fn get_payload_v2(&self, payload_id: PayloadId) -> RpcResult<ExecutionPayloadEnvelope>;

    /// Returns the execution payload bodies for the given block hashes.
    #[method(name = "engine_getPayloadBodiesByHashV1")]
    async fn get_payload_bodies_by_hash_v1(
        &self,
        block_hashes: Vec<B256>,
    ) -> RpcResult<Vec<Option<ExecutionPayloadBodyV1>>>;

    /// Returns the execution payload bodies for the canonical range
    /// `[start, start + count - 1]`, clamped to the current head.
    #[method(name = "engine_getPayloadBodiesByRangeV1")]
    async fn get_payload_bodies_by_range_v1(
        &self,
        start: U64,
        count: U64,
    ) -> RpcResult<Vec<Option<ExecutionPayloadBodyV1>>>;

    /// Returns the engine methods this node supports, given the methods the
    /// consensus client supports.
    #[method(name = "engine_exchangeCapabilities")]
    async fn exchange_capabilities(&self, capabilities: Vec<String>) -> RpcResult<Vec<String>>;
}
