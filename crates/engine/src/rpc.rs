//! `jsonrpsee` server glue for [`ConsensusApi`].

use crate::ConsensusApi;
use async_trait::async_trait;
use jsonrpsee::core::RpcResult;
use tracing::trace;
use zond_primitives::{B256, U64};
use zond_rpc_api::EngineApiServer;
use zond_rpc_types::engine::{
    ExecutionPayload, ExecutionPayloadBodyV1, ExecutionPayloadEnvelope, ForkchoiceState,
    ForkchoiceUpdated, PayloadAttributes, PayloadId, PayloadStatus,
};

#[async_trait]
impl EngineApiServer for ConsensusApi {
    async fn new_payload_v2(&self, payload: ExecutionPayload) -> RpcResult<PayloadStatus> {
        trace!(target: "rpc::engine", "Serving engine_newPayloadV2");
        Ok(ConsensusApi::new_payload_v2(self, payload).await?)
    }

    async fn fork_choice_updated_v2(
        &self,
        fork_choice_state: ForkchoiceState,
        payload_attributes: Option<PayloadAttributes>,
    ) -> RpcResult<ForkchoiceUpdated> {
        trace!(target: "rpc::engine", "Serving engine_forkchoiceUpdatedV2");
        Ok(ConsensusApi::fork_choice_updated_v2(self, fork_choice_state, payload_attributes)
            .await?)
    }

    async fn get_payload_v2(&self, payload_id: PayloadId) -> RpcResult<ExecutionPayloadEnvelope> {
        trace!(target: "rpc::engine", "Serving engine_getPayloadV2");
        Ok(ConsensusApi::get_payload_v2(self, payload_id).await?)
    }

    async fn get_payload_bodies_by_hash_v1(
        &self,
        block_hashes: Vec<B256>,
    ) -> RpcResult<Vec<Option<ExecutionPayloadBodyV1>>> {
        trace!(target: "rpc::engine", "Serving engine_getPayloadBodiesByHashV1");
        Ok(ConsensusApi::get_payload_bodies_by_hash_v1(self, block_hashes))
    }

    async fn get_payload_bodies_by_range_v1(
        &self,
        start: U64,
        count: U64,
    ) -> RpcResult<Vec<Option<ExecutionPayloadBodyV1>>> {
        trace!(target: "rpc::engine", "Serving engine_getPayloadBodiesByRangeV1");
        Ok(ConsensusApi::get_payload_bodies_by_range_v1(self, start.to::<u64>(), count.to::<u64>())?)
    }

    async fn exchange_capabilities(&self, capabilities: Vec<String>) -> RpcResult<Vec<String>> {
        trace!(target: "rpc::engine", "Serving engine_exchangeCapabilities");
        Ok(ConsensusApi::exchange_capabilities(self, capabilities))
    }
}
