//! Engine API backend for Zond.
//!
//! This crate wires the external consensus client to the local chain, sync
//! and payload-building subsystems. The consensus client drives the chain
//! through two calls: `engine_newPayloadV2` delivers blocks, and
//! `engine_forkchoiceUpdatedV2` moves the canonical head (optionally kicking
//! off payload construction for the next slot). Everything else here exists
//! to keep those two calls safe against reorgs, replays, unsynced state and
//! previously rejected chains.

mod api;
mod error;
mod heartbeat;
mod invalid;
mod metrics;
mod queue;
mod rpc;

pub use api::{ConsensusApi, ConsensusApiConfig, MAX_PAYLOAD_BODIES_LIMIT};
pub use error::{
    EngineApiError, EngineApiResult, INVALID_PARAMS_CODE, INVALID_PAYLOAD_ATTRIBUTES_CODE,
    REQUEST_TOO_LARGE_CODE, UNKNOWN_PAYLOAD_CODE,
};
pub use heartbeat::{HeartbeatConfig, HeartbeatHandle};
pub use invalid::InvalidChainTracker;
pub use queue::{HeaderQueue, PayloadQueue};
