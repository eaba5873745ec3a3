//! Engine API types: <https://github.com/ethereum/execution-apis/blob/main/src/engine/>

use serde::{Deserialize, Serialize};
use std::fmt;
use zond_primitives::{
    proofs, Address, Bloom, Bytes, Header, SealedBlock, Withdrawal, B256, B64, U256,
};

/// The list of all supported engine capabilities available over the engine endpoint.
pub const CAPABILITIES: [&str; 5] = [
    "engine_forkchoiceUpdatedV2",
    "engine_getPayloadBodiesByHashV1",
    "engine_getPayloadBodiesByRangeV1",
    "engine_getPayloadV2",
    "engine_newPayloadV2",
];

/// An identifier for a payload build job, derived from the build attributes so
/// that identical requests map to the same job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PayloadId(pub B64);

// === impl PayloadId ===

impl PayloadId {
    /// Creates a new payload id from the given identifier.
    pub const fn new(id: [u8; 8]) -> Self {
        Self(B64::new(id))
    }
}

impl fmt::Display for PayloadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// This structure maps on the ExecutionPayloadV2 structure of the engine spec.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionPayload {
    /// Hash of the parent block.
    pub parent_hash: B256,
    /// Address that receives the block's priority fees.
    pub fee_recipient: Address,
    /// Post-execution state root.
    pub state_root: B256,
    /// Receipts commitment.
    pub receipts_root: B256,
    /// Logs bloom of the block's receipts.
    pub logs_bloom: Bloom,
    /// Randomness beacon output for this slot.
    pub prev_randao: B256,
    /// Block height.
    pub block_number: u64,
    /// Gas limit of the block.
    pub gas_limit: u64,
    /// Total gas used by the block.
    pub gas_used: u64,
    /// Unix timestamp of the block.
    pub timestamp: u64,
    /// Extra bytes chosen by the block producer.
    pub extra_data: Bytes,
    /// Base fee per unit of gas.
    pub base_fee_per_gas: U256,
    /// Hash of this block.
    pub block_hash: B256,
    /// Wire-encoded transactions.
    pub transactions: Vec<Bytes>,
    /// Withdrawals pushed by the consensus layer.
    ///
    /// Withdrawals activate at genesis on Zond, so V2 payloads must always
    /// carry the field; it is optional only so a missing field can be
    /// rejected explicitly instead of silently defaulting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub withdrawals: Option<Vec<Withdrawal>>,
}

// === impl ExecutionPayload ===

impl ExecutionPayload {
    /// Converts the payload into a sealed block, recomputing the list
    /// commitments and verifying that the advertised block hash matches the
    /// hash of the reassembled header.
    pub fn try_into_sealed_block(self) -> Result<SealedBlock, PayloadError> {
        let base_fee_per_gas = u64::try_from(self.base_fee_per_gas)
            .map_err(|_| PayloadError::BaseFee(self.base_fee_per_gas))?;
        let withdrawals = self.withdrawals.unwrap_or_default();
        let header = Header {
            parent_hash: self.parent_hash,
            beneficiary: self.fee_recipient,
            state_root: self.state_root,
            transactions_root: proofs::ordered_list_root(&self.transactions),
            receipts_root: self.receipts_root,
            withdrawals_root: proofs::ordered_list_root(&withdrawals),
            logs_bloom: self.logs_bloom,
            mix_hash: self.prev_randao,
            number: self.block_number,
            gas_limit: self.gas_limit,
            gas_used: self.gas_used,
            timestamp: self.timestamp,
            extra_data: self.extra_data,
            base_fee_per_gas,
        };
        let sealed = header.seal_slow();
        if sealed.hash() != self.block_hash {
            return Err(PayloadError::BlockHash {
                execution: sealed.hash(),
                consensus: self.block_hash,
            })
        }
        Ok(SealedBlock {
            header: sealed,
            transactions: self.transactions,
            withdrawals,
        })
    }
}

impl From<SealedBlock> for ExecutionPayload {
    fn from(value: SealedBlock) -> Self {
        let block_hash = value.hash();
        let SealedBlock { header, transactions, withdrawals } = value;
        let header = header.unseal();
        ExecutionPayload {
            parent_hash: header.parent_hash,
            fee_recipient: header.beneficiary,
            state_root: header.state_root,
            receipts_root: header.receipts_root,
            logs_bloom: header.logs_bloom,
            prev_randao: header.mix_hash,
            block_number: header.number,
            gas_limit: header.gas_limit,
            gas_used: header.gas_used,
            timestamp: header.timestamp,
            extra_data: header.extra_data,
            base_fee_per_gas: U256::from(header.base_fee_per_gas),
            block_hash,
            transactions,
            withdrawals: Some(withdrawals),
        }
    }
}

/// The response to `engine_getPayloadV2`: the payload itself plus the fee
/// value the block is expected to yield.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionPayloadEnvelope {
    /// The built execution payload.
    pub execution_payload: ExecutionPayload,
    /// The expected value of the block, in wei.
    pub block_value: U256,
}

/// A reduced block body served by the `engine_getPayloadBodies` methods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionPayloadBodyV1 {
    /// Wire-encoded transactions of the block.
    pub transactions: Vec<Bytes>,
    /// Withdrawals of the block. Always present on Zond, possibly empty.
    pub withdrawals: Vec<Withdrawal>,
}

impl From<SealedBlock> for ExecutionPayloadBodyV1 {
    fn from(block: SealedBlock) -> Self {
        Self { transactions: block.transactions, withdrawals: block.withdrawals }
    }
}

/// This structure encapsulates the fork choice state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForkchoiceState {
    /// Hash of the desired chain head.
    pub head_block_hash: B256,
    /// Hash of the most recent "safe" block.
    pub safe_block_hash: B256,
    /// Hash of the most recent finalized block.
    pub finalized_block_hash: B256,
}

/// Attributes instructing the node to start building a payload on top of the
/// new head.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadAttributes {
    /// Timestamp the built payload should carry.
    pub timestamp: u64,
    /// Randomness beacon output to mix into the payload.
    pub prev_randao: B256,
    /// Address that should receive the payload's priority fees.
    pub suggested_fee_recipient: Address,
    /// Withdrawals to include. Required on Zond, where withdrawals activate
    /// at genesis.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub withdrawals: Option<Vec<Withdrawal>>,
}

/// The status of a submitted payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadStatus {
    /// The outcome of processing the payload.
    #[serde(flatten)]
    pub status: PayloadStatusEnum,
    /// Hash of the most recent valid block in the branch defined by the
    /// payload and its ancestors.
    pub latest_valid_hash: Option<B256>,
}

// === impl PayloadStatus ===

impl PayloadStatus {
    /// Creates a new payload status with the given latest valid hash.
    pub const fn new(status: PayloadStatusEnum, latest_valid_hash: B256) -> Self {
        Self { status, latest_valid_hash: Some(latest_valid_hash) }
    }

    /// Creates a new payload status without a latest valid hash.
    pub const fn from_status(status: PayloadStatusEnum) -> Self {
        Self { status, latest_valid_hash: None }
    }
}

impl fmt::Display for PayloadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PayloadStatus {{ status: {}, latestValidHash: {:?} }}",
            self.status, self.latest_valid_hash
        )
    }
}

/// Processing outcome of a payload or forkchoice update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PayloadStatusEnum {
    /// The payload is valid and was (or already had been) imported.
    Valid,
    /// The payload or one of its ancestors is invalid.
    Invalid {
        /// Human-readable reason the payload was rejected.
        #[serde(rename = "validationError")]
        validation_error: String,
    },
    /// The node cannot judge the payload yet and is syncing toward it.
    Syncing,
    /// The payload was stored for later import but not executed, because the
    /// required parent state is not available.
    Accepted,
}

// === impl PayloadStatusEnum ===

impl PayloadStatusEnum {
    /// Returns true if the status is invalid.
    pub const fn is_invalid(&self) -> bool {
        matches!(self, PayloadStatusEnum::Invalid { .. })
    }
}

impl fmt::Display for PayloadStatusEnum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadStatusEnum::Valid => f.write_str("VALID"),
            PayloadStatusEnum::Syncing => f.write_str("SYNCING"),
            PayloadStatusEnum::Accepted => f.write_str("ACCEPTED"),
            PayloadStatusEnum::Invalid { validation_error } => {
                write!(f, "INVALID: {validation_error}")
            }
        }
    }
}

/// The response of a forkchoice update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForkchoiceUpdated {
    /// Status of the head update.
    pub payload_status: PayloadStatus,
    /// Identifier of the build job started for the attached attributes, if
    /// any.
    pub payload_id: Option<PayloadId>,
}

// === impl ForkchoiceUpdated ===

impl ForkchoiceUpdated {
    /// Creates a response with the given payload status and no payload id.
    pub const fn new(payload_status: PayloadStatus) -> Self {
        Self { payload_status, payload_id: None }
    }

    /// Creates a response from a bare status, without hashes or ids.
    pub const fn from_status(status: PayloadStatusEnum) -> Self {
        Self { payload_status: PayloadStatus::from_status(status), payload_id: None }
    }

    /// Sets the latest valid hash of the payload status.
    pub fn with_latest_valid_hash(mut self, hash: B256) -> Self {
        self.payload_status.latest_valid_hash = Some(hash);
        self
    }

    /// Attaches the identifier of a started build job.
    pub fn with_payload_id(mut self, id: PayloadId) -> Self {
        self.payload_id = Some(id);
        self
    }
}

/// Error validating an execution payload before it reaches the chain.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayloadError {
    /// Invalid payload base fee.
    #[error("invalid payload base fee: {0}")]
    BaseFee(U256),
    /// The advertised block hash does not match the payload contents.
    #[error("invalid block hash: execution {execution}, consensus {consensus}")]
    BlockHash {
        /// The block hash computed from the payload.
        execution: B256,
        /// The block hash provided with the payload.
        consensus: B256,
    },
}
