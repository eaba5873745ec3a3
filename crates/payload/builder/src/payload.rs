use alloy_rlp::Encodable;
use sha2::Digest;
use zond_primitives::{Address, Withdrawal, B256};
use zond_rpc_types::engine::{PayloadAttributes, PayloadId};

/// The arguments a payload is built with.
///
/// The derived [`PayloadId`] is a pure function of these arguments, so a
/// consensus client that retries the same request maps onto the already
/// running build job instead of starting a second one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildPayloadArgs {
    /// The parent block to build the payload on top of.
    pub parent: B256,
    /// The timestamp the payload should carry.
    pub timestamp: u64,
    /// The address the payload's priority fees should go to.
    pub fee_recipient: Address,
    /// The randomness beacon output to mix into the payload.
    pub prev_randao: B256,
    /// The withdrawals to include.
    pub withdrawals: Vec<Withdrawal>,
}

// === impl BuildPayloadArgs ===

impl BuildPayloadArgs {
    /// Assembles build arguments for the given parent hash and attributes.
    pub fn new(parent: B256, attributes: PayloadAttributes) -> Self {
        Self {
            parent,
            timestamp: attributes.timestamp,
            fee_recipient: attributes.suggested_fee_recipient,
            prev_randao: attributes.prev_randao,
            withdrawals: attributes.withdrawals.unwrap_or_default(),
        }
    }

    /// Derives the 8-byte payload build job id by hashing the components of
    /// the arguments.
    pub fn payload_id(&self) -> PayloadId {
        let mut hasher = sha2::Sha256::new();
        hasher.update(self.parent.as_slice());
        hasher.update(self.timestamp.to_be_bytes());
        hasher.update(self.prev_randao.as_slice());
        hasher.update(self.fee_recipient.as_slice());
        let mut buf = Vec::new();
        self.withdrawals.encode(&mut buf);
        hasher.update(&buf);
        let out = hasher.finalize();
        PayloadId::new(out.as_slice()[..8].try_into().expect("sufficient length"))
    }
}
