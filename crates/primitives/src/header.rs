use crate::{BlockHash, BlockNumber};
use alloy_primitives::{keccak256, Address, Bloom, Bytes, B256};
use alloy_rlp::{Encodable, RlpEncodable};
use serde::{Deserialize, Serialize};
use std::ops::Deref;

/// Block header.
///
/// Zond launched as a proof-of-stake chain, so the pre-merge fields (difficulty,
/// nonce, ommers) never existed here and withdrawals are present from genesis.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize, RlpEncodable)]
#[serde(rename_all = "camelCase")]
pub struct Header {
    /// The hash of the parent block.
    pub parent_hash: B256,
    /// The address that receives the priority fees of this block.
    pub beneficiary: Address,
    /// The root of the state trie after all transactions are executed.
    pub state_root: B256,
    /// The commitment to the ordered transaction list of this block.
    pub transactions_root: B256,
    /// The commitment to the receipts of this block's transactions.
    pub receipts_root: B256,
    /// The commitment to the ordered withdrawal list of this block.
    pub withdrawals_root: B256,
    /// The bloom filter over the logs of this block's receipts.
    pub logs_bloom: Bloom,
    /// The randomness beacon output mixed in by the consensus layer.
    pub mix_hash: B256,
    /// The height of this block.
    pub number: BlockNumber,
    /// The maximum gas the block is allowed to consume.
    pub gas_limit: u64,
    /// The gas consumed by all transactions in this block.
    pub gas_used: u64,
    /// The unix timestamp at which this block was created.
    pub timestamp: u64,
    /// Arbitrary bytes chosen by the block producer.
    pub extra_data: Bytes,
    /// The base fee per unit of gas, in wei.
    pub base_fee_per_gas: u64,
}

impl Header {
    /// Heavy function that recomputes the block hash from the RLP encoding.
    pub fn hash_slow(&self) -> B256 {
        let mut out = Vec::<u8>::new();
        self.encode(&mut out);
        keccak256(&out)
    }

    /// Seals the header with its computed block hash.
    pub fn seal_slow(self) -> SealedHeader {
        let hash = self.hash_slow();
        SealedHeader { header: self, hash }
    }

    /// Seals the header with the given, already known hash.
    ///
    /// WARNING: the hash is not verified against the header contents.
    pub fn seal(self, hash: B256) -> SealedHeader {
        SealedHeader { header: self, hash }
    }
}

/// A [`Header`] that is sealed: its hash is computed once and locked in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SealedHeader {
    /// The locked header fields.
    header: Header,
    /// The block hash.
    hash: BlockHash,
}

impl SealedHeader {
    /// Creates a sealed header without verifying the hash.
    pub const fn new(header: Header, hash: BlockHash) -> Self {
        Self { header, hash }
    }

    /// The block hash this header was sealed with.
    pub const fn hash(&self) -> BlockHash {
        self.hash
    }

    /// Returns a reference to the header fields.
    pub const fn header(&self) -> &Header {
        &self.header
    }

    /// Unlocks the header fields again.
    pub fn unseal(self) -> Header {
        self.header
    }
}

impl Deref for SealedHeader {
    type Target = Header;

    fn deref(&self) -> &Self::Target {
        &self.header
    }
}
