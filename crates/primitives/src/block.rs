use crate::{proofs, BlockHash, Header, SealedHeader, Withdrawal};
use alloy_primitives::Bytes;
use serde::{Deserialize, Serialize};
use std::ops::Deref;

/// A Zond block.
///
/// Transactions are carried as the opaque wire bytes they were submitted
/// with; decoding them is the execution layer's concern, not the block's.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    /// Block header.
    pub header: Header,
    /// Wire-encoded transactions.
    pub transactions: Vec<Bytes>,
    /// Validator withdrawals included in this block.
    pub withdrawals: Vec<Withdrawal>,
}

impl Block {
    /// Assembles a block from its parts, filling in the transaction and
    /// withdrawal commitments of the header.
    pub fn assemble(
        mut header: Header,
        transactions: Vec<Bytes>,
        withdrawals: Vec<Withdrawal>,
    ) -> Self {
        header.transactions_root = proofs::ordered_list_root(&transactions);
        header.withdrawals_root = proofs::ordered_list_root(&withdrawals);
        Self { header, transactions, withdrawals }
    }

    /// Seals the block with its computed block hash.
    pub fn seal_slow(self) -> SealedBlock {
        SealedBlock {
            header: self.header.seal_slow(),
            transactions: self.transactions,
            withdrawals: self.withdrawals,
        }
    }

    /// Seals the block with the given, already known hash.
    ///
    /// WARNING: the hash is not verified against the block contents.
    pub fn seal(self, hash: BlockHash) -> SealedBlock {
        SealedBlock {
            header: self.header.seal(hash),
            transactions: self.transactions,
            withdrawals: self.withdrawals,
        }
    }
}

/// A sealed block: header hash computed once and locked in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SealedBlock {
    /// The sealed block header.
    pub header: SealedHeader,
    /// Wire-encoded transactions.
    pub transactions: Vec<Bytes>,
    /// Validator withdrawals included in this block.
    pub withdrawals: Vec<Withdrawal>,
}

impl SealedBlock {
    /// The block hash this block was sealed with.
    pub const fn hash(&self) -> BlockHash {
        self.header.hash()
    }

    /// Unlocks the block again.
    pub fn unseal(self) -> Block {
        Block {
            header: self.header.unseal(),
            transactions: self.transactions,
            withdrawals: self.withdrawals,
        }
    }
}

impl Deref for SealedBlock {
    type Target = SealedHeader;

    fn deref(&self) -> &Self::Target {
        &self.header
    }
}
