//! Commonly used types in Zond.
//!
//! This crate contains Zond primitive types shared by the chain, sync and
//! engine layers: headers, blocks and withdrawals, together with the sealing
//! helpers that bind a structure to its hash.

mod block;
mod header;
pub mod proofs;
mod withdrawal;

pub use block::{Block, SealedBlock};
pub use header::{Header, SealedHeader};
pub use withdrawal::Withdrawal;

pub use alloy_primitives::{
    keccak256, Address, Bloom, Bytes, B256, B64, U256, U64,
};

/// A block number.
pub type BlockNumber = u64;

/// A block hash.
pub type BlockHash = B256;
