//! Consensus rules for the Zond proof-of-stake chain.
//!
//! Zond launched post-merge, so the beacon engine is the only consensus
//! engine that exists. The trait seam remains so the rest of the node does
//! not depend on a concrete engine, and so optional engine capabilities can
//! be queried explicitly instead of through runtime type checks.

use zond_primitives::{SealedHeader, B256};

/// Consensus validation applied to a block before it is imported.
#[auto_impl::auto_impl(&, Arc, Box)]
pub trait Consensus: std::fmt::Debug + Send + Sync {
    /// Validates a header against its parent.
    fn validate_header_against_parent(
        &self,
        header: &SealedHeader,
        parent: &SealedHeader,
    ) -> Result<(), ConsensusError>;

    /// Returns the threaded-sealing capability of the engine, if it has one.
    fn threaded(&self) -> Option<&dyn ThreadedConsensus>;
}

/// Optional capability of engines that run configurable sealing threads.
pub trait ThreadedConsensus: Send + Sync {
    /// Sets the number of threads the engine may use while sealing.
    fn set_threads(&self, threads: usize);
}

/// The beacon (proof-of-stake) consensus engine.
///
/// Sealing is driven entirely by the external consensus client, so the
/// engine itself only validates structural header rules.
#[derive(Debug, Clone, Default)]
#[non_exhaustive]
pub struct BeaconConsensus;

// === impl BeaconConsensus ===

impl BeaconConsensus {
    /// Creates the beacon consensus engine.
    pub const fn new() -> Self {
        Self
    }
}

impl Consensus for BeaconConsensus {
    fn validate_header_against_parent(
        &self,
        header: &SealedHeader,
        parent: &SealedHeader,
    ) -> Result<(), ConsensusError> {
        if header.parent_hash != parent.hash() {
            return Err(ConsensusError::ParentHashMismatch {
                expected: parent.hash(),
                got: header.parent_hash,
            })
        }
        if header.number != parent.number + 1 {
            return Err(ConsensusError::ParentBlockNumberMismatch {
                parent_number: parent.number,
                number: header.number,
            })
        }
        if header.timestamp <= parent.timestamp {
            return Err(ConsensusError::TimestampIsInPast {
                parent_timestamp: parent.timestamp,
                timestamp: header.timestamp,
            })
        }
        Ok(())
    }

    fn threaded(&self) -> Option<&dyn ThreadedConsensus> {
        None
    }
}

/// Consensus validation errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConsensusError {
    /// The header does not reference its parent.
    #[error("parent hash mismatch: expected {expected}, got {got}")]
    ParentHashMismatch {
        /// Hash of the parent the header was validated against.
        expected: B256,
        /// Parent hash the header carries.
        got: B256,
    },
    /// The header's height does not follow its parent's.
    #[error("block number {number} does not follow parent number {parent_number}")]
    ParentBlockNumberMismatch {
        /// The parent's height.
        parent_number: u64,
        /// The header's height.
        number: u64,
    },
    /// The header's timestamp does not advance past its parent's.
    #[error("invalid timestamp: {timestamp} is not after parent timestamp {parent_timestamp}")]
    TimestampIsInPast {
        /// The parent's timestamp.
        parent_timestamp: u64,
        /// The header's timestamp.
        timestamp: u64,
    },
}
