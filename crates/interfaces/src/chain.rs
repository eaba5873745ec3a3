use zond_primitives::{BlockHash, BlockNumber, SealedBlock, SealedHeader, B256};

/// Access to locally stored chain data plus the canonical-chain mutators the
/// engine layer needs.
///
/// Reads distinguish between a block being *present* and its post-execution
/// state being *available*: a block delivered out of order can be stored long
/// before it is executable.
#[auto_impl::auto_impl(&, Arc, Box)]
pub trait ChainStore: Send + Sync {
    /// Returns the block with the given hash, if present.
    fn block_by_hash(&self, hash: BlockHash) -> Option<SealedBlock>;

    /// Returns the block with the given hash if it sits at the given height.
    fn block(&self, hash: BlockHash, number: BlockNumber) -> Option<SealedBlock>;

    /// Returns the canonical block at the given height.
    fn block_by_number(&self, number: BlockNumber) -> Option<SealedBlock>;

    /// Whether both the block and its post-execution state are available.
    fn has_block_and_state(&self, hash: BlockHash, number: BlockNumber) -> bool;

    /// Header of the current canonical chain head.
    fn current_header(&self) -> SealedHeader;

    /// Hash of the canonical block at the given height, if any.
    fn canonical_hash(&self, number: BlockNumber) -> Option<BlockHash>;

    /// Reorganizes the canonical chain so the given block becomes its head.
    fn set_canonical(&self, block: &SealedBlock) -> Result<(), SetCanonicalError>;

    /// Marks the given header as finalized.
    fn set_finalized(&self, header: &SealedHeader);

    /// Marks the given header as safe.
    fn set_safe(&self, header: &SealedHeader);

    /// Executes the block and stores it without moving the chain head.
    fn insert_block_without_set_head(&self, block: &SealedBlock) -> Result<(), InsertBlockError>;
}

/// A reorg toward a new head failed partway.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("failed to set canonical head: {message}")]
pub struct SetCanonicalError {
    /// Hash of the deepest ancestor that is still valid after the failure.
    pub latest_valid_hash: B256,
    /// Reason the reorg was aborted.
    pub message: String,
}

/// Executing and storing a block failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct InsertBlockError(pub String);
