//! Interfaces between the engine core and the chain, sync and transaction
//! pool subsystems of a Zond node.

/// Chain storage and canonical-chain mutation.
pub mod chain;

/// Block download / sync orchestration.
pub mod sync;

/// Transaction pool synchronization.
pub mod txpool;

/// Instrumented in-memory implementations of the interfaces, for tests.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use chain::{ChainStore, InsertBlockError, SetCanonicalError};
pub use sync::{BadBlockHook, SyncError, SyncMode, Syncer};
pub use txpool::{PoolError, TxPoolSync};
