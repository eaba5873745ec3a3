/// Synchronization handle for the transaction pool's background reset.
#[auto_impl::auto_impl(&, Arc, Box)]
pub trait TxPoolSync: Send + Sync {
    /// Blocks until any in-flight pool reset has finished, so that block
    /// production observes a settled pending set.
    ///
    /// Only used in deterministic simulator setups; regular block production
    /// tolerates a pool that is still catching up.
    fn wait_for_reset(&self) -> Result<(), PoolError>;
}

/// The transaction pool could not service the request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("transaction pool unavailable: {0}")]
pub struct PoolError(pub String);
