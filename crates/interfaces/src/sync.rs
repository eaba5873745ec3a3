use zond_primitives::SealedHeader;

/// Strategy the block downloader is configured with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SyncMode {
    /// Download and execute every block.
    #[default]
    Full,
    /// Bulk-load a recent state snapshot first. While a snap sync runs the
    /// database is assumed empty, so blocks must not be injected directly.
    Snap,
}

/// Callback invoked by the downloader when it encounters a bad block during
/// sync. Receives the invalid header and the origin of the sync cycle that
/// tripped over it.
pub type BadBlockHook = Box<dyn Fn(&SealedHeader, &SealedHeader) + Send + Sync>;

/// Handle to the beacon-guided block downloader.
#[auto_impl::auto_impl(&, Arc, Box)]
pub trait Syncer: Send + Sync {
    /// The currently configured sync strategy.
    fn sync_mode(&self) -> SyncMode;

    /// Starts (or retargets) a beacon sync toward the given head. The
    /// finalized header, when known, bounds how far back the downloader has
    /// to walk.
    fn beacon_sync(
        &self,
        mode: SyncMode,
        head: &SealedHeader,
        finalized: Option<&SealedHeader>,
    ) -> Result<(), SyncError>;

    /// Extends an already running beacon sync with a new target. Fails if no
    /// cycle is running or the header does not link to it.
    fn beacon_extend(&self, mode: SyncMode, head: &SealedHeader) -> Result<(), SyncError>;

    /// Registers the hook invoked when sync discovers a bad block.
    fn register_bad_block_hook(&self, hook: BadBlockHook);

    /// Marks the node as synced, unblocking sync-gated subsystems.
    fn set_synced(&self);
}

/// Errors the downloader can report back to the engine layer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    /// No beacon sync cycle is currently running.
    #[error("no beacon sync is currently running")]
    NotActive,
    /// The delivered header does not link to the running sync cycle.
    #[error("header does not extend the current sync target")]
    InvalidTarget,
    /// Downloader-internal failure.
    #[error("{0}")]
    Other(String),
}
