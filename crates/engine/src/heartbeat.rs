use parking_lot::Mutex;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::{sync::watch, task::JoinHandle, time};
use tracing::warn;

/// Time to wait for a consensus client to attach before warnings start.
const STARTUP_GRACE: Duration = Duration::from_secs(30);

/// How often the liveness check runs.
const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Maximum silence before the consensus client counts as offline.
const SILENCE_THRESHOLD: Duration = Duration::from_secs(2 * 60);

/// Minimum spacing between repeated offline warnings.
const WARN_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Tunables for the consensus-client liveness monitor.
#[derive(Debug, Clone)]
pub struct HeartbeatConfig {
    /// Silent period granted right after startup.
    pub startup_grace: Duration,
    /// Check frequency.
    pub interval: Duration,
    /// Silence after which the client counts as offline.
    pub silence_threshold: Duration,
    /// Minimum time between warnings.
    pub warn_interval: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            startup_grace: STARTUP_GRACE,
            interval: POLL_INTERVAL,
            silence_threshold: SILENCE_THRESHOLD,
            warn_interval: WARN_INTERVAL,
        }
    }
}

/// Timestamps of the most recent consensus-client interactions.
///
/// One lock per slot, so the monitor never contends with the request
/// handlers updating a different slot.
#[derive(Debug, Default)]
pub(crate) struct ConsensusUpdates {
    forkchoice: Mutex<Option<Instant>>,
    new_payload: Mutex<Option<Instant>>,
    handshake: Mutex<Option<Instant>>,
}

// === impl ConsensusUpdates ===

impl ConsensusUpdates {
    pub(crate) fn touch_forkchoice(&self) {
        *self.forkchoice.lock() = Some(Instant::now());
    }

    pub(crate) fn touch_new_payload(&self) {
        *self.new_payload.lock() = Some(Instant::now());
    }

    pub(crate) fn touch_handshake(&self) {
        *self.handshake.lock() = Some(Instant::now());
    }

    fn snapshot(&self) -> (Option<Instant>, Option<Instant>, Option<Instant>) {
        (*self.forkchoice.lock(), *self.new_payload.lock(), *self.handshake.lock())
    }
}

/// Handle to the spawned liveness monitor.
#[derive(Debug)]
pub struct HeartbeatHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

// === impl HeartbeatHandle ===

impl HeartbeatHandle {
    /// Stops the monitor and waits for its task to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }
}

/// Spawns the background task that nags the operator whenever the consensus
/// client goes quiet. The chain cannot progress without one, and a silently
/// missing consensus client is the most common broken-node setup.
pub(crate) fn spawn(updates: Arc<ConsensusUpdates>, config: HeartbeatConfig) -> HeartbeatHandle {
    let (shutdown, mut rx) = watch::channel(false);
    let task = tokio::spawn(async move {
        // Nothing can have attached yet right after startup.
        tokio::select! {
            _ = rx.changed() => return,
            _ = time::sleep(config.startup_grace) => {}
        }
        let mut last_warning: Option<Instant> = None;
        loop {
            tokio::select! {
                _ = rx.changed() => return,
                _ = time::sleep(config.interval) => {}
            }
            let (forkchoice, new_payload, handshake) = updates.snapshot();
            let recent =
                |at: Option<Instant>| at.is_some_and(|at| at.elapsed() <= config.silence_threshold);
            if recent(forkchoice) || recent(new_payload) {
                last_warning = None;
                continue
            }
            if last_warning.is_some_and(|at| at.elapsed() <= config.warn_interval) {
                continue
            }
            if forkchoice.is_none() && new_payload.is_none() {
                if handshake.is_none() {
                    warn!(
                        target: "engine::heartbeat",
                        "No consensus client seen. Please launch one to follow the chain!"
                    );
                } else {
                    warn!(
                        target: "engine::heartbeat",
                        "Consensus client connected, but never sent consensus updates. \
                         Please ensure it is operational to follow the chain!"
                    );
                }
            } else {
                warn!(
                    target: "engine::heartbeat",
                    "Consensus client online, but no consensus updates received in a while. \
                     Please fix it to follow the chain!"
                );
            }
            last_warning = Some(Instant::now());
        }
    });
    HeartbeatHandle { shutdown, task }
}
