use metrics::{counter, Counter};

/// Engine endpoint call counters, recorded under the `engine.rpc` scope.
pub(crate) struct EngineApiMetrics {
    /// Number of forkchoice updates received.
    pub(crate) forkchoice_updated_messages: Counter,
    /// Number of payload submissions received.
    pub(crate) new_payload_messages: Counter,
    /// Number of payload fetches received.
    pub(crate) get_payload_messages: Counter,
    /// Number of payloads that failed import.
    pub(crate) invalid_blocks: Counter,
}

impl Default for EngineApiMetrics {
    fn default() -> Self {
        Self {
            forkchoice_updated_messages: counter!("engine.rpc.forkchoice_updated"),
            new_payload_messages: counter!("engine.rpc.new_payload"),
            get_payload_messages: counter!("engine.rpc.get_payload"),
            invalid_blocks: counter!("engine.rpc.invalid_blocks"),
        }
    }
}
