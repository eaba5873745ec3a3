/// The Engine API result type.
pub type EngineApiResult<Ok> = Result<Ok, EngineApiError>;

/// Unknown payload error code.
pub const UNKNOWN_PAYLOAD_CODE: i32 = -38001;

/// Invalid payload attributes error code.
pub const INVALID_PAYLOAD_ATTRIBUTES_CODE: i32 = -38003;

/// Request too large error code.
pub const REQUEST_TOO_LARGE_CODE: i32 = -38004;

/// Invalid params error code.
pub const INVALID_PARAMS_CODE: i32 = -32602;

/// Error returned by the engine endpoint.
///
/// Errors are reserved for requests the node cannot act on at all; outcomes
/// of acting on a well-formed request travel in the payload status instead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineApiError {
    /// No build job is registered under the requested payload id.
    #[error("payload does not exist / is not available")]
    UnknownPayload,
    /// The payload build attributes are unusable.
    #[error("invalid payload attributes: {0}")]
    InvalidPayloadAttributes(String),
    /// The payload bodies request exceeds the serving limit.
    #[error("requested count too large: {count}")]
    TooLargeRequest {
        /// The number of requested payload bodies.
        count: u64,
    },
    /// Malformed request parameters.
    #[error("invalid params: {0}")]
    InvalidParams(String),
}

// === impl EngineApiError ===

impl EngineApiError {
    /// Returns the error code this error is served with, as defined by the
    /// engine endpoint specification.
    pub const fn code(&self) -> i32 {
        match self {
            EngineApiError::UnknownPayload => UNKNOWN_PAYLOAD_CODE,
            EngineApiError::InvalidPayloadAttributes(_) => INVALID_PAYLOAD_ATTRIBUTES_CODE,
            EngineApiError::TooLargeRequest { .. } => REQUEST_TOO_LARGE_CODE,
            EngineApiError::InvalidParams(_) => INVALID_PARAMS_CODE,
        }
    }
}

impl From<EngineApiError> for jsonrpsee::core::Error {
    fn from(error: EngineApiError) -> Self {
        jsonrpsee::core::Error::Call(jsonrpsee::types::error::CallError::Custom(
            jsonrpsee::types::error::ErrorObject::owned(error.code(), error.to_string(), None::<()>),
        ))
    }
}
