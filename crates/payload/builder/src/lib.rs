//! Payload building abstractions.
//!
//! A payload build job is started by a forkchoice update carrying build
//! attributes. The job immediately has a deliverable (empty) payload so the
//! consensus client never misses its slot, and keeps improving it with fuller
//! transaction sets until the payload is fetched.

mod error;
mod payload;
mod traits;

/// Test helpers: controllable build jobs and an instrumented builder.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use error::PayloadBuilderError;
pub use payload::BuildPayloadArgs;
pub use traits::{PayloadBuilder, PayloadJob};
