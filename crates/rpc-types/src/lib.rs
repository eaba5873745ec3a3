//! Zond RPC type definitions.
//!
//! Provides the types exchanged over the engine endpoint between this node
//! and the external consensus client.

pub mod engine;

pub use engine::*;
