//! Zond RPC interface definitions.
//!
//! Describes the engine endpoint this node serves to its consensus client.

mod engine;

pub use engine::EngineApiServer;
