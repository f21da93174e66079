// ABOUTME: Request/reply engine module. Connection-pool-backed command dispatch over RESP3

pub mod engine;
pub mod error;

pub use engine::{Engine, PushCallback};
pub use error::{EngineError, EngineResult};
