//! In-memory world block store and node-grid serialization.

pub mod block;
pub mod map;
pub mod serializer;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorldError {
    #[error("block payload length mismatch: expected {expected} bytes, got {got}")]
    LengthMismatch { expected: usize, got: usize },
}
