//! Wire-level errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WireError {
    #[error("buffer too short: need {needed} bytes, have {remaining}")]
    BufferTooShort { needed: usize, remaining: usize },

    #[error("unknown command id: {0}")]
    UnknownCommand(u8),

    #[error("invalid UTF-8 string")]
    InvalidUtf8,

    #[error("string too long for u16 length prefix: {0} bytes")]
    StringTooLong(usize),

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
