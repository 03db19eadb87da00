//! Feed Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A feed error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for feed operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The request could not be sent or the response could not be read.
    #[display("feed transport error")]
    Transport,
    /// The feed answered with a non-success status code.
    #[display("feed rejected the request: HTTP {_0}")]
    Status(#[error(not(source))] u16),
    /// The response body could not be decoded into the expected shape.
    #[display("malformed feed response")]
    Decode,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport => true,
            // 429 and 5xx are worth retrying on a later pass.
            Self::Status(code) => *code == 429 || *code >= 500,
            Self::Decode => false,
        }
    }
}
