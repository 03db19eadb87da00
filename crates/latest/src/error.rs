//! Discovery Engine Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A discovery error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for discovery operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures that terminate a discovery pass.
///
/// Item-local problems (a chapter with no series relation, a failed page
/// lookup) never surface here; they ride the event stream as
/// [`WatchEvent::Error`](crate::WatchEvent::Error) entries instead.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The cache database could not be read or written.
    #[display("cache operation failed")]
    Cache,
    /// The chapter feed could not be reached or answered unusably.
    #[display("feed request failed")]
    Feed,
    /// A tracked batch could not be handed to the notifier.
    #[display("notification publish failed")]
    Notify,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Cache => false,
            Self::Feed | Self::Notify => true,
        }
    }
}
