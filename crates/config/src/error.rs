//! Configuration Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A configuration error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for configuration operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The layered sources could not be assembled into a valid config.
    #[display("configuration could not be assembled")]
    Invalid,
    /// No home directory to derive the default data location from.
    #[display("no usable home directory for application data")]
    NoHome,
}
