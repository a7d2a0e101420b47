//! Store error types.

use derive_more::{Display, Error};
use tracing::instrument;

/// Persistence failure with location tracking.
///
/// `corrupt` marks data that was read back but cannot be decoded, as opposed
/// to an I/O or connection failure.
#[derive(Debug, Clone, Display, Error)]
#[display("Store error: {} at {}:{}", message, file, line)]
pub struct StoreError {
    /// Error message.
    pub message: String,
    /// Whether persisted data failed to decode.
    pub corrupt: bool,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl StoreError {
    /// Creates a new store error with caller location tracking.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message: message.into(),
            corrupt: false,
            line: loc.line(),
            file: loc.file(),
        }
    }

    /// Creates an error for persisted data that cannot be decoded.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn corrupt(message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message: message.into(),
            corrupt: true,
            line: loc.line(),
            file: loc.file(),
        }
    }
}

impl From<diesel::result::Error> for StoreError {
    #[track_caller]
    fn from(err: diesel::result::Error) -> Self {
        Self::new(format!("Diesel error: {}", err))
    }
}

impl From<diesel::ConnectionError> for StoreError {
    #[track_caller]
    fn from(err: diesel::ConnectionError) -> Self {
        Self::new(format!("Connection error: {}", err))
    }
}
