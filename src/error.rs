//! Error types shared by the sequence-analysis core.

use thiserror::Error;

/// Raised when a sequence cannot be analyzed. Distinguishes sequences that
/// are valid but too short for the requested computation from sequences
/// (or derived words) that cannot be interpreted at all.
#[derive(Debug, Error)]
pub enum SequenceError {
    #[error("sequence too short to analyze: {length} bases, need at least {minimum}")]
    TooShort { length: usize, minimum: usize },

    #[error("malformed sequence: {reason}")]
    Malformed { reason: String },
}

impl SequenceError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        SequenceError::Malformed {
            reason: reason.into(),
        }
    }
}
