//! Error types for wire decoding.

use thiserror::Error;

/// Errors that can occur while decoding a relay frame.
///
/// The engine maps every variant to a silent drop; the distinction exists
/// for diagnostics and tests.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtoError {
    /// Frame text exceeds the relay's message size limit.
    #[error("frame too large: {len} bytes exceeds {max}")]
    Oversized {
        /// Observed size in bytes.
        len: usize,
        /// Maximum accepted size.
        max: usize,
    },

    /// Frame text is not a valid JSON object of any known shape.
    #[error("malformed frame: {reason}")]
    Malformed {
        /// Parser diagnostic.
        reason: String,
    },
}
