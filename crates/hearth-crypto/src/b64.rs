//! Base64 helpers (standard alphabet, `=` padding).
//!
//! Every key, nonce, and ciphertext field on the wire is standard base64
//! with padding. Handshake transcripts concatenate the encoded strings
//! directly, so both sides must use the exact same variant.

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::{CryptoError, Result};

/// Encode bytes as standard base64 with padding.
pub fn encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode standard base64.
///
/// # Errors
///
/// `CryptoError::Base64` if the input is not valid base64.
pub fn decode(text: &str) -> Result<Vec<u8>> {
    STANDARD.decode(text).map_err(|_| CryptoError::Base64)
}

/// Decode base64 into a fixed-size array.
///
/// # Errors
///
/// `CryptoError::Base64` on malformed input, `CryptoError::InvalidLength`
/// if the decoded size does not match `N`.
pub fn decode_array<const N: usize>(text: &str, what: &'static str) -> Result<[u8; N]> {
    let bytes = decode(text)?;
    let actual = bytes.len();
    bytes.try_into().map_err(|_| CryptoError::InvalidLength { what, expected: N, actual })
}
