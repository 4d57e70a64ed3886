//! XChaCha20-Poly1305 AEAD (24-byte nonce, 16-byte tag).
//!
//! Used both for chat messages (deterministic per-sender nonces) and for
//! wrapping group keys under pairwise keys (fresh random nonces). Nonces
//! are provided by the caller; this module never draws randomness.

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    XChaCha20Poly1305, XNonce,
};

use crate::{CryptoError, Result};

/// Key size (256 bits).
pub const KEY_SIZE: usize = 32;

/// Nonce size (192 bits; XChaCha20 extended nonce).
pub const NONCE_SIZE: usize = 24;

/// Poly1305 authentication tag size.
pub const TAG_SIZE: usize = 16;

/// Encrypt `plaintext` under `key`/`nonce`, authenticating `aad`.
///
/// Returns ciphertext with the 16-byte tag appended.
pub fn seal(
    key: &[u8; KEY_SIZE],
    nonce: &[u8; NONCE_SIZE],
    plaintext: &[u8],
    aad: &[u8],
) -> Vec<u8> {
    let cipher = XChaCha20Poly1305::new(key.into());
    let Ok(ciphertext) = cipher.encrypt(XNonce::from_slice(nonce), Payload { msg: plaintext, aad })
    else {
        unreachable!("XChaCha20-Poly1305 encryption cannot fail with valid inputs");
    };
    ciphertext
}

/// Decrypt and authenticate.
///
/// # Errors
///
/// `CryptoError::AeadAuthentication` if the key, nonce, ciphertext, or AAD
/// does not match what was sealed.
pub fn open(
    key: &[u8; KEY_SIZE],
    nonce: &[u8; NONCE_SIZE],
    ciphertext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>> {
    let cipher = XChaCha20Poly1305::new(key.into());
    cipher
        .decrypt(XNonce::from_slice(nonce), Payload { msg: ciphertext, aad })
        .map_err(|_| CryptoError::AeadAuthentication)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: [u8; KEY_SIZE] = [0x42; KEY_SIZE];
    const NONCE: [u8; NONCE_SIZE] = [0x01; NONCE_SIZE];

    #[test]
    fn seal_open_round_trip() {
        let ciphertext = seal(&KEY, &NONCE, b"hello room", b"aad");
        let plaintext = open(&KEY, &NONCE, &ciphertext, b"aad").unwrap();
        assert_eq!(plaintext, b"hello room");
    }

    #[test]
    fn ciphertext_carries_tag() {
        let ciphertext = seal(&KEY, &NONCE, b"msg", b"");
        assert_eq!(ciphertext.len(), 3 + TAG_SIZE);
    }

    #[test]
    fn empty_plaintext() {
        let ciphertext = seal(&KEY, &NONCE, b"", b"aad");
        assert_eq!(ciphertext.len(), TAG_SIZE);
        assert!(open(&KEY, &NONCE, &ciphertext, b"aad").unwrap().is_empty());
    }

    #[test]
    fn wrong_key_fails() {
        let ciphertext = seal(&KEY, &NONCE, b"msg", b"");
        assert!(open(&[0x43; KEY_SIZE], &NONCE, &ciphertext, b"").is_err());
    }

    #[test]
    fn wrong_nonce_fails() {
        let ciphertext = seal(&KEY, &NONCE, b"msg", b"");
        assert!(open(&KEY, &[0x02; NONCE_SIZE], &ciphertext, b"").is_err());
    }

    #[test]
    fn wrong_aad_fails() {
        let ciphertext = seal(&KEY, &NONCE, b"msg", b"aad-one");
        assert!(open(&KEY, &NONCE, &ciphertext, b"aad-two").is_err());
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let mut ciphertext = seal(&KEY, &NONCE, b"msg", b"");
        ciphertext[0] ^= 0xFF;
        assert_eq!(open(&KEY, &NONCE, &ciphertext, b""), Err(CryptoError::AeadAuthentication));
    }
}
