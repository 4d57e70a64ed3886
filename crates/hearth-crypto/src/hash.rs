//! BLAKE3 keyed hashing with variable-length output.
//!
//! The engine needs digests of several sizes from one primitive: 4 bytes
//! for the short authentication string, 16 for the roster digest, 24 for
//! deterministic AEAD nonces, 32 for key derivation. BLAKE3's XOF covers
//! all of them; the keyed mode takes a 32-byte key and doubles as the
//! extract/expand steps of the pair-key derivation.

/// Key size for the keyed mode (BLAKE3 requirement).
pub const KEY_SIZE: usize = 32;

/// Unkeyed digest of `data`, `N` bytes of XOF output.
pub fn digest<const N: usize>(data: &[u8]) -> [u8; N] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(data);
    let mut out = [0u8; N];
    hasher.finalize_xof().fill(&mut out);
    out
}

/// Keyed digest of `data` under a 32-byte key, `N` bytes of XOF output.
pub fn keyed_digest<const N: usize>(key: &[u8; KEY_SIZE], data: &[u8]) -> [u8; N] {
    let mut hasher = blake3::Hasher::new_keyed(key);
    hasher.update(data);
    let mut out = [0u8; N];
    hasher.finalize_xof().fill(&mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_deterministic() {
        let a: [u8; 24] = digest(b"hearth");
        let b: [u8; 24] = digest(b"hearth");
        assert_eq!(a, b);
    }

    #[test]
    fn digest_lengths_are_prefixes() {
        // XOF output: shorter digests are prefixes of longer ones
        let short: [u8; 4] = digest(b"input");
        let long: [u8; 32] = digest(b"input");
        assert_eq!(short, long[..4]);
    }

    #[test]
    fn keyed_differs_from_unkeyed() {
        let keyed: [u8; 32] = keyed_digest(&[1u8; 32], b"input");
        let plain: [u8; 32] = digest(b"input");
        assert_ne!(keyed, plain);
    }

    #[test]
    fn different_keys_differ() {
        let a: [u8; 32] = keyed_digest(&[1u8; 32], b"input");
        let b: [u8; 32] = keyed_digest(&[2u8; 32], b"input");
        assert_ne!(a, b);
    }

    #[test]
    fn different_inputs_differ() {
        let a: [u8; 16] = digest(b"roster-a");
        let b: [u8; 16] = digest(b"roster-b");
        assert_ne!(a, b);
    }
}
