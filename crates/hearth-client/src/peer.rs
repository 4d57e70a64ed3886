//! Per-peer session state.

use hearth_core::PeerPublic;
use hearth_crypto::{b64, kem, sign};

/// Everything known about one counterparty, keyed by its `cid`.
///
/// Pairwise keys live in the roster, not here; this record carries the
/// public material plus whatever the handshake has produced so far.
#[derive(Debug, Clone)]
pub struct PeerRecord {
    /// The peer's public handshake material.
    pub public: PeerPublic,

    /// KEM ciphertext for this pair, once produced or received.
    pub kem_ciphertext: Option<Vec<u8>>,

    /// The initiator's transcript signature, once received.
    pub signature: Option<sign::Signature>,

    /// Whether that signature verified. `None` until checked.
    pub sig_ok: Option<bool>,

    /// Short authentication string, once the handshake ran.
    pub sas: Option<String>,
}

impl PeerRecord {
    /// Build a record from a peer's public material.
    pub fn new(public: PeerPublic) -> Self {
        Self { public, kem_ciphertext: None, signature: None, sig_ok: None, sas: None }
    }

    /// Decode the base64 material carried by `hello`/`announce` frames.
    ///
    /// Returns `None` when any field is malformed; the caller drops the
    /// frame silently.
    pub fn from_wire(x: &str, k: &str, id: &str) -> Option<Self> {
        let x_pub: [u8; 32] = b64::decode_array(x, "ecdh key").ok()?;

        let pq_pub = b64::decode(k).ok()?;
        if pq_pub.len() != kem::ENCAP_KEY_SIZE {
            return None;
        }

        let id_bytes: [u8; sign::PUBLIC_KEY_SIZE] = b64::decode_array(id, "identity key").ok()?;
        let id_pub = sign::VerifyingKey::from_bytes(&id_bytes).ok()?;

        Some(Self::new(PeerPublic { id_pub, x_pub, pq_pub }))
    }
}
