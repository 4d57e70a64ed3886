//! Pairwise hybrid handshake.
//!
//! Combines X25519 and ML-KEM-512 shared secrets over a canonical
//! transcript into one 32-byte pair key per (host, guest) pair. The pair
//! key never encrypts chat itself; it only wraps group keys. A 4-byte
//! short authentication string derived from the same transcript lets users
//! compare fingerprints out of band.
//!
//! The transcript is always ordered initiator-then-responder, so both
//! sides derive identical bytes regardless of which role they ran.

use thiserror::Error;
use zeroize::Zeroize;

use hearth_crypto::{b64, hash, kem, sign, CryptoError, KeyMaterial, SymmetricKey};
use rand_core::{CryptoRng, RngCore};

/// Transcript domain prefix.
const TRANSCRIPT_CONTEXT: &str = "NT-v1|handshake";

/// Info prefix for the final key-expansion block.
const EXPAND_INFO: &str = "NullTrace v1 handshake|room=";

/// Which side of the pair we are.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// The host: encapsulates and signs.
    Init,
    /// A guest: decapsulates and verifies.
    Resp,
}

/// A peer's public handshake material, as learned from a capsule or a
/// `hello`/`announce` frame.
#[derive(Debug, Clone)]
pub struct PeerPublic {
    /// Identity verification key.
    pub id_pub: sign::VerifyingKey,
    /// Ephemeral X25519 public key.
    pub x_pub: [u8; 32],
    /// ML-KEM-512 encapsulation key.
    pub pq_pub: Vec<u8>,
}

/// Everything a completed handshake produces.
#[derive(Debug)]
pub struct HandshakeOutcome {
    /// The derived pairwise key.
    pub pair_key: SymmetricKey,
    /// Short authentication string (base64 of 4 transcript-derived bytes).
    pub sas: String,
    /// KEM ciphertext to transmit to the peer. Initiator only.
    pub kem_ciphertext: Option<Vec<u8>>,
    /// Detached transcript signature to transmit. Initiator only.
    pub signature: Option<sign::Signature>,
    /// Whether the initiator's signature verified. Responder only, and
    /// `None` when the initiator sent no signature. Advisory: a mismatch
    /// is surfaced to the user but does not abort the pair.
    pub sig_ok: Option<bool>,
}

/// Handshake failures that abort the pair.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandshakeError {
    /// Responder ran before the initiator's KEM ciphertext arrived.
    #[error("responder handshake requires the initiator's kem ciphertext")]
    MissingCiphertext,

    /// A primitive rejected its input.
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

/// Run the hybrid handshake against `peer` in the given `role`.
///
/// The initiator encapsulates against the peer's KEM key and signs the
/// transcript; the responder requires the initiator's ciphertext
/// (`peer_ct`) and verifies the signature when one is supplied
/// (`peer_sig`). Both sides derive the same pair key and SAS.
///
/// # Errors
///
/// [`HandshakeError::MissingCiphertext`] for a responder without `peer_ct`;
/// [`HandshakeError::Crypto`] when key material is malformed.
pub fn handshake_with(
    local: &KeyMaterial,
    peer: &PeerPublic,
    peer_ct: Option<&[u8]>,
    peer_sig: Option<&sign::Signature>,
    role: Role,
    room: &str,
    rng: &mut (impl RngCore + CryptoRng),
) -> Result<HandshakeOutcome, HandshakeError> {
    let mut shared_x = local.ecdh_agree(&peer.x_pub);

    let (kem_ciphertext, mut shared_k) = match role {
        Role::Init => {
            let (ct, shared) = kem::encapsulate(&peer.pq_pub, rng)?;
            (Some(ct), shared)
        }
        Role::Resp => {
            let ct = peer_ct.ok_or(HandshakeError::MissingCiphertext)?;
            (None, local.kem_decapsulate(ct)?)
        }
    };

    let transcript = transcript(local, peer, role, room);

    let signature = match role {
        Role::Init => Some(local.sign(&transcript)),
        Role::Resp => None,
    };

    let sig_ok = match role {
        Role::Init => None,
        Role::Resp => peer_sig.map(|sig| peer.id_pub.verify(&transcript, sig).is_ok()),
    };

    let sas = b64::encode(&hash::digest::<4>(&transcript));

    let pair_key = derive_pair_key(&shared_x, &shared_k, &transcript, room);

    shared_x.zeroize();
    shared_k.zeroize();

    Ok(HandshakeOutcome { pair_key, sas, kem_ciphertext, signature, sig_ok })
}

/// Canonical transcript, initiator material first regardless of local role.
fn transcript(local: &KeyMaterial, peer: &PeerPublic, role: Role, room: &str) -> Vec<u8> {
    let local_id = b64::encode(&local.id_public().to_bytes());
    let local_x = b64::encode(&local.x_public());
    let local_pq = b64::encode(local.pq_public());

    let peer_id = b64::encode(&peer.id_pub.to_bytes());
    let peer_x = b64::encode(&peer.x_pub);
    let peer_pq = b64::encode(&peer.pq_pub);

    let (init, resp) = match role {
        Role::Init => ((&local_id, &local_x, &local_pq), (&peer_id, &peer_x, &peer_pq)),
        Role::Resp => ((&peer_id, &peer_x, &peer_pq), (&local_id, &local_x, &local_pq)),
    };

    format!(
        "{TRANSCRIPT_CONTEXT}|{room}|init.id={}|resp.id={}|init.x={}|resp.x={}|init.pq={}|resp.pq={}",
        init.0, resp.0, init.1, resp.1, init.2, resp.2,
    )
    .into_bytes()
}

/// Extract-then-expand over both shared secrets and the transcript.
fn derive_pair_key(
    shared_x: &[u8; 32],
    shared_k: &[u8; 32],
    transcript: &[u8],
    room: &str,
) -> SymmetricKey {
    let mut ikm = [0u8; 64];
    ikm[..32].copy_from_slice(shared_x);
    ikm[32..].copy_from_slice(shared_k);

    let mut salt: [u8; 32] = hash::digest(&ikm);
    let mut prk: [u8; 32] = hash::keyed_digest(&salt, transcript);

    let mut block = format!("{EXPAND_INFO}{room}").into_bytes();
    block.push(0x01);
    let okm: [u8; 32] = hash::keyed_digest(&prk, &block);

    ikm.zeroize();
    salt.zeroize();
    prk.zeroize();

    SymmetricKey::from(okm)
}
