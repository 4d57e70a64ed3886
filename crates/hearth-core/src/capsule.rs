//! The access capsule: a signed, TTL-bound, size-padded invitation.
//!
//! A host mints one capsule per room and hands it to prospective guests
//! out of band. The capsule carries the host's identity key, ephemeral
//! handshake keys, room name, and a validity window, all signed over a
//! canonical transcript so no field can be swapped without detection.
//!
//! On the wire a capsule is `base64(JSON)`:
//!
//! ```text
//! { "payload": { "v", "alg", "room", "cid", "x", "k", "iat", "exp" },
//!   "id": <b64 identity key>, "sig": <b64 signature>, "pad": <filler> }
//! ```
//!
//! The `pad` field grows every capsule by a uniformly random amount so
//! encoded sizes do not leak room-name or key-material lengths.

use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use hearth_crypto::{b64, kem, sign, KeyMaterial};

/// Capsule format version.
pub const CAPSULE_VERSION: &str = "NT-C1";

/// Algorithm suite identifier.
pub const CAPSULE_ALG: &str = "Ed25519|X25519+ML-KEM-512";

/// Capsule validity window in seconds.
pub const CAPSULE_TTL_SECS: u64 = 120;

/// Hard cap on decoded capsule size; anything larger is rejected before
/// JSON parsing.
pub const MAX_DECODED_BYTES: usize = 4096;

/// Smallest random pad, in JSON bytes (~512 bytes of encoded growth).
const PAD_MIN: u32 = 375;

/// Spread of the random pad, in JSON bytes (~512 more bytes encoded).
const PAD_SPREAD: u32 = 385;

/// JSON overhead of the pad field itself: `,"pad":""`.
const PAD_FIELD_OVERHEAD: usize = 9;

const B64_ALPHABET: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// Reasons a capsule is rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CapsuleError {
    /// Not valid base64.
    #[error("capsule is not valid base64")]
    Base64,

    /// Decoded blob exceeds [`MAX_DECODED_BYTES`].
    #[error("capsule too large: {len} bytes decoded")]
    TooLarge {
        /// Decoded size.
        len: usize,
    },

    /// Not the expected JSON shape.
    #[error("capsule JSON is malformed")]
    Malformed,

    /// Envelope has no payload object.
    #[error("capsule has no payload")]
    MissingPayload,

    /// Payload has no expiry.
    #[error("capsule has no expiry")]
    MissingExpiry,

    /// Past its expiry.
    #[error("capsule expired at {exp}, now {now}")]
    Expired {
        /// Expiry timestamp.
        exp: u64,
        /// Current wall clock.
        now: u64,
    },

    /// Claims to be issued in the future.
    #[error("capsule issued in the future: iat {iat}, now {now}")]
    IssuedInFuture {
        /// Issuance timestamp.
        iat: u64,
        /// Current wall clock.
        now: u64,
    },

    /// Validity window wider than twice the TTL.
    #[error("capsule validity window too long: {window}s")]
    ValidityTooLong {
        /// Observed `exp - iat`.
        window: u64,
    },

    /// The `id` field is not a valid identity key.
    #[error("capsule identity key is malformed")]
    InvalidIdentity,

    /// Signature does not verify over the transcript.
    #[error("capsule signature verification failed")]
    BadSignature,

    /// The handshake key material inside the payload is malformed.
    #[error("capsule key material is malformed")]
    InvalidKeyMaterial,
}

#[derive(Debug, Serialize, Deserialize)]
struct CapsulePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    v: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    alg: Option<String>,
    room: String,
    cid: String,
    x: String,
    k: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    iat: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    exp: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CapsuleEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    payload: Option<CapsulePayload>,
    id: String,
    sig: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pad: Option<String>,
}

/// A successfully verified invitation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invitation {
    /// Room name.
    pub room: String,
    /// Host's participant id.
    pub cid: String,
    /// Host's ephemeral X25519 public key.
    pub x_pub: [u8; 32],
    /// Host's ML-KEM-512 encapsulation key.
    pub pq_pub: Vec<u8>,
    /// Host's identity key (the capsule signer).
    pub id_pub: sign::VerifyingKey,
    /// Capsule format version, absent on legacy capsules.
    pub ver: Option<String>,
    /// Algorithm suite, absent on legacy capsules.
    pub alg: Option<String>,
}

/// Canonical signing transcript: `|`-separated segments in fixed order.
///
/// Absent `v`/`alg` still contribute empty segments; an absent `iat` drops
/// its segment entirely. Both sides must produce identical bytes or
/// verification fails, which is the point.
fn transcript(payload: &CapsulePayload) -> Vec<u8> {
    let mut segments = vec![
        format!("v={}", payload.v.as_deref().unwrap_or("")),
        format!("alg={}", payload.alg.as_deref().unwrap_or("")),
        format!("room={}", payload.room),
        format!("cid={}", payload.cid),
        format!("x={}", payload.x),
        format!("k={}", payload.k),
    ];
    if let Some(iat) = payload.iat {
        segments.push(format!("iat={iat}"));
    }
    if let Some(exp) = payload.exp {
        segments.push(format!("exp={exp}"));
    }
    segments.join("|").into_bytes()
}

/// Build a capsule for `room` signed by `material`'s identity key.
///
/// `now` is Unix seconds; the capsule expires [`CAPSULE_TTL_SECS`] later.
pub fn create(
    room: &str,
    material: &KeyMaterial,
    now: u64,
    rng: &mut (impl RngCore + CryptoRng),
) -> String {
    let payload = CapsulePayload {
        v: Some(CAPSULE_VERSION.to_string()),
        alg: Some(CAPSULE_ALG.to_string()),
        room: room.to_string(),
        cid: material.cid().to_string(),
        x: b64::encode(&material.x_public()),
        k: b64::encode(material.pq_public()),
        iat: Some(now),
        exp: Some(now + CAPSULE_TTL_SECS),
    };

    let signature = material.sign(&transcript(&payload));

    let mut envelope = CapsuleEnvelope {
        payload: Some(payload),
        id: b64::encode(&material.id_public().to_bytes()),
        sig: b64::encode(&signature.to_bytes()),
        pad: None,
    };

    let Ok(unpadded) = serde_json::to_string(&envelope) else {
        unreachable!("capsule envelope serializes to JSON without error");
    };

    envelope.pad = Some(random_pad(unpadded.len(), rng));

    let Ok(json) = serde_json::to_string(&envelope) else {
        unreachable!("capsule envelope serializes to JSON without error");
    };

    b64::encode(json.as_bytes())
}

/// Random pad sized so the encoded capsule grows by a uniform amount,
/// clamped to keep the decoded blob under [`MAX_DECODED_BYTES`].
fn random_pad(unpadded_len: usize, rng: &mut (impl RngCore + CryptoRng)) -> String {
    let mut draw = [0u8; 4];
    rng.fill_bytes(&mut draw);
    let mut pad_len = (PAD_MIN + u32::from_be_bytes(draw) % PAD_SPREAD) as usize;

    let headroom = MAX_DECODED_BYTES.saturating_sub(unpadded_len + PAD_FIELD_OVERHEAD);
    pad_len = pad_len.min(headroom);

    let mut filler = vec![0u8; pad_len];
    rng.fill_bytes(&mut filler);
    filler.iter().map(|&b| B64_ALPHABET[(b % 64) as usize] as char).collect()
}

/// Parse and verify a capsule against the current wall clock.
///
/// # Errors
///
/// Every structural, temporal, or cryptographic defect maps to its own
/// [`CapsuleError`] variant; callers treat all of them as a rejection.
pub fn parse(text: &str, now: u64) -> Result<Invitation, CapsuleError> {
    let bytes = b64::decode(text.trim()).map_err(|_| CapsuleError::Base64)?;

    if bytes.len() > MAX_DECODED_BYTES {
        return Err(CapsuleError::TooLarge { len: bytes.len() });
    }

    let envelope: CapsuleEnvelope =
        serde_json::from_slice(&bytes).map_err(|_| CapsuleError::Malformed)?;

    let payload = envelope.payload.ok_or(CapsuleError::MissingPayload)?;

    let exp = payload.exp.ok_or(CapsuleError::MissingExpiry)?;
    if now > exp {
        return Err(CapsuleError::Expired { exp, now });
    }

    if let Some(iat) = payload.iat {
        if iat > now {
            return Err(CapsuleError::IssuedInFuture { iat, now });
        }
        let window = exp.saturating_sub(iat);
        if window > 2 * CAPSULE_TTL_SECS {
            return Err(CapsuleError::ValidityTooLong { window });
        }
    }

    let id_bytes: [u8; sign::PUBLIC_KEY_SIZE] =
        b64::decode_array(&envelope.id, "identity key").map_err(|_| CapsuleError::InvalidIdentity)?;
    let id_pub =
        sign::VerifyingKey::from_bytes(&id_bytes).map_err(|_| CapsuleError::InvalidIdentity)?;

    let sig_bytes: [u8; sign::SIGNATURE_SIZE] =
        b64::decode_array(&envelope.sig, "signature").map_err(|_| CapsuleError::BadSignature)?;
    let signature = sign::Signature::from_bytes(&sig_bytes);

    id_pub.verify(&transcript(&payload), &signature).map_err(|_| CapsuleError::BadSignature)?;

    let x_pub: [u8; 32] =
        b64::decode_array(&payload.x, "ecdh key").map_err(|_| CapsuleError::InvalidKeyMaterial)?;
    let pq_pub = b64::decode(&payload.k).map_err(|_| CapsuleError::InvalidKeyMaterial)?;
    if pq_pub.len() != kem::ENCAP_KEY_SIZE {
        return Err(CapsuleError::InvalidKeyMaterial);
    }

    Ok(Invitation {
        room: payload.room,
        cid: payload.cid,
        x_pub,
        pq_pub,
        id_pub,
        ver: payload.v,
        alg: payload.alg,
    })
}
