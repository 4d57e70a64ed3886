//! Frame types and JSON encoding.

use serde::{Deserialize, Serialize};

use crate::ProtoError;

/// Maximum accepted frame size in bytes (the relay's message limit).
pub const MAX_FRAME_BYTES: usize = 16_384;

/// Self-announcement carrying a member's public material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelloFrame {
    /// Sender's participant id.
    pub cid: String,
    /// Ephemeral X25519 public key, base64.
    pub x: String,
    /// ML-KEM-512 encapsulation key, base64.
    pub k: String,
    /// Ed25519 identity key, base64.
    pub id: String,
}

/// An existing member introducing itself to a joiner.
///
/// Same material as `hello`; the distinct tag lets receivers insert the
/// peer without treating it as a fresh join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnounceFrame {
    /// Sender's participant id.
    pub cid: String,
    /// Ephemeral X25519 public key, base64.
    pub x: String,
    /// ML-KEM-512 encapsulation key, base64.
    pub k: String,
    /// Ed25519 identity key, base64.
    pub id: String,
}

/// KEM ciphertext (and transcript signature) from host to one guest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CtFrame {
    /// Sender's participant id.
    pub cid: String,
    /// Intended recipient.
    pub to: String,
    /// ML-KEM-512 ciphertext, base64.
    pub ct: String,
    /// Host's signature over the handshake transcript, base64.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sig: Option<String>,
}

/// Wrapped group key for one epoch, bound to the sender's roster view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GkFrame {
    /// Sender's participant id.
    pub cid: String,
    /// Intended recipient.
    pub to: String,
    /// Epoch this key establishes.
    pub e: u64,
    /// Roster hash, base64 of a 16-byte digest. Absent on legacy peers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rh: Option<String>,
    /// AEAD nonce, base64 of 24 bytes.
    pub n: String,
    /// Group key wrapped under the pairwise key, base64.
    pub ek: String,
}

/// Guest asking the host for a fresh group key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GkReqFrame {
    /// Sender's participant id.
    pub cid: String,
    /// The host being asked.
    pub to: String,
}

/// Encrypted application message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgFrame {
    /// Sender's participant id.
    pub cid: String,
    /// Sender's sequence number within the epoch.
    pub s: u64,
    /// Epoch the message was encrypted under.
    pub e: u64,
    /// AEAD nonce, base64 of 24 bytes.
    pub n: String,
    /// Ciphertext, base64.
    pub c: String,
}

/// Dummy ciphertext emitted by the traffic-shaping layer. Ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChaffFrame {
    /// Nominal sender id, if any.
    #[serde(default)]
    pub cid: String,
    /// Random nonce-shaped filler.
    #[serde(default)]
    pub n: String,
    /// Random ciphertext-shaped filler.
    #[serde(default)]
    pub c: String,
}

/// Departure notice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveFrame {
    /// Departing participant id.
    pub cid: String,
}

/// A relay frame, tagged by `t`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "t")]
pub enum Frame {
    /// `hello`: announce self and public keys.
    #[serde(rename = "hello")]
    Hello(HelloFrame),

    /// `announce`: tell a joining peer about an existing member.
    #[serde(rename = "announce")]
    Announce(AnnounceFrame),

    /// `ct`: KEM ciphertext delivery to a specific guest.
    #[serde(rename = "ct")]
    Ct(CtFrame),

    /// `gk`: wrapped group key for an epoch.
    #[serde(rename = "gk")]
    Gk(GkFrame),

    /// `gk_req`: rekey request from guest to host.
    #[serde(rename = "gk_req")]
    GkReq(GkReqFrame),

    /// `m`: encrypted application message.
    #[serde(rename = "m")]
    Msg(MsgFrame),

    /// `chaff`: shaping-layer filler, ignored by the engine.
    #[serde(rename = "chaff")]
    Chaff(ChaffFrame),

    /// `ping`: relay liveness, ignored by the engine.
    #[serde(rename = "ping")]
    Ping,

    /// `leave`: departure.
    #[serde(rename = "leave")]
    Leave(LeaveFrame),
}

impl Frame {
    /// The claimed sender of this frame, if the type carries one.
    pub fn sender(&self) -> Option<&str> {
        match self {
            Self::Hello(f) => Some(&f.cid),
            Self::Announce(f) => Some(&f.cid),
            Self::Ct(f) => Some(&f.cid),
            Self::Gk(f) => Some(&f.cid),
            Self::GkReq(f) => Some(&f.cid),
            Self::Msg(f) => Some(&f.cid),
            Self::Leave(f) => Some(&f.cid),
            Self::Chaff(_) | Self::Ping => None,
        }
    }

    /// The intended recipient, for frame types that address one.
    pub fn recipient(&self) -> Option<&str> {
        match self {
            Self::Ct(f) => Some(&f.to),
            Self::Gk(f) => Some(&f.to),
            Self::GkReq(f) => Some(&f.to),
            _ => None,
        }
    }
}

/// Encode a frame as JSON text for the relay.
pub fn encode(frame: &Frame) -> String {
    let Ok(text) = serde_json::to_string(frame) else {
        unreachable!("frame types serialize to JSON without error");
    };
    text
}

/// Decode relay text into a frame.
///
/// # Errors
///
/// - `ProtoError::Oversized` when the text exceeds [`MAX_FRAME_BYTES`]
///   (checked before any parsing)
/// - `ProtoError::Malformed` for anything that is not a known frame shape
pub fn decode(text: &str) -> Result<Frame, ProtoError> {
    if text.len() > MAX_FRAME_BYTES {
        return Err(ProtoError::Oversized { len: text.len(), max: MAX_FRAME_BYTES });
    }

    serde_json::from_str(text).map_err(|e| ProtoError::Malformed { reason: e.to_string() })
}
