//! Hearth Wire Protocol
//!
//! Typed JSON frames exchanged over the relay. The relay treats frames as
//! opaque text and broadcasts each one to every other member of the room,
//! so addressing (`to` fields) is honored by recipients, not the server.
//!
//! Every frame is a JSON object tagged by `"t"`. Byte-valued fields (keys,
//! nonces, ciphertexts) travel as standard base64 strings with padding;
//! decoding them is the engine's job, not this crate's. A traffic-shaping
//! layer above the engine may append a `pad` field to any frame; parsing
//! tolerates unknown fields for exactly that reason.
//!
//! # Security
//!
//! This crate provides structural validity only: a decoded frame has the
//! right shape, nothing more. Authentication happens in the engine (AEAD,
//! signatures). Malformed or oversized input yields an error the router
//! turns into a silent drop.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod error;
mod frame;

pub use error::ProtoError;
pub use frame::{
    decode, encode, AnnounceFrame, ChaffFrame, CtFrame, Frame, GkFrame, GkReqFrame, HelloFrame,
    LeaveFrame, MsgFrame, MAX_FRAME_BYTES,
};
