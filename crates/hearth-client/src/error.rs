//! Error types for the session layer.
//!
//! Only caller-initiated operations error; inbound frames that fail any
//! check are dropped silently per protocol policy. The one exception is a
//! handshake abort (e.g. a malformed KEM ciphertext from the host), which
//! the caller needs to see to give up on the room.

use thiserror::Error;

use hearth_core::{CapsuleError, HandshakeError};

/// Errors surfaced by [`crate::Session`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The capsule handed to `join` was rejected.
    #[error(transparent)]
    Capsule(#[from] CapsuleError),

    /// The pairwise handshake aborted.
    #[error(transparent)]
    Handshake(#[from] HandshakeError),

    /// An operation reserved for the host was invoked on a guest.
    #[error("operation requires the initiator role")]
    NotInitiator,

    /// `Approve` named a peer we have never heard from.
    #[error("unknown peer: {cid}")]
    UnknownPeer {
        /// The peer id that was named.
        cid: String,
    },

    /// `Approve` named a peer that is not awaiting approval.
    #[error("peer {cid} is not awaiting approval")]
    NotPendingApproval {
        /// The peer id that was named.
        cid: String,
    },
}
