//! Hearth Group-Key Engine
//!
//! The cryptographic core of an ephemeral, end-to-end encrypted chat room:
//! a host admits guests over an untrusted broadcast relay, every admitted
//! pair derives a hybrid (X25519 + ML-KEM-512) pairwise key, and the host
//! mints a fresh group key per epoch, wrapped to each member under their
//! pairwise key and bound to the host's view of the roster.
//!
//! # Components
//!
//! - [`env`]: time and randomness injection ([`env::Environment`])
//! - [`capsule`]: the signed, TTL-bound, size-padded invitation blob
//! - [`handshake`]: pairwise hybrid handshake with transcript signature and
//!   short authentication string
//! - [`group`]: the per-epoch message cipher with deterministic nonces,
//!   replay tracking, and a pending buffer for early messages
//! - [`roster`]: membership set, roster hash, group-key minting and loading
//!
//! # Concurrency
//!
//! Everything here is synchronous, single-writer state. The session layer
//! serializes all mutation on one task; the only asynchrony in the system
//! is the caller's I/O. Invariants (epoch monotonicity, per-sender replay
//! windows) rely on that single-writer property.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod capsule;
pub mod env;
pub mod group;
pub mod handshake;
pub mod roster;

pub use capsule::{CapsuleError, Invitation};
pub use env::{EnvRng, Environment, SystemEnv};
pub use group::{GroupCipher, GroupError};
pub use handshake::{HandshakeError, HandshakeOutcome, PeerPublic, Role};
pub use roster::Roster;
