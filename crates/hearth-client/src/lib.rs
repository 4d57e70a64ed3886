//! Hearth Session
//!
//! Action-based state machine tying the engine together: one [`Session`]
//! per participant per room. It receives events ([`SessionEvent`]) —
//! relay frames, application intents, time ticks — and returns actions
//! ([`SessionAction`]) for the caller to execute. The session never does
//! I/O and never sleeps; the caller owns the socket and the clock.
//!
//! # Roles
//!
//! The host mints and distributes group keys; guests load them. Both
//! encrypt and decrypt chat identically once keyed. The host runs a
//! debounced rekey on every membership change and a throttled rekey on
//! guest request; guests run an exponential-backoff retry while waiting
//! for their first group key.
//!
//! # Lifecycle
//!
//! `host()`/`join()` → frames exchanged → keyed → [`SessionEvent::Wipe`].
//! Wiping is terminal: it emits a best-effort `leave`, clears peers,
//! buffers, timers, and key material, and ignores everything afterwards.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod config;
mod error;
mod event;
mod peer;
mod session;

pub use config::SessionConfig;
pub use error::SessionError;
pub use event::{SessionAction, SessionEvent};
pub use hearth_core::{Environment, SystemEnv};
pub use peer::PeerRecord;
pub use session::Session;
