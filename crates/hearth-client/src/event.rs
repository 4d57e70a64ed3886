//! Session events and actions.

use hearth_proto::Frame;

/// Events the caller feeds into a session.
///
/// The caller is responsible for receiving relay text, driving time
/// forward via ticks, and forwarding application intents.
#[derive(Debug, Clone)]
pub enum SessionEvent<I> {
    /// Raw text received from the relay. Malformed input is dropped
    /// silently inside the session.
    FrameReceived(String),

    /// Application wants to send a chat message.
    ///
    /// Before the first group key is installed this produces no frame;
    /// callers that want the text delivered later buffer it themselves.
    SendText(String),

    /// Host admits a guest that is awaiting approval.
    Approve {
        /// The guest's participant id.
        cid: String,
    },

    /// Explicitly mint and distribute a fresh group key (host only;
    /// a no-op on guests).
    Rekey,

    /// Time tick for timer processing. The caller sends these
    /// periodically; all debounce, throttle, and retry decisions happen
    /// here.
    Tick {
        /// Current time from the environment.
        now: I,
    },

    /// Tear the session down: best-effort `leave`, then drop all state.
    Wipe,
}

/// Actions a session produces for the caller to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// Transmit a frame to the relay.
    SendFrame(Frame),

    /// Deliver a decrypted chat message to the application.
    DeliverText {
        /// Sender's participant id.
        cid: String,
        /// Decrypted message text.
        text: String,
    },

    /// A guest said hello and awaits the host's approval.
    ApprovalRequested {
        /// The guest's participant id.
        cid: String,
    },

    /// A pairwise handshake completed; show the short authentication
    /// string for out-of-band comparison.
    SasReady {
        /// The peer the SAS was derived with.
        cid: String,
        /// The short authentication string.
        sas: String,
    },

    /// The peer's transcript signature did not verify. Advisory; the
    /// pair continues, but the UI should say so once.
    SignatureMismatch {
        /// The peer whose signature failed.
        cid: String,
    },

    /// A group key is installed; encrypted chat can flow.
    Ready {
        /// The epoch that became active.
        epoch: u64,
    },

    /// A peer left the room.
    PeerLeft {
        /// The departed peer's participant id.
        cid: String,
    },

    /// The session finished tearing down.
    Wiped,
}
