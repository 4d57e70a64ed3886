//! Session timing configuration.

use std::time::Duration;

/// Tunable timings for one session.
///
/// The defaults are the protocol's deployed values; tests shrink or
/// stretch them to drive timer edges deterministically.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Coalescing window for membership-triggered rekeys. Every add or
    /// remove re-arms this timer; a burst of changes yields one rekey.
    pub rekey_debounce: Duration,

    /// Minimum spacing between rekeys triggered by external `gk_req`
    /// frames. Bounds the cost of request storms.
    pub rekey_throttle: Duration,

    /// How long a guest waits for its first group key after the pairwise
    /// handshake before asking for one.
    pub gk_retry_initial: Duration,

    /// Maximum number of `gk_req` sends; the delay doubles after each.
    pub gk_retry_max_attempts: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            rekey_debounce: Duration::from_millis(50),
            rekey_throttle: Duration::from_millis(800),
            gk_retry_initial: Duration::from_millis(300),
            gk_retry_max_attempts: 6,
        }
    }
}
