//! Deterministic test environment.
//!
//! [`SimEnv`] implements the engine's environment trait with a virtual
//! clock that only moves when a test calls [`SimEnv::advance`] and a
//! seeded RNG, so every key, nonce, and timer decision in a test run is
//! reproducible from the seed.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use hearth_core::Environment;
use rand::{rngs::StdRng, RngCore as _, SeedableRng as _};

/// Wall-clock origin for simulated time (an arbitrary fixed date).
const WALL_BASE_SECS: u64 = 1_750_000_000;

/// A point in virtual time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SimInstant(Duration);

impl std::ops::Sub for SimInstant {
    type Output = Duration;

    fn sub(self, rhs: Self) -> Duration {
        self.0 - rhs.0
    }
}

struct Inner {
    elapsed: Duration,
    rng: StdRng,
}

/// Simulated environment: manual clock, seeded RNG.
///
/// Clones share the same clock and RNG stream, so several sessions driven
/// by clones of one `SimEnv` observe a single consistent timeline.
#[derive(Clone)]
pub struct SimEnv {
    inner: Arc<Mutex<Inner>>,
}

impl SimEnv {
    /// Create an environment whose RNG stream is derived from `seed`.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                elapsed: Duration::ZERO,
                rng: StdRng::seed_from_u64(seed),
            })),
        }
    }

    /// Move virtual time forward.
    pub fn advance(&self, delta: Duration) {
        #[allow(clippy::expect_used)]
        let mut inner = self.inner.lock().expect("sim clock lock poisoned");
        inner.elapsed += delta;
    }
}

impl Environment for SimEnv {
    type Instant = SimInstant;

    fn now(&self) -> Self::Instant {
        #[allow(clippy::expect_used)]
        let inner = self.inner.lock().expect("sim clock lock poisoned");
        SimInstant(inner.elapsed)
    }

    fn wall_clock_secs(&self) -> u64 {
        #[allow(clippy::expect_used)]
        let inner = self.inner.lock().expect("sim clock lock poisoned");
        WALL_BASE_SECS + inner.elapsed.as_secs()
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        #[allow(clippy::expect_used)]
        let mut inner = self.inner.lock().expect("sim clock lock poisoned");
        inner.rng.fill_bytes(buffer);
    }
}
