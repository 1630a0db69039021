//! Per-worker randomness.
//!
//! Each worker owns one [`RandomSource`]; nothing here is shared between
//! threads. Two independent ChaCha20 streams are kept: the draw stream for
//! jitter/drop/tamper follows the run's master seed, while the entropy stream
//! for tokens and IVs is always seeded from the OS and never from `--seed`.

use rand::Rng;
use rand_chacha::ChaCha20Rng;
use rand_core::{OsRng, RngCore, SeedableRng};
use std::time::Duration;

use crate::crypto::seed_for;
use crate::latency::DelayRange;

const DST_DRAWS: &[u8] = b"tokensim/worker-draws/v1";

/// Master seed from the OS entropy source.
pub fn os_seed() -> u64 {
    OsRng.next_u64()
}

pub struct RandomSource {
    draws: ChaCha20Rng,
    entropy: ChaCha20Rng,
}

impl RandomSource {
    /// Draw stream keyed by the run's master seed; entropy stream fresh from the OS.
    pub fn for_worker(master: u64, worker: usize) -> Self {
        Self {
            draws: ChaCha20Rng::from_seed(seed_for(DST_DRAWS, master, worker)),
            entropy: ChaCha20Rng::from_entropy(),
        }
    }

    /// Inclusive uniform draw from `range`.
    pub fn delay(&mut self, range: DelayRange) -> Duration {
        let ms = if range.min_ms >= range.max_ms {
            range.min_ms
        } else {
            self.draws.gen_range(range.min_ms..=range.max_ms)
        };
        Duration::from_millis(ms)
    }

    /// True with probability `percent / 100`.
    pub fn chance(&mut self, percent: f64) -> bool {
        self.draws.gen::<f64>() < percent / 100.0
    }

    /// CSPRNG stream for tokens and IVs.
    pub fn entropy(&mut self) -> &mut ChaCha20Rng {
        &mut self.entropy
    }
}
