//! Inter-wallet pacing
//!
//! Wallets are processed one at a time with a random pause between them to
//! keep the request rate against the node low. The same RNG also feeds the
//! transfer policy's amount draws so a seeded run is reproducible.

use rand::prelude::*;
use rand::rngs::StdRng;
use std::time::Duration;
use tracing::debug;

use crate::config::DelayConfig;

/// Random delays plus the RNG shared with the transfer policy
pub struct Pacing {
    config: DelayConfig,
    rng: StdRng,
}

impl Pacing {
    /// Create pacing with optional seed
    pub fn new(config: DelayConfig, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        Self { config, rng }
    }

    /// Create pacing from entropy (random seed)
    pub fn from_entropy(config: DelayConfig) -> Self {
        Self::new(config, None)
    }

    /// Pause after a balance check, uniform real seconds
    pub fn balance_delay(&mut self) -> Duration {
        let [min, max] = self.config.balance_secs;
        if max <= min {
            return Duration::from_secs_f64(min.max(0.0));
        }
        Duration::from_secs_f64(self.rng.gen_range(min..=max))
    }

    /// Pause after a transfer, uniform whole seconds
    pub fn transfer_delay(&mut self) -> Duration {
        let [min, max] = self.config.transfer_secs;
        if max <= min {
            return Duration::from_secs(min);
        }
        Duration::from_secs(self.rng.gen_range(min..=max))
    }

    /// RNG for the transfer policy
    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Suspend the driver loop
    pub async fn pause(&self, delay: Duration) {
        if delay.is_zero() {
            return;
        }
        debug!("Sleeping {:.1}s before next wallet", delay.as_secs_f64());
        tokio::time::sleep(delay).await;
    }
}
