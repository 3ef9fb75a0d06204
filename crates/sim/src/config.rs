// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

/// Default ceiling on the random extra delivery delay, in ticks.
pub const DEFAULT_MAX_DELAY: u64 = 5;

/// Tunables for one simulation run.
///
/// The seed fully determines delivery delays, so two runs with the same
/// config, topology, and event sequence produce identical snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimConfig {
    /// Seed for the delivery-delay PRNG.
    pub seed: u64,
    /// Messages are received between 1 and `max_delay` ticks after sending.
    pub max_delay: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self { seed: 0, max_delay: DEFAULT_MAX_DELAY }
    }
}

impl SimConfig {
    /// Config with the given seed and the default delay ceiling.
    pub fn with_seed(seed: u64) -> Self {
        Self { seed, ..Self::default() }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_delay == 0 {
            anyhow::bail!("max_delay must be at least 1");
        }
        Ok(())
    }
}
