//! Runtime configuration for the checkpoint cache.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ReplayError;

const MIB: u64 = 1024 * 1024;

/// How much rebuild work one scheduler tick may perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TickBudget {
    /// Wall-clock time per tick.
    Time(Duration),
    /// Simulation steps per tick. Deterministic; used for headless runs and tests.
    Steps(u64),
}

impl Default for TickBudget {
    fn default() -> Self {
        Self::Time(Duration::from_millis(8))
    }
}

/// Configuration for a [`SaveSystem`](crate::SaveSystem).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveSystemConfig {
    /// Memory budget for the whole-timeline region.
    pub global_budget_bytes: u64,
    /// Memory budget for each of the two block regions.
    pub block_budget_bytes: u64,
    /// Frames per block.
    pub block_len: u64,
    /// Rebuild work allowed per tick.
    pub tick_budget: TickBudget,
    /// Blank frames kept ahead of the playhead (0 disables growth).
    pub lookahead_frames: u64,
    /// State copies of at least this many bytes are split across threads.
    pub parallel_copy_threshold: usize,
}

impl Default for SaveSystemConfig {
    fn default() -> Self {
        Self {
            global_budget_bytes: 256 * MIB,
            block_budget_bytes: 128 * MIB,
            block_len: 1000,
            tick_budget: TickBudget::default(),
            lookahead_frames: 1000,
            parallel_copy_threshold: MIB as usize,
        }
    }
}

impl SaveSystemConfig {
    pub fn with_global_budget(mut self, bytes: u64) -> Self {
        self.global_budget_bytes = bytes;
        self
    }

    pub fn with_block_budget(mut self, bytes: u64) -> Self {
        self.block_budget_bytes = bytes;
        self
    }

    pub fn with_block_len(mut self, frames: u64) -> Self {
        self.block_len = frames;
        self
    }

    pub fn with_tick_budget(mut self, budget: TickBudget) -> Self {
        self.tick_budget = budget;
        self
    }

    pub fn with_lookahead(mut self, frames: u64) -> Self {
        self.lookahead_frames = frames;
        self
    }

    pub fn with_parallel_copy_threshold(mut self, bytes: usize) -> Self {
        self.parallel_copy_threshold = bytes;
        self
    }

    /// Rejects configurations the scheduler cannot run with.
    pub fn validate(&self) -> Result<(), ReplayError> {
        if self.block_len == 0 {
            return Err(ReplayError::Config("block_len must be positive".to_string()));
        }
        match self.tick_budget {
            TickBudget::Time(duration) if duration.is_zero() => Err(ReplayError::Config(
                "tick budget duration must be positive".to_string(),
            )),
            TickBudget::Steps(0) => Err(ReplayError::Config(
                "tick budget step count must be positive".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_budgets() {
        let config = SaveSystemConfig::default();
        assert_eq!(config.global_budget_bytes, 256 * MIB);
        assert_eq!(config.block_budget_bytes, 128 * MIB);
        assert_eq!(config.block_len, 1000);
        assert_eq!(config.tick_budget, TickBudget::Time(Duration::from_millis(8)));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_budgets_are_rejected() {
        let config = SaveSystemConfig::default().with_tick_budget(TickBudget::Steps(0));
        assert!(matches!(config.validate(), Err(ReplayError::Config(_))));

        let config = SaveSystemConfig::default().with_tick_budget(TickBudget::Time(Duration::ZERO));
        assert!(config.validate().is_err());

        let config = SaveSystemConfig::default().with_block_len(0);
        assert!(config.validate().is_err());
    }
}
