//! # rewind-sim: Reference Engine and Scenarios for rewind
//!
//! A seeded, fully deterministic stand-in for an emulator core, used to drive
//! the checkpoint cache end to end:
//!
//! - **`SimEngine`**: flat memory-image stepper with optional fault injection
//! - **`InputGenerator`**: seeded input logs
//! - **`SimRng`**: reproducible randomness
//! - **`scrub`**: a CLI that seeks, edits and ticks a cache from the command line
//!
//! The integration tests under `tests/` run every cache property against this
//! engine, with an independent replay from power-on as the oracle.

mod engine;
mod rng;
mod workload;

pub use engine::{Fault, HEADER_LEN, MIN_STATE_LEN, SimEngine, SimError, SimInput, SimSummary};
pub use rng::SimRng;
pub use workload::InputGenerator;

use std::time::Duration;

use anyhow::Context;
use tracing::debug;

use rewind::{Engine, InputLog, InputTimeline, SaveSystem, SaveSystemConfig, TickBudget};
use rewind_config::{CacheConfig, RewindConfig};
use rewind_types::Frame;

/// The cache type every scenario uses.
pub type SimSaveSystem = SaveSystem<SimEngine, InputTimeline<SimInput>>;

/// Converts file-level cache settings into the cache's own configuration.
pub fn save_system_config(cache: &CacheConfig) -> SaveSystemConfig {
    let tick_budget = match cache.tick_budget_steps {
        Some(steps) => TickBudget::Steps(steps),
        None => TickBudget::Time(Duration::from_millis(cache.tick_budget_ms)),
    };
    SaveSystemConfig::default()
        .with_global_budget(cache.global_budget_bytes())
        .with_block_budget(cache.block_budget_bytes())
        .with_block_len(cache.block_len)
        .with_tick_budget(tick_budget)
        .with_lookahead(cache.lookahead_frames)
        .with_parallel_copy_threshold(
            usize::try_from(cache.parallel_copy_threshold_bytes()).unwrap_or(usize::MAX),
        )
}

/// Builds a cache over a freshly powered-on engine and a generated input log.
pub fn build_system(config: &RewindConfig) -> anyhow::Result<SimSaveSystem> {
    debug!(
        seed = config.sim.seed,
        frames = config.sim.frames,
        state_len = config.sim.state_len,
        "building simulated trace"
    );
    let engine = SimEngine::power_on(config.sim.seed, config.sim.state_len)?;
    let inputs = InputGenerator::new(config.sim.seed).timeline(config.sim.frames);
    Ok(SaveSystem::new(
        engine,
        inputs,
        save_system_config(&config.cache),
    )?)
}

/// Replays `inputs` from power-on up to `frame` without any cache.
pub fn replay_from_power_on(
    seed: u64,
    state_len: usize,
    inputs: &InputTimeline<SimInput>,
    frame: Frame,
) -> anyhow::Result<SimEngine> {
    let mut engine = SimEngine::power_on(seed, state_len)?;
    while engine.frame() < frame {
        let input = inputs
            .input(engine.frame())
            .with_context(|| format!("input log ends before frame {frame}"))?;
        engine.step(input)?;
    }
    Ok(engine)
}
