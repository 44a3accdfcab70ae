//! Shared fixtures for the scenario and property tests.

#![allow(dead_code)]

use rewind::{Engine, Frame, InputTimeline, RegionRole, SaveSystem, SaveSystemConfig, TickBudget};
use rewind_sim::{InputGenerator, SimEngine, SimInput, SimSaveSystem, SimSummary};

pub const SEED: u64 = 0xC0FFEE;
pub const STATE_LEN: usize = 256;

/// 64 global slots, 32 per block, 1000-frame blocks, step-counted ticks.
pub fn config() -> SaveSystemConfig {
    SaveSystemConfig::default()
        .with_global_budget(64 * STATE_LEN as u64)
        .with_block_budget(32 * STATE_LEN as u64)
        .with_block_len(1000)
        .with_tick_budget(TickBudget::Steps(2000))
        .with_lookahead(0)
        .with_parallel_copy_threshold(usize::MAX)
}

pub fn zero_inputs(len: u64) -> InputTimeline<SimInput> {
    InputTimeline::blank(len)
}

pub fn random_inputs(seed: u64, len: u64) -> InputTimeline<SimInput> {
    InputGenerator::new(seed)
        .with_change_probability(0.3)
        .timeline(len)
}

pub fn system_with(inputs: InputTimeline<SimInput>, config: SaveSystemConfig) -> SimSaveSystem {
    let engine = SimEngine::power_on(SEED, STATE_LEN).expect("valid state length");
    SaveSystem::new(engine, inputs, config).expect("system builds")
}

pub fn system(inputs: InputTimeline<SimInput>) -> SimSaveSystem {
    system_with(inputs, config())
}

/// Engine state at `frame` computed without the cache.
pub fn oracle(inputs: &InputTimeline<SimInput>, frame: Frame) -> SimEngine {
    rewind_sim::replay_from_power_on(SEED, STATE_LEN, inputs, frame).expect("oracle replay")
}

pub fn oracle_summary(inputs: &InputTimeline<SimInput>, frame: Frame) -> SimSummary {
    oracle(inputs, frame).summarize()
}

/// Ticks until every region is settled. Returns the number of ticks taken.
pub fn settle(system: &mut SimSaveSystem) -> usize {
    for tick in 1..=10_000 {
        if system.tick().expect("tick").progress >= 1.0 {
            return tick;
        }
    }
    panic!("progress stuck at {}", system.progress());
}

pub fn assert_region_invariant(system: &SimSaveSystem) {
    for role in RegionRole::ALL {
        let region = system.region(role);
        for slot in region.slots() {
            if !slot.needs_update {
                assert_eq!(
                    slot.frame,
                    Some(slot.desired_frame),
                    "{role:?} slot {} settled on the wrong frame",
                    slot.index
                );
                assert_eq!(
                    slot.desired_frame,
                    region.first_frame() + slot.index as u64 * region.padding()
                );
            }
        }
    }
}
