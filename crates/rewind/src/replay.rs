//! Replay engine: nearest-checkpoint seek and deterministic step-forward.
//!
//! Every path that moves the engine goes through [`Replayer::advance_to`]:
//! explicit seeks from the editor and background rebuilds from the scheduler
//! alike. Stepping has two side effects that keep the caches warm:
//!
//! - the frame cache records a summary for every frame past its watermark;
//! - any region slot whose desired frame equals the new engine frame (and
//!   that doesn't already hold it) captures the state on the spot.
//!
//! The second effect is what populates regions during ordinary scrubbing,
//! without the scheduler ever running.

use std::time::Instant;

use rewind_types::Frame;

use crate::checkpoint::Checkpoint;
use crate::config::TickBudget;
use crate::engine::{Engine, InputLog};
use crate::frame_cache::FrameCache;
use crate::region::{RegionRole, RegionTable};
use crate::ReplayError;

// ============================================================================
// Checkpoint Store
// ============================================================================

/// Identifies one checkpoint held by the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckpointId {
    /// The immutable frame-0 capture taken at construction.
    PowerOn,
    /// The playhead.
    Current,
    /// The frame before the playhead.
    Previous,
    /// Partial progress of a rebuild cut short by the tick budget.
    Scratch,
    /// Slot `index` of the region at table position `region`.
    Slot { region: usize, index: usize },
}

const SINGLETONS: [CheckpointId; 4] = [
    CheckpointId::PowerOn,
    CheckpointId::Current,
    CheckpointId::Previous,
    CheckpointId::Scratch,
];

/// Every checkpoint the cache owns: four singletons plus three region pools.
#[derive(Debug)]
pub struct CheckpointStore {
    power_on: Checkpoint,
    current: Checkpoint,
    previous: Checkpoint,
    scratch: Checkpoint,
    pub(crate) regions: RegionTable,
}

impl CheckpointStore {
    pub(crate) fn new(state_len: usize, parallel_threshold: usize, regions: RegionTable) -> Self {
        Self {
            power_on: Checkpoint::new(state_len, parallel_threshold),
            current: Checkpoint::new(state_len, parallel_threshold),
            previous: Checkpoint::new(state_len, parallel_threshold),
            scratch: Checkpoint::new(state_len, parallel_threshold),
            regions,
        }
    }

    pub fn get(&self, id: CheckpointId) -> &Checkpoint {
        match id {
            CheckpointId::PowerOn => &self.power_on,
            CheckpointId::Current => &self.current,
            CheckpointId::Previous => &self.previous,
            CheckpointId::Scratch => &self.scratch,
            CheckpointId::Slot { region, index } => self.regions.by_index(region).slot(index),
        }
    }

    fn get_mut(&mut self, id: CheckpointId) -> &mut Checkpoint {
        match id {
            CheckpointId::PowerOn => &mut self.power_on,
            CheckpointId::Current => &mut self.current,
            CheckpointId::Previous => &mut self.previous,
            CheckpointId::Scratch => &mut self.scratch,
            CheckpointId::Slot { region, index } => {
                self.regions.by_index_mut(region).slot_mut(index)
            }
        }
    }

    pub(crate) fn invalidate(&mut self, id: CheckpointId) {
        self.get_mut(id).invalidate();
    }

    pub fn regions(&self) -> &RegionTable {
        &self.regions
    }

    /// Every checkpoint in scan order: singletons, then region slots by role.
    pub fn iter(&self) -> impl Iterator<Item = (CheckpointId, &Checkpoint)> + '_ {
        let singletons = SINGLETONS.into_iter().map(|id| (id, self.get(id)));
        let slots = self.regions.in_role_order().flat_map(|(region, r)| {
            r.checkpoints()
                .enumerate()
                .map(move |(index, checkpoint)| (CheckpointId::Slot { region, index }, checkpoint))
        });
        singletons.chain(slots)
    }

    /// Invalidates every checkpoint except power-on that holds `start` or later.
    pub fn invalidate_from(&mut self, start: Frame) -> usize {
        let singles = [&mut self.current, &mut self.previous, &mut self.scratch]
            .into_iter()
            .map(|checkpoint| checkpoint.invalidate_from(start))
            .filter(|&invalidated| invalidated)
            .count();
        let slots: usize = self
            .regions
            .regions_mut()
            .map(|region| region.invalidate_from(start))
            .sum();
        singles + slots
    }
}

// ============================================================================
// Budget
// ============================================================================

/// Tracks consumption of one tick's rebuild budget.
#[derive(Debug)]
pub(crate) struct BudgetClock {
    budget: TickBudget,
    started: Instant,
    steps: u64,
}

impl BudgetClock {
    pub(crate) fn start(budget: TickBudget) -> Self {
        Self {
            budget,
            started: Instant::now(),
            steps: 0,
        }
    }

    fn record_step(&mut self) {
        self.steps += 1;
    }

    pub(crate) fn steps(&self) -> u64 {
        self.steps
    }

    pub(crate) fn exhausted(&self) -> bool {
        match self.budget {
            TickBudget::Time(limit) => self.started.elapsed() > limit,
            TickBudget::Steps(limit) => self.steps >= limit,
        }
    }
}

/// How an [`Replayer::advance_to`] call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Advance {
    /// The engine sits at the target frame.
    Reached,
    /// The budget ran out first; the engine sits at `frame`.
    OutOfBudget { frame: Frame },
}

// ============================================================================
// Replayer
// ============================================================================

/// Counters of the expensive operations performed by the replay engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    /// Checkpoints restored into the engine.
    pub restores: u64,
    /// Engine states captured into checkpoints.
    pub captures: u64,
    /// Simulation steps taken.
    pub steps: u64,
}

/// Owns the engine, the input log and every cache the replay fills.
#[derive(Debug)]
pub(crate) struct Replayer<E: Engine, L> {
    pub(crate) engine: E,
    pub(crate) inputs: L,
    pub(crate) store: CheckpointStore,
    pub(crate) frames: FrameCache<E::Summary>,
    pub(crate) stats: ReplayStats,
}

impl<E, L> Replayer<E, L>
where
    E: Engine,
    L: InputLog<Input = E::Input>,
{
    pub(crate) fn new(engine: E, inputs: L, store: CheckpointStore) -> Self {
        Self {
            engine,
            inputs,
            store,
            frames: FrameCache::new(),
            stats: ReplayStats::default(),
        }
    }

    /// The valid checkpoint closest before `target`, falling back to power-on.
    ///
    /// Only frames strictly before `target` qualify. A checkpoint at
    /// `target - 1` ends the scan early since nothing can beat it.
    pub(crate) fn find_nearest(&self, target: Frame) -> CheckpointId {
        let mut best: Option<(CheckpointId, u64)> = None;

        for (id, checkpoint) in self.store.iter() {
            let Some(frame) = checkpoint.frame() else {
                continue;
            };
            if frame >= target {
                continue;
            }
            let distance = target.as_u64() - frame.as_u64();
            if best.is_none_or(|(_, nearest)| distance < nearest) {
                best = Some((id, distance));
                if distance == 1 {
                    break;
                }
            }
        }

        best.map_or(CheckpointId::PowerOn, |(id, _)| id)
    }

    /// Loads checkpoint `id` into the engine.
    pub(crate) fn restore(&mut self, id: CheckpointId) -> Result<Frame, ReplayError> {
        let checkpoint = self.store.get(id);
        let frame = checkpoint
            .frame()
            .expect("restore target must be a valid checkpoint");

        self.engine
            .restore(checkpoint.state())
            .map_err(|source| ReplayError::Engine { frame, source })?;
        self.stats.restores += 1;

        let actual = self.engine.frame();
        if actual != frame {
            return Err(ReplayError::Desync {
                expected: frame,
                actual,
            });
        }

        self.record_summary(frame);
        Ok(frame)
    }

    /// Captures the live engine state into checkpoint `id`.
    pub(crate) fn capture(&mut self, id: CheckpointId) -> Result<(), ReplayError> {
        let frame = self.engine.frame();
        let checkpoint = self.store.get_mut(id);

        self.engine
            .capture(checkpoint.begin_capture())
            .map_err(|source| ReplayError::Engine { frame, source })?;
        checkpoint.finish_capture(frame);
        self.stats.captures += 1;
        Ok(())
    }

    /// Steps the engine one frame using the input for its current frame.
    pub(crate) fn step_once(&mut self) -> Result<Frame, ReplayError> {
        let from = self.engine.frame();
        let input = self
            .inputs
            .input(from)
            .ok_or(ReplayError::MissingInput { frame: from })?;

        self.engine
            .step(input)
            .map_err(|source| ReplayError::Engine { frame: from, source })?;
        self.stats.steps += 1;

        let expected = from.next();
        let actual = self.engine.frame();
        if actual != expected {
            return Err(ReplayError::Desync { expected, actual });
        }

        self.record_summary(actual);
        self.fill_regions(actual)?;
        Ok(actual)
    }

    /// Restores the nearest checkpoint and steps until the engine reaches `target`.
    ///
    /// With a budget, stepping stops at the first step boundary after the
    /// budget runs out.
    pub(crate) fn advance_to(
        &mut self,
        target: Frame,
        mut budget: Option<&mut BudgetClock>,
    ) -> Result<Advance, ReplayError> {
        let nearest = self.find_nearest(target);
        self.restore(nearest)?;

        while self.engine.frame() < target {
            let frame = self.step_once()?;
            if let Some(clock) = budget.as_deref_mut() {
                clock.record_step();
                if frame < target && clock.exhausted() {
                    return Ok(Advance::OutOfBudget { frame });
                }
            }
        }

        Ok(Advance::Reached)
    }

    fn record_summary(&mut self, frame: Frame) {
        if self.frames.is_stale(frame) {
            self.frames.record(frame, self.engine.summarize());
        }
    }

    /// Captures into every region slot that wants exactly `frame`.
    fn fill_regions(&mut self, frame: Frame) -> Result<(), ReplayError> {
        for role in RegionRole::ALL {
            let region = self.store.regions.index_of(role);
            if let Some(index) = self.store.regions.by_index(region).slot_wanting(frame) {
                self.capture(CheckpointId::Slot { region, index })?;
            }
        }
        Ok(())
    }
}
