//! The public façade over the checkpoint cache.

use std::mem;

use rewind_types::Frame;
use tracing::{debug, info, warn};

use crate::checkpoint::{Checkpoint, CheckpointPool};
use crate::config::SaveSystemConfig;
use crate::engine::{Engine, InputLog};
use crate::input::InputTimeline;
use crate::region::{Region, RegionRole, RegionTable};
use crate::replay::{CheckpointId, CheckpointStore, ReplayStats, Replayer};
use crate::scheduler::{self, RebuildScheduler, TickReport};
use crate::ReplayError;

/// Checkpoint cache for scrubbing and editing a deterministic replay.
///
/// Owns the engine, the input log, every checkpoint and the frame cache.
/// All mutation goes through `&mut self`, so the single-writer rule holds
/// by construction.
///
/// # Example
///
/// ```ignore
/// let mut system = SaveSystem::new(engine, InputTimeline::blank(2500), SaveSystemConfig::default())?;
/// system.set_current_frame(Frame::new(2400))?;
/// loop {
///     let report = system.tick()?;
///     if report.progress >= 1.0 { break; }
/// }
/// ```
#[derive(Debug)]
pub struct SaveSystem<E: Engine, L> {
    replayer: Replayer<E, L>,
    scheduler: RebuildScheduler,
    config: SaveSystemConfig,
    playhead: Frame,
}

impl<E, L> SaveSystem<E, L>
where
    E: Engine,
    L: InputLog<Input = E::Input>,
{
    /// Builds the cache around an engine sitting at power-on.
    ///
    /// Allocates every checkpoint up front: pool sizes are the configured
    /// budgets divided by `engine.state_len()`.
    pub fn new(engine: E, inputs: L, config: SaveSystemConfig) -> Result<Self, ReplayError> {
        config.validate()?;

        let state_len = engine.state_len();
        if state_len == 0 {
            return Err(ReplayError::Config(
                "engine reports an empty state image".to_string(),
            ));
        }
        let actual = engine.frame();
        if actual != Frame::ZERO {
            return Err(ReplayError::Desync {
                expected: Frame::ZERO,
                actual,
            });
        }

        let threshold = config.parallel_copy_threshold;
        let pool = |budget| Region::new(CheckpointPool::with_budget(budget, state_len, threshold));
        let regions = RegionTable::new(
            pool(config.global_budget_bytes),
            pool(config.block_budget_bytes),
            pool(config.block_budget_bytes),
        );
        info!(
            state_len,
            global_slots = regions.get(RegionRole::Global).len(),
            block_slots = regions.get(RegionRole::CurrentBlock).len(),
            "allocated checkpoint pools"
        );

        let store = CheckpointStore::new(state_len, threshold, regions);
        let mut replayer = Replayer::new(engine, inputs, store);
        replayer.capture(CheckpointId::PowerOn)?;

        let mut system = Self {
            replayer,
            scheduler: RebuildScheduler::new(&config),
            config,
            playhead: Frame::ZERO,
        };
        system.reset()?;
        Ok(system)
    }

    // ------------------------------------------------------------------------
    // Seeking and editing
    // ------------------------------------------------------------------------

    /// Moves the playhead to `frame`.
    ///
    /// Afterwards the current checkpoint holds `frame` and, for `frame > 0`,
    /// the previous checkpoint holds `frame - 1`.
    pub fn set_current_frame(&mut self, frame: Frame) -> Result<(), ReplayError> {
        let len = self.replayer.inputs.len();
        if frame.as_u64() >= len {
            return Err(ReplayError::FrameOutOfRange { frame, len });
        }
        self.move_playhead(frame)
    }

    fn move_playhead(&mut self, frame: Frame) -> Result<(), ReplayError> {
        self.playhead = frame;
        self.replayer.frames.resize(self.replayer.inputs.len());

        if self.replayer.store.get(CheckpointId::Current).holds(frame) {
            if self.replayer.engine.frame() != frame {
                self.replayer.restore(CheckpointId::Current)?;
            }
            return Ok(());
        }

        debug!(%frame, "seeking");
        match frame.prev() {
            None => {
                self.replayer.restore(CheckpointId::PowerOn)?;
                self.replayer.store.invalidate(CheckpointId::Previous);
            }
            Some(previous) => {
                self.replayer.advance_to(previous, None)?;
                self.replayer.capture(CheckpointId::Previous)?;
                self.replayer.step_once()?;
            }
        }
        self.replayer.capture(CheckpointId::Current)
    }

    /// Discards every cached result at or after `start`, then repairs the playhead.
    ///
    /// `start` may equal the log length (nothing in range changes, but any
    /// checkpoint past the end is still dropped).
    ///
    /// A `start` past the end is reported as [`ReplayError::InvalidateOutOfRange`],
    /// but only after the cache has been cut back to the log length and the
    /// playhead repaired.
    pub fn invalidate_frames(&mut self, start: Frame) -> Result<(), ReplayError> {
        let len = self.replayer.inputs.len();
        let effective = start.min(Frame::new(len));

        let invalidated = self.replayer.store.invalidate_from(effective);
        self.replayer.frames.invalidate_from(effective);
        debug!(start = %effective, invalidated, "invalidated frames");

        let target = match Frame::new(len).prev() {
            Some(last) if self.playhead > last => {
                warn!(playhead = %self.playhead, %last, "input log shrank past the playhead");
                last
            }
            Some(_) => self.playhead,
            None => Frame::ZERO,
        };
        self.move_playhead(target)?;

        if start > effective {
            warn!(%start, len, "invalidation started past the end of the log");
            return Err(ReplayError::InvalidateOutOfRange { frame: start, len });
        }
        Ok(())
    }

    /// Runs a bulk edit on the input log, then invalidates from `start`.
    pub fn edit_inputs<R>(
        &mut self,
        start: Frame,
        edit: impl FnOnce(&mut L) -> R,
    ) -> Result<R, ReplayError> {
        let result = edit(&mut self.replayer.inputs);
        self.invalidate_frames(start)?;
        Ok(result)
    }

    /// Swaps in a new input log and resets the cache. Returns the old log.
    pub fn replace_inputs(&mut self, inputs: L) -> Result<L, ReplayError> {
        let old = mem::replace(&mut self.replayer.inputs, inputs);
        self.reset()?;
        Ok(old)
    }

    /// Drops every cached result and returns the engine to power-on.
    pub fn reset(&mut self) -> Result<(), ReplayError> {
        self.replayer.store.invalidate_from(Frame::ZERO);
        self.replayer.frames.clear();
        self.move_playhead(Frame::ZERO)
    }

    // ------------------------------------------------------------------------
    // Background rebuild
    // ------------------------------------------------------------------------

    /// Repositions the regions and spends one tick budget rebuilding checkpoints.
    pub fn tick(&mut self) -> Result<TickReport, ReplayError> {
        self.scheduler.tick(&mut self.replayer, self.playhead)
    }

    /// Mean settled fraction of the three regions, in `[0, 1]`.
    ///
    /// Only slots whose desired frame lies inside the input log count.
    pub fn progress(&self) -> f32 {
        scheduler::progress(
            &self.replayer.store.regions,
            Frame::new(self.replayer.inputs.len()),
        )
    }

    // ------------------------------------------------------------------------
    // Frame cache
    // ------------------------------------------------------------------------

    /// Summary of `frame`, or `None` while it is stale.
    pub fn frame_summary(&self, frame: Frame) -> Option<&E::Summary> {
        self.replayer.frames.get(frame)
    }

    /// Overwrites the summary of a frame that is already fresh.
    ///
    /// Returns false and stores nothing if `frame` is stale.
    pub fn set_frame_summary(&mut self, frame: Frame, summary: E::Summary) -> bool {
        self.replayer.frames.overwrite(frame, summary)
    }

    /// Highest frame whose summary is fresh.
    pub fn last_valid_frame(&self) -> Option<Frame> {
        self.replayer.frames.watermark()
    }

    // ------------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------------

    pub fn current_frame(&self) -> Frame {
        self.playhead
    }

    /// Frame held by the previous checkpoint (`None` at frame 0).
    pub fn previous_frame(&self) -> Option<Frame> {
        self.replayer.store.get(CheckpointId::Previous).frame()
    }

    /// The valid checkpoint closest before `target` (power-on if none).
    pub fn find_nearest_checkpoint(&self, target: Frame) -> CheckpointId {
        self.replayer.find_nearest(target)
    }

    pub fn checkpoint(&self, id: CheckpointId) -> &Checkpoint {
        self.replayer.store.get(id)
    }

    pub fn checkpoint_frame(&self, id: CheckpointId) -> Option<Frame> {
        self.checkpoint(id).frame()
    }

    /// Every checkpoint in scan order.
    pub fn checkpoints(&self) -> impl Iterator<Item = (CheckpointId, &Checkpoint)> + '_ {
        self.replayer.store.iter()
    }

    pub fn region(&self, role: RegionRole) -> &Region {
        self.replayer.store.regions.get(role)
    }

    /// Table index of the region playing `role`, as used by [`CheckpointId::Slot`].
    pub fn region_index(&self, role: RegionRole) -> usize {
        self.replayer.store.regions.index_of(role)
    }

    /// Replays the engine to `target` without moving the playhead.
    ///
    /// `target` may equal the log length: the state after the last input.
    pub fn advance_to(&mut self, target: Frame) -> Result<(), ReplayError> {
        let len = self.replayer.inputs.len();
        if target.as_u64() > len {
            return Err(ReplayError::FrameOutOfRange { frame: target, len });
        }
        self.replayer.frames.resize(len);
        self.replayer.advance_to(target, None)?;
        Ok(())
    }

    pub fn engine(&self) -> &E {
        &self.replayer.engine
    }

    pub fn inputs(&self) -> &L {
        &self.replayer.inputs
    }

    pub fn stats(&self) -> ReplayStats {
        self.replayer.stats
    }

    pub fn reset_stats(&mut self) {
        self.replayer.stats = ReplayStats::default();
    }

    pub fn config(&self) -> &SaveSystemConfig {
        &self.config
    }
}

impl<E> SaveSystem<E, InputTimeline<E::Input>>
where
    E: Engine,
    E::Input: Clone + Default + PartialEq,
{
    /// Writes one input, invalidating from `frame` only if the value changed.
    ///
    /// Returns true if the log changed.
    pub fn set_input(&mut self, frame: Frame, input: E::Input) -> Result<bool, ReplayError> {
        let len = self.replayer.inputs.len();
        if frame.as_u64() >= len {
            return Err(ReplayError::FrameOutOfRange { frame, len });
        }
        if !self.replayer.inputs.set(frame, input) {
            return Ok(false);
        }
        self.invalidate_frames(frame)?;
        Ok(true)
    }
}
