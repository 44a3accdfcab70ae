//! Budgeted background rebuild of region checkpoints.
//!
//! Each call to [`RebuildScheduler::tick`] does the following:
//!
//! 1. Keeps `lookahead_frames` blank inputs past the playhead and resizes
//!    the frame cache to the input log.
//! 2. Spreads the global region over the whole log.
//! 3. Moves the two block regions onto the playhead's block and the block
//!    before it, swapping their roles first when the playhead crossed a
//!    block boundary so already-captured checkpoints keep their meaning.
//! 4. Rebuilds stale slots, earliest desired frame first, until the budget
//!    runs out or every reachable slot is settled. At least one step is
//!    taken before the budget is consulted.
//!
//! A rebuild cut short by the budget parks the engine state in the scratch
//! checkpoint, so the next tick resumes from there instead of replaying the
//! same frames again.

use rewind_types::{Frame, FrameWindow};
use tracing::{debug, trace};

use crate::config::{SaveSystemConfig, TickBudget};
use crate::engine::{Engine, InputLog};
use crate::region::{RegionRole, RegionTable};
use crate::replay::{Advance, BudgetClock, CheckpointId, Replayer};
use crate::ReplayError;

/// Outcome of one scheduler tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickReport {
    /// Region slots captured at their desired frame by the rebuild loop.
    pub rebuilt_slots: usize,
    /// Simulation steps taken during the tick.
    pub steps: u64,
    /// True if the tick stopped because its budget ran out.
    pub budget_exhausted: bool,
    /// True if the block regions swapped roles.
    pub swapped: bool,
    /// Mean settled fraction of the three regions after the tick.
    pub progress: f32,
}

#[derive(Debug)]
pub(crate) struct RebuildScheduler {
    block_len: u64,
    budget: TickBudget,
    lookahead: u64,
}

impl RebuildScheduler {
    pub(crate) fn new(config: &SaveSystemConfig) -> Self {
        Self {
            block_len: config.block_len,
            budget: config.tick_budget,
            lookahead: config.lookahead_frames,
        }
    }

    pub(crate) fn tick<E, L>(
        &mut self,
        replayer: &mut Replayer<E, L>,
        playhead: Frame,
    ) -> Result<TickReport, ReplayError>
    where
        E: Engine,
        L: InputLog<Input = E::Input>,
    {
        self.grow_log(&mut replayer.inputs, playhead);

        let len = replayer.inputs.len();
        replayer.frames.resize(len);

        let regions = &mut replayer.store.regions;
        regions
            .get_mut(RegionRole::Global)
            .update(FrameWindow::new(Frame::ZERO, Frame::new(len)));
        let swapped = self.place_blocks(regions, playhead);

        let mut clock = BudgetClock::start(self.budget);
        let mut rebuilt_slots = 0;
        let mut budget_exhausted = false;

        // Checked only after the first step: every tick advances at least one frame.
        loop {
            if clock.steps() > 0 && clock.exhausted() {
                budget_exhausted = true;
                break;
            }
            let Some((id, desired)) = next_candidate(&replayer.store.regions, Frame::new(len))
            else {
                break;
            };

            match replayer.advance_to(desired, Some(&mut clock))? {
                Advance::Reached => {
                    // A slot wanting a restored frame is not filled by stepping.
                    if !replayer.store.get(id).holds(desired) {
                        replayer.capture(id)?;
                    }
                    rebuilt_slots += 1;
                    trace!(?id, frame = %desired, "rebuilt checkpoint");
                }
                Advance::OutOfBudget { frame } => {
                    replayer.capture(CheckpointId::Scratch)?;
                    budget_exhausted = true;
                    trace!(%frame, target = %desired, "budget exhausted mid-rebuild");
                    break;
                }
            }
        }

        Ok(TickReport {
            rebuilt_slots,
            steps: clock.steps(),
            budget_exhausted,
            swapped,
            progress: progress(&replayer.store.regions, Frame::new(len)),
        })
    }

    /// Appends blank inputs until the log extends `lookahead` frames past the playhead.
    fn grow_log<L: InputLog>(&self, inputs: &mut L, playhead: Frame) {
        if self.lookahead == 0 {
            return;
        }
        let before = inputs.len();
        while playhead.as_u64() + self.lookahead >= inputs.len() {
            inputs.extend_blank(self.lookahead);
        }
        if inputs.len() != before {
            debug!(from = before, to = inputs.len(), "extended input log");
        }
    }

    /// Repositions the block regions around `playhead`. Returns true if they swapped.
    fn place_blocks(&self, regions: &mut RegionTable, playhead: Frame) -> bool {
        let current = FrameWindow::block_containing(playhead, self.block_len);
        let previous = FrameWindow::previous_block(playhead, self.block_len);

        // In block 0 both windows coincide and there is nothing to swap.
        let swap = current != previous
            && (regions.get(RegionRole::CurrentBlock).first_frame() == previous.first()
                || regions.get(RegionRole::PreviousBlock).first_frame() == current.first());
        if swap {
            regions.swap_blocks();
            debug!(%current, %previous, "swapped block regions");
        }

        regions.get_mut(RegionRole::CurrentBlock).update(current);
        regions.get_mut(RegionRole::PreviousBlock).update(previous);
        swap
    }
}

/// The stale slot with the earliest desired frame before `limit`.
///
/// Ties go to the region scanned first (global, current block, previous block).
fn next_candidate(regions: &RegionTable, limit: Frame) -> Option<(CheckpointId, Frame)> {
    regions
        .in_role_order()
        .flat_map(|(region, r)| {
            r.slots()
                .filter(|slot| slot.needs_update && slot.desired_frame < limit)
                .map(move |slot| {
                    let id = CheckpointId::Slot {
                        region,
                        index: slot.index,
                    };
                    (id, slot.desired_frame)
                })
        })
        .min_by_key(|&(_, desired)| desired)
}

/// Mean settled fraction of the three regions.
pub(crate) fn progress(regions: &RegionTable, limit: Frame) -> f32 {
    let total: f32 = regions
        .in_role_order()
        .map(|(_, region)| region.progress(limit))
        .sum();
    total / RegionRole::ALL.len() as f32
}
