//! Checkpoint regions: pools bound to sliding timeline windows.
//!
//! A [`Region`] spreads its pool evenly over a window. Slot `i` wants to hold
//! frame `first_frame + i * padding`, where `padding = max(1, span / pool_len)`.
//! Moving the window never touches the checkpoints themselves; a slot whose
//! stored frame no longer matches its desired frame simply reports
//! `needs_update` until something recaptures it.
//!
//! The [`RegionTable`] owns the three regions the scheduler maintains (whole
//! timeline, current block, previous block). Roles are indices into the
//! table, so promoting the previous block to current is a swap of two
//! indices regardless of pool size.

use rewind_types::{Frame, FrameWindow};

use crate::checkpoint::{Checkpoint, CheckpointPool};

// ============================================================================
// Region
// ============================================================================

/// A checkpoint pool mapped onto a timeline window.
#[derive(Debug)]
pub struct Region {
    first_frame: Frame,
    span: u64,
    padding: u64,
    pool: CheckpointPool,
}

/// Snapshot of one region slot's placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotInfo {
    pub index: usize,
    pub desired_frame: Frame,
    pub frame: Option<Frame>,
    pub needs_update: bool,
}

impl Region {
    /// Creates a region over `pool`, initially placed at frame 0.
    pub fn new(pool: CheckpointPool) -> Self {
        Self {
            first_frame: Frame::ZERO,
            span: 0,
            padding: 1,
            pool,
        }
    }

    /// Moves the region onto `window` and recomputes slot spacing.
    pub fn update(&mut self, window: FrameWindow) {
        self.first_frame = window.first();
        self.span = window.span();
        self.padding = if self.pool.is_empty() {
            1
        } else {
            (self.span / self.pool.len() as u64).max(1)
        };
    }

    pub fn first_frame(&self) -> Frame {
        self.first_frame
    }

    pub fn span(&self) -> u64 {
        self.span
    }

    pub fn padding(&self) -> u64 {
        self.padding
    }

    /// Number of slots in the underlying pool.
    pub fn len(&self) -> usize {
        self.pool.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    /// Frame slot `index` should hold under the current placement.
    pub fn desired_frame(&self, index: usize) -> Frame {
        self.first_frame + index as u64 * self.padding
    }

    /// Returns true if slot `index` is invalid or holds the wrong frame.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    pub fn needs_update(&self, index: usize) -> bool {
        let slot = self.slot(index);
        !slot.holds(self.desired_frame(index))
    }

    /// Checkpoint stored in slot `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    pub fn slot(&self, index: usize) -> &Checkpoint {
        self.pool
            .get(index)
            .unwrap_or_else(|| panic!("slot {index} out of bounds for region of {}", self.len()))
    }

    pub(crate) fn slot_mut(&mut self, index: usize) -> &mut Checkpoint {
        let len = self.len();
        self.pool
            .get_mut(index)
            .unwrap_or_else(|| panic!("slot {index} out of bounds for region of {len}"))
    }

    /// Placement of every slot in index order.
    pub fn slots(&self) -> impl Iterator<Item = SlotInfo> + '_ {
        self.pool.iter().enumerate().map(|(index, checkpoint)| {
            let desired_frame = self.desired_frame(index);
            SlotInfo {
                index,
                desired_frame,
                frame: checkpoint.frame(),
                needs_update: !checkpoint.holds(desired_frame),
            }
        })
    }

    /// Checkpoints in slot order.
    pub fn checkpoints(&self) -> impl Iterator<Item = &Checkpoint> {
        self.pool.iter()
    }

    /// The slot that wants to hold exactly `frame` and currently doesn't.
    ///
    /// Desired frames within a region are distinct, so at most one slot matches.
    pub fn slot_wanting(&self, frame: Frame) -> Option<usize> {
        frame
            .distance_from(self.first_frame)
            .filter(|offset| offset % self.padding == 0)
            .and_then(|offset| usize::try_from(offset / self.padding).ok())
            .filter(|&index| index < self.len() && self.needs_update(index))
    }

    /// Invalidates every slot holding `start` or a later frame.
    pub fn invalidate_from(&mut self, start: Frame) -> usize {
        self.pool.invalidate_from(start)
    }

    /// Slots whose desired frame lies before `limit` and already hold it.
    ///
    /// Returns `(settled, reachable)`.
    pub fn settled_before(&self, limit: Frame) -> (usize, usize) {
        self.slots()
            .filter(|slot| slot.desired_frame < limit)
            .fold((0, 0), |(settled, reachable), slot| {
                (settled + usize::from(!slot.needs_update), reachable + 1)
            })
    }

    /// Fraction of reachable slots (desired frame before `limit`) that are settled.
    ///
    /// A region with no reachable slots has nothing left to do and reports 1.0.
    pub fn progress(&self, limit: Frame) -> f32 {
        let (settled, reachable) = self.settled_before(limit);
        if reachable == 0 {
            1.0
        } else {
            settled as f32 / reachable as f32
        }
    }
}

// ============================================================================
// Region Table
// ============================================================================

/// The role a region plays in the rebuild schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegionRole {
    /// Spread over the whole timeline.
    Global,
    /// Dense coverage of the block containing the playhead.
    CurrentBlock,
    /// Dense coverage of the block before the playhead's block.
    PreviousBlock,
}

impl RegionRole {
    /// Roles in scheduling order.
    pub const ALL: [RegionRole; 3] = [
        RegionRole::Global,
        RegionRole::CurrentBlock,
        RegionRole::PreviousBlock,
    ];
}

/// Owns the three scheduler regions and maps roles onto them.
#[derive(Debug)]
pub struct RegionTable {
    regions: [Region; 3],
    /// Table index for each role, in `RegionRole::ALL` order.
    roles: [usize; 3],
}

impl RegionTable {
    pub fn new(global: Region, current: Region, previous: Region) -> Self {
        Self {
            regions: [global, current, previous],
            roles: [0, 1, 2],
        }
    }

    fn role_slot(role: RegionRole) -> usize {
        match role {
            RegionRole::Global => 0,
            RegionRole::CurrentBlock => 1,
            RegionRole::PreviousBlock => 2,
        }
    }

    /// Table index of the region currently playing `role`.
    pub fn index_of(&self, role: RegionRole) -> usize {
        self.roles[Self::role_slot(role)]
    }

    pub fn get(&self, role: RegionRole) -> &Region {
        &self.regions[self.index_of(role)]
    }

    pub fn get_mut(&mut self, role: RegionRole) -> &mut Region {
        let index = self.index_of(role);
        &mut self.regions[index]
    }

    /// Region by table index.
    pub fn by_index(&self, index: usize) -> &Region {
        &self.regions[index]
    }

    pub(crate) fn by_index_mut(&mut self, index: usize) -> &mut Region {
        &mut self.regions[index]
    }

    /// Exchanges the current-block and previous-block roles.
    pub fn swap_blocks(&mut self) {
        self.roles.swap(
            Self::role_slot(RegionRole::CurrentBlock),
            Self::role_slot(RegionRole::PreviousBlock),
        );
    }

    /// `(table index, region)` pairs in scheduling order.
    pub fn in_role_order(&self) -> impl Iterator<Item = (usize, &Region)> + '_ {
        RegionRole::ALL.into_iter().map(|role| {
            let index = self.index_of(role);
            (index, &self.regions[index])
        })
    }

    pub fn regions_mut(&mut self) -> impl Iterator<Item = &mut Region> {
        self.regions.iter_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(slots: usize) -> Region {
        Region::new(CheckpointPool::new(slots, 1, usize::MAX))
    }

    fn window(first: u64, last: u64) -> FrameWindow {
        FrameWindow::new(Frame::new(first), Frame::new(last))
    }

    #[test]
    fn padding_divides_span_by_pool_length() {
        let mut r = region(128);
        r.update(window(1000, 1999));
        assert_eq!(r.padding(), 7);
        assert_eq!(r.desired_frame(0), Frame::new(1000));
        assert_eq!(r.desired_frame(3), Frame::new(1021));
    }

    #[test]
    fn padding_is_at_least_one() {
        let mut r = region(256);
        r.update(window(0, 100));
        assert_eq!(r.padding(), 1);
        assert_eq!(r.desired_frame(255), Frame::new(255));
    }

    #[test]
    fn empty_pool_uses_unit_padding() {
        let mut r = region(0);
        r.update(window(0, 5000));
        assert_eq!(r.padding(), 1);
        assert_eq!(r.progress(Frame::new(5000)), 1.0);
    }

    #[test]
    fn moving_window_marks_slots_stale() {
        let mut r = region(4);
        r.update(window(0, 40));
        for index in 0..4 {
            let desired = r.desired_frame(index);
            r.slot_mut(index).finish_capture(desired);
        }
        assert!((0..4).all(|i| !r.needs_update(i)));

        r.update(window(0, 80));
        assert!(!r.needs_update(0), "slot 0 still wants frame 0");
        assert!((1..4).all(|i| r.needs_update(i)));
    }

    #[test]
    fn slot_wanting_matches_desired_frames_only() {
        let mut r = region(4);
        r.update(window(100, 140));
        assert_eq!(r.slot_wanting(Frame::new(120)), Some(2));
        assert_eq!(r.slot_wanting(Frame::new(125)), None);
        assert_eq!(r.slot_wanting(Frame::new(90)), None);
        assert_eq!(r.slot_wanting(Frame::new(140)), None, "past last slot");

        r.slot_mut(2).finish_capture(Frame::new(120));
        assert_eq!(r.slot_wanting(Frame::new(120)), None, "already settled");
    }

    #[test]
    fn progress_ignores_slots_past_limit() {
        let mut r = region(4);
        r.update(window(0, 40));
        r.slot_mut(0).finish_capture(Frame::ZERO);
        r.slot_mut(1).finish_capture(Frame::new(10));

        assert_eq!(r.settled_before(Frame::new(25)), (2, 3));
        assert_eq!(r.progress(Frame::new(15)), 1.0);
        assert_eq!(r.progress(Frame::new(1000)), 0.5);
    }

    #[test]
    fn swap_exchanges_block_roles_only() {
        let mut table = RegionTable::new(region(1), region(2), region(3));
        assert_eq!(table.get(RegionRole::CurrentBlock).len(), 2);

        table.swap_blocks();
        assert_eq!(table.get(RegionRole::Global).len(), 1);
        assert_eq!(table.get(RegionRole::CurrentBlock).len(), 3);
        assert_eq!(table.get(RegionRole::PreviousBlock).len(), 2);
        assert_eq!(table.index_of(RegionRole::CurrentBlock), 2);

        let order: Vec<usize> = table.in_role_order().map(|(index, _)| index).collect();
        assert_eq!(order, vec![0, 2, 1]);
    }
}
