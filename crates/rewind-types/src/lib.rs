//! # rewind-types: Core types for `Rewind`
//!
//! Frame indices and timeline windows shared by the checkpoint cache, the
//! configuration layer and the reference simulation.
//!
//! A timeline is a contiguous, 0-based sequence of frames whose length equals
//! the length of the input log driving the simulation. The "no state" marker
//! (frame `-1` in the editor's vocabulary) is never stored as a sentinel; it is
//! modelled as `Option<Frame>::None` wherever it can occur.

use std::fmt::{self, Display};
use std::ops::{Add, AddAssign};

use serde::{Deserialize, Serialize};

// ============================================================================
// Frame
// ============================================================================

/// Index of a frame within the simulation timeline.
///
/// Frames are zero-indexed and sequential. Frame 0 is the power-on state;
/// frame `n` is the state after `n` inputs have been applied.
///
/// Uses `u64` internally; frames are never negative.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct Frame(u64);

impl Frame {
    pub const ZERO: Frame = Frame(0);

    pub const fn new(frame: u64) -> Self {
        Self(frame)
    }

    /// Returns the frame as a `u64`.
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// Returns the frame as a `usize` for indexing.
    ///
    /// # Panics
    ///
    /// Panics on 32-bit platforms if the frame exceeds `usize::MAX`.
    pub fn as_usize(&self) -> usize {
        usize::try_from(self.0).expect("frame index exceeds usize::MAX")
    }

    /// Returns the frame immediately after this one.
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the frame immediately before this one, or `None` at frame 0.
    pub fn prev(self) -> Option<Self> {
        self.0.checked_sub(1).map(Self)
    }

    /// Subtracts `frames`, clamping at frame 0.
    pub fn saturating_sub(self, frames: u64) -> Self {
        Self(self.0.saturating_sub(frames))
    }

    /// Number of frames from `earlier` up to `self`.
    ///
    /// Returns `None` if `earlier` is after `self`.
    pub fn distance_from(self, earlier: Frame) -> Option<u64> {
        self.0.checked_sub(earlier.0)
    }

    /// Start of the fixed-size block containing this frame.
    ///
    /// # Panics
    ///
    /// Panics if `block_len` is 0.
    pub fn block_start(self, block_len: u64) -> Self {
        assert!(block_len > 0, "block_len must be positive");
        Self((self.0 / block_len) * block_len)
    }
}

impl Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Add<u64> for Frame {
    type Output = Self;
    fn add(self, rhs: u64) -> Self::Output {
        Self(self.0 + rhs)
    }
}

impl AddAssign<u64> for Frame {
    fn add_assign(&mut self, rhs: u64) {
        self.0 += rhs;
    }
}

impl From<u64> for Frame {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<Frame> for u64 {
    fn from(frame: Frame) -> Self {
        frame.0
    }
}

// ============================================================================
// Frame Window
// ============================================================================

/// An inclusive window `[first, last]` on the timeline.
///
/// The window's `span` is `last - first`, the value a checkpoint region divides
/// by its pool length to space its slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameWindow {
    first: Frame,
    last: Frame,
}

impl FrameWindow {
    /// Creates a window covering `first..=last`.
    ///
    /// # Panics
    ///
    /// Panics if `last` precedes `first`.
    pub fn new(first: Frame, last: Frame) -> Self {
        assert!(
            first <= last,
            "window last frame {last} precedes first frame {first}"
        );
        Self { first, last }
    }

    /// The fixed-size block containing `frame`: `[start, start + block_len - 1]`.
    pub fn block_containing(frame: Frame, block_len: u64) -> Self {
        let first = frame.block_start(block_len);
        Self::new(first, first + (block_len - 1))
    }

    /// The block preceding the one containing `frame`, clamped to block 0.
    pub fn previous_block(frame: Frame, block_len: u64) -> Self {
        let first = frame.block_start(block_len).saturating_sub(block_len);
        Self::new(first, first + (block_len - 1))
    }

    pub fn first(&self) -> Frame {
        self.first
    }

    pub fn last(&self) -> Frame {
        self.last
    }

    /// Distance from the first to the last frame.
    pub fn span(&self) -> u64 {
        self.last.as_u64() - self.first.as_u64()
    }

    /// Returns true if `frame` lies within the window.
    pub fn contains(&self, frame: Frame) -> bool {
        self.first <= frame && frame <= self.last
    }
}

impl Display for FrameWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.first, self.last)
    }
}
