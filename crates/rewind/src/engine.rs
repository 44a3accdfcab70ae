//! Collaborator traits: the simulation engine and the input log.
//!
//! The [`Engine`] trait abstracts the deterministic simulation so the cache
//! can be driven by a real emulator core or by the seeded reference engine in
//! `rewind-sim`. The [`InputLog`] trait abstracts the per-frame input sequence
//! owned by the editor.
//!
//! # Contract
//!
//! - `step` must be bit-reproducible: the same starting state and input always
//!   produce the same resulting state.
//! - `capture` / `restore` copy the complete state image, including the
//!   engine's own frame counter, so that `frame()` after a restore reports the
//!   frame the blob was captured at.
//! - `state_len` never changes for the lifetime of an engine instance.

use std::fmt;

use rewind_types::Frame;

use crate::EngineError;
use crate::checkpoint::StateBlob;

/// A deterministic, frame-stepped simulation.
pub trait Engine {
    /// One frame of input.
    type Input;

    /// Lightweight per-frame summary stored in the frame cache.
    type Summary: Clone + fmt::Debug;

    /// Size in bytes of a full state capture.
    fn state_len(&self) -> usize;

    /// Copies the live state into `out`.
    fn capture(&self, out: &mut StateBlob) -> Result<(), EngineError>;

    /// Replaces the live state with the contents of `blob`.
    fn restore(&mut self, blob: &StateBlob) -> Result<(), EngineError>;

    /// Advances the simulation by exactly one frame.
    fn step(&mut self, input: &Self::Input) -> Result<(), EngineError>;

    /// The engine's own frame counter.
    fn frame(&self) -> Frame;

    /// Summarizes the live state for the frame cache.
    fn summarize(&self) -> Self::Summary;
}

/// The per-frame input sequence driving an [`Engine`].
///
/// The state at frame `n` is produced by applying inputs `0..n` to the
/// power-on state, so stepping *from* frame `n` consumes `input(n)`.
pub trait InputLog {
    type Input;

    /// Number of frames in the log.
    fn len(&self) -> u64;

    /// Returns true if the log has no frames.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Input consumed when stepping from `frame` to `frame + 1`.
    fn input(&self, frame: Frame) -> Option<&Self::Input>;

    /// Appends `count` neutral inputs to the end of the log.
    fn extend_blank(&mut self, count: u64);
}
