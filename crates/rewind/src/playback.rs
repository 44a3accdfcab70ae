//! Frame-by-frame playback on top of a [`SaveSystem`].
//!
//! Playback is just a sequence of one-frame seeks. A seek replays from the
//! nearest checkpoint strictly before the new previous frame, so stepping
//! forward from a settled playhead restores the old previous checkpoint and
//! takes two engine steps. Stepping backward takes at most the block padding
//! plus one step once the block regions around the playhead are populated.

use rewind_types::Frame;

use crate::engine::{Engine, InputLog};
use crate::save_system::SaveSystem;
use crate::ReplayError;

/// Direction the playhead moves on each tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum PlaybackState {
    #[default]
    Paused,
    PlayingForward,
    PlayingBackward,
}

/// Drives the playhead one frame per host tick.
#[derive(Debug, Clone, Default)]
pub struct PlaybackController {
    state: PlaybackState,
}

impl PlaybackController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn set_state(&mut self, state: PlaybackState) {
        self.state = state;
    }

    pub fn pause(&mut self) {
        self.state = PlaybackState::Paused;
    }

    /// Advances the playhead by one frame in the current direction.
    ///
    /// Reaching either end of the log pauses playback. Returns the playhead
    /// after the tick.
    pub fn tick<E, L>(&mut self, system: &mut SaveSystem<E, L>) -> Result<Frame, ReplayError>
    where
        E: Engine,
        L: InputLog<Input = E::Input>,
    {
        let moved = match self.state {
            PlaybackState::Paused => return Ok(system.current_frame()),
            PlaybackState::PlayingForward => self.step_forward(system)?,
            PlaybackState::PlayingBackward => self.step_backward(system)?,
        };
        if !moved {
            self.state = PlaybackState::Paused;
        }
        Ok(system.current_frame())
    }

    /// Moves the playhead one frame forward. Returns false at the last frame.
    pub fn step_forward<E, L>(&mut self, system: &mut SaveSystem<E, L>) -> Result<bool, ReplayError>
    where
        E: Engine,
        L: InputLog<Input = E::Input>,
    {
        let next = system.current_frame().next();
        if next.as_u64() >= system.inputs().len() {
            return Ok(false);
        }
        system.set_current_frame(next)?;
        Ok(true)
    }

    /// Moves the playhead one frame back. Returns false at frame 0.
    pub fn step_backward<E, L>(
        &mut self,
        system: &mut SaveSystem<E, L>,
    ) -> Result<bool, ReplayError>
    where
        E: Engine,
        L: InputLog<Input = E::Input>,
    {
        let Some(previous) = system.current_frame().prev() else {
            return Ok(false);
        };
        system.set_current_frame(previous)?;
        Ok(true)
    }

    /// Jumps to `frame`, clamped to the last frame of the log.
    ///
    /// Returns the frame actually reached.
    pub fn seek<E, L>(
        &mut self,
        system: &mut SaveSystem<E, L>,
        frame: Frame,
    ) -> Result<Frame, ReplayError>
    where
        E: Engine,
        L: InputLog<Input = E::Input>,
    {
        let last = Frame::new(system.inputs().len()).prev().unwrap_or(Frame::ZERO);
        let target = frame.min(last);
        if target != system.current_frame() {
            system.set_current_frame(target)?;
        }
        Ok(target)
    }
}
