//! Replay error types.

use rewind_types::Frame;

/// A failure reported by the simulation engine.
///
/// The cache assumes a total, deterministic stepper, so any engine error is
/// unrecoverable from the cache's point of view.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct EngineError {
    message: String,
}

impl EngineError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Errors from the checkpoint cache and replay engine.
#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    /// The engine failed while stepping, capturing or restoring.
    #[error("engine fault at frame {frame}: {source}")]
    Engine { frame: Frame, source: EngineError },

    /// The engine's frame counter disagrees with the replay bookkeeping.
    #[error("engine frame counter {actual} diverged from expected frame {expected}")]
    Desync { expected: Frame, actual: Frame },

    /// A seek targeted a frame outside the input log.
    #[error("frame {frame} is outside the input log (length {len})")]
    FrameOutOfRange { frame: Frame, len: u64 },

    /// An invalidation started past the end of the input log.
    #[error("cannot invalidate from frame {frame}: input log length is {len}")]
    InvalidateOutOfRange { frame: Frame, len: u64 },

    /// The input log had no entry for a frame the replay needed.
    #[error("input log has no entry for frame {frame}")]
    MissingInput { frame: Frame },

    /// Invalid cache configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ReplayError {
    /// Returns true for faults that leave the engine in an unknown state.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Engine { .. } | Self::Desync { .. })
    }
}
