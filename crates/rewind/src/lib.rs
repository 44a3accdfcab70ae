//! # rewind: Checkpoint Cache for Frame-Accurate Replay
//!
//! This crate keeps a bounded set of full-state checkpoints spread over the
//! timeline of a deterministic simulation, so that seeking to any frame costs
//! a restore plus a short replay instead of a replay from power-on.
//!
//! - **`SaveSystem`**: the façade. Seeks, invalidates after input edits, and
//!   runs the budgeted background rebuild once per host tick.
//! - **Regions**: three fixed pools mapped onto the whole timeline, the
//!   playhead's block and the block before it.
//! - **Frame cache**: one lightweight summary per frame, fresh up to a
//!   watermark.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                  SaveSystem                  │
//! │  set_current_frame · invalidate_frames · tick│
//! └───────────┬──────────────────────┬───────────┘
//!             │                      │
//! ┌───────────┴──────────┐ ┌─────────┴───────────┐
//! │       Replayer       │ │  RebuildScheduler   │
//! │ find_nearest · step  │◄┤ place regions, spend│
//! │ opportunistic fill   │ │ the tick budget     │
//! └───────────┬──────────┘ └─────────────────────┘
//!             │
//! ┌───────────┴──────────────────────────────────┐
//! │ CheckpointStore                              │
//! │  power-on · current · previous · scratch     │
//! │  RegionTable [global, block, block]          │
//! └───────────┬──────────────────────────────────┘
//!             │
//! ┌───────────┴──────────┐ ┌─────────────────────┐
//! │ Engine (capture,     │ │ InputLog            │
//! │ restore, step)       │ │ (input per frame)   │
//! └──────────────────────┘ └─────────────────────┘
//! ```
//!
//! Everything is single-threaded and owned by the `SaveSystem`. The only
//! parallelism is inside [`StateBlob`] copies, which split large images
//! across the rayon pool and return once every chunk has landed.

mod checkpoint;
mod config;
mod engine;
mod error;
mod frame_cache;
mod input;
mod playback;
mod region;
mod replay;
mod save_system;
mod scheduler;

pub use checkpoint::{Checkpoint, CheckpointPool, StateBlob};
pub use config::{SaveSystemConfig, TickBudget};
pub use engine::{Engine, InputLog};
pub use error::{EngineError, ReplayError};
pub use frame_cache::FrameCache;
pub use input::InputTimeline;
pub use playback::{PlaybackController, PlaybackState};
pub use region::{Region, RegionRole, RegionTable, SlotInfo};
pub use replay::{CheckpointId, CheckpointStore, ReplayStats};
pub use save_system::SaveSystem;
pub use scheduler::TickReport;

pub use rewind_types::{Frame, FrameWindow};
