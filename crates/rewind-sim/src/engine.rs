//! A deterministic memory-image stepper standing in for an emulator core.
//!
//! The whole state lives in one flat byte image, the way an emulator core's
//! save state is a dump of its memory:
//!
//! ```text
//! ┌──────────┬──────────┬───────┬───────┬──────────────────────────┐
//! │ frame u64│digest u64│ x i32 │ y i32 │ memory (state_len - 24)  │
//! └──────────┴──────────┴───────┴───────┴──────────────────────────┘
//! ```
//!
//! Each step scribbles over a handful of memory bytes chosen by a generator
//! seeded from the digest, the frame and the input, then folds the written
//! bytes back into the digest. Any divergence anywhere in the image therefore
//! shows up in later digests.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rewind::{Engine, EngineError, StateBlob};
use rewind_types::Frame;
use serde::{Deserialize, Serialize};

use crate::SimRng;

/// Bytes of header before the memory area.
pub const HEADER_LEN: usize = 24;

/// Smallest image the engine accepts.
pub const MIN_STATE_LEN: usize = HEADER_LEN + 8;

/// Memory bytes rewritten per step.
const WRITES_PER_STEP: usize = 16;

const FRAME: std::ops::Range<usize> = 0..8;
const DIGEST: std::ops::Range<usize> = 8..16;
const POS_X: std::ops::Range<usize> = 16..20;
const POS_Y: std::ops::Range<usize> = 20..24;

/// One frame of controller input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SimInput {
    pub buttons: u16,
    pub stick_x: i8,
    pub stick_y: i8,
}

impl SimInput {
    fn seed_bits(self) -> u64 {
        (u64::from(self.buttons) << 16)
            | (u64::from(self.stick_x.cast_unsigned()) << 8)
            | u64::from(self.stick_y.cast_unsigned())
    }
}

/// Per-frame summary kept in the frame cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SimSummary {
    pub frame: Frame,
    pub x: i32,
    pub y: i32,
    pub digest: u64,
}

/// Injected engine misbehavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// `step` fails when stepping from this frame.
    FailStepAt(Frame),
    /// `step` from this frame advances the frame counter by two.
    SkipFrameAt(Frame),
    /// `capture` fails while the engine sits at this frame.
    FailCaptureAt(Frame),
}

#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error("state image of {len} bytes is smaller than the {min}-byte minimum")]
    StateTooSmall { len: usize, min: usize },
}

/// The reference deterministic engine.
#[derive(Debug, Clone)]
pub struct SimEngine {
    image: Box<[u8]>,
    fault: Option<Fault>,
}

impl SimEngine {
    /// Builds the power-on image for `seed`: random memory, zeroed header.
    pub fn power_on(seed: u64, state_len: usize) -> Result<Self, SimError> {
        if state_len < MIN_STATE_LEN {
            return Err(SimError::StateTooSmall {
                len: state_len,
                min: MIN_STATE_LEN,
            });
        }
        let mut image = vec![0u8; state_len].into_boxed_slice();
        let mut rng = SimRng::new(seed);
        rng.fill_bytes(&mut image[HEADER_LEN..]);
        image[DIGEST].copy_from_slice(&seed.to_le_bytes());
        Ok(Self { image, fault: None })
    }

    pub fn with_fault(mut self, fault: Fault) -> Self {
        self.fault = Some(fault);
        self
    }

    /// The raw state image.
    pub fn image(&self) -> &[u8] {
        &self.image
    }

    pub fn digest(&self) -> u64 {
        self.read_u64(DIGEST)
    }

    fn read_u64(&self, range: std::ops::Range<usize>) -> u64 {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&self.image[range]);
        u64::from_le_bytes(bytes)
    }

    fn read_i32(&self, range: std::ops::Range<usize>) -> i32 {
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&self.image[range]);
        i32::from_le_bytes(bytes)
    }
}

impl Engine for SimEngine {
    type Input = SimInput;
    type Summary = SimSummary;

    fn state_len(&self) -> usize {
        self.image.len()
    }

    fn capture(&self, out: &mut StateBlob) -> Result<(), EngineError> {
        if self.fault == Some(Fault::FailCaptureAt(self.frame())) {
            return Err(EngineError::new("injected capture failure"));
        }
        out.copy_from(&self.image)
    }

    fn restore(&mut self, blob: &StateBlob) -> Result<(), EngineError> {
        blob.copy_to(&mut self.image)
    }

    fn step(&mut self, input: &SimInput) -> Result<(), EngineError> {
        let frame = self.read_u64(FRAME);
        let mut advance = 1;
        match self.fault {
            Some(Fault::FailStepAt(at)) if at.as_u64() == frame => {
                return Err(EngineError::new(format!("injected step failure at {at}")));
            }
            Some(Fault::SkipFrameAt(at)) if at.as_u64() == frame => advance = 2,
            _ => {}
        }

        let x = self.read_i32(POS_X).wrapping_add(i32::from(input.stick_x));
        let y = self.read_i32(POS_Y).wrapping_add(i32::from(input.stick_y));
        let mut digest = self.read_u64(DIGEST);

        let mut rng = SmallRng::seed_from_u64(digest ^ frame.rotate_left(32) ^ input.seed_bits());
        let memory = &mut self.image[HEADER_LEN..];
        let low_buttons = input.buttons.to_le_bytes()[0];
        for _ in 0..WRITES_PER_STEP {
            let at = rng.gen_range(0..memory.len());
            let noise = rng.gen_range(0..=u8::MAX);
            memory[at] = memory[at].wrapping_add(noise ^ low_buttons);
            digest = digest.rotate_left(5) ^ u64::from(memory[at]) ^ at as u64;
        }
        digest ^= (u64::from(x.cast_unsigned()) << 32) | u64::from(y.cast_unsigned());

        self.image[FRAME].copy_from_slice(&(frame + advance).to_le_bytes());
        self.image[DIGEST].copy_from_slice(&digest.to_le_bytes());
        self.image[POS_X].copy_from_slice(&x.to_le_bytes());
        self.image[POS_Y].copy_from_slice(&y.to_le_bytes());
        Ok(())
    }

    fn frame(&self) -> Frame {
        Frame::new(self.read_u64(FRAME))
    }

    fn summarize(&self) -> SimSummary {
        SimSummary {
            frame: self.frame(),
            x: self.read_i32(POS_X),
            y: self.read_i32(POS_Y),
            digest: self.digest(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(buttons: u16) -> SimInput {
        SimInput {
            buttons,
            stick_x: 3,
            stick_y: -2,
        }
    }

    #[test]
    fn power_on_is_seeded() {
        let a = SimEngine::power_on(1, 256).unwrap();
        let b = SimEngine::power_on(1, 256).unwrap();
        let c = SimEngine::power_on(2, 256).unwrap();
        assert_eq!(a.image(), b.image());
        assert_ne!(a.image(), c.image());
        assert_eq!(a.frame(), Frame::ZERO);
    }

    #[test]
    fn rejects_tiny_state() {
        assert!(matches!(
            SimEngine::power_on(1, MIN_STATE_LEN - 1),
            Err(SimError::StateTooSmall { .. })
        ));
    }

    #[test]
    fn stepping_is_deterministic() {
        let mut a = SimEngine::power_on(9, 512).unwrap();
        let mut b = a.clone();
        for frame in 0..50 {
            a.step(&input(frame)).unwrap();
            b.step(&input(frame)).unwrap();
        }
        assert_eq!(a.image(), b.image());
        assert_eq!(a.frame(), Frame::new(50));
        assert_eq!(a.summarize().x, 150);
        assert_eq!(a.summarize().y, -100);
    }

    #[test]
    fn input_changes_the_future() {
        let mut a = SimEngine::power_on(9, 512).unwrap();
        let mut b = a.clone();
        a.step(&input(1)).unwrap();
        b.step(&input(2)).unwrap();
        assert_ne!(a.digest(), b.digest());
    }

    #[test]
    fn capture_restore_round_trips_the_image() {
        let mut engine = SimEngine::power_on(3, 128).unwrap();
        let mut blob = StateBlob::new(128, usize::MAX);
        engine.step(&input(0)).unwrap();
        engine.capture(&mut blob).unwrap();
        let saved = engine.image().to_vec();

        engine.step(&input(0)).unwrap();
        engine.restore(&blob).unwrap();
        assert_eq!(engine.image(), saved.as_slice());
        assert_eq!(engine.frame(), Frame::new(1));
    }

    #[test]
    fn faults_fire_at_their_frame() {
        let mut engine = SimEngine::power_on(3, 128)
            .unwrap()
            .with_fault(Fault::SkipFrameAt(Frame::new(1)));
        engine.step(&input(0)).unwrap();
        engine.step(&input(0)).unwrap();
        assert_eq!(engine.frame(), Frame::new(3));

        let mut engine = SimEngine::power_on(3, 128)
            .unwrap()
            .with_fault(Fault::FailStepAt(Frame::ZERO));
        assert!(engine.step(&input(0)).is_err());
    }
}
