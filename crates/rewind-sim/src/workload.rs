//! Seeded input logs.

use rewind::InputTimeline;

use crate::{SimInput, SimRng};

/// Generates input logs that look like a player holding and releasing buttons.
#[derive(Debug, Clone)]
pub struct InputGenerator {
    rng: SimRng,
    /// Chance that a frame changes input rather than repeating the last one.
    change_probability: f64,
    last: SimInput,
}

impl InputGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: SimRng::new(seed),
            change_probability: 0.1,
            last: SimInput::default(),
        }
    }

    pub fn with_change_probability(mut self, probability: f64) -> Self {
        self.change_probability = probability;
        self
    }

    pub fn next_input(&mut self) -> SimInput {
        if self.rng.next_bool_with_probability(self.change_probability) {
            let bits = self.rng.next_u32().to_le_bytes();
            self.last = SimInput {
                buttons: u16::from_le_bytes([bits[0], bits[1]]),
                stick_x: i8::from_le_bytes([bits[2]]),
                stick_y: i8::from_le_bytes([bits[3]]),
            };
        }
        self.last
    }

    pub fn timeline(&mut self, len: u64) -> InputTimeline<SimInput> {
        (0..len).map(|_| self.next_input()).collect()
    }
}
