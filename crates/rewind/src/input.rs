//! Vec-backed input log.

use rewind_types::Frame;

use crate::engine::InputLog;

/// An in-memory input log, one entry per frame.
///
/// Blank frames are `I::default()`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputTimeline<I> {
    inputs: Vec<I>,
}

impl<I: Clone + Default + PartialEq> InputTimeline<I> {
    pub fn new() -> Self {
        Self { inputs: Vec::new() }
    }

    pub fn from_inputs(inputs: impl IntoIterator<Item = I>) -> Self {
        Self {
            inputs: inputs.into_iter().collect(),
        }
    }

    /// A log of `len` blank frames.
    pub fn blank(len: u64) -> Self {
        let mut timeline = Self::new();
        timeline.extend_blank(len);
        timeline
    }

    pub fn push(&mut self, input: I) {
        self.inputs.push(input);
    }

    pub fn get(&self, frame: Frame) -> Option<&I> {
        self.inputs.get(usize::try_from(frame.as_u64()).ok()?)
    }

    /// Writes `input` at `frame`.
    ///
    /// Returns true if the stored value changed. Frames past the end are
    /// ignored and report false.
    pub fn set(&mut self, frame: Frame, input: I) -> bool {
        let Some(slot) = usize::try_from(frame.as_u64())
            .ok()
            .and_then(|index| self.inputs.get_mut(index))
        else {
            return false;
        };
        if *slot == input {
            return false;
        }
        *slot = input;
        true
    }

    /// Drops every frame from `len` onwards.
    pub fn truncate(&mut self, len: u64) {
        self.inputs
            .truncate(usize::try_from(len).unwrap_or(usize::MAX));
    }

    pub fn clear(&mut self) {
        self.inputs.clear();
    }

    pub fn as_slice(&self) -> &[I] {
        &self.inputs
    }
}

impl<I: Clone + Default + PartialEq> InputLog for InputTimeline<I> {
    type Input = I;

    fn len(&self) -> u64 {
        self.inputs.len() as u64
    }

    fn input(&self, frame: Frame) -> Option<&I> {
        self.get(frame)
    }

    fn extend_blank(&mut self, count: u64) {
        let count = usize::try_from(count).expect("blank extension exceeds usize::MAX");
        self.inputs.resize(self.inputs.len() + count, I::default());
    }
}

impl<I> FromIterator<I> for InputTimeline<I> {
    fn from_iter<T: IntoIterator<Item = I>>(iter: T) -> Self {
        Self {
            inputs: iter.into_iter().collect(),
        }
    }
}
