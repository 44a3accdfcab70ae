//! Dense per-frame summary cache with a freshness watermark.
//!
//! One entry per input-log frame. Entries up to and including the watermark
//! are guaranteed fresh; anything after it is stale and never returned.
//!
//! The watermark only advances contiguously: recording frame `w + 1` moves it
//! forward, then keeps moving across successors that were already recorded.
//! A summary recorded beyond a gap is kept but stays unreadable until the gap
//! is filled.

use rewind_types::Frame;

#[derive(Debug)]
pub struct FrameCache<S> {
    entries: Vec<Option<S>>,
    /// Highest frame known fresh (`None` until frame 0 is recorded).
    watermark: Option<Frame>,
}

impl<S: Clone> FrameCache<S> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            watermark: None,
        }
    }

    /// Number of frames tracked (mirrors the input log length).
    pub fn len(&self) -> u64 {
        self.entries.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn watermark(&self) -> Option<Frame> {
        self.watermark
    }

    /// Grows or shrinks the cache to `len` frames.
    ///
    /// Shrinking pulls the watermark back to the new last frame.
    pub fn resize(&mut self, len: u64) {
        let len = usize::try_from(len).expect("frame cache length exceeds usize::MAX");
        self.entries.resize(len, None);
        self.watermark = match (self.watermark, Frame::new(len as u64).prev()) {
            (Some(watermark), Some(last)) => Some(watermark.min(last)),
            _ => None,
        };
    }

    /// Fresh summary for `frame`, or `None` if it is stale or out of range.
    pub fn get(&self, frame: Frame) -> Option<&S> {
        match self.watermark {
            Some(watermark) if frame <= watermark => self.entries.get(frame.as_usize())?.as_ref(),
            _ => None,
        }
    }

    /// Returns true if `frame` still needs a summary.
    pub fn is_stale(&self, frame: Frame) -> bool {
        self.watermark.is_none_or(|watermark| frame > watermark)
    }

    /// Stores a freshly computed summary for `frame`.
    ///
    /// Frames outside the cache are ignored.
    pub fn record(&mut self, frame: Frame, summary: S) {
        let Some(entry) = self.entries.get_mut(frame.as_usize()) else {
            return;
        };
        *entry = Some(summary);

        let next = self.watermark.map_or(Frame::ZERO, Frame::next);
        if frame != next {
            return;
        }

        let mut watermark = frame;
        while let Some(Some(_)) = self.entries.get(watermark.next().as_usize()) {
            watermark = watermark.next();
        }
        self.watermark = Some(watermark);
    }

    /// Overwrites an entry that is already fresh.
    ///
    /// Returns false (and stores nothing) for stale or out-of-range frames.
    pub fn overwrite(&mut self, frame: Frame, summary: S) -> bool {
        if self.is_stale(frame) {
            return false;
        }
        match self.entries.get_mut(frame.as_usize()) {
            Some(entry) => {
                *entry = Some(summary);
                true
            }
            None => false,
        }
    }

    /// Marks `start` and every later frame stale.
    pub fn invalidate_from(&mut self, start: Frame) {
        for entry in self.entries.iter_mut().skip(start.as_usize()) {
            *entry = None;
        }
        if let Some(watermark) = self.watermark {
            if watermark >= start {
                self.watermark = start.prev();
            }
        }
    }

    /// Drops every entry and resets the watermark.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.watermark = None;
    }
}

impl<S: Clone> Default for FrameCache<S> {
    fn default() -> Self {
        Self::new()
    }
}
