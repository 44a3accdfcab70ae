//! Checkpoint storage: state blobs, checkpoints and fixed-capacity pools.
//!
//! Every checkpoint owns one [`StateBlob`] allocated at construction and
//! reused in place for the lifetime of the cache. Invalidation clears the
//! frame tag only; the buffer is never freed or reallocated.
//!
//! Large blobs are copied in parallel on the rayon pool. From the caller's
//! point of view a copy is synchronous: it returns only after every chunk
//! has landed.

use rayon::prelude::*;
use rewind_types::Frame;

use crate::EngineError;

/// Smallest chunk handed to a rayon worker during a parallel copy.
const MIN_PARALLEL_CHUNK: usize = 64 * 1024;

// ============================================================================
// State Blob
// ============================================================================

/// Fixed-size buffer holding one full engine state image.
#[derive(Debug)]
pub struct StateBlob {
    bytes: Box<[u8]>,
    /// Copies of at least this many bytes are split across rayon workers.
    parallel_threshold: usize,
}

impl StateBlob {
    /// Allocates a zeroed blob of `len` bytes.
    pub fn new(len: usize, parallel_threshold: usize) -> Self {
        Self {
            bytes: vec![0; len].into_boxed_slice(),
            parallel_threshold,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    /// Overwrites the blob with `src`.
    ///
    /// `src` must be exactly as long as the blob.
    pub fn copy_from(&mut self, src: &[u8]) -> Result<(), EngineError> {
        check_len(self.bytes.len(), src.len())?;
        bulk_copy(&mut self.bytes, src, self.parallel_threshold);
        Ok(())
    }

    /// Copies the blob into `dst`.
    ///
    /// `dst` must be exactly as long as the blob.
    pub fn copy_to(&self, dst: &mut [u8]) -> Result<(), EngineError> {
        check_len(self.bytes.len(), dst.len())?;
        bulk_copy(dst, &self.bytes, self.parallel_threshold);
        Ok(())
    }
}

fn check_len(blob: usize, other: usize) -> Result<(), EngineError> {
    if blob == other {
        Ok(())
    } else {
        Err(EngineError::new(format!(
            "state image is {other} bytes but checkpoint blobs hold {blob}"
        )))
    }
}

fn bulk_copy(dst: &mut [u8], src: &[u8], parallel_threshold: usize) {
    debug_assert_eq!(dst.len(), src.len());

    if dst.len() < parallel_threshold {
        dst.copy_from_slice(src);
        return;
    }

    let chunk = dst
        .len()
        .div_ceil(rayon::current_num_threads())
        .max(MIN_PARALLEL_CHUNK);

    dst.par_chunks_mut(chunk)
        .zip(src.par_chunks(chunk))
        .for_each(|(d, s)| d.copy_from_slice(s));
}

// ============================================================================
// Checkpoint
// ============================================================================

/// A captured engine state tagged with the frame it represents.
#[derive(Debug)]
pub struct Checkpoint {
    frame: Option<Frame>,
    state: StateBlob,
}

impl Checkpoint {
    /// Creates an invalid checkpoint with a preallocated blob.
    pub fn new(state_len: usize, parallel_threshold: usize) -> Self {
        Self {
            frame: None,
            state: StateBlob::new(state_len, parallel_threshold),
        }
    }

    /// The frame this checkpoint holds, or `None` if it is invalid.
    pub fn frame(&self) -> Option<Frame> {
        self.frame
    }

    pub fn is_valid(&self) -> bool {
        self.frame.is_some()
    }

    /// Returns true if the checkpoint is valid and holds exactly `frame`.
    pub fn holds(&self, frame: Frame) -> bool {
        self.frame == Some(frame)
    }

    /// Marks the checkpoint invalid without releasing its blob.
    pub fn invalidate(&mut self) {
        self.frame = None;
    }

    /// Invalidates the checkpoint if it holds `start` or any later frame.
    ///
    /// Returns true if the checkpoint was invalidated.
    pub fn invalidate_from(&mut self, start: Frame) -> bool {
        match self.frame {
            Some(frame) if frame >= start => {
                self.frame = None;
                true
            }
            _ => false,
        }
    }

    pub fn state(&self) -> &StateBlob {
        &self.state
    }

    /// Blob and frame tag for an in-place capture.
    ///
    /// The frame is cleared first so a failed capture never leaves a stale
    /// tag on a half-written blob.
    pub(crate) fn begin_capture(&mut self) -> &mut StateBlob {
        self.frame = None;
        &mut self.state
    }

    pub(crate) fn finish_capture(&mut self, frame: Frame) {
        self.frame = Some(frame);
    }
}

// ============================================================================
// Checkpoint Pool
// ============================================================================

/// A fixed-capacity array of checkpoints sized from a memory budget.
///
/// The pool is never resized after creation.
#[derive(Debug)]
pub struct CheckpointPool {
    slots: Box<[Checkpoint]>,
}

impl CheckpointPool {
    /// Creates a pool of `len` invalid checkpoints.
    pub fn new(len: usize, state_len: usize, parallel_threshold: usize) -> Self {
        let slots = (0..len)
            .map(|_| Checkpoint::new(state_len, parallel_threshold))
            .collect();
        Self { slots }
    }

    /// Creates as many checkpoints as fit within `budget_bytes`.
    ///
    /// # Panics
    ///
    /// Panics if `state_len` is 0.
    pub fn with_budget(budget_bytes: u64, state_len: usize, parallel_threshold: usize) -> Self {
        assert!(state_len > 0, "state_len must be positive");
        let len = usize::try_from(budget_bytes / state_len as u64).unwrap_or(usize::MAX);
        Self::new(len, state_len, parallel_threshold)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Checkpoint> {
        self.slots.get(index)
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut Checkpoint> {
        self.slots.get_mut(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Checkpoint> {
        self.slots.iter()
    }

    /// Invalidates every checkpoint holding `start` or a later frame.
    ///
    /// Returns the number of checkpoints invalidated.
    pub fn invalidate_from(&mut self, start: Frame) -> usize {
        self.slots
            .iter_mut()
            .map(|slot| slot.invalidate_from(start))
            .filter(|&invalidated| invalidated)
            .count()
    }

    /// Number of valid checkpoints.
    pub fn valid_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_valid()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_checkpoint_is_invalid() {
        let checkpoint = Checkpoint::new(16, usize::MAX);
        assert!(!checkpoint.is_valid());
        assert_eq!(checkpoint.frame(), None);
        assert_eq!(checkpoint.state().len(), 16);
    }

    #[test]
    fn invalidate_keeps_blob_contents() {
        let mut checkpoint = Checkpoint::new(4, usize::MAX);
        checkpoint.begin_capture().copy_from(&[1, 2, 3, 4]).unwrap();
        checkpoint.finish_capture(Frame::new(7));
        assert!(checkpoint.holds(Frame::new(7)));

        checkpoint.invalidate();
        assert!(!checkpoint.is_valid());
        assert_eq!(checkpoint.state().as_slice(), &[1, 2, 3, 4]);
    }

    #[test]
    fn invalidate_from_is_inclusive() {
        let mut checkpoint = Checkpoint::new(1, usize::MAX);
        checkpoint.finish_capture(Frame::new(10));

        assert!(!checkpoint.invalidate_from(Frame::new(11)));
        assert!(checkpoint.is_valid());
        assert!(checkpoint.invalidate_from(Frame::new(10)));
        assert!(!checkpoint.is_valid());
    }

    #[test]
    fn blob_rejects_wrong_length() {
        let mut blob = StateBlob::new(8, usize::MAX);
        let err = blob.copy_from(&[0; 4]).unwrap_err();
        assert!(err.message().contains("4 bytes"));

        let mut dst = [0u8; 9];
        assert!(blob.copy_to(&mut dst).is_err());
    }

    #[test]
    fn parallel_copy_matches_serial_copy() {
        let len = 3 * MIN_PARALLEL_CHUNK + 17;
        let src: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();

        let mut parallel = StateBlob::new(len, 0);
        parallel.copy_from(&src).unwrap();
        assert_eq!(parallel.as_slice(), src.as_slice());

        let mut out = vec![0u8; len];
        parallel.copy_to(&mut out).unwrap();
        assert_eq!(out, src);
    }

    #[test]
    fn pool_sized_from_budget() {
        let pool = CheckpointPool::with_budget(1000, 64, usize::MAX);
        assert_eq!(pool.len(), 15);
        assert_eq!(pool.valid_count(), 0);

        let empty = CheckpointPool::with_budget(10, 64, usize::MAX);
        assert!(empty.is_empty());
    }

    #[test]
    fn pool_invalidate_from_counts() {
        let mut pool = CheckpointPool::new(4, 1, usize::MAX);
        for (i, frame) in [5_u64, 10, 15, 20].into_iter().enumerate() {
            pool.get_mut(i).unwrap().finish_capture(Frame::new(frame));
        }

        assert_eq!(pool.invalidate_from(Frame::new(12)), 2);
        assert_eq!(pool.valid_count(), 2);
        assert!(pool.get(1).unwrap().holds(Frame::new(10)));
        assert!(!pool.get(2).unwrap().is_valid());
    }
}
