//! Sequence implementation
//!
//! The Sequence is used to track progress through the ring buffer and coordinate
//! between the producer and consumers. It provides atomic operations while
//! preventing false sharing through careful memory layout.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Cache line size for padding to prevent false sharing
const CACHE_LINE_SIZE: usize = 64;

/// A sequence number that prevents false sharing
///
/// This structure is carefully designed so that the atomic value occupies a
/// cache line exclusively: the struct is aligned to the line size and padded
/// out to a full line. Writes to one Sequence therefore never invalidate the
/// line holding an adjacent one.
///
/// A Sequence is identified by its address: barriers and sequencers hold
/// references to it, so it is shared as `Arc<Sequence>` and is deliberately
/// not `Clone`.
#[repr(align(64))]
pub struct Sequence {
    /// The actual sequence value
    value: AtomicI64,
    /// Padding to prevent false sharing (cache line size - size of AtomicI64)
    _padding: [u8; CACHE_LINE_SIZE - std::mem::size_of::<AtomicI64>()],
}

impl Sequence {
    /// Create a new sequence with the given initial value
    pub fn new(initial_value: i64) -> Self {
        Self {
            value: AtomicI64::new(initial_value),
            _padding: [0; CACHE_LINE_SIZE - std::mem::size_of::<AtomicI64>()],
        }
    }

    /// Get the current sequence value (acquire load)
    #[inline]
    pub fn get(&self) -> i64 {
        self.value.load(Ordering::Acquire)
    }

    /// Set the sequence value (release store)
    #[inline]
    pub fn set(&self, value: i64) {
        self.value.store(value, Ordering::Release);
    }

    /// Increment by one and get the new value
    #[inline]
    pub fn increment_and_get(&self) -> i64 {
        self.add_and_get(1)
    }

    /// Add a value and get the new result
    #[inline]
    pub fn add_and_get(&self, increment: i64) -> i64 {
        self.value.fetch_add(increment, Ordering::AcqRel) + increment
    }

    /// Compare and swap the sequence value
    ///
    /// On success returns `Ok` with the previous value; on failure returns
    /// `Err` carrying the value actually observed.
    #[inline]
    pub fn compare_and_set(&self, expected: i64, new: i64) -> std::result::Result<i64, i64> {
        self.value
            .compare_exchange(expected, new, Ordering::AcqRel, Ordering::Acquire)
    }

    /// Fold the minimum over a set of sequences, starting from `seed`
    ///
    /// Used by the producer to find the slowest gating consumer and by wait
    /// strategies to find the slowest upstream dependent. An empty set leaves
    /// `seed` unchanged.
    pub fn minimum_of(sequences: &[Arc<Sequence>], seed: i64) -> i64 {
        sequences.iter().fold(seed, |min, s| min.min(s.get()))
    }
}

impl Default for Sequence {
    fn default() -> Self {
        Self::new(crate::INITIAL_CURSOR_VALUE)
    }
}

impl std::fmt::Debug for Sequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sequence").field("value", &self.get()).finish()
    }
}

impl std::fmt::Display for Sequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.get())
    }
}
