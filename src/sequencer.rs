//! Sequencer Implementation
//!
//! The sequencer coordinates access to the ring buffer: it hands out claim
//! ranges to the producer, makes published sequences visible to consumers,
//! and ensures the producer never overtakes the slowest gating consumer.

use crate::sequence::Sequence;
use crate::sequence_barrier::{ProcessingSequenceBarrier, SequenceBarrier};
use crate::wait_strategy::WaitStrategy;
use crate::{DisruptorError, Result};
use crossbeam_utils::CachePadded;
use std::cell::UnsafeCell;
use std::sync::Arc;

/// Trait for sequencers that coordinate access to the ring buffer
///
/// A sequencer owns the producer cursor and the set of gating sequences.
/// Claim-path methods (`next`, `next_n`, `try_next`, `try_next_n`,
/// `remaining_capacity`) must only ever be called from the one producer
/// thread; availability queries and barrier construction are safe from any
/// thread.
pub trait Sequencer: Send + Sync + std::fmt::Debug {
    /// Get a handle to the producer cursor
    fn get_cursor(&self) -> Arc<Sequence>;

    /// Get the size of the ring this sequencer coordinates
    fn get_buffer_size(&self) -> usize;

    /// Claim the next sequence number, blocking while the ring is full
    ///
    /// # Errors
    /// Returns `DisruptorError::InvalidClaimSize` if the buffer size is zero
    /// (never in practice; see `next_n` for the general contract).
    fn next(&self) -> Result<i64>;

    /// Claim the next `n` sequence numbers, blocking while the ring is full
    ///
    /// Returns the highest sequence of the claimed range. Blocks via the wait
    /// strategy's `producer_wait` until the slowest gating consumer has freed
    /// enough slots.
    ///
    /// # Errors
    /// Returns `DisruptorError::InvalidClaimSize` if `n` is outside
    /// `1..=buffer_size`.
    fn next_n(&self, n: i64) -> Result<i64>;

    /// Try to claim the next sequence number without blocking
    ///
    /// Returns `None` if the claim would have to wait for a consumer.
    fn try_next(&self) -> Option<i64>;

    /// Try to claim the next `n` sequence numbers without blocking
    fn try_next_n(&self, n: i64) -> Option<i64>;

    /// Publish a sequence, making it and all slot writes before it visible
    fn publish(&self, sequence: i64);

    /// Check if a sequence has been published
    fn is_available(&self, sequence: i64) -> bool;

    /// Get the highest published sequence in `next_sequence..=available_sequence`
    ///
    /// With a single producer, claims are serial and contiguous, so the
    /// answer is `available_sequence` itself.
    fn get_highest_published_sequence(&self, next_sequence: i64, available_sequence: i64) -> i64;

    /// Replace the gating set with `sequences`
    ///
    /// Must be called before the producer enters its hot loop; concurrent
    /// mutation during operation is not supported.
    fn set_gating_sequences(&self, sequences: Vec<Arc<Sequence>>);

    /// Append to the gating set; same pre-start restriction as
    /// `set_gating_sequences`
    fn add_gating_sequences(&self, sequences: &[Arc<Sequence>]);

    /// Fold the minimum over the registered gating sequences
    ///
    /// Returns `i64::MAX` when no gating sequences are registered.
    fn get_minimum_gating_sequence(&self) -> i64;

    /// Get the number of slots the producer could still claim without waiting
    ///
    /// Producer thread only.
    fn remaining_capacity(&self) -> i64;

    /// Create a barrier gated on this sequencer's cursor and the given
    /// upstream consumer sequences
    fn new_barrier(
        self: Arc<Self>,
        dependent_sequences: Vec<Arc<Sequence>>,
    ) -> Arc<dyn SequenceBarrier>;
}

/// Claim state touched only by the producer thread
struct ProducerClaim {
    /// Highest sequence the producer has claimed; may run ahead of the
    /// cursor while the slot is being written
    next_value: i64,
    /// Last observed minimum of the gating sequences; lets the producer skip
    /// the gating read while it demonstrably has headroom
    cached_gating_sequence: i64,
}

/// Single producer sequencer
///
/// Optimized for exactly one publishing thread: the claim state is plain
/// (non-atomic) memory and the publish is a single release store of the
/// cursor. The claim state lives on its own cache line so producer-private
/// writes never contend with consumers reading the cursor.
pub struct SingleProducerSequencer {
    buffer_size: usize,
    wait_strategy: Arc<dyn WaitStrategy>,
    cursor: Arc<Sequence>,
    gating_sequences: parking_lot::RwLock<Vec<Arc<Sequence>>>,
    claim: CachePadded<UnsafeCell<ProducerClaim>>,
}

// SAFETY: the UnsafeCell claim state is only touched by the single producer
// thread, per the Sequencer claim-path contract. Every other field is
// Send + Sync on its own.
unsafe impl Send for SingleProducerSequencer {}
unsafe impl Sync for SingleProducerSequencer {}

impl SingleProducerSequencer {
    /// Create a new single producer sequencer
    ///
    /// # Panics
    /// Panics if `buffer_size` is not a power of 2.
    pub fn new(buffer_size: usize, wait_strategy: Arc<dyn WaitStrategy>) -> Self {
        assert!(
            crate::is_power_of_two(buffer_size),
            "buffer size must be a power of 2"
        );

        Self {
            buffer_size,
            wait_strategy,
            cursor: Arc::new(Sequence::default()),
            gating_sequences: parking_lot::RwLock::new(Vec::new()),
            claim: CachePadded::new(UnsafeCell::new(ProducerClaim {
                next_value: crate::INITIAL_CURSOR_VALUE,
                cached_gating_sequence: crate::INITIAL_CURSOR_VALUE,
            })),
        }
    }

    /// Fold the gating minimum starting from `seed`
    fn minimum_gating_sequence_from(&self, seed: i64) -> i64 {
        Sequence::minimum_of(&self.gating_sequences.read(), seed)
    }

    fn validate_claim(&self, n: i64) -> Result<()> {
        let buffer_size = self.buffer_size as i64;
        if n < 1 || n > buffer_size {
            return Err(DisruptorError::InvalidClaimSize {
                claimed: n,
                buffer_size,
            });
        }
        Ok(())
    }
}

impl Sequencer for SingleProducerSequencer {
    fn get_cursor(&self) -> Arc<Sequence> {
        Arc::clone(&self.cursor)
    }

    fn get_buffer_size(&self) -> usize {
        self.buffer_size
    }

    fn next(&self) -> Result<i64> {
        self.next_n(1)
    }

    fn next_n(&self, n: i64) -> Result<i64> {
        self.validate_claim(n)?;

        // SAFETY: claim-path methods are producer-thread only.
        let claim = unsafe { &mut *self.claim.get() };

        let next_sequence = claim.next_value + n;
        let wrap_point = next_sequence - self.buffer_size as i64;

        // Fast path: the last observed gating minimum already proves the
        // claim cannot overtake a consumer. The second clause catches a
        // gating set moved under the producer across a cold start.
        if wrap_point > claim.cached_gating_sequence
            || claim.cached_gating_sequence > claim.next_value
        {
            let mut minimum_sequence = self.minimum_gating_sequence_from(claim.next_value);
            while wrap_point > minimum_sequence {
                self.wait_strategy.producer_wait();
                minimum_sequence = self.minimum_gating_sequence_from(claim.next_value);
            }
            claim.cached_gating_sequence = minimum_sequence;
        }

        claim.next_value = next_sequence;
        Ok(next_sequence)
    }

    fn try_next(&self) -> Option<i64> {
        self.try_next_n(1)
    }

    fn try_next_n(&self, n: i64) -> Option<i64> {
        if self.validate_claim(n).is_err() {
            return None;
        }

        // SAFETY: claim-path methods are producer-thread only.
        let claim = unsafe { &mut *self.claim.get() };

        let next_sequence = claim.next_value + n;
        let wrap_point = next_sequence - self.buffer_size as i64;

        if wrap_point > claim.cached_gating_sequence
            || claim.cached_gating_sequence > claim.next_value
        {
            let minimum_sequence = self.minimum_gating_sequence_from(claim.next_value);
            if wrap_point > minimum_sequence {
                return None;
            }
            claim.cached_gating_sequence = minimum_sequence;
        }

        claim.next_value = next_sequence;
        Some(next_sequence)
    }

    fn publish(&self, sequence: i64) {
        self.cursor.set(sequence);
        self.wait_strategy.signal_all_when_blocking();
    }

    fn is_available(&self, sequence: i64) -> bool {
        sequence <= self.cursor.get()
    }

    fn get_highest_published_sequence(
        &self,
        _next_sequence: i64,
        available_sequence: i64,
    ) -> i64 {
        available_sequence
    }

    fn set_gating_sequences(&self, sequences: Vec<Arc<Sequence>>) {
        *self.gating_sequences.write() = sequences;
    }

    fn add_gating_sequences(&self, sequences: &[Arc<Sequence>]) {
        self.gating_sequences.write().extend_from_slice(sequences);
    }

    fn get_minimum_gating_sequence(&self) -> i64 {
        self.minimum_gating_sequence_from(i64::MAX)
    }

    fn remaining_capacity(&self) -> i64 {
        // SAFETY: claim-path methods are producer-thread only.
        let next_value = unsafe { (*self.claim.get()).next_value };
        let consumed = self.minimum_gating_sequence_from(next_value);
        self.buffer_size as i64 - (next_value - consumed)
    }

    fn new_barrier(
        self: Arc<Self>,
        dependent_sequences: Vec<Arc<Sequence>>,
    ) -> Arc<dyn SequenceBarrier> {
        let cursor = Arc::clone(&self.cursor);
        let wait_strategy = Arc::clone(&self.wait_strategy);
        Arc::new(ProcessingSequenceBarrier::new(
            cursor,
            wait_strategy,
            dependent_sequences,
            self,
        ))
    }
}

impl std::fmt::Debug for SingleProducerSequencer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingleProducerSequencer")
            .field("buffer_size", &self.buffer_size)
            .field("cursor", &self.cursor)
            .finish_non_exhaustive()
    }
}
