//! Ring Buffer Implementation
//!
//! The ring buffer is a pre-allocated circular slot array plus the sequencer
//! that coordinates access to it. It is a pure addressing layer: sequences
//! map to slots through a bitmask, and every claim/publish decision is
//! delegated to the sequencer. It neither validates sequences nor tracks
//! availability.

use crate::event_factory::EventFactory;
use crate::event_processor::DataProvider;
use crate::sequence::Sequence;
use crate::sequence_barrier::SequenceBarrier;
use crate::sequencer::Sequencer;
use crate::{DisruptorError, Result};
use std::cell::UnsafeCell;
use std::sync::Arc;

/// Pre-allocated circular buffer of events
///
/// Slots are created once by the event factory and never reallocated or
/// moved: the storage is heap-pinned, so `&T` references handed out stay
/// stable for the buffer's lifetime. The type is deliberately neither `Clone`
/// nor `Copy`; barriers and processors refer to one shared instance.
///
/// # Type Parameters
/// * `T` - The event type stored in the buffer
pub struct RingBuffer<T> {
    /// The slot storage; `UnsafeCell` because the producer writes a claimed
    /// slot while consumers hold `&self`
    slots: Box<[UnsafeCell<T>]>,
    /// Mask for fast modulo (buffer_size - 1), i64 to match sequence math
    index_mask: i64,
    /// Coordinates claims, publication, and gating
    sequencer: Arc<dyn Sequencer>,
}

// SAFETY: slot access is coordinated entirely through sequence ordering. A
// slot is written by at most the one producer between claim and publish, and
// consumers only read a slot after observing the published cursor, which
// happens-after the write.
unsafe impl<T: Send> Send for RingBuffer<T> {}
unsafe impl<T: Send + Sync> Sync for RingBuffer<T> {}

impl<T> RingBuffer<T>
where
    T: Send + Sync,
{
    /// Create a new ring buffer over the given sequencer
    ///
    /// The factory is invoked once per slot to preinitialize the buffer.
    /// `buffer_size` must equal the sequencer's buffer size.
    ///
    /// # Errors
    /// Returns `DisruptorError::InvalidBufferSize` if `buffer_size` is not a
    /// power of 2.
    pub fn new<F>(buffer_size: usize, event_factory: F, sequencer: Arc<dyn Sequencer>) -> Result<Self>
    where
        F: EventFactory<T>,
    {
        if !crate::is_power_of_two(buffer_size) {
            return Err(DisruptorError::InvalidBufferSize(buffer_size));
        }
        debug_assert_eq!(buffer_size, sequencer.get_buffer_size());

        let slots: Box<[UnsafeCell<T>]> = (0..buffer_size)
            .map(|_| UnsafeCell::new(event_factory.new_instance()))
            .collect();

        Ok(Self {
            slots,
            index_mask: (buffer_size - 1) as i64,
            sequencer,
        })
    }

    /// Get a reference to the event at the given sequence
    pub fn get(&self, sequence: i64) -> &T {
        let index = (sequence & self.index_mask) as usize;
        // SAFETY: the mask keeps the index in bounds.
        let slot = unsafe { self.slots.get_unchecked(index) };
        unsafe { &*slot.get() }
    }

    /// Get a mutable reference to the event at the given sequence
    ///
    /// # Safety
    /// The caller must hold the claim on `sequence` (producer between
    /// `next` and `publish`): no other reference to the slot may exist while
    /// the returned one is live.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn get_mut(&self, sequence: i64) -> &mut T {
        let index = (sequence & self.index_mask) as usize;
        // SAFETY: the mask keeps the index in bounds.
        let slot = self.slots.get_unchecked(index);
        &mut *slot.get()
    }

    /// Get the size of the buffer
    pub fn buffer_size(&self) -> usize {
        self.slots.len()
    }

    /// Get the size of the buffer as i64
    pub fn size(&self) -> i64 {
        self.slots.len() as i64
    }

    /// Claim the next sequence, blocking while the ring is full
    ///
    /// # Errors
    /// See [`Sequencer::next`].
    pub fn next(&self) -> Result<i64> {
        self.sequencer.next()
    }

    /// Claim the next `n` sequences, blocking while the ring is full
    ///
    /// # Errors
    /// See [`Sequencer::next_n`].
    pub fn next_n(&self, n: i64) -> Result<i64> {
        self.sequencer.next_n(n)
    }

    /// Try to claim the next sequence without blocking
    pub fn try_next(&self) -> Option<i64> {
        self.sequencer.try_next()
    }

    /// Try to claim the next `n` sequences without blocking
    pub fn try_next_n(&self, n: i64) -> Option<i64> {
        self.sequencer.try_next_n(n)
    }

    /// Publish a sequence, making the slot visible to consumers
    pub fn publish(&self, sequence: i64) {
        self.sequencer.publish(sequence);
    }

    /// Get a handle to the producer cursor
    pub fn get_cursor(&self) -> Arc<Sequence> {
        self.sequencer.get_cursor()
    }

    /// Replace the gating set constraining the producer; pre-start only
    pub fn set_gating_sequences(&self, sequences: Vec<Arc<Sequence>>) {
        self.sequencer.set_gating_sequences(sequences);
    }

    /// Append to the gating set; pre-start only
    pub fn add_gating_sequences(&self, sequences: &[Arc<Sequence>]) {
        self.sequencer.add_gating_sequences(sequences);
    }

    /// Fold the minimum over the gating sequences
    pub fn get_minimum_gating_sequence(&self) -> i64 {
        self.sequencer.get_minimum_gating_sequence()
    }

    /// Get the number of slots the producer could still claim; producer
    /// thread only
    pub fn remaining_capacity(&self) -> i64 {
        self.sequencer.remaining_capacity()
    }

    /// Create a barrier for a consumer stage gated on `dependent_sequences`
    pub fn new_barrier(&self, dependent_sequences: Vec<Arc<Sequence>>) -> Arc<dyn SequenceBarrier> {
        Arc::clone(&self.sequencer).new_barrier(dependent_sequences)
    }
}

impl<T> DataProvider<T> for RingBuffer<T>
where
    T: Send + Sync,
{
    fn get(&self, sequence: i64) -> &T {
        RingBuffer::get(self, sequence)
    }

    unsafe fn get_mut(&self, sequence: i64) -> &mut T {
        RingBuffer::get_mut(self, sequence)
    }
}

impl<T> std::fmt::Debug for RingBuffer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingBuffer")
            .field("buffer_size", &self.slots.len())
            .field("sequencer", &self.sequencer)
            .finish_non_exhaustive()
    }
}
