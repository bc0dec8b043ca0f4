//! Wait Strategy Implementation
//!
//! This module provides the strategies that decide how a consumer waits for
//! new events to become available and how the producer waits for capacity.
//! Different strategies trade CPU usage against wakeup latency.

use crate::sequence::Sequence;
use crate::sequence_barrier::SequenceBarrier;
use crate::Result;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Strategy for waiting until sequences become available
///
/// A wait strategy has three responsibilities: parking a consumer until the
/// sequence it requested is visible, waking blocked consumers on publication
/// or alert, and pacing the producer while the ring is full.
pub trait WaitStrategy: Send + Sync + std::fmt::Debug {
    /// Wait until the effective consumer-visible sequence reaches `sequence`
    ///
    /// The effective sequence is the minimum over `dependent_sequences` when
    /// the consumer has upstream dependents, and the producer `cursor`
    /// otherwise (upstream consumers already gate on the cursor transitively).
    ///
    /// Implementations must re-check `barrier.check_alert()` on every
    /// iteration so that a halt propagates promptly to a parked consumer.
    ///
    /// # Returns
    /// The observed available sequence, which may exceed `sequence`; this is
    /// where consumer batching comes from.
    ///
    /// # Errors
    /// Returns `DisruptorError::Alert` if the barrier is alerted while waiting.
    fn wait_for(
        &self,
        sequence: i64,
        cursor: &Sequence,
        dependent_sequences: &[Arc<Sequence>],
        barrier: &dyn SequenceBarrier,
    ) -> Result<i64>;

    /// Signal all waiting threads to wake up
    ///
    /// Called by the sequencer on publish and by the barrier on alert. A no-op
    /// for strategies that never park.
    fn signal_all_when_blocking(&self);

    /// Pace the producer while a claim cannot proceed
    ///
    /// Called by the single-producer sequencer when the slowest gating
    /// consumer has not yet freed the slot being claimed. Must not block on
    /// anything only a consumer signal could release.
    fn producer_wait(&self);
}

/// The effective sequence a waiter is gated on
#[inline]
fn effective_sequence(cursor: &Sequence, dependent_sequences: &[Arc<Sequence>]) -> i64 {
    if dependent_sequences.is_empty() {
        cursor.get()
    } else {
        Sequence::minimum_of(dependent_sequences, i64::MAX)
    }
}

/// Busy-spin wait strategy
///
/// Continuously polls with a CPU pause hint (`pause` on x86_64, `yield` on
/// aarch64) and never parks. Lowest latency, burns a full core while waiting.
/// Use this only when cores can be dedicated to the processors. This is the
/// reference strategy.
#[derive(Debug, Default)]
pub struct BusySpinWaitStrategy;

impl BusySpinWaitStrategy {
    /// Create a new busy-spin wait strategy
    pub fn new() -> Self {
        Self
    }
}

impl WaitStrategy for BusySpinWaitStrategy {
    fn wait_for(
        &self,
        sequence: i64,
        cursor: &Sequence,
        dependent_sequences: &[Arc<Sequence>],
        barrier: &dyn SequenceBarrier,
    ) -> Result<i64> {
        let mut available_sequence = effective_sequence(cursor, dependent_sequences);
        while available_sequence < sequence {
            barrier.check_alert()?;
            std::hint::spin_loop();
            available_sequence = effective_sequence(cursor, dependent_sequences);
        }
        Ok(available_sequence)
    }

    fn signal_all_when_blocking(&self) {
        // Busy spin never parks, so there is nothing to wake
    }

    fn producer_wait(&self) {
        std::hint::spin_loop();
    }
}

/// Yielding wait strategy
///
/// Spins while yielding the CPU to other threads between polls. Friendlier to
/// oversubscribed hosts than busy-spin at the cost of scheduler latency.
#[derive(Debug, Default)]
pub struct YieldingWaitStrategy;

impl YieldingWaitStrategy {
    /// Create a new yielding wait strategy
    pub fn new() -> Self {
        Self
    }
}

impl WaitStrategy for YieldingWaitStrategy {
    fn wait_for(
        &self,
        sequence: i64,
        cursor: &Sequence,
        dependent_sequences: &[Arc<Sequence>],
        barrier: &dyn SequenceBarrier,
    ) -> Result<i64> {
        let mut available_sequence = effective_sequence(cursor, dependent_sequences);
        while available_sequence < sequence {
            barrier.check_alert()?;
            thread::yield_now();
            available_sequence = effective_sequence(cursor, dependent_sequences);
        }
        Ok(available_sequence)
    }

    fn signal_all_when_blocking(&self) {
        // Yielding strategy doesn't park, so no signaling needed
    }

    fn producer_wait(&self) {
        thread::yield_now();
    }
}

/// Sleeping wait strategy
///
/// Sleeps for a short fixed duration between polls. Cheapest in CPU terms,
/// with wakeup latency bounded by the sleep interval.
#[derive(Debug)]
pub struct SleepingWaitStrategy {
    sleep_duration: Duration,
}

impl SleepingWaitStrategy {
    /// Create a new sleeping wait strategy with the default 1ms interval
    pub fn new() -> Self {
        Self {
            sleep_duration: Duration::from_millis(1),
        }
    }

    /// Create a new sleeping wait strategy with a custom interval
    pub fn new_with_duration(sleep_duration: Duration) -> Self {
        Self { sleep_duration }
    }
}

impl Default for SleepingWaitStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl WaitStrategy for SleepingWaitStrategy {
    fn wait_for(
        &self,
        sequence: i64,
        cursor: &Sequence,
        dependent_sequences: &[Arc<Sequence>],
        barrier: &dyn SequenceBarrier,
    ) -> Result<i64> {
        let mut available_sequence = effective_sequence(cursor, dependent_sequences);
        while available_sequence < sequence {
            barrier.check_alert()?;
            thread::sleep(self.sleep_duration);
            available_sequence = effective_sequence(cursor, dependent_sequences);
        }
        Ok(available_sequence)
    }

    fn signal_all_when_blocking(&self) {
        // Sleeping strategy doesn't park on a signal, so no wakeup needed
    }

    fn producer_wait(&self) {
        thread::sleep(self.sleep_duration);
    }
}

/// Blocking wait strategy
///
/// Parks waiters on a condition variable until the sequencer signals a
/// publication. Uses a bounded wait so alerts are observed even when no
/// publication ever arrives. Best CPU efficiency, highest wakeup latency.
#[derive(Debug, Default)]
pub struct BlockingWaitStrategy {
    mutex: Mutex<()>,
    condvar: Condvar,
}

impl BlockingWaitStrategy {
    /// Create a new blocking wait strategy
    pub fn new() -> Self {
        Self::default()
    }
}

impl WaitStrategy for BlockingWaitStrategy {
    fn wait_for(
        &self,
        sequence: i64,
        cursor: &Sequence,
        dependent_sequences: &[Arc<Sequence>],
        barrier: &dyn SequenceBarrier,
    ) -> Result<i64> {
        // Phase 1: park until the producer cursor reaches the requested
        // sequence. The cursor reaching it is a necessary condition for any
        // dependent to reach it.
        if cursor.get() < sequence {
            let mut guard = self.mutex.lock();
            while cursor.get() < sequence {
                barrier.check_alert()?;
                let _ = self
                    .condvar
                    .wait_for(&mut guard, Duration::from_millis(1));
            }
        }

        // Phase 2: spin for upstream dependents; their advance is not
        // signaled through this strategy's condvar.
        let mut available_sequence = effective_sequence(cursor, dependent_sequences);
        while available_sequence < sequence {
            barrier.check_alert()?;
            std::hint::spin_loop();
            available_sequence = effective_sequence(cursor, dependent_sequences);
        }
        Ok(available_sequence)
    }

    fn signal_all_when_blocking(&self) {
        let _guard = self.mutex.lock();
        self.condvar.notify_all();
    }

    fn producer_wait(&self) {
        // The producer must not park on the consumer-wakeup condvar; only
        // consumer progress can unblock it and consumers do not signal.
        thread::yield_now();
    }
}
