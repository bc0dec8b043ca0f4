//! Sequence Barrier Implementation
//!
//! A sequence barrier is the single suspension point of a consumer: it
//! combines the producer cursor, the upstream consumer sequences the consumer
//! depends on, the wait strategy, and a one-way alert flag used for
//! cooperative shutdown.

use crate::sequence::Sequence;
use crate::wait_strategy::WaitStrategy;
use crate::{DisruptorError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Coordination barrier for a consumer
///
/// Consumers never touch the sequencer or the wait strategy directly; every
/// suspension and every shutdown signal goes through their barrier.
pub trait SequenceBarrier: Send + Sync {
    /// Wait for the given sequence to become available
    ///
    /// # Returns
    /// The available sequence, which may exceed `sequence` (batching) or, for
    /// strategies that are allowed to return early, fall short of it.
    ///
    /// # Errors
    /// Returns `DisruptorError::Alert` if the barrier is alerted before or
    /// while waiting.
    fn wait_for(&self, sequence: i64) -> Result<i64>;

    /// Get the producer cursor this barrier is tracking
    fn get_cursor(&self) -> Arc<Sequence>;

    /// Check if this barrier has been alerted
    fn is_alerted(&self) -> bool;

    /// Alert the barrier, waking any parked waiter
    ///
    /// This is the only mechanism by which a waiting consumer is interrupted;
    /// it is used exclusively for cooperative shutdown.
    fn alert(&self);

    /// Clear the alert flag so the barrier can be waited on again
    fn clear_alert(&self);

    /// Raise `DisruptorError::Alert` if the barrier has been alerted
    fn check_alert(&self) -> Result<()>;
}

/// Standard implementation of a sequence barrier
///
/// Gates on the producer cursor when the consumer has no upstream
/// dependents, and on the minimum of the dependent sequences otherwise. The
/// alert release-store pairs with the acquire load inside the wait loop, so a
/// `halt` on another thread is observed promptly.
pub struct ProcessingSequenceBarrier {
    /// The producer cursor
    cursor: Arc<Sequence>,
    /// The wait strategy used when the requested sequence is not yet visible
    wait_strategy: Arc<dyn WaitStrategy>,
    /// Upstream consumer sequences this consumer must not overtake
    dependent_sequences: Vec<Arc<Sequence>>,
    /// One-way shutdown flag, cleared by the owning processor on run
    alerted: AtomicBool,
    /// Resolves the highest published sequence once supply is visible
    sequencer: Arc<dyn crate::sequencer::Sequencer>,
}

impl ProcessingSequenceBarrier {
    /// Create a new processing sequence barrier
    pub fn new(
        cursor: Arc<Sequence>,
        wait_strategy: Arc<dyn WaitStrategy>,
        dependent_sequences: Vec<Arc<Sequence>>,
        sequencer: Arc<dyn crate::sequencer::Sequencer>,
    ) -> Self {
        Self {
            cursor,
            wait_strategy,
            dependent_sequences,
            alerted: AtomicBool::new(false),
            sequencer,
        }
    }
}

impl SequenceBarrier for ProcessingSequenceBarrier {
    fn wait_for(&self, sequence: i64) -> Result<i64> {
        self.check_alert()?;

        let available_sequence = self.wait_strategy.wait_for(
            sequence,
            &self.cursor,
            &self.dependent_sequences,
            self,
        )?;

        // Pairs with the producer's release publish: everything written to
        // slots up to available_sequence is visible after this point.
        std::sync::atomic::fence(Ordering::Acquire);

        if available_sequence < sequence {
            return Ok(available_sequence);
        }

        Ok(self
            .sequencer
            .get_highest_published_sequence(sequence, available_sequence))
    }

    fn get_cursor(&self) -> Arc<Sequence> {
        Arc::clone(&self.cursor)
    }

    fn is_alerted(&self) -> bool {
        self.alerted.load(Ordering::Acquire)
    }

    fn alert(&self) {
        self.alerted.store(true, Ordering::Release);
        self.wait_strategy.signal_all_when_blocking();
    }

    fn clear_alert(&self) {
        self.alerted.store(false, Ordering::Release);
    }

    fn check_alert(&self) -> Result<()> {
        if self.is_alerted() {
            Err(DisruptorError::Alert)
        } else {
            Ok(())
        }
    }
}

impl std::fmt::Debug for ProcessingSequenceBarrier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessingSequenceBarrier")
            .field("cursor", &self.cursor)
            .field("dependent_sequences", &self.dependent_sequences)
            .field("alerted", &self.is_alerted())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequencer::{Sequencer, SingleProducerSequencer};
    use crate::wait_strategy::BusySpinWaitStrategy;
    use std::thread;
    use std::time::Duration;

    fn barrier_over(
        buffer_size: usize,
        dependents: Vec<Arc<Sequence>>,
    ) -> (Arc<SingleProducerSequencer>, Arc<dyn SequenceBarrier>) {
        let sequencer = Arc::new(SingleProducerSequencer::new(
            buffer_size,
            Arc::new(BusySpinWaitStrategy::new()),
        ));
        let barrier = Arc::clone(&sequencer).new_barrier(dependents);
        (sequencer, barrier)
    }

    #[test]
    fn test_wait_for_published_sequence() {
        let (sequencer, barrier) = barrier_over(16, vec![]);
        sequencer.set_gating_sequences(vec![Arc::new(Sequence::default())]);

        for _ in 0..3 {
            let seq = sequencer.next().unwrap();
            sequencer.publish(seq);
        }

        assert_eq!(barrier.wait_for(0).unwrap(), 2);
        assert_eq!(barrier.wait_for(2).unwrap(), 2);
    }

    #[test]
    fn test_dependents_gate_the_barrier() {
        let upstream = Arc::new(Sequence::new(1));
        let (sequencer, barrier) = barrier_over(16, vec![Arc::clone(&upstream)]);
        sequencer.set_gating_sequences(vec![Arc::new(Sequence::default())]);

        for _ in 0..5 {
            let seq = sequencer.next().unwrap();
            sequencer.publish(seq);
        }

        // Cursor is at 4 but the upstream consumer has only reached 1.
        assert_eq!(barrier.wait_for(0).unwrap(), 1);

        upstream.set(4);
        assert_eq!(barrier.wait_for(2).unwrap(), 4);
    }

    #[test]
    fn test_alert_lifecycle() {
        let (_sequencer, barrier) = barrier_over(16, vec![]);

        assert!(!barrier.is_alerted());
        assert!(barrier.check_alert().is_ok());

        barrier.alert();
        assert!(barrier.is_alerted());
        assert!(matches!(
            barrier.check_alert().unwrap_err(),
            DisruptorError::Alert
        ));
        assert!(matches!(
            barrier.wait_for(0).unwrap_err(),
            DisruptorError::Alert
        ));

        barrier.clear_alert();
        assert!(!barrier.is_alerted());
        assert!(barrier.check_alert().is_ok());
    }

    #[test]
    fn test_alert_interrupts_parked_waiter() {
        let (_sequencer, barrier) = barrier_over(16, vec![]);

        let waiter = {
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || barrier.wait_for(0))
        };

        thread::sleep(Duration::from_millis(20));
        barrier.alert();

        assert!(matches!(
            waiter.join().unwrap().unwrap_err(),
            DisruptorError::Alert
        ));
    }
}
