//! Event Processor Implementation
//!
//! The consumer driver: a state machine around a batching loop that waits on
//! a sequence barrier, dispatches events to the embedder's handler, and
//! advances its own sequence once per batch so downstream stages and the
//! producer observe progress.

use crate::event_handler::EventHandler;
use crate::exception_handler::{DefaultExceptionHandler, ExceptionHandler};
use crate::sequence::Sequence;
use crate::sequence_barrier::SequenceBarrier;
use crate::{DisruptorError, Result};
use std::cell::UnsafeCell;
use std::fmt::Debug;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Default cap on the number of events dispatched per batch
pub const DEFAULT_MAX_BATCH_SIZE: usize = 64;

/// Provider of the slots an event processor reads
///
/// Implemented by the ring buffer; kept as a trait so processors stay
/// monomorphized over their data source and tests can substitute doubles.
pub trait DataProvider<T>: Send + Sync {
    /// Get the event at the given sequence
    ///
    /// Callers must only pass sequences whose publication they have observed
    /// through a barrier.
    fn get(&self, sequence: i64) -> &T;

    /// Get a mutable reference to the event at the given sequence
    ///
    /// # Safety
    /// The caller must hold the producer claim on `sequence`; no other
    /// reference to the slot may exist while the returned one is live.
    unsafe fn get_mut(&self, sequence: i64) -> &mut T;
}

/// Trait for event processors
pub trait EventProcessor: Send + Sync {
    /// Get a handle to this processor's consumed sequence
    ///
    /// Register it with the sequencer's gating set (terminal stages) or pass
    /// it as a dependent to downstream barriers.
    fn get_sequence(&self) -> Arc<Sequence>;

    /// Request the processor to stop after the event it is currently on
    fn halt(&self);

    /// Check whether a `run` invocation is in flight
    ///
    /// A halted processor whose loop has not yet exited still reports
    /// running: the flag reflects lifecycle, not activity.
    fn is_running(&self) -> bool;

    /// Run the processing loop on the calling thread until halted
    ///
    /// # Errors
    /// Returns `DisruptorError::AlreadyRunning` if a `run` is already in
    /// flight, or the fatal error that terminated the loop.
    fn run(&self) -> Result<()>;
}

/// Lifecycle states of a processor
mod run_state {
    pub const IDLE: u8 = 0;
    pub const RUNNING: u8 = 1;
    pub const HALTED: u8 = 2;
}

/// Batch event processor
///
/// Drives one consumer: waits on its barrier for the next sequence, then
/// dispatches every visible event up to the configured batch cap before
/// publishing its own progress with a single release store. Failures from
/// the handler are routed through the exception policy.
pub struct BatchEventProcessor<T, H, D>
where
    H: EventHandler<T>,
    D: DataProvider<T>,
{
    /// This processor's consumed cursor, advanced once per batch
    sequence: Arc<Sequence>,
    /// The suspension point, shared with whoever may halt us
    barrier: Arc<dyn SequenceBarrier>,
    /// The slot source
    data_provider: Arc<D>,
    /// The embedder's handler; aliased only by the single thread that wins
    /// the IDLE -> RUNNING transition
    handler: UnsafeCell<H>,
    /// Failure policy
    exception_handler: Box<dyn ExceptionHandler<T>>,
    run_state: AtomicU8,
    /// Configured max batch size minus one
    batch_size_offset: i64,
}

// SAFETY: the UnsafeCell around the handler is only dereferenced inside
// `run`, and the IDLE -> RUNNING CAS admits exactly one runner at a time, so
// the handler is never aliased across threads.
unsafe impl<T, H, D> Sync for BatchEventProcessor<T, H, D>
where
    T: Send + Sync,
    H: EventHandler<T>,
    D: DataProvider<T>,
{
}

impl<T, H, D> BatchEventProcessor<T, H, D>
where
    T: Debug + Send + Sync + 'static,
    H: EventHandler<T>,
    D: DataProvider<T>,
{
    /// Create a new batch event processor
    ///
    /// The handler's `set_sequence_callback` is invoked here, once, with a
    /// handle to this processor's own sequence.
    pub fn new(data_provider: Arc<D>, barrier: Arc<dyn SequenceBarrier>, mut handler: H) -> Self {
        let sequence = Arc::new(Sequence::default());
        handler.set_sequence_callback(Arc::clone(&sequence));

        Self {
            sequence,
            barrier,
            data_provider,
            handler: UnsafeCell::new(handler),
            exception_handler: Box::new(DefaultExceptionHandler::new()),
            run_state: AtomicU8::new(run_state::IDLE),
            batch_size_offset: (DEFAULT_MAX_BATCH_SIZE - 1) as i64,
        }
    }

    /// Replace the exception policy; call before `run`
    pub fn set_exception_handler(&mut self, handler: Box<dyn ExceptionHandler<T>>) {
        self.exception_handler = handler;
    }

    /// Cap the number of events dispatched per batch; call before `run`
    ///
    /// # Panics
    /// Panics if `max_batch_size` is zero.
    pub fn set_max_batch_size(&mut self, max_batch_size: usize) {
        assert!(max_batch_size >= 1, "max batch size must be at least 1");
        self.batch_size_offset = (max_batch_size - 1) as i64;
    }

    /// The batching loop
    fn process_events(&self, handler: &mut H) -> Result<()> {
        let mut next_sequence = self.sequence.get() + 1;

        while self.run_state.load(Ordering::Acquire) == run_state::RUNNING {
            match self.barrier.wait_for(next_sequence) {
                Ok(available_sequence) => {
                    if available_sequence < next_sequence {
                        // A strategy gave up before supply arrived; deliver
                        // nothing and let the handler know.
                        handler.on_timeout(next_sequence)?;
                        continue;
                    }

                    let end_of_batch =
                        std::cmp::min(next_sequence + self.batch_size_offset, available_sequence);
                    handler.on_batch_start(
                        end_of_batch - next_sequence + 1,
                        available_sequence - next_sequence + 1,
                    );

                    while next_sequence <= end_of_batch {
                        let event = self.data_provider.get(next_sequence);
                        match handler.on_event(event, next_sequence, next_sequence == end_of_batch)
                        {
                            Ok(()) => next_sequence += 1,
                            Err(error) => {
                                self.exception_handler.handle_event_exception(
                                    error,
                                    next_sequence,
                                    event,
                                )?;
                                // Policy recovered: consume the failing slot
                                // so downstream stages are not stalled by it.
                                self.sequence.set(next_sequence);
                                next_sequence += 1;
                            }
                        }
                    }

                    // The one point where downstream barriers and producer
                    // gating observe this consumer's progress.
                    self.sequence.set(end_of_batch);
                }
                Err(DisruptorError::Alert) => {
                    if self.run_state.load(Ordering::Acquire) == run_state::RUNNING {
                        // Alerted without a halt: the host must surface this.
                        return Err(DisruptorError::Alert);
                    }
                    break;
                }
                Err(error) => return Err(error),
            }
        }

        Ok(())
    }
}

impl<T, H, D> EventProcessor for BatchEventProcessor<T, H, D>
where
    T: Debug + Send + Sync + 'static,
    H: EventHandler<T>,
    D: DataProvider<T>,
{
    fn get_sequence(&self) -> Arc<Sequence> {
        Arc::clone(&self.sequence)
    }

    fn halt(&self) {
        // Only a running processor transitions to HALTED; halting an idle
        // one must not wedge a later run.
        let _ = self.run_state.compare_exchange(
            run_state::RUNNING,
            run_state::HALTED,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        tracing::debug!("event processor halt requested");
        self.barrier.alert();
    }

    fn is_running(&self) -> bool {
        self.run_state.load(Ordering::Acquire) != run_state::IDLE
    }

    fn run(&self) -> Result<()> {
        self.run_state
            .compare_exchange(
                run_state::IDLE,
                run_state::RUNNING,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map_err(|_| DisruptorError::AlreadyRunning)?;

        self.barrier.clear_alert();
        tracing::debug!(sequence = self.sequence.get(), "event processor starting");

        // SAFETY: the IDLE -> RUNNING CAS above admits exactly one runner;
        // no other code path touches the handler cell.
        let handler = unsafe { &mut *self.handler.get() };

        if let Err(error) = handler.on_start() {
            if let Err(fatal) = self.exception_handler.handle_on_start_exception(error) {
                self.run_state.store(run_state::IDLE, Ordering::Release);
                return Err(fatal);
            }
        }

        let run_result = self.process_events(handler);

        let shutdown_result = match handler.on_shutdown() {
            Ok(()) => Ok(()),
            Err(error) => self.exception_handler.handle_on_shutdown_exception(error),
        };

        self.run_state.store(run_state::IDLE, Ordering::Release);
        tracing::debug!(sequence = self.sequence.get(), "event processor stopped");

        run_result?;
        shutdown_result
    }
}

impl<T, H, D> Debug for BatchEventProcessor<T, H, D>
where
    H: EventHandler<T>,
    D: DataProvider<T>,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchEventProcessor")
            .field("sequence", &self.sequence)
            .field("run_state", &self.run_state.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}
