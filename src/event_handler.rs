//! Event Handler Implementation
//!
//! The consumer-side contract: a handler receives every published event in
//! sequence order, plus optional lifecycle and batch notifications.

use crate::sequence::Sequence;
use crate::Result;
use std::sync::Arc;

/// Handler for processing events from the ring
///
/// Implemented by consumers. Only `on_event` is required; the remaining
/// callbacks default to no-ops.
///
/// # Type Parameters
/// * `T` - The event type that will be processed
pub trait EventHandler<T>: Send {
    /// Process one event
    ///
    /// Called once per published sequence, in strictly ascending order.
    /// Events are shared slots: other consumers may be reading the same slot
    /// concurrently, so handlers receive `&T`.
    ///
    /// # Arguments
    /// * `event` - The event to process
    /// * `sequence` - The sequence number of the event
    /// * `end_of_batch` - True if this is the last event of the current batch
    ///
    /// # Errors
    /// An error is routed through the processor's exception policy, which
    /// decides between recover-and-advance and fatal shutdown.
    fn on_event(&mut self, event: &T, sequence: i64, end_of_batch: bool) -> Result<()>;

    /// Called once before the first event of every non-empty batch
    ///
    /// `batch_size` is the number of events about to be delivered;
    /// `queue_depth` is how many events were visible in total, including any
    /// beyond the batch cap.
    fn on_batch_start(&mut self, _batch_size: i64, _queue_depth: i64) {}

    /// Called once when the processor starts, before any event
    ///
    /// # Errors
    /// An error is routed through the processor's exception policy.
    fn on_start(&mut self) -> Result<()> {
        Ok(())
    }

    /// Called once when the processor shuts down, after the last event
    ///
    /// # Errors
    /// An error is routed through the processor's exception policy.
    fn on_shutdown(&mut self) -> Result<()> {
        Ok(())
    }

    /// Called when a wait returns without reaching the requested sequence
    ///
    /// Reserved for wait strategies that give up early; none of the shipped
    /// strategies do.
    ///
    /// # Errors
    /// An error terminates the processor fatally.
    fn on_timeout(&mut self, _sequence: i64) -> Result<()> {
        Ok(())
    }

    /// Receive a handle to the owning processor's sequence
    ///
    /// Invoked once at processor construction. Handlers that process very
    /// long batches can advance the sequence mid-batch to release downstream
    /// consumers early.
    fn set_sequence_callback(&mut self, _sequence_callback: Arc<Sequence>) {}
}

/// Event handler backed by a closure
pub struct ClosureEventHandler<T, F>
where
    F: FnMut(&T, i64, bool) -> Result<()> + Send,
{
    handler: F,
    _phantom: std::marker::PhantomData<fn(&T)>,
}

impl<T, F> ClosureEventHandler<T, F>
where
    F: FnMut(&T, i64, bool) -> Result<()> + Send,
{
    /// Create a new closure-based event handler
    pub fn new(handler: F) -> Self {
        Self {
            handler,
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<T, F> EventHandler<T> for ClosureEventHandler<T, F>
where
    T: Send + Sync,
    F: FnMut(&T, i64, bool) -> Result<()> + Send,
{
    fn on_event(&mut self, event: &T, sequence: i64, end_of_batch: bool) -> Result<()> {
        (self.handler)(event, sequence, end_of_batch)
    }
}

/// A no-op event handler for tests and benchmarks
pub struct NoOpEventHandler<T> {
    _phantom: std::marker::PhantomData<fn(&T)>,
}

impl<T> NoOpEventHandler<T> {
    /// Create a new no-op event handler
    pub fn new() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<T> Default for NoOpEventHandler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> EventHandler<T> for NoOpEventHandler<T>
where
    T: Send + Sync,
{
    fn on_event(&mut self, _event: &T, _sequence: i64, _end_of_batch: bool) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct TestEvent {
        value: i64,
    }

    #[test]
    fn test_closure_event_handler() {
        let mut seen = Vec::new();
        {
            let mut handler = ClosureEventHandler::new(|event: &TestEvent, sequence, eob| {
                seen.push((event.value, sequence, eob));
                Ok(())
            });

            let event = TestEvent { value: 7 };
            handler.on_event(&event, 42, true).unwrap();
        }
        assert_eq!(seen, vec![(7, 42, true)]);
    }

    #[test]
    fn test_no_op_event_handler() {
        let mut handler = NoOpEventHandler::<TestEvent>::new();
        let event = TestEvent { value: 123 };

        handler.on_event(&event, 0, false).unwrap();
        assert!(handler.on_start().is_ok());
        assert!(handler.on_shutdown().is_ok());
        assert!(handler.on_timeout(5).is_ok());
    }
}
