//! Exception Handler Implementation
//!
//! The pluggable failure policy of an event processor. When a handler
//! callback fails, the processor delegates to its exception handler, which
//! decides between recovering (the processor advances past the failing slot)
//! and escalating (the processor shuts down fatally).

use crate::{DisruptorError, Result};
use std::fmt::Debug;

/// Policy for failures raised by event handler callbacks
///
/// Each method receives the original error and either returns `Ok(())` to
/// recover (the processor advances and keeps running) or an error to
/// escalate, which terminates the processor after `on_shutdown`.
///
/// # Type Parameters
/// * `T` - The event type being processed
pub trait ExceptionHandler<T>: Send + Sync {
    /// Handle a failure from `on_event`
    ///
    /// On recovery the processor's sequence is advanced to `sequence`, so
    /// downstream stages will observe the failing slot as consumed.
    ///
    /// # Errors
    /// Returning an error escalates: the processor stops fatally.
    fn handle_event_exception(&self, error: DisruptorError, sequence: i64, event: &T)
        -> Result<()>;

    /// Handle a failure from `on_start`
    ///
    /// # Errors
    /// Returning an error aborts startup before any event is processed.
    fn handle_on_start_exception(&self, error: DisruptorError) -> Result<()>;

    /// Handle a failure from `on_shutdown`
    ///
    /// # Errors
    /// Returning an error surfaces from `run` after the processor has
    /// already returned to idle.
    fn handle_on_shutdown_exception(&self, error: DisruptorError) -> Result<()>;
}

/// The default policy: log and escalate
///
/// Every failure is fatal. Event failures are wrapped with the sequence they
/// occurred at so the embedder can tell how far processing got.
#[derive(Debug, Default)]
pub struct DefaultExceptionHandler<T> {
    _phantom: std::marker::PhantomData<fn(&T)>,
}

impl<T> DefaultExceptionHandler<T> {
    /// Create a new default exception handler
    pub fn new() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<T> ExceptionHandler<T> for DefaultExceptionHandler<T>
where
    T: Debug + Send + Sync,
{
    fn handle_event_exception(
        &self,
        error: DisruptorError,
        sequence: i64,
        event: &T,
    ) -> Result<()> {
        tracing::error!(sequence, ?event, %error, "event handler failed");
        Err(DisruptorError::EventHandlerFatal {
            sequence,
            source: Box::new(error),
        })
    }

    fn handle_on_start_exception(&self, error: DisruptorError) -> Result<()> {
        tracing::error!(%error, "event handler failed during startup");
        Err(DisruptorError::StartupFatal {
            source: Box::new(error),
        })
    }

    fn handle_on_shutdown_exception(&self, error: DisruptorError) -> Result<()> {
        tracing::error!(%error, "event handler failed during shutdown");
        Err(DisruptorError::ShutdownFatal {
            source: Box::new(error),
        })
    }
}

/// Policy that swallows every failure
///
/// The processor advances past failing slots and keeps running. Use with
/// care: downstream stages observe the failed slot as consumed.
#[derive(Debug, Default)]
pub struct IgnoreExceptionHandler<T> {
    _phantom: std::marker::PhantomData<fn(&T)>,
}

impl<T> IgnoreExceptionHandler<T> {
    /// Create a new ignore exception handler
    pub fn new() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<T> ExceptionHandler<T> for IgnoreExceptionHandler<T>
where
    T: Send + Sync,
{
    fn handle_event_exception(
        &self,
        error: DisruptorError,
        sequence: i64,
        _event: &T,
    ) -> Result<()> {
        tracing::debug!(sequence, %error, "ignoring event handler failure");
        Ok(())
    }

    fn handle_on_start_exception(&self, _error: DisruptorError) -> Result<()> {
        Ok(())
    }

    fn handle_on_shutdown_exception(&self, _error: DisruptorError) -> Result<()> {
        Ok(())
    }
}

/// Closure-based exception policy
///
/// # Type Parameters
/// * `T` - The event type
/// * `F` - Closure for event failures
/// * `S` - Closure for startup failures
/// * `H` - Closure for shutdown failures
pub struct ClosureExceptionHandler<T, F, S, H>
where
    F: Fn(DisruptorError, i64, &T) -> Result<()> + Send + Sync,
    S: Fn(DisruptorError) -> Result<()> + Send + Sync,
    H: Fn(DisruptorError) -> Result<()> + Send + Sync,
{
    event_handler: F,
    start_handler: S,
    shutdown_handler: H,
    _phantom: std::marker::PhantomData<fn(&T)>,
}

impl<T, F, S, H> ClosureExceptionHandler<T, F, S, H>
where
    F: Fn(DisruptorError, i64, &T) -> Result<()> + Send + Sync,
    S: Fn(DisruptorError) -> Result<()> + Send + Sync,
    H: Fn(DisruptorError) -> Result<()> + Send + Sync,
{
    /// Create a new closure-based exception policy
    pub fn new(event_handler: F, start_handler: S, shutdown_handler: H) -> Self {
        Self {
            event_handler,
            start_handler,
            shutdown_handler,
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<T, F, S, H> ExceptionHandler<T> for ClosureExceptionHandler<T, F, S, H>
where
    T: Send + Sync,
    F: Fn(DisruptorError, i64, &T) -> Result<()> + Send + Sync,
    S: Fn(DisruptorError) -> Result<()> + Send + Sync,
    H: Fn(DisruptorError) -> Result<()> + Send + Sync,
{
    fn handle_event_exception(
        &self,
        error: DisruptorError,
        sequence: i64,
        event: &T,
    ) -> Result<()> {
        (self.event_handler)(error, sequence, event)
    }

    fn handle_on_start_exception(&self, error: DisruptorError) -> Result<()> {
        (self.start_handler)(error)
    }

    fn handle_on_shutdown_exception(&self, error: DisruptorError) -> Result<()> {
        (self.shutdown_handler)(error)
    }
}
