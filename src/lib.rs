//! `Ringline` - Low-Latency In-Process Event Passing
//!
//! A lock-free event-passing core built around a preallocated circular slot
//! array, following the LMAX Disruptor coordination design for ultra-low
//! latency handoff between a single producer and a graph of consumers.
//!
//! ## Features
//!
//! - **Lock-free hot path**: Uses only atomic operations and memory barriers
//! - **Zero-allocation**: Pre-allocates all events during initialization
//! - **Mechanical sympathy**: Cache-line-padded sequence counters
//! - **High throughput**: Bounded batch processing amortizes coordination
//! - **Real back-pressure**: Producers block when the slowest consumer lags
//! - **Consumer graphs**: Barriers gate downstream stages on upstream progress
//!
//! ## Quick Start
//!
//! ```rust
//! use ringline::{
//!     BatchEventProcessor, BusySpinWaitStrategy, DefaultEventFactory,
//!     EventHandler, EventProcessor, RingBuffer, Result, Sequencer,
//!     SingleProducerSequencer,
//! };
//! use std::sync::Arc;
//!
//! // Define your event type
//! #[derive(Debug, Default)]
//! struct MyEvent {
//!     value: i64,
//! }
//!
//! // Implement an event handler
//! struct MyEventHandler;
//!
//! impl EventHandler<MyEvent> for MyEventHandler {
//!     fn on_event(&mut self, event: &MyEvent, sequence: i64, _end_of_batch: bool) -> Result<()> {
//!         println!("Processing event {} with value {}", sequence, event.value);
//!         Ok(())
//!     }
//! }
//!
//! // Wire the topology: sequencer, ring buffer, barrier, processor
//! let wait_strategy = Arc::new(BusySpinWaitStrategy::new());
//! let sequencer = Arc::new(SingleProducerSequencer::new(1024, wait_strategy));
//! let ring_buffer = Arc::new(RingBuffer::new(
//!     1024,
//!     DefaultEventFactory::<MyEvent>::new(),
//!     sequencer.clone() as Arc<dyn Sequencer>,
//! ).unwrap());
//!
//! let barrier = ring_buffer.new_barrier(vec![]);
//! let processor = Arc::new(BatchEventProcessor::new(
//!     ring_buffer.clone(),
//!     barrier,
//!     MyEventHandler,
//! ));
//! ring_buffer.set_gating_sequences(vec![processor.get_sequence()]);
//!
//! // Run the processor on its own thread, publish from this one, then halt:
//! // let consumer = std::thread::spawn({ let p = processor.clone(); move || p.run() });
//! // let seq = ring_buffer.next().unwrap();
//! // unsafe { ring_buffer.get_mut(seq).value = 42; }
//! // ring_buffer.publish(seq);
//! // processor.halt();
//! // consumer.join().unwrap().unwrap();
//! ```
//!
//! ## Architecture
//!
//! - [`Sequence`]: cache-line-padded atomic counters for coordination
//! - [`SingleProducerSequencer`]: claims slot ranges and publishes the cursor
//! - [`RingBuffer`]: pre-allocated circular slot array, sequence → slot addressing
//! - [`SequenceBarrier`]: the per-consumer suspension point, with alerting
//! - [`WaitStrategy`]: how producers and consumers wait for progress
//! - [`BatchEventProcessor`]: the consumer driver loop with batching
//! - [`EventHandler`] / [`ExceptionHandler`]: the contracts the embedder supplies

pub mod event_factory;
pub mod event_handler;
pub mod event_processor;
pub mod exception_handler;
pub mod ring_buffer;
pub mod sequence;
pub mod sequence_barrier;
pub mod sequencer;
pub mod wait_strategy;


pub use event_factory::{ClosureEventFactory, DefaultEventFactory, EventFactory};
pub use event_handler::{ClosureEventHandler, EventHandler, NoOpEventHandler};
pub use event_processor::{BatchEventProcessor, DataProvider, EventProcessor};
pub use exception_handler::{
    ClosureExceptionHandler, DefaultExceptionHandler, ExceptionHandler, IgnoreExceptionHandler,
};
pub use ring_buffer::RingBuffer;
pub use sequence::Sequence;
pub use sequence_barrier::{ProcessingSequenceBarrier, SequenceBarrier};
pub use sequencer::{Sequencer, SingleProducerSequencer};
pub use wait_strategy::{
    BlockingWaitStrategy, BusySpinWaitStrategy, SleepingWaitStrategy, WaitStrategy,
    YieldingWaitStrategy,
};

/// The initial value of every sequence: no slot has ever been claimed or consumed.
pub const INITIAL_CURSOR_VALUE: i64 = -1;

/// Errors that can occur in the event-passing core
#[derive(Debug, thiserror::Error)]
pub enum DisruptorError {
    #[error("buffer size must be a power of 2, got: {0}")]
    InvalidBufferSize(usize),

    #[error("claim size {claimed} outside valid range 1..={buffer_size}")]
    InvalidClaimSize { claimed: i64, buffer_size: i64 },

    #[error("event processor is already running")]
    AlreadyRunning,

    #[error("sequence barrier alerted")]
    Alert,

    #[error("event handler failed: {0}")]
    Handler(String),

    #[error("fatal event handler failure at sequence {sequence}")]
    EventHandlerFatal {
        sequence: i64,
        #[source]
        source: Box<DisruptorError>,
    },

    #[error("event handler failed during startup")]
    StartupFatal {
        #[source]
        source: Box<DisruptorError>,
    },

    #[error("event handler failed during shutdown")]
    ShutdownFatal {
        #[source]
        source: Box<DisruptorError>,
    },
}

pub type Result<T> = std::result::Result<T, DisruptorError>;

/// Utility function to check if a number is a power of 2
pub fn is_power_of_two(n: usize) -> bool {
    n != 0 && (n & (n - 1)) == 0
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get the version of the `Ringline` library
#[must_use]
pub fn version() -> &'static str {
    VERSION
}
