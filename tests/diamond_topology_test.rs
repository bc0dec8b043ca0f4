//! Diamond topology test: producer -> {A, B} in parallel -> C gated on both.
//! C must never overtake either upstream stage, and the producer is gated on
//! C alone.

use ringline::{
    BatchEventProcessor, BusySpinWaitStrategy, DefaultEventFactory, EventHandler, EventProcessor,
    Result, RingBuffer, Sequence, Sequencer, SingleProducerSequencer,
};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct TestEvent {
    value: i64,
}

/// Records the order in which events were observed
struct StageHandler {
    seen: Arc<Mutex<Vec<i64>>>,
    last_sequence: Arc<AtomicI64>,
}

impl EventHandler<TestEvent> for StageHandler {
    fn on_event(&mut self, event: &TestEvent, sequence: i64, _end_of_batch: bool) -> Result<()> {
        self.seen.lock().unwrap().push(event.value);
        self.last_sequence.store(sequence, Ordering::Release);
        Ok(())
    }
}

/// The join stage: asserts both upstream sequences have passed every event
/// it is handed
struct JoinHandler {
    upstream_a: Arc<Sequence>,
    upstream_b: Arc<Sequence>,
    seen: Arc<Mutex<Vec<i64>>>,
    last_sequence: Arc<AtomicI64>,
}

impl EventHandler<TestEvent> for JoinHandler {
    fn on_event(&mut self, event: &TestEvent, sequence: i64, _end_of_batch: bool) -> Result<()> {
        assert!(
            self.upstream_a.get() >= sequence,
            "join stage ran ahead of stage A"
        );
        assert!(
            self.upstream_b.get() >= sequence,
            "join stage ran ahead of stage B"
        );
        self.seen.lock().unwrap().push(event.value);
        self.last_sequence.store(sequence, Ordering::Release);
        Ok(())
    }
}

fn wait_until(deadline: Duration, mut predicate: impl FnMut() -> bool) {
    let start = Instant::now();
    while !predicate() {
        assert!(start.elapsed() < deadline, "condition not reached in time");
        thread::yield_now();
    }
}

#[test]
fn join_stage_sees_events_only_after_both_parallel_stages() {
    let sequencer = Arc::new(SingleProducerSequencer::new(
        8,
        Arc::new(BusySpinWaitStrategy::new()),
    ));
    let ring_buffer = Arc::new(
        RingBuffer::new(
            8,
            DefaultEventFactory::<TestEvent>::new(),
            sequencer as Arc<dyn Sequencer>,
        )
        .unwrap(),
    );

    let seen_a = Arc::new(Mutex::new(Vec::new()));
    let seen_b = Arc::new(Mutex::new(Vec::new()));
    let seen_c = Arc::new(Mutex::new(Vec::new()));
    let last_a = Arc::new(AtomicI64::new(-1));
    let last_b = Arc::new(AtomicI64::new(-1));
    let last_c = Arc::new(AtomicI64::new(-1));

    // Parallel stages A and B gate on the cursor alone.
    let processor_a = Arc::new(BatchEventProcessor::new(
        Arc::clone(&ring_buffer),
        ring_buffer.new_barrier(vec![]),
        StageHandler {
            seen: Arc::clone(&seen_a),
            last_sequence: Arc::clone(&last_a),
        },
    ));
    let processor_b = Arc::new(BatchEventProcessor::new(
        Arc::clone(&ring_buffer),
        ring_buffer.new_barrier(vec![]),
        StageHandler {
            seen: Arc::clone(&seen_b),
            last_sequence: Arc::clone(&last_b),
        },
    ));

    // C gates on A and B; the cursor is covered transitively.
    let processor_c = Arc::new(BatchEventProcessor::new(
        Arc::clone(&ring_buffer),
        ring_buffer.new_barrier(vec![processor_a.get_sequence(), processor_b.get_sequence()]),
        JoinHandler {
            upstream_a: processor_a.get_sequence(),
            upstream_b: processor_b.get_sequence(),
            seen: Arc::clone(&seen_c),
            last_sequence: Arc::clone(&last_c),
        },
    ));

    // Only the terminal stage constrains the producer.
    ring_buffer.set_gating_sequences(vec![processor_c.get_sequence()]);

    let thread_a = {
        let p = Arc::clone(&processor_a);
        thread::spawn(move || p.run())
    };
    let thread_b = {
        let p = Arc::clone(&processor_b);
        thread::spawn(move || p.run())
    };
    let thread_c = {
        let p = Arc::clone(&processor_c);
        thread::spawn(move || p.run())
    };

    for value in 0..5 {
        let seq = ring_buffer.next().unwrap();
        // SAFETY: we hold the claim on seq until publish.
        unsafe { ring_buffer.get_mut(seq).value = value };
        ring_buffer.publish(seq);
    }

    wait_until(Duration::from_secs(5), || {
        last_a.load(Ordering::Acquire) == 4
            && last_b.load(Ordering::Acquire) == 4
            && last_c.load(Ordering::Acquire) == 4
    });

    // Halt order is irrelevant; all three must terminate.
    processor_c.halt();
    processor_a.halt();
    processor_b.halt();
    assert!(thread_a.join().unwrap().is_ok());
    assert!(thread_b.join().unwrap().is_ok());
    assert!(thread_c.join().unwrap().is_ok());

    let expected: Vec<i64> = (0..5).collect();
    assert_eq!(*seen_a.lock().unwrap(), expected);
    assert_eq!(*seen_b.lock().unwrap(), expected);
    assert_eq!(*seen_c.lock().unwrap(), expected);
}
