//! Single producer, single consumer throughput benchmark
//!
//! Publishes bursts of events through the ring and waits for the consumer to
//! observe the last element of each burst, measuring end-to-end handoff.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ringline::{
    BatchEventProcessor, BusySpinWaitStrategy, DefaultEventFactory, EventHandler, EventProcessor,
    Result, RingBuffer, Sequencer, SingleProducerSequencer,
};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

const BUFFER_SIZE: usize = 1024;
const BURST_SIZES: [i64; 3] = [1, 10, 100];

#[derive(Debug, Default)]
struct Event {
    value: i64,
}

/// Forwards every observed value into a shared sink
struct SinkHandler {
    sink: Arc<AtomicI64>,
}

impl EventHandler<Event> for SinkHandler {
    fn on_event(&mut self, event: &Event, _sequence: i64, _end_of_batch: bool) -> Result<()> {
        self.sink.store(event.value, Ordering::Release);
        Ok(())
    }
}

pub fn spsc_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("spsc");

    for burst_size in BURST_SIZES {
        group.throughput(Throughput::Elements(burst_size as u64));

        let sequencer = Arc::new(SingleProducerSequencer::new(
            BUFFER_SIZE,
            Arc::new(BusySpinWaitStrategy::new()),
        ));
        let ring_buffer = Arc::new(
            RingBuffer::new(
                BUFFER_SIZE,
                DefaultEventFactory::<Event>::new(),
                sequencer as Arc<dyn Sequencer>,
            )
            .unwrap(),
        );

        let sink = Arc::new(AtomicI64::new(0));
        let processor = Arc::new(BatchEventProcessor::new(
            Arc::clone(&ring_buffer),
            ring_buffer.new_barrier(vec![]),
            SinkHandler {
                sink: Arc::clone(&sink),
            },
        ));
        ring_buffer.set_gating_sequences(vec![processor.get_sequence()]);

        let consumer = {
            let processor = Arc::clone(&processor);
            thread::spawn(move || processor.run())
        };

        let benchmark_id = BenchmarkId::new("ringline", burst_size);
        group.bench_with_input(benchmark_id, &burst_size, |b, &size| {
            b.iter_custom(|iters| {
                let start = Instant::now();
                for _ in 0..iters {
                    sink.store(0, Ordering::Release);
                    for data in 1..=size {
                        let seq = ring_buffer.next().unwrap();
                        // SAFETY: the claim on seq is held until publish.
                        unsafe { ring_buffer.get_mut(seq).value = black_box(data) };
                        ring_buffer.publish(seq);
                    }
                    // Wait for the last element of the burst to land.
                    while sink.load(Ordering::Acquire) != size {
                        std::hint::spin_loop();
                    }
                }
                start.elapsed()
            })
        });

        processor.halt();
        consumer.join().unwrap().unwrap();
    }

    group.finish();
}

criterion_group!(benches, spsc_benchmark);
criterion_main!(benches);
