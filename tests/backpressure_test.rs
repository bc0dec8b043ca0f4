//! Back-pressure tests: a full ring blocks the producer until the slowest
//! gating consumer frees a slot.

use ringline::{BusySpinWaitStrategy, Sequence, Sequencer, SingleProducerSequencer};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[test]
fn full_ring_blocks_fifth_claim_until_consumer_advances() {
    let sequencer = Arc::new(SingleProducerSequencer::new(
        4,
        Arc::new(BusySpinWaitStrategy::new()),
    ));
    let consumer = Arc::new(Sequence::default());
    sequencer.set_gating_sequences(vec![Arc::clone(&consumer)]);

    // Four claims fill the ring.
    for expected in 0..4 {
        let seq = sequencer.next().unwrap();
        assert_eq!(seq, expected);
        sequencer.publish(seq);
    }

    // The fifth claim has wrap point 4 - 4 = 0 against a consumer at -1, so
    // it must not return until the consumer reaches 0.
    let claimed = Arc::new(AtomicBool::new(false));
    let producer = {
        let sequencer = Arc::clone(&sequencer);
        let claimed = Arc::clone(&claimed);
        thread::spawn(move || {
            let seq = sequencer.next().unwrap();
            claimed.store(true, Ordering::Release);
            seq
        })
    };

    thread::sleep(Duration::from_millis(200));
    assert!(
        !claimed.load(Ordering::Acquire),
        "claim returned while the ring was still full"
    );

    consumer.set(0);
    assert_eq!(producer.join().unwrap(), 4);
    assert!(claimed.load(Ordering::Acquire));
}

#[test]
fn blocked_batch_claim_resumes_once_enough_slots_free() {
    let sequencer = Arc::new(SingleProducerSequencer::new(
        8,
        Arc::new(BusySpinWaitStrategy::new()),
    ));
    let consumer = Arc::new(Sequence::default());
    sequencer.set_gating_sequences(vec![Arc::clone(&consumer)]);

    let seq = sequencer.next_n(8).unwrap();
    assert_eq!(seq, 7);
    sequencer.publish(seq);

    let producer = {
        let sequencer = Arc::clone(&sequencer);
        thread::spawn(move || sequencer.next_n(3).unwrap())
    };

    thread::sleep(Duration::from_millis(100));

    // Freeing two slots is not enough for a claim of three.
    consumer.set(1);
    thread::sleep(Duration::from_millis(100));
    assert!(!producer.is_finished());

    // The third freed slot lets the claim through.
    consumer.set(2);
    let start = Instant::now();
    assert_eq!(producer.join().unwrap(), 10);
    assert!(start.elapsed() < Duration::from_secs(5));
}
