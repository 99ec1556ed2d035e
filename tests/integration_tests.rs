use ringflow::{BatchHandler, ClaimMode, Config, Pipeline, WaitStrategy};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

#[derive(Default)]
struct Event {
    value: i64,
}

struct Counting {
    count: Arc<AtomicI64>,
    last_value: Arc<AtomicI64>,
}

impl BatchHandler<Event> for Counting {
    fn on_available(&mut self, entry: &Event, _sequence: i64, _end_of_batch: bool) {
        self.last_value.store(entry.value, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
    }
}

fn wait_until(deadline: Duration, mut done: impl FnMut() -> bool) {
    let start = Instant::now();
    while !done() {
        assert!(start.elapsed() < deadline, "condition not reached in time");
        thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn throughput_smoke_hundred_thousand_events() {
    const ITERATIONS: i64 = 100_000;

    let count = Arc::new(AtomicI64::new(0));
    let last_value = Arc::new(AtomicI64::new(-1));

    let mut pipeline = Pipeline::<Event>::with_default_entries(Config::new(1024)).unwrap();
    pipeline
        .add_consumer(
            Counting {
                count: Arc::clone(&count),
                last_value: Arc::clone(&last_value),
            },
            &[],
        )
        .unwrap();
    let mut producer = pipeline.producer_barrier().unwrap();
    pipeline.start();

    for i in 0..ITERATIONS {
        let seq = producer.next_entry();
        producer.entry(seq).value = i;
        producer.commit(seq);
    }

    wait_until(Duration::from_secs(30), || {
        count.load(Ordering::Relaxed) == ITERATIONS
    });
    pipeline.stop();

    assert_eq!(count.load(Ordering::Relaxed), ITERATIONS);
    assert_eq!(last_value.load(Ordering::Relaxed), ITERATIONS - 1);
    assert_eq!(pipeline.cursor(), ITERATIONS - 1);
}

#[derive(Default)]
struct StagedEvent {
    data: i64,
    stage1: AtomicI64,
    stage2: AtomicI64,
    stage3: AtomicI64,
}

struct StageOne;

impl BatchHandler<StagedEvent> for StageOne {
    fn on_available(&mut self, entry: &StagedEvent, _sequence: i64, _end_of_batch: bool) {
        // Relaxed is enough: the release of this consumer's sequence and
        // the acquire inside the downstream wait order these accesses.
        entry.stage1.store(entry.data * 2, Ordering::Relaxed);
    }
}

struct StageTwo;

impl BatchHandler<StagedEvent> for StageTwo {
    fn on_available(&mut self, entry: &StagedEvent, _sequence: i64, _end_of_batch: bool) {
        entry
            .stage2
            .store(entry.stage1.load(Ordering::Relaxed) + 10, Ordering::Relaxed);
    }
}

struct StageThree {
    count: Arc<AtomicI64>,
    all_correct: Arc<AtomicBool>,
}

impl BatchHandler<StagedEvent> for StageThree {
    fn on_available(&mut self, entry: &StagedEvent, _sequence: i64, _end_of_batch: bool) {
        let result = entry.stage2.load(Ordering::Relaxed) * 3;
        entry.stage3.store(result, Ordering::Relaxed);
        if result != (entry.data * 2 + 10) * 3 {
            self.all_correct.store(false, Ordering::Relaxed);
        }
        self.count.fetch_add(1, Ordering::Relaxed);
    }
}

#[test]
fn three_stage_pipeline_transforms_every_event() {
    const EVENTS: i64 = 1000;

    let count = Arc::new(AtomicI64::new(0));
    let all_correct = Arc::new(AtomicBool::new(true));

    let mut pipeline = Pipeline::<StagedEvent>::with_default_entries(Config::new(64)).unwrap();
    let first = pipeline.add_consumer(StageOne, &[]).unwrap();
    let second = pipeline.add_consumer(StageTwo, &[&first]).unwrap();
    pipeline
        .add_consumer(
            StageThree {
                count: Arc::clone(&count),
                all_correct: Arc::clone(&all_correct),
            },
            &[&second],
        )
        .unwrap();
    let mut producer = pipeline.producer_barrier().unwrap();
    pipeline.start();

    for i in 0..EVENTS {
        let seq = producer.next_entry();
        producer.entry(seq).data = i;
        producer.commit(seq);
    }

    wait_until(Duration::from_secs(30), || {
        count.load(Ordering::Relaxed) == EVENTS
    });
    pipeline.stop();

    assert!(all_correct.load(Ordering::Relaxed));
}

struct Sleeping {
    count: Arc<AtomicI64>,
}

impl BatchHandler<Event> for Sleeping {
    fn on_available(&mut self, _entry: &Event, _sequence: i64, _end_of_batch: bool) {
        thread::sleep(Duration::from_millis(1));
        self.count.fetch_add(1, Ordering::Relaxed);
    }
}

#[test]
fn backpressure_bounds_the_producer_to_the_buffer() {
    const EVENTS: i64 = 1000;
    const CAPACITY: i64 = 16;

    let count = Arc::new(AtomicI64::new(0));

    let mut pipeline = Pipeline::<Event>::with_default_entries(Config::new(CAPACITY as usize))
        .unwrap();
    let consumer = pipeline
        .add_consumer(
            Sleeping {
                count: Arc::clone(&count),
            },
            &[],
        )
        .unwrap();
    let mut producer = pipeline.producer_barrier().unwrap();
    pipeline.start();

    let start = Instant::now();
    for i in 0..EVENTS {
        let seq = producer.next_entry();
        // The grant itself proves the claim protocol's bound; the
        // consumer can only have advanced since the gating check.
        assert!(
            seq - consumer.position() <= CAPACITY,
            "claim {seq} outran consumer at {}",
            consumer.position()
        );
        producer.entry(seq).value = i;
        producer.commit(seq);
    }

    wait_until(Duration::from_secs(60), || {
        count.load(Ordering::Relaxed) == EVENTS
    });
    assert!(start.elapsed() >= Duration::from_secs(1));

    pipeline.stop();
}

struct FlagRecorder {
    seen: Arc<Mutex<Vec<(i64, bool)>>>,
}

impl BatchHandler<Event> for FlagRecorder {
    fn on_available(&mut self, _entry: &Event, sequence: i64, end_of_batch: bool) {
        self.seen.lock().unwrap().push((sequence, end_of_batch));
    }
}

#[test]
fn end_of_batch_marks_only_the_last_entry_of_a_wait_round() {
    let seen = Arc::new(Mutex::new(Vec::new()));

    let mut pipeline = Pipeline::<Event>::with_default_entries(Config::new(64)).unwrap();
    pipeline
        .add_consumer(
            FlagRecorder {
                seen: Arc::clone(&seen),
            },
            &[],
        )
        .unwrap();
    let mut producer = pipeline.producer_barrier().unwrap();

    // Publish ten entries before the consumer starts so its first wait
    // observes them as one batch.
    for i in 0..10 {
        let seq = producer.next_entry();
        producer.entry(seq).value = i;
        producer.commit(seq);
    }
    pipeline.start();
    wait_until(Duration::from_secs(10), || seen.lock().unwrap().len() == 10);

    // A range commit publishes the next five as a second single batch.
    let hi = producer.next_batch(5);
    let lo = hi - 4;
    for seq in lo..=hi {
        producer.entry(seq).value = seq;
    }
    producer.commit_range(lo, hi);
    wait_until(Duration::from_secs(10), || seen.lock().unwrap().len() == 15);

    pipeline.stop();

    let seen = seen.lock().unwrap();
    let sequences: Vec<i64> = seen.iter().map(|(s, _)| *s).collect();
    assert_eq!(sequences, (0..15).collect::<Vec<i64>>());
    let batch_ends: Vec<i64> = seen
        .iter()
        .filter(|(_, end)| *end)
        .map(|(s, _)| *s)
        .collect();
    assert_eq!(batch_ends, vec![9, 14]);
}

#[test]
fn requested_capacity_rounds_up_to_a_power_of_two() {
    for (requested, expected) in [(17, 32), (1024, 1024), (1, 1)] {
        let pipeline = Pipeline::<Event>::with_default_entries(Config::new(requested)).unwrap();
        assert_eq!(pipeline.capacity(), expected, "requested {requested}");
    }
}

#[test]
fn invalid_configurations_are_rejected() {
    assert!(Pipeline::<Event>::with_default_entries(Config::new(0)).is_err());
    assert!(Pipeline::<Event>::with_default_entries(
        Config::new(16).with_claim_mode(ClaimMode::MultiProducer)
    )
    .is_err());
}

struct Ordered {
    expected: i64,
    count: Arc<AtomicI64>,
    in_order: Arc<AtomicBool>,
}

impl BatchHandler<Event> for Ordered {
    fn on_available(&mut self, entry: &Event, sequence: i64, _end_of_batch: bool) {
        if sequence != self.expected || entry.value != self.expected {
            self.in_order.store(false, Ordering::Relaxed);
        }
        self.expected += 1;
        self.count.fetch_add(1, Ordering::Relaxed);
    }
}

#[test]
fn fan_out_consumers_progress_independently() {
    const EVENTS: i64 = 1000;

    let counts = [Arc::new(AtomicI64::new(0)), Arc::new(AtomicI64::new(0))];
    let in_order = [
        Arc::new(AtomicBool::new(true)),
        Arc::new(AtomicBool::new(true)),
    ];

    let mut pipeline = Pipeline::<Event>::with_default_entries(
        Config::new(128).with_wait_strategy(WaitStrategy::BusySpin),
    )
    .unwrap();
    let refs: Vec<_> = (0..2)
        .map(|i| {
            pipeline
                .add_consumer(
                    Ordered {
                        expected: 0,
                        count: Arc::clone(&counts[i]),
                        in_order: Arc::clone(&in_order[i]),
                    },
                    &[],
                )
                .unwrap()
        })
        .collect();
    let mut producer = pipeline.producer_barrier().unwrap();
    pipeline.start();

    for i in 0..EVENTS {
        let seq = producer.next_entry();
        producer.entry(seq).value = i;
        producer.commit(seq);
    }

    wait_until(Duration::from_secs(30), || {
        refs.iter().all(|r| r.position() == EVENTS - 1)
    });
    pipeline.stop();

    for i in 0..2 {
        assert_eq!(counts[i].load(Ordering::Relaxed), EVENTS);
        assert!(in_order[i].load(Ordering::Relaxed));
    }
}

#[test]
fn producer_runs_from_a_dedicated_thread() {
    const EVENTS: i64 = 10_000;

    let count = Arc::new(AtomicI64::new(0));
    let last_value = Arc::new(AtomicI64::new(-1));

    let mut pipeline = Pipeline::<Event>::with_default_entries(Config::new(256)).unwrap();
    let consumer = pipeline
        .add_consumer(
            Counting {
                count: Arc::clone(&count),
                last_value: Arc::clone(&last_value),
            },
            &[],
        )
        .unwrap();
    let mut producer = pipeline.producer_barrier().unwrap();
    pipeline.start();

    let producing = thread::spawn(move || {
        for i in 0..EVENTS {
            let seq = producer.next_entry();
            producer.entry(seq).value = i;
            producer.commit(seq);
        }
    });
    producing.join().unwrap();

    wait_until(Duration::from_secs(30), || {
        consumer.position() == EVENTS - 1
    });
    pipeline.stop();

    assert_eq!(count.load(Ordering::Relaxed), EVENTS);
    assert_eq!(last_value.load(Ordering::Relaxed), EVENTS - 1);
}

#[test]
fn metrics_track_published_and_delivered_events() {
    const EVENTS: i64 = 100;

    let count = Arc::new(AtomicI64::new(0));
    let last_value = Arc::new(AtomicI64::new(-1));

    let mut pipeline =
        Pipeline::<Event>::with_default_entries(Config::new(64).with_metrics()).unwrap();
    pipeline
        .add_consumer(
            Counting {
                count: Arc::clone(&count),
                last_value: Arc::clone(&last_value),
            },
            &[],
        )
        .unwrap();
    let mut producer = pipeline.producer_barrier().unwrap();
    pipeline.start();

    for i in 0..EVENTS {
        let seq = producer.next_entry();
        producer.entry(seq).value = i;
        producer.commit(seq);
    }
    wait_until(Duration::from_secs(10), || {
        count.load(Ordering::Relaxed) == EVENTS
    });
    pipeline.stop();

    let snapshot = pipeline.metrics();
    assert_eq!(snapshot.events_published, EVENTS as u64);
    assert_eq!(snapshot.events_delivered, EVENTS as u64);
    assert!(snapshot.batches_delivered >= 1);
    assert!(snapshot.batches_delivered <= EVENTS as u64);
}
