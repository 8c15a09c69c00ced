use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use std::thread;

use elastic_mpmc::Queue;

const MESSAGES: usize = 1_000_000;
const BUFFER_SIZE: usize = 1024;

fn run_elastic(producers: usize, consumers: usize) {
    let queue = Queue::bounded(BUFFER_SIZE).unwrap();
    let mut handles = vec![];

    let per_producer = MESSAGES / producers;
    for p in 0..producers {
        let q = queue.clone();
        handles.push(thread::spawn(move || {
            for i in 0..per_producer {
                let mut item = black_box(p * per_producer + i);
                while let Err(e) = q.push(item) {
                    item = e.into_inner();
                    std::hint::spin_loop();
                }
            }
        }));
    }

    let per_consumer = MESSAGES / consumers;
    for _ in 0..consumers {
        let q = queue.clone();
        handles.push(thread::spawn(move || {
            for _ in 0..per_consumer {
                while q.pop().is_err() {
                    std::hint::spin_loop();
                }
            }
        }));
    }

    for h in handles {
        h.join().unwrap();
    }
}

fn run_crossbeam(producers: usize, consumers: usize) {
    let (tx, rx) = crossbeam_channel::bounded::<usize>(BUFFER_SIZE);
    let mut handles = vec![];

    let per_producer = MESSAGES / producers;
    for p in 0..producers {
        let tx = tx.clone();
        handles.push(thread::spawn(move || {
            for i in 0..per_producer {
                tx.send(black_box(p * per_producer + i)).unwrap();
            }
        }));
    }
    drop(tx);

    let per_consumer = MESSAGES / consumers;
    for _ in 0..consumers {
        let rx = rx.clone();
        handles.push(thread::spawn(move || {
            for _ in 0..per_consumer {
                rx.recv().unwrap();
            }
        }));
    }

    for h in handles {
        h.join().unwrap();
    }
}

fn run_flume(producers: usize, consumers: usize) {
    let (tx, rx) = flume::bounded::<usize>(BUFFER_SIZE);
    let mut handles = vec![];

    let per_producer = MESSAGES / producers;
    for p in 0..producers {
        let tx = tx.clone();
        handles.push(thread::spawn(move || {
            for i in 0..per_producer {
                tx.send(black_box(p * per_producer + i)).unwrap();
            }
        }));
    }
    drop(tx);

    let per_consumer = MESSAGES / consumers;
    for _ in 0..consumers {
        let rx = rx.clone();
        handles.push(thread::spawn(move || {
            for _ in 0..per_consumer {
                rx.recv().unwrap();
            }
        }));
    }

    for h in handles {
        h.join().unwrap();
    }
}

fn bench_shape(c: &mut Criterion, producers: usize, consumers: usize) {
    let mut group = c.benchmark_group(format!("{}p_{}c", producers, consumers));
    group.throughput(Throughput::Elements(MESSAGES as u64));

    group.bench_function("elastic_mpmc", |b| b.iter(|| run_elastic(producers, consumers)));
    group.bench_function("crossbeam_channel", |b| {
        b.iter(|| run_crossbeam(producers, consumers))
    });
    group.bench_function("flume", |b| b.iter(|| run_flume(producers, consumers)));

    group.finish();
}

fn bench_1p_1c(c: &mut Criterion) {
    bench_shape(c, 1, 1);
}

fn bench_4p_1c(c: &mut Criterion) {
    bench_shape(c, 4, 1);
}

fn bench_1p_4c(c: &mut Criterion) {
    bench_shape(c, 1, 4);
}

fn bench_4p_4c(c: &mut Criterion) {
    bench_shape(c, 4, 4);
}

fn bench_growth(c: &mut Criterion) {
    let mut group = c.benchmark_group("growth");
    group.throughput(Throughput::Elements(BUFFER_SIZE as u64));

    // Cost of filling a queue that has to double its way up from 2 slots,
    // against one pre-sized to the full capacity.
    group.bench_function("from_2_slots", |b| {
        b.iter(|| {
            let queue = Queue::with_capacity(2, BUFFER_SIZE).unwrap();
            for i in 0..BUFFER_SIZE {
                queue.push(black_box(i)).unwrap();
            }
        });
    });
    group.bench_function("pre_sized", |b| {
        b.iter(|| {
            let queue = Queue::bounded(BUFFER_SIZE).unwrap();
            for i in 0..BUFFER_SIZE {
                queue.push(black_box(i)).unwrap();
            }
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_1p_1c,
    bench_4p_1c,
    bench_1p_4c,
    bench_4p_4c,
    bench_growth
);
criterion_main!(benches);
