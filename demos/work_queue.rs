//! Work-queue example: jobs fan out to workers, only urgent jobs are taken
//! during the first phase via `pop_if`.

use elastic_mpmc::Queue;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Debug)]
struct Job {
    id: usize,
    urgent: bool,
}

fn main() {
    println!("Work Queue Example\n");

    const NUM_WORKERS: usize = 3;
    const NUM_JOBS: usize = 12;

    // Small initial buffer; the queue grows as producers outpace workers.
    let jobs = Queue::with_capacity(4, 128).unwrap();
    let results = Queue::bounded(128).unwrap();
    let taken = Arc::new(AtomicUsize::new(0));

    let jobs_tx = jobs.clone();
    let producer = thread::spawn(move || {
        for id in 0..NUM_JOBS {
            let mut job = Job {
                id,
                urgent: id % 3 == 0,
            };
            while let Err(e) = jobs_tx.push(job) {
                job = e.into_inner();
                std::hint::spin_loop();
            }
            println!("enqueued job {:02} (urgent: {})", id, id % 3 == 0);
            thread::sleep(Duration::from_millis(20));
        }
        println!("all jobs enqueued, buffer grew to {}", jobs_tx.capacity());
    });

    let mut workers = vec![];
    for worker_id in 0..NUM_WORKERS {
        let jobs_rx = jobs.clone();
        let results_tx = results.clone();
        let taken = taken.clone();

        workers.push(thread::spawn(move || {
            let mut processed = 0;
            let mut urgent_phase = true;
            while taken.load(Ordering::Relaxed) < NUM_JOBS {
                // First drain urgent jobs; once none are left at the head,
                // fall back to taking anything.
                let popped = if urgent_phase {
                    jobs_rx.pop_if(|job| job.urgent)
                } else {
                    jobs_rx.pop()
                };

                match popped {
                    Ok(job) => {
                        taken.fetch_add(1, Ordering::Relaxed);
                        println!("worker {} processing job {:02}", worker_id, job.id);
                        thread::sleep(Duration::from_millis(50));

                        let mut result = format!("job {:02} done by worker {}", job.id, worker_id);
                        while let Err(e) = results_tx.push(result) {
                            result = e.into_inner();
                            std::hint::spin_loop();
                        }
                        processed += 1;
                    }
                    Err(_) => {
                        urgent_phase = false;
                        thread::sleep(Duration::from_millis(5));
                    }
                }
            }
            println!("worker {} finished ({} jobs)", worker_id, processed);
        }));
    }

    let results_rx = results.clone();
    let collector = thread::spawn(move || {
        let mut collected = 0;
        while collected < NUM_JOBS {
            match results_rx.pop() {
                Ok(result) => {
                    println!("result: {}", result);
                    collected += 1;
                }
                Err(_) => {
                    std::hint::spin_loop();
                }
            }
        }
        println!("all results collected");
    });

    producer.join().unwrap();
    for worker in workers {
        worker.join().unwrap();
    }
    collector.join().unwrap();

    println!("\nwork queue example completed");
}
