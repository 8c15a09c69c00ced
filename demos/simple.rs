//! Simple usage example

use elastic_mpmc::Queue;
use std::thread;

fn main() {
    println!("elastic-mpmc - Simple Example\n");

    // Start with 4 slots, allow growth up to 16.
    let queue = Queue::with_capacity(4, 16).unwrap();

    let producer_queue = queue.clone();
    let producer = thread::spawn(move || {
        for i in 0..10 {
            let message = format!("Message {}", i);
            println!("Sending: {}", message);

            let mut item = message;
            while let Err(e) = producer_queue.push(item) {
                // Queue is full at max capacity, spin and retry
                item = e.into_inner();
                std::hint::spin_loop();
            }

            // Small delay to make output readable
            thread::sleep(std::time::Duration::from_millis(100));
        }
        println!("Producer finished!");
    });

    let consumer_queue = queue.clone();
    let consumer = thread::spawn(move || {
        for _ in 0..10 {
            loop {
                match consumer_queue.pop() {
                    Ok(message) => {
                        println!("Received: {}", message);
                        break;
                    }
                    Err(_) => {
                        // Queue is empty, spin and retry
                        std::hint::spin_loop();
                    }
                }
            }
        }
        println!("Consumer finished!");
    });

    producer.join().unwrap();
    consumer.join().unwrap();

    println!("\nExample completed successfully!");
}
