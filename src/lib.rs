//! elastic-mpmc - growable bounded MPMC queue with a per-slot atomic state
//! machine.
//!
//! The queue starts small and doubles its backing buffer (up to a fixed
//! maximum) when a push finds it full. Steady-state push/pop are lock-free;
//! only the rare growth transition takes an exclusive lock. Storage is owned
//! by an atomically reference-counted [`Handle`], so clones of a [`Queue`]
//! share the same buffer and any items still queued when the last clone is
//! dropped are dropped exactly once.
//!
//! ```
//! use elastic_mpmc::Queue;
//! use std::thread;
//!
//! let queue = Queue::with_capacity(4, 64)?;
//!
//! let producer = {
//!     let queue = queue.clone();
//!     thread::spawn(move || {
//!         for i in 0..32 {
//!             let mut item = i;
//!             while let Err(e) = queue.push(item) {
//!                 item = e.into_inner();
//!                 std::hint::spin_loop();
//!             }
//!         }
//!     })
//! };
//!
//! let mut received = 0;
//! while received < 32 {
//!     if queue.pop().is_ok() {
//!         received += 1;
//!     }
//! }
//! producer.join().unwrap();
//! # Ok::<(), elastic_mpmc::CreateError>(())
//! ```
#![warn(missing_docs)]

mod errors;
mod handle;
mod queue;
mod slot;

pub use errors::{CreateError, PopError, PushError};
pub use handle::Handle;
pub use queue::Queue;
