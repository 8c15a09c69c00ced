//! Growable bounded MPMC queue.
//!
//! Steady-state push and pop are lock-free: each claims a position with a CAS
//! on the monotonic head or tail counter and a CAS on the per-slot state
//! word. The only lock in the structure is a reader/writer lock on the
//! backing buffer, held shared by every push/pop and exclusively only while
//! the buffer is being grown.

use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_utils::{Backoff, CachePadded};
use parking_lot::RwLock;
use tracing::debug;

use crate::errors::{CreateError, PopError, PushError};
use crate::handle::Handle;
use crate::slot::{Slot, SlotState};

struct Buffer<T> {
    slots: Box<[Slot<T>]>,
}

/// Puts a claimed slot back to `Occupied` on drop. Forgotten once the popper
/// commits to taking the value, so an unwinding predicate leaves the item
/// poppable instead of wedging the slot in `Popping`.
struct SlotRestore<'a, T> {
    slot: &'a Slot<T>,
}

impl<T> Drop for SlotRestore<'_, T> {
    fn drop(&mut self) {
        self.slot.force(SlotState::Occupied);
    }
}

impl<T> Buffer<T> {
    fn vacant(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, Slot::vacant);
        Buffer {
            slots: slots.into_boxed_slice(),
        }
    }
}

/// The queue payload owned by a [`Handle`].
pub(crate) struct RawQueue<T> {
    /// Next position a pusher will claim. Monotonic, never wrapped;
    /// `head % capacity` is the physical slot index.
    head: CachePadded<AtomicU64>,
    /// Next position a popper will claim. `tail <= head` always, and
    /// `head - tail` is the number of logically occupied positions.
    tail: CachePadded<AtomicU64>,
    /// Backing buffer. Push/pop hold the lock shared; only growth takes it
    /// exclusively, so the lock guards the buffer's identity, not the slots.
    buffer: RwLock<Buffer<T>>,
    max_capacity: usize,
}

unsafe impl<T: Send> Send for RawQueue<T> {}
unsafe impl<T: Send> Sync for RawQueue<T> {}

impl<T> RawQueue<T> {
    fn with_capacity(initial: usize, max: usize) -> Result<Self, CreateError> {
        if initial == 0 {
            return Err(CreateError::ZeroCapacity);
        }
        if initial > max {
            return Err(CreateError::InitialExceedsMax { initial, max });
        }
        debug!(initial, max, "creating queue");
        Ok(RawQueue {
            head: CachePadded::new(AtomicU64::new(0)),
            tail: CachePadded::new(AtomicU64::new(0)),
            buffer: RwLock::new(Buffer::vacant(initial)),
            max_capacity: max,
        })
    }

    fn push(&self, value: T) -> Result<(), PushError<T>> {
        let backoff = Backoff::new();
        loop {
            let buf = self.buffer.read();
            let cap = buf.slots.len() as u64;
            let head = self.head.load(Ordering::Acquire);
            let tail = self.tail.load(Ordering::Acquire);

            // `tail` may race ahead of the `head` we read; saturating keeps
            // that torn snapshot on the not-full side.
            if head.saturating_sub(tail) >= cap {
                if cap as usize >= self.max_capacity {
                    return Err(PushError::Full(value));
                }
                drop(buf);
                self.grow();
                continue;
            }

            let slot = &buf.slots[(head % cap) as usize];
            if !slot.transition(SlotState::Vacant, SlotState::Pushing) {
                // Another pusher is mid-write on this position, or our head
                // snapshot is stale.
                backoff.snooze();
                continue;
            }
            if self
                .head
                .compare_exchange(head, head + 1, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                // Lost the race for this position; hand the slot back.
                slot.force(SlotState::Vacant);
                backoff.snooze();
                continue;
            }

            // SAFETY: we hold the slot in Pushing, nobody else touches the
            // value and it is uninitialized.
            unsafe { slot.write(value) };
            slot.force(SlotState::Occupied);
            return Ok(());
        }
    }

    fn pop_if<F>(&self, mut accept: F) -> Result<T, PopError>
    where
        F: FnMut(&T) -> bool,
    {
        let backoff = Backoff::new();
        loop {
            let buf = self.buffer.read();
            let cap = buf.slots.len() as u64;
            let head = self.head.load(Ordering::Acquire);
            let tail = self.tail.load(Ordering::Acquire);

            if tail >= head {
                return Err(PopError::Empty);
            }

            let slot = &buf.slots[(tail % cap) as usize];
            if !slot.transition(SlotState::Occupied, SlotState::Popping) {
                // The value is still being written, or another popper beat
                // us to it.
                backoff.snooze();
                continue;
            }

            let restore = SlotRestore { slot };

            // SAFETY: we hold the slot in Popping, the value is initialized.
            if !accept(unsafe { slot.peek() }) {
                // Dropping the guard leaves the item in place for a future
                // pop.
                drop(restore);
                return Err(PopError::Rejected);
            }

            if self
                .tail
                .compare_exchange(tail, tail + 1, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                drop(restore);
                backoff.snooze();
                continue;
            }

            std::mem::forget(restore);
            // SAFETY: we hold the slot in Popping and advanced tail past it.
            let value = unsafe { slot.read() };
            slot.force(SlotState::Vacant);
            return Ok(value);
        }
    }

    /// Double the capacity, capped at `max_capacity`, relocating the live
    /// window into the new buffer.
    fn grow(&self) {
        let mut buf = self.buffer.write();
        let old_cap = buf.slots.len() as u64;
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);

        // Somebody else may have grown the buffer or drained an item while
        // we waited for the exclusive lock.
        if head.saturating_sub(tail) < old_cap || old_cap as usize >= self.max_capacity {
            return;
        }

        let new_cap = (old_cap as usize * 2).min(self.max_capacity);
        let new = Buffer::vacant(new_cap);

        // Holding the lock exclusively means no push or pop is mid-flight,
        // so every live position is Occupied. Each one moves to its home
        // index under the new capacity; the counters themselves do not
        // change, which keeps them monotonic.
        for pos in tail..head {
            let src = &buf.slots[(pos % old_cap) as usize];
            let dst = &new.slots[(pos % new_cap as u64) as usize];
            debug_assert!(src.is(SlotState::Occupied));
            // SAFETY: exclusive buffer access; src is initialized, dst is
            // vacant and uninitialized. src's buffer is discarded below
            // without dropping values.
            unsafe { dst.write(src.read()) };
            dst.force(SlotState::Occupied);
        }

        buf.slots = new.slots;
        debug!(old = old_cap, new = new_cap, "grew queue buffer");
    }

    fn len(&self) -> usize {
        // A pop can move tail between the two counter reads; retry until a
        // pair of tail reads agree so the snapshot is not torn.
        loop {
            let tail = self.tail.load(Ordering::Acquire);
            let head = self.head.load(Ordering::Acquire);
            if self.tail.load(Ordering::Acquire) == tail {
                return head.saturating_sub(tail) as usize;
            }
        }
    }

    fn capacity(&self) -> usize {
        self.buffer.read().slots.len()
    }
}

impl<T> Drop for RawQueue<T> {
    fn drop(&mut self) {
        // Runs when the last handle is released: no other reference exists,
        // so the counters are quiescent and every live position is Occupied.
        let buf = self.buffer.get_mut();
        let cap = buf.slots.len() as u64;
        let head = *self.head.get_mut();
        let tail = *self.tail.get_mut();
        for pos in tail..head {
            let slot = &mut buf.slots[(pos % cap) as usize];
            debug_assert!(slot.is(SlotState::Occupied));
            // SAFETY: the value at a live position is initialized and will
            // not be touched again.
            unsafe { slot.drop_in_place() };
        }
    }
}

/// A growable bounded MPMC queue.
///
/// The queue starts at an initial capacity and doubles (capped at a fixed
/// maximum) when a push finds it full. Push and pop never block waiting for
/// space or data: a full queue at maximum capacity reports
/// [`PushError::Full`], an empty queue reports [`PopError::Empty`], and
/// callers retry at their own pace.
///
/// Cloning a `Queue` is cheap: clones share the same underlying storage
/// through an atomically reference-counted [`Handle`]. When the last clone
/// is dropped, any items still queued are dropped exactly once.
///
/// # Examples
///
/// ```
/// use elastic_mpmc::Queue;
///
/// let queue = Queue::with_capacity(2, 8)?;
/// queue.push(1).unwrap();
/// queue.push(2).unwrap();
/// queue.push(3).unwrap(); // grows to capacity 4
/// assert_eq!(queue.len(), 3);
/// assert_eq!(queue.pop().unwrap(), 1);
/// # Ok::<(), elastic_mpmc::CreateError>(())
/// ```
pub struct Queue<T> {
    inner: Handle<RawQueue<T>>,
}

impl<T> Queue<T> {
    /// Create a queue that starts with `initial` slots and may grow up to
    /// `max` slots.
    ///
    /// Capacities need not be powers of two. Errors when `initial` is zero
    /// or exceeds `max`.
    pub fn with_capacity(initial: usize, max: usize) -> Result<Self, CreateError> {
        Ok(Queue {
            inner: Handle::new(RawQueue::with_capacity(initial, max)?),
        })
    }

    /// Create a fixed-capacity queue that never grows.
    pub fn bounded(capacity: usize) -> Result<Self, CreateError> {
        Self::with_capacity(capacity, capacity)
    }

    /// Push a value onto the tail of the queue.
    ///
    /// Grows the buffer if the queue is full but below its maximum capacity.
    /// At maximum capacity the value is handed back in
    /// [`PushError::Full`].
    pub fn push(&self, value: T) -> Result<(), PushError<T>> {
        self.inner.push(value)
    }

    /// Pop the value at the head of the queue.
    pub fn pop(&self) -> Result<T, PopError> {
        self.inner.pop_if(|_| true)
    }

    /// Pop the value at the head of the queue if `accept` approves it.
    ///
    /// The predicate sees the head item by reference. If it returns `false`
    /// the item stays at the head of the queue, available to any future pop,
    /// and [`PopError::Rejected`] is returned.
    ///
    /// The predicate runs while this thread participates in the resize lock,
    /// so it must not push to or pop from the same queue.
    ///
    /// ```
    /// use elastic_mpmc::{PopError, Queue};
    ///
    /// let queue = Queue::bounded(4)?;
    /// queue.push(10).unwrap();
    /// assert_eq!(queue.pop_if(|n| *n > 100), Err(PopError::Rejected));
    /// assert_eq!(queue.pop(), Ok(10));
    /// # Ok::<(), elastic_mpmc::CreateError>(())
    /// ```
    pub fn pop_if<F>(&self, accept: F) -> Result<T, PopError>
    where
        F: FnMut(&T) -> bool,
    {
        self.inner.pop_if(accept)
    }

    /// Best-effort number of items in the queue.
    ///
    /// Exact when no other thread is mutating the queue; otherwise a
    /// consistent point-in-time snapshot that may be stale by the time it is
    /// observed.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether the queue currently holds no items. Same caveats as
    /// [`Queue::len`].
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current capacity of the backing buffer.
    pub fn capacity(&self) -> usize {
        self.inner.capacity()
    }

    /// Upper bound the buffer may grow to, fixed at creation.
    pub fn max_capacity(&self) -> usize {
        self.inner.max_capacity
    }

    /// Number of live clones sharing this queue's storage.
    pub fn handle_count(this: &Self) -> usize {
        Handle::strong_count(&this.inner)
    }

    /// Whether two queues share the same underlying storage.
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        Handle::ptr_eq(&this.inner, &other.inner)
    }
}

impl<T> Clone for Queue<T> {
    fn clone(&self) -> Self {
        Queue {
            inner: self.inner.clone(),
        }
    }
}

impl<T> std::fmt::Debug for Queue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Queue")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .field("max_capacity", &self.max_capacity())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn smoke() {
        let q = Queue::bounded(8).unwrap();
        q.push(42).unwrap();
        assert_eq!(q.pop(), Ok(42));
        assert_eq!(q.pop(), Err(PopError::Empty));
    }

    #[test]
    fn create_rejects_bad_capacities() {
        assert_eq!(
            Queue::<u32>::with_capacity(0, 4).unwrap_err(),
            CreateError::ZeroCapacity
        );
        assert_eq!(
            Queue::<u32>::with_capacity(8, 4).unwrap_err(),
            CreateError::InitialExceedsMax { initial: 8, max: 4 }
        );
    }

    #[test]
    fn grows_until_max() {
        let q = Queue::with_capacity(2, 8).unwrap();
        for i in 0..8 {
            q.push(i).unwrap();
        }
        assert_eq!(q.capacity(), 8);
        assert_eq!(q.push(99), Err(PushError::Full(99)));
        for i in 0..8 {
            assert_eq!(q.pop(), Ok(i));
        }
    }

    #[test]
    fn clones_share_storage() {
        let a = Queue::bounded(4).unwrap();
        let b = a.clone();
        assert!(Queue::ptr_eq(&a, &b));
        assert_eq!(Queue::handle_count(&a), 2);
        a.push(7).unwrap();
        assert_eq!(b.pop(), Ok(7));
    }
}
