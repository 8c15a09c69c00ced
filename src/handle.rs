//! Atomically reference-counted container that owns the queue's memory.

use std::fmt;
use std::marker::PhantomData;
use std::ops::Deref;
use std::process::abort;
use std::ptr::NonNull;
use std::sync::atomic::{fence, AtomicUsize, Ordering};

struct HandleInner<T> {
    refs: AtomicUsize,
    value: T,
}

/// A thin atomically reference-counted pointer with a single strong count.
///
/// `Handle<T>` is the sole owner of its payload: all clones share read access
/// to the same allocation, never a copy. When the last clone is dropped the
/// payload's `Drop` runs exactly once and the allocation is freed exactly
/// once, from whichever thread happened to release last.
///
/// Unlike [`std::sync::Arc`] there is no weak count; the header is one
/// machine word. Transfer-without-count-change ("move") and reassignment are
/// plain Rust moves and assignments, typically of an `Option<Handle<T>>`
/// where `None` plays the role of an empty handle:
///
/// ```
/// use elastic_mpmc::Handle;
///
/// let a = Handle::new(5u64);
/// let mut dst = Some(a.clone());    // acquire into dst
/// let moved = dst.take();           // move out, dst is now empty
/// assert!(dst.is_none());
/// assert_eq!(Handle::strong_count(moved.as_ref().unwrap()), 2);
/// # drop(moved); drop(a);
/// ```
pub struct Handle<T> {
    ptr: NonNull<HandleInner<T>>,
    _marker: PhantomData<HandleInner<T>>,
}

unsafe impl<T: Send + Sync> Send for Handle<T> {}
unsafe impl<T: Send + Sync> Sync for Handle<T> {}

impl<T> Handle<T> {
    /// Allocate a new container around `value` with a count of one.
    pub fn new(value: T) -> Self {
        let inner = Box::new(HandleInner {
            refs: AtomicUsize::new(1),
            value,
        });
        Handle {
            ptr: NonNull::from(Box::leak(inner)),
            _marker: PhantomData,
        }
    }

    /// Number of live clones of this handle.
    ///
    /// Loaded with `Relaxed` ordering; only suitable for diagnostics and
    /// tests, not for synchronization decisions.
    pub fn strong_count(this: &Self) -> usize {
        this.inner().refs.load(Ordering::Relaxed)
    }

    /// Whether two handles share the same allocation.
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        std::ptr::eq(this.ptr.as_ptr(), other.ptr.as_ptr())
    }

    #[inline]
    fn inner(&self) -> &HandleInner<T> {
        // SAFETY: the allocation stays live while any clone exists, and we
        // hold one.
        unsafe { self.ptr.as_ref() }
    }
}

impl<T> Deref for Handle<T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        &self.inner().value
    }
}

impl<T> Clone for Handle<T> {
    #[inline]
    fn clone(&self) -> Self {
        let old = self.inner().refs.fetch_add(1, Ordering::Relaxed);
        // A count this high can only come from mem::forget abuse; refusing to
        // wrap keeps the count sound.
        if old > isize::MAX as usize {
            abort();
        }
        Handle {
            ptr: self.ptr,
            _marker: PhantomData,
        }
    }
}

impl<T> Drop for Handle<T> {
    #[inline]
    fn drop(&mut self) {
        if self.inner().refs.fetch_sub(1, Ordering::Release) == 1 {
            // Synchronize with every other release before tearing down.
            fence(Ordering::Acquire);
            // SAFETY: count hit zero, we are the last clone and nobody can
            // observe the allocation again.
            unsafe { drop(Box::from_raw(self.ptr.as_ptr())) };
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Handle").field(&**self).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    struct DropProbe<'a>(&'a AtomicUsize);

    impl Drop for DropProbe<'_> {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn clone_tracks_count() {
        let a = Handle::new(1u32);
        assert_eq!(Handle::strong_count(&a), 1);
        let b = a.clone();
        assert_eq!(Handle::strong_count(&a), 2);
        assert!(Handle::ptr_eq(&a, &b));
        drop(b);
        assert_eq!(Handle::strong_count(&a), 1);
    }

    #[test]
    fn payload_drops_exactly_once() {
        static DROPS: AtomicUsize = AtomicUsize::new(0);
        let a = Handle::new(DropProbe(&DROPS));
        let b = a.clone();
        let c = b.clone();
        drop(a);
        drop(c);
        assert_eq!(DROPS.load(Ordering::Relaxed), 0);
        drop(b);
        assert_eq!(DROPS.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn reassignment_releases_the_previous_value() {
        static DROPS: AtomicUsize = AtomicUsize::new(0);
        let first = Handle::new(DropProbe(&DROPS));
        let second = Handle::new(DropProbe(&DROPS));

        let mut dst = Some(first);
        assert!(dst.is_some());
        dst = Some(second.clone());
        assert_eq!(DROPS.load(Ordering::Relaxed), 1);

        // Move: the source ends up empty and the count is untouched.
        let moved = dst.take();
        assert!(dst.is_none());
        assert_eq!(Handle::strong_count(moved.as_ref().unwrap()), 2);

        drop(moved);
        drop(second);
        assert_eq!(DROPS.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn concurrent_release_is_safe() {
        static DROPS: AtomicUsize = AtomicUsize::new(0);
        let handle = Handle::new(DropProbe(&DROPS));
        let clones: Vec<_> = (0..8).map(|_| handle.clone()).collect();
        drop(handle);

        let threads: Vec<_> = clones
            .into_iter()
            .map(|h| thread::spawn(move || drop(h)))
            .collect();
        for t in threads {
            t.join().unwrap();
        }
        assert_eq!(DROPS.load(Ordering::Relaxed), 1);
    }
}
