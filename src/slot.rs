//! One element position in the queue's backing buffer.

use core::cell::UnsafeCell;
use core::mem::MaybeUninit;
use core::sync::atomic::{AtomicUsize, Ordering};

/// Occupancy state of a slot. The only legal cycle is
/// `Vacant -> Pushing -> Occupied -> Popping -> Vacant`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub(crate) enum SlotState {
    /// No value stored; a pusher may claim the slot.
    Vacant = 0,
    /// A pusher owns the slot and is writing the value.
    Pushing = 1,
    /// The value is initialized and visible to poppers.
    Occupied = 2,
    /// A popper owns the slot and is reading the value out.
    Popping = 3,
}

/// A slot pairs one atomic state word with storage for one value.
///
/// The value is initialized exactly while the state is `Occupied`. A thread
/// may only touch the value after winning the CAS that moves the slot into
/// `Pushing` or `Popping`.
///
/// Cache-line aligned so neighboring slots' state words do not false-share.
#[repr(align(64))]
pub(crate) struct Slot<T> {
    state: AtomicUsize,
    value: UnsafeCell<MaybeUninit<T>>,
}

impl<T> Slot<T> {
    pub(crate) fn vacant() -> Self {
        Slot {
            state: AtomicUsize::new(SlotState::Vacant as usize),
            value: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }

    /// Attempt the `from -> to` transition. Returns whether it happened.
    #[inline]
    pub(crate) fn transition(&self, from: SlotState, to: SlotState) -> bool {
        self.state
            .compare_exchange(from as usize, to as usize, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Unconditionally store a new state. Used to publish `Occupied` after a
    /// write, to hand a slot back after a lost race, and by the exclusive
    /// owner during growth and teardown.
    #[inline]
    pub(crate) fn force(&self, to: SlotState) {
        self.state.store(to as usize, Ordering::Release);
    }

    #[inline]
    pub(crate) fn is(&self, state: SlotState) -> bool {
        self.state.load(Ordering::Acquire) == state as usize
    }

    /// Write the value into the slot.
    ///
    /// # Safety
    ///
    /// The caller must have exclusive write access to the slot (it holds the
    /// slot in `Pushing`, or owns the buffer exclusively) and the slot must
    /// not currently hold an initialized value.
    #[inline]
    pub(crate) unsafe fn write(&self, value: T) {
        unsafe { (*self.value.get()).write(value) };
    }

    /// Move the value out of the slot.
    ///
    /// # Safety
    ///
    /// The caller must have exclusive access to the slot (it holds the slot
    /// in `Popping`, or owns the buffer exclusively) and the value must be
    /// initialized. The slot must be treated as uninitialized afterwards.
    #[inline]
    pub(crate) unsafe fn read(&self) -> T {
        unsafe { (*self.value.get()).assume_init_read() }
    }

    /// Borrow the value in place.
    ///
    /// # Safety
    ///
    /// Same access requirements as [`Slot::read`]; the value stays
    /// initialized.
    #[inline]
    pub(crate) unsafe fn peek(&self) -> &T {
        unsafe { (*self.value.get()).assume_init_ref() }
    }

    /// Drop the value in place. Used by the owning teardown walk.
    ///
    /// # Safety
    ///
    /// The value must be initialized. The slot must be treated as
    /// uninitialized afterwards.
    #[inline]
    pub(crate) unsafe fn drop_in_place(&mut self) {
        unsafe { (*self.value.get()).assume_init_drop() };
    }
}

unsafe impl<T: Send> Send for Slot<T> {}
unsafe impl<T: Send> Sync for Slot<T> {}
