//! Synchronization primitives.
//!
//! The only primitive owned by this crate is the rendezvous semaphore used
//! to order a child's exit before its parent's wait. Mutual exclusion uses
//! `spin::Mutex` directly.

use core::sync::atomic::{AtomicUsize, Ordering};

/// Counting semaphore used as a binary rendezvous between exit and wait.
///
/// `signal` is non-blocking; `wait` spins until a unit is available. The
/// release/acquire pair on `value` establishes the happens-before edge from
/// the exiting child's state updates to the waiting parent's reads.
pub struct Semaphore {
    value: AtomicUsize,
}

impl Semaphore {
    pub const fn new(initial: usize) -> Self {
        Self {
            value: AtomicUsize::new(initial),
        }
    }

    /// Decrement, blocking until a unit is available.
    pub fn wait(&self) {
        loop {
            if self.try_wait() {
                return;
            }
            core::hint::spin_loop();
        }
    }

    /// Non-blocking decrement. Returns false if no unit was available.
    pub fn try_wait(&self) -> bool {
        let current = self.value.load(Ordering::Acquire);
        if current == 0 {
            return false;
        }
        self.value
            .compare_exchange_weak(current, current - 1, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    /// Increment and release one waiter.
    pub fn signal(&self) {
        self.value.fetch_add(1, Ordering::Release);
    }

    /// Current value, for diagnostics only.
    pub fn value(&self) -> usize {
        self.value.load(Ordering::SeqCst)
    }
}
