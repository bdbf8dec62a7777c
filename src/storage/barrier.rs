//! Reader/compactor barrier
//!
//! Readers share access to segment files; the compactor needs exclusive
//! access while it deletes and renames them. Admission rule:
//! - once an exclusive request is pending, no new reader is admitted
//! - the exclusive holder proceeds only when the reader count drains to zero
//!
//! Both sides block on a condition variable instead of spinning.

use parking_lot::{Condvar, Mutex};

#[derive(Debug, Default)]
struct BarrierState {
    /// In-flight readers
    readers: usize,
    /// Exclusive requests waiting for readers to drain
    pending_exclusive: usize,
    /// An exclusive section is running
    exclusive: bool,
}

/// Multi-reader / single-exclusive barrier over the segment files
#[derive(Debug, Default)]
pub struct SegmentBarrier {
    state: Mutex<BarrierState>,
    cond: Condvar,
}

impl SegmentBarrier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter as a reader, waiting while an exclusive section is pending or
    /// running
    pub fn read(&self) -> ReadGuard<'_> {
        let mut state = self.state.lock();
        while state.exclusive || state.pending_exclusive > 0 {
            self.cond.wait(&mut state);
        }
        state.readers += 1;
        ReadGuard { barrier: self }
    }

    /// Enter exclusively, waiting for every in-flight reader to leave
    pub fn exclusive(&self) -> ExclusiveGuard<'_> {
        let mut state = self.state.lock();
        state.pending_exclusive += 1;
        while state.exclusive || state.readers > 0 {
            self.cond.wait(&mut state);
        }
        state.pending_exclusive -= 1;
        state.exclusive = true;
        ExclusiveGuard { barrier: self }
    }

    pub fn active_readers(&self) -> usize {
        self.state.lock().readers
    }

    pub fn pending_exclusive(&self) -> usize {
        self.state.lock().pending_exclusive
    }

    pub fn is_exclusive(&self) -> bool {
        self.state.lock().exclusive
    }

    fn release_read(&self) {
        let mut state = self.state.lock();
        state.readers -= 1;
        if state.readers == 0 {
            self.cond.notify_all();
        }
    }

    fn release_exclusive(&self) {
        let mut state = self.state.lock();
        state.exclusive = false;
        self.cond.notify_all();
    }
}

/// Shared access; released on drop
#[must_use = "the barrier is released as soon as the guard is dropped"]
pub struct ReadGuard<'a> {
    barrier: &'a SegmentBarrier,
}

impl Drop for ReadGuard<'_> {
    fn drop(&mut self) {
        self.barrier.release_read();
    }
}

/// Exclusive access; released on drop
#[must_use = "the barrier is released as soon as the guard is dropped"]
pub struct ExclusiveGuard<'a> {
    barrier: &'a SegmentBarrier,
}

impl Drop for ExclusiveGuard<'_> {
    fn drop(&mut self) {
        self.barrier.release_exclusive();
    }
}
