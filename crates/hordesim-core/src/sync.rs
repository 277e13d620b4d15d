//! A fair lock with owner-verified release.
//!
//! The simulation's actor state is shared between a physics tick, a planner
//! tick, and render snapshots. `std::sync::Mutex` makes no fairness promise,
//! and the loop contract here needs three things it does not give: strict
//! arrival-order granting (a 40 Hz ticker must not starve a 10 Hz one),
//! timed acquisition for the physics tick's half-frame budget, and release
//! verification so a lock given up by the wrong thread is caught as a
//! corrupted invariant instead of silently reordering the world.

use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct LockState {
    owner: Option<ThreadId>,
    waiters: VecDeque<ThreadId>,
}

impl LockState {
    fn my_turn(&self, me: ThreadId) -> bool {
        self.owner.is_none() && self.waiters.front() == Some(&me)
    }
}

/// FIFO-fair lock around a value.
///
/// Waiters are granted the lock in arrival order. Acquiring a lock the
/// current thread already holds is a programming fault and panics rather
/// than deadlocking; dropping the guard verifies the releasing thread still
/// owns the lock.
#[derive(Debug)]
pub struct FairLock<T> {
    state: Mutex<LockState>,
    turnstile: Condvar,
    value: Mutex<T>,
}

impl<T> FairLock<T> {
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            state: Mutex::new(LockState::default()),
            turnstile: Condvar::new(),
            value: Mutex::new(value),
        }
    }

    /// Acquires the lock, blocking until every earlier arrival has held and
    /// released it.
    pub fn lock(&self) -> FairGuard<'_, T> {
        let me = thread::current().id();
        let mut state = self.state_lock();
        assert!(
            state.owner != Some(me),
            "fair lock acquired twice by the same thread"
        );
        state.waiters.push_back(me);
        while !state.my_turn(me) {
            state = self
                .turnstile
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        state.waiters.pop_front();
        state.owner = Some(me);
        drop(state);
        self.guard()
    }

    /// Acquires the lock unless the wait exceeds `timeout`.
    pub fn lock_timeout(&self, timeout: Duration) -> Option<FairGuard<'_, T>> {
        let me = thread::current().id();
        let deadline = Instant::now() + timeout;
        let mut state = self.state_lock();
        assert!(
            state.owner != Some(me),
            "fair lock acquired twice by the same thread"
        );
        state.waiters.push_back(me);
        while !state.my_turn(me) {
            let Some(remaining) = deadline.checked_duration_since(Instant::now()) else {
                Self::abandon(&mut state, me);
                drop(state);
                // Dropping a queue slot can unblock the waiter behind it.
                self.turnstile.notify_all();
                return None;
            };
            let (next, result) = self
                .turnstile
                .wait_timeout(state, remaining)
                .unwrap_or_else(PoisonError::into_inner);
            state = next;
            if result.timed_out() && !state.my_turn(me) {
                Self::abandon(&mut state, me);
                drop(state);
                self.turnstile.notify_all();
                return None;
            }
        }
        state.waiters.pop_front();
        state.owner = Some(me);
        drop(state);
        Some(self.guard())
    }

    /// Number of threads currently queued for the lock.
    #[must_use]
    pub fn waiters(&self) -> usize {
        self.state_lock().waiters.len()
    }

    /// Whether the calling thread holds the lock.
    #[must_use]
    pub fn is_held_by_current_thread(&self) -> bool {
        self.state_lock().owner == Some(thread::current().id())
    }

    fn state_lock(&self) -> MutexGuard<'_, LockState> {
        // The bookkeeping state stays coherent across a panicking holder;
        // recover it so the release path can still run its ownership check.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn abandon(state: &mut LockState, me: ThreadId) {
        state.waiters.retain(|id| *id != me);
    }

    fn guard(&self) -> FairGuard<'_, T> {
        // The inner mutex is only ever locked by the fairness winner, so
        // this acquisition never contends.
        let value = self
            .value
            .lock()
            .unwrap_or_else(|_| panic!("actor state poisoned by a panicking holder"));
        FairGuard {
            lock: self,
            value: Some(value),
        }
    }

    fn release(&self) {
        let me = thread::current().id();
        let mut state = self.state_lock();
        assert!(
            state.owner == Some(me),
            "fair lock released by a thread that does not own it"
        );
        state.owner = None;
        drop(state);
        self.turnstile.notify_all();
    }
}

/// Guard over a [`FairLock`]'s value; releases on drop with an ownership
/// check.
#[derive(Debug)]
pub struct FairGuard<'a, T> {
    lock: &'a FairLock<T>,
    value: Option<MutexGuard<'a, T>>,
}

impl<T> Deref for FairGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.value.as_ref().expect("guard value present")
    }
}

impl<T> DerefMut for FairGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.value.as_mut().expect("guard value present")
    }
}

impl<T> Drop for FairGuard<'_, T> {
    fn drop(&mut self) {
        // Hand the value back before surrendering ownership.
        drop(self.value.take());
        self.lock.release();
    }
}
