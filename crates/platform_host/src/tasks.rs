//! Task and timer host contracts for deferred work.
//!
//! Stores never call a platform timer or executor directly. They receive a [`TaskHost`] and use
//! it to spawn storage futures and to arm cancellable timeouts, so the same store code runs in
//! the browser, in a headless host, and under a virtual clock in tests.

use std::{cell::RefCell, collections::BTreeMap, rc::Rc, time::Duration};

use futures::{
    executor::{LocalPool, LocalSpawner},
    future::LocalBoxFuture,
    task::LocalSpawnExt,
};

/// Boxed single-threaded future accepted by [`TaskHost::spawn_local`].
pub type TaskFuture = LocalBoxFuture<'static, ()>;

/// Handle for a timeout armed through [`TaskHost::set_timeout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(pub u64);

/// Single-threaded executor and timer service.
pub trait TaskHost {
    /// Runs `task` to completion on the host's local executor.
    fn spawn_local(&self, task: TaskFuture);

    /// Arms a timeout that invokes `callback` once after `delay`.
    fn set_timeout(&self, delay: Duration, callback: Box<dyn FnOnce()>) -> TimerId;

    /// Cancels a pending timeout. Unknown or already-fired ids are ignored.
    fn clear_timeout(&self, timer: TimerId);
}

#[derive(Debug, Clone, Copy, Default)]
/// Task host that drops every task and never fires a timer.
pub struct InertTaskHost;

impl TaskHost for InertTaskHost {
    fn spawn_local(&self, _task: TaskFuture) {}

    fn set_timeout(&self, _delay: Duration, _callback: Box<dyn FnOnce()>) -> TimerId {
        TimerId(0)
    }

    fn clear_timeout(&self, _timer: TimerId) {}
}

#[derive(Default)]
struct ManualClock {
    now: Duration,
    next_timer_id: u64,
    timers: BTreeMap<(Duration, TimerId), Box<dyn FnOnce()>>,
}

/// Task host driven by an explicit virtual clock.
///
/// Spawned futures run only from [`ManualTaskHost::run_until_stalled`] or
/// [`ManualTaskHost::advance`]; timers fire only when `advance` moves the clock past their
/// deadline. Neither method may be called from inside a task or timer callback.
#[derive(Clone)]
pub struct ManualTaskHost {
    clock: Rc<RefCell<ManualClock>>,
    pool: Rc<RefCell<LocalPool>>,
    spawner: LocalSpawner,
}

impl Default for ManualTaskHost {
    fn default() -> Self {
        let pool = LocalPool::new();
        let spawner = pool.spawner();
        Self {
            clock: Rc::new(RefCell::new(ManualClock::default())),
            pool: Rc::new(RefCell::new(pool)),
            spawner,
        }
    }
}

impl ManualTaskHost {
    /// Creates a host with the virtual clock at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current virtual time.
    pub fn now(&self) -> Duration {
        self.clock.borrow().now
    }

    /// Returns the number of armed timers that have not fired or been cleared.
    pub fn pending_timers(&self) -> usize {
        self.clock.borrow().timers.len()
    }

    /// Polls spawned futures until none can make progress.
    pub fn run_until_stalled(&self) {
        self.pool.borrow_mut().run_until_stalled();
    }

    /// Moves the clock forward by `delta`, firing due timers in deadline order.
    ///
    /// Spawned work is drained after each timer so futures started by a callback complete before
    /// the next deadline is considered.
    pub fn advance(&self, delta: Duration) {
        let target = self.clock.borrow().now + delta;
        self.run_until_stalled();
        loop {
            let due = {
                let mut clock = self.clock.borrow_mut();
                let next_key = clock
                    .timers
                    .keys()
                    .next()
                    .copied()
                    .filter(|(deadline, _)| *deadline <= target);
                match next_key {
                    Some(key) => {
                        clock.now = key.0;
                        clock.timers.remove(&key)
                    }
                    None => None,
                }
            };
            let Some(callback) = due else {
                break;
            };
            callback();
            self.run_until_stalled();
        }
        self.clock.borrow_mut().now = target;
        self.run_until_stalled();
    }
}

impl TaskHost for ManualTaskHost {
    fn spawn_local(&self, task: TaskFuture) {
        // Spawning only fails once the pool is gone, at which point the work has no observer.
        let _ = self.spawner.spawn_local(task);
    }

    fn set_timeout(&self, delay: Duration, callback: Box<dyn FnOnce()>) -> TimerId {
        let mut clock = self.clock.borrow_mut();
        clock.next_timer_id += 1;
        let id = TimerId(clock.next_timer_id);
        let deadline = clock.now + delay;
        clock.timers.insert((deadline, id), callback);
        id
    }

    fn clear_timeout(&self, timer: TimerId) {
        self.clock
            .borrow_mut()
            .timers
            .retain(|(_, id), _| *id != timer);
    }
}
