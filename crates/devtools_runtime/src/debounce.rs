//! Last-write-wins debounced scheduling on top of a [`TaskHost`] timer.

use std::{cell::Cell, rc::Rc, time::Duration};

use platform_host::{TaskHost, TimerId};

/// Runs the most recently scheduled job once `delay` passes without another `schedule` call.
///
/// Scheduling cancels any pending job. Dropping the debouncer cancels the pending job too, which
/// is how store teardown stops late writes.
pub struct Debouncer {
    tasks: Rc<dyn TaskHost>,
    delay: Duration,
    pending: Rc<Cell<Option<TimerId>>>,
}

impl Debouncer {
    pub fn new(tasks: Rc<dyn TaskHost>, delay: Duration) -> Self {
        Self {
            tasks,
            delay,
            pending: Rc::new(Cell::new(None)),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn schedule(&self, job: impl FnOnce() + 'static) {
        self.cancel();
        let pending = self.pending.clone();
        let timer = self.tasks.set_timeout(
            self.delay,
            Box::new(move || {
                pending.set(None);
                job();
            }),
        );
        self.pending.set(Some(timer));
    }

    pub fn cancel(&self) {
        if let Some(timer) = self.pending.take() {
            self.tasks.clear_timeout(timer);
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.get().is_some()
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
