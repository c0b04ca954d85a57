//! Browser-side host adapters: the leptos task host and viewport measurement.

use std::{
    cell::{Cell, RefCell},
    collections::HashMap,
    rc::Rc,
    time::Duration,
};

use leptos::{leptos_dom::helpers::TimeoutHandle, logging};
use platform_host::{TaskFuture, TaskHost, TimerId};

use crate::model::ScreenBounds;

/// [`TaskHost`] backed by `leptos::spawn_local` and browser timeouts.
#[derive(Clone, Default)]
pub struct LeptosTaskHost {
    next_id: Rc<Cell<u64>>,
    timers: Rc<RefCell<HashMap<TimerId, TimeoutHandle>>>,
}

impl TaskHost for LeptosTaskHost {
    fn spawn_local(&self, task: TaskFuture) {
        leptos::spawn_local(task);
    }

    fn set_timeout(&self, delay: Duration, callback: Box<dyn FnOnce()>) -> TimerId {
        let id = TimerId(self.next_id.get() + 1);
        self.next_id.set(id.0);
        let timers = self.timers.clone();
        let armed = leptos::set_timeout_with_handle(
            move || {
                timers.borrow_mut().remove(&id);
                callback();
            },
            delay,
        );
        match armed {
            Ok(handle) => {
                self.timers.borrow_mut().insert(id, handle);
            }
            Err(err) => logging::warn!("devtools timer could not be armed: {err:?}"),
        }
        id
    }

    fn clear_timeout(&self, timer: TimerId) {
        if let Some(handle) = self.timers.borrow_mut().remove(&timer) {
            handle.clear();
        }
    }
}

/// Current browser viewport size, or `None` outside a browser window.
#[cfg(target_arch = "wasm32")]
pub fn viewport_bounds() -> Option<ScreenBounds> {
    let window = web_sys::window()?;
    let width = window.inner_width().ok()?.as_f64()?;
    let height = window.inner_height().ok()?.as_f64()?;
    Some(ScreenBounds::new(width, height))
}

#[cfg(not(target_arch = "wasm32"))]
pub fn viewport_bounds() -> Option<ScreenBounds> {
    None
}
