//! Instance registry host.
//!
//! [`AppHost`] owns the [`HostState`] container. Every operation is dispatched through
//! [`reduce_host`]; the new state is committed, subscribers are notified, and the emitted
//! [`HostEffect`] values are drained in order afterwards. Effects dispatched while a drain is in
//! progress join the same queue instead of running nested.

mod effects;

use std::{
    cell::{Cell, RefCell},
    collections::VecDeque,
    rc::{Rc, Weak},
    time::Duration,
};

use devtools_tool_contract::{IconContext, IconNode, ToolDefinition};
use leptos::logging;
use platform_host::{PrefsStore, TaskHost};
use serde_json::Value;

use crate::{
    debounce::Debouncer,
    listeners::{Listeners, SubscriptionId},
    minimized::MinimizedTools,
    model::{AppInstance, HostState, InstanceId, ToolId},
    persistence::{self, StorageKeys},
    reducer::{reduce_host, HostAction, HostEffect, SNAPSHOT_ICON_SIZE},
};

struct HostInner {
    state: RefCell<HostState>,
    queue: RefCell<VecDeque<HostEffect>>,
    draining: Cell<bool>,
    listeners: Listeners<Vec<AppInstance>>,
    prefs: Rc<dyn PrefsStore>,
    tasks: Rc<dyn TaskHost>,
    keys: StorageKeys,
    writer: Debouncer,
    minimized: MinimizedTools,
}

/// Shared handle to the instance registry.
#[derive(Clone)]
pub struct AppHost {
    inner: Rc<HostInner>,
}

/// Non-owning [`AppHost`] handle for callbacks that must not keep the registry alive.
#[derive(Clone)]
pub struct WeakAppHost(Weak<HostInner>);

impl WeakAppHost {
    pub fn upgrade(&self) -> Option<AppHost> {
        self.0.upgrade().map(|inner| AppHost { inner })
    }
}

impl AppHost {
    pub fn new(
        prefs: Rc<dyn PrefsStore>,
        tasks: Rc<dyn TaskHost>,
        keys: StorageKeys,
        debounce: Duration,
        minimized: MinimizedTools,
    ) -> Self {
        let writer = Debouncer::new(tasks.clone(), debounce);
        Self {
            inner: Rc::new(HostInner {
                state: RefCell::new(HostState::default()),
                queue: RefCell::new(VecDeque::new()),
                draining: Cell::new(false),
                listeners: Listeners::default(),
                prefs,
                tasks,
                keys,
                writer,
                minimized,
            }),
        }
    }

    /// Starts loading the persisted open-instance list.
    ///
    /// A failed or malformed load completes the load phase with an empty list, so the registry
    /// still becomes usable.
    pub fn start(&self) {
        let weak = self.downgrade();
        let prefs = self.inner.prefs.clone();
        let keys = self.inner.keys.clone();
        self.inner.tasks.spawn_local(Box::pin(async move {
            let persisted = persistence::load_open_apps(prefs.as_ref(), &keys).await;
            if let Some(host) = weak.upgrade() {
                host.dispatch(HostAction::PersistedAppsLoaded(persisted));
            }
        }));
    }

    pub fn downgrade(&self) -> WeakAppHost {
        WeakAppHost(Rc::downgrade(&self.inner))
    }

    pub fn minimized_tools(&self) -> MinimizedTools {
        self.inner.minimized.clone()
    }

    pub fn register_apps(&self, definitions: Vec<ToolDefinition>) {
        self.dispatch(HostAction::RegisterApps(definitions));
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.inner.state.borrow().definitions.clone()
    }

    pub fn definition(&self, tool_id: &ToolId) -> Option<ToolDefinition> {
        self.inner.state.borrow().definition(tool_id).cloned()
    }

    /// Opens `tool`, reusing an existing singleton instance, and returns the instance id now on
    /// top of the render order.
    pub fn open(&self, tool: ToolDefinition) -> Option<InstanceId> {
        if !self.dispatch(HostAction::Open {
            tool,
            minimized: false,
        }) {
            return None;
        }
        self.inner
            .state
            .borrow()
            .apps
            .last()
            .map(|app| app.instance_id.clone())
    }

    /// Closes `instance_id`, or the most recently opened instance when `None`.
    pub fn close(&self, instance_id: Option<InstanceId>) {
        self.dispatch(HostAction::Close { instance_id });
    }

    pub fn close_all(&self) {
        self.dispatch(HostAction::CloseAll);
    }

    pub fn minimize(&self, instance_id: &InstanceId) -> bool {
        self.dispatch(HostAction::Minimize {
            instance_id: instance_id.clone(),
        })
    }

    pub fn restore(&self, instance_id: &InstanceId, restore_state: Option<Value>) -> bool {
        self.dispatch(HostAction::Restore {
            instance_id: instance_id.clone(),
            restore_state,
        })
    }

    pub fn is_minimized(&self, instance_id: &InstanceId) -> bool {
        self.inner.state.borrow().is_minimized(instance_id)
    }

    pub fn is_any_open(&self) -> bool {
        self.inner.state.borrow().is_any_open()
    }

    pub fn is_restored(&self) -> bool {
        self.inner.state.borrow().restore.restored
    }

    pub fn open_apps(&self) -> Vec<AppInstance> {
        self.inner.state.borrow().apps.clone()
    }

    pub fn instance(&self, instance_id: &InstanceId) -> Option<AppInstance> {
        self.inner.state.borrow().instance(instance_id).cloned()
    }

    /// Icon lookup used to rebuild minimized icons from stored entries.
    pub fn tool_icon(&self, tool_id: &ToolId) -> Option<IconNode> {
        self.inner
            .state
            .borrow()
            .definition(tool_id)
            .and_then(|def| def.resolve_icon(&IconContext::minimized(SNAPSHOT_ICON_SIZE)))
    }

    pub fn subscribe(&self, listener: impl Fn(&Vec<AppInstance>) + 'static) -> SubscriptionId {
        self.inner.listeners.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.listeners.unsubscribe(id)
    }

    /// Cancels the pending debounced write.
    pub fn dispose(&self) {
        self.inner.writer.cancel();
    }

    /// Runs one action through the reducer. Returns `false` when the reducer rejected it.
    fn dispatch(&self, action: HostAction) -> bool {
        let (result, changed) = {
            let mut state = self.inner.state.borrow_mut();
            let previous = state.apps.clone();
            let result = reduce_host(&mut state, action);
            let changed = state.apps != previous;
            (result, changed)
        };

        match result {
            Ok(effects) => {
                self.inner.queue.borrow_mut().extend(effects);
                if changed {
                    self.inner.listeners.emit(&self.open_apps());
                }
                self.drain_effects();
                true
            }
            Err(err) => {
                logging::warn!("devtools host action rejected: {err}");
                false
            }
        }
    }

    fn drain_effects(&self) {
        if self.inner.draining.replace(true) {
            return;
        }
        loop {
            let next = self.inner.queue.borrow_mut().pop_front();
            let Some(effect) = next else {
                break;
            };
            effects::run_host_effect(self, effect);
        }
        self.inner.draining.set(false);
    }

    fn schedule_persist(&self) {
        let weak = self.downgrade();
        self.inner.writer.schedule(move || {
            let Some(host) = weak.upgrade() else {
                return;
            };
            let snapshot = host.inner.state.borrow().persisted_open_apps();
            let prefs = host.inner.prefs.clone();
            let keys = host.inner.keys.clone();
            host.inner.tasks.spawn_local(Box::pin(async move {
                if let Err(err) =
                    persistence::save_open_apps(prefs.as_ref(), &keys, &snapshot).await
                {
                    logging::warn!("persist open apps failed: {err}");
                }
            }));
        });
    }
}
