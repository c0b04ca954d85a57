//! Minimized-tool icon stack.
//!
//! [`MinimizedStack`] is the pure list logic; [`MinimizedTools`] wraps it with storage, debounced
//! persistence, change fan-out, and icon reconstruction on load. The stack is a projection of the
//! instance registry: an instance is either a visible panel or an icon here, never both.

use std::{
    cell::{Cell, RefCell},
    rc::Rc,
    time::Duration,
};

use devtools_tool_contract::IconNode;
use leptos::logging;
use platform_host::{unix_time_ms_now, PrefsStore, TaskHost};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    debounce::Debouncer,
    listeners::{Listeners, SubscriptionId},
    model::{AppInstance, InstanceId, Point, ScreenBounds, ToolId},
    persistence::{self, StorageKeys},
};

/// Fixed-pitch layout of minimized icons, stacked upward from the bottom-right corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IconLayout {
    pub icon_size: f64,
    pub spacing: f64,
    pub margin_right: f64,
    pub margin_bottom: f64,
}

impl Default for IconLayout {
    fn default() -> Self {
        Self {
            icon_size: 48.0,
            spacing: 12.0,
            margin_right: 16.0,
            margin_bottom: 120.0,
        }
    }
}

/// Top-left corner of the icon in stack slot `index`.
pub fn icon_position(index: usize, bounds: &ScreenBounds, layout: &IconLayout) -> Point {
    let pitch = layout.icon_size + layout.spacing;
    Point {
        x: bounds.max_x() - layout.margin_right - layout.icon_size,
        y: bounds.max_y() - layout.margin_bottom - layout.icon_size - index as f64 * pitch,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MinimizedTool {
    pub instance_id: InstanceId,
    pub id: ToolId,
    pub title: String,
    /// Reconstructed on load; `None` still reserves a slot.
    pub icon: Option<IconNode>,
    pub color: Option<String>,
    pub minimized_at: u64,
    pub modal_state: Option<Value>,
}

impl MinimizedTool {
    fn from_instance(app: &AppInstance, now_ms: u64) -> Self {
        Self {
            instance_id: app.instance_id.clone(),
            id: app.id.clone(),
            title: app.title.clone(),
            icon: app.icon.clone(),
            color: app.color.clone(),
            minimized_at: now_ms,
            modal_state: app.restore_state.clone(),
        }
    }

    fn persisted(&self) -> PersistedMinimizedTool {
        PersistedMinimizedTool {
            instance_id: self.instance_id.clone(),
            id: self.id.clone(),
            title: self.title.clone(),
            color: self.color.clone(),
            minimized_at: self.minimized_at,
            modal_state: self.modal_state.clone(),
        }
    }
}

/// Stored form of a [`MinimizedTool`]; the icon is not serializable and is rebuilt on load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedMinimizedTool {
    pub instance_id: InstanceId,
    pub id: ToolId,
    pub title: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub minimized_at: u64,
    #[serde(default)]
    pub modal_state: Option<Value>,
}

impl PersistedMinimizedTool {
    pub fn rehydrate(self, icon: Option<IconNode>) -> MinimizedTool {
        MinimizedTool {
            instance_id: self.instance_id,
            id: self.id,
            title: self.title,
            icon,
            color: self.color,
            minimized_at: self.minimized_at,
            modal_state: self.modal_state,
        }
    }
}

/// Input to [`MinimizedTools::minimize`].
#[derive(Debug, Clone, PartialEq)]
pub struct MinimizeRequest {
    pub instance_id: InstanceId,
    pub id: ToolId,
    pub title: String,
    pub icon: Option<IconNode>,
    pub color: Option<String>,
    pub modal_state: Option<Value>,
}

impl MinimizeRequest {
    /// Builds a request from a registry instance's open-time snapshot.
    pub fn for_instance(app: &AppInstance, modal_state: Option<Value>) -> Self {
        Self {
            instance_id: app.instance_id.clone(),
            id: app.id.clone(),
            title: app.title.clone(),
            icon: app.icon.clone(),
            color: app.color.clone(),
            modal_state,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MinimizedStack {
    tools: Vec<MinimizedTool>,
}

impl MinimizedStack {
    pub fn tools(&self) -> &[MinimizedTool] {
        &self.tools
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Adds an icon, replacing in place any entry for the same tool id.
    pub fn minimize(&mut self, request: MinimizeRequest, now_ms: u64) -> MinimizedTool {
        let entry = MinimizedTool {
            instance_id: request.instance_id,
            id: request.id,
            title: request.title,
            icon: request.icon,
            color: request.color,
            minimized_at: now_ms,
            modal_state: request.modal_state,
        };
        match self.tools.iter_mut().find(|tool| tool.id == entry.id) {
            Some(existing) => *existing = entry.clone(),
            None => self.tools.push(entry.clone()),
        }
        entry
    }

    pub fn restore(&mut self, instance_id: &InstanceId) -> Option<MinimizedTool> {
        let index = self.index_of(instance_id)?;
        Some(self.tools.remove(index))
    }

    pub fn is_minimized(&self, tool_id: &ToolId) -> bool {
        self.tools.iter().any(|tool| &tool.id == tool_id)
    }

    pub fn get(&self, instance_id: &InstanceId) -> Option<&MinimizedTool> {
        self.tools
            .iter()
            .find(|tool| &tool.instance_id == instance_id)
    }

    pub fn index_of(&self, instance_id: &InstanceId) -> Option<usize> {
        self.tools
            .iter()
            .position(|tool| &tool.instance_id == instance_id)
    }

    /// Returns `true` when anything was removed.
    pub fn clear(&mut self) -> bool {
        let changed = !self.tools.is_empty();
        self.tools.clear();
        changed
    }

    pub fn persisted(&self) -> Vec<PersistedMinimizedTool> {
        self.tools.iter().map(MinimizedTool::persisted).collect()
    }

    /// Appends stored entries for tool ids not already present; in-memory entries win.
    pub fn merge_loaded(
        &mut self,
        loaded: Vec<PersistedMinimizedTool>,
        icon_lookup: &dyn Fn(&ToolId) -> Option<IconNode>,
    ) -> bool {
        let mut changed = false;
        for stored in loaded {
            if self.is_minimized(&stored.id) {
                continue;
            }
            let icon = icon_lookup(&stored.id);
            self.tools.push(stored.rehydrate(icon));
            changed = true;
        }
        changed
    }

    /// Reconciles entries with the registry's minimized instances.
    ///
    /// Entries keep their slot when their instance id matches, or adopt the id of an unclaimed
    /// instance of the same tool (fresh ids after a restart). A matched entry without an icon
    /// takes the instance's snapshot. Unmatched entries are dropped, and instances left without an
    /// entry get one built from their open-time snapshot.
    pub fn relink(&mut self, instances: &[AppInstance], now_ms: u64) -> bool {
        let before = self.tools.clone();
        let mut claimed = vec![false; instances.len()];

        let mut assignment: Vec<Option<usize>> = self
            .tools
            .iter()
            .map(|tool| {
                let index = instances
                    .iter()
                    .position(|app| app.instance_id == tool.instance_id)?;
                claimed[index] = true;
                Some(index)
            })
            .collect();

        for (tool, slot) in self.tools.iter().zip(assignment.iter_mut()) {
            if slot.is_some() {
                continue;
            }
            if let Some(index) =
                (0..instances.len()).find(|&i| !claimed[i] && instances[i].id == tool.id)
            {
                claimed[index] = true;
                *slot = Some(index);
            }
        }

        let previous = std::mem::take(&mut self.tools);
        for (mut tool, slot) in previous.into_iter().zip(assignment) {
            if let Some(index) = slot {
                let app = &instances[index];
                tool.instance_id = app.instance_id.clone();
                // Entries loaded before registration have no icon yet.
                if tool.icon.is_none() {
                    tool.icon = app.icon.clone();
                }
                self.tools.push(tool);
            }
        }
        for (index, app) in instances.iter().enumerate() {
            if !claimed[index] {
                self.tools.push(MinimizedTool::from_instance(app, now_ms));
            }
        }

        self.tools != before
    }
}

/// Resolves a tool's icon for reconstructed minimized entries.
pub type IconLookup = Rc<dyn Fn(&ToolId) -> Option<IconNode>>;

struct MinimizedInner {
    stack: RefCell<MinimizedStack>,
    loaded: Cell<bool>,
    pending_relink: RefCell<Option<Vec<AppInstance>>>,
    prefs: Rc<dyn PrefsStore>,
    tasks: Rc<dyn TaskHost>,
    keys: StorageKeys,
    writer: Debouncer,
    layout: IconLayout,
    icon_lookup: RefCell<IconLookup>,
    listeners: Listeners<Vec<MinimizedTool>>,
}

/// Shared handle to the minimized-tool stack store.
#[derive(Clone)]
pub struct MinimizedTools {
    inner: Rc<MinimizedInner>,
}

impl MinimizedTools {
    pub fn new(
        prefs: Rc<dyn PrefsStore>,
        tasks: Rc<dyn TaskHost>,
        keys: StorageKeys,
        debounce: Duration,
        layout: IconLayout,
    ) -> Self {
        let writer = Debouncer::new(tasks.clone(), debounce);
        Self {
            inner: Rc::new(MinimizedInner {
                stack: RefCell::new(MinimizedStack::default()),
                loaded: Cell::new(false),
                pending_relink: RefCell::new(None),
                prefs,
                tasks,
                keys,
                writer,
                layout,
                icon_lookup: RefCell::new(Rc::new(|_| None)),
                listeners: Listeners::default(),
            }),
        }
    }

    /// Installs the external icon lookup used when rebuilding stored entries.
    pub fn set_icon_lookup(&self, lookup: impl Fn(&ToolId) -> Option<IconNode> + 'static) {
        *self.inner.icon_lookup.borrow_mut() = Rc::new(lookup);
    }

    /// Starts the asynchronous load of persisted entries.
    pub fn start(&self) {
        let weak = Rc::downgrade(&self.inner);
        let prefs = self.inner.prefs.clone();
        let keys = self.inner.keys.clone();
        self.inner.tasks.spawn_local(Box::pin(async move {
            let stored = persistence::load_minimized_tools(prefs.as_ref(), &keys).await;
            if let Some(inner) = weak.upgrade() {
                MinimizedTools { inner }.apply_loaded(stored);
            }
        }));
    }

    pub fn is_loaded(&self) -> bool {
        self.inner.loaded.get()
    }

    pub fn tools(&self) -> Vec<MinimizedTool> {
        self.inner.stack.borrow().tools().to_vec()
    }

    pub fn count(&self) -> usize {
        self.inner.stack.borrow().len()
    }

    pub fn layout(&self) -> IconLayout {
        self.inner.layout
    }

    pub fn minimize(&self, request: MinimizeRequest) -> MinimizedTool {
        let entry = self
            .inner
            .stack
            .borrow_mut()
            .minimize(request, unix_time_ms_now());
        self.commit(true);
        entry
    }

    pub fn restore(&self, instance_id: &InstanceId) -> Option<MinimizedTool> {
        let restored = self.inner.stack.borrow_mut().restore(instance_id);
        self.commit(restored.is_some());
        restored
    }

    pub fn is_minimized(&self, tool_id: &ToolId) -> bool {
        self.inner.stack.borrow().is_minimized(tool_id)
    }

    pub fn get_minimized_tool(&self, instance_id: &InstanceId) -> Option<MinimizedTool> {
        self.inner.stack.borrow().get(instance_id).cloned()
    }

    pub fn clear_all(&self) {
        let changed = self.inner.stack.borrow_mut().clear();
        self.commit(changed);
    }

    /// Where the next minimized icon will land.
    pub fn next_icon_position(&self, bounds: &ScreenBounds) -> Point {
        icon_position(self.count(), bounds, &self.inner.layout)
    }

    pub fn tool_icon_position(
        &self,
        instance_id: &InstanceId,
        bounds: &ScreenBounds,
    ) -> Option<Point> {
        let index = self.inner.stack.borrow().index_of(instance_id)?;
        Some(icon_position(index, bounds, &self.inner.layout))
    }

    /// Reconciles with the registry's minimized instances, deferring until the load completes.
    pub fn relink(&self, instances: Vec<AppInstance>) {
        if !self.is_loaded() {
            *self.inner.pending_relink.borrow_mut() = Some(instances);
            return;
        }
        let changed = self
            .inner
            .stack
            .borrow_mut()
            .relink(&instances, unix_time_ms_now());
        self.commit(changed);
    }

    pub fn subscribe(&self, listener: impl Fn(&Vec<MinimizedTool>) + 'static) -> SubscriptionId {
        self.inner.listeners.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.listeners.unsubscribe(id)
    }

    /// Cancels any pending debounced write.
    pub fn dispose(&self) {
        self.inner.writer.cancel();
    }

    fn apply_loaded(&self, stored: Vec<PersistedMinimizedTool>) {
        if self.inner.loaded.replace(true) {
            return;
        }
        let lookup = self.inner.icon_lookup.borrow().clone();
        let pending_relink = self.inner.pending_relink.borrow_mut().take();
        let relinking = pending_relink.is_some();
        let changed = {
            let mut stack = self.inner.stack.borrow_mut();
            let had_local = !stack.is_empty();
            let mut changed = stack.merge_loaded(stored, lookup.as_ref());
            if let Some(instances) = pending_relink {
                changed |= stack.relink(&instances, unix_time_ms_now());
            }
            changed || had_local
        };
        if changed {
            self.inner.listeners.emit(&self.tools());
        }
        if changed || relinking {
            self.schedule_persist();
        }
    }

    fn commit(&self, changed: bool) {
        if !changed {
            return;
        }
        self.inner.listeners.emit(&self.tools());
        // Writing before the load completes would clobber the previous session's entries.
        if self.is_loaded() {
            self.schedule_persist();
        }
    }

    fn schedule_persist(&self) {
        let weak = Rc::downgrade(&self.inner);
        self.inner.writer.schedule(move || {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let snapshot = inner.stack.borrow().persisted();
            let prefs = inner.prefs.clone();
            let keys = inner.keys.clone();
            inner.tasks.spawn_local(Box::pin(async move {
                if let Err(err) =
                    persistence::save_minimized_tools(prefs.as_ref(), &keys, &snapshot).await
                {
                    logging::warn!("persist minimized tools failed: {err}");
                }
            }));
        });
    }
}
