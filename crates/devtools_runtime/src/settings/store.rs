//! Settings store and the process-wide settings change bus.

use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

use devtools_tool_contract::ToolDefinition;
use leptos::logging;
use platform_host::{PrefsStore, TaskHost};

use super::{
    default_settings, enforce_dial_limit, merge_settings, replay_changes, DevToolsSettings,
    ToggleOutcome,
};
use crate::{
    config::TeamDefaults,
    listeners::{Listeners, SubscriptionId},
    model::ToolId,
    persistence::{self, StorageKeys},
};

/// Multi-subscriber channel carrying every committed [`DevToolsSettings`].
#[derive(Clone, Default)]
pub struct SettingsBus {
    listeners: Rc<Listeners<DevToolsSettings>>,
}

impl SettingsBus {
    pub fn subscribe(&self, listener: impl Fn(&DevToolsSettings) + 'static) -> SubscriptionId {
        self.listeners.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.listeners.unsubscribe(id)
    }

    pub fn publish(&self, settings: &DevToolsSettings) {
        self.listeners.emit(settings);
    }

    pub fn subscriber_count(&self) -> usize {
        self.listeners.len()
    }
}

thread_local! {
    static SETTINGS_BUS: SettingsBus = SettingsBus::default();
}

/// The bus shared by every settings store on this thread unless one is injected.
pub fn settings_bus() -> SettingsBus {
    SETTINGS_BUS.with(SettingsBus::clone)
}

struct SettingsInner {
    settings: RefCell<DevToolsSettings>,
    definitions: RefCell<Vec<ToolDefinition>>,
    /// Last stored or committed settings, re-merged whenever the definitions change.
    overrides: RefCell<Option<DevToolsSettings>>,
    loaded: Cell<bool>,
    /// Value before the first commit made ahead of the initial load.
    pre_load_base: RefCell<Option<DevToolsSettings>>,
    team: TeamDefaults,
    prefs: Rc<dyn PrefsStore>,
    tasks: Rc<dyn TaskHost>,
    keys: StorageKeys,
    bus: SettingsBus,
}

/// Shared handle to the launcher settings.
///
/// Every commit enforces the dial cap, publishes on the bus synchronously, then writes to storage
/// in the background. Save failures are logged and the in-memory value stays authoritative.
#[derive(Clone)]
pub struct DevToolsSettingsStore {
    inner: Rc<SettingsInner>,
}

impl DevToolsSettingsStore {
    pub fn new(
        prefs: Rc<dyn PrefsStore>,
        tasks: Rc<dyn TaskHost>,
        keys: StorageKeys,
        team: TeamDefaults,
        bus: SettingsBus,
    ) -> Self {
        let settings = default_settings(&[], &team);
        Self {
            inner: Rc::new(SettingsInner {
                settings: RefCell::new(settings),
                definitions: RefCell::new(Vec::new()),
                overrides: RefCell::new(None),
                loaded: Cell::new(false),
                pre_load_base: RefCell::new(None),
                team,
                prefs,
                tasks,
                keys,
                bus,
            }),
        }
    }

    /// Spawns the initial [`Self::load_settings`].
    pub fn start(&self) {
        let store = self.clone();
        self.inner.tasks.spawn_local(Box::pin(async move {
            store.load_settings().await;
        }));
    }

    pub fn settings(&self) -> DevToolsSettings {
        self.inner.settings.borrow().clone()
    }

    pub fn is_loaded(&self) -> bool {
        self.inner.loaded.get()
    }

    pub fn bus(&self) -> SettingsBus {
        self.inner.bus.clone()
    }

    /// Reads storage and merges it over the defaults.
    ///
    /// Missing, unreadable, or malformed blobs leave the defaults in place. Changes committed
    /// before the first load finished are replayed over the stored blob and written back.
    pub async fn load_settings(&self) -> DevToolsSettings {
        let stored = persistence::load_settings(self.inner.prefs.as_ref(), &self.inner.keys).await;
        let first_load = !self.inner.loaded.replace(true);
        let pre_load_base = if first_load {
            self.inner.pre_load_base.borrow_mut().take()
        } else {
            None
        };

        match pre_load_base {
            Some(base) => {
                let local = self.settings();
                let defaults =
                    default_settings(&self.inner.definitions.borrow(), &self.inner.team);
                let mut next = match &stored {
                    Some(stored) => merge_settings(&defaults, stored),
                    None => defaults,
                };
                replay_changes(&base, &local, &mut next);
                self.save_settings(next);
            }
            None => {
                if let Some(stored) = stored {
                    *self.inner.overrides.borrow_mut() = Some(stored);
                }
                self.recompute_and_publish();
            }
        }
        self.settings()
    }

    /// Re-reads storage, picking up writes made by another store instance.
    pub async fn refresh_settings(&self) -> DevToolsSettings {
        self.load_settings().await
    }

    /// Re-merges against a new definition list without writing to storage.
    pub fn set_available_tools(&self, definitions: Vec<ToolDefinition>) {
        *self.inner.definitions.borrow_mut() = definitions;
        self.recompute_and_publish();
    }

    pub fn toggle_dial_tool(&self, id: &ToolId) -> ToggleOutcome {
        self.update(|settings| settings.toggle_dial_tool(id))
    }

    pub fn toggle_floating_tool(&self, id: &ToolId) -> ToggleOutcome {
        self.update(|settings| settings.toggle_floating_tool(id))
    }

    /// Flips a global boolean setting and returns its new value.
    pub fn toggle_global_setting(&self, key: &str) -> bool {
        let mut next = self.settings();
        let value = next.global_settings.toggle(key);
        self.save_settings(next);
        value
    }

    /// Commits `settings` after re-applying the dial cap.
    pub fn save_settings(&self, mut settings: DevToolsSettings) {
        enforce_dial_limit(&mut settings.dial_tools);
        if !self.inner.loaded.get() && self.inner.pre_load_base.borrow().is_none() {
            *self.inner.pre_load_base.borrow_mut() = Some(self.settings());
        }
        *self.inner.settings.borrow_mut() = settings.clone();
        *self.inner.overrides.borrow_mut() = Some(settings.clone());
        self.inner.bus.publish(&settings);
        if self.inner.loaded.get() {
            self.spawn_save(settings);
        }
    }

    /// Replaces the settings with freshly computed defaults and saves them.
    pub fn reset_settings(&self) {
        let defaults = default_settings(&self.inner.definitions.borrow(), &self.inner.team);
        self.save_settings(defaults);
    }

    pub fn enabled_dial_tools(&self) -> Vec<ToolId> {
        self.inner
            .settings
            .borrow()
            .dial_tools
            .enabled()
            .cloned()
            .collect()
    }

    pub fn enabled_floating_tools(&self) -> Vec<ToolId> {
        self.inner
            .settings
            .borrow()
            .floating_tools
            .tools
            .enabled()
            .cloned()
            .collect()
    }

    pub fn is_dial_full(&self) -> bool {
        self.inner.settings.borrow().is_dial_full()
    }

    pub fn subscribe(&self, listener: impl Fn(&DevToolsSettings) + 'static) -> SubscriptionId {
        self.inner.bus.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.bus.unsubscribe(id)
    }

    fn update(&self, apply: impl FnOnce(&mut DevToolsSettings) -> ToggleOutcome) -> ToggleOutcome {
        let mut next = self.settings();
        let outcome = apply(&mut next);
        if matches!(outcome, ToggleOutcome::Enabled | ToggleOutcome::Disabled) {
            self.save_settings(next);
        }
        outcome
    }

    fn recompute_and_publish(&self) {
        let defaults = default_settings(&self.inner.definitions.borrow(), &self.inner.team);
        let next = match self.inner.overrides.borrow().as_ref() {
            Some(stored) => merge_settings(&defaults, stored),
            None => defaults,
        };
        let changed = *self.inner.settings.borrow() != next;
        if changed {
            *self.inner.settings.borrow_mut() = next.clone();
            self.inner.bus.publish(&next);
        }
    }

    fn spawn_save(&self, settings: DevToolsSettings) {
        let prefs = self.inner.prefs.clone();
        let keys = self.inner.keys.clone();
        self.inner.tasks.spawn_local(Box::pin(async move {
            if let Err(err) = persistence::save_settings(prefs.as_ref(), &keys, &settings).await {
                logging::warn!("save devtools settings failed: {err}");
            }
        }));
    }
}
