//! Session bundle: one registry, minimized stack, settings store, and bubble per host app.
//!
//! [`DevToolsRuntime`] wires the stores together (icon lookup, push-aside signal) and owns the
//! operations that must touch more than one store in a fixed order.

use std::{cell::Cell, rc::Rc};

use devtools_tool_contract::{ToolDefinition, ToolMountContext};
use leptos::View;
use platform_host::{InertTaskHost, NoopPrefsStore, PrefsStore, TaskHost, WebPrefsStore};
use serde_json::Value;

use crate::{
    browser::{viewport_bounds, LeptosTaskHost},
    bubble::BubblePositionStore,
    config::DevToolsConfig,
    host::AppHost,
    listeners::SubscriptionId,
    minimized::{MinimizeRequest, MinimizedTools},
    model::{is_any_open, AppInstance, InstanceId, ScreenBounds, ToolId},
    settings::{settings_bus, DevToolsSettingsStore, SettingsBus},
};

/// Injected storage and scheduling services.
#[derive(Clone)]
pub struct DevToolsServices {
    pub prefs: Rc<dyn PrefsStore>,
    pub tasks: Rc<dyn TaskHost>,
}

impl DevToolsServices {
    pub fn new(prefs: Rc<dyn PrefsStore>, tasks: Rc<dyn TaskHost>) -> Self {
        Self { prefs, tasks }
    }

    /// `localStorage` plus leptos scheduling.
    pub fn browser() -> Self {
        Self::new(Rc::new(WebPrefsStore), Rc::new(LeptosTaskHost::default()))
    }

    /// Services that store nothing and never run deferred work.
    pub fn inert() -> Self {
        Self::new(Rc::new(NoopPrefsStore), Rc::new(InertTaskHost))
    }
}

#[derive(Clone)]
pub struct DevToolsRuntime {
    config: Rc<DevToolsConfig>,
    host: AppHost,
    minimized: MinimizedTools,
    settings: DevToolsSettingsStore,
    bubble: BubblePositionStore,
    push_aside: Rc<Cell<Option<SubscriptionId>>>,
}

impl DevToolsRuntime {
    /// Builds a runtime on the thread's shared settings bus and the current viewport.
    pub fn new(services: DevToolsServices, config: DevToolsConfig) -> Self {
        let bounds = viewport_bounds().unwrap_or_default();
        Self::with_bus(services, config, settings_bus(), bounds)
    }

    pub fn with_bus(
        services: DevToolsServices,
        config: DevToolsConfig,
        bus: SettingsBus,
        bounds: ScreenBounds,
    ) -> Self {
        let keys = config.storage_keys();
        let DevToolsServices { prefs, tasks } = services;

        let minimized = MinimizedTools::new(
            prefs.clone(),
            tasks.clone(),
            keys.clone(),
            config.minimized_debounce(),
            config.icon_layout,
        );
        let host = AppHost::new(
            prefs.clone(),
            tasks.clone(),
            keys.clone(),
            config.open_apps_debounce(),
            minimized.clone(),
        );
        let settings = DevToolsSettingsStore::new(
            prefs.clone(),
            tasks.clone(),
            keys.clone(),
            config.team_defaults.clone(),
            bus,
        );
        let bubble = BubblePositionStore::new(
            prefs,
            tasks,
            keys,
            config.bubble_debounce(),
            config.bubble,
            bounds,
        );

        // The registry owns the stack, so the lookup must not own the registry.
        let weak_host = host.downgrade();
        minimized.set_icon_lookup(move |id| weak_host.upgrade()?.tool_icon(id));

        let pusher = bubble.clone();
        let subscription = host.subscribe(move |apps| pusher.set_push_aside(is_any_open(apps)));

        Self {
            config: Rc::new(config),
            host,
            minimized,
            settings,
            bubble,
            push_aside: Rc::new(Cell::new(Some(subscription))),
        }
    }

    /// A detached runtime used when no provider is mounted.
    pub fn inert() -> Self {
        Self::with_bus(
            DevToolsServices::inert(),
            DevToolsConfig::default(),
            SettingsBus::default(),
            ScreenBounds::default(),
        )
    }

    /// Starts every store's initial load.
    pub fn start(&self) {
        self.minimized.start();
        self.host.start();
        self.settings.start();
        self.bubble.start();
    }

    pub fn config(&self) -> &DevToolsConfig {
        &self.config
    }

    pub fn host(&self) -> &AppHost {
        &self.host
    }

    pub fn minimized_tools(&self) -> &MinimizedTools {
        &self.minimized
    }

    pub fn settings(&self) -> &DevToolsSettingsStore {
        &self.settings
    }

    pub fn bubble(&self) -> &BubblePositionStore {
        &self.bubble
    }

    /// Registers definitions with the registry and the settings store.
    pub fn register_apps(&self, definitions: Vec<ToolDefinition>) {
        self.settings.set_available_tools(definitions.clone());
        self.host.register_apps(definitions);
    }

    /// Opens a registered tool by id.
    pub fn open_tool(&self, tool_id: &ToolId) -> Option<InstanceId> {
        let tool = self.host.definition(tool_id)?;
        self.host.open(tool)
    }

    /// Minimizes a panel to an icon.
    ///
    /// The registry is updated before the icon is added so push-aside observers see the panel
    /// gone before the icon mounts.
    pub fn minimize_panel(&self, instance_id: &InstanceId, modal_state: Option<Value>) -> bool {
        let Some(app) = self.host.instance(instance_id) else {
            return false;
        };
        if !self.host.minimize(instance_id) {
            return false;
        }
        self.minimized
            .minimize(MinimizeRequest::for_instance(&app, modal_state));
        true
    }

    /// Restores a minimized panel with the geometry its icon carried.
    /// Visible or unknown instances are left untouched, icon geometry included.
    pub fn restore_panel(&self, instance_id: &InstanceId) -> bool {
        if !self.host.is_minimized(instance_id) {
            return false;
        }
        let modal_state = self
            .minimized
            .restore(instance_id)
            .and_then(|entry| entry.modal_state);
        self.host.restore(instance_id, modal_state)
    }

    /// Mounts an instance's tool view, or `None` when its definition is not registered.
    pub fn mount_instance(&self, app: &AppInstance) -> Option<View> {
        let tool = self.host.definition(&app.id)?;
        Some(tool.module.mount(ToolMountContext {
            tool_id: app.id.clone(),
            instance_id: app.instance_id.clone(),
            props: tool.default_props.clone(),
            restore_state: app.restore_state.clone(),
            minimized: app.minimized,
        }))
    }

    /// Cancels pending writes and detaches the push-aside wiring.
    pub fn dispose(&self) {
        if let Some(subscription) = self.push_aside.take() {
            self.host.unsubscribe(subscription);
        }
        self.host.dispose();
        self.minimized.dispose();
        self.bubble.dispose();
    }
}
