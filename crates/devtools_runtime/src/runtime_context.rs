//! Leptos provider and context hooks for the devtools runtime.
//!
//! The provider builds one [`DevToolsRuntime`] per mounted tree and mirrors every store into
//! signals. Hooks are safe outside the provider: they fall back to constant empty signals or a
//! detached inert runtime instead of panicking.

use leptos::*;

use devtools_tool_contract::ToolDefinition;

use crate::{
    bubble::BubbleState,
    config::DevToolsConfig,
    listeners::SubscriptionId,
    minimized::MinimizedTool,
    model::{is_any_open, AppInstance},
    runtime::{DevToolsRuntime, DevToolsServices},
    settings::DevToolsSettings,
};

#[derive(Clone, Copy)]
/// Reactive view of a [`DevToolsRuntime`] shared through leptos context.
pub struct DevToolsContext {
    /// The runtime owning every store.
    pub runtime: StoredValue<DevToolsRuntime>,
    /// Instance list in render order.
    pub open_apps: RwSignal<Vec<AppInstance>>,
    /// Whether any panel is visible.
    pub is_any_open: Signal<bool>,
    pub minimized_tools: RwSignal<Vec<MinimizedTool>>,
    pub minimized_count: Signal<usize>,
    pub settings: RwSignal<DevToolsSettings>,
    pub bubble: RwSignal<BubbleState>,
    subscriptions: StoredValue<Vec<StoreSubscription>>,
}

#[derive(Clone, Copy)]
enum StoreSubscription {
    Host(SubscriptionId),
    Minimized(SubscriptionId),
    Settings(SubscriptionId),
    Bubble(SubscriptionId),
}

impl DevToolsContext {
    /// Mirrors `runtime` into fresh signals owned by the current reactive owner.
    pub fn bind(runtime: DevToolsRuntime) -> Self {
        let open_apps = create_rw_signal(runtime.host().open_apps());
        let minimized_tools = create_rw_signal(runtime.minimized_tools().tools());
        let settings = create_rw_signal(runtime.settings().settings());
        let bubble = create_rw_signal(runtime.bubble().state());

        let subscriptions = vec![
            StoreSubscription::Host(
                runtime
                    .host()
                    .subscribe(move |apps| open_apps.set(apps.clone())),
            ),
            StoreSubscription::Minimized(
                runtime
                    .minimized_tools()
                    .subscribe(move |tools| minimized_tools.set(tools.clone())),
            ),
            StoreSubscription::Settings(
                runtime
                    .settings()
                    .subscribe(move |next| settings.set(next.clone())),
            ),
            StoreSubscription::Bubble(
                runtime
                    .bubble()
                    .subscribe(move |next| bubble.set(next.clone())),
            ),
        ];

        Self {
            runtime: store_value(runtime),
            open_apps,
            is_any_open: Signal::derive(move || open_apps.with(|apps| is_any_open(apps))),
            minimized_tools,
            minimized_count: Signal::derive(move || minimized_tools.with(Vec::len)),
            settings,
            bubble,
            subscriptions: store_value(subscriptions),
        }
    }

    pub fn runtime(&self) -> DevToolsRuntime {
        self.runtime.get_value()
    }

    /// Detaches the signal mirrors and disposes the runtime.
    pub fn unbind(&self) {
        let runtime = self.runtime.get_value();
        for subscription in self.subscriptions.get_value() {
            match subscription {
                StoreSubscription::Host(id) => runtime.host().unsubscribe(id),
                StoreSubscription::Minimized(id) => runtime.minimized_tools().unsubscribe(id),
                StoreSubscription::Settings(id) => runtime.settings().unsubscribe(id),
                StoreSubscription::Bubble(id) => runtime.bubble().unsubscribe(id),
            };
        }
        self.subscriptions.set_value(Vec::new());
        runtime.dispose();
    }
}

#[component]
/// Provides [`DevToolsContext`] to descendants and starts the persisted-session loads.
pub fn DevToolsProvider(
    /// Storage and scheduling services; browser services when omitted.
    #[prop(optional)]
    services: Option<DevToolsServices>,
    /// Runtime configuration; defaults when omitted.
    #[prop(optional)]
    config: Option<DevToolsConfig>,
    /// Tool definitions registered immediately after start.
    #[prop(optional)]
    tools: Option<Vec<ToolDefinition>>,
    children: Children,
) -> impl IntoView {
    let runtime = DevToolsRuntime::new(
        services.unwrap_or_else(DevToolsServices::browser),
        config.unwrap_or_default(),
    );
    let context = DevToolsContext::bind(runtime.clone());
    provide_context(context);

    runtime.start();
    if let Some(tools) = tools {
        runtime.register_apps(tools);
    }

    on_cleanup(move || context.unbind());

    children().into_view()
}

/// Returns the provided [`DevToolsContext`], or `None` outside [`DevToolsProvider`].
pub fn use_dev_tools() -> Option<DevToolsContext> {
    use_context::<DevToolsContext>()
}

/// Returns the provided runtime, or a detached inert runtime outside the provider.
pub fn use_dev_tools_runtime() -> DevToolsRuntime {
    use_dev_tools()
        .map(|context| context.runtime())
        .unwrap_or_else(DevToolsRuntime::inert)
}

pub fn use_open_apps() -> Signal<Vec<AppInstance>> {
    use_dev_tools()
        .map(|context| context.open_apps.into())
        .unwrap_or_else(|| Signal::derive(Vec::new))
}

pub fn use_is_any_open() -> Signal<bool> {
    use_dev_tools()
        .map(|context| context.is_any_open)
        .unwrap_or_else(|| Signal::derive(|| false))
}

pub fn use_minimized_tools() -> Signal<Vec<MinimizedTool>> {
    use_dev_tools()
        .map(|context| context.minimized_tools.into())
        .unwrap_or_else(|| Signal::derive(Vec::new))
}

pub fn use_minimized_count() -> Signal<usize> {
    use_dev_tools()
        .map(|context| context.minimized_count)
        .unwrap_or_else(|| Signal::derive(|| 0))
}

pub fn use_devtools_settings() -> Signal<DevToolsSettings> {
    use_dev_tools()
        .map(|context| context.settings.into())
        .unwrap_or_else(|| Signal::derive(DevToolsSettings::default))
}
