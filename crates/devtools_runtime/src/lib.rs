pub mod browser;
pub mod bubble;
pub mod config;
pub mod debounce;
pub mod host;
pub mod listeners;
pub mod minimized;
pub mod model;
pub mod persistence;
pub mod reducer;
pub mod runtime;
pub mod runtime_context;
pub mod settings;

pub use bubble::{BubbleConfig, BubbleMode, BubblePositionStore, BubbleState, Edge};
pub use config::{ConfigError, DevToolsConfig, TeamDefaults};
pub use host::{AppHost, WeakAppHost};
pub use minimized::{IconLayout, MinimizeRequest, MinimizedTool, MinimizedTools};
pub use model::*;
pub use persistence::{PersistenceError, StorageKeys};
pub use reducer::{reduce_host, HostAction, HostEffect, HostError};
pub use runtime::{DevToolsRuntime, DevToolsServices};
pub use runtime_context::{
    use_dev_tools, use_dev_tools_runtime, use_devtools_settings, use_is_any_open,
    use_minimized_count, use_minimized_tools, use_open_apps, DevToolsContext, DevToolsProvider,
};
pub use settings::{
    default_settings, enforce_dial_limit, merge_settings, replay_changes, settings_bus,
    DevToolsSettings, DevToolsSettingsStore, SettingsBus, ToggleOutcome, MAX_DIAL_SLOTS,
};
