//! Instance-registry data model and screen geometry shared by the stores.

use devtools_tool_contract::{IconNode, LaunchMode, ToolDefinition};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use devtools_tool_contract::{InstanceId, ToolId};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SafeAreaInsets {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

/// Current screen size and the safe area inside it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenBounds {
    pub width: f64,
    pub height: f64,
    pub insets: SafeAreaInsets,
}

impl ScreenBounds {
    pub const fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            insets: SafeAreaInsets {
                top: 0.0,
                right: 0.0,
                bottom: 0.0,
                left: 0.0,
            },
        }
    }

    pub const fn with_insets(mut self, insets: SafeAreaInsets) -> Self {
        self.insets = insets;
        self
    }

    pub fn min_x(&self) -> f64 {
        self.insets.left
    }

    pub fn max_x(&self) -> f64 {
        self.width - self.insets.right
    }

    pub fn min_y(&self) -> f64 {
        self.insets.top
    }

    pub fn max_y(&self) -> f64 {
        self.height - self.insets.bottom
    }
}

impl Default for ScreenBounds {
    fn default() -> Self {
        Self::new(390.0, 844.0)
    }
}

/// A live, possibly minimized occurrence of a tool.
#[derive(Debug, Clone, PartialEq)]
pub struct AppInstance {
    pub instance_id: InstanceId,
    pub id: ToolId,
    pub title: String,
    pub launch_mode: LaunchMode,
    pub singleton: bool,
    pub minimized: bool,
    /// Opaque display geometry supplied by the last restore.
    pub restore_state: Option<Value>,
    /// Icon snapshot taken at open time for the minimized stack.
    pub icon: Option<IconNode>,
    pub color: Option<String>,
}

impl AppInstance {
    /// Returns `true` when this instance currently occupies the screen with a panel.
    pub fn is_visible_panel(&self) -> bool {
        self.launch_mode.presents_panel() && !self.minimized
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PersistedOpenAppRepr {
    /// Older sessions stored bare tool ids.
    Legacy(ToolId),
    Entry {
        id: ToolId,
        #[serde(default)]
        minimized: bool,
    },
}

/// Persisted projection of one open instance. Instance identity is deliberately not stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "PersistedOpenAppRepr")]
pub struct PersistedOpenApp {
    pub id: ToolId,
    pub minimized: bool,
}

impl From<PersistedOpenAppRepr> for PersistedOpenApp {
    fn from(repr: PersistedOpenAppRepr) -> Self {
        match repr {
            PersistedOpenAppRepr::Legacy(id) => Self {
                id,
                minimized: false,
            },
            PersistedOpenAppRepr::Entry { id, minimized } => Self { id, minimized },
        }
    }
}

/// Two-phase restore barrier state.
///
/// `pending` is applied only once `load_complete` is set and a non-empty definition list has been
/// registered; `restored` then stays `true` for the rest of the session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RestorePhase {
    pub pending: Option<Vec<PersistedOpenApp>>,
    pub load_complete: bool,
    pub restored: bool,
}

#[derive(Debug, Clone, Default)]
pub struct HostState {
    pub apps: Vec<AppInstance>,
    pub definitions: Vec<ToolDefinition>,
    pub restore: RestorePhase,
}

impl HostState {
    pub fn is_any_open(&self) -> bool {
        is_any_open(&self.apps)
    }

    pub fn instance(&self, instance_id: &InstanceId) -> Option<&AppInstance> {
        self.apps.iter().find(|app| &app.instance_id == instance_id)
    }

    pub fn is_minimized(&self, instance_id: &InstanceId) -> bool {
        self.instance(instance_id)
            .map(|app| app.minimized)
            .unwrap_or(false)
    }

    pub fn definition(&self, tool_id: &ToolId) -> Option<&ToolDefinition> {
        self.definitions.iter().find(|def| &def.id == tool_id)
    }

    pub fn persisted_open_apps(&self) -> Vec<PersistedOpenApp> {
        self.apps
            .iter()
            .map(|app| PersistedOpenApp {
                id: app.id.clone(),
                minimized: app.minimized,
            })
            .collect()
    }
}

/// Returns `true` iff at least one instance presents a panel and is not minimized.
pub fn is_any_open(apps: &[AppInstance]) -> bool {
    apps.iter().any(AppInstance::is_visible_panel)
}
