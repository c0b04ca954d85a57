//! Contract types between a host application and the dev-tools runtime.
//!
//! A host application describes each pluggable debug panel with a [`ToolDefinition`] and hands
//! the list to the runtime. The runtime tracks live occurrences by [`InstanceId`] and mounts the
//! opaque [`ToolModule`] at render time; nothing in this crate knows how a panel draws itself.

#![warn(missing_docs, rustdoc::broken_intra_doc_links)]

use std::{fmt, rc::Rc};

use leptos::View;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Stable key of a tool definition, unique within a host application.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolId(String);

impl ToolId {
    /// Returns a tool id when `raw` is non-empty, trimmed, and at most 120 bytes.
    pub fn new(raw: impl Into<String>) -> Result<Self, String> {
        let raw = raw.into();
        if raw.is_empty() || raw.len() > 120 {
            return Err(format!("invalid tool id `{raw}`; expected 1..=120 bytes"));
        }
        if raw.trim() != raw || raw.chars().any(char::is_control) {
            return Err(format!(
                "invalid tool id `{raw}`; surrounding whitespace and control characters are not allowed"
            ));
        }
        Ok(Self(raw))
    }

    /// Creates an id without validation for trusted constants.
    pub fn trusted(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Returns the string form of the identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ToolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Generated identifier of one live tool instance. Never reused, not preserved across restarts.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(String);

impl InstanceId {
    /// Builds an id of the form `<tool>-<timestamp_ms>-<suffix>`.
    pub fn from_parts(tool_id: &ToolId, timestamp_ms: u64, suffix: &str) -> Self {
        Self(format!("{}-{timestamp_ms}-{suffix}", tool_id.as_str()))
    }

    /// Wraps an id produced elsewhere (for example one read back from storage).
    pub fn trusted(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Returns the string form of the identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
/// How an instance's panel is presented.
pub enum LaunchMode {
    /// The tool renders its own modal chrome.
    SelfModal,
    /// The runtime wraps the tool in a host-provided modal.
    HostModal,
    /// The tool renders as an inline overlay.
    Inline,
    /// The tool has no panel; opening it only flips some state.
    ToggleOnly,
}

impl LaunchMode {
    /// Returns `true` when instances in this mode occupy the screen with a panel.
    pub const fn presents_panel(self) -> bool {
        !matches!(self, Self::ToggleOnly)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
/// Launcher surface(s) a tool may be offered on.
pub enum ToolSlot {
    /// The radial dial menu.
    Dial,
    /// The floating row next to the bubble.
    Row,
    /// Both surfaces.
    Both,
}

impl ToolSlot {
    /// Returns `true` when the tool can appear in the dial menu.
    pub const fn in_dial(self) -> bool {
        matches!(self, Self::Dial | Self::Both)
    }

    /// Returns `true` when the tool can appear in the floating row.
    pub const fn in_row(self) -> bool {
        matches!(self, Self::Row | Self::Both)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Resolved icon snapshot: a glyph name, a pixel size, and an optional tint.
pub struct IconNode {
    /// Semantic glyph identifier understood by the rendering layer.
    pub glyph: String,
    /// Edge length in logical pixels.
    pub size: u16,
    /// Optional CSS color.
    pub tint: Option<String>,
}

impl IconNode {
    /// Default icon edge length.
    pub const DEFAULT_SIZE: u16 = 24;

    /// Creates an untinted icon at [`Self::DEFAULT_SIZE`].
    pub fn new(glyph: impl Into<String>) -> Self {
        Self {
            glyph: glyph.into(),
            size: Self::DEFAULT_SIZE,
            tint: None,
        }
    }

    /// Returns the icon with a different size.
    pub fn with_size(mut self, size: u16) -> Self {
        self.size = size;
        self
    }

    /// Returns the icon with a tint.
    pub fn with_tint(mut self, tint: impl Into<String>) -> Self {
        self.tint = Some(tint.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// Where an icon is being drawn.
pub enum IconSlot {
    /// A dial menu entry.
    Dial,
    /// A floating row button.
    Row,
    /// A minimized-tool icon in the icon stack.
    Minimized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Inputs a dynamic icon may depend on.
pub struct IconContext {
    /// Surface the icon is drawn on.
    pub slot: IconSlot,
    /// Requested edge length.
    pub size: u16,
    /// Whether the tool is currently active on that surface.
    pub active: bool,
}

impl IconContext {
    /// Context used when snapshotting the icon of a minimized instance.
    pub const fn minimized(size: u16) -> Self {
        Self {
            slot: IconSlot::Minimized,
            size,
            active: true,
        }
    }
}

/// Dynamic icon renderer.
pub type IconRenderFn = Rc<dyn Fn(&IconContext) -> IconNode>;

#[derive(Clone)]
/// Tool icon: either a fixed node or a function of the drawing context.
pub enum ToolIcon {
    /// Same node everywhere.
    Static(IconNode),
    /// Node computed per slot/size/state.
    Dynamic(IconRenderFn),
}

impl ToolIcon {
    /// Creates a dynamic icon from a closure.
    pub fn dynamic(render: impl Fn(&IconContext) -> IconNode + 'static) -> Self {
        Self::Dynamic(Rc::new(render))
    }

    /// Resolves the icon for a concrete drawing context.
    pub fn resolve(&self, context: &IconContext) -> IconNode {
        match self {
            Self::Static(node) => node.clone(),
            Self::Dynamic(render) => render(context),
        }
    }
}

impl fmt::Debug for ToolIcon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(node) => f.debug_tuple("Static").field(node).finish(),
            Self::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
/// Per-instance mount inputs handed to a tool's [`ToolModule`].
pub struct ToolMountContext {
    /// Tool definition id.
    pub tool_id: ToolId,
    /// Runtime instance id.
    pub instance_id: InstanceId,
    /// Default props from the definition.
    pub props: Value,
    /// Display geometry to restore, when the instance was brought back from minimized.
    pub restore_state: Option<Value>,
    /// Whether the instance is currently minimized (mounted but hidden).
    pub minimized: bool,
}

/// Static mount function used as a tool's component reference.
pub type ToolMountFn = fn(ToolMountContext) -> View;

#[derive(Debug, Clone, Copy)]
/// Opaque component reference swapped in at render time.
pub struct ToolModule {
    mount_fn: ToolMountFn,
}

impl ToolModule {
    /// Creates a module from a mount function.
    pub const fn new(mount_fn: ToolMountFn) -> Self {
        Self { mount_fn }
    }

    /// Mounts the tool view for one instance.
    pub fn mount(self, context: ToolMountContext) -> View {
        (self.mount_fn)(context)
    }
}

#[derive(Debug, Clone)]
/// Host-supplied static descriptor of a pluggable debug panel.
pub struct ToolDefinition {
    /// Stable definition key.
    pub id: ToolId,
    /// Human-readable name, also the default instance title.
    pub name: String,
    /// Panel presentation mode.
    pub launch_mode: LaunchMode,
    /// Whether at most one instance may exist at a time.
    pub singleton: bool,
    /// Launcher surfaces the tool may appear on.
    pub slot: ToolSlot,
    /// Component reference.
    pub module: ToolModule,
    /// Props passed to every mount.
    pub default_props: Value,
    /// Optional icon.
    pub icon: Option<ToolIcon>,
    /// Optional accent color used by launcher and minimized icons.
    pub color: Option<String>,
    /// Optional one-line description for settings screens.
    pub description: Option<String>,
}

impl ToolDefinition {
    /// Creates a host-modal, non-singleton definition offered on both surfaces.
    pub fn new(id: ToolId, name: impl Into<String>, module: ToolModule) -> Self {
        Self {
            id,
            name: name.into(),
            launch_mode: LaunchMode::HostModal,
            singleton: false,
            slot: ToolSlot::Both,
            module,
            default_props: Value::Null,
            icon: None,
            color: None,
            description: None,
        }
    }

    /// Sets the launch mode.
    pub fn launch_mode(mut self, launch_mode: LaunchMode) -> Self {
        self.launch_mode = launch_mode;
        self
    }

    /// Sets singleton semantics.
    pub fn singleton(mut self, singleton: bool) -> Self {
        self.singleton = singleton;
        self
    }

    /// Sets the launcher slot.
    pub fn slot(mut self, slot: ToolSlot) -> Self {
        self.slot = slot;
        self
    }

    /// Sets default props.
    pub fn default_props(mut self, props: Value) -> Self {
        self.default_props = props;
        self
    }

    /// Sets the icon.
    pub fn icon(mut self, icon: ToolIcon) -> Self {
        self.icon = Some(icon);
        self
    }

    /// Sets the accent color.
    pub fn color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    /// Sets the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Resolves this tool's icon for `context`, if it has one.
    pub fn resolve_icon(&self, context: &IconContext) -> Option<IconNode> {
        self.icon.as_ref().map(|icon| icon.resolve(context))
    }
}
