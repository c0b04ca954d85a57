//! Launcher settings: which tools appear in the dial menu and the floating row.
//!
//! Toggle maps are ordered sequences. Ordering is what makes the dial slot cap deterministic:
//! [`enforce_dial_limit`] keeps the first [`MAX_DIAL_SLOTS`] enabled entries in sequence order,
//! and merged settings are ordered by tool registration order.

pub mod store;

use std::{collections::BTreeMap, fmt};

use devtools_tool_contract::ToolDefinition;
use serde::{
    de::{MapAccess, Visitor},
    ser::SerializeMap,
    Deserialize, Deserializer, Serialize, Serializer,
};
use serde_json::Value;

use crate::{config::TeamDefaults, model::ToolId};

pub use store::{settings_bus, DevToolsSettingsStore, SettingsBus};

/// Maximum number of concurrently enabled dial tools.
pub const MAX_DIAL_SLOTS: usize = 6;

/// Reserved floating-row key for the environment badge.
pub const ENVIRONMENT_KEY: &str = "environment";

/// Global setting: every host-modal panel shares one remembered size.
pub const SHARED_MODAL_DIMENSIONS: &str = "sharedModalDimensions";

/// Ordered tool-id to enabled-flag sequence, serialized as a JSON object in sequence order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlotToggles(Vec<(ToolId, bool)>);

impl SlotToggles {
    pub fn from_entries(entries: impl IntoIterator<Item = (ToolId, bool)>) -> Self {
        let mut toggles = Self::default();
        for (id, enabled) in entries {
            toggles.set(id, enabled);
        }
        toggles
    }

    pub fn get(&self, id: &ToolId) -> Option<bool> {
        self.0
            .iter()
            .find(|(entry, _)| entry == id)
            .map(|(_, enabled)| *enabled)
    }

    pub fn is_enabled(&self, id: &ToolId) -> bool {
        self.get(id).unwrap_or(false)
    }

    pub fn contains(&self, id: &ToolId) -> bool {
        self.get(id).is_some()
    }

    /// Updates an entry in place, or appends it when absent.
    pub fn set(&mut self, id: ToolId, enabled: bool) {
        match self.0.iter_mut().find(|(entry, _)| *entry == id) {
            Some((_, value)) => *value = enabled,
            None => self.0.push((id, enabled)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ToolId, bool)> {
        self.0.iter().map(|(id, enabled)| (id, *enabled))
    }

    pub fn enabled(&self) -> impl Iterator<Item = &ToolId> {
        self.0
            .iter()
            .filter(|(_, enabled)| *enabled)
            .map(|(id, _)| id)
    }

    pub fn enabled_count(&self) -> usize {
        self.enabled().count()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for SlotToggles {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (id, enabled) in &self.0 {
            map.serialize_entry(id.as_str(), enabled)?;
        }
        map.end()
    }
}

/// Reads a JSON object in document order. Non-boolean values and invalid ids are skipped so a
/// hand-edited blob degrades per entry instead of failing as a whole.
fn visit_toggle_entries<'de, A: MapAccess<'de>>(
    mut access: A,
    mut on_entry: impl FnMut(String, bool),
) -> Result<(), A::Error> {
    while let Some((key, value)) = access.next_entry::<String, Value>()? {
        if let Value::Bool(enabled) = value {
            on_entry(key, enabled);
        }
    }
    Ok(())
}

struct SlotTogglesVisitor;

impl<'de> Visitor<'de> for SlotTogglesVisitor {
    type Value = SlotToggles;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an object of tool id to boolean")
    }

    fn visit_map<A: MapAccess<'de>>(self, access: A) -> Result<Self::Value, A::Error> {
        let mut toggles = SlotToggles::default();
        visit_toggle_entries(access, |key, enabled| {
            if let Ok(id) = ToolId::new(key) {
                toggles.set(id, enabled);
            }
        })?;
        Ok(toggles)
    }
}

impl<'de> Deserialize<'de> for SlotToggles {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(SlotTogglesVisitor)
    }
}

/// Floating-row toggles plus the reserved environment badge flag.
///
/// Serialized as one object whose `"environment"` key is the badge flag. A stored object without
/// that key reads as enabled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FloatingTools {
    pub tools: SlotToggles,
    pub environment: bool,
}

impl Default for FloatingTools {
    fn default() -> Self {
        Self {
            tools: SlotToggles::default(),
            environment: true,
        }
    }
}

impl Serialize for FloatingTools {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.tools.len() + 1))?;
        for (id, enabled) in self.tools.iter() {
            map.serialize_entry(id.as_str(), &enabled)?;
        }
        map.serialize_entry(ENVIRONMENT_KEY, &self.environment)?;
        map.end()
    }
}

struct FloatingToolsVisitor;

impl<'de> Visitor<'de> for FloatingToolsVisitor {
    type Value = FloatingTools;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an object of tool id to boolean")
    }

    fn visit_map<A: MapAccess<'de>>(self, access: A) -> Result<Self::Value, A::Error> {
        let mut floating = FloatingTools::default();
        visit_toggle_entries(access, |key, enabled| {
            if key == ENVIRONMENT_KEY {
                floating.environment = enabled;
            } else if let Ok(id) = ToolId::new(key) {
                floating.tools.set(id, enabled);
            }
        })?;
        Ok(floating)
    }
}

impl<'de> Deserialize<'de> for FloatingTools {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(FloatingToolsVisitor)
    }
}

/// Free-form boolean preferences. Unknown keys are kept for forward compatibility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GlobalSettings(BTreeMap<String, bool>);

impl Default for GlobalSettings {
    fn default() -> Self {
        Self(BTreeMap::from([(SHARED_MODAL_DIMENSIONS.to_string(), false)]))
    }
}

impl GlobalSettings {
    pub fn get(&self, key: &str) -> bool {
        self.0.get(key).copied().unwrap_or(false)
    }

    pub fn set(&mut self, key: impl Into<String>, value: bool) {
        self.0.insert(key.into(), value);
    }

    /// Flips `key` (absent reads as `false`) and returns the new value.
    pub fn toggle(&mut self, key: &str) -> bool {
        let next = !self.get(key);
        self.set(key, next);
        next
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.0.iter().map(|(key, value)| (key.as_str(), *value))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DevToolsSettings {
    pub dial_tools: SlotToggles,
    pub floating_tools: FloatingTools,
    pub global_settings: GlobalSettings,
}

/// Result of a toggle call, so launchers can surface a hint when nothing changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    Enabled,
    Disabled,
    /// Enabling would exceed [`MAX_DIAL_SLOTS`]; settings are unchanged.
    SlotLimitReached,
    /// The id is not an offered tool on that surface; settings are unchanged.
    UnknownTool,
}

impl DevToolsSettings {
    pub fn is_dial_full(&self) -> bool {
        self.dial_tools.enabled_count() >= MAX_DIAL_SLOTS
    }

    pub fn toggle_dial_tool(&mut self, id: &ToolId) -> ToggleOutcome {
        match self.dial_tools.get(id) {
            None => ToggleOutcome::UnknownTool,
            Some(true) => {
                self.dial_tools.set(id.clone(), false);
                ToggleOutcome::Disabled
            }
            Some(false) if self.is_dial_full() => ToggleOutcome::SlotLimitReached,
            Some(false) => {
                self.dial_tools.set(id.clone(), true);
                ToggleOutcome::Enabled
            }
        }
    }

    /// Toggles a floating-row tool or, for [`ENVIRONMENT_KEY`], the environment badge.
    pub fn toggle_floating_tool(&mut self, id: &ToolId) -> ToggleOutcome {
        if id.as_str() == ENVIRONMENT_KEY {
            self.floating_tools.environment = !self.floating_tools.environment;
            return outcome_for(self.floating_tools.environment);
        }
        match self.floating_tools.tools.get(id) {
            None => ToggleOutcome::UnknownTool,
            Some(enabled) => {
                self.floating_tools.tools.set(id.clone(), !enabled);
                outcome_for(!enabled)
            }
        }
    }
}

fn outcome_for(enabled: bool) -> ToggleOutcome {
    if enabled {
        ToggleOutcome::Enabled
    } else {
        ToggleOutcome::Disabled
    }
}

/// Forces every enabled dial entry past the first [`MAX_DIAL_SLOTS`] to `false`.
///
/// Returns `true` when an entry was changed. Applying it twice is the same as once.
pub fn enforce_dial_limit(dial: &mut SlotToggles) -> bool {
    let mut remaining = MAX_DIAL_SLOTS;
    let mut changed = false;
    for (_, enabled) in dial.0.iter_mut() {
        if !*enabled {
            continue;
        }
        if remaining > 0 {
            remaining -= 1;
        } else {
            *enabled = false;
            changed = true;
        }
    }
    changed
}

/// Computes first-run settings for the registered definitions.
///
/// Without a team list every tool offered on a surface is enabled (dial subject to the cap). With
/// a team list exactly the listed ids are enabled, and the environment badge follows whether the
/// floating list names it.
pub fn default_settings(definitions: &[ToolDefinition], team: &TeamDefaults) -> DevToolsSettings {
    let listed = |list: &Option<Vec<ToolId>>, id: &ToolId| {
        list.as_ref().map_or(true, |ids| ids.contains(id))
    };

    let mut dial_tools = SlotToggles::from_entries(
        definitions
            .iter()
            .filter(|def| def.slot.in_dial())
            .map(|def| (def.id.clone(), listed(&team.dial, &def.id))),
    );
    enforce_dial_limit(&mut dial_tools);

    let tools = SlotToggles::from_entries(
        definitions
            .iter()
            .filter(|def| def.slot.in_row() && def.id.as_str() != ENVIRONMENT_KEY)
            .map(|def| (def.id.clone(), listed(&team.floating, &def.id))),
    );
    let environment = team.floating.as_ref().map_or(true, |ids| {
        ids.iter().any(|id| id.as_str() == ENVIRONMENT_KEY)
    });

    DevToolsSettings {
        dial_tools,
        floating_tools: FloatingTools { tools, environment },
        global_settings: GlobalSettings::default(),
    }
}

/// Overlays stored settings on computed defaults.
///
/// Tool keys follow the defaults' order; stored values win, new tools read as disabled, and ids
/// that are no longer installed are dropped. Global settings keep every stored key. The dial cap is
/// re-applied.
pub fn merge_settings(defaults: &DevToolsSettings, stored: &DevToolsSettings) -> DevToolsSettings {
    let overlay = |defaults: &SlotToggles, stored: &SlotToggles| {
        SlotToggles::from_entries(
            defaults
                .iter()
                .map(|(id, _)| (id.clone(), stored.is_enabled(id))),
        )
    };

    let mut dial_tools = overlay(&defaults.dial_tools, &stored.dial_tools);
    enforce_dial_limit(&mut dial_tools);

    let mut global_settings = defaults.global_settings.clone();
    for (key, value) in stored.global_settings.iter() {
        global_settings.set(key, value);
    }

    DevToolsSettings {
        dial_tools,
        floating_tools: FloatingTools {
            tools: overlay(&defaults.floating_tools.tools, &stored.floating_tools.tools),
            environment: stored.floating_tools.environment,
        },
        global_settings,
    }
}

/// Re-applies onto `target` every value that differs between `base` and `changed`.
///
/// Only tool keys present in `base` count as changed, and tool keys missing from `target` are
/// skipped. The dial cap is re-applied.
pub fn replay_changes(
    base: &DevToolsSettings,
    changed: &DevToolsSettings,
    target: &mut DevToolsSettings,
) {
    let replay = |base: &SlotToggles, changed: &SlotToggles, target: &mut SlotToggles| {
        for (id, enabled) in changed.iter() {
            let edited = base.get(id).is_some_and(|before| before != enabled);
            if edited && target.contains(id) {
                target.set(id.clone(), enabled);
            }
        }
    };

    replay(&base.dial_tools, &changed.dial_tools, &mut target.dial_tools);
    enforce_dial_limit(&mut target.dial_tools);
    replay(
        &base.floating_tools.tools,
        &changed.floating_tools.tools,
        &mut target.floating_tools.tools,
    );
    if base.floating_tools.environment != changed.floating_tools.environment {
        target.floating_tools.environment = changed.floating_tools.environment;
    }
    for (key, value) in changed.global_settings.iter() {
        if base.global_settings.get(key) != value {
            target.global_settings.set(key, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use devtools_tool_contract::{ToolModule, ToolMountContext, ToolSlot};
    use leptos::{IntoView, View};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn mount_nothing(_context: ToolMountContext) -> View {
        ().into_view()
    }

    fn tool(id: &str, slot: ToolSlot) -> ToolDefinition {
        ToolDefinition::new(ToolId::trusted(id), id, ToolModule::new(mount_nothing)).slot(slot)
    }

    fn ids(names: &[&str]) -> Vec<ToolId> {
        names.iter().map(|name| ToolId::trusted(*name)).collect()
    }

    fn dial_of(names: &[&str]) -> SlotToggles {
        SlotToggles::from_entries(names.iter().map(|name| (ToolId::trusted(*name), true)))
    }

    #[test]
    fn eight_enabled_dial_entries_keep_the_first_six() {
        let mut dial = dial_of(&["a", "b", "c", "d", "e", "f", "g", "h"]);
        assert!(enforce_dial_limit(&mut dial));

        let enabled: Vec<_> = dial.enabled().map(ToolId::as_str).collect();
        assert_eq!(enabled, vec!["a", "b", "c", "d", "e", "f"]);
        assert_eq!(dial.get(&ToolId::trusted("h")), Some(false));
    }

    #[test]
    fn enforce_dial_limit_is_idempotent() {
        let mut once = dial_of(&["a", "b", "c", "d", "e", "f", "g"]);
        enforce_dial_limit(&mut once);
        let mut twice = once.clone();
        assert!(!enforce_dial_limit(&mut twice));
        assert_eq!(once, twice);
        assert!(twice.enabled_count() <= MAX_DIAL_SLOTS);
    }

    #[test]
    fn toggles_decode_in_document_order_and_skip_bad_values() {
        let toggles: SlotToggles =
            serde_json::from_str(r#"{"zeta":true,"alpha":false,"bad":"yes","":true}"#)
                .expect("decode");
        let entries: Vec<_> = toggles.iter().map(|(id, on)| (id.as_str(), on)).collect();
        assert_eq!(entries, vec![("zeta", true), ("alpha", false)]);
        assert_eq!(
            serde_json::to_string(&toggles).expect("encode"),
            r#"{"zeta":true,"alpha":false}"#
        );
    }

    #[test]
    fn floating_tools_reserve_the_environment_key() {
        let floating: FloatingTools =
            serde_json::from_value(json!({"net": true, "environment": false})).expect("decode");
        assert!(!floating.environment);
        assert!(!floating.tools.contains(&ToolId::trusted("environment")));
        assert_eq!(
            serde_json::to_value(&floating).expect("encode"),
            json!({"net": true, "environment": false})
        );
    }

    #[test]
    fn defaults_without_team_lists_enable_everything_up_to_the_cap() {
        let defs: Vec<_> = ["a", "b", "c", "d", "e", "f", "g"]
            .iter()
            .map(|id| tool(id, ToolSlot::Both))
            .chain([tool("row", ToolSlot::Row)])
            .collect();

        let settings = default_settings(&defs, &TeamDefaults::default());

        assert_eq!(settings.dial_tools.len(), 7);
        assert_eq!(settings.dial_tools.enabled_count(), 6);
        assert_eq!(settings.dial_tools.get(&ToolId::trusted("g")), Some(false));
        assert!(settings.floating_tools.tools.is_enabled(&ToolId::trusted("row")));
        assert!(settings.floating_tools.environment);
    }

    #[test]
    fn team_lists_pick_exactly_the_listed_tools() {
        let defs = vec![
            tool("net", ToolSlot::Both),
            tool("logs", ToolSlot::Both),
            tool("perf", ToolSlot::Dial),
        ];
        let team = TeamDefaults {
            dial: Some(ids(&["perf"])),
            floating: Some(ids(&["logs"])),
        };

        let settings = default_settings(&defs, &team);

        let dial: Vec<_> = settings.dial_tools.enabled().map(ToolId::as_str).collect();
        assert_eq!(dial, vec!["perf"]);
        let row: Vec<_> = settings
            .floating_tools
            .tools
            .enabled()
            .map(ToolId::as_str)
            .collect();
        assert_eq!(row, vec!["logs"]);
        assert!(!settings.floating_tools.environment);
    }

    #[test]
    fn merge_unions_drops_uninstalled_and_recaps() {
        let defs: Vec<_> = ["a", "b", "c", "d", "e", "f", "g", "new"]
            .iter()
            .map(|id| tool(id, ToolSlot::Dial))
            .collect();
        let defaults = default_settings(&defs, &TeamDefaults::default());
        let stored = DevToolsSettings {
            dial_tools: dial_of(&["g", "f", "e", "d", "c", "b", "a", "gone"]),
            ..DevToolsSettings::default()
        };

        let merged = merge_settings(&defaults, &stored);

        let keys: Vec<_> = merged.dial_tools.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(keys, vec!["a", "b", "c", "d", "e", "f", "g", "new"]);
        let enabled: Vec<_> = merged.dial_tools.enabled().map(ToolId::as_str).collect();
        assert_eq!(enabled, vec!["a", "b", "c", "d", "e", "f"]);
        assert!(!merged.dial_tools.is_enabled(&ToolId::trusted("new")));
    }

    #[test]
    fn merge_keeps_stored_global_keys() {
        let defaults = default_settings(&[], &TeamDefaults::default());
        let mut stored = DevToolsSettings::default();
        stored.global_settings.set("futureFlag", true);
        stored.global_settings.set(SHARED_MODAL_DIMENSIONS, true);

        let merged = merge_settings(&defaults, &stored);
        assert!(merged.global_settings.get("futureFlag"));
        assert!(merged.global_settings.get(SHARED_MODAL_DIMENSIONS));
    }

    #[test]
    fn replay_applies_only_edited_keys() {
        let defs = vec![tool("a", ToolSlot::Dial), tool("b", ToolSlot::Both)];
        let base = default_settings(&defs, &TeamDefaults::default());
        let mut changed = base.clone();
        changed.dial_tools.set(ToolId::trusted("b"), false);
        changed.global_settings.set("compactRow", true);
        changed.dial_tools.set(ToolId::trusted("late"), true);

        let mut stored = base.clone();
        stored.dial_tools.set(ToolId::trusted("a"), false);
        stored.floating_tools.environment = false;
        let mut target = merge_settings(&base, &stored);
        replay_changes(&base, &changed, &mut target);

        assert_eq!(target.dial_tools.get(&ToolId::trusted("a")), Some(false));
        assert_eq!(target.dial_tools.get(&ToolId::trusted("b")), Some(false));
        assert_eq!(target.dial_tools.get(&ToolId::trusted("late")), None);
        assert!(!target.floating_tools.environment);
        assert!(target.global_settings.get("compactRow"));
    }

    #[test]
    fn dial_toggle_respects_the_cap() {
        let mut settings = DevToolsSettings {
            dial_tools: SlotToggles::from_entries(
                ["a", "b", "c", "d", "e", "f", "g"]
                    .iter()
                    .enumerate()
                    .map(|(i, id)| (ToolId::trusted(*id), i < 6)),
            ),
            ..DevToolsSettings::default()
        };
        let g = ToolId::trusted("g");

        assert_eq!(settings.toggle_dial_tool(&g), ToggleOutcome::SlotLimitReached);
        assert!(!settings.dial_tools.is_enabled(&g));

        assert_eq!(
            settings.toggle_dial_tool(&ToolId::trusted("a")),
            ToggleOutcome::Disabled
        );
        assert_eq!(settings.toggle_dial_tool(&g), ToggleOutcome::Enabled);
        assert_eq!(
            settings.toggle_dial_tool(&ToolId::trusted("missing")),
            ToggleOutcome::UnknownTool
        );
    }

    #[test]
    fn floating_toggle_handles_environment_badge() {
        let mut settings = DevToolsSettings::default();
        assert_eq!(
            settings.toggle_floating_tool(&ToolId::trusted(ENVIRONMENT_KEY)),
            ToggleOutcome::Disabled
        );
        assert!(!settings.floating_tools.environment);
    }

    #[test]
    fn settings_blob_uses_camel_case_sections() {
        let settings: DevToolsSettings = serde_json::from_value(json!({
            "dialTools": {"net": true},
            "globalSettings": {"sharedModalDimensions": true}
        }))
        .expect("decode");
        assert!(settings.dial_tools.is_enabled(&ToolId::trusted("net")));
        assert!(settings.floating_tools.environment);
        assert!(settings.global_settings.get(SHARED_MODAL_DIMENSIONS));
    }
}
