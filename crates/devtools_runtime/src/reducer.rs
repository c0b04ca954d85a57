//! Reducer actions, post-commit effects, and transition logic for the instance registry.

use devtools_tool_contract::{IconContext, ToolDefinition};
use serde_json::Value;
use thiserror::Error;

use crate::model::{AppInstance, HostState, InstanceId, PersistedOpenApp, ToolId};

/// Edge length used when snapshotting an instance icon for the minimized stack.
pub const SNAPSHOT_ICON_SIZE: u16 = 32;

#[derive(Debug, Clone)]
/// Actions accepted by [`reduce_host`] to mutate [`HostState`].
pub enum HostAction {
    /// Replace the registered tool definitions.
    RegisterApps(Vec<ToolDefinition>),
    /// The persisted open-instance list finished loading (empty on failure or first run).
    PersistedAppsLoaded(Vec<PersistedOpenApp>),
    /// Open, or re-focus a singleton, instance of a tool.
    Open {
        /// Definition to instantiate.
        tool: ToolDefinition,
        /// Initial minimized flag; only restore passes `true`.
        minimized: bool,
    },
    /// Close an instance, or the most recently opened one when `instance_id` is `None`.
    Close {
        /// Instance to close.
        instance_id: Option<InstanceId>,
    },
    /// Close every instance.
    CloseAll,
    /// Hide an instance's panel while keeping it mounted.
    Minimize {
        /// Instance to minimize.
        instance_id: InstanceId,
    },
    /// Bring an instance back with the supplied display geometry.
    Restore {
        /// Instance to restore.
        instance_id: InstanceId,
        /// Geometry to attach.
        restore_state: Option<Value>,
    },
}

#[derive(Debug, Clone, PartialEq)]
/// Follow-up work emitted by [`reduce_host`], run by the host after the new state is committed.
pub enum HostEffect {
    /// Schedule a debounced write of the open-instance projection.
    PersistOpenApps,
    /// Drop the minimized-stack entry of an instance that is visible again or gone.
    RemoveMinimized(InstanceId),
    /// Drop every minimized-stack entry.
    ClearMinimized,
    /// Reconcile the minimized stack against the current minimized instances after a restore.
    RelinkMinimized(Vec<AppInstance>),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
/// Reducer errors for actions that reference state that does not exist.
pub enum HostError {
    /// The target instance id was not found in the registry.
    #[error("instance `{0}` not found")]
    InstanceNotFound(InstanceId),
}

/// Applies a [`HostAction`] to the registry state and collects resulting post-commit effects.
///
/// # Errors
///
/// Returns [`HostError::InstanceNotFound`] when an action targets an instance that is not open.
pub fn reduce_host(
    state: &mut HostState,
    action: HostAction,
) -> Result<Vec<HostEffect>, HostError> {
    let mut effects = Vec::new();
    match action {
        HostAction::RegisterApps(definitions) => {
            state.definitions = definitions;
            complete_restore_if_ready(state, &mut effects);
        }
        HostAction::PersistedAppsLoaded(persisted) => {
            if !state.restore.load_complete {
                state.restore.pending = Some(persisted);
                state.restore.load_complete = true;
                complete_restore_if_ready(state, &mut effects);
            }
        }
        HostAction::Open { tool, minimized } => {
            open_instance(state, &tool, minimized, &mut effects);
            persist_if_restored(state, &mut effects);
        }
        HostAction::Close { instance_id } => {
            let removed = match instance_id {
                Some(instance_id) => {
                    let index = position_of(state, &instance_id)?;
                    state.apps.remove(index)
                }
                None => match state.apps.pop() {
                    Some(app) => app,
                    None => return Ok(effects),
                },
            };
            if removed.minimized {
                effects.push(HostEffect::RemoveMinimized(removed.instance_id));
            }
            persist_if_restored(state, &mut effects);
        }
        HostAction::CloseAll => {
            if state.apps.is_empty() {
                return Ok(effects);
            }
            state.apps.clear();
            effects.push(HostEffect::ClearMinimized);
            persist_if_restored(state, &mut effects);
        }
        HostAction::Minimize { instance_id } => {
            let index = position_of(state, &instance_id)?;
            state.apps[index].minimized = true;
            persist_if_restored(state, &mut effects);
        }
        HostAction::Restore {
            instance_id,
            restore_state,
        } => {
            let index = position_of(state, &instance_id)?;
            let app = &mut state.apps[index];
            let was_minimized = app.minimized;
            app.minimized = false;
            app.restore_state = restore_state;
            if was_minimized {
                effects.push(HostEffect::RemoveMinimized(instance_id));
            }
            persist_if_restored(state, &mut effects);
        }
    }
    Ok(effects)
}

/// Generates a fresh instance id: tool id, monotonic timestamp, and a random suffix.
pub fn generate_instance_id(tool_id: &ToolId) -> InstanceId {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    InstanceId::from_parts(
        tool_id,
        platform_host::next_monotonic_timestamp_ms(),
        &suffix[..8],
    )
}

fn position_of(state: &HostState, instance_id: &InstanceId) -> Result<usize, HostError> {
    state
        .apps
        .iter()
        .position(|app| &app.instance_id == instance_id)
        .ok_or_else(|| HostError::InstanceNotFound(instance_id.clone()))
}

fn persist_if_restored(state: &HostState, effects: &mut Vec<HostEffect>) {
    if state.restore.restored {
        effects.push(HostEffect::PersistOpenApps);
    }
}

/// Opens `tool` and returns the id of the instance now on top of the render order.
fn open_instance(
    state: &mut HostState,
    tool: &ToolDefinition,
    minimized: bool,
    effects: &mut Vec<HostEffect>,
) -> InstanceId {
    if tool.singleton {
        if let Some(index) = state.apps.iter().position(|app| app.id == tool.id) {
            let mut existing = state.apps.remove(index);
            if existing.minimized && !minimized {
                existing.minimized = false;
                effects.push(HostEffect::RemoveMinimized(existing.instance_id.clone()));
            }
            let instance_id = existing.instance_id.clone();
            state.apps.push(existing);
            return instance_id;
        }
    }

    let instance_id = generate_instance_id(&tool.id);
    state.apps.push(AppInstance {
        instance_id: instance_id.clone(),
        id: tool.id.clone(),
        title: tool.name.clone(),
        launch_mode: tool.launch_mode,
        singleton: tool.singleton,
        minimized,
        restore_state: None,
        icon: tool.resolve_icon(&IconContext::minimized(SNAPSHOT_ICON_SIZE)),
        color: tool.color.clone(),
    });
    instance_id
}

fn complete_restore_if_ready(state: &mut HostState, effects: &mut Vec<HostEffect>) {
    let phase = &state.restore;
    if phase.restored || !phase.load_complete || state.definitions.is_empty() {
        return;
    }

    let pending = state.restore.pending.take().unwrap_or_default();
    for entry in pending {
        // Tools uninstalled since the last session are skipped.
        let Some(tool) = state.definition(&entry.id).cloned() else {
            continue;
        };
        open_instance(state, &tool, entry.minimized, effects);
    }
    state.restore.restored = true;

    let minimized = state
        .apps
        .iter()
        .filter(|app| app.minimized)
        .cloned()
        .collect();
    effects.push(HostEffect::RelinkMinimized(minimized));
    effects.push(HostEffect::PersistOpenApps);
}

#[cfg(test)]
mod tests {
    use devtools_tool_contract::{LaunchMode, ToolModule, ToolMountContext};
    use leptos::{IntoView, View};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn mount_nothing(_context: ToolMountContext) -> View {
        ().into_view()
    }

    fn tool(id: &str, singleton: bool) -> ToolDefinition {
        ToolDefinition::new(ToolId::trusted(id), id.to_uppercase(), ToolModule::new(mount_nothing))
            .singleton(singleton)
    }

    fn open(state: &mut HostState, def: &ToolDefinition) -> (InstanceId, Vec<HostEffect>) {
        let effects = reduce_host(
            state,
            HostAction::Open {
                tool: def.clone(),
                minimized: false,
            },
        )
        .expect("open");
        let top = state.apps.last().expect("opened instance").instance_id.clone();
        (top, effects)
    }

    fn restored_state(definitions: Vec<ToolDefinition>) -> HostState {
        let mut state = HostState::default();
        reduce_host(&mut state, HostAction::RegisterApps(definitions)).expect("register");
        reduce_host(&mut state, HostAction::PersistedAppsLoaded(Vec::new())).expect("load");
        assert!(state.restore.restored);
        state
    }

    fn persisted(id: &str, minimized: bool) -> PersistedOpenApp {
        PersistedOpenApp {
            id: ToolId::trusted(id),
            minimized,
        }
    }

    #[test]
    fn singleton_open_twice_reuses_the_same_instance() {
        let net = tool("net", true);
        let mut state = restored_state(vec![net.clone()]);

        let (first, _) = open(&mut state, &net);
        let (second, _) = open(&mut state, &net);

        assert_eq!(first, second);
        assert_eq!(state.apps.len(), 1);
    }

    #[test]
    fn singleton_reopen_moves_instance_to_top() {
        let net = tool("net", true);
        let logs = tool("logs", false);
        let mut state = restored_state(vec![net.clone(), logs.clone()]);

        let (net_id, _) = open(&mut state, &net);
        let (logs_id, _) = open(&mut state, &logs);
        assert_eq!(state.apps.last().map(|a| &a.instance_id), Some(&logs_id));

        let (reopened, _) = open(&mut state, &net);
        assert_eq!(reopened, net_id);
        let order: Vec<_> = state.apps.iter().map(|a| a.instance_id.clone()).collect();
        assert_eq!(order, vec![logs_id, net_id]);
    }

    #[test]
    fn reopening_minimized_singleton_unminimizes_and_schedules_icon_removal() {
        let net = tool("net", true);
        let mut state = restored_state(vec![net.clone()]);
        let (net_id, _) = open(&mut state, &net);
        reduce_host(
            &mut state,
            HostAction::Minimize {
                instance_id: net_id.clone(),
            },
        )
        .expect("minimize");

        let (reopened, effects) = open(&mut state, &net);

        assert_eq!(reopened, net_id);
        assert!(!state.apps[0].minimized);
        assert_eq!(
            effects,
            vec![
                HostEffect::RemoveMinimized(net_id),
                HostEffect::PersistOpenApps
            ]
        );
    }

    #[test]
    fn non_singletons_get_distinct_ids() {
        let logs = tool("logs", false);
        let mut state = restored_state(vec![logs.clone()]);
        let (a, _) = open(&mut state, &logs);
        let (b, _) = open(&mut state, &logs);
        assert_ne!(a, b);
        assert_eq!(state.apps.len(), 2);
        assert!(a.as_str().starts_with("logs-"));
    }

    #[test]
    fn close_without_id_pops_most_recent_and_is_noop_when_empty() {
        let logs = tool("logs", false);
        let mut state = restored_state(vec![logs.clone()]);
        let (first, _) = open(&mut state, &logs);
        let (_second, _) = open(&mut state, &logs);

        reduce_host(&mut state, HostAction::Close { instance_id: None }).expect("pop");
        assert_eq!(state.apps.len(), 1);
        assert_eq!(state.apps[0].instance_id, first);

        reduce_host(&mut state, HostAction::Close { instance_id: None }).expect("pop");
        let effects =
            reduce_host(&mut state, HostAction::Close { instance_id: None }).expect("empty pop");
        assert!(effects.is_empty());
        assert!(state.apps.is_empty());
    }

    #[test]
    fn closing_unknown_instance_is_reported() {
        let mut state = restored_state(vec![tool("net", true)]);
        let missing = InstanceId::trusted("net-1-deadbeef");
        let err = reduce_host(
            &mut state,
            HostAction::Close {
                instance_id: Some(missing.clone()),
            },
        )
        .expect_err("unknown instance");
        assert_eq!(err, HostError::InstanceNotFound(missing));
    }

    #[test]
    fn closing_minimized_instance_removes_its_icon() {
        let net = tool("net", true);
        let mut state = restored_state(vec![net.clone()]);
        let (net_id, _) = open(&mut state, &net);
        reduce_host(
            &mut state,
            HostAction::Minimize {
                instance_id: net_id.clone(),
            },
        )
        .expect("minimize");

        let effects = reduce_host(
            &mut state,
            HostAction::Close {
                instance_id: Some(net_id.clone()),
            },
        )
        .expect("close");
        assert_eq!(
            effects,
            vec![
                HostEffect::RemoveMinimized(net_id),
                HostEffect::PersistOpenApps
            ]
        );
    }

    #[test]
    fn close_all_clears_instances_and_icons() {
        let logs = tool("logs", false);
        let mut state = restored_state(vec![logs.clone()]);
        open(&mut state, &logs);
        open(&mut state, &logs);

        let effects = reduce_host(&mut state, HostAction::CloseAll).expect("close all");
        assert!(state.apps.is_empty());
        assert_eq!(
            effects,
            vec![HostEffect::ClearMinimized, HostEffect::PersistOpenApps]
        );
    }

    #[test]
    fn minimize_then_restore_attaches_geometry() {
        let net = tool("net", true);
        let mut state = restored_state(vec![net.clone()]);
        let (net_id, _) = open(&mut state, &net);

        reduce_host(
            &mut state,
            HostAction::Minimize {
                instance_id: net_id.clone(),
            },
        )
        .expect("minimize");
        assert!(state.is_minimized(&net_id));
        assert_eq!(state.apps.len(), 1, "minimized instances stay mounted");

        let geometry = json!({"x": 10, "y": 20, "width": 300, "height": 400});
        let effects = reduce_host(
            &mut state,
            HostAction::Restore {
                instance_id: net_id.clone(),
                restore_state: Some(geometry.clone()),
            },
        )
        .expect("restore");
        assert_eq!(
            effects,
            vec![
                HostEffect::RemoveMinimized(net_id.clone()),
                HostEffect::PersistOpenApps
            ]
        );

        let app = state.instance(&net_id).expect("instance");
        assert!(!app.minimized);
        assert_eq!(app.restore_state, Some(geometry));
    }

    #[test]
    fn restoring_a_visible_instance_leaves_icons_alone() {
        let net = tool("net", true);
        let mut state = restored_state(vec![net.clone()]);
        let (net_id, _) = open(&mut state, &net);

        let effects = reduce_host(
            &mut state,
            HostAction::Restore {
                instance_id: net_id,
                restore_state: None,
            },
        )
        .expect("restore");
        assert_eq!(effects, vec![HostEffect::PersistOpenApps]);
    }

    #[test]
    fn is_any_open_ignores_toggle_only_and_minimized_instances() {
        let toggle = tool("grid", false).launch_mode(LaunchMode::ToggleOnly);
        let net = tool("net", true);
        let mut state = restored_state(vec![toggle.clone(), net.clone()]);

        open(&mut state, &toggle);
        assert!(!state.is_any_open());

        let (net_id, _) = open(&mut state, &net);
        assert!(state.is_any_open());

        reduce_host(&mut state, HostAction::Minimize { instance_id: net_id }).expect("minimize");
        assert!(!state.is_any_open());
    }

    #[test]
    fn changes_before_restore_are_not_persisted() {
        let net = tool("net", true);
        let mut state = HostState::default();
        let (_, effects) = open(&mut state, &net);
        assert!(effects.is_empty());
    }

    #[test]
    fn restore_waits_for_both_load_and_registration() {
        let net = tool("net", true);

        // load first, then register
        let mut state = HostState::default();
        reduce_host(
            &mut state,
            HostAction::PersistedAppsLoaded(vec![persisted("net", true)]),
        )
        .expect("load");
        assert!(!state.restore.restored);
        assert!(state.apps.is_empty());
        reduce_host(&mut state, HostAction::RegisterApps(vec![net.clone()])).expect("register");
        assert!(state.restore.restored);
        assert_eq!(state.apps.len(), 1);

        // register first, then load
        let mut state = HostState::default();
        reduce_host(&mut state, HostAction::RegisterApps(vec![net])).expect("register");
        assert!(!state.restore.restored);
        reduce_host(
            &mut state,
            HostAction::PersistedAppsLoaded(vec![persisted("net", true)]),
        )
        .expect("load");
        assert!(state.restore.restored);
        assert_eq!(state.apps.len(), 1);
    }

    #[test]
    fn empty_registration_does_not_release_the_barrier() {
        let mut state = HostState::default();
        reduce_host(
            &mut state,
            HostAction::PersistedAppsLoaded(vec![persisted("net", false)]),
        )
        .expect("load");
        reduce_host(&mut state, HostAction::RegisterApps(Vec::new())).expect("register");
        assert!(!state.restore.restored);
        assert!(state.restore.pending.is_some());
    }

    #[test]
    fn restore_regenerates_ids_carries_minimized_and_skips_unknown_tools() {
        let net = tool("net", true);
        let mut state = HostState::default();
        reduce_host(&mut state, HostAction::RegisterApps(vec![net])).expect("register");
        let effects = reduce_host(
            &mut state,
            HostAction::PersistedAppsLoaded(vec![
                persisted("net", true),
                persisted("uninstalled", false),
            ]),
        )
        .expect("load");

        assert_eq!(state.apps.len(), 1);
        let app = &state.apps[0];
        assert_eq!(app.id, ToolId::trusted("net"));
        assert!(app.minimized);
        assert!(app.instance_id.as_str().starts_with("net-"));
        assert_eq!(
            effects,
            vec![
                HostEffect::RelinkMinimized(vec![app.clone()]),
                HostEffect::PersistOpenApps
            ]
        );
    }

    #[test]
    fn duplicate_loads_are_ignored_after_restore() {
        let net = tool("net", true);
        let mut state = restored_state(vec![net]);
        let effects = reduce_host(
            &mut state,
            HostAction::PersistedAppsLoaded(vec![persisted("net", false)]),
        )
        .expect("second load");
        assert!(effects.is_empty());
        assert!(state.apps.is_empty());
    }

    #[test]
    fn persisted_projection_round_trips_through_a_fresh_registry() {
        let net = tool("net", true);
        let logs = tool("logs", false);
        let defs = vec![net.clone(), logs.clone()];
        let mut state = restored_state(defs.clone());
        let (net_id, _) = open(&mut state, &net);
        open(&mut state, &logs);
        reduce_host(&mut state, HostAction::Minimize { instance_id: net_id }).expect("minimize");

        let raw = serde_json::to_string(&state.persisted_open_apps()).expect("encode");
        let reloaded: Vec<PersistedOpenApp> = serde_json::from_str(&raw).expect("decode");

        let mut fresh = HostState::default();
        reduce_host(&mut fresh, HostAction::RegisterApps(defs)).expect("register");
        reduce_host(&mut fresh, HostAction::PersistedAppsLoaded(reloaded)).expect("load");

        assert_eq!(fresh.persisted_open_apps(), state.persisted_open_apps());
        for (before, after) in state.apps.iter().zip(fresh.apps.iter()) {
            assert_ne!(before.instance_id, after.instance_id);
        }
    }
}
