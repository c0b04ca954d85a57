use std::{rc::Rc, time::Duration};

use devtools_runtime::{
    persistence, DevToolsConfig, DevToolsRuntime, DevToolsServices, InstanceId, PersistedOpenApp,
    ScreenBounds, SettingsBus, StorageKeys, ToolId,
};
use devtools_tool_contract::{
    IconNode, ToolDefinition, ToolIcon, ToolModule, ToolMountContext, ToolSlot,
};
use futures::executor::block_on;
use leptos::{IntoView, View};
use platform_host::{FailingPrefsStore, ManualTaskHost, MemoryPrefsStore, PrefsStore};
use pretty_assertions::assert_eq;
use serde_json::json;

fn mount_nothing(_context: ToolMountContext) -> View {
    ().into_view()
}

fn net() -> ToolDefinition {
    ToolDefinition::new(ToolId::trusted("net"), "Network", ToolModule::new(mount_nothing))
        .singleton(true)
        .color("#0af")
        .icon(ToolIcon::Static(IconNode::new("globe")))
}

fn logs() -> ToolDefinition {
    ToolDefinition::new(ToolId::trusted("logs"), "Logs", ToolModule::new(mount_nothing))
}

fn runtime_over(prefs: Rc<dyn PrefsStore>, tasks: &ManualTaskHost) -> DevToolsRuntime {
    DevToolsRuntime::with_bus(
        DevToolsServices::new(prefs, Rc::new(tasks.clone())),
        DevToolsConfig::default(),
        SettingsBus::default(),
        ScreenBounds::default(),
    )
}

fn boot(
    prefs: &MemoryPrefsStore,
    tasks: &ManualTaskHost,
    tools: Vec<ToolDefinition>,
) -> DevToolsRuntime {
    let runtime = runtime_over(Rc::new(prefs.clone()), tasks);
    runtime.start();
    runtime.register_apps(tools);
    tasks.run_until_stalled();
    runtime
}

#[test]
fn singleton_open_twice_yields_one_instance() {
    let prefs = MemoryPrefsStore::default();
    let tasks = ManualTaskHost::new();
    let runtime = boot(&prefs, &tasks, vec![net()]);

    let first = runtime.host().open(net()).expect("opened");
    let second = runtime.host().open(net()).expect("opened");

    assert_eq!(first, second);
    assert_eq!(runtime.host().open_apps().len(), 1);
}

fn minimized_net_session() -> MemoryPrefsStore {
    let keys = StorageKeys::default();
    MemoryPrefsStore::with_entries([
        (keys.open_apps.clone(), json!([{"id": "net", "minimized": true}]).to_string()),
        (
            keys.minimized_tools.clone(),
            json!([{
                "instanceId": "net-1700000000000-0badf00d",
                "id": "net",
                "title": "Network",
                "color": "#0af",
                "minimizedAt": 5,
                "modalState": {"height": 420}
            }])
            .to_string(),
        ),
    ])
}

#[test]
fn persisted_minimized_session_restores_with_fresh_ids_and_relinked_icon() {
    let prefs = minimized_net_session();
    let tasks = ManualTaskHost::new();
    let runtime = boot(&prefs, &tasks, vec![net(), logs()]);

    let apps = runtime.host().open_apps();
    assert_eq!(apps.len(), 1);
    assert_eq!(apps[0].id, ToolId::trusted("net"));
    assert!(apps[0].minimized);
    assert_ne!(
        apps[0].instance_id,
        InstanceId::trusted("net-1700000000000-0badf00d")
    );
    assert!(!runtime.host().is_any_open());

    let icons = runtime.minimized_tools().tools();
    assert_eq!(icons.len(), 1);
    assert_eq!(icons[0].instance_id, apps[0].instance_id);
    assert_eq!(icons[0].icon, Some(IconNode::new("globe")));

    assert!(runtime.restore_panel(&apps[0].instance_id));
    let restored = runtime
        .host()
        .instance(&apps[0].instance_id)
        .expect("instance");
    assert!(!restored.minimized);
    assert_eq!(restored.restore_state, Some(json!({"height": 420})));
}

#[test]
fn icons_loaded_before_registration_pick_up_the_tool_icon() {
    let prefs = minimized_net_session();
    let tasks = ManualTaskHost::new();
    let runtime = runtime_over(Rc::new(prefs.clone()), &tasks);
    runtime.start();
    tasks.run_until_stalled();
    assert_eq!(runtime.minimized_tools().tools()[0].icon, None);

    runtime.register_apps(vec![net()]);
    tasks.run_until_stalled();

    let apps = runtime.host().open_apps();
    let icons = runtime.minimized_tools().tools();
    assert_eq!(icons.len(), 1);
    assert_eq!(icons[0].instance_id, apps[0].instance_id);
    assert_eq!(icons[0].icon, Some(IconNode::new("globe")));
}

#[test]
fn restore_is_deferred_until_tools_are_registered() {
    let keys = StorageKeys::default();
    let prefs = MemoryPrefsStore::with_entries([(keys.open_apps.clone(), r#"["net","gone"]"#)]);
    let tasks = ManualTaskHost::new();
    let runtime = runtime_over(Rc::new(prefs), &tasks);

    runtime.start();
    tasks.run_until_stalled();
    assert!(runtime.host().open_apps().is_empty());
    assert!(!runtime.host().is_restored());

    runtime.register_apps(vec![net()]);
    let ids: Vec<_> = runtime
        .host()
        .open_apps()
        .into_iter()
        .map(|app| (app.id, app.minimized))
        .collect();
    assert_eq!(ids, vec![(ToolId::trusted("net"), false)]);
    assert!(runtime.host().is_restored());
}

#[test]
fn session_round_trips_tool_ids_and_minimized_flags() {
    let prefs = MemoryPrefsStore::default();
    let tasks = ManualTaskHost::new();
    let first = boot(&prefs, &tasks, vec![net(), logs()]);

    first.host().open(net());
    let logs_id = first.host().open(logs()).expect("opened");
    assert!(first.minimize_panel(&logs_id, Some(json!({"width": 300}))));
    tasks.advance(Duration::from_millis(300));
    first.dispose();

    let second = boot(&prefs, &tasks, vec![net(), logs()]);
    let session: Vec<_> = second
        .host()
        .open_apps()
        .into_iter()
        .map(|app| (app.id.as_str().to_string(), app.minimized))
        .collect();
    assert_eq!(
        session,
        vec![("net".to_string(), false), ("logs".to_string(), true)]
    );

    let icons = second.minimized_tools().tools();
    assert_eq!(icons.len(), 1);
    assert_eq!(icons[0].title, "Logs");
    assert_eq!(icons[0].modal_state, Some(json!({"width": 300})));
    assert_ne!(icons[0].instance_id, logs_id);
    assert_eq!(
        Some(icons[0].instance_id.clone()),
        second.host().open_apps().last().map(|app| app.instance_id.clone())
    );
}

#[test]
fn open_apps_writes_are_last_write_wins_after_a_quiet_period() {
    let prefs = MemoryPrefsStore::default();
    let tasks = ManualTaskHost::new();
    let runtime = boot(&prefs, &tasks, vec![net(), logs()]);
    let key = StorageKeys::default().open_apps;

    runtime.host().open(logs());
    tasks.advance(Duration::from_millis(100));
    runtime.host().close(None);
    tasks.advance(Duration::from_millis(100));
    runtime.host().open(net());
    tasks.advance(Duration::from_millis(299));
    assert_eq!(prefs.raw(&key), None);

    tasks.advance(Duration::from_millis(1));
    let stored: Vec<PersistedOpenApp> =
        serde_json::from_str(&prefs.raw(&key).expect("written")).expect("decode");
    assert_eq!(
        stored,
        vec![PersistedOpenApp {
            id: ToolId::trusted("net"),
            minimized: false,
        }]
    );
}

#[test]
fn rejecting_storage_still_yields_a_usable_empty_registry() {
    let tasks = ManualTaskHost::new();
    let runtime = runtime_over(Rc::new(FailingPrefsStore::default()), &tasks);
    runtime.start();
    runtime.register_apps(vec![net()]);
    tasks.run_until_stalled();

    assert!(runtime.host().is_restored());
    assert!(runtime.host().open_apps().is_empty());
    assert!(!runtime.host().is_any_open());

    let id = runtime.host().open(net()).expect("opened");
    tasks.advance(Duration::from_secs(1));
    assert!(runtime.host().instance(&id).is_some());
}

#[test]
fn stored_dial_blob_with_eight_enabled_keeps_the_first_six() {
    let keys = StorageKeys::default();
    let dial: serde_json::Map<String, serde_json::Value> = (0..8)
        .map(|i| (format!("tool{i}"), json!(true)))
        .collect();
    let prefs = MemoryPrefsStore::with_entries([(
        keys.settings.clone(),
        json!({"dialTools": dial}).to_string(),
    )]);
    let tasks = ManualTaskHost::new();
    let tools: Vec<_> = (0..8)
        .map(|i| {
            ToolDefinition::new(
                ToolId::trusted(format!("tool{i}")),
                format!("Tool {i}"),
                ToolModule::new(mount_nothing),
            )
            .slot(ToolSlot::Dial)
        })
        .collect();
    let runtime = boot(&prefs, &tasks, tools);

    let enabled: Vec<_> = runtime
        .settings()
        .enabled_dial_tools()
        .into_iter()
        .map(|id| id.as_str().to_string())
        .collect();
    assert_eq!(enabled, vec!["tool0", "tool1", "tool2", "tool3", "tool4", "tool5"]);
    assert!(runtime.settings().is_dial_full());

    let saved = block_on(persistence::load_settings(&prefs, &keys));
    assert!(saved.is_some(), "stored blob is left for the next session");
}
