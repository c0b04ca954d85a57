//! Persistence adapters for the registry, minimized stack, settings, and bubble position.
//!
//! Every store writes JSON under its own fixed key so stores never collide. Loads never fail
//! upward: storage errors and malformed blobs are logged and treated as "nothing persisted".

use leptos::logging;
use platform_host::PrefsStore;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

use crate::{
    minimized::PersistedMinimizedTool,
    model::{PersistedOpenApp, Point},
    settings::DevToolsSettings,
};

/// Fixed storage keys, one per store (two for the bubble position).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageKeys {
    pub open_apps: String,
    pub minimized_tools: String,
    pub settings: String,
    pub bubble_x: String,
    pub bubble_y: String,
}

impl StorageKeys {
    pub fn new(namespace: &str) -> Self {
        Self {
            open_apps: format!("{namespace}.open_apps.v1"),
            minimized_tools: format!("{namespace}.minimized_tools.v1"),
            settings: format!("{namespace}.settings.v1"),
            bubble_x: format!("{namespace}.bubble.x.v1"),
            bubble_y: format!("{namespace}.bubble.y.v1"),
        }
    }
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_STORAGE_NAMESPACE)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PersistenceError {
    #[error("storage failed: {0}")]
    Storage(String),
    #[error("decode failed: {0}")]
    Decode(String),
    #[error("encode failed: {0}")]
    Encode(String),
}

/// Loads and decodes one key.
///
/// # Errors
///
/// Returns [`PersistenceError::Storage`] when the read rejects and [`PersistenceError::Decode`]
/// when the stored text is not valid JSON for `T`.
pub async fn load_json<T: DeserializeOwned>(
    store: &dyn PrefsStore,
    key: &str,
) -> Result<Option<T>, PersistenceError> {
    let Some(raw) = store
        .load_pref(key)
        .await
        .map_err(PersistenceError::Storage)?
    else {
        return Ok(None);
    };
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|e| PersistenceError::Decode(format!("`{key}`: {e}")))
}

/// Encodes and saves one key.
///
/// # Errors
///
/// Returns [`PersistenceError::Encode`] or [`PersistenceError::Storage`].
pub async fn save_json<T: Serialize + ?Sized>(
    store: &dyn PrefsStore,
    key: &str,
    value: &T,
) -> Result<(), PersistenceError> {
    let raw = serde_json::to_string(value).map_err(|e| PersistenceError::Encode(e.to_string()))?;
    store
        .save_pref(key, &raw)
        .await
        .map_err(PersistenceError::Storage)
}

async fn load_or_log<T: DeserializeOwned>(
    store: &dyn PrefsStore,
    key: &str,
    what: &str,
) -> Option<T> {
    match load_json(store, key).await {
        Ok(value) => value,
        Err(err) => {
            logging::warn!("load {what} failed, using defaults: {err}");
            None
        }
    }
}

/// Loads the open-instance list, accepting both the legacy `string[]` and `{id, minimized}[]`.
pub async fn load_open_apps(store: &dyn PrefsStore, keys: &StorageKeys) -> Vec<PersistedOpenApp> {
    load_or_log(store, &keys.open_apps, "open apps")
        .await
        .unwrap_or_default()
}

/// # Errors
///
/// See [`save_json`].
pub async fn save_open_apps(
    store: &dyn PrefsStore,
    keys: &StorageKeys,
    apps: &[PersistedOpenApp],
) -> Result<(), PersistenceError> {
    save_json(store, &keys.open_apps, apps).await
}

pub async fn load_minimized_tools(
    store: &dyn PrefsStore,
    keys: &StorageKeys,
) -> Vec<PersistedMinimizedTool> {
    load_or_log(store, &keys.minimized_tools, "minimized tools")
        .await
        .unwrap_or_default()
}

/// # Errors
///
/// See [`save_json`].
pub async fn save_minimized_tools(
    store: &dyn PrefsStore,
    keys: &StorageKeys,
    tools: &[PersistedMinimizedTool],
) -> Result<(), PersistenceError> {
    save_json(store, &keys.minimized_tools, tools).await
}

/// Loads the stored settings blob, or `None` when absent, unreadable, or malformed.
pub async fn load_settings(store: &dyn PrefsStore, keys: &StorageKeys) -> Option<DevToolsSettings> {
    load_or_log(store, &keys.settings, "devtools settings").await
}

/// # Errors
///
/// See [`save_json`].
pub async fn save_settings(
    store: &dyn PrefsStore,
    keys: &StorageKeys,
    settings: &DevToolsSettings,
) -> Result<(), PersistenceError> {
    save_json(store, &keys.settings, settings).await
}

/// Loads the bubble position; both coordinates must be present and finite.
pub async fn load_bubble_position(store: &dyn PrefsStore, keys: &StorageKeys) -> Option<Point> {
    let x: f64 = load_or_log(store, &keys.bubble_x, "bubble x").await?;
    let y: f64 = load_or_log(store, &keys.bubble_y, "bubble y").await?;
    (x.is_finite() && y.is_finite()).then_some(Point::new(x, y))
}

/// # Errors
///
/// See [`save_json`]. The x write is attempted first; a failure skips the y write.
pub async fn save_bubble_position(
    store: &dyn PrefsStore,
    keys: &StorageKeys,
    position: Point,
) -> Result<(), PersistenceError> {
    save_json(store, &keys.bubble_x, &position.x).await?;
    save_json(store, &keys.bubble_y, &position.y).await
}
