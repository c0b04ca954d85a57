//! `localStorage`-backed preference store.
//!
//! The browser API is synchronous, so every call resolves immediately. Off wasm32 the store
//! behaves like [`NoopPrefsStore`](crate::NoopPrefsStore).

use crate::storage::prefs::{PrefsStore, PrefsStoreFuture};

#[derive(Debug, Clone, Copy, Default)]
/// Browser preference store backed by `window.localStorage`.
pub struct WebPrefsStore;

#[cfg(target_arch = "wasm32")]
fn with_storage<T>(
    op: &str,
    run: impl FnOnce(&web_sys::Storage) -> Result<T, wasm_bindgen::JsValue>,
) -> Result<T, String> {
    let storage = web_sys::window()
        .and_then(|window| window.local_storage().ok().flatten())
        .ok_or_else(|| "localStorage unavailable".to_string())?;
    run(&storage).map_err(|err| format!("localStorage {op} failed: {err:?}"))
}

impl PrefsStore for WebPrefsStore {
    fn load_pref<'a>(
        &'a self,
        key: &'a str,
    ) -> PrefsStoreFuture<'a, Result<Option<String>, String>> {
        #[cfg(target_arch = "wasm32")]
        let result = with_storage("get_item", |storage| storage.get_item(key));
        #[cfg(not(target_arch = "wasm32"))]
        let result = {
            let _ = key;
            Ok(None)
        };
        Box::pin(async move { result })
    }

    fn save_pref<'a>(
        &'a self,
        key: &'a str,
        raw_json: &'a str,
    ) -> PrefsStoreFuture<'a, Result<(), String>> {
        // Quota errors surface here as `set_item failed`.
        #[cfg(target_arch = "wasm32")]
        let result = with_storage("set_item", |storage| storage.set_item(key, raw_json));
        #[cfg(not(target_arch = "wasm32"))]
        let result = {
            let _ = (key, raw_json);
            Ok(())
        };
        Box::pin(async move { result })
    }

    fn delete_pref<'a>(&'a self, key: &'a str) -> PrefsStoreFuture<'a, Result<(), String>> {
        #[cfg(target_arch = "wasm32")]
        let result = with_storage("remove_item", |storage| storage.remove_item(key));
        #[cfg(not(target_arch = "wasm32"))]
        let result = {
            let _ = key;
            Ok(())
        };
        Box::pin(async move { result })
    }
}
