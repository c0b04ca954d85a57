//! Host platform contracts shared by the dev-tools runtime and its adapters.
//!
//! This crate has no UI dependency. It exposes the string-keyed preference storage boundary, the
//! task/timer host used for deferred work, and time helpers. Concrete browser storage lives behind
//! [`WebPrefsStore`], which is only backed by `localStorage` on `wasm32`.

#![warn(missing_docs, rustdoc::broken_intra_doc_links)]

pub mod storage;
pub mod tasks;
pub mod time;

pub use storage::prefs::{
    FailingPrefsStore, MemoryPrefsStore, NoopPrefsStore, PrefsStore, PrefsStoreFuture,
};
pub use storage::web_prefs::WebPrefsStore;
pub use tasks::{InertTaskHost, ManualTaskHost, TaskFuture, TaskHost, TimerId};
pub use time::{next_after, next_monotonic_timestamp_ms, unix_time_ms_now};
