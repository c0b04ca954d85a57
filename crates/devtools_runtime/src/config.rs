//! Runtime configuration: storage namespace, debounce windows, team defaults, and layout.

use std::{collections::BTreeSet, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{bubble::BubbleConfig, minimized::IconLayout, model::ToolId, persistence::StorageKeys};

pub const DEFAULT_STORAGE_NAMESPACE: &str = "devtools";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("config parse failed: {0}")]
    Parse(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Team-supplied default-enabled tool ids per launcher surface.
///
/// `None` means "no team preference"; see [`crate::settings::default_settings`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TeamDefaults {
    pub dial: Option<Vec<ToolId>>,
    pub floating: Option<Vec<ToolId>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DevToolsConfig {
    pub storage_namespace: String,
    pub open_apps_debounce_ms: u64,
    pub minimized_debounce_ms: u64,
    pub bubble_debounce_ms: u64,
    pub team_defaults: TeamDefaults,
    pub icon_layout: IconLayout,
    pub bubble: BubbleConfig,
}

impl Default for DevToolsConfig {
    fn default() -> Self {
        Self {
            storage_namespace: DEFAULT_STORAGE_NAMESPACE.to_string(),
            open_apps_debounce_ms: 300,
            minimized_debounce_ms: 300,
            bubble_debounce_ms: 500,
            team_defaults: TeamDefaults::default(),
            icon_layout: IconLayout::default(),
            bubble: BubbleConfig::default(),
        }
    }
}

impl DevToolsConfig {
    /// Parses and validates a JSON config. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed JSON and [`ConfigError::Invalid`] when a value
    /// fails [`DevToolsConfig::validate`].
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for an empty namespace, non-positive icon or bubble sizes,
    /// a peek handle wider than the bubble, or duplicate ids in a team default list.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage_namespace.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "storage_namespace must not be empty".to_string(),
            ));
        }
        if self.icon_layout.icon_size <= 0.0 || self.icon_layout.spacing < 0.0 {
            return Err(ConfigError::Invalid(
                "icon_layout needs a positive icon_size and non-negative spacing".to_string(),
            ));
        }
        if self.bubble.width <= 0.0 || self.bubble.height <= 0.0 {
            return Err(ConfigError::Invalid(
                "bubble width and height must be positive".to_string(),
            ));
        }
        if self.bubble.peek_width <= 0.0 || self.bubble.peek_width > self.bubble.width {
            return Err(ConfigError::Invalid(
                "bubble peek_width must be within (0, width]".to_string(),
            ));
        }
        for (surface, ids) in [
            ("dial", &self.team_defaults.dial),
            ("floating", &self.team_defaults.floating),
        ] {
            let Some(ids) = ids else {
                continue;
            };
            let mut seen = BTreeSet::new();
            if let Some(dup) = ids.iter().find(|id| !seen.insert(*id)) {
                return Err(ConfigError::Invalid(format!(
                    "team {surface} defaults list `{dup}` twice"
                )));
            }
        }
        Ok(())
    }

    pub fn storage_keys(&self) -> StorageKeys {
        StorageKeys::new(&self.storage_namespace)
    }

    pub fn open_apps_debounce(&self) -> Duration {
        Duration::from_millis(self.open_apps_debounce_ms)
    }

    pub fn minimized_debounce(&self) -> Duration {
        Duration::from_millis(self.minimized_debounce_ms)
    }

    pub fn bubble_debounce(&self) -> Duration {
        Duration::from_millis(self.bubble_debounce_ms)
    }
}
