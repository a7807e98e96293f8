/// Configuration for the history engine.
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Default entry limit: 0 keeps every committed entry.
/// Set a positive depth to evict the oldest entries past it.
const DEFAULT_MAX_DEPTH: usize = 0;

/// Environment variable overriding `max_depth`.
pub const MAX_DEPTH_ENV: &str = "DOCGRAPH_MAX_HISTORY_DEPTH";

/// Configuration for the history engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Max committed entries (0 = unlimited).
    pub max_depth: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl HistoryConfig {
    /// A configuration without a depth limit. Same as the default.
    pub fn unlimited() -> Self {
        Self { max_depth: 0 }
    }

    /// A configuration keeping at most `max_depth` committed entries.
    pub fn bounded(max_depth: usize) -> Self {
        Self { max_depth }
    }

    /// Loads config from a JSON file at `path`.
    /// Returns defaults on any error (missing file, parse error, etc.).
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            tracing::debug!("No history config at {}, using defaults", path.display());
            return Self::default();
        }
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<HistoryConfig>(&contents) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!("Failed to parse history config at {}: {e}", path.display());
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read history config at {}: {e}", path.display());
            }
        }
        Self::default()
    }

    /// Saves config to `path` as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<(), std::io::Error> {
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    /// Applies overrides from the process environment.
    pub fn with_env_overrides(self) -> Self {
        self.with_max_depth_override(std::env::var(MAX_DEPTH_ENV).ok().as_deref())
    }

    fn with_max_depth_override(mut self, raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return self;
        };
        match raw.trim().parse::<usize>() {
            Ok(depth) => self.max_depth = depth,
            Err(e) => tracing::warn!("Ignoring invalid {MAX_DEPTH_ENV}={raw:?}: {e}"),
        }
        self
    }
}
