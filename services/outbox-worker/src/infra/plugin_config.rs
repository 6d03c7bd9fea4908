//! Per-engine settings read from `PLUGIN_{CODE}_{KEY}` environment variables.

use std::collections::HashMap;
use std::sync::Arc;

/// Where plugin settings come from.
pub trait ConfigSource: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
}

/// The process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl ConfigSource for ProcessEnv {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl ConfigSource for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PluginConfigError {
    #[error("missing required setting {0}")]
    Missing(String),
}

/// Trim, upper-case and collapse every run of non-alphanumerics into `_`.
pub fn normalize_key(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut in_gap = false;
    for c in value.trim().chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_uppercase());
            in_gap = false;
        } else if !in_gap {
            out.push('_');
            in_gap = true;
        }
    }
    out
}

/// Settings reader scoped to one engine code.
#[derive(Clone)]
pub struct PluginConfig {
    prefix: String,
    source: Arc<dyn ConfigSource>,
}

impl PluginConfig {
    pub fn new(engine_code: &str, source: Arc<dyn ConfigSource>) -> Self {
        Self {
            prefix: format!("PLUGIN_{}_", normalize_key(engine_code)),
            source,
        }
    }

    /// Full environment key for `key`.
    pub fn env_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, normalize_key(key))
    }

    /// Value for `key`; blank counts as unset.
    pub fn optional(&self, key: &str) -> Option<String> {
        self.source
            .get(&self.env_key(key))
            .map(|v| v.trim().to_owned())
            .filter(|v| !v.is_empty())
    }

    pub fn optional_or(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_owned())
    }

    pub fn required(&self, key: &str) -> Result<String, PluginConfigError> {
        self.optional(key)
            .ok_or_else(|| PluginConfigError::Missing(self.env_key(key)))
    }
}
