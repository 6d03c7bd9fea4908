//! Installed form engines, keyed by code.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use crate::domain::engine::{EngineAdapterResolver, FormEngineAdapter};
use crate::error::SyncError;
use crate::infra::formio::{FORMIO_V5_CODE, FormioV5Adapter, FormioV5Config};
use crate::infra::plugin_config::{ConfigSource, PluginConfig, PluginConfigError};

pub type AdapterFactory =
    fn(&PluginConfig) -> Result<Arc<dyn FormEngineAdapter>, PluginConfigError>;

/// Static description of an engine this build can install.
#[derive(Clone, Copy)]
pub struct EngineDefinition {
    pub code: &'static str,
    pub name: &'static str,
    pub version: &'static str,
    pub factory: AdapterFactory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineMetadata {
    pub code: String,
    pub name: String,
    pub version: String,
}

fn formio_v5(config: &PluginConfig) -> Result<Arc<dyn FormEngineAdapter>, PluginConfigError> {
    Ok(Arc::new(FormioV5Adapter::new(FormioV5Config::load(config)?)))
}

/// Engines shipped with the worker.
pub const BUILTIN_ENGINES: &[EngineDefinition] = &[EngineDefinition {
    code: FORMIO_V5_CODE,
    name: "Form.io v5",
    version: "v5",
    factory: formio_v5,
}];

#[derive(Clone, Default)]
pub struct EngineRegistry {
    adapters: BTreeMap<String, (EngineMetadata, Arc<dyn FormEngineAdapter>)>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Instantiate every definition with its `PLUGIN_{CODE}_*` settings.
    pub fn from_definitions(
        definitions: &[EngineDefinition],
        source: Arc<dyn ConfigSource>,
    ) -> Result<Self, PluginConfigError> {
        let mut registry = Self::new();
        for def in definitions {
            let config = PluginConfig::new(def.code, Arc::clone(&source));
            let adapter = (def.factory)(&config)?;
            registry.install(
                EngineMetadata {
                    code: def.code.to_owned(),
                    name: def.name.to_owned(),
                    version: def.version.to_owned(),
                },
                adapter,
            );
            tracing::info!(engine_code = def.code, "form engine installed");
        }
        Ok(registry)
    }

    /// Install or replace the adapter for `metadata.code`.
    pub fn install(&mut self, metadata: EngineMetadata, adapter: Arc<dyn FormEngineAdapter>) {
        self.adapters
            .insert(metadata.code.clone(), (metadata, adapter));
    }

    pub fn catalog(&self) -> Vec<EngineMetadata> {
        self.adapters.values().map(|(m, _)| m.clone()).collect()
    }
}

impl EngineAdapterResolver for EngineRegistry {
    fn resolve(&self, engine_code: &str) -> Result<Arc<dyn FormEngineAdapter>, SyncError> {
        self.adapters
            .get(engine_code)
            .map(|(_, adapter)| Arc::clone(adapter))
            .ok_or_else(|| SyncError::EngineNotInstalled(engine_code.to_owned()))
    }
}
