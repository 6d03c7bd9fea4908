use async_trait::async_trait;

use crate::domain::engine::{EngineRef, FormEngineAdapter, FormVersionProvision, SubmissionProvision};
use crate::infra::plugin_config::{PluginConfig, PluginConfigError};

pub const FORMIO_V5_CODE: &str = "formio-v5";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormioV5Config {
    pub api_base_url: String,
    pub project_path: Option<String>,
    pub version: String,
}

impl FormioV5Config {
    pub fn load(config: &PluginConfig) -> Result<Self, PluginConfigError> {
        Ok(Self {
            api_base_url: config.required("API_BASE_URL")?,
            project_path: config.optional("PROJECT_PATH"),
            version: config.optional_or("VERSION", "v5"),
        })
    }
}

/// Form.io v5 adapter.
///
/// Provisioning is a placeholder: references are derived from the aggregate
/// id, which also makes repeated calls idempotent.
#[derive(Debug, Clone)]
pub struct FormioV5Adapter {
    pub config: FormioV5Config,
}

impl FormioV5Adapter {
    pub fn new(config: FormioV5Config) -> Self {
        Self { config }
    }
}

#[async_trait]
impl FormEngineAdapter for FormioV5Adapter {
    async fn create_form_version_schema(
        &self,
        input: FormVersionProvision,
    ) -> anyhow::Result<EngineRef> {
        Ok(EngineRef::new(format!("formio-schema-{}", input.form_version_id)))
    }

    async fn create_submission_record(
        &self,
        input: SubmissionProvision,
    ) -> anyhow::Result<EngineRef> {
        Ok(EngineRef::new(format!("formio-submission-{}", input.submission_id)))
    }
}
