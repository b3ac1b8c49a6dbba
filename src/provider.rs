//! The SyntropyStack provider.
//!
//! [`SyntropyProvider`] routes every host call to the resource or data source
//! registered under the requested type name. The API client is built once by
//! `configure` and shared by all later calls.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use crate::client::SyntropyClient;
use crate::config::ProviderConfig;
use crate::data_sources::{self, DataSource};
use crate::error::ProviderError;
use crate::resources::{self, Resource};
use crate::schema::{Diagnostic, ProviderSchema};
use crate::server::ProviderService;
use crate::types::{ImportedResource, PlanResult};

/// Provider for SyntropyStack agents and network connections.
pub struct SyntropyProvider {
    resources: BTreeMap<&'static str, Box<dyn Resource>>,
    data_sources: BTreeMap<&'static str, Box<dyn DataSource>>,
    client: RwLock<Option<Arc<SyntropyClient>>>,
}

impl Default for SyntropyProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl SyntropyProvider {
    /// A provider with every resource and data source registered.
    pub fn new() -> Self {
        Self {
            resources: resources::all()
                .into_iter()
                .map(|r| (r.type_name(), r))
                .collect(),
            data_sources: data_sources::all()
                .into_iter()
                .map(|d| (d.type_name(), d))
                .collect(),
            client: RwLock::new(None),
        }
    }

    fn resource(&self, resource_type: &str) -> Result<&dyn Resource, ProviderError> {
        self.resources
            .get(resource_type)
            .map(|r| r.as_ref())
            .ok_or_else(|| ProviderError::UnknownResource(resource_type.to_string()))
    }

    fn data_source(&self, data_source_type: &str) -> Result<&dyn DataSource, ProviderError> {
        self.data_sources
            .get(data_source_type)
            .map(|d| d.as_ref())
            .ok_or_else(|| ProviderError::UnknownResource(data_source_type.to_string()))
    }

    async fn client(&self) -> Result<Arc<SyntropyClient>, ProviderError> {
        self.client
            .read()
            .await
            .clone()
            .ok_or_else(|| ProviderError::Configuration("provider is not configured".to_string()))
    }
}

#[async_trait::async_trait]
impl ProviderService for SyntropyProvider {
    fn schema(&self) -> ProviderSchema {
        ProviderSchema {
            provider: ProviderConfig::schema(),
            resources: self
                .resources
                .iter()
                .map(|(name, r)| (name.to_string(), r.schema()))
                .collect(),
            data_sources: self
                .data_sources
                .iter()
                .map(|(name, d)| (name.to_string(), d.schema()))
                .collect(),
        }
    }

    async fn validate_provider_config(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        Ok(ProviderConfig::check(&config))
    }

    #[instrument(skip_all)]
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let client = match ProviderConfig::resolve(&config).and_then(|c| SyntropyClient::new(&c)) {
            Ok(client) => client,
            Err(e) => {
                return Ok(vec![
                    Diagnostic::error("Unable to create client").with_detail(e.message())
                ])
            },
        };

        info!(api_url = %client.base_url(), "provider configured");
        *self.client.write().await = Some(Arc::new(client));
        Ok(vec![])
    }

    async fn stop(&self) -> Result<(), ProviderError> {
        debug!("dropping API client");
        self.client.write().await.take();
        Ok(())
    }

    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        Ok(self.resource(resource_type)?.validate(&config))
    }

    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        _config: Value,
    ) -> Result<PlanResult, ProviderError> {
        let resource = self.resource(resource_type)?;
        Ok(resource.plan(prior_state.as_ref(), &proposed_state))
    }

    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError> {
        let resource = self.resource(resource_type)?;
        let client = self.client().await?;
        resource.create(&client, planned_state).await
    }

    async fn read(&self, resource_type: &str, current_state: Value) -> Result<Option<Value>, ProviderError> {
        let resource = self.resource(resource_type)?;
        let client = self.client().await?;
        resource.read(&client, current_state).await
    }

    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        let resource = self.resource(resource_type)?;
        let client = self.client().await?;
        resource.update(&client, prior_state, planned_state).await
    }

    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        let resource = self.resource(resource_type)?;
        let client = self.client().await?;
        resource.delete(&client, current_state).await
    }

    async fn import_resource(&self, resource_type: &str, id: &str) -> Result<Vec<ImportedResource>, ProviderError> {
        let resource = self.resource(resource_type)?;
        let client = self.client().await?;
        let state = resource.import(&client, id).await?;
        Ok(vec![ImportedResource::new(resource_type, state)])
    }

    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        Ok(self.data_source(data_source_type)?.validate(&config))
    }

    async fn read_data_source(&self, data_source_type: &str, config: Value) -> Result<Value, ProviderError> {
        let data_source = self.data_source(data_source_type)?;
        let client = self.client().await?;
        data_source.read(&client, config).await
    }
}
