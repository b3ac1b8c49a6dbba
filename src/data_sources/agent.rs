//! `syntropystack_agent` data source: the first agent whose name matches.

use serde_json::Value;
use tracing::instrument;

use super::{agent_record, with_agent_attributes, DataSource};
use crate::client::models::AgentSearchRequest;
use crate::client::SyntropyClient;
use crate::error::ProviderError;
use crate::schema::{Attribute, AttributeFlags, Schema};

/// Looks up one agent by name.
pub struct AgentDataSource;

#[async_trait::async_trait]
impl DataSource for AgentDataSource {
    fn type_name(&self) -> &'static str {
        "syntropystack_agent"
    }

    fn schema(&self) -> Schema {
        with_agent_attributes(
            Schema::v0()
                .describe("Returns a Syntropy agent by name")
                .attribute("name", Attribute::string(AttributeFlags::REQUIRED).describe("Agent name")),
        )
    }

    #[instrument(skip_all, name = "agent_data_source.read")]
    async fn read(&self, client: &SyntropyClient, config: Value) -> Result<Value, ProviderError> {
        let name = config
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| ProviderError::Validation("name is required".to_string()))?;

        let request = AgentSearchRequest {
            take: Some(1),
            search: Some(name.to_string()),
            ..Default::default()
        };
        let agent = client
            .search_agents(&request)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::NotFound(format!("agent named '{}'", name)))?;

        Ok(agent_record(&agent))
    }
}
