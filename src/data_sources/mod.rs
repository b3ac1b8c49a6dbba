//! Read-only data sources.

mod agent;
mod agent_search;
mod network_connection_service;

pub use agent::AgentDataSource;
pub use agent_search::AgentSearchDataSource;
pub use network_connection_service::NetworkConnectionServiceDataSource;

use serde_json::{json, Value};

use crate::client::models::Agent;
use crate::client::SyntropyClient;
use crate::error::ProviderError;
use crate::schema::{Attribute, AttributeFlags, AttributeType, Diagnostic, Schema};

/// A lookup against the platform API.
#[async_trait::async_trait]
pub trait DataSource: Send + Sync {
    fn type_name(&self) -> &'static str;

    fn schema(&self) -> Schema;

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        crate::validation::validate(&self.schema(), config)
    }

    /// Resolve `config` into the full data source state.
    async fn read(&self, client: &SyntropyClient, config: Value) -> Result<Value, ProviderError>;
}

/// Every data source this provider serves.
pub fn all() -> Vec<Box<dyn DataSource>> {
    vec![
        Box::new(AgentDataSource),
        Box::new(AgentSearchDataSource),
        Box::new(NetworkConnectionServiceDataSource),
    ]
}

/// Agent fields shared by the agent lookups, keyed by attribute name.
fn agent_fields() -> Vec<(&'static str, AttributeType)> {
    vec![
        ("id", AttributeType::Int64),
        ("name", AttributeType::String),
        ("public_ipv4", AttributeType::String),
        ("status", AttributeType::String),
        ("is_online", AttributeType::Bool),
        ("version", AttributeType::String),
        ("location_country", AttributeType::String),
        ("location_city", AttributeType::String),
        ("device_id", AttributeType::String),
        ("is_virtual", AttributeType::Bool),
        ("type", AttributeType::String),
        ("modified_at", AttributeType::String),
        (
            "tags",
            AttributeType::list(AttributeType::object([
                ("id", AttributeType::Int64),
                ("name", AttributeType::String),
            ])),
        ),
        (
            "provider",
            AttributeType::object([("id", AttributeType::Int64), ("name", AttributeType::String)]),
        ),
    ]
}

/// Object type of one agent record.
fn agent_record_type() -> AttributeType {
    AttributeType::object(agent_fields())
}

/// Adds every agent field except `name` as a computed attribute.
fn with_agent_attributes(schema: Schema) -> Schema {
    agent_fields()
        .into_iter()
        .filter(|(name, _)| *name != "name")
        .fold(schema, |schema, (name, ty)| {
            schema.attribute(name, Attribute::new(ty, AttributeFlags::COMPUTED))
        })
}

/// Agent as exposed in data source state.
fn agent_record(agent: &Agent) -> Value {
    json!({
        "id": agent.agent_id,
        "name": agent.agent_name,
        "public_ipv4": agent.agent_public_ipv4,
        "status": agent.agent_status.clone().unwrap_or_default(),
        "is_online": agent.agent_is_online,
        "version": agent.agent_version,
        "location_country": agent.agent_location_country.clone().unwrap_or_default(),
        "location_city": agent.agent_location_city.clone().unwrap_or_default(),
        "device_id": agent.agent_device_id,
        "is_virtual": agent.agent_is_virtual,
        "type": agent.agent_type,
        "modified_at": agent.agent_modified_at.map(|t| t.to_rfc3339()).unwrap_or_default(),
        "tags": agent
            .agent_tags
            .iter()
            .map(|t| json!({"id": t.agent_tag_id, "name": t.agent_tag_name}))
            .collect::<Vec<_>>(),
        "provider": agent.agent_provider.as_ref().map(|p| json!({
            "id": p.agent_provider_id,
            "name": p.agent_provider_name,
        })),
    })
}
