//! `syntropystack_network_connection_service` data source.
//!
//! Lists the services and subnets exposed on one connection as flat records,
//! optionally narrowed by agent, service name, service type or subnet.

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, instrument};
use uuid::Uuid;

use super::DataSource;
use crate::client::SyntropyClient;
use crate::error::ProviderError;
use crate::flatten::{flatten, ServiceFilter};
use crate::schema::{Attribute, AttributeFlags, AttributeType, Block, NestedBlock, Schema};

/// Flattened services and subnets of one connection.
pub struct NetworkConnectionServiceDataSource;

#[derive(Debug, Deserialize)]
struct ServiceQuery {
    connection_group_id: i64,
    #[serde(default)]
    filter: Option<FilterConfig>,
}

#[derive(Debug, Default, Deserialize)]
struct FilterConfig {
    #[serde(default)]
    agent_id: Option<i64>,
    #[serde(default)]
    service_name_substring: Option<String>,
    #[serde(default)]
    service_type: Option<String>,
    #[serde(default)]
    subnet_id: Option<i64>,
}

impl From<FilterConfig> for ServiceFilter {
    fn from(config: FilterConfig) -> Self {
        let mut filter = ServiceFilter::new();
        if let Some(agent_id) = config.agent_id {
            filter = filter.agent_id(agent_id);
        }
        if let Some(needle) = config.service_name_substring {
            filter = filter.service_name_substring(needle);
        }
        if let Some(service_type) = config.service_type {
            filter = filter.service_type(service_type);
        }
        if let Some(subnet_id) = config.subnet_id {
            filter = filter.subnet_id(subnet_id);
        }
        filter
    }
}

fn record_type() -> AttributeType {
    AttributeType::object([
        ("agent_id", AttributeType::Int64),
        ("service_id", AttributeType::Int64),
        ("service_name", AttributeType::String),
        ("service_type", AttributeType::String),
        ("service_enabled", AttributeType::Bool),
        ("subnet_id", AttributeType::Int64),
        ("subnet_ip", AttributeType::String),
        ("subnet_enabled", AttributeType::Bool),
    ])
}

#[async_trait::async_trait]
impl DataSource for NetworkConnectionServiceDataSource {
    fn type_name(&self) -> &'static str {
        "syntropystack_network_connection_service"
    }

    fn schema(&self) -> Schema {
        let filter = Block::new()
            .attribute("agent_id", Attribute::int64(AttributeFlags::OPTIONAL).describe("Agent running the service"))
            .attribute(
                "service_name_substring",
                Attribute::string(AttributeFlags::OPTIONAL).describe("Part of the service name"),
            )
            .attribute("service_type", Attribute::string(AttributeFlags::OPTIONAL).describe("Service type"))
            .attribute("subnet_id", Attribute::int64(AttributeFlags::OPTIONAL).describe("Subnet ID"));

        Schema::v0()
            .describe("Lists services and subnets exposed on a connection")
            .attribute("id", Attribute::string(AttributeFlags::COMPUTED))
            .attribute(
                "connection_group_id",
                Attribute::int64(AttributeFlags::REQUIRED).describe("Unique identifier for the connection"),
            )
            .block("filter", NestedBlock::single(filter))
            .attribute(
                "services",
                Attribute::list(record_type(), AttributeFlags::COMPUTED).describe("Matching subnets"),
            )
    }

    #[instrument(skip_all, name = "connection_service.read")]
    async fn read(&self, client: &SyntropyClient, config: Value) -> Result<Value, ProviderError> {
        let query: ServiceQuery = serde_json::from_value(config.clone())?;
        let connection = client
            .connection_services_for(query.connection_group_id)
            .await?;

        let filter = ServiceFilter::from(query.filter.unwrap_or_default());
        let records = filter.apply(flatten(&connection));
        debug!(
            connection_group_id = query.connection_group_id,
            matches = records.len(),
            "connection services flattened"
        );

        let mut state = config;
        state["id"] = json!(Uuid::new_v4().to_string());
        state["services"] = records
            .iter()
            .map(|r| {
                json!({
                    "agent_id": r.agent_id,
                    "service_id": r.service_id,
                    "service_name": r.service_name,
                    "service_type": r.service_type,
                    "service_enabled": r.service_enabled,
                    "subnet_id": r.subnet_id,
                    "subnet_ip": r.subnet_ip,
                    "subnet_enabled": r.subnet_enabled,
                })
            })
            .collect();
        Ok(state)
    }
}
