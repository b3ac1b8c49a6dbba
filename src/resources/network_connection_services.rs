//! `syntropystack_network_connection_services` resource.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

use super::{decode_state, encode_state, parse_id, Resource};
use crate::client::models::SubnetChange;
use crate::client::SyntropyClient;
use crate::error::ProviderError;
use crate::flatten::subnet_enabled;
use crate::schema::{Attribute, AttributeFlags, AttributeType, Diagnostic, Schema};

/// Subnet enablement for a set of services on one connection.
pub struct NetworkConnectionServicesResource;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ServiceToggle {
    /// Subnet id.
    id: i64,
    enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ServicesState {
    connection_group_id: i64,
    services: Vec<ServiceToggle>,
}

impl ServicesState {
    fn changes(&self, force_disabled: bool) -> Vec<SubnetChange> {
        self.services
            .iter()
            .map(|s| SubnetChange {
                agent_service_subnet_id: s.id,
                is_enabled: s.enabled && !force_disabled,
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl Resource for NetworkConnectionServicesResource {
    fn type_name(&self) -> &'static str {
        "syntropystack_network_connection_services"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .describe("Enables services inside connection group")
            .attribute(
                "connection_group_id",
                Attribute::int64(AttributeFlags::REQUIRED)
                    .describe("Unique identifier for the connection")
                    .force_new(),
            )
            .attribute(
                "services",
                Attribute::set(
                    AttributeType::object([("id", AttributeType::Int64), ("enabled", AttributeType::Bool)]),
                    AttributeFlags::REQUIRED,
                )
                .describe("List of network connection services to enable"),
            )
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        let mut diagnostics = crate::validation::validate(&self.schema(), config);
        if config
            .get("services")
            .and_then(Value::as_array)
            .is_some_and(|s| s.is_empty())
        {
            diagnostics.push(Diagnostic::error("services must contain at least 1 item").with_attribute("services"));
        }
        diagnostics
    }

    #[instrument(skip_all, name = "connection_services.create")]
    async fn create(&self, client: &SyntropyClient, planned: Value) -> Result<Value, ProviderError> {
        let state: ServicesState = decode_state(planned)?;
        client
            .update_connection_services(state.connection_group_id, &state.changes(false))
            .await?;
        encode_state(&state)
    }

    #[instrument(skip_all, name = "connection_services.read")]
    async fn read(&self, client: &SyntropyClient, state: Value) -> Result<Option<Value>, ProviderError> {
        let mut state: ServicesState = decode_state(state)?;
        let connection = client
            .connection_services_for(state.connection_group_id)
            .await?;
        for service in &mut state.services {
            service.enabled = subnet_enabled(&connection, service.id);
        }
        encode_state(&state).map(Some)
    }

    #[instrument(skip_all, name = "connection_services.update")]
    async fn update(&self, client: &SyntropyClient, _prior: Value, planned: Value) -> Result<Value, ProviderError> {
        let state: ServicesState = decode_state(planned)?;
        client
            .update_connection_services(state.connection_group_id, &state.changes(false))
            .await?;
        encode_state(&state)
    }

    /// Disables every listed subnet.
    #[instrument(skip_all, name = "connection_services.delete")]
    async fn delete(&self, client: &SyntropyClient, state: Value) -> Result<(), ProviderError> {
        let state: ServicesState = decode_state(state)?;
        client
            .update_connection_services(state.connection_group_id, &state.changes(true))
            .await?;
        Ok(())
    }

    /// The import id is the connection group id. Every subnet the connection
    /// lists is imported with its current flag.
    async fn import(&self, client: &SyntropyClient, id: &str) -> Result<Value, ProviderError> {
        let group_id = parse_id(id, "connection group id")?;
        let connection = client.connection_services_for(group_id).await?;
        let services: Vec<ServiceToggle> = connection
            .agent_connection_subnets
            .iter()
            .map(|s| ServiceToggle {
                id: s.agent_service_subnet_id,
                enabled: s.agent_connection_subnet_is_enabled,
            })
            .collect();
        debug!(services = services.len(), "connection services imported");
        encode_state(&ServicesState {
            connection_group_id: group_id,
            services,
        })
    }
}
