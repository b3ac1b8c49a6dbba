//! `syntropystack_network_connection_subnet` resource.
//!
//! Import ids have the form `<connection_group_id>:<subnet_id>`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::instrument;

use super::{decode_state, encode_state, parse_id, Resource};
use crate::client::models::SubnetChange;
use crate::client::SyntropyClient;
use crate::error::ProviderError;
use crate::flatten::subnet_enabled;
use crate::schema::{Attribute, AttributeFlags, Schema};

/// Enablement of a single subnet on a connection.
pub struct NetworkConnectionSubnetResource;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct SubnetState {
    connection_group_id: i64,
    subnet_id: i64,
    enable: bool,
}

impl SubnetState {
    async fn apply(&self, client: &SyntropyClient, enable: bool) -> Result<(), ProviderError> {
        let change = SubnetChange {
            agent_service_subnet_id: self.subnet_id,
            is_enabled: enable,
        };
        client
            .update_connection_services(self.connection_group_id, &[change])
            .await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl Resource for NetworkConnectionSubnetResource {
    fn type_name(&self) -> &'static str {
        "syntropystack_network_connection_subnet"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .describe("Enables connection services inside connection group")
            .attribute(
                "connection_group_id",
                Attribute::int64(AttributeFlags::REQUIRED)
                    .describe("Unique identifier for the connection")
                    .force_new(),
            )
            .attribute(
                "subnet_id",
                Attribute::int64(AttributeFlags::REQUIRED)
                    .describe("Subnet ID")
                    .force_new(),
            )
            .attribute(
                "enable",
                Attribute::bool(AttributeFlags::REQUIRED).describe("Should the subnet be enabled?"),
            )
    }

    #[instrument(skip_all, name = "connection_subnet.create")]
    async fn create(&self, client: &SyntropyClient, planned: Value) -> Result<Value, ProviderError> {
        let state: SubnetState = decode_state(planned)?;
        state.apply(client, state.enable).await?;
        encode_state(&state)
    }

    #[instrument(skip_all, name = "connection_subnet.read")]
    async fn read(&self, client: &SyntropyClient, state: Value) -> Result<Option<Value>, ProviderError> {
        let mut state: SubnetState = decode_state(state)?;
        let connection = client
            .connection_services_for(state.connection_group_id)
            .await?;
        state.enable = subnet_enabled(&connection, state.subnet_id);
        encode_state(&state).map(Some)
    }

    #[instrument(skip_all, name = "connection_subnet.update")]
    async fn update(&self, client: &SyntropyClient, _prior: Value, planned: Value) -> Result<Value, ProviderError> {
        let state: SubnetState = decode_state(planned)?;
        state.apply(client, state.enable).await?;
        encode_state(&state)
    }

    #[instrument(skip_all, name = "connection_subnet.delete")]
    async fn delete(&self, client: &SyntropyClient, state: Value) -> Result<(), ProviderError> {
        let state: SubnetState = decode_state(state)?;
        state.apply(client, false).await
    }

    /// The import id is `<connection_group_id>:<subnet_id>`.
    async fn import(&self, client: &SyntropyClient, id: &str) -> Result<Value, ProviderError> {
        let (group, subnet) = id.split_once(':').ok_or_else(|| {
            ProviderError::Validation(format!(
                "expected import id '<connection_group_id>:<subnet_id>', got '{}'",
                id
            ))
        })?;
        let state = SubnetState {
            connection_group_id: parse_id(group, "connection_group_id")?,
            subnet_id: parse_id(subnet, "subnet_id")?,
            enable: false,
        };
        self.read(client, encode_state(&state)?)
            .await?
            .ok_or_else(|| ProviderError::NotFound(format!("subnet {}", id)))
    }
}
