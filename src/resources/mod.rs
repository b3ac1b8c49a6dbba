//! Managed resources.
//!
//! Each resource owns its schema and translates between its JSON state and the
//! platform API. The provider looks resources up by type name and hands them
//! the configured [`SyntropyClient`].

mod agent;
mod network_connection;
mod network_connection_mesh;
mod network_connection_services;
mod network_connection_subnet;

pub use agent::AgentResource;
pub use network_connection::NetworkConnectionResource;
pub use network_connection_mesh::NetworkConnectionMeshResource;
pub use network_connection_services::NetworkConnectionServicesResource;
pub use network_connection_subnet::NetworkConnectionSubnetResource;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::client::SyntropyClient;
use crate::error::ProviderError;
use crate::schema::{Diagnostic, Schema};
use crate::types::PlanResult;

/// A remote object managed through create, read, update and delete.
#[async_trait::async_trait]
pub trait Resource: Send + Sync {
    /// Type name as used in configuration, e.g. `syntropystack_agent`.
    fn type_name(&self) -> &'static str;

    fn schema(&self) -> Schema;

    /// Schema validation plus any resource specific checks.
    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        crate::validation::validate(&self.schema(), config)
    }

    fn plan(&self, prior: Option<&Value>, proposed: &Value) -> PlanResult {
        crate::plan::plan(&self.schema(), prior, proposed)
    }

    async fn create(&self, client: &SyntropyClient, planned: Value) -> Result<Value, ProviderError>;

    /// Refresh `state` from the API. `None` means the object is gone or has
    /// drifted and must be recreated.
    async fn read(&self, client: &SyntropyClient, state: Value) -> Result<Option<Value>, ProviderError>;

    async fn update(&self, client: &SyntropyClient, prior: Value, planned: Value) -> Result<Value, ProviderError>;

    async fn delete(&self, client: &SyntropyClient, state: Value) -> Result<(), ProviderError>;

    /// Build the state of an existing object from its import id.
    async fn import(&self, client: &SyntropyClient, id: &str) -> Result<Value, ProviderError> {
        let _ = (client, id);
        Err(ProviderError::Unimplemented(format!(
            "import is not supported for {}",
            self.type_name()
        )))
    }
}

/// Every resource this provider serves.
pub fn all() -> Vec<Box<dyn Resource>> {
    vec![
        Box::new(AgentResource),
        Box::new(NetworkConnectionResource),
        Box::new(NetworkConnectionMeshResource),
        Box::new(NetworkConnectionServicesResource),
        Box::new(NetworkConnectionSubnetResource),
    ]
}

pub(crate) fn decode_state<T: DeserializeOwned>(value: Value) -> Result<T, ProviderError> {
    Ok(serde_json::from_value(value)?)
}

pub(crate) fn encode_state<T: Serialize>(state: &T) -> Result<Value, ProviderError> {
    Ok(serde_json::to_value(state)?)
}

/// Parse a numeric import id.
pub(crate) fn parse_id(id: &str, what: &str) -> Result<i64, ProviderError> {
    id.trim()
        .parse()
        .map_err(|_| ProviderError::Validation(format!("{} must be an integer, got '{}'", what, id)))
}
