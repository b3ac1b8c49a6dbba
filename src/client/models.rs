//! Wire types of the SyntropyStack platform API.
//!
//! Field names follow the API's snake_case JSON. Responses wrap their payload
//! in a `data` member.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Envelope around every API response.
#[derive(Debug, Clone, Deserialize)]
pub struct DataResponse<T> {
    pub data: T,
}

// ---------------------------------------------------------------------------
// Agents
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub agent_id: i64,
    pub agent_name: String,
    #[serde(default)]
    pub agent_public_ipv4: String,
    #[serde(default)]
    pub agent_status: Option<String>,
    #[serde(default)]
    pub agent_is_online: bool,
    #[serde(default)]
    pub agent_version: String,
    #[serde(default)]
    pub agent_location_country: Option<String>,
    #[serde(default)]
    pub agent_location_city: Option<String>,
    #[serde(default)]
    pub agent_device_id: String,
    #[serde(default)]
    pub agent_is_virtual: bool,
    #[serde(default)]
    pub agent_type: String,
    #[serde(default)]
    pub agent_modified_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub agent_tags: Vec<AgentTag>,
    #[serde(default)]
    pub agent_provider: Option<AgentProvider>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentTag {
    pub agent_tag_id: i64,
    pub agent_tag_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentProvider {
    pub agent_provider_id: i64,
    #[serde(default)]
    pub agent_provider_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateAgentRequest {
    pub agent_name: String,
    pub agent_provider_id: i64,
    pub agent_token: String,
    pub agent_tags: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatedAgent {
    pub agent_id: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateAgentRequest {
    pub agent_name: String,
    pub agent_provider_id: i64,
    pub agent_tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RemoveAgentsRequest {
    pub agent_ids: Vec<i64>,
}

/// Body of `POST /agents/search`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AgentSearchRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<AgentFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub take: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AgentFilter {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub agent_id: Vec<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub agent_tag_id: Vec<i64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub agent_provider_id: Vec<i64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub agent_type: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub agent_version: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub agent_tag_name: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub agent_status: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub agent_location_country: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_modified_at_from: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_modified_at_to: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Connections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionAgent {
    pub agent_id: i64,
    #[serde(default)]
    pub agent_name: String,
}

/// A connection group between two agents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConnection {
    pub agent_connection_group_id: i64,
    pub agent_1: ConnectionAgent,
    pub agent_2: ConnectionAgent,
    #[serde(default)]
    pub agent_connection_group_sdn_enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentPair {
    pub agent_1_id: i64,
    pub agent_2_id: i64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct MeshAgent {
    pub agent_id: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateMeshRequest {
    pub agent_ids: Vec<MeshAgent>,
    pub sdn_enabled: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatePointToPointRequest {
    pub agent_pairs: Vec<AgentPair>,
    pub sdn_enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatedConnection {
    #[serde(default)]
    pub agent_connection_group_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConnectionFilter {
    pub agent_pair: Vec<AgentPair>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConnectionSearchRequest {
    pub filter: ConnectionFilter,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConnectionChange {
    pub connection_group_id: i64,
    pub is_sdn_enabled: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateConnectionsRequest {
    pub changes: Vec<ConnectionChange>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RemoveConnectionsRequest {
    pub agent_connection_group_ids: Vec<i64>,
}

// ---------------------------------------------------------------------------
// Connection services
// ---------------------------------------------------------------------------

/// Services discovered on both ends of a connection group, plus the subnets
/// that have been explicitly enabled or disabled for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionServices {
    pub agent_connection_group_id: i64,
    pub agent_1: ServiceAgent,
    pub agent_2: ServiceAgent,
    #[serde(default)]
    pub agent_connection_subnets: Vec<ConnectionSubnet>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceAgent {
    pub agent_id: i64,
    #[serde(default)]
    pub agent_services: Vec<AgentService>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentService {
    pub agent_service_id: i64,
    pub agent_service_name: String,
    #[serde(default)]
    pub agent_service_type: String,
    #[serde(default)]
    pub agent_service_is_enabled: bool,
    #[serde(default)]
    pub agent_service_subnets: Vec<ServiceSubnet>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceSubnet {
    pub agent_service_subnet_id: i64,
    pub agent_service_subnet_ip: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionSubnet {
    pub agent_service_subnet_id: i64,
    pub agent_connection_subnet_is_enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SubnetChange {
    pub agent_service_subnet_id: i64,
    pub is_enabled: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateServicesRequest {
    pub connection_group_id: i64,
    pub changes: Vec<SubnetChange>,
}
