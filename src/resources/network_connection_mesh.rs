//! `syntropystack_network_connection_mesh` resource.
//!
//! A mesh owns every pairwise connection between its agents. Reads check that
//! the expected number of connections still exists; updates remove the
//! connections of departed agents in one batch before recreating the mesh.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use super::{decode_state, encode_state, parse_id, Resource};
use crate::client::SyntropyClient;
use crate::error::ProviderError;
use crate::flatten::mesh_services;
use crate::mesh::{self, ConnectionRecord, NodeId};
use crate::schema::{Attribute, AttributeFlags, AttributeType, Schema};

/// A full mesh of connections among a set of agents.
pub struct NetworkConnectionMeshResource;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct MeshState {
    #[serde(default)]
    id: Option<String>,
    agent_ids: Vec<NodeId>,
    #[serde(default)]
    sdn_enabled: Option<bool>,
    #[serde(default)]
    connections: Option<Vec<ConnectionRecord>>,
}

impl MeshState {
    fn sdn_enabled(&self) -> bool {
        self.sdn_enabled.unwrap_or(false)
    }

    fn connections(&self) -> &[ConnectionRecord] {
        self.connections.as_deref().unwrap_or_default()
    }
}

fn distinct(nodes: &[NodeId]) -> usize {
    nodes.iter().collect::<BTreeSet<_>>().len()
}

fn service_type() -> AttributeType {
    AttributeType::object([
        ("id", AttributeType::Int64),
        ("name", AttributeType::String),
        ("ip", AttributeType::String),
        ("type", AttributeType::String),
        ("enabled", AttributeType::Bool),
        ("agent_id", AttributeType::Int64),
    ])
}

fn connection_type() -> AttributeType {
    AttributeType::object([
        ("agent_1_id", AttributeType::Int64),
        ("agent_2_id", AttributeType::Int64),
        ("connection_group_id", AttributeType::Int64),
        ("services", AttributeType::list(service_type())),
    ])
}

/// Connections found between the agents of a mesh.
struct Observed {
    records: Vec<ConnectionRecord>,
    /// Every connection found has SDN enabled.
    all_sdn: bool,
}

impl Observed {
    /// Whether the connections form a complete mesh of `agent_ids`, logging
    /// the counts when they do not.
    fn is_complete(&self, agent_ids: &[NodeId]) -> bool {
        let nodes = distinct(agent_ids);
        let complete = mesh::is_consistent(nodes, self.records.len());
        if !complete {
            info!(
                expected = mesh::expected_connections(nodes),
                found = self.records.len(),
                "mesh changed outside of the provider"
            );
        }
        complete
    }
}

/// Connections currently existing between `agent_ids`, with their services.
async fn fetch_connections(client: &SyntropyClient, agent_ids: &[NodeId]) -> Result<Observed, ProviderError> {
    let connections = client
        .search_connections(&mesh::pairs(agent_ids))
        .await?;

    let group_ids: Vec<i64> = connections
        .iter()
        .map(|c| c.agent_connection_group_id)
        .collect();
    let services = client.connection_services(&group_ids).await?;
    let all_sdn = connections
        .iter()
        .all(|c| c.agent_connection_group_sdn_enabled);

    let records = connections
        .into_iter()
        .map(|c| ConnectionRecord {
            agent_1_id: c.agent_1.agent_id,
            agent_2_id: c.agent_2.agent_id,
            connection_group_id: c.agent_connection_group_id,
            services: services
                .iter()
                .find(|s| s.agent_connection_group_id == c.agent_connection_group_id)
                .map(mesh_services)
                .unwrap_or_default(),
        })
        .collect();
    Ok(Observed { records, all_sdn })
}

#[async_trait::async_trait]
impl Resource for NetworkConnectionMeshResource {
    fn type_name(&self) -> &'static str {
        "syntropystack_network_connection_mesh"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .describe("Creates a full mesh of connections between agents")
            .attribute(
                "id",
                Attribute::string(AttributeFlags::COMPUTED)
                    .describe("Mesh ID")
                    .preserve_unknown(),
            )
            .attribute(
                "agent_ids",
                Attribute::set(AttributeType::Int64, AttributeFlags::REQUIRED).describe("Agents to connect"),
            )
            .attribute(
                "sdn_enabled",
                Attribute::bool(AttributeFlags::OPTIONAL)
                    .describe("Is SDN enabled on the connections?")
                    .default_value(json!(false)),
            )
            .attribute(
                "connections",
                Attribute::list(connection_type(), AttributeFlags::COMPUTED).describe("Connections of the mesh"),
            )
    }

    #[instrument(skip_all, name = "mesh.create")]
    async fn create(&self, client: &SyntropyClient, planned: Value) -> Result<Value, ProviderError> {
        let mut state: MeshState = decode_state(planned)?;
        client
            .create_mesh(&state.agent_ids, state.sdn_enabled())
            .await?;

        let connections = fetch_connections(client, &state.agent_ids).await?.records;
        debug!(connections = connections.len(), "mesh created");

        state.id = Some(Uuid::new_v4().to_string());
        state.sdn_enabled = Some(state.sdn_enabled());
        state.connections = Some(connections);
        encode_state(&state)
    }

    #[instrument(skip_all, name = "mesh.read")]
    async fn read(&self, client: &SyntropyClient, state: Value) -> Result<Option<Value>, ProviderError> {
        let mut state: MeshState = decode_state(state)?;
        let observed = fetch_connections(client, &state.agent_ids).await?;
        if !observed.is_complete(&state.agent_ids) {
            return Ok(None);
        }

        state.connections = Some(observed.records);
        encode_state(&state).map(Some)
    }

    #[instrument(skip_all, name = "mesh.update")]
    async fn update(&self, client: &SyntropyClient, prior: Value, planned: Value) -> Result<Value, ProviderError> {
        let prior: MeshState = decode_state(prior)?;
        let mut state: MeshState = decode_state(planned)?;

        let stale = mesh::stale_connection_groups(&prior.agent_ids, &state.agent_ids, prior.connections());
        if !stale.is_empty() {
            debug!(groups = ?stale, "removing connections of departed agents");
            client.remove_connections(&stale).await?;
        }

        client
            .create_mesh(&state.agent_ids, state.sdn_enabled())
            .await?;

        state.id = state.id.or(prior.id);
        state.sdn_enabled = Some(state.sdn_enabled());
        state.connections = Some(fetch_connections(client, &state.agent_ids).await?.records);
        encode_state(&state)
    }

    #[instrument(skip_all, name = "mesh.delete")]
    async fn delete(&self, client: &SyntropyClient, state: Value) -> Result<(), ProviderError> {
        let state: MeshState = decode_state(state)?;
        let group_ids: Vec<i64> = state
            .connections()
            .iter()
            .map(|c| c.connection_group_id)
            .collect();
        if group_ids.is_empty() {
            return Ok(());
        }
        client.remove_connections(&group_ids).await?;
        Ok(())
    }

    /// The import id is a comma separated list of agent ids. The mesh gets a
    /// fresh id and must be complete to be imported.
    async fn import(&self, client: &SyntropyClient, id: &str) -> Result<Value, ProviderError> {
        let agent_ids = id
            .split(',')
            .filter(|part| !part.trim().is_empty())
            .map(|part| parse_id(part, "agent id"))
            .collect::<Result<Vec<_>, _>>()?;
        if distinct(&agent_ids) < 2 {
            return Err(ProviderError::Validation(
                "a mesh import id needs at least two agent ids, e.g. '1,2,3'".to_string(),
            ));
        }

        let observed = fetch_connections(client, &agent_ids).await?;
        if !observed.is_complete(&agent_ids) {
            return Err(ProviderError::NotFound(format!("no complete mesh between agents {}", id)));
        }

        encode_state(&MeshState {
            id: Some(Uuid::new_v4().to_string()),
            agent_ids,
            sdn_enabled: Some(observed.all_sdn),
            connections: Some(observed.records),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::test_support::{api, client_for};
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn connection(group: i64, a: i64, b: i64) -> Value {
        json!({
            "agent_connection_group_id": group,
            "agent_1": {"agent_id": a},
            "agent_2": {"agent_id": b},
            "agent_connection_group_sdn_enabled": false
        })
    }

    async fn mount_search(server: &MockServer, connections: Vec<Value>) {
        Mock::given(method("POST"))
            .and(path(api("connections/search")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": connections})))
            .mount(server)
            .await;
    }

    async fn mount_services(server: &MockServer, filter: &str) {
        Mock::given(method("GET"))
            .and(path(api("connections/services")))
            .and(query_param("filter", filter))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [{
                "agent_connection_group_id": 10,
                "agent_1": {"agent_id": 1, "agent_services": [{
                    "agent_service_id": 100,
                    "agent_service_name": "web",
                    "agent_service_type": "http",
                    "agent_service_subnets": [
                        {"agent_service_subnet_id": 1000, "agent_service_subnet_ip": "10.0.0.0/24"}
                    ]
                }]},
                "agent_2": {"agent_id": 2},
                "agent_connection_subnets": [
                    {"agent_service_subnet_id": 1000, "agent_connection_subnet_is_enabled": true}
                ]
            }]})))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_create_builds_connections_with_services() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(api("connections/mesh")))
            .and(body_json(json!({
                "agent_ids": [{"agent_id": 1}, {"agent_id": 2}, {"agent_id": 3}],
                "sdn_enabled": false
            })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        mount_search(
            &server,
            vec![connection(10, 1, 2), connection(11, 1, 3), connection(12, 2, 3)],
        )
        .await;
        mount_services(&server, "10,11,12").await;

        let state = NetworkConnectionMeshResource
            .create(
                &client_for(&server),
                json!({"id": null, "agent_ids": [1, 2, 3], "sdn_enabled": false, "connections": null}),
            )
            .await
            .unwrap();

        assert!(Uuid::parse_str(state["id"].as_str().unwrap()).is_ok());
        let connections = state["connections"].as_array().unwrap();
        assert_eq!(connections.len(), 3);
        assert_eq!(connections[0]["services"][0]["name"], "web");
        assert_eq!(connections[0]["services"][0]["type"], "http");
        assert_eq!(connections[0]["services"][0]["enabled"], true);
        assert_eq!(connections[1]["services"], json!([]));
    }

    #[tokio::test]
    async fn test_read_drift_removes_state() {
        let server = MockServer::start().await;
        mount_search(&server, vec![connection(10, 1, 2), connection(11, 1, 3)]).await;
        mount_services(&server, "10,11").await;

        let state = NetworkConnectionMeshResource
            .read(
                &client_for(&server),
                json!({"id": "m", "agent_ids": [1, 2, 3], "sdn_enabled": false, "connections": []}),
            )
            .await
            .unwrap();
        assert!(state.is_none());
    }

    #[tokio::test]
    async fn test_read_consistent_mesh_refreshes() {
        let server = MockServer::start().await;
        mount_search(&server, vec![connection(10, 1, 2)]).await;
        mount_services(&server, "10").await;

        let state = NetworkConnectionMeshResource
            .read(
                &client_for(&server),
                json!({"id": "m", "agent_ids": [1, 2], "sdn_enabled": false, "connections": []}),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(state["id"], "m");
        assert_eq!(state["connections"][0]["connection_group_id"], 10);
    }

    #[tokio::test]
    async fn test_update_removes_only_stale_connections() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(api("connections/remove")))
            .and(body_json(json!({"agent_connection_group_ids": [10, 12]})))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(api("connections/mesh")))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        mount_search(&server, vec![connection(11, 1, 3)]).await;
        mount_services(&server, "11").await;

        let prior = json!({
            "id": "m",
            "agent_ids": [1, 2, 3],
            "sdn_enabled": false,
            "connections": [
                {"agent_1_id": 1, "agent_2_id": 2, "connection_group_id": 10, "services": []},
                {"agent_1_id": 1, "agent_2_id": 3, "connection_group_id": 11, "services": []},
                {"agent_1_id": 2, "agent_2_id": 3, "connection_group_id": 12, "services": []}
            ]
        });
        let planned = json!({"id": "m", "agent_ids": [1, 3], "sdn_enabled": false, "connections": null});

        let state = NetworkConnectionMeshResource
            .update(&client_for(&server), prior, planned)
            .await
            .unwrap();
        assert_eq!(state["id"], "m");
        assert_eq!(state["connections"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_without_removed_agents_skips_delete() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(api("connections/remove")))
            .respond_with(ResponseTemplate::new(204))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(api("connections/mesh")))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;
        mount_search(&server, vec![connection(10, 1, 2)]).await;
        mount_services(&server, "10").await;

        let prior = json!({"id": "m", "agent_ids": [1], "sdn_enabled": false, "connections": []});
        let planned = json!({"id": "m", "agent_ids": [1, 2], "sdn_enabled": true});

        let state = NetworkConnectionMeshResource
            .update(&client_for(&server), prior, planned)
            .await
            .unwrap();
        assert_eq!(state["sdn_enabled"], true);
    }

    #[tokio::test]
    async fn test_delete_batches_group_ids() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(api("connections/remove")))
            .and(body_json(json!({"agent_connection_group_ids": [10, 11]})))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let state = json!({
            "id": "m",
            "agent_ids": [1, 2, 3],
            "connections": [
                {"agent_1_id": 1, "agent_2_id": 2, "connection_group_id": 10},
                {"agent_1_id": 1, "agent_2_id": 3, "connection_group_id": 11}
            ]
        });
        tokio_test::assert_ok!(NetworkConnectionMeshResource.delete(&client, state).await);

        let empty = json!({"id": "m", "agent_ids": [1], "connections": null});
        tokio_test::assert_ok!(NetworkConnectionMeshResource.delete(&client, empty).await);
    }

    #[tokio::test]
    async fn test_update_fails_when_stale_removal_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(api("connections/remove")))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(api("connections/mesh")))
            .respond_with(ResponseTemplate::new(204))
            .expect(0)
            .mount(&server)
            .await;

        let prior = json!({
            "id": "m",
            "agent_ids": [1, 2],
            "sdn_enabled": false,
            "connections": [
                {"agent_1_id": 1, "agent_2_id": 2, "connection_group_id": 10, "services": []}
            ]
        });
        let planned = json!({"id": "m", "agent_ids": [1, 3], "sdn_enabled": false, "connections": null});

        let err = NetworkConnectionMeshResource
            .update(&client_for(&server), prior, planned)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_import_from_agent_list() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(api("connections/search")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [connection(10, 1, 2)]})))
            .expect(1)
            .mount(&server)
            .await;
        mount_services(&server, "10").await;
        let client = client_for(&server);

        let state = NetworkConnectionMeshResource.import(&client, "1, 2").await.unwrap();
        assert_eq!(state["agent_ids"], json!([1, 2]));
        assert_eq!(state["sdn_enabled"], false);
        assert_eq!(state["connections"][0]["connection_group_id"], 10);

        let err = NetworkConnectionMeshResource.import(&client, "1").await.unwrap_err();
        assert!(matches!(err, ProviderError::Validation(_)));
    }

    #[tokio::test]
    async fn test_import_incomplete_mesh_fails() {
        let server = MockServer::start().await;
        mount_search(&server, vec![connection(10, 1, 2)]).await;
        mount_services(&server, "10").await;

        let err = NetworkConnectionMeshResource
            .import(&client_for(&server), "1,2,3")
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::NotFound(_)));
    }
}
