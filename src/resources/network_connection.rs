//! `syntropystack_network_connection` resource.
//!
//! The connection is found through a search filtered by its agent pair. An
//! empty search result means the connection is gone.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument};

use super::{decode_state, encode_state, parse_id, Resource};
use crate::client::models::NetworkConnection;
use crate::client::SyntropyClient;
use crate::error::ProviderError;
use crate::mesh::Pair;
use crate::schema::{Attribute, AttributeFlags, AttributeType, Diagnostic, Schema};

/// A point-to-point connection between two agents.
pub struct NetworkConnectionResource;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ConnectionState {
    #[serde(default)]
    id: Option<i64>,
    agent_peer: Vec<i64>,
    #[serde(default)]
    sdn_enabled: Option<bool>,
}

impl ConnectionState {
    fn pair(&self) -> Result<Pair, ProviderError> {
        match self.agent_peer.as_slice() {
            [a, b] if a != b => Ok(Pair::new(*a, *b)),
            _ => Err(ProviderError::Validation(format!(
                "agent_peer must hold exactly two distinct agent ids, got {:?}",
                self.agent_peer
            ))),
        }
    }

    fn id(&self) -> Result<i64, ProviderError> {
        self.id
            .ok_or_else(|| ProviderError::InvalidRequest("connection state has no id".to_string()))
    }
}

fn find_connection(connections: Vec<NetworkConnection>, pair: Pair) -> Option<NetworkConnection> {
    connections
        .into_iter()
        .find(|c| Pair::new(c.agent_1.agent_id, c.agent_2.agent_id) == pair)
}

#[async_trait::async_trait]
impl Resource for NetworkConnectionResource {
    fn type_name(&self) -> &'static str {
        "syntropystack_network_connection"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .describe("Creates a point-to-point connection between two agents")
            .attribute(
                "id",
                Attribute::int64(AttributeFlags::COMPUTED)
                    .describe("Connection group ID")
                    .preserve_unknown(),
            )
            .attribute(
                "agent_peer",
                Attribute::set(AttributeType::Int64, AttributeFlags::REQUIRED)
                    .describe("The two agents to connect")
                    .force_new(),
            )
            .attribute(
                "sdn_enabled",
                Attribute::bool(AttributeFlags::OPTIONAL_COMPUTED).describe("Is SDN enabled on the connection?"),
            )
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        let mut diagnostics = crate::validation::validate(&self.schema(), config);
        if let Some(peers) = config.get("agent_peer").and_then(Value::as_array) {
            if peers.len() != 2 {
                diagnostics.push(
                    Diagnostic::error("agent_peer must contain exactly 2 agent ids")
                        .with_detail(format!("got {}", peers.len()))
                        .with_attribute("agent_peer"),
                );
            }
        }
        diagnostics
    }

    #[instrument(skip_all, name = "network_connection.create")]
    async fn create(&self, client: &SyntropyClient, planned: Value) -> Result<Value, ProviderError> {
        let mut state: ConnectionState = decode_state(planned)?;
        let sdn_enabled = state.sdn_enabled.unwrap_or(false);
        let id = client
            .create_point_to_point(state.pair()?, sdn_enabled)
            .await?;
        debug!(connection_group_id = id, "connection created");
        state.id = Some(id);
        state.sdn_enabled = Some(sdn_enabled);
        encode_state(&state)
    }

    #[instrument(skip_all, name = "network_connection.read")]
    async fn read(&self, client: &SyntropyClient, state: Value) -> Result<Option<Value>, ProviderError> {
        let mut state: ConnectionState = decode_state(state)?;
        let pair = state.pair()?;
        let connections = client.search_connections(&[pair]).await?;
        if connections.is_empty() {
            info!(
                agent_1 = pair.low(),
                agent_2 = pair.high(),
                "connection not found, removing from state"
            );
            return Ok(None);
        }
        let returned = connections.len();
        let connection = find_connection(connections, pair).ok_or_else(|| {
            ProviderError::FailedPrecondition(format!(
                "connection search for agents {} and {} returned {} other connections",
                pair.low(),
                pair.high(),
                returned
            ))
        })?;
        state.id = Some(connection.agent_connection_group_id);
        state.sdn_enabled = Some(connection.agent_connection_group_sdn_enabled);
        encode_state(&state).map(Some)
    }

    #[instrument(skip_all, name = "network_connection.update")]
    async fn update(&self, client: &SyntropyClient, _prior: Value, planned: Value) -> Result<Value, ProviderError> {
        let mut state: ConnectionState = decode_state(planned)?;
        let sdn_enabled = state.sdn_enabled.unwrap_or(false);
        client
            .update_connection_sdn(state.id()?, sdn_enabled)
            .await?;
        state.sdn_enabled = Some(sdn_enabled);
        encode_state(&state)
    }

    #[instrument(skip_all, name = "network_connection.delete")]
    async fn delete(&self, client: &SyntropyClient, state: Value) -> Result<(), ProviderError> {
        let state: ConnectionState = decode_state(state)?;
        client.remove_connections(&[state.id()?]).await?;
        Ok(())
    }

    /// The import id is the connection group id.
    async fn import(&self, client: &SyntropyClient, id: &str) -> Result<Value, ProviderError> {
        let group_id = parse_id(id, "connection group id")?;
        let group = client.connection_services_for(group_id).await?;
        let state = ConnectionState {
            id: Some(group_id),
            agent_peer: vec![group.agent_1.agent_id, group.agent_2.agent_id],
            sdn_enabled: None,
        };
        self.read(client, encode_state(&state)?)
            .await?
            .ok_or_else(|| ProviderError::NotFound(format!("Connection not found by ID = {}", group_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::test_support::{api, client_for};
    use crate::testing::{assert_error_contains, assert_no_errors};
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn listing() -> Value {
        json!({"data": [
            {
                "agent_connection_group_id": 10,
                "agent_1": {"agent_id": 1},
                "agent_2": {"agent_id": 2},
                "agent_connection_group_sdn_enabled": false
            },
            {
                "agent_connection_group_id": 11,
                "agent_1": {"agent_id": 4},
                "agent_2": {"agent_id": 3},
                "agent_connection_group_sdn_enabled": true
            }
        ]})
    }

    #[test]
    fn test_validate_requires_two_peers() {
        assert_no_errors(&NetworkConnectionResource.validate(&json!({"agent_peer": [1, 2]})));

        let diagnostics = NetworkConnectionResource.validate(&json!({"agent_peer": [1, 2, 3]}));
        assert_error_contains(&diagnostics, "exactly 2");
    }

    #[tokio::test]
    async fn test_create_point_to_point() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(api("connections/point-to-point")))
            .and(body_json(json!({
                "agent_pairs": [{"agent_1_id": 1, "agent_2_id": 2}],
                "sdn_enabled": true
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"data": [{"agent_connection_group_id": 10}]})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let state = NetworkConnectionResource
            .create(
                &client_for(&server),
                json!({"id": null, "agent_peer": [2, 1], "sdn_enabled": true}),
            )
            .await
            .unwrap();
        assert_eq!(state["id"], 10);
    }

    async fn mount_search(server: &MockServer, low: i64, high: i64, connections: Value) {
        Mock::given(method("POST"))
            .and(path(api("connections/search")))
            .and(body_json(json!({"filter": {"agent_pair": [{"agent_1_id": low, "agent_2_id": high}]}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": connections})))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_read_matches_pair_in_either_order() {
        let server = MockServer::start().await;
        mount_search(&server, 3, 4, json!([listing()["data"][1].clone()])).await;

        let state = NetworkConnectionResource
            .read(&client_for(&server), json!({"id": 11, "agent_peer": [3, 4]}))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(state["id"], 11);
        assert_eq!(state["sdn_enabled"], true);
    }

    #[tokio::test]
    async fn test_read_missing_connection_drops_state() {
        let server = MockServer::start().await;
        mount_search(&server, 1, 3, json!([])).await;

        let state = NetworkConnectionResource
            .read(&client_for(&server), json!({"id": 99, "agent_peer": [1, 3]}))
            .await
            .unwrap();
        assert!(state.is_none());
    }

    #[tokio::test]
    async fn test_read_finds_connection_beyond_first_page() {
        let server = MockServer::start().await;
        let unrelated: Vec<Value> = (0..1000)
            .map(|i| {
                json!({
                    "agent_connection_group_id": i,
                    "agent_1": {"agent_id": 100 + i},
                    "agent_2": {"agent_id": 5000 + i}
                })
            })
            .collect();
        Mock::given(method("GET"))
            .and(path(api("connections")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": unrelated})))
            .expect(0)
            .mount(&server)
            .await;
        mount_search(
            &server,
            1,
            2,
            json!([{
                "agent_connection_group_id": 9999,
                "agent_1": {"agent_id": 2},
                "agent_2": {"agent_id": 1},
                "agent_connection_group_sdn_enabled": true
            }]),
        )
        .await;

        let state = NetworkConnectionResource
            .read(&client_for(&server), json!({"id": 9999, "agent_peer": [1, 2]}))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(state["id"], 9999);
        assert_eq!(state["sdn_enabled"], true);
    }

    #[tokio::test]
    async fn test_read_rejects_search_without_the_pair() {
        let server = MockServer::start().await;
        mount_search(&server, 1, 2, json!([listing()["data"][1].clone()])).await;

        let err = NetworkConnectionResource
            .read(&client_for(&server), json!({"id": 10, "agent_peer": [1, 2]}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::FailedPrecondition(_)));
    }

    #[tokio::test]
    async fn test_update_toggles_sdn() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path(api("connections")))
            .and(body_json(json!({"changes": [{"connection_group_id": 10, "is_sdn_enabled": true}]})))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let state = NetworkConnectionResource
            .update(
                &client_for(&server),
                json!({"id": 10, "agent_peer": [1, 2], "sdn_enabled": false}),
                json!({"id": 10, "agent_peer": [1, 2], "sdn_enabled": true}),
            )
            .await
            .unwrap();
        assert_eq!(state["sdn_enabled"], true);
    }

    #[tokio::test]
    async fn test_import_by_group_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(api("connections/services")))
            .and(query_param("filter", "11"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [{
                "agent_connection_group_id": 11,
                "agent_1": {"agent_id": 4},
                "agent_2": {"agent_id": 3}
            }]})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(api("connections/services")))
            .and(query_param("filter", "12"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
            .mount(&server)
            .await;
        mount_search(&server, 3, 4, json!([listing()["data"][1].clone()])).await;
        let client = client_for(&server);

        let state = NetworkConnectionResource.import(&client, "11").await.unwrap();
        assert_eq!(state["agent_peer"], json!([4, 3]));
        assert_eq!(state["sdn_enabled"], true);

        let err = NetworkConnectionResource.import(&client, "12").await.unwrap_err();
        assert!(matches!(err, ProviderError::NotFound(_)));
    }
}
