//! HTTP client for the SyntropyStack platform API.
//!
//! Every call attaches `Authorization: Bearer <token>` and is bounded by the
//! configured request timeout. Failures are returned as-is; nothing retries.

pub mod models;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Method, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::config::ProviderConfig;
use crate::error::{ApiError, ApiResult, ProviderError};
use crate::mesh::Pair;
use models::*;

const API_PREFIX: &str = "api/platform/v1/network";

/// Authenticated client for one SyntropyStack workspace.
#[derive(Debug, Clone)]
pub struct SyntropyClient {
    http: reqwest::Client,
    base_url: Url,
}

impl SyntropyClient {
    /// Build a client from resolved provider settings.
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let mut bearer = HeaderValue::from_str(&format!("Bearer {}", config.access_token))
            .map_err(|_| {
                ProviderError::Configuration(
                    "access_token contains characters that are not valid in an HTTP header"
                        .to_string(),
                )
            })?;
        bearer.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ApiError::from)?;

        Ok(Self {
            http,
            base_url: config.api_url.clone(),
        })
    }

    /// Controller URL this client talks to.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!(
            "{}/{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            API_PREFIX,
            path.trim_start_matches('/')
        );
        self.http.request(method, url)
    }

    async fn execute(&self, request: RequestBuilder) -> ApiResult<reqwest::Response> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        warn!(status = %status, "SyntropyStack API request failed");
        Err(ApiError::Status { status, body })
    }

    async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder) -> ApiResult<T> {
        let response = self.execute(request).await?;
        let envelope: DataResponse<T> = response.json().await?;
        Ok(envelope.data)
    }

    async fn send<B: Serialize + ?Sized>(&self, method: Method, path: &str, body: &B) -> ApiResult<()> {
        self.execute(self.request(method, path).json(body)).await?;
        Ok(())
    }

    // =========================================================================
    // Agents
    // =========================================================================

    /// Search agents.
    #[instrument(skip(self, request), fields(take = ?request.take))]
    pub async fn search_agents(&self, request: &AgentSearchRequest) -> ApiResult<Vec<Agent>> {
        let agents: Vec<Agent> = self
            .fetch(self.request(Method::POST, "agents/search").json(request))
            .await?;
        debug!(count = agents.len(), "agents found");
        Ok(agents)
    }

    /// Fetch a single agent by id. Any count other than one is an error.
    #[instrument(skip(self))]
    pub async fn get_agent(&self, agent_id: i64) -> ApiResult<Agent> {
        let mut agents: Vec<Agent> = self
            .fetch(
                self.request(Method::GET, "agents")
                    .query(&[("filter", agent_id.to_string())]),
            )
            .await?;
        if agents.len() != 1 {
            return Err(ApiError::UnexpectedCount {
                what: "agent",
                expected: 1,
                actual: agents.len(),
            });
        }
        Ok(agents.remove(0))
    }

    /// Create a virtual agent and return its id.
    #[instrument(skip(self, request), fields(name = %request.agent_name))]
    pub async fn create_agent(&self, request: &CreateAgentRequest) -> ApiResult<i64> {
        let created: CreatedAgent = self
            .fetch(self.request(Method::POST, "agents").json(request))
            .await?;
        debug!(agent_id = created.agent_id, "agent created");
        Ok(created.agent_id)
    }

    /// Update an agent's name, provider and tags.
    #[instrument(skip(self, request))]
    pub async fn update_agent(&self, agent_id: i64, request: &UpdateAgentRequest) -> ApiResult<()> {
        self.send(Method::PATCH, &format!("agents/{}", agent_id), request)
            .await
    }

    /// Remove agents.
    #[instrument(skip(self))]
    pub async fn remove_agents(&self, agent_ids: &[i64]) -> ApiResult<()> {
        let body = RemoveAgentsRequest {
            agent_ids: agent_ids.to_vec(),
        };
        self.send(Method::POST, "agents/remove", &body).await
    }

    // =========================================================================
    // Connections
    // =========================================================================

    /// Create a full mesh between `agent_ids`.
    #[instrument(skip(self))]
    pub async fn create_mesh(&self, agent_ids: &[i64], sdn_enabled: bool) -> ApiResult<()> {
        let body = CreateMeshRequest {
            agent_ids: agent_ids.iter().map(|id| MeshAgent { agent_id: *id }).collect(),
            sdn_enabled,
        };
        self.send(Method::POST, "connections/mesh", &body).await
    }

    /// Create a point-to-point connection and return its group id.
    #[instrument(skip(self))]
    pub async fn create_point_to_point(&self, pair: Pair, sdn_enabled: bool) -> ApiResult<i64> {
        let body = CreatePointToPointRequest {
            agent_pairs: vec![agent_pair(pair)],
            sdn_enabled,
        };
        let created: Vec<CreatedConnection> = self
            .fetch(self.request(Method::POST, "connections/point-to-point").json(&body))
            .await?;
        created
            .into_iter()
            .find_map(|c| c.agent_connection_group_id)
            .ok_or_else(|| {
                ApiError::NotFound(format!(
                    "no connection group returned for agents {} and {}",
                    pair.low(),
                    pair.high()
                ))
            })
    }

    /// Find connections between any of the given agent pairs.
    #[instrument(skip(self, pairs), fields(pairs = pairs.len()))]
    pub async fn search_connections(&self, pairs: &[Pair]) -> ApiResult<Vec<NetworkConnection>> {
        if pairs.is_empty() {
            return Ok(Vec::new());
        }
        let body = ConnectionSearchRequest {
            filter: ConnectionFilter {
                agent_pair: pairs.iter().copied().map(agent_pair).collect(),
            },
        };
        let connections: Vec<NetworkConnection> = self
            .fetch(self.request(Method::POST, "connections/search").json(&body))
            .await?;
        debug!(count = connections.len(), "connections found");
        Ok(connections)
    }

    /// Toggle SDN on a connection group.
    #[instrument(skip(self))]
    pub async fn update_connection_sdn(&self, connection_group_id: i64, sdn_enabled: bool) -> ApiResult<()> {
        let body = UpdateConnectionsRequest {
            changes: vec![ConnectionChange {
                connection_group_id,
                is_sdn_enabled: sdn_enabled,
            }],
        };
        self.send(Method::PATCH, "connections", &body).await
    }

    /// Remove connection groups in one request.
    #[instrument(skip(self))]
    pub async fn remove_connections(&self, group_ids: &[i64]) -> ApiResult<()> {
        let body = RemoveConnectionsRequest {
            agent_connection_group_ids: group_ids.to_vec(),
        };
        self.send(Method::POST, "connections/remove", &body).await
    }

    // =========================================================================
    // Connection services
    // =========================================================================

    /// Services of the given connection groups.
    #[instrument(skip(self))]
    pub async fn connection_services(&self, group_ids: &[i64]) -> ApiResult<Vec<ConnectionServices>> {
        if group_ids.is_empty() {
            return Ok(Vec::new());
        }
        let filter = group_ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",");
        self.fetch(
            self.request(Method::GET, "connections/services")
                .query(&[("filter", filter)]),
        )
        .await
    }

    /// Services of one connection group. An empty answer is an error.
    pub async fn connection_services_for(&self, group_id: i64) -> ApiResult<ConnectionServices> {
        self.connection_services(&[group_id])
            .await?
            .into_iter()
            .find(|c| c.agent_connection_group_id == group_id)
            .ok_or_else(|| ApiError::NotFound(format!("Connection not found by ID = {}", group_id)))
    }

    /// Enable or disable subnets on a connection group.
    #[instrument(skip(self, changes), fields(changes = changes.len()))]
    pub async fn update_connection_services(
        &self,
        connection_group_id: i64,
        changes: &[SubnetChange],
    ) -> ApiResult<()> {
        let body = UpdateServicesRequest {
            connection_group_id,
            changes: changes.to_vec(),
        };
        self.send(Method::PATCH, "connections/services", &body).await
    }
}

fn agent_pair(pair: Pair) -> AgentPair {
    AgentPair {
        agent_1_id: pair.low(),
        agent_2_id: pair.high(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> SyntropyClient {
        let config = ProviderConfig {
            access_token: "test-token".to_string(),
            api_url: Url::parse(&server.uri()).unwrap(),
            request_timeout: Duration::from_secs(5),
        };
        SyntropyClient::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_bearer_token_and_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/platform/v1/network/agents"))
            .and(query_param("filter", "7"))
            .and(header("authorization", "Bearer test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"agent_id": 7, "agent_name": "edge-7"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let agent = client_for(&server).get_agent(7).await.unwrap();
        assert_eq!(agent.agent_name, "edge-7");
    }

    #[tokio::test]
    async fn test_get_agent_requires_exactly_one() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/platform/v1/network/agents"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [
                    {"agent_id": 7, "agent_name": "a"},
                    {"agent_id": 8, "agent_name": "b"}
                ]
            })))
            .mount(&server)
            .await;

        let err = client_for(&server).get_agent(7).await.unwrap_err();
        assert!(matches!(
            err,
            ApiError::UnexpectedCount {
                expected: 1,
                actual: 2,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_error_status_carries_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/platform/v1/network/connections/remove"))
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
            .mount(&server)
            .await;

        let err = client_for(&server).remove_connections(&[1]).await.unwrap_err();
        match err {
            ApiError::Status { status, body } => {
                assert_eq!(status.as_u16(), 403);
                assert_eq!(body, "forbidden");
            },
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_search_connections_sends_pairs() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/platform/v1/network/connections/search"))
            .and(body_json(json!({
                "filter": {"agent_pair": [
                    {"agent_1_id": 1, "agent_2_id": 2},
                    {"agent_1_id": 1, "agent_2_id": 3},
                    {"agent_1_id": 2, "agent_2_id": 3}
                ]}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{
                    "agent_connection_group_id": 50,
                    "agent_1": {"agent_id": 2},
                    "agent_2": {"agent_id": 1}
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let pairs = crate::mesh::pairs(&[1, 2, 3]);
        let found = client_for(&server).search_connections(&pairs).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].agent_connection_group_id, 50);
    }

    #[tokio::test]
    async fn test_empty_inputs_skip_requests() {
        let server = MockServer::start().await;
        let client = client_for(&server);

        tokio_test::assert_ok!(client.search_connections(&[]).await);
        tokio_test::assert_ok!(client.connection_services(&[]).await);
        assert!(server.received_requests().await.unwrap_or_default().is_empty());
    }

    #[tokio::test]
    async fn test_connection_services_filter_and_missing_group() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/platform/v1/network/connections/services"))
            .and(query_param("filter", "5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
            .mount(&server)
            .await;

        let err = client_for(&server).connection_services_for(5).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(ref m) if m.contains("5")));
    }

    #[tokio::test]
    async fn test_create_point_to_point_returns_group() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/platform/v1/network/connections/point-to-point"))
            .and(body_json(json!({
                "agent_pairs": [{"agent_1_id": 3, "agent_2_id": 9}],
                "sdn_enabled": true
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"agent_connection_group_id": 77}]
            })))
            .mount(&server)
            .await;

        let group = client_for(&server)
            .create_point_to_point(Pair::new(9, 3), true)
            .await
            .unwrap();
        assert_eq!(group, 77);
    }

    #[test]
    fn test_rejects_token_with_newline() {
        let config = ProviderConfig {
            access_token: "bad\ntoken".to_string(),
            api_url: Url::parse("http://localhost").unwrap(),
            request_timeout: Duration::from_secs(1),
        };
        let err = SyntropyClient::new(&config).unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));
    }
}
