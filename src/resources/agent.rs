//! `syntropystack_agent` resource: a virtual agent.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

use super::{decode_state, encode_state, parse_id, Resource};
use crate::client::models::{Agent, CreateAgentRequest, UpdateAgentRequest};
use crate::client::SyntropyClient;
use crate::error::ProviderError;
use crate::schema::{Attribute, AttributeFlags, AttributeType, Schema};

/// A virtual agent.
pub struct AgentResource;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct AgentState {
    #[serde(default)]
    id: Option<i64>,
    name: String,
    provider_id: i64,
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    tags: Option<Vec<String>>,
}

impl AgentState {
    fn id(&self) -> Result<i64, ProviderError> {
        self.id
            .ok_or_else(|| ProviderError::InvalidRequest("agent state has no id".to_string()))
    }

    fn tags(&self) -> Vec<String> {
        self.tags.clone().unwrap_or_default()
    }

    fn refresh(&mut self, agent: &Agent) {
        self.id = Some(agent.agent_id);
        self.name = agent.agent_name.clone();
        if let Some(provider) = &agent.agent_provider {
            self.provider_id = provider.agent_provider_id;
        }
        let tags: Vec<String> = agent
            .agent_tags
            .iter()
            .map(|t| t.agent_tag_name.clone())
            .collect();
        self.tags = if tags.is_empty() { None } else { Some(tags) };
    }
}

#[async_trait::async_trait]
impl Resource for AgentResource {
    fn type_name(&self) -> &'static str {
        "syntropystack_agent"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .describe("Creates virtual Syntropy platform agent")
            .attribute(
                "id",
                Attribute::int64(AttributeFlags::COMPUTED)
                    .describe("Agent ID")
                    .preserve_unknown(),
            )
            .attribute(
                "name",
                Attribute::string(AttributeFlags::REQUIRED)
                    .describe("Agent name")
                    .force_new(),
            )
            .attribute(
                "provider_id",
                Attribute::int64(AttributeFlags::REQUIRED).describe("Agent provider ID"),
            )
            .attribute(
                "token",
                Attribute::string(AttributeFlags::REQUIRED)
                    .describe("Agent token")
                    .sensitive()
                    .force_new(),
            )
            .attribute(
                "tags",
                Attribute::set(AttributeType::String, AttributeFlags::OPTIONAL).describe("Agent tags"),
            )
    }

    #[instrument(skip_all, name = "agent.create")]
    async fn create(&self, client: &SyntropyClient, planned: Value) -> Result<Value, ProviderError> {
        let mut state: AgentState = decode_state(planned)?;
        let request = CreateAgentRequest {
            agent_name: state.name.clone(),
            agent_provider_id: state.provider_id,
            agent_token: state.token.clone().unwrap_or_default(),
            agent_tags: state.tags(),
        };
        let id = client.create_agent(&request).await?;
        debug!(agent_id = id, "virtual agent created");
        state.id = Some(id);
        encode_state(&state)
    }

    #[instrument(skip_all, name = "agent.read")]
    async fn read(&self, client: &SyntropyClient, state: Value) -> Result<Option<Value>, ProviderError> {
        let mut state: AgentState = decode_state(state)?;
        let agent = client.get_agent(state.id()?).await?;
        state.refresh(&agent);
        encode_state(&state).map(Some)
    }

    #[instrument(skip_all, name = "agent.update")]
    async fn update(&self, client: &SyntropyClient, _prior: Value, planned: Value) -> Result<Value, ProviderError> {
        let state: AgentState = decode_state(planned)?;
        let request = UpdateAgentRequest {
            agent_name: state.name.clone(),
            agent_provider_id: state.provider_id,
            agent_tags: state.tags(),
        };
        client.update_agent(state.id()?, &request).await?;
        encode_state(&state)
    }

    #[instrument(skip_all, name = "agent.delete")]
    async fn delete(&self, client: &SyntropyClient, state: Value) -> Result<(), ProviderError> {
        let state: AgentState = decode_state(state)?;
        client.remove_agents(&[state.id()?]).await?;
        Ok(())
    }

    /// The import id is the numeric agent id. The token cannot be read back
    /// and stays null until configuration supplies it.
    async fn import(&self, client: &SyntropyClient, id: &str) -> Result<Value, ProviderError> {
        let id = parse_id(id, "agent id")?;
        let agent = client.get_agent(id).await?;
        let mut state = AgentState {
            id: None,
            name: String::new(),
            provider_id: 0,
            token: None,
            tags: None,
        };
        state.refresh(&agent);
        encode_state(&state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::test_support::{api, client_for};
    use crate::validation;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_schema_validation() {
        let schema = AgentResource.schema();
        assert!(validation::is_valid(
            &schema,
            &json!({"name": "edge", "provider_id": 3, "token": "t", "tags": ["a"]})
        ));
        assert!(!validation::is_valid(&schema, &json!({"name": "edge", "token": "t"})));
        assert!(schema.block.attributes["token"].flags.sensitive);
    }

    #[test]
    fn test_name_change_replaces() {
        let prior = json!({"id": 7, "name": "edge", "provider_id": 3, "token": "t", "tags": null});
        let proposed = json!({"name": "core", "provider_id": 3, "token": "t"});
        let plan = AgentResource.plan(Some(&prior), &proposed);
        assert!(plan.requires_replace);
        assert_eq!(plan.planned_state["id"], 7);
    }

    #[tokio::test]
    async fn test_create_posts_agent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(api("agents")))
            .and(body_json(json!({
                "agent_name": "edge",
                "agent_provider_id": 3,
                "agent_token": "secret",
                "agent_tags": ["prod"]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"agent_id": 77}})))
            .expect(1)
            .mount(&server)
            .await;

        let state = AgentResource
            .create(
                &client_for(&server),
                json!({"id": null, "name": "edge", "provider_id": 3, "token": "secret", "tags": ["prod"]}),
            )
            .await
            .unwrap();
        assert_eq!(state["id"], 77);
        assert_eq!(state["token"], "secret");
    }

    #[tokio::test]
    async fn test_read_refreshes_fields() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(api("agents")))
            .and(query_param("filter", "77"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [{
                "agent_id": 77,
                "agent_name": "edge-renamed",
                "agent_provider": {"agent_provider_id": 4, "agent_provider_name": "aws"},
                "agent_tags": [{"agent_tag_id": 1, "agent_tag_name": "prod"}]
            }]})))
            .mount(&server)
            .await;

        let state = AgentResource
            .read(
                &client_for(&server),
                json!({"id": 77, "name": "edge", "provider_id": 3, "token": "secret"}),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(state["name"], "edge-renamed");
        assert_eq!(state["provider_id"], 4);
        assert_eq!(state["tags"], json!(["prod"]));
        assert_eq!(state["token"], "secret");
    }

    #[tokio::test]
    async fn test_read_reports_unexpected_count() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(api("agents")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
            .mount(&server)
            .await;

        let err = AgentResource
            .read(&client_for(&server), json!({"id": 77, "name": "edge", "provider_id": 3}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::FailedPrecondition(_)));
        assert!(err.to_string().contains("got 0"));
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path(api("agents/77")))
            .and(body_json(json!({"agent_name": "edge", "agent_provider_id": 5, "agent_tags": []})))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(api("agents/remove")))
            .and(body_json(json!({"agent_ids": [77]})))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let planned = json!({"id": 77, "name": "edge", "provider_id": 5, "token": "secret"});
        let state = AgentResource
            .update(&client, Value::Null, planned.clone())
            .await
            .unwrap();
        assert_eq!(state["provider_id"], 5);

        tokio_test::assert_ok!(AgentResource.delete(&client, state).await);
    }

    #[tokio::test]
    async fn test_import_by_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(api("agents")))
            .and(query_param("filter", "12"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [{
                "agent_id": 12,
                "agent_name": "edge-12",
                "agent_provider": {"agent_provider_id": 2}
            }]})))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let state = AgentResource.import(&client, "12").await.unwrap();
        assert_eq!(state["name"], "edge-12");
        assert_eq!(state["provider_id"], 2);
        assert_eq!(state["tags"], Value::Null);
        assert_eq!(state["token"], Value::Null);

        assert!(AgentResource.import(&client, "twelve").await.is_err());
    }
}
