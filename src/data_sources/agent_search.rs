//! `syntropystack_agent_search` data source.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, instrument};

use super::{agent_record, agent_record_type, DataSource};
use crate::client::models::{AgentFilter, AgentSearchRequest};
use crate::client::SyntropyClient;
use crate::error::ProviderError;
use crate::schema::{Attribute, AttributeFlags, AttributeType, Block, Diagnostic, NestedBlock, Schema};

/// Searches agents with free text and structured filters.
pub struct AgentSearchDataSource;

const DATE_FIELDS: [&str; 2] = ["modified_at_from", "modified_at_to"];

#[derive(Debug, Default, Deserialize)]
struct SearchConfig {
    #[serde(default)]
    skip: Option<i64>,
    #[serde(default)]
    take: Option<i64>,
    #[serde(default)]
    search: Option<String>,
    #[serde(default)]
    filter: Option<FilterConfig>,
}

#[derive(Debug, Default, Deserialize)]
struct FilterConfig {
    #[serde(default)]
    id: Option<Vec<i64>>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    tag_id: Option<Vec<i64>>,
    #[serde(default)]
    provider_id: Option<Vec<i64>>,
    #[serde(default, rename = "type")]
    agent_type: Option<Vec<String>>,
    #[serde(default)]
    version: Option<Vec<String>>,
    #[serde(default)]
    tag_name: Option<Vec<String>>,
    #[serde(default)]
    status: Option<Vec<String>>,
    #[serde(default)]
    location_country: Option<Vec<String>>,
    #[serde(default)]
    modified_at_from: Option<String>,
    #[serde(default)]
    modified_at_to: Option<String>,
}

fn parse_date(field: &str, value: Option<&str>) -> Result<Option<DateTime<Utc>>, ProviderError> {
    value
        .map(|v| {
            DateTime::parse_from_rfc3339(v)
                .map(|d| d.with_timezone(&Utc))
                .map_err(|e| {
                    ProviderError::Validation(format!(
                        "filter.{} must be an RFC 3339 date time, got '{}': {}",
                        field, v, e
                    ))
                })
        })
        .transpose()
}

impl FilterConfig {
    fn into_filter(self) -> Result<AgentFilter, ProviderError> {
        Ok(AgentFilter {
            agent_modified_at_from: parse_date("modified_at_from", self.modified_at_from.as_deref())?,
            agent_modified_at_to: parse_date("modified_at_to", self.modified_at_to.as_deref())?,
            agent_id: self.id.unwrap_or_default(),
            agent_name: self.name,
            agent_tag_id: self.tag_id.unwrap_or_default(),
            agent_provider_id: self.provider_id.unwrap_or_default(),
            agent_type: self.agent_type.unwrap_or_default(),
            agent_version: self.version.unwrap_or_default(),
            agent_tag_name: self.tag_name.unwrap_or_default(),
            agent_status: self.status.unwrap_or_default(),
            agent_location_country: self.location_country.unwrap_or_default(),
        })
    }
}

fn filter_block() -> Block {
    let int_set = || Attribute::set(AttributeType::Int64, AttributeFlags::OPTIONAL);
    let string_set = || Attribute::set(AttributeType::String, AttributeFlags::OPTIONAL);
    Block::new()
        .describe("Structured agent filter")
        .attribute("id", int_set().describe("Agent ids"))
        .attribute("name", Attribute::string(AttributeFlags::OPTIONAL).describe("Agent name"))
        .attribute("tag_id", int_set().describe("Agent tag ids"))
        .attribute("provider_id", int_set().describe("Agent provider ids"))
        .attribute("type", string_set().describe("Agent types: LINUX, MACOS, WINDOWS, VIRTUAL"))
        .attribute("version", string_set().describe("Agent versions"))
        .attribute("tag_name", string_set().describe("Agent tag names"))
        .attribute("status", string_set().describe("Agent statuses"))
        .attribute("location_country", string_set().describe("Agent location countries"))
        .attribute(
            "modified_at_from",
            Attribute::string(AttributeFlags::OPTIONAL).describe("RFC 3339 lower bound of the modification time"),
        )
        .attribute(
            "modified_at_to",
            Attribute::string(AttributeFlags::OPTIONAL).describe("RFC 3339 upper bound of the modification time"),
        )
}

#[async_trait::async_trait]
impl DataSource for AgentSearchDataSource {
    fn type_name(&self) -> &'static str {
        "syntropystack_agent_search"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .describe("Searches Syntropy agents")
            .attribute("skip", Attribute::int64(AttributeFlags::OPTIONAL).describe("Records to skip"))
            .attribute("take", Attribute::int64(AttributeFlags::OPTIONAL).describe("Records to return"))
            .attribute("search", Attribute::string(AttributeFlags::OPTIONAL).describe("Free text search"))
            .block("filter", NestedBlock::single(filter_block()))
            .attribute(
                "agents",
                Attribute::list(agent_record_type(), AttributeFlags::COMPUTED).describe("Matching agents"),
            )
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        let mut diagnostics = crate::validation::validate(&self.schema(), config);
        let Some(filter) = config.get("filter") else {
            return diagnostics;
        };
        for field in DATE_FIELDS {
            let value = filter.get(field).and_then(Value::as_str);
            if let Err(e) = parse_date(field, value) {
                diagnostics.push(
                    Diagnostic::error("Invalid date")
                        .with_detail(e.message())
                        .with_attribute(format!("filter.{}", field)),
                );
            }
        }
        diagnostics
    }

    #[instrument(skip_all, name = "agent_search.read")]
    async fn read(&self, client: &SyntropyClient, config: Value) -> Result<Value, ProviderError> {
        let search: SearchConfig = serde_json::from_value(config.clone())?;
        let request = AgentSearchRequest {
            filter: search.filter.map(FilterConfig::into_filter).transpose()?,
            skip: search.skip,
            take: search.take,
            search: search.search,
        };

        let agents = client.search_agents(&request).await?;
        debug!(count = agents.len(), "agent search finished");

        let mut state = config;
        state["agents"] = json!(agents.iter().map(agent_record).collect::<Vec<_>>());
        Ok(state)
    }
}
