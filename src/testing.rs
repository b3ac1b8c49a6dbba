//! Harness for driving a [`ProviderService`] without a gRPC server.
//!
//! ```ignore
//! use syntropystack_provider::testing::ProviderTester;
//! use syntropystack_provider::SyntropyProvider;
//! use serde_json::json;
//!
//! let tester = ProviderTester::new(SyntropyProvider::new());
//! tester.configure(json!({"access_token": "t", "api_url": server.uri()})).await?;
//! let state = tester
//!     .lifecycle_create("syntropystack_agent", json!({"name": "edge-1", "provider_id": 3}))
//!     .await?;
//! ```

use serde_json::Value;
use thiserror::Error;

use crate::error::ProviderError;
use crate::schema::{Diagnostic, ProviderSchema};
use crate::server::ProviderService;
use crate::types::{ImportedResource, PlanResult};

/// Calls [`ProviderService`] operations directly, the way the host would.
pub struct ProviderTester<P: ProviderService> {
    provider: P,
}

impl<P: ProviderService> ProviderTester<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn schema(&self) -> ProviderSchema {
        self.provider.schema()
    }

    pub fn resource_types(&self) -> Vec<String> {
        self.provider.metadata().resources
    }

    pub fn data_source_types(&self) -> Vec<String> {
        self.provider.metadata().data_sources
    }

    // -------------------------------------------------------------------------
    // Provider
    // -------------------------------------------------------------------------

    /// Fails when validation reports any error diagnostic.
    pub async fn validate_provider_config(&self, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.validate_provider_config(config).await?;
        check_diagnostics(diagnostics)
    }

    /// Fails when configuration reports any error diagnostic.
    pub async fn configure(&self, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.configure(config).await?;
        check_diagnostics(diagnostics)
    }

    pub async fn stop(&self) -> Result<(), ProviderError> {
        self.provider.stop().await
    }

    // -------------------------------------------------------------------------
    // Resources
    // -------------------------------------------------------------------------

    pub async fn validate_resource_config(&self, resource_type: &str, config: Value) -> Result<(), TestError> {
        let diagnostics = self
            .provider
            .validate_resource_config(resource_type, config)
            .await?;
        check_diagnostics(diagnostics)
    }

    /// Plan with no prior state, using `config` as the proposed state.
    pub async fn plan_create(&self, resource_type: &str, config: Value) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, None, config.clone(), config)
            .await
    }

    pub async fn plan_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        config: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, Some(prior_state), config.clone(), config)
            .await
    }

    pub async fn plan_delete(&self, resource_type: &str, prior_state: Value) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, Some(prior_state), Value::Null, Value::Null)
            .await
    }

    pub async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError> {
        self.provider.create(resource_type, planned_state).await
    }

    /// `Ok(None)` means the host would drop the resource from state.
    pub async fn read(&self, resource_type: &str, current_state: Value) -> Result<Option<Value>, ProviderError> {
        self.provider.read(resource_type, current_state).await
    }

    pub async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider
            .update(resource_type, prior_state, planned_state)
            .await
    }

    pub async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        self.provider.delete(resource_type, current_state).await
    }

    pub async fn import_resource(&self, resource_type: &str, id: &str) -> Result<Vec<ImportedResource>, ProviderError> {
        self.provider.import_resource(resource_type, id).await
    }

    // -------------------------------------------------------------------------
    // Data sources
    // -------------------------------------------------------------------------

    pub async fn validate_data_source_config(&self, data_source_type: &str, config: Value) -> Result<(), TestError> {
        let diagnostics = self
            .provider
            .validate_data_source_config(data_source_type, config)
            .await?;
        check_diagnostics(diagnostics)
    }

    pub async fn read_data_source(&self, data_source_type: &str, config: Value) -> Result<Value, ProviderError> {
        self.provider
            .read_data_source(data_source_type, config)
            .await
    }

    // -------------------------------------------------------------------------
    // Lifecycles
    // -------------------------------------------------------------------------

    /// Plan, create, then read back. A resource that vanishes on the read is
    /// reported as [`ProviderError::NotFound`].
    pub async fn lifecycle_create(&self, resource_type: &str, config: Value) -> Result<Value, ProviderError> {
        let plan = self.plan_create(resource_type, config).await?;
        let created = self.create(resource_type, plan.planned_state).await?;
        self.read_back(resource_type, created).await
    }

    /// Plan, update, then read back.
    pub async fn lifecycle_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let plan = self
            .plan_update(resource_type, prior_state.clone(), config)
            .await?;
        let updated = self
            .update(resource_type, prior_state, plan.planned_state)
            .await?;
        self.read_back(resource_type, updated).await
    }

    /// Plan a destroy, then delete.
    pub async fn lifecycle_delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        self.plan_delete(resource_type, current_state.clone())
            .await?;
        self.delete(resource_type, current_state).await
    }

    /// Create, update and delete. Returns the state read after the update.
    pub async fn lifecycle_crud(
        &self,
        resource_type: &str,
        initial_config: Value,
        updated_config: Value,
    ) -> Result<Value, ProviderError> {
        let created = self
            .lifecycle_create(resource_type, initial_config)
            .await?;
        let updated = self
            .lifecycle_update(resource_type, created, updated_config)
            .await?;
        self.lifecycle_delete(resource_type, updated.clone())
            .await?;
        Ok(updated)
    }

    async fn read_back(&self, resource_type: &str, state: Value) -> Result<Value, ProviderError> {
        self.read(resource_type, state)
            .await?
            .ok_or_else(|| ProviderError::NotFound(format!("{} disappeared right after apply", resource_type)))
    }
}

/// Failure of a tester call that reports diagnostics.
#[derive(Debug, Error)]
pub enum TestError {
    #[error("operation failed with {}", summarize(.0))]
    Diagnostics(Vec<Diagnostic>),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

fn summarize(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(|d| {
            let mut line = d.summary.clone();
            if let Some(detail) = &d.detail {
                line.push_str(": ");
                line.push_str(detail);
            }
            if let Some(attribute) = &d.attribute {
                line.push_str(&format!(" (at {})", attribute));
            }
            line
        })
        .collect::<Vec<_>>()
        .join("; ")
}

fn check_diagnostics(diagnostics: Vec<Diagnostic>) -> Result<(), TestError> {
    let errors: Vec<_> = diagnostics.into_iter().filter(Diagnostic::is_error).collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(TestError::Diagnostics(errors))
    }
}

// -----------------------------------------------------------------------------
// Assertions
// -----------------------------------------------------------------------------

fn changed_paths(plan: &PlanResult) -> Vec<&str> {
    plan.changes.iter().map(|c| c.path.as_str()).collect()
}

/// Every change of the plan introduces a value.
pub fn assert_plan_creates(plan: &PlanResult) {
    assert!(plan.has_changes(), "expected a create plan, got no changes");
    assert!(
        plan.changes.iter().all(|c| c.before.is_none()),
        "expected a create plan, got modifications of {:?}",
        changed_paths(plan)
    );
    assert!(!plan.requires_replace, "expected a create, not a replace");
}

pub fn assert_plan_no_changes(plan: &PlanResult) {
    assert!(
        !plan.has_changes(),
        "expected no changes, got {:?}",
        changed_paths(plan)
    );
}

pub fn assert_plan_requires_replace(plan: &PlanResult) {
    assert!(
        plan.requires_replace,
        "expected a replacement, changes were {:?}",
        changed_paths(plan)
    );
}

pub fn assert_plan_updates_in_place(plan: &PlanResult) {
    assert!(plan.has_changes(), "expected an in-place update, got no changes");
    assert!(
        !plan.requires_replace,
        "expected an in-place update, got a replacement"
    );
}

pub fn assert_plan_changes_attribute(plan: &PlanResult, path: &str) {
    assert!(
        plan.changes.iter().any(|c| c.path == path),
        "expected '{}' to change, changed: {:?}",
        path,
        changed_paths(plan)
    );
}

pub fn assert_no_errors(diagnostics: &[Diagnostic]) {
    let errors: Vec<_> = diagnostics
        .iter()
        .filter(|d| d.is_error())
        .map(|d| d.summary.as_str())
        .collect();
    assert!(errors.is_empty(), "expected no errors, got {:?}", errors);
}

pub fn assert_has_errors(diagnostics: &[Diagnostic]) {
    assert!(
        diagnostics.iter().any(Diagnostic::is_error),
        "expected at least one error"
    );
}

/// Some error diagnostic's summary or detail contains `needle`.
pub fn assert_error_contains(diagnostics: &[Diagnostic], needle: &str) {
    let found = diagnostics.iter().filter(|d| d.is_error()).any(|d| {
        d.summary.contains(needle) || d.detail.as_deref().is_some_and(|detail| detail.contains(needle))
    });
    assert!(
        found,
        "expected an error mentioning '{}', got {:?}",
        needle,
        diagnostics.iter().map(|d| &d.summary).collect::<Vec<_>>()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Attribute, AttributeFlags, Schema};
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    /// Stores tags by id. A tag named "ghost" vanishes as soon as it is created.
    #[derive(Default)]
    struct TagStore {
        tags: Mutex<BTreeMap<i64, String>>,
    }

    fn tag_schema() -> Schema {
        Schema::v0()
            .attribute("id", Attribute::int64(AttributeFlags::COMPUTED).preserve_unknown())
            .attribute("name", Attribute::string(AttributeFlags::REQUIRED))
    }

    #[async_trait::async_trait]
    impl ProviderService for TagStore {
        fn schema(&self) -> ProviderSchema {
            let mut schema = ProviderSchema::default();
            schema.resources.insert("tag".into(), tag_schema());
            schema
        }

        async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
            if config.get("access_token").is_none() {
                return Ok(vec![Diagnostic::error("Missing access token").with_attribute("access_token")]);
            }
            Ok(vec![])
        }

        async fn plan(
            &self,
            _resource_type: &str,
            prior_state: Option<Value>,
            proposed_state: Value,
            _config: Value,
        ) -> Result<PlanResult, ProviderError> {
            Ok(crate::plan::plan(&tag_schema(), prior_state.as_ref(), &proposed_state))
        }

        async fn create(&self, _resource_type: &str, mut planned: Value) -> Result<Value, ProviderError> {
            let mut tags = self.tags.lock().unwrap();
            let id = tags.len() as i64 + 1;
            let name = planned["name"].as_str().unwrap_or_default().to_string();
            if name != "ghost" {
                tags.insert(id, name);
            }
            planned["id"] = json!(id);
            Ok(planned)
        }

        async fn read(&self, _resource_type: &str, current: Value) -> Result<Option<Value>, ProviderError> {
            let id = current["id"].as_i64().unwrap_or_default();
            Ok(self
                .tags
                .lock()
                .unwrap()
                .get(&id)
                .map(|name| json!({"id": id, "name": name})))
        }

        async fn update(&self, _resource_type: &str, _prior: Value, planned: Value) -> Result<Value, ProviderError> {
            let id = planned["id"].as_i64().unwrap_or_default();
            let name = planned["name"].as_str().unwrap_or_default().to_string();
            self.tags.lock().unwrap().insert(id, name);
            Ok(planned)
        }

        async fn delete(&self, _resource_type: &str, current: Value) -> Result<(), ProviderError> {
            let id = current["id"].as_i64().unwrap_or_default();
            self.tags
                .lock()
                .unwrap()
                .remove(&id)
                .map(|_| ())
                .ok_or_else(|| ProviderError::NotFound(id.to_string()))
        }
    }

    #[tokio::test]
    async fn test_configure_surfaces_diagnostics() {
        let tester = ProviderTester::new(TagStore::default());
        assert!(tester.configure(json!({"access_token": "t"})).await.is_ok());

        let err = tester.configure(json!({})).await.unwrap_err();
        assert!(matches!(err, TestError::Diagnostics(ref d) if d.len() == 1));
        assert!(err.to_string().contains("Missing access token (at access_token)"));
    }

    #[tokio::test]
    async fn test_plan_create_and_update() {
        let tester = ProviderTester::new(TagStore::default());
        let plan = tester.plan_create("tag", json!({"name": "edge"})).await.unwrap();
        assert_plan_creates(&plan);

        let plan = tester
            .plan_update("tag", json!({"id": 1, "name": "edge"}), json!({"name": "core"}))
            .await
            .unwrap();
        assert_plan_updates_in_place(&plan);
        assert_plan_changes_attribute(&plan, "name");
        assert_eq!(plan.planned_state["id"], 1);

        let plan = tester
            .plan_update("tag", json!({"id": 1, "name": "edge"}), json!({"name": "edge"}))
            .await
            .unwrap();
        assert_plan_no_changes(&plan);
    }

    #[tokio::test]
    async fn test_lifecycle_crud() {
        let tester = ProviderTester::new(TagStore::default());
        let state = tester
            .lifecycle_crud("tag", json!({"name": "edge"}), json!({"name": "core"}))
            .await
            .unwrap();

        assert_eq!(state, json!({"id": 1, "name": "core"}));
        assert!(tester.read("tag", state).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_lifecycle_create_reports_vanished_resource() {
        let tester = ProviderTester::new(TagStore::default());
        let err = tester
            .lifecycle_create("tag", json!({"name": "ghost"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_import_is_unimplemented_by_default() {
        let tester = ProviderTester::new(TagStore::default());
        let err = tester.import_resource("tag", "1").await.unwrap_err();
        assert!(matches!(err, ProviderError::Unimplemented(_)));
    }

    #[test]
    fn test_metadata_lists_resources() {
        let tester = ProviderTester::new(TagStore::default());
        assert_eq!(tester.resource_types(), vec!["tag".to_string()]);
        assert!(tester.data_source_types().is_empty());
    }

    #[test]
    fn test_error_assertions() {
        let diagnostics = vec![
            Diagnostic::warning("deprecated"),
            Diagnostic::error("Invalid date").with_detail("expected RFC3339"),
        ];
        assert_has_errors(&diagnostics);
        assert_error_contains(&diagnostics, "Invalid date");
        assert_error_contains(&diagnostics, "RFC3339");
        assert_no_errors(&diagnostics[..1]);
    }

    #[test]
    #[should_panic(expected = "expected no errors")]
    fn test_assert_no_errors_panics() {
        assert_no_errors(&[Diagnostic::error("boom")]);
    }

    #[test]
    #[should_panic(expected = "expected a replacement")]
    fn test_assert_replace_panics() {
        assert_plan_requires_replace(&PlanResult::no_change(Value::Null));
    }
}
