//! Values exchanged between the protocol server and provider code.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Handshake prefix printed on stdout once the server is listening.
pub const HANDSHAKE_PREFIX: &str = "HEMMER_PROVIDER";

/// Plugin protocol version announced in the handshake.
pub const PROTOCOL_VERSION: u32 = 1;

/// One attribute's transition within a plan.
///
/// `before` is `None` for attributes being introduced and `after` is `None`
/// for attributes being removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeChange {
    pub path: String,
    pub before: Option<Value>,
    pub after: Option<Value>,
}

impl AttributeChange {
    pub fn added(path: impl Into<String>, after: Value) -> Self {
        Self {
            path: path.into(),
            before: None,
            after: Some(after),
        }
    }

    pub fn removed(path: impl Into<String>, before: Value) -> Self {
        Self {
            path: path.into(),
            before: Some(before),
            after: None,
        }
    }

    pub fn modified(path: impl Into<String>, before: Value, after: Value) -> Self {
        Self {
            path: path.into(),
            before: Some(before),
            after: Some(after),
        }
    }
}

fn encode_optional(value: Option<Value>) -> Vec<u8> {
    value
        .and_then(|v| serde_json::to_vec(&v).ok())
        .unwrap_or_default()
}

fn decode_optional(bytes: &[u8]) -> Option<Value> {
    if bytes.is_empty() {
        None
    } else {
        serde_json::from_slice(bytes).ok()
    }
}

impl From<AttributeChange> for crate::generated::AttributeChange {
    fn from(change: AttributeChange) -> Self {
        Self {
            path: change.path,
            before: encode_optional(change.before),
            after: encode_optional(change.after),
        }
    }
}

impl From<crate::generated::AttributeChange> for AttributeChange {
    fn from(proto: crate::generated::AttributeChange) -> Self {
        Self {
            before: decode_optional(&proto.before),
            after: decode_optional(&proto.after),
            path: proto.path,
        }
    }
}

/// Outcome of planning one resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanResult {
    /// State the host should expect after apply. Unknown computed values are null.
    pub planned_state: Value,
    pub changes: Vec<AttributeChange>,
    /// The remote object must be destroyed and created again.
    pub requires_replace: bool,
}

impl PlanResult {
    /// Nothing to do.
    pub fn no_change(state: Value) -> Self {
        Self {
            planned_state: state,
            changes: Vec::new(),
            requires_replace: false,
        }
    }

    /// An in-place update or a create.
    pub fn changed(planned_state: Value, changes: Vec<AttributeChange>) -> Self {
        Self {
            planned_state,
            changes,
            requires_replace: false,
        }
    }

    /// Mark the plan as replacing the remote object.
    pub fn replacing(mut self) -> Self {
        self.requires_replace = true;
        self
    }

    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }
}

/// A resource produced by `ImportResourceState`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportedResource {
    pub resource_type: String,
    pub state: Value,
}

impl ImportedResource {
    pub fn new(resource_type: impl Into<String>, state: Value) -> Self {
        Self {
            resource_type: resource_type.into(),
            state,
        }
    }
}

/// What `GetMetadata` reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProviderMetadata {
    pub resources: Vec<String>,
    pub data_sources: Vec<String>,
    pub capabilities: ServerCapabilities,
}

/// Optional protocol features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ServerCapabilities {
    /// The provider wants to be asked to plan destroys.
    pub plan_destroy: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_change_constructors() {
        let added = AttributeChange::added("agent_ids", json!([1, 2]));
        assert!(added.before.is_none());

        let removed = AttributeChange::removed("tags", json!(["edge"]));
        assert!(removed.after.is_none());

        let modified = AttributeChange::modified("sdn_enabled", json!(false), json!(true));
        assert_eq!(modified.before, Some(json!(false)));
        assert_eq!(modified.after, Some(json!(true)));
    }

    #[test]
    fn test_change_proto_encoding() {
        let proto: crate::generated::AttributeChange =
            AttributeChange::added("name", json!("edge-1")).into();
        assert!(proto.before.is_empty());
        assert_eq!(proto.after, b"\"edge-1\"".to_vec());

        let back: AttributeChange = proto.into();
        assert_eq!(back, AttributeChange::added("name", json!("edge-1")));
    }

    #[test]
    fn test_plan_result_builders() {
        let plan = PlanResult::no_change(json!({"id": 1}));
        assert!(!plan.has_changes());
        assert!(!plan.requires_replace);

        let plan = PlanResult::changed(
            json!({"name": "b"}),
            vec![AttributeChange::modified("name", json!("a"), json!("b"))],
        )
        .replacing();
        assert!(plan.has_changes());
        assert!(plan.requires_replace);
    }

    #[test]
    fn test_imported_resource() {
        let imported = ImportedResource::new("syntropystack_agent", json!({"id": 12}));
        assert_eq!(imported.resource_type, "syntropystack_agent");
        assert_eq!(imported.state["id"], 12);
    }
}
