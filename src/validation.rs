//! Checking JSON configuration against a [`Schema`].
//!
//! ```
//! use syntropystack_provider::schema::{Attribute, AttributeFlags, AttributeType, Schema};
//! use syntropystack_provider::validation::validate;
//! use serde_json::json;
//!
//! let schema = Schema::v0()
//!     .attribute("agent_peer", Attribute::set(AttributeType::Int64, AttributeFlags::REQUIRED))
//!     .attribute("sdn_enabled", Attribute::bool(AttributeFlags::OPTIONAL));
//!
//! assert!(validate(&schema, &json!({"agent_peer": [1, 2]})).is_empty());
//!
//! let diagnostics = validate(&schema, &json!({"agent_peer": [1, "two"]}));
//! assert_eq!(diagnostics[0].attribute.as_deref(), Some("agent_peer[1]"));
//! ```

use std::collections::BTreeSet;

use serde_json::{Map, Value};

use crate::schema::{Attribute, AttributeType, Block, BlockNestingMode, Diagnostic, NestedBlock, Schema};

/// Validate `value` against `schema`. An empty result means it is valid.
///
/// Required attributes must be present and non-null, computed-only
/// attributes are ignored, values must match their declared types, set
/// elements must be unique, and nested blocks must respect their item limits.
/// Non-null keys the schema does not know are rejected.
pub fn validate(schema: &Schema, value: &Value) -> Vec<Diagnostic> {
    let mut walker = Walker::default();
    walker.block(&schema.block, value, &Path::root());
    walker.diagnostics
}

/// [`validate`] as a `Result`.
pub fn validate_result(schema: &Schema, value: &Value) -> Result<(), Vec<Diagnostic>> {
    let diagnostics = validate(schema, value);
    if diagnostics.is_empty() {
        Ok(())
    } else {
        Err(diagnostics)
    }
}

/// Whether `value` passes [`validate`].
pub fn is_valid(schema: &Schema, value: &Value) -> bool {
    validate(schema, value).is_empty()
}

/// Whether any diagnostic is an error.
pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(Diagnostic::is_error)
}

#[derive(Debug, Clone, Default)]
struct Path(String);

impl Path {
    fn root() -> Self {
        Self(String::new())
    }

    fn key(&self, name: &str) -> Self {
        if self.0.is_empty() {
            Self(name.to_string())
        } else {
            Self(format!("{}.{}", self.0, name))
        }
    }

    fn index(&self, i: usize) -> Self {
        Self(format!("{}[{}]", self.0, i))
    }

    fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Default)]
struct Walker {
    diagnostics: Vec<Diagnostic>,
}

impl Walker {
    fn error(&mut self, path: &Path, summary: String, detail: Option<String>) {
        let mut diag = Diagnostic::error(summary);
        if let Some(detail) = detail {
            diag = diag.with_detail(detail);
        }
        if !path.as_str().is_empty() {
            diag = diag.with_attribute(path.as_str());
        }
        self.diagnostics.push(diag);
    }

    fn type_mismatch(&mut self, path: &Path, expected: &str, got: &Value) {
        self.error(
            path,
            format!("Expected {}", expected),
            Some(format!("Got {}", kind_of(got))),
        );
    }

    fn block(&mut self, block: &Block, value: &Value, path: &Path) {
        let obj = match value {
            Value::Null => return,
            Value::Object(obj) => obj,
            other => return self.type_mismatch(path, "object", other),
        };

        for (name, attr) in &block.attributes {
            self.attribute(attr, obj.get(name), &path.key(name));
        }
        for (name, nested) in &block.blocks {
            self.nested(nested, obj.get(name), &path.key(name));
        }
        for (name, v) in obj {
            let known = block.attributes.contains_key(name) || block.blocks.contains_key(name);
            if !known && !v.is_null() {
                self.error(
                    &path.key(name),
                    format!("Unsupported attribute '{}'", name),
                    None,
                );
            }
        }
    }

    fn attribute(&mut self, attr: &Attribute, value: Option<&Value>, path: &Path) {
        if !attr.flags.configurable() {
            return;
        }
        match value {
            None | Some(Value::Null) if attr.flags.required => self.error(
                path,
                format!("Missing required attribute '{}'", path.as_str()),
                Some("This attribute is required and must be provided".to_string()),
            ),
            None | Some(Value::Null) => {},
            Some(v) => self.value(&attr.attr_type, v, path),
        }
    }

    fn value(&mut self, ty: &AttributeType, value: &Value, path: &Path) {
        match ty {
            AttributeType::String if !value.is_string() => self.type_mismatch(path, "string", value),
            AttributeType::Int64 if !(value.is_i64() || value.is_u64()) => {
                self.type_mismatch(path, "int64", value)
            },
            AttributeType::Float64 if !value.is_number() => self.type_mismatch(path, "float64", value),
            AttributeType::Bool if !value.is_boolean() => self.type_mismatch(path, "bool", value),
            AttributeType::List(element) => self.sequence(element, value, path, false),
            AttributeType::Set(element) => self.sequence(element, value, path, true),
            AttributeType::Map(element) => match value.as_object() {
                Some(obj) => {
                    for (k, v) in obj {
                        self.value(element, v, &path.key(k));
                    }
                },
                None => self.type_mismatch(path, "map", value),
            },
            AttributeType::Object(fields) => match value.as_object() {
                Some(obj) => self.object(fields, obj, path),
                None => self.type_mismatch(path, "object", value),
            },
            _ => {},
        }
    }

    fn sequence(&mut self, element: &AttributeType, value: &Value, path: &Path, unique: bool) {
        let Some(items) = value.as_array() else {
            return self.type_mismatch(path, if unique { "set" } else { "list" }, value);
        };
        let mut seen = BTreeSet::new();
        for (i, item) in items.iter().enumerate() {
            self.value(element, item, &path.index(i));
            if unique && !seen.insert(item.to_string()) {
                self.error(
                    &path.index(i),
                    "Duplicate set element".to_string(),
                    Some(format!("{} appears more than once", item)),
                );
            }
        }
    }

    fn object(
        &mut self,
        fields: &std::collections::BTreeMap<String, AttributeType>,
        obj: &Map<String, Value>,
        path: &Path,
    ) {
        for (name, ty) in fields {
            if let Some(v) = obj.get(name).filter(|v| !v.is_null()) {
                self.value(ty, v, &path.key(name));
            }
        }
    }

    fn nested(&mut self, nested: &NestedBlock, value: Option<&Value>, path: &Path) {
        let value = value.filter(|v| !v.is_null());
        let count = match (nested.nesting_mode, value) {
            (_, None) => 0,
            (BlockNestingMode::Single, Some(v)) => {
                self.block(&nested.block, v, path);
                1
            },
            (BlockNestingMode::List | BlockNestingMode::Set, Some(Value::Array(items))) => {
                for (i, item) in items.iter().enumerate() {
                    self.block(&nested.block, item, &path.index(i));
                }
                items.len()
            },
            (BlockNestingMode::Map, Some(Value::Object(items))) => {
                for (k, item) in items {
                    self.block(&nested.block, item, &path.key(k));
                }
                items.len()
            },
            (BlockNestingMode::Map, Some(other)) => {
                self.type_mismatch(path, "map of blocks", other);
                return;
            },
            (_, Some(other)) => {
                self.type_mismatch(path, "list of blocks", other);
                return;
            },
        };

        let min = nested.min_items as usize;
        let max = nested.max_items as usize;
        if count < min {
            self.error(
                path,
                format!("Block '{}' requires at least {} item(s), got {}", path.as_str(), min, count),
                None,
            );
        }
        if max > 0 && count > max {
            self.error(
                path,
                format!("Block '{}' allows at most {} item(s), got {}", path.as_str(), max, count),
                None,
            );
        }
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::AttributeFlags;
    use serde_json::json;

    fn connection_schema() -> Schema {
        Schema::v0()
            .attribute("id", Attribute::int64(AttributeFlags::COMPUTED))
            .attribute("agent_peer", Attribute::set(AttributeType::Int64, AttributeFlags::REQUIRED))
            .attribute("sdn_enabled", Attribute::bool(AttributeFlags::OPTIONAL))
    }

    fn search_schema() -> Schema {
        Schema::v0()
            .attribute("take", Attribute::int64(AttributeFlags::OPTIONAL))
            .block(
                "filter",
                NestedBlock::single(
                    Block::new()
                        .attribute("name", Attribute::string(AttributeFlags::OPTIONAL))
                        .attribute("id", Attribute::set(AttributeType::Int64, AttributeFlags::OPTIONAL)),
                ),
            )
    }

    #[test]
    fn test_valid_config() {
        let diagnostics = validate(&connection_schema(), &json!({"agent_peer": [1, 2], "sdn_enabled": true}));
        assert!(diagnostics.is_empty(), "{:?}", diagnostics);
        assert!(is_valid(&connection_schema(), &json!({"agent_peer": [1, 2], "id": null})));
    }

    #[test]
    fn test_missing_required() {
        let diagnostics = validate(&connection_schema(), &json!({"sdn_enabled": false}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("agent_peer"));
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("agent_peer"));
    }

    #[test]
    fn test_wrong_type_reports_path() {
        let diagnostics = validate(&connection_schema(), &json!({"agent_peer": [1, 2], "sdn_enabled": "yes"}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].summary, "Expected bool");
        assert_eq!(diagnostics[0].detail.as_deref(), Some("Got string"));
    }

    #[test]
    fn test_float_is_not_int64() {
        let diagnostics = validate(&search_schema(), &json!({"take": 1.5}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("take"));
    }

    #[test]
    fn test_set_duplicates_rejected() {
        let diagnostics = validate(&connection_schema(), &json!({"agent_peer": [1, 1]}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].summary, "Duplicate set element");
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("agent_peer[1]"));
    }

    #[test]
    fn test_nested_block_paths() {
        let diagnostics = validate(&search_schema(), &json!({"filter": {"id": [1, "x"]}}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("filter.id[1]"));
    }

    #[test]
    fn test_single_block_as_list_rejected() {
        let diagnostics = validate(&search_schema(), &json!({"filter": [{"name": "a"}]}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].summary, "Expected object");
    }

    #[test]
    fn test_unknown_attribute() {
        let diagnostics = validate(&connection_schema(), &json!({"agent_peer": [1, 2], "peers": [3]}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].summary, "Unsupported attribute 'peers'");
    }

    #[test]
    fn test_list_block_limits() {
        let schema = Schema::v0().block(
            "services",
            NestedBlock::list(Block::new().attribute("id", Attribute::int64(AttributeFlags::REQUIRED)))
                .min_items(1)
                .max_items(2),
        );

        let diagnostics = validate(&schema, &json!({}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("at least 1"));

        let diagnostics = validate(&schema, &json!({"services": [{"id": 1}, {"id": 2}, {"id": 3}]}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("at most 2"));

        let diagnostics = validate(&schema, &json!({"services": [{}]}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("services[0].id"));
    }

    #[test]
    fn test_object_elements() {
        let schema = Schema::v0().attribute(
            "services",
            Attribute::set(
                AttributeType::object([("id", AttributeType::Int64), ("enabled", AttributeType::Bool)]),
                AttributeFlags::REQUIRED,
            ),
        );
        assert!(is_valid(&schema, &json!({"services": [{"id": 1, "enabled": true}]})));

        let diagnostics = validate(&schema, &json!({"services": [{"id": 1, "enabled": "on"}]}));
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("services[0].enabled"));
    }

    #[test]
    fn test_non_object_root() {
        let diagnostics = validate(&connection_schema(), &json!([1, 2]));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].attribute.is_none());
    }

    #[test]
    fn test_result_helpers() {
        assert!(validate_result(&connection_schema(), &json!({"agent_peer": [1, 2]})).is_ok());
        let errs = validate_result(&connection_schema(), &json!({})).unwrap_err();
        assert!(has_errors(&errs));
        assert!(!has_errors(&[Diagnostic::warning("w")]));
    }
}
