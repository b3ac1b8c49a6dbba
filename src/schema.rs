//! Schema model for the provider, its resources and data sources.
//!
//! Schemas are sent to the host in `GetSchema`, drive config validation
//! ([`crate::validation`]) and drive planning ([`crate::plan`]).
//!
//! ```
//! use syntropystack_provider::schema::{Attribute, AttributeFlags, AttributeType, Schema};
//!
//! let schema = Schema::v0()
//!     .attribute("id", Attribute::int64(AttributeFlags::COMPUTED).preserve_unknown())
//!     .attribute("name", Attribute::string(AttributeFlags::REQUIRED).force_new())
//!     .attribute("tags", Attribute::set(AttributeType::String, AttributeFlags::OPTIONAL));
//!
//! assert!(schema.block.attributes["name"].force_new);
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Value type of an attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    String,
    Int64,
    Float64,
    Bool,
    List(Box<AttributeType>),
    Set(Box<AttributeType>),
    Map(Box<AttributeType>),
    Object(BTreeMap<String, AttributeType>),
    /// Any JSON value.
    Dynamic,
}

impl AttributeType {
    /// List of `element`.
    pub fn list(element: AttributeType) -> Self {
        Self::List(Box::new(element))
    }

    /// Set of `element`.
    pub fn set(element: AttributeType) -> Self {
        Self::Set(Box::new(element))
    }

    /// Map from string to `element`.
    pub fn map(element: AttributeType) -> Self {
        Self::Map(Box::new(element))
    }

    /// Object with the given fields.
    pub fn object<I, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, AttributeType)>,
        K: Into<String>,
    {
        Self::Object(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Short name used in diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Int64 => "int64",
            Self::Float64 => "float64",
            Self::Bool => "bool",
            Self::List(_) => "list",
            Self::Set(_) => "set",
            Self::Map(_) => "map",
            Self::Object(_) => "object",
            Self::Dynamic => "dynamic",
        }
    }
}

/// How an attribute may appear in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AttributeFlags {
    pub required: bool,
    pub optional: bool,
    /// Set by the provider.
    pub computed: bool,
    /// Hidden from plan output and logs by the host.
    pub sensitive: bool,
}

impl AttributeFlags {
    /// Must be set in configuration.
    pub const REQUIRED: Self = Self {
        required: true,
        optional: false,
        computed: false,
        sensitive: false,
    };

    /// May be set in configuration.
    pub const OPTIONAL: Self = Self {
        required: false,
        optional: true,
        computed: false,
        sensitive: false,
    };

    /// Only ever set by the provider.
    pub const COMPUTED: Self = Self {
        required: false,
        optional: false,
        computed: true,
        sensitive: false,
    };

    /// May be configured; the provider fills it in otherwise.
    pub const OPTIONAL_COMPUTED: Self = Self {
        required: false,
        optional: true,
        computed: true,
        sensitive: false,
    };

    /// Whether configuration may set this attribute.
    pub fn configurable(&self) -> bool {
        self.required || self.optional
    }
}

/// A single attribute of a block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    #[serde(rename = "type")]
    pub attr_type: AttributeType,
    #[serde(flatten)]
    pub flags: AttributeFlags,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Changing the value replaces the remote object.
    #[serde(default)]
    pub force_new: bool,
    /// When the provider would leave the value unknown, keep the prior state
    /// value instead.
    #[serde(default)]
    pub preserve_unknown: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
}

impl Attribute {
    /// Attribute of any type.
    pub fn new(attr_type: AttributeType, flags: AttributeFlags) -> Self {
        Self {
            attr_type,
            flags,
            description: None,
            force_new: false,
            preserve_unknown: false,
            default: None,
        }
    }

    pub fn string(flags: AttributeFlags) -> Self {
        Self::new(AttributeType::String, flags)
    }

    pub fn int64(flags: AttributeFlags) -> Self {
        Self::new(AttributeType::Int64, flags)
    }

    pub fn bool(flags: AttributeFlags) -> Self {
        Self::new(AttributeType::Bool, flags)
    }

    pub fn set(element: AttributeType, flags: AttributeFlags) -> Self {
        Self::new(AttributeType::set(element), flags)
    }

    pub fn list(element: AttributeType, flags: AttributeFlags) -> Self {
        Self::new(AttributeType::list(element), flags)
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    pub fn preserve_unknown(mut self) -> Self {
        self.preserve_unknown = true;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.flags.sensitive = true;
        self
    }

    pub fn default_value(mut self, value: serde_json::Value) -> Self {
        self.default = Some(value);
        self
    }
}

/// How a nested block repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BlockNestingMode {
    /// At most one block.
    #[default]
    Single,
    List,
    Set,
    Map,
}

/// A group of attributes and nested blocks.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Block {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, Attribute>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub blocks: BTreeMap<String, NestedBlock>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Block {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attribute(mut self, name: impl Into<String>, attr: Attribute) -> Self {
        self.attributes.insert(name.into(), attr);
        self
    }

    pub fn block(mut self, name: impl Into<String>, block: NestedBlock) -> Self {
        self.blocks.insert(name.into(), block);
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A block nested under a parent, with cardinality limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NestedBlock {
    #[serde(flatten)]
    pub block: Block,
    #[serde(default)]
    pub nesting_mode: BlockNestingMode,
    #[serde(default)]
    pub min_items: u32,
    /// 0 means unlimited.
    #[serde(default)]
    pub max_items: u32,
}

impl NestedBlock {
    fn with_mode(block: Block, nesting_mode: BlockNestingMode, max_items: u32) -> Self {
        Self {
            block,
            nesting_mode,
            min_items: 0,
            max_items,
        }
    }

    pub fn single(block: Block) -> Self {
        Self::with_mode(block, BlockNestingMode::Single, 1)
    }

    pub fn list(block: Block) -> Self {
        Self::with_mode(block, BlockNestingMode::List, 0)
    }

    pub fn set(block: Block) -> Self {
        Self::with_mode(block, BlockNestingMode::Set, 0)
    }

    pub fn map(block: Block) -> Self {
        Self::with_mode(block, BlockNestingMode::Map, 0)
    }

    pub fn min_items(mut self, min: u32) -> Self {
        self.min_items = min;
        self
    }

    pub fn max_items(mut self, max: u32) -> Self {
        self.max_items = max;
        self
    }
}

/// Schema of a resource, a data source, or the provider block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// Bumped when the state layout changes.
    #[serde(default)]
    pub version: u64,
    #[serde(flatten)]
    pub block: Block,
}

impl Default for Schema {
    fn default() -> Self {
        Self::v0()
    }
}

impl Schema {
    pub fn new(version: u64) -> Self {
        Self {
            version,
            block: Block::new(),
        }
    }

    pub fn v0() -> Self {
        Self::new(0)
    }

    pub fn attribute(mut self, name: impl Into<String>, attr: Attribute) -> Self {
        self.block.attributes.insert(name.into(), attr);
        self
    }

    pub fn block(mut self, name: impl Into<String>, block: NestedBlock) -> Self {
        self.block.blocks.insert(name.into(), block);
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.block.description = Some(description.into());
        self
    }
}

/// Everything `GetSchema` returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ProviderSchema {
    #[serde(default)]
    pub provider: Schema,
    #[serde(default)]
    pub resources: BTreeMap<String, Schema>,
    #[serde(default)]
    pub data_sources: BTreeMap<String, Schema>,
}

/// Severity of a [`Diagnostic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    Error,
    Warning,
}

/// A problem reported back to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: DiagnosticSeverity,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Dotted path of the offending attribute, e.g. `filter.modified_at_from`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
}

impl Diagnostic {
    fn with_severity(severity: DiagnosticSeverity, summary: String) -> Self {
        Self {
            severity,
            summary,
            detail: None,
            attribute: None,
        }
    }

    pub fn error(summary: impl Into<String>) -> Self {
        Self::with_severity(DiagnosticSeverity::Error, summary.into())
    }

    pub fn warning(summary: impl Into<String>) -> Self {
        Self::with_severity(DiagnosticSeverity::Warning, summary.into())
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == DiagnosticSeverity::Error
    }
}
