//! Schema-driven planning shared by every resource.
//!
//! Changes are tracked per top-level attribute or block. A changed attribute
//! marked `force_new` turns the plan into a replacement. Computed attributes
//! the configuration leaves unset are planned as unknown (null) unless they
//! are marked `preserve_unknown`, in which case the prior value carries over.

use serde_json::{Map, Value};

use crate::schema::{AttributeType, Schema};
use crate::types::{AttributeChange, PlanResult};

/// Path used for the single change of a destroy plan.
pub const ROOT_PATH: &str = "";

/// Plan the transition from `prior` to `proposed`.
///
/// - `prior` absent or null: create.
/// - `proposed` null: destroy.
/// - otherwise: update or no-op.
pub fn plan(schema: &Schema, prior: Option<&Value>, proposed: &Value) -> PlanResult {
    let prior = prior.filter(|p| !p.is_null());
    match (prior, proposed) {
        (None, proposed) => plan_create(schema, proposed),
        (Some(prior), Value::Null) => PlanResult::changed(
            Value::Null,
            vec![AttributeChange::removed(ROOT_PATH, prior.clone())],
        ),
        (Some(prior), proposed) => plan_update(schema, prior, proposed),
    }
}

fn as_object(value: &Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

fn is_unset(value: Option<&Value>) -> bool {
    value.map_or(true, Value::is_null)
}

fn plan_create(schema: &Schema, proposed: &Value) -> PlanResult {
    let mut planned = as_object(proposed);

    for (name, attr) in &schema.block.attributes {
        if !is_unset(planned.get(name)) {
            continue;
        }
        let value = attr.default.clone().unwrap_or(Value::Null);
        planned.insert(name.clone(), value);
    }

    let changes = planned
        .iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| AttributeChange::added(k.clone(), v.clone()))
        .collect();

    PlanResult::changed(Value::Object(planned), changes)
}

fn plan_update(schema: &Schema, prior: &Value, proposed: &Value) -> PlanResult {
    let prior = as_object(prior);
    let mut planned = as_object(proposed);
    let mut changes = Vec::new();
    let mut requires_replace = false;

    for (name, attr) in &schema.block.attributes {
        if !attr.flags.configurable() {
            continue;
        }
        if is_unset(planned.get(name)) {
            if attr.flags.computed {
                continue;
            }
            if let Some(default) = &attr.default {
                planned.insert(name.clone(), default.clone());
            }
        }
        if let Some(change) = diff(name, Some(&attr.attr_type), prior.get(name), planned.get(name)) {
            requires_replace |= attr.force_new;
            changes.push(change);
        }
    }

    for name in schema.block.blocks.keys() {
        if let Some(change) = diff(name, None, prior.get(name), planned.get(name)) {
            changes.push(change);
        }
    }

    // Computed values: keep prior when nothing changed or when asked to.
    for (name, attr) in &schema.block.attributes {
        if !attr.flags.computed || !is_unset(planned.get(name)) {
            continue;
        }
        let keep_prior = changes.is_empty() || attr.preserve_unknown;
        let value = if keep_prior {
            prior.get(name).cloned().unwrap_or(Value::Null)
        } else {
            Value::Null
        };
        planned.insert(name.clone(), value);
    }

    let planned = Value::Object(planned);
    if changes.is_empty() {
        return PlanResult::no_change(planned);
    }
    let result = PlanResult::changed(planned, changes);
    if requires_replace {
        result.replacing()
    } else {
        result
    }
}

fn diff(
    name: &str,
    ty: Option<&AttributeType>,
    before: Option<&Value>,
    after: Option<&Value>,
) -> Option<AttributeChange> {
    let before = before.filter(|v| !v.is_null());
    let after = after.filter(|v| !v.is_null());
    match (before, after) {
        (None, None) => None,
        (None, Some(a)) => Some(AttributeChange::added(name, a.clone())),
        (Some(b), None) => Some(AttributeChange::removed(name, b.clone())),
        (Some(b), Some(a)) if equivalent(ty, b, a) => None,
        (Some(b), Some(a)) => Some(AttributeChange::modified(name, b.clone(), a.clone())),
    }
}

/// Equality that ignores element order for sets.
fn equivalent(ty: Option<&AttributeType>, a: &Value, b: &Value) -> bool {
    match (ty, a, b) {
        (Some(AttributeType::Set(_)), Value::Array(x), Value::Array(y)) => {
            let mut x: Vec<String> = x.iter().map(Value::to_string).collect();
            let mut y: Vec<String> = y.iter().map(Value::to_string).collect();
            x.sort();
            y.sort();
            x == y
        },
        _ => a == b,
    }
}
