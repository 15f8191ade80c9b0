use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::schema::{Attribute, AttributeMode, Schema};

pub type Attributes = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    NoOp,
    Create,
    Update,
    /// Delete the existing entity, then create a new one.
    Replace,
    Delete,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Action::NoOp => "no changes",
            Action::Create => "create",
            Action::Update => "update in place",
            Action::Replace => "replace",
            Action::Delete => "destroy",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Change {
    pub action: Action,
    /// Configurable attributes whose desired value differs from state.
    pub changed: Vec<String>,
    /// The subset of `changed` that forces replacement.
    pub replace_triggers: Vec<String>,
}

/// Decide what it takes to move from `prior` state to `desired` configuration.
pub fn diff(schema: &Schema, prior: Option<&Attributes>, desired: Option<&Attributes>) -> Change {
    let (prior, desired) = match (prior, desired) {
        (None, None) => return change(Action::NoOp, Vec::new(), Vec::new()),
        (Some(_), None) => return change(Action::Delete, Vec::new(), Vec::new()),
        (None, Some(desired)) => {
            let set = schema
                .attributes
                .iter()
                .filter(|a| a.is_configurable() && desired_value(a, desired).is_some())
                .map(|a| a.name.to_string())
                .collect();
            return change(Action::Create, set, Vec::new());
        }
        (Some(prior), Some(desired)) => (prior, desired),
    };

    let mut changed = Vec::new();
    let mut replace_triggers = Vec::new();
    for attr in schema.attributes.iter().filter(|a| a.is_configurable()) {
        let want = desired_value(attr, desired);
        let have = present(prior.get(attr.name));
        if want != have {
            changed.push(attr.name.to_string());
            if attr.requires_replace {
                replace_triggers.push(attr.name.to_string());
            }
        }
    }

    let action = if !replace_triggers.is_empty() {
        Action::Replace
    } else if !changed.is_empty() {
        Action::Update
    } else {
        Action::NoOp
    };
    change(action, changed, replace_triggers)
}

/// The attribute map handed to create or update.
///
/// Configurable attributes come from `desired` (with defaults applied).
/// Computed attributes are carried from `prior` when they keep their state
/// value across plans; pass `None` for a fresh entity.
pub fn proposed(schema: &Schema, prior: Option<&Attributes>, desired: &Attributes) -> Attributes {
    let mut out = Attributes::new();
    for attr in &schema.attributes {
        let value = match attr.mode {
            AttributeMode::Computed => prior
                .filter(|_| attr.use_state_for_unknown)
                .and_then(|p| present(p.get(attr.name))),
            AttributeMode::OptionalComputed => desired_value(attr, desired)
                .or_else(|| prior.and_then(|p| present(p.get(attr.name)))),
            AttributeMode::Required | AttributeMode::Optional => desired_value(attr, desired),
        };
        if let Some(value) = value {
            out.insert(attr.name.to_string(), value);
        }
    }
    out
}

fn desired_value(attr: &Attribute, desired: &Attributes) -> Option<Value> {
    present(desired.get(attr.name)).or_else(|| attr.default.clone())
}

fn present(value: Option<&Value>) -> Option<Value> {
    value.filter(|v| !v.is_null()).cloned()
}

fn change(action: Action, changed: Vec<String>, replace_triggers: Vec<String>) -> Change {
    Change {
        action,
        changed,
        replace_triggers,
    }
}
