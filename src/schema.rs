use serde_json::{Map, Value};

use crate::error::{ProviderError, ProviderResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeKind {
    String,
    Bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeMode {
    Required,
    Optional,
    /// Set by the provider only.
    Computed,
    /// Optional in configuration, filled in by the provider when omitted.
    OptionalComputed,
}

#[derive(Debug, Clone)]
pub struct Attribute {
    pub name: &'static str,
    pub kind: AttributeKind,
    pub mode: AttributeMode,
    pub description: &'static str,
    /// A change to this attribute forces delete-then-create.
    pub requires_replace: bool,
    /// Keep the prior state value in plans instead of marking it unknown.
    pub use_state_for_unknown: bool,
    pub sensitive: bool,
    pub default: Option<Value>,
}

impl Attribute {
    fn new(name: &'static str, kind: AttributeKind, mode: AttributeMode) -> Self {
        Self {
            name,
            kind,
            mode,
            description: "",
            requires_replace: false,
            use_state_for_unknown: false,
            sensitive: false,
            default: None,
        }
    }

    pub fn string(name: &'static str, mode: AttributeMode) -> Self {
        Self::new(name, AttributeKind::String, mode)
    }

    pub fn bool(name: &'static str, mode: AttributeMode) -> Self {
        Self::new(name, AttributeKind::Bool, mode)
    }

    pub fn describe(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    pub fn requires_replace(mut self) -> Self {
        self.requires_replace = true;
        self
    }

    pub fn use_state_for_unknown(mut self) -> Self {
        self.use_state_for_unknown = true;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Whether the user may set this attribute in configuration.
    pub fn is_configurable(&self) -> bool {
        self.mode != AttributeMode::Computed
    }

    fn accepts(&self, value: &Value) -> bool {
        match (self.kind, value) {
            (_, Value::Null) => self.mode != AttributeMode::Required,
            (AttributeKind::String, Value::String(_)) => true,
            (AttributeKind::Bool, Value::Bool(_)) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Schema {
    pub description: &'static str,
    pub attributes: Vec<Attribute>,
}

impl Schema {
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Check declared configuration against the schema.
    ///
    /// Attributes listed in `skip` hold values that are not known yet and are
    /// exempt from type checks.
    pub fn validate_config(
        &self,
        config: &Map<String, Value>,
        skip: &[String],
    ) -> ProviderResult<()> {
        for key in config.keys() {
            match self.attribute(key) {
                None => {
                    return Err(ProviderError::Validation(format!(
                        "unsupported attribute `{key}`"
                    )));
                }
                Some(attr) if !attr.is_configurable() => {
                    return Err(ProviderError::Validation(format!(
                        "attribute `{key}` is computed and cannot be set"
                    )));
                }
                Some(_) => {}
            }
        }

        for attr in &self.attributes {
            if skip.iter().any(|s| s == attr.name) {
                continue;
            }
            match config.get(attr.name) {
                None if attr.mode == AttributeMode::Required => {
                    return Err(ProviderError::Validation(format!(
                        "missing required attribute `{}`",
                        attr.name
                    )));
                }
                Some(value) if !attr.accepts(value) => {
                    return Err(ProviderError::Validation(format!(
                        "attribute `{}` expects a {:?} value",
                        attr.name, attr.kind
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// Optional behaviours a resource opts into.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// Needs the configured provider client.
    pub configure: bool,
    /// Supports adopting an existing remote entity by identifier.
    pub import: bool,
}

#[derive(Debug, Clone)]
pub struct ResourceDescriptor {
    pub type_name: String,
    pub schema: Schema,
    pub capabilities: Capabilities,
}

#[derive(Debug, Clone)]
pub struct DataSourceDescriptor {
    pub type_name: String,
    pub schema: Schema,
}
