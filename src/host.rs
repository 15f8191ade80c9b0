//! Local development host: drives refresh, plan, apply, destroy and import
//! for a YAML manifest, keeping state in a JSON snapshot.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::ProviderConfig;
use crate::plan::{self, Action, Attributes, Change};
use crate::provider::Registry;
use crate::schema::Schema;

const STATE_VERSION: u32 = 1;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub resources: Vec<Declaration>,
    #[serde(default)]
    pub data: Vec<Declaration>,
}

impl Manifest {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read manifest: {}", path.display()))?;
        Self::from_yaml(&content)
            .with_context(|| format!("failed to parse manifest: {}", path.display()))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let manifest: Manifest = serde_yaml::from_str(content)?;
        let mut seen = std::collections::HashSet::new();
        for decl in manifest.resources.iter().chain(manifest.data.iter()) {
            if decl.name.is_empty() {
                bail!("declaration of type {} has an empty name", decl.type_name);
            }
        }
        for decl in &manifest.resources {
            if !seen.insert(decl.address()) {
                bail!("resource {} is declared more than once", decl.address());
            }
        }
        Ok(manifest)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Declaration {
    #[serde(rename = "type")]
    pub type_name: String,
    pub name: String,
    #[serde(default)]
    pub config: Attributes,
}

impl Declaration {
    pub fn address(&self) -> String {
        format!("{}.{}", self.type_name, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateEntry {
    #[serde(rename = "type")]
    pub type_name: String,
    pub name: String,
    pub attributes: Attributes,
}

impl StateEntry {
    pub fn address(&self) -> String {
        format!("{}.{}", self.type_name, self.name)
    }
}

/// Plain snapshot of managed entities, in the order they were created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateFile {
    pub version: u32,
    #[serde(default)]
    pub resources: Vec<StateEntry>,
}

impl Default for StateFile {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            resources: Vec::new(),
        }
    }
}

impl StateFile {
    /// A missing file is an empty state.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read state file: {}", path.display()))?;
        let state: StateFile = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse state file: {}", path.display()))?;
        if state.version != STATE_VERSION {
            bail!(
                "unsupported state version {} in {}",
                state.version,
                path.display()
            );
        }
        Ok(state)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(self).context("failed to serialize state")?;
        std::fs::write(path, content)
            .with_context(|| format!("failed to write state file: {}", path.display()))?;
        Ok(())
    }

    pub fn get(&self, type_name: &str, name: &str) -> Option<&StateEntry> {
        self.resources
            .iter()
            .find(|e| e.type_name == type_name && e.name == name)
    }

    pub fn upsert(&mut self, type_name: &str, name: &str, attributes: Attributes) {
        match self
            .resources
            .iter_mut()
            .find(|e| e.type_name == type_name && e.name == name)
        {
            Some(entry) => entry.attributes = attributes,
            None => self.resources.push(StateEntry {
                type_name: type_name.to_string(),
                name: name.to_string(),
                attributes,
            }),
        }
    }

    pub fn remove(&mut self, type_name: &str, name: &str) -> Option<StateEntry> {
        let index = self
            .resources
            .iter()
            .position(|e| e.type_name == type_name && e.name == name)?;
        Some(self.resources.remove(index))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedChange {
    pub address: String,
    #[serde(flatten)]
    pub change: Change,
}

/// Data source results keyed by `type.name`.
pub type DataResults = BTreeMap<String, Attributes>;

pub struct Host {
    registry: Registry,
}

impl Host {
    pub fn new(registry: Registry) -> Self {
        Self { registry }
    }

    /// Re-read every entity in state. Entities reported gone are dropped.
    pub async fn refresh(&self, state: &mut StateFile) -> Result<()> {
        let mut refreshed = Vec::with_capacity(state.resources.len());
        for entry in &state.resources {
            let resource = self.registry.resource(&entry.type_name)?;
            let current = resource
                .read(Value::Object(entry.attributes.clone()))
                .await
                .with_context(|| format!("failed to refresh {}", entry.address()))?;
            match current {
                Some(value) => refreshed.push(StateEntry {
                    attributes: into_attributes(value)?,
                    ..entry.clone()
                }),
                None => {
                    tracing::warn!(
                        address = %entry.address(),
                        "Dropped from state, no longer exists"
                    );
                }
            }
        }
        state.resources = refreshed;
        Ok(())
    }

    /// Compute the changes `apply` would make, without touching anything
    /// except reads.
    pub async fn plan(&self, manifest: &Manifest, state: &StateFile) -> Result<Vec<PlannedChange>> {
        let mut state = state.clone();
        self.refresh(&mut state).await?;
        let data = self.read_data(manifest, &state).await?;

        let mut changes = self.orphans(manifest, &state);
        for decl in &manifest.resources {
            let resource = self.registry.resource(&decl.type_name)?;
            let schema = resource.descriptor().schema;
            let (config, unknown) = resolve_references(&decl.config, &state, &data);
            schema
                .validate_config(&config, &unknown)
                .with_context(|| format!("invalid configuration for {}", decl.address()))?;

            let prior = state.get(&decl.type_name, &decl.name).map(|e| &e.attributes);
            let mut change = plan::diff(&schema, prior, Some(&config));
            if prior.is_some() {
                mark_unknown(&mut change, &schema, &unknown);
            }
            changes.push(PlannedChange {
                address: decl.address(),
                change,
            });
        }
        Ok(changes)
    }

    /// Refresh, then converge state on the manifest. State is updated after
    /// every step, so on error it reflects what was actually done.
    pub async fn apply(
        &self,
        manifest: &Manifest,
        state: &mut StateFile,
    ) -> Result<Vec<PlannedChange>> {
        self.refresh(state).await?;
        let data = self.read_data(manifest, state).await?;

        let mut applied = Vec::new();
        for orphan in self.orphans(manifest, state).into_iter().rev() {
            let (type_name, name) = split_address(&orphan.address)?;
            self.delete_entry(state, type_name, name).await?;
            applied.push(orphan);
        }

        for decl in &manifest.resources {
            let address = decl.address();
            let resource = self.registry.resource(&decl.type_name)?;
            let schema = resource.descriptor().schema;
            let (config, unknown) = resolve_references(&decl.config, state, &data);
            if let Some(attr) = unknown.first() {
                bail!("{address}: attribute `{attr}` references a value that does not exist");
            }
            schema
                .validate_config(&config, &[])
                .with_context(|| format!("invalid configuration for {address}"))?;

            let prior = state
                .get(&decl.type_name, &decl.name)
                .map(|e| e.attributes.clone());
            let change = plan::diff(&schema, prior.as_ref(), Some(&config));

            match change.action {
                Action::NoOp | Action::Delete => {}
                Action::Create => {
                    let created = resource
                        .create(Value::Object(plan::proposed(&schema, None, &config)))
                        .await
                        .with_context(|| format!("failed to create {address}"))?;
                    state.upsert(&decl.type_name, &decl.name, into_attributes(created)?);
                }
                Action::Update => {
                    let prior = prior.unwrap_or_default();
                    let proposed = plan::proposed(&schema, Some(&prior), &config);
                    let updated = resource
                        .update(Value::Object(proposed), Value::Object(prior))
                        .await
                        .with_context(|| format!("failed to update {address}"))?;
                    state.upsert(&decl.type_name, &decl.name, into_attributes(updated)?);
                }
                Action::Replace => {
                    tracing::info!(
                        address = %address,
                        triggers = ?change.replace_triggers,
                        "Replacing"
                    );
                    self.delete_entry(state, &decl.type_name, &decl.name).await?;
                    let created = resource
                        .create(Value::Object(plan::proposed(&schema, None, &config)))
                        .await
                        .with_context(|| format!("failed to create {address}"))?;
                    state.upsert(&decl.type_name, &decl.name, into_attributes(created)?);
                }
            }

            if change.action != Action::NoOp {
                tracing::info!(address = %address, action = %change.action, "Applied");
            }
            applied.push(PlannedChange { address, change });
        }
        Ok(applied)
    }

    /// Delete everything in state, newest first.
    pub async fn destroy(&self, state: &mut StateFile) -> Result<Vec<PlannedChange>> {
        let mut destroyed = Vec::new();
        while let Some(entry) = state.resources.last().cloned() {
            self.delete_entry(state, &entry.type_name, &entry.name).await?;
            destroyed.push(PlannedChange {
                address: entry.address(),
                change: plan::diff(
                    &self.registry.resource(&entry.type_name)?.descriptor().schema,
                    Some(&entry.attributes),
                    None,
                ),
            });
        }
        Ok(destroyed)
    }

    /// Adopt an existing remote entity under `type_name.name`.
    pub async fn import(
        &self,
        state: &mut StateFile,
        type_name: &str,
        name: &str,
        id: &str,
    ) -> Result<()> {
        let resource = self.registry.resource(type_name)?;
        if !resource.descriptor().capabilities.import {
            bail!("resource type {type_name} does not support import");
        }
        if state.get(type_name, name).is_some() {
            bail!("{type_name}.{name} is already managed");
        }

        let initial = resource.import_state(id)?;
        let current = resource
            .read(initial)
            .await
            .with_context(|| format!("failed to import {type_name}.{name}"))?;
        let Some(current) = current else {
            bail!("cannot import {type_name}.{name}: {id} does not exist");
        };
        state.upsert(type_name, name, into_attributes(current)?);
        tracing::info!(address = %format!("{type_name}.{name}"), id = %id, "Imported");
        Ok(())
    }

    /// Read every data source, in declaration order. Later declarations may
    /// reference earlier results.
    pub async fn read_data(&self, manifest: &Manifest, state: &StateFile) -> Result<DataResults> {
        let mut results = DataResults::new();
        for decl in &manifest.data {
            let data_source = self.registry.data_source(&decl.type_name)?;
            let (config, unknown) = resolve_references(&decl.config, state, &results);
            if let Some(attr) = unknown.first() {
                bail!(
                    "data.{}: attribute `{attr}` references a value that does not exist",
                    decl.address()
                );
            }
            let value = data_source
                .read(Value::Object(config))
                .await
                .with_context(|| format!("failed to read data.{}", decl.address()))?;
            results.insert(decl.address(), into_attributes(value)?);
        }
        Ok(results)
    }

    fn orphans(&self, manifest: &Manifest, state: &StateFile) -> Vec<PlannedChange> {
        state
            .resources
            .iter()
            .filter(|entry| {
                !manifest
                    .resources
                    .iter()
                    .any(|d| d.type_name == entry.type_name && d.name == entry.name)
            })
            .map(|entry| PlannedChange {
                address: entry.address(),
                change: Change {
                    action: Action::Delete,
                    changed: Vec::new(),
                    replace_triggers: Vec::new(),
                },
            })
            .collect()
    }

    async fn delete_entry(&self, state: &mut StateFile, type_name: &str, name: &str) -> Result<()> {
        let Some(entry) = state.get(type_name, name).cloned() else {
            return Ok(());
        };
        let address = entry.address();
        self.registry
            .resource(type_name)?
            .delete(Value::Object(entry.attributes))
            .await
            .with_context(|| format!("failed to delete {address}"))?;
        state.remove(type_name, name);
        Ok(())
    }
}

fn into_attributes(value: Value) -> Result<Attributes> {
    match value {
        Value::Object(map) => Ok(map),
        other => bail!("expected an attribute map, got {other}"),
    }
}

fn split_address(address: &str) -> Result<(&str, &str)> {
    address
        .split_once('.')
        .with_context(|| format!("invalid resource address {address}"))
}

/// Replace `${type.name.attr}` and `${data.type.name.attr}` string values.
/// Returns the resolved map and the attributes whose reference has no value
/// yet; those keep their literal text.
fn resolve_references(
    config: &Attributes,
    state: &StateFile,
    data: &DataResults,
) -> (Attributes, Vec<String>) {
    let mut resolved = Attributes::new();
    let mut unknown = Vec::new();
    for (key, value) in config {
        let target = value.as_str().and_then(reference);
        match target {
            Some(target) => match lookup(target, state, data) {
                Some(found) => {
                    resolved.insert(key.clone(), found);
                }
                None => {
                    unknown.push(key.clone());
                    resolved.insert(key.clone(), value.clone());
                }
            },
            None => {
                resolved.insert(key.clone(), value.clone());
            }
        }
    }
    (resolved, unknown)
}

fn reference(value: &str) -> Option<&str> {
    value.strip_prefix("${")?.strip_suffix('}')
}

fn lookup(target: &str, state: &StateFile, data: &DataResults) -> Option<Value> {
    let parts: Vec<&str> = target.split('.').collect();
    let value = match parts.as_slice() {
        ["data", type_name, name, attr] => data.get(&format!("{type_name}.{name}"))?.get(*attr),
        [type_name, name, attr] => state.get(type_name, name)?.attributes.get(*attr),
        _ => None,
    }?;
    (!value.is_null()).then(|| value.clone())
}

/// A not-yet-known value on an existing entity shows up as a change; when it
/// lands on a replace trigger the entity is replaced.
fn mark_unknown(change: &mut Change, schema: &Schema, unknown: &[String]) {
    for name in unknown {
        if !change.changed.contains(name) {
            change.changed.push(name.clone());
        }
        let triggers = schema.attribute(name).is_some_and(|a| a.requires_replace);
        if triggers && !change.replace_triggers.contains(name) {
            change.replace_triggers.push(name.clone());
        }
    }
    if !change.replace_triggers.is_empty() {
        change.action = Action::Replace;
    } else if !change.changed.is_empty() && change.action == Action::NoOp {
        change.action = Action::Update;
    }
}
