use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{MissingPolicy, ProviderConfig, ResolvedConfig};
use crate::data_sources::{AssistantDataSource, DataSource};
use crate::error::{ProviderError, ProviderResult};
use crate::openai::{AssistantsApi, HttpAssistantsClient};
use crate::resources::{AssistantFileResource, AssistantResource, Resource};
use crate::schema::{Attribute, AttributeMode, Schema};

/// Prefix of every resource and data source type name.
pub const TYPE_NAME: &str = "openai";

pub struct Provider {
    version: String,
}

impl Provider {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn schema() -> Schema {
        Schema {
            description: "Interact with OpenAI.",
            attributes: vec![
                Attribute::string("api_key", AttributeMode::Optional)
                    .describe(
                        "The OpenAI API key for API operations. May also be provided via \
                         the OPENAI_API_KEY environment variable.",
                    )
                    .sensitive(),
                Attribute::string("base_url", AttributeMode::Optional).describe(
                    "Base URL of the OpenAI API. May also be provided via the OPENAI_BASE_URL \
                     environment variable.",
                ),
                Attribute::string("on_missing", AttributeMode::Optional).describe(
                    "What a refresh does when a managed entity no longer exists remotely: \
                     `error` (default) or `remove`.",
                ),
            ],
        }
    }

    /// Resolve the credential and build the one client shared by every
    /// resource and data source for this run.
    pub fn configure(&self, config: &ProviderConfig) -> ProviderResult<ProviderContext> {
        tracing::info!(version = %self.version, "Configuring OpenAI client");
        let resolved = config.resolve()?;
        self.configure_resolved(resolved)
    }

    pub fn configure_resolved(&self, resolved: ResolvedConfig) -> ProviderResult<ProviderContext> {
        tracing::debug!(base_url = %resolved.base_url, "Creating OpenAI client");

        let http_client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| {
                ProviderError::Configuration(format!("failed to build HTTP client: {e}"))
            })?;

        let client = HttpAssistantsClient::new(http_client, resolved.api_key, resolved.base_url);

        tracing::info!(success = true, "Configured OpenAI client");
        Ok(ProviderContext::with_client(Arc::new(client)).on_missing_policy(resolved.on_missing))
    }

    /// Every resource and data source this provider offers, bound to `ctx`.
    pub fn registry(&self, ctx: &ProviderContext) -> ProviderResult<Registry> {
        let mut registry = Registry::configured();
        registry.register_resource(Arc::new(AssistantResource::new(ctx)))?;
        registry.register_resource(Arc::new(AssistantFileResource::new(ctx)))?;
        registry.register_data_source(Arc::new(AssistantDataSource::new(ctx)))?;
        Ok(registry)
    }
}

/// Shared state handed to resources and data sources at construction.
#[derive(Clone)]
pub struct ProviderContext {
    client: Arc<dyn AssistantsApi>,
    on_missing: MissingPolicy,
}

impl ProviderContext {
    pub fn with_client(client: Arc<dyn AssistantsApi>) -> Self {
        Self {
            client,
            on_missing: MissingPolicy::default(),
        }
    }

    pub fn on_missing_policy(mut self, on_missing: MissingPolicy) -> Self {
        self.on_missing = on_missing;
        self
    }

    pub fn client(&self) -> Arc<dyn AssistantsApi> {
        self.client.clone()
    }

    pub fn on_missing(&self) -> MissingPolicy {
        self.on_missing
    }
}

/// Resource and data source lookup by type name.
///
/// A `Registry::default()` has no configured provider behind it and only
/// accepts resources that do not declare the `configure` capability.
#[derive(Default)]
pub struct Registry {
    configured: bool,
    resources: BTreeMap<String, Arc<dyn Resource>>,
    data_sources: BTreeMap<String, Arc<dyn DataSource>>,
}

impl Registry {
    /// A registry backed by a configured provider context.
    pub fn configured() -> Self {
        Self {
            configured: true,
            ..Self::default()
        }
    }

    pub fn register_resource(&mut self, resource: Arc<dyn Resource>) -> ProviderResult<()> {
        let descriptor = resource.descriptor();
        let type_name = descriptor.type_name;
        check_type_name(&type_name)?;

        if descriptor.capabilities.configure && !self.configured {
            return Err(ProviderError::Configuration(format!(
                "resource {type_name} needs a configured provider"
            )));
        }

        let id = descriptor.schema.attribute("id").ok_or_else(|| {
            ProviderError::Configuration(format!("resource {type_name} has no `id` attribute"))
        })?;
        if descriptor.capabilities.import && id.mode != AttributeMode::Computed {
            return Err(ProviderError::Configuration(format!(
                "resource {type_name} supports import but its `id` is not computed"
            )));
        }
        for attr in &descriptor.schema.attributes {
            if attr.requires_replace && !attr.is_configurable() {
                return Err(ProviderError::Configuration(format!(
                    "resource {type_name}: computed attribute `{}` cannot force replacement",
                    attr.name
                )));
            }
        }

        if self.resources.contains_key(&type_name) {
            return Err(ProviderError::Configuration(format!(
                "resource type {type_name} is already registered"
            )));
        }
        tracing::debug!(type_name = %type_name, "Registered resource");
        self.resources.insert(type_name, resource);
        Ok(())
    }

    pub fn register_data_source(&mut self, data_source: Arc<dyn DataSource>) -> ProviderResult<()> {
        let descriptor = data_source.descriptor();
        let type_name = descriptor.type_name;
        check_type_name(&type_name)?;

        if self.data_sources.contains_key(&type_name) {
            return Err(ProviderError::Configuration(format!(
                "data source type {type_name} is already registered"
            )));
        }
        tracing::debug!(type_name = %type_name, "Registered data source");
        self.data_sources.insert(type_name, data_source);
        Ok(())
    }

    pub fn resource(&self, type_name: &str) -> ProviderResult<Arc<dyn Resource>> {
        self.resources
            .get(type_name)
            .cloned()
            .ok_or_else(|| ProviderError::Validation(format!("unknown resource type {type_name}")))
    }

    pub fn data_source(&self, type_name: &str) -> ProviderResult<Arc<dyn DataSource>> {
        self.data_sources.get(type_name).cloned().ok_or_else(|| {
            ProviderError::Validation(format!("unknown data source type {type_name}"))
        })
    }

    pub fn resource_types(&self) -> impl Iterator<Item = &str> {
        self.resources.keys().map(String::as_str)
    }

    pub fn data_source_types(&self) -> impl Iterator<Item = &str> {
        self.data_sources.keys().map(String::as_str)
    }
}

fn check_type_name(type_name: &str) -> ProviderResult<()> {
    let valid = type_name
        .strip_prefix(TYPE_NAME)
        .and_then(|rest| rest.strip_prefix('_'))
        .is_some_and(|rest| !rest.is_empty());
    if valid {
        Ok(())
    } else {
        Err(ProviderError::Configuration(format!(
            "type name {type_name} must start with `{TYPE_NAME}_`"
        )))
    }
}
