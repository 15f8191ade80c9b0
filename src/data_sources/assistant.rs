use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::DataSource;
use crate::error::{ProviderError, ProviderResult};
use crate::openai::AssistantsApi;
use crate::openai::models::{Assistant, capability_flags};
use crate::provider::{self, ProviderContext};
use crate::resources::{decode, encode};
use crate::schema::{Attribute, AttributeMode, DataSourceDescriptor, Schema};

pub(crate) const MODEL_DESCRIPTION: &str = "Model to use for this assistant. Valid options are \
    `gpt-4-turbo-preview`, `gpt-4`, `gpt-3.5-turbo-16k`, `gpt-3.5-turbo-0125`, `gpt-3.5-turbo`, \
    `gpt-4-1106-preview`, `gpt-4-0125-preview`, `gpt-4-0613`, `gpt-3.5-turbo-1106`, \
    `gpt-3.5-turbo-0613` or any other models currently supported by OpenAI assistant.";
pub(crate) const INSTRUCTIONS_DESCRIPTION: &str = "Instructions for the assistant. Use this \
    attribute to guide the personality of the assistant and define its goals.";
pub(crate) const RETRIEVAL_DESCRIPTION: &str =
    "Retrieval enables the assistant with knowledge from files that you or your users upload.";
pub(crate) const CODE_INTERPRETER_DESCRIPTION: &str = "Code Interpreter enables the assistant to \
    write and run code, process files with diverse data and formatting, and generate files such \
    as graphs.";

/// Read-only projection of a remote assistant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantView {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub model: String,
    pub instructions: String,
    pub enable_retrieval: bool,
    pub enable_code_interpreter: bool,
}

impl From<Assistant> for AssistantView {
    fn from(assistant: Assistant) -> Self {
        let (enable_retrieval, enable_code_interpreter) = capability_flags(&assistant.tools);
        Self {
            id: assistant.id,
            name: assistant.name.unwrap_or_default(),
            description: assistant.description,
            model: assistant.model,
            instructions: assistant.instructions.unwrap_or_default(),
            enable_retrieval,
            enable_code_interpreter,
        }
    }
}

pub struct AssistantDataSource {
    client: Arc<dyn AssistantsApi>,
}

impl AssistantDataSource {
    pub fn new(ctx: &ProviderContext) -> Self {
        Self {
            client: ctx.client(),
        }
    }

    pub fn type_name() -> String {
        format!("{}_assistant", provider::TYPE_NAME)
    }

    pub fn schema() -> Schema {
        Schema {
            description: "Fetches an OpenAI assistant.",
            attributes: vec![
                Attribute::string("id", AttributeMode::Required).describe("ID of the assistant."),
                Attribute::string("name", AttributeMode::Computed)
                    .describe("Name of the assistant."),
                Attribute::string("description", AttributeMode::Computed)
                    .describe("Description of the assistant."),
                Attribute::string("model", AttributeMode::Computed).describe(MODEL_DESCRIPTION),
                Attribute::string("instructions", AttributeMode::Computed)
                    .describe(INSTRUCTIONS_DESCRIPTION),
                Attribute::bool("enable_retrieval", AttributeMode::Computed)
                    .describe(RETRIEVAL_DESCRIPTION),
                Attribute::bool("enable_code_interpreter", AttributeMode::Computed)
                    .describe(CODE_INTERPRETER_DESCRIPTION),
            ],
        }
    }

    pub async fn lookup(&self, id: &str) -> ProviderResult<AssistantView> {
        if id.trim().is_empty() {
            return Err(ProviderError::Validation(
                "assistant lookup requires a non-empty `id`".into(),
            ));
        }

        let assistant = self
            .client
            .retrieve_assistant(id)
            .await
            .map_err(|e| ProviderError::remote("Unable to read OpenAI assistant", e))?;

        tracing::debug!(assistant_id = %assistant.id, "Looked up assistant");
        Ok(assistant.into())
    }
}

#[derive(Deserialize)]
struct LookupConfig {
    #[serde(default)]
    id: String,
}

#[async_trait]
impl DataSource for AssistantDataSource {
    fn descriptor(&self) -> DataSourceDescriptor {
        DataSourceDescriptor {
            type_name: Self::type_name(),
            schema: Self::schema(),
        }
    }

    async fn read(&self, config: Value) -> ProviderResult<Value> {
        let type_name = Self::type_name();
        let config: LookupConfig = decode(&type_name, config)?;
        let view = self.lookup(&config.id).await?;
        encode(&type_name, &view)
    }
}
