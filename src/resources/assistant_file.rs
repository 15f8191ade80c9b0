use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::{Resource, decode, encode, timestamp};
use crate::config::MissingPolicy;
use crate::error::{ProviderError, ProviderResult};
use crate::openai::{ApiError, AssistantsApi};
use crate::openai::models::{ASSISTANTS_PURPOSE, FileUpload};
use crate::provider::{self, ProviderContext};
use crate::schema::{Attribute, AttributeMode, Capabilities, ResourceDescriptor, Schema};

/// Stored attributes of an `openai_assistant_file` resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantFileModel {
    /// Identifier of the uploaded file, not of the attachment.
    pub id: Option<String>,
    pub filename: String,
    pub assistant_id: String,
    pub last_updated: Option<String>,
}

impl AssistantFileModel {
    fn ids(&self) -> ProviderResult<(&str, &str)> {
        let id = self
            .id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ProviderError::Validation("assistant file state has no `id`".into()))?;
        if self.assistant_id.is_empty() {
            return Err(ProviderError::Validation(
                "assistant file state has no `assistant_id`".into(),
            ));
        }
        Ok((id, &self.assistant_id))
    }
}

/// A local document uploaded and attached to one assistant.
///
/// Creation is upload then attach; deletion is detach then delete. `filename`
/// and `assistant_id` cannot change in place.
pub struct AssistantFileResource {
    client: Arc<dyn AssistantsApi>,
    on_missing: MissingPolicy,
}

impl AssistantFileResource {
    pub fn new(ctx: &ProviderContext) -> Self {
        Self {
            client: ctx.client(),
            on_missing: ctx.on_missing(),
        }
    }

    pub fn type_name() -> String {
        format!("{}_assistant_file", provider::TYPE_NAME)
    }

    pub fn schema() -> Schema {
        Schema {
            description: "Provides an OpenAI assistant file resource.",
            attributes: vec![
                Attribute::string("id", AttributeMode::Computed)
                    .describe("ID of the file.")
                    .use_state_for_unknown(),
                Attribute::string("filename", AttributeMode::Required)
                    .describe("Path to the file within the local filesystem.")
                    .requires_replace(),
                Attribute::string("assistant_id", AttributeMode::Required)
                    .describe("The ID of the assistant to which this file will be included.")
                    .requires_replace(),
                Attribute::string("last_updated", AttributeMode::Computed)
                    .describe("Timestamp of the last update of the file by this provider."),
            ],
        }
    }

    pub async fn create(&self, mut plan: AssistantFileModel) -> ProviderResult<AssistantFileModel> {
        let path = Path::new(&plan.filename);
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| ProviderError::LocalIo {
                path: path.to_path_buf(),
                source,
            })?;
        if bytes.is_empty() {
            return Err(ProviderError::Validation(format!(
                "Could not create assistant file, {} has no content",
                path.display()
            )));
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| plan.filename.clone());

        let file = self
            .client
            .create_file(FileUpload {
                name,
                bytes,
                purpose: ASSISTANTS_PURPOSE.to_string(),
            })
            .await
            .map_err(|e| ProviderError::remote("Could not upload assistant file", e))?;

        tracing::debug!(file_id = %file.id, bytes = file.bytes, "Uploaded file");

        if let Err(e) = self.client.attach_file(&plan.assistant_id, &file.id).await {
            self.discard_upload(&file.id, "attach failed").await;
            return Err(ProviderError::remote(
                format!(
                    "Could not attach file {} to assistant {}",
                    file.id, plan.assistant_id
                ),
                e,
            ));
        }

        tracing::info!(
            file_id = %file.id,
            assistant_id = %plan.assistant_id,
            "Created assistant file"
        );

        plan.id = Some(file.id);
        plan.last_updated = Some(timestamp());
        Ok(plan)
    }

    /// Delete an uploaded file that no state entry will own, either because
    /// attaching it failed or because its attachment is gone.
    async fn discard_upload(&self, file_id: &str, reason: &str) {
        match self.client.delete_file(file_id).await {
            Ok(_) => {
                tracing::warn!(file_id = %file_id, reason, "Deleted unattached file");
            }
            Err(e) => {
                tracing::error!(
                    file_id = %file_id,
                    reason,
                    error = %e,
                    "Unattached file could not be deleted and is orphaned"
                );
            }
        }
    }

    pub async fn read(
        &self,
        mut state: AssistantFileModel,
    ) -> ProviderResult<Option<AssistantFileModel>> {
        let (id, assistant_id) = state.ids()?;

        if let Err(e) = self.client.retrieve_file(id).await {
            return self.missing_or_error(e, format!("Could not read OpenAI file ID {id}"));
        }

        let attachment = match self.client.retrieve_assistant_file(assistant_id, id).await {
            Ok(attachment) => attachment,
            Err(e) => {
                let summary = format!("Could not read OpenAI assistant file ID {id}");
                let outcome = self.missing_or_error(e, summary);
                // Without its attachment the blob has no owner once dropped.
                if matches!(outcome, Ok(None)) {
                    self.discard_upload(id, "attachment no longer exists").await;
                }
                return outcome;
            }
        };

        state.id = Some(attachment.id);
        state.assistant_id = attachment.assistant_id;
        Ok(Some(state))
    }

    fn missing_or_error(
        &self,
        e: ApiError,
        summary: String,
    ) -> ProviderResult<Option<AssistantFileModel>> {
        if e.is_not_found() && self.on_missing == MissingPolicy::Remove {
            tracing::warn!("{summary}: no longer exists, removing from state");
            return Ok(None);
        }
        Err(ProviderError::remote(summary, e))
    }

    /// Nothing is updatable in place; only the bookkeeping timestamp moves.
    pub async fn update(&self, mut plan: AssistantFileModel) -> ProviderResult<AssistantFileModel> {
        plan.last_updated = Some(timestamp());
        Ok(plan)
    }

    pub async fn delete(&self, state: &AssistantFileModel) -> ProviderResult<()> {
        let (id, assistant_id) = state.ids()?;

        self.client
            .detach_file(assistant_id, id)
            .await
            .map_err(|e| ProviderError::remote("Could not detach assistant file", e))?;

        self.client.delete_file(id).await.map_err(|e| {
            ProviderError::remote(format!("Could not delete file {id} after detaching it"), e)
        })?;

        tracing::info!(file_id = %id, assistant_id = %assistant_id, "Deleted assistant file");
        Ok(())
    }
}

#[async_trait]
impl Resource for AssistantFileResource {
    fn descriptor(&self) -> ResourceDescriptor {
        ResourceDescriptor {
            type_name: Self::type_name(),
            schema: Self::schema(),
            capabilities: Capabilities {
                configure: true,
                import: true,
            },
        }
    }

    async fn create(&self, plan: Value) -> ProviderResult<Value> {
        let type_name = Self::type_name();
        let created = AssistantFileResource::create(self, decode(&type_name, plan)?).await?;
        encode(&type_name, &created)
    }

    async fn read(&self, state: Value) -> ProviderResult<Option<Value>> {
        let type_name = Self::type_name();
        match AssistantFileResource::read(self, decode(&type_name, state)?).await? {
            Some(refreshed) => Ok(Some(encode(&type_name, &refreshed)?)),
            None => Ok(None),
        }
    }

    async fn update(&self, plan: Value, _prior: Value) -> ProviderResult<Value> {
        let type_name = Self::type_name();
        let updated = AssistantFileResource::update(self, decode(&type_name, plan)?).await?;
        encode(&type_name, &updated)
    }

    async fn delete(&self, state: Value) -> ProviderResult<()> {
        let state: AssistantFileModel = decode(&Self::type_name(), state)?;
        AssistantFileResource::delete(self, &state).await
    }

    /// Import ids are `<assistant_id>/<file_id>`: reading an attachment needs
    /// both halves.
    fn import_state(&self, id: &str) -> ProviderResult<Value> {
        match id.trim().split_once('/') {
            Some((assistant_id, file_id)) if !assistant_id.is_empty() && !file_id.is_empty() => {
                Ok(json!({ "id": file_id, "assistant_id": assistant_id }))
            }
            _ => Err(ProviderError::Validation(format!(
                "import id `{id}` must have the form `<assistant_id>/<file_id>`"
            ))),
        }
    }
}
