use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::{Resource, decode, encode, timestamp};
use crate::config::MissingPolicy;
use crate::data_sources::AssistantView;
use crate::data_sources::assistant::{
    CODE_INTERPRETER_DESCRIPTION, INSTRUCTIONS_DESCRIPTION, MODEL_DESCRIPTION,
    RETRIEVAL_DESCRIPTION,
};
use crate::error::{ProviderError, ProviderResult};
use crate::openai::AssistantsApi;
use crate::openai::models::{AssistantRequest, Tool};
use crate::provider::{self, ProviderContext};
use crate::schema::{Attribute, AttributeMode, Capabilities, ResourceDescriptor, Schema};

/// Stored attributes of an `openai_assistant` resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantModel {
    pub id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub model: String,
    pub instructions: String,
    pub enable_retrieval: bool,
    pub enable_code_interpreter: bool,
    pub last_updated: Option<String>,
}

impl AssistantModel {
    fn request(&self) -> AssistantRequest {
        AssistantRequest {
            model: self.model.clone(),
            name: Some(self.name.clone()),
            description: self.description.clone(),
            instructions: Some(self.instructions.clone()),
            tools: Tool::from_flags(self.enable_retrieval, self.enable_code_interpreter),
        }
    }

    fn id(&self) -> ProviderResult<&str> {
        self.id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ProviderError::Validation("assistant state has no `id`".into()))
    }
}

/// Full lifecycle for an assistant. Every attribute except `id` is updated in
/// place; nothing here ever forces replacement.
pub struct AssistantResource {
    client: Arc<dyn AssistantsApi>,
    on_missing: MissingPolicy,
}

impl AssistantResource {
    pub fn new(ctx: &ProviderContext) -> Self {
        Self {
            client: ctx.client(),
            on_missing: ctx.on_missing(),
        }
    }

    pub fn type_name() -> String {
        format!("{}_assistant", provider::TYPE_NAME)
    }

    pub fn schema() -> Schema {
        Schema {
            description: "Provides an OpenAI assistant resource.",
            attributes: vec![
                Attribute::string("id", AttributeMode::Computed)
                    .describe("ID of the assistant.")
                    .use_state_for_unknown(),
                Attribute::string("name", AttributeMode::Required)
                    .describe("Name of the assistant."),
                Attribute::string("description", AttributeMode::Optional)
                    .describe("Description of the assistant."),
                Attribute::string("model", AttributeMode::Required).describe(MODEL_DESCRIPTION),
                Attribute::string("instructions", AttributeMode::Required)
                    .describe(INSTRUCTIONS_DESCRIPTION),
                Attribute::bool("enable_retrieval", AttributeMode::OptionalComputed)
                    .describe(RETRIEVAL_DESCRIPTION)
                    .default_value(json!(false)),
                Attribute::bool("enable_code_interpreter", AttributeMode::OptionalComputed)
                    .describe(CODE_INTERPRETER_DESCRIPTION)
                    .default_value(json!(false)),
                Attribute::string("last_updated", AttributeMode::Computed)
                    .describe("Timestamp of the last update of the assistant by this provider."),
            ],
        }
    }

    pub async fn create(&self, mut plan: AssistantModel) -> ProviderResult<AssistantModel> {
        let assistant = self
            .client
            .create_assistant(&plan.request())
            .await
            .map_err(|e| ProviderError::remote("Could not create assistant", e))?;

        tracing::info!(assistant_id = %assistant.id, name = %plan.name, "Created assistant");

        plan.id = Some(assistant.id);
        plan.last_updated = Some(timestamp());
        Ok(plan)
    }

    pub async fn read(&self, state: AssistantModel) -> ProviderResult<Option<AssistantModel>> {
        let id = state.id()?;
        let assistant = match self.client.retrieve_assistant(id).await {
            Ok(assistant) => assistant,
            Err(e) if e.is_not_found() && self.on_missing == MissingPolicy::Remove => {
                tracing::warn!(
                    assistant_id = %id,
                    "Assistant no longer exists, removing from state"
                );
                return Ok(None);
            }
            Err(e) => {
                return Err(ProviderError::remote(
                    format!("Could not read OpenAI assistant ID {id}"),
                    e,
                ));
            }
        };

        let view = AssistantView::from(assistant);
        Ok(Some(AssistantModel {
            id: Some(view.id),
            name: view.name,
            description: view.description,
            model: view.model,
            instructions: view.instructions,
            enable_retrieval: view.enable_retrieval,
            enable_code_interpreter: view.enable_code_interpreter,
            last_updated: state.last_updated,
        }))
    }

    pub async fn update(&self, mut plan: AssistantModel) -> ProviderResult<AssistantModel> {
        let id = plan.id()?.to_string();

        self.client
            .modify_assistant(&id, &plan.request())
            .await
            .map_err(|e| ProviderError::remote("Could not update assistant", e))?;

        // Confirm with a fresh retrieve before committing the plan.
        self.client.retrieve_assistant(&id).await.map_err(|e| {
            ProviderError::remote(format!("Could not read OpenAI assistant ID {id}"), e)
        })?;

        tracing::info!(assistant_id = %id, "Updated assistant");

        plan.last_updated = Some(timestamp());
        Ok(plan)
    }

    pub async fn delete(&self, state: &AssistantModel) -> ProviderResult<()> {
        let id = state.id()?;
        self.client
            .delete_assistant(id)
            .await
            .map_err(|e| ProviderError::remote("Could not delete assistant", e))?;

        tracing::info!(assistant_id = %id, "Deleted assistant");
        Ok(())
    }
}

#[async_trait]
impl Resource for AssistantResource {
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
        let created = AssistantResource::create(self, decode(&type_name, plan)?).await?;
        encode(&type_name, &created)
    }

    async fn read(&self, state: Value) -> ProviderResult<Option<Value>> {
        let type_name = Self::type_name();
        match AssistantResource::read(self, decode(&type_name, state)?).await? {
            Some(refreshed) => Ok(Some(encode(&type_name, &refreshed)?)),
            None => Ok(None),
        }
    }

    async fn update(&self, plan: Value, _prior: Value) -> ProviderResult<Value> {
        let type_name = Self::type_name();
        let updated = AssistantResource::update(self, decode(&type_name, plan)?).await?;
        encode(&type_name, &updated)
    }

    async fn delete(&self, state: Value) -> ProviderResult<()> {
        let state: AssistantModel = decode(&Self::type_name(), state)?;
        AssistantResource::delete(self, &state).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::openai::fake::FakeAssistantsApi;

    fn resource(fake: &Arc<FakeAssistantsApi>, on_missing: MissingPolicy) -> AssistantResource {
        let ctx = ProviderContext::with_client(fake.clone()).on_missing_policy(on_missing);
        AssistantResource::new(&ctx)
    }

    fn joker() -> AssistantModel {
        AssistantModel {
            name: "Test provider".into(),
            model: "gpt-4-turbo-preview".into(),
            instructions: "Answer every question with a joke".into(),
            enable_retrieval: true,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn create_stores_id_and_flags() {
        let fake = Arc::new(FakeAssistantsApi::new());
        let created = resource(&fake, MissingPolicy::Error)
            .create(joker())
            .await
            .unwrap();

        assert!(created.id.as_deref().is_some_and(|id| !id.is_empty()));
        assert!(created.enable_retrieval);
        assert!(!created.enable_code_interpreter);
        assert!(created.last_updated.is_some());

        let remote = fake.assistant(created.id.as_deref().unwrap()).unwrap();
        assert_eq!(remote.tools, vec![Tool::Retrieval]);
    }

    #[tokio::test]
    async fn create_then_read_round_trips() {
        let fake = Arc::new(FakeAssistantsApi::new());
        let resource = resource(&fake, MissingPolicy::Error);
        let mut plan = joker();
        plan.description = Some("Tells jokes".into());
        plan.enable_code_interpreter = true;

        let created = resource.create(plan.clone()).await.unwrap();
        let read = resource.read(created.clone()).await.unwrap().unwrap();

        assert_eq!(read, created);
        assert_eq!(read.name, plan.name);
        assert_eq!(read.model, plan.model);
        assert_eq!(read.instructions, plan.instructions);
        assert_eq!(read.description, plan.description);
        assert!(read.enable_retrieval && read.enable_code_interpreter);
    }

    #[tokio::test]
    async fn create_failure_stores_nothing() {
        let fake = Arc::new(FakeAssistantsApi::new());
        fake.fail_on("create_assistant");
        let err = resource(&fake, MissingPolicy::Error)
            .create(joker())
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::Remote { .. }));
        assert!(err.to_string().starts_with("Could not create assistant"));
    }

    #[tokio::test]
    async fn update_modifies_in_place_then_confirms() {
        let fake = Arc::new(FakeAssistantsApi::new());
        let resource = resource(&fake, MissingPolicy::Error);
        let created = resource.create(joker()).await.unwrap();
        fake.clear_calls();

        let mut plan = created.clone();
        plan.enable_retrieval = false;
        plan.enable_code_interpreter = true;
        plan.instructions = "Be serious".into();
        let updated = resource.update(plan).await.unwrap();

        assert_eq!(updated.id, created.id);
        assert_eq!(fake.calls(), vec!["modify_assistant", "retrieve_assistant"]);
        let remote = fake.assistant(created.id.as_deref().unwrap()).unwrap();
        assert_eq!(remote.tools, vec![Tool::CodeInterpreter]);
        assert_eq!(remote.instructions.as_deref(), Some("Be serious"));
    }

    #[tokio::test]
    async fn update_with_unchanged_payload_keeps_remote_attributes() {
        let fake = Arc::new(FakeAssistantsApi::new());
        let resource = resource(&fake, MissingPolicy::Error);
        let created = resource.create(joker()).await.unwrap();
        let id = created.id.clone().unwrap();
        let before = fake.assistant(&id).unwrap();

        resource.update(created).await.unwrap();

        let after = fake.assistant(&id).unwrap();
        assert_eq!(after.name, before.name);
        assert_eq!(after.model, before.model);
        assert_eq!(after.instructions, before.instructions);
        assert_eq!(after.description, before.description);
        assert_eq!(after.tools, before.tools);
    }

    #[tokio::test]
    async fn update_failure_is_remote_error() {
        let fake = Arc::new(FakeAssistantsApi::new());
        let resource = resource(&fake, MissingPolicy::Error);
        let created = resource.create(joker()).await.unwrap();
        fake.fail_on("modify_assistant");

        let err = resource.update(created).await.unwrap_err();
        assert!(err.to_string().starts_with("Could not update assistant"));
    }

    #[tokio::test]
    async fn read_of_missing_assistant_follows_policy() {
        let fake = Arc::new(FakeAssistantsApi::new());
        let created = resource(&fake, MissingPolicy::Error)
            .create(joker())
            .await
            .unwrap();
        fake.forget_assistant(created.id.as_deref().unwrap());

        let err = resource(&fake, MissingPolicy::Error)
            .read(created.clone())
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        let removed = resource(&fake, MissingPolicy::Remove)
            .read(created)
            .await
            .unwrap();
        assert!(removed.is_none());
    }

    #[tokio::test]
    async fn delete_removes_remote_assistant() {
        let fake = Arc::new(FakeAssistantsApi::new());
        let resource = resource(&fake, MissingPolicy::Error);
        let created = resource.create(joker()).await.unwrap();

        resource.delete(&created).await.unwrap();
        assert!(fake.assistant(created.id.as_deref().unwrap()).is_none());

        let err = resource.delete(&created).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn import_then_read_fills_every_attribute() {
        let fake = Arc::new(FakeAssistantsApi::new());
        let resource = resource(&fake, MissingPolicy::Error);
        let created = resource.create(joker()).await.unwrap();
        let id = created.id.clone().unwrap();

        let imported = resource.import_state(&id).unwrap();
        let refreshed = Resource::read(&resource, imported).await.unwrap().unwrap();

        assert_eq!(refreshed["id"], json!(id));
        assert_eq!(refreshed["name"], json!("Test provider"));
        assert_eq!(refreshed["enable_retrieval"], json!(true));
        assert_eq!(refreshed["last_updated"], Value::Null);
    }

    #[test]
    fn no_attribute_requires_replacement() {
        assert!(
            AssistantResource::schema()
                .attributes
                .iter()
                .all(|a| !a.requires_replace)
        );
    }
}
