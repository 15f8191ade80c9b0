pub mod assistant;
pub mod assistant_file;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::error::{ProviderError, ProviderResult};
use crate::schema::ResourceDescriptor;

pub use assistant::{AssistantModel, AssistantResource};
pub use assistant_file::{AssistantFileModel, AssistantFileResource};

/// A managed resource as seen by the host: attribute maps in, attribute maps
/// out. Each implementation converts to its typed model at the boundary.
#[async_trait]
pub trait Resource: Send + Sync {
    fn descriptor(&self) -> ResourceDescriptor;

    async fn create(&self, plan: Value) -> ProviderResult<Value>;

    /// `Ok(None)` means the entity is gone and should be dropped from state.
    async fn read(&self, state: Value) -> ProviderResult<Option<Value>>;

    async fn update(&self, plan: Value, prior: Value) -> ProviderResult<Value>;

    async fn delete(&self, state: Value) -> ProviderResult<()>;

    /// Initial state for an imported entity. Only called when the descriptor
    /// declares the import capability.
    fn import_state(&self, id: &str) -> ProviderResult<Value> {
        if id.trim().is_empty() {
            return Err(ProviderError::Validation("import id must not be empty".into()));
        }
        Ok(json!({ "id": id }))
    }
}

pub(crate) fn decode<T: DeserializeOwned>(type_name: &str, value: Value) -> ProviderResult<T> {
    serde_json::from_value(value)
        .map_err(|e| ProviderError::Validation(format!("invalid {type_name} attributes: {e}")))
}

pub(crate) fn encode<T: Serialize>(type_name: &str, model: &T) -> ProviderResult<Value> {
    serde_json::to_value(model)
        .map_err(|e| ProviderError::Validation(format!("invalid {type_name} attributes: {e}")))
}

/// RFC 850 timestamp stored in `last_updated`.
pub(crate) fn timestamp() -> String {
    Utc::now().format("%A, %d-%b-%y %H:%M:%S %Z").to_string()
}
