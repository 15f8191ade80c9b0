//! In-memory `AssistantsApi` used by the resource and host tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex as StdMutex;

use async_trait::async_trait;

use super::client::{ApiError, AssistantsApi};
use super::models::{
    Assistant, AssistantFile, AssistantRequest, DeletionStatus, FileObject, FileUpload,
};

#[derive(Default)]
struct State {
    next_id: u32,
    assistants: HashMap<String, Assistant>,
    files: HashMap<String, FileObject>,
    attachments: HashSet<(String, String)>,
}

#[derive(Default)]
pub struct FakeAssistantsApi {
    state: StdMutex<State>,
    calls: StdMutex<Vec<String>>,
    failing: StdMutex<HashSet<&'static str>>,
}

fn not_found(what: &str, id: &str) -> ApiError {
    ApiError::Api {
        status: 404,
        kind: Some("invalid_request_error".into()),
        message: format!("No {what} found with id '{id}'."),
    }
}

impl FakeAssistantsApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent call to `operation` fail with a 500.
    pub fn fail_on(&self, operation: &'static str) {
        self.failing.lock().unwrap().insert(operation);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn assistant(&self, id: &str) -> Option<Assistant> {
        self.state.lock().unwrap().assistants.get(id).cloned()
    }

    pub fn file_count(&self) -> usize {
        self.state.lock().unwrap().files.len()
    }

    pub fn has_file(&self, id: &str) -> bool {
        self.state.lock().unwrap().files.contains_key(id)
    }

    pub fn is_attached(&self, assistant_id: &str, file_id: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .attachments
            .contains(&(assistant_id.to_string(), file_id.to_string()))
    }

    /// Removes an assistant behind the provider's back.
    pub fn forget_assistant(&self, id: &str) {
        self.state.lock().unwrap().assistants.remove(id);
    }

    fn record(&self, operation: &'static str) -> Result<(), ApiError> {
        self.calls.lock().unwrap().push(operation.to_string());
        if self.failing.lock().unwrap().contains(operation) {
            return Err(ApiError::Api {
                status: 500,
                kind: Some("server_error".into()),
                message: format!("{operation} failed"),
            });
        }
        Ok(())
    }

    fn next_id(state: &mut State, prefix: &str) -> String {
        state.next_id += 1;
        format!("{prefix}{}", state.next_id)
    }

    fn apply_request(assistant: &mut Assistant, request: &AssistantRequest) {
        assistant.model = request.model.clone();
        assistant.name = request.name.clone();
        assistant.description = request.description.clone();
        assistant.instructions = request.instructions.clone();
        assistant.tools = request.tools.clone();
    }
}

#[async_trait]
impl AssistantsApi for FakeAssistantsApi {
    async fn create_assistant(&self, request: &AssistantRequest) -> Result<Assistant, ApiError> {
        self.record("create_assistant")?;
        let mut state = self.state.lock().unwrap();
        let id = Self::next_id(&mut state, "asst_");
        let mut assistant = Assistant {
            id: id.clone(),
            created_at: 1_700_000_000,
            name: None,
            description: None,
            model: String::new(),
            instructions: None,
            tools: Vec::new(),
            file_ids: Vec::new(),
        };
        Self::apply_request(&mut assistant, request);
        state.assistants.insert(id, assistant.clone());
        Ok(assistant)
    }

    async fn retrieve_assistant(&self, assistant_id: &str) -> Result<Assistant, ApiError> {
        self.record("retrieve_assistant")?;
        self.state
            .lock()
            .unwrap()
            .assistants
            .get(assistant_id)
            .cloned()
            .ok_or_else(|| not_found("assistant", assistant_id))
    }

    async fn modify_assistant(
        &self,
        assistant_id: &str,
        request: &AssistantRequest,
    ) -> Result<Assistant, ApiError> {
        self.record("modify_assistant")?;
        let mut state = self.state.lock().unwrap();
        let assistant = state
            .assistants
            .get_mut(assistant_id)
            .ok_or_else(|| not_found("assistant", assistant_id))?;
        Self::apply_request(assistant, request);
        Ok(assistant.clone())
    }

    async fn delete_assistant(&self, assistant_id: &str) -> Result<DeletionStatus, ApiError> {
        self.record("delete_assistant")?;
        let mut state = self.state.lock().unwrap();
        state
            .assistants
            .remove(assistant_id)
            .ok_or_else(|| not_found("assistant", assistant_id))?;
        Ok(DeletionStatus {
            id: assistant_id.to_string(),
            object: "assistant.deleted".into(),
            deleted: true,
        })
    }

    async fn create_file(&self, upload: FileUpload) -> Result<FileObject, ApiError> {
        self.record("create_file")?;
        let mut state = self.state.lock().unwrap();
        let id = Self::next_id(&mut state, "file-");
        let file = FileObject {
            id: id.clone(),
            bytes: upload.bytes.len() as u64,
            created_at: 1_700_000_000,
            filename: upload.name,
            purpose: upload.purpose,
        };
        state.files.insert(id, file.clone());
        Ok(file)
    }

    async fn retrieve_file(&self, file_id: &str) -> Result<FileObject, ApiError> {
        self.record("retrieve_file")?;
        self.state
            .lock()
            .unwrap()
            .files
            .get(file_id)
            .cloned()
            .ok_or_else(|| not_found("file", file_id))
    }

    async fn delete_file(&self, file_id: &str) -> Result<DeletionStatus, ApiError> {
        self.record("delete_file")?;
        let mut state = self.state.lock().unwrap();
        state
            .files
            .remove(file_id)
            .ok_or_else(|| not_found("file", file_id))?;
        Ok(DeletionStatus {
            id: file_id.to_string(),
            object: "file".into(),
            deleted: true,
        })
    }

    async fn attach_file(
        &self,
        assistant_id: &str,
        file_id: &str,
    ) -> Result<AssistantFile, ApiError> {
        self.record("attach_file")?;
        let mut state = self.state.lock().unwrap();
        if !state.assistants.contains_key(assistant_id) {
            return Err(not_found("assistant", assistant_id));
        }
        if !state.files.contains_key(file_id) {
            return Err(not_found("file", file_id));
        }
        state
            .attachments
            .insert((assistant_id.to_string(), file_id.to_string()));
        Ok(AssistantFile {
            id: file_id.to_string(),
            created_at: 1_700_000_000,
            assistant_id: assistant_id.to_string(),
        })
    }

    async fn retrieve_assistant_file(
        &self,
        assistant_id: &str,
        file_id: &str,
    ) -> Result<AssistantFile, ApiError> {
        self.record("retrieve_assistant_file")?;
        let state = self.state.lock().unwrap();
        if state
            .attachments
            .contains(&(assistant_id.to_string(), file_id.to_string()))
        {
            Ok(AssistantFile {
                id: file_id.to_string(),
                created_at: 1_700_000_000,
                assistant_id: assistant_id.to_string(),
            })
        } else {
            Err(not_found("assistant file", file_id))
        }
    }

    async fn detach_file(
        &self,
        assistant_id: &str,
        file_id: &str,
    ) -> Result<DeletionStatus, ApiError> {
        self.record("detach_file")?;
        let removed = self
            .state
            .lock()
            .unwrap()
            .attachments
            .remove(&(assistant_id.to_string(), file_id.to_string()));
        if !removed {
            return Err(not_found("assistant file", file_id));
        }
        Ok(DeletionStatus {
            id: file_id.to_string(),
            object: "assistant.file.deleted".into(),
            deleted: true,
        })
    }
}
