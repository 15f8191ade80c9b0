use serde::{Deserialize, Serialize};

/// Capability tag attached to an assistant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Tool {
    Retrieval,
    CodeInterpreter,
}

impl Tool {
    /// Builds the tag list for the given capability flags.
    ///
    /// Retrieval comes first, then the code interpreter. An assistant with
    /// neither flag gets an empty list, which clears tools on modify.
    pub fn from_flags(enable_retrieval: bool, enable_code_interpreter: bool) -> Vec<Tool> {
        let mut tools = Vec::new();
        if enable_retrieval {
            tools.push(Tool::Retrieval);
        }
        if enable_code_interpreter {
            tools.push(Tool::CodeInterpreter);
        }
        tools
    }
}

/// Projection of a tag set onto `(enable_retrieval, enable_code_interpreter)`.
///
/// Membership only: order and duplicates are irrelevant.
pub fn capability_flags(tools: &[Tool]) -> (bool, bool) {
    (
        tools.contains(&Tool::Retrieval),
        tools.contains(&Tool::CodeInterpreter),
    )
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Assistant {
    pub id: String,
    #[serde(default)]
    pub created_at: i64,
    pub name: Option<String>,
    pub description: Option<String>,
    pub model: String,
    pub instructions: Option<String>,
    #[serde(default, deserialize_with = "deserialize_tools")]
    pub tools: Vec<Tool>,
    #[serde(default)]
    pub file_ids: Vec<String>,
}

/// Payload for both create and modify. Modify replaces every field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssistantRequest {
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    pub tools: Vec<Tool>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FileObject {
    pub id: String,
    #[serde(default)]
    pub bytes: u64,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub purpose: String,
}

/// Multipart upload request for `POST /files`.
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub name: String,
    pub bytes: Vec<u8>,
    pub purpose: String,
}

pub const ASSISTANTS_PURPOSE: &str = "assistants";

#[derive(Debug, Clone, Serialize)]
pub struct AssistantFileRequest {
    pub file_id: String,
}

/// Attachment record linking a file to an assistant.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AssistantFile {
    pub id: String,
    #[serde(default)]
    pub created_at: i64,
    pub assistant_id: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeletionStatus {
    pub id: String,
    #[serde(default)]
    pub object: String,
    pub deleted: bool,
}

/// Error envelope returned by the service on non-2xx responses.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ErrorBody {
    pub message: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

/// Tools this provider does not manage (`function`, `file_search`) are dropped
/// instead of failing the whole response.
fn deserialize_tools<'de, D>(deserializer: D) -> Result<Vec<Tool>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: Vec<serde_json::Value> = Vec::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .filter_map(|value| serde_json::from_value(value).ok())
        .collect())
}
