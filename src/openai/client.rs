use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;

use super::models::{
    Assistant, AssistantFile, AssistantFileRequest, AssistantRequest, DeletionStatus,
    ErrorEnvelope, FileObject, FileUpload,
};
use crate::config::ApiKey;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const BETA_HEADER: &str = "OpenAI-Beta";
const BETA_VALUE: &str = "assistants=v1";

/// Errors from the remote API client.
///
/// `Api` carries the service's own message unchanged so it can be shown to
/// the user as-is.
#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("status {status}: {message}")]
    Api {
        status: u16,
        kind: Option<String>,
        message: String,
    },

    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::Api { status: 404, .. })
    }

    fn from_response(status: StatusCode, body: &str) -> Self {
        match serde_json::from_str::<ErrorEnvelope>(body) {
            Ok(envelope) => ApiError::Api {
                status: status.as_u16(),
                kind: envelope.error.kind,
                message: envelope.error.message,
            },
            Err(_) => ApiError::Api {
                status: status.as_u16(),
                kind: None,
                message: if body.trim().is_empty() {
                    status.canonical_reason().unwrap_or("unknown error").to_string()
                } else {
                    body.to_string()
                },
            },
        }
    }
}

/// The remote calls the provider needs: assistants, files, and the
/// attachment records linking them.
#[async_trait]
pub trait AssistantsApi: Send + Sync {
    async fn create_assistant(&self, request: &AssistantRequest) -> Result<Assistant, ApiError>;
    async fn retrieve_assistant(&self, assistant_id: &str) -> Result<Assistant, ApiError>;
    async fn modify_assistant(
        &self,
        assistant_id: &str,
        request: &AssistantRequest,
    ) -> Result<Assistant, ApiError>;
    async fn delete_assistant(&self, assistant_id: &str) -> Result<DeletionStatus, ApiError>;

    async fn create_file(&self, upload: FileUpload) -> Result<FileObject, ApiError>;
    async fn retrieve_file(&self, file_id: &str) -> Result<FileObject, ApiError>;
    async fn delete_file(&self, file_id: &str) -> Result<DeletionStatus, ApiError>;

    async fn attach_file(&self, assistant_id: &str, file_id: &str)
    -> Result<AssistantFile, ApiError>;
    async fn retrieve_assistant_file(
        &self,
        assistant_id: &str,
        file_id: &str,
    ) -> Result<AssistantFile, ApiError>;
    async fn detach_file(&self, assistant_id: &str, file_id: &str)
    -> Result<DeletionStatus, ApiError>;
}

pub struct HttpAssistantsClient {
    client: Client,
    api_key: ApiKey,
    base_url: String,
}

impl HttpAssistantsClient {
    pub fn new(client: Client, api_key: ApiKey, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client,
            api_key,
            base_url,
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{path}", self.base_url))
            .bearer_auth(self.api_key.expose())
            .header(BETA_HEADER, BETA_VALUE)
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ApiError> {
        let resp = builder.send().await?;
        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            tracing::debug!(status = %status, "OpenAI API returned an error");
            return Err(ApiError::from_response(status, &body));
        }

        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl AssistantsApi for HttpAssistantsClient {
    async fn create_assistant(&self, request: &AssistantRequest) -> Result<Assistant, ApiError> {
        self.send(self.request(Method::POST, "/assistants").json(request))
            .await
    }

    async fn retrieve_assistant(&self, assistant_id: &str) -> Result<Assistant, ApiError> {
        self.send(self.request(Method::GET, &format!("/assistants/{assistant_id}")))
            .await
    }

    async fn modify_assistant(
        &self,
        assistant_id: &str,
        request: &AssistantRequest,
    ) -> Result<Assistant, ApiError> {
        self.send(
            self.request(Method::POST, &format!("/assistants/{assistant_id}"))
                .json(request),
        )
        .await
    }

    async fn delete_assistant(&self, assistant_id: &str) -> Result<DeletionStatus, ApiError> {
        self.send(self.request(Method::DELETE, &format!("/assistants/{assistant_id}")))
            .await
    }

    async fn create_file(&self, upload: FileUpload) -> Result<FileObject, ApiError> {
        let part = Part::bytes(upload.bytes).file_name(upload.name);
        let form = Form::new()
            .text("purpose", upload.purpose)
            .part("file", part);
        self.send(self.request(Method::POST, "/files").multipart(form))
            .await
    }

    async fn retrieve_file(&self, file_id: &str) -> Result<FileObject, ApiError> {
        self.send(self.request(Method::GET, &format!("/files/{file_id}")))
            .await
    }

    async fn delete_file(&self, file_id: &str) -> Result<DeletionStatus, ApiError> {
        self.send(self.request(Method::DELETE, &format!("/files/{file_id}")))
            .await
    }

    async fn attach_file(
        &self,
        assistant_id: &str,
        file_id: &str,
    ) -> Result<AssistantFile, ApiError> {
        let payload = AssistantFileRequest {
            file_id: file_id.to_string(),
        };
        self.send(
            self.request(Method::POST, &format!("/assistants/{assistant_id}/files"))
                .json(&payload),
        )
        .await
    }

    async fn retrieve_assistant_file(
        &self,
        assistant_id: &str,
        file_id: &str,
    ) -> Result<AssistantFile, ApiError> {
        self.send(self.request(
            Method::GET,
            &format!("/assistants/{assistant_id}/files/{file_id}"),
        ))
        .await
    }

    async fn detach_file(
        &self,
        assistant_id: &str,
        file_id: &str,
    ) -> Result<DeletionStatus, ApiError> {
        self.send(self.request(
            Method::DELETE,
            &format!("/assistants/{assistant_id}/files/{file_id}"),
        ))
        .await
    }
}
