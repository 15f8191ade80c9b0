use std::io;
use std::path::PathBuf;

use crate::openai::ApiError;

/// Errors surfaced by the provider, its resources and data sources.
///
/// Nothing here is retried. `Remote` keeps the client's error as its source so
/// the service message reaches the user unchanged.
#[derive(thiserror::Error, Debug)]
pub enum ProviderError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("could not read {}: {source}", path.display())]
    LocalIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{summary}: {source}")]
    Remote {
        summary: String,
        #[source]
        source: ApiError,
    },
}

impl ProviderError {
    pub fn remote(summary: impl Into<String>, source: ApiError) -> Self {
        ProviderError::Remote {
            summary: summary.into(),
            source,
        }
    }

    /// True when the remote service reported the entity as gone.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ProviderError::Remote { source, .. } if source.is_not_found())
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;
