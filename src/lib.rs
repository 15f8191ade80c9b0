//! Declarative management of OpenAI assistants and the files attached to
//! them.

pub mod config;
pub mod data_sources;
pub mod error;
pub mod host;
pub mod openai;
pub mod plan;
pub mod provider;
pub mod resources;
pub mod schema;

pub use config::{ApiKey, MissingPolicy, ProviderConfig};
pub use error::{ProviderError, ProviderResult};
pub use host::{Host, Manifest, StateFile};
pub use provider::{Provider, ProviderContext, Registry};
