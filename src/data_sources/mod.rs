pub mod assistant;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ProviderResult;
use crate::schema::DataSourceDescriptor;

pub use assistant::{AssistantDataSource, AssistantView};

/// A read-only lookup: configuration in, computed attributes out.
#[async_trait]
pub trait DataSource: Send + Sync {
    fn descriptor(&self) -> DataSourceDescriptor;

    async fn read(&self, config: Value) -> ProviderResult<Value>;
}
