use async_trait::async_trait;

use crate::error::Result;

/// Fetches raw text content for the text loader node.
///
/// What a `source` string means (path, URL, object key) is up to the implementation.
#[async_trait]
pub trait ContentLoader: Send + Sync {
    async fn load(&self, source: &str) -> Result<String>;
}
