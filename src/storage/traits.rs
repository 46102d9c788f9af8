use async_trait::async_trait;
use serde_json::Value;

use super::error::StoreResult;
use super::models::DocumentKey;

/// A backend able to persist the JSON documents of the site.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    fn backend_tag(&self) -> &'static str;

    /// `Ok(None)` when nothing is stored under `key`.
    async fn load(&self, key: DocumentKey) -> StoreResult<Option<Value>>;

    async fn store(&self, key: DocumentKey, value: &Value) -> StoreResult<()>;
}

/// A backend able to hold uploaded binary files.
#[async_trait]
pub trait BlobStore: Send + Sync {
    fn backend_tag(&self) -> &'static str;

    /// Store `bytes` under `filename` and return the URL or path that
    /// addresses it from now on.
    async fn put(&self, filename: &str, bytes: &[u8], content_type: &str) -> StoreResult<String>;

    /// Whether `reference` (a value previously returned by `put`) points into
    /// this backend.
    fn owns(&self, reference: &str) -> bool;

    /// Remove the object behind `reference`; `StoreError::NotFound` when it
    /// does not exist.
    async fn delete(&self, reference: &str) -> StoreResult<()>;
}
