use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use super::error::{StoreError, StoreResult};
use super::kv::{default_retry_policy, http_client};
use super::traits::BlobStore;
use crate::config::Config;

const BLOB_API_VERSION: &str = "7";

/// Public object storage reached over the platform's blob REST API.
pub struct CloudBlobStore {
    client: reqwest::Client,
    api_url: Url,
    token: String,
    retry_policy: ExponentialBuilder,
}

#[derive(Debug, Deserialize)]
struct PutBlobResponse {
    url: String,
}

impl CloudBlobStore {
    pub fn new(client: reqwest::Client, api_url: Url, token: impl Into<String>) -> Self {
        Self {
            client,
            api_url,
            token: token.into(),
            retry_policy: default_retry_policy(),
        }
    }

    pub fn with_retry_policy(mut self, policy: ExponentialBuilder) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Build from `BLOB_READ_WRITE_TOKEN` and the configured API endpoint.
    pub fn from_config(cfg: &Config) -> StoreResult<Self> {
        let token = cfg
            .blob_read_write_token
            .clone()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                StoreError::UploadUnavailable("BLOB_READ_WRITE_TOKEN is not configured".to_string())
            })?;
        Ok(Self::new(http_client()?, cfg.blob_api_url.clone(), token))
    }

    fn endpoint(&self, segment: &str) -> StoreResult<Url> {
        let mut url = self.api_url.clone();
        url.path_segments_mut()
            .map_err(|_| StoreError::backend("blob", "blob api url cannot be a base"))?
            .pop_if_empty()
            .push(segment);
        Ok(url)
    }
}

#[async_trait]
impl BlobStore for CloudBlobStore {
    fn backend_tag(&self) -> &'static str {
        "blob"
    }

    async fn put(&self, filename: &str, bytes: &[u8], content_type: &str) -> StoreResult<String> {
        let url = self.endpoint(filename)?;
        let resp: PutBlobResponse = (|| async {
            Ok::<_, StoreError>(
                self.client
                    .put(url.clone())
                    .bearer_auth(&self.token)
                    .header("x-api-version", BLOB_API_VERSION)
                    .header("x-content-type", content_type)
                    .header("x-add-random-suffix", "0")
                    .body(bytes.to_vec())
                    .send()
                    .await?
                    .error_for_status()?
                    .json::<PutBlobResponse>()
                    .await?,
            )
        })
        .retry(self.retry_policy)
        .when(|e: &StoreError| e.is_retryable())
        .notify(|err, dur: Duration| {
            warn!("Blob upload retrying after error {}, sleeping {:?}", err, dur);
        })
        .await?;
        debug!(url = %resp.url, size = bytes.len(), "blob stored");
        Ok(resp.url)
    }

    fn owns(&self, reference: &str) -> bool {
        reference.starts_with("https://")
    }

    async fn delete(&self, reference: &str) -> StoreResult<()> {
        let url = self.endpoint("delete")?;
        let body = json!({ "urls": [reference] });
        let resp = (|| async {
            Ok::<_, StoreError>(
                self.client
                    .post(url.clone())
                    .bearer_auth(&self.token)
                    .header("x-api-version", BLOB_API_VERSION)
                    .json(&body)
                    .send()
                    .await?,
            )
        })
        .retry(self.retry_policy)
        .when(|e: &StoreError| e.is_retryable())
        .await?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound(format!("blob `{reference}`")));
        }
        resp.error_for_status()?;
        debug!(url = reference, "blob deleted");
        Ok(())
    }
}
