use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use super::error::{StoreError, StoreResult};
use super::models::DocumentKey;
use super::traits::DocumentStore;
use crate::config::Config;

pub(crate) fn default_retry_policy() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(200))
        .with_max_delay(Duration::from_secs(2))
        .with_max_times(3)
        .with_jitter()
}

pub(crate) fn http_client() -> StoreResult<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .user_agent("studio-site/1.0")
        .connect_timeout(Duration::from_secs(5))
        .timeout(Duration::from_secs(15))
        .build()?)
}

/// Redis-over-REST key-value store (Upstash protocol, as exposed by the
/// managed platform's KV product).
pub struct CloudKvStore {
    client: reqwest::Client,
    endpoint: Url,
    token: String,
    retry_policy: ExponentialBuilder,
}

#[derive(Debug, Deserialize)]
struct KvEnvelope {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<String>,
}

impl CloudKvStore {
    pub fn new(client: reqwest::Client, endpoint: Url, token: impl Into<String>) -> Self {
        Self {
            client,
            endpoint,
            token: token.into(),
            retry_policy: default_retry_policy(),
        }
    }

    pub fn with_retry_policy(mut self, policy: ExponentialBuilder) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Build from `KV_REST_API_URL` / `KV_REST_API_TOKEN`.
    pub fn from_config(cfg: &Config) -> StoreResult<Self> {
        let endpoint = cfg.kv_rest_api_url.clone().ok_or_else(|| {
            StoreError::StorageUnavailable("KV_REST_API_URL is not configured".to_string())
        })?;
        let token = cfg
            .kv_rest_api_token
            .clone()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                StoreError::StorageUnavailable("KV_REST_API_TOKEN is not configured".to_string())
            })?;
        Ok(Self::new(http_client()?, endpoint, token))
    }

    async fn command(&self, args: &[&str]) -> StoreResult<Value> {
        (|| async {
            let resp = self
                .client
                .post(self.endpoint.clone())
                .bearer_auth(&self.token)
                .json(args)
                .send()
                .await?;
            let status = resp.status();
            if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
                resp.error_for_status_ref()?;
            }
            // Command errors arrive as 4xx with an `{"error": ...}` body.
            match resp.json::<KvEnvelope>().await {
                Ok(envelope) => decode_envelope(envelope),
                Err(_) if !status.is_success() => Err(StoreError::backend(
                    "kv",
                    format!("unexpected status {status}"),
                )),
                Err(e) => Err(e.into()),
            }
        })
        .retry(self.retry_policy)
        .when(|e: &StoreError| e.is_retryable())
        .notify(|err, dur: Duration| {
            warn!("KV command {} retrying after error {}, sleeping {:?}", args[0], err, dur);
        })
        .await
    }
}

fn decode_envelope(envelope: KvEnvelope) -> StoreResult<Value> {
    match envelope.error {
        Some(message) => Err(StoreError::backend("kv", message)),
        None => Ok(envelope.result),
    }
}

/// Values are written as JSON text; anything that does not parse back is
/// returned as the raw string.
fn decode_stored(result: Value) -> Option<Value> {
    match result {
        Value::Null => None,
        Value::String(raw) => Some(serde_json::from_str(&raw).unwrap_or(Value::String(raw))),
        other => Some(other),
    }
}

#[async_trait]
impl DocumentStore for CloudKvStore {
    fn backend_tag(&self) -> &'static str {
        "kv"
    }

    async fn load(&self, key: DocumentKey) -> StoreResult<Option<Value>> {
        let result = self.command(&["GET", key.kv_key()]).await?;
        debug!(key = key.kv_key(), found = !result.is_null(), "KV GET");
        Ok(decode_stored(result))
    }

    async fn store(&self, key: DocumentKey, value: &Value) -> StoreResult<()> {
        let encoded = serde_json::to_string(value)?;
        self.command(&["SET", key.kv_key(), &encoded]).await?;
        debug!(key = key.kv_key(), "KV SET");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_http::serve;
    use axum::extract::State;
    use axum::http::HeaderMap;
    use axum::{Json, Router, routing::post};
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct RestKv {
        docs: Arc<Mutex<HashMap<String, String>>>,
        seen: Arc<Mutex<Vec<(String, Vec<String>)>>>,
    }

    async fn execute(
        State(kv): State<RestKv>,
        headers: HeaderMap,
        Json(command): Json<Vec<String>>,
    ) -> (StatusCode, Json<Value>) {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        kv.seen.lock().unwrap().push((auth.clone(), command.clone()));
        if auth != "Bearer kv-token" {
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({"error": "WRONGPASS invalid token"})),
            );
        }
        let mut docs = kv.docs.lock().unwrap();
        match command.as_slice() {
            [op, key] if op == "GET" => {
                let result = docs.get(key).cloned().map_or(Value::Null, Value::String);
                (StatusCode::OK, Json(json!({ "result": result })))
            }
            [op, key, value] if op == "SET" => {
                docs.insert(key.clone(), value.clone());
                (StatusCode::OK, Json(json!({"result": "OK"})))
            }
            _ => (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": "ERR unknown command"})),
            ),
        }
    }

    async fn rest_kv(token: &str) -> (CloudKvStore, RestKv) {
        let kv = RestKv::default();
        let url = serve(Router::new().route("/", post(execute)).with_state(kv.clone())).await;
        (CloudKvStore::new(reqwest::Client::new(), url, token), kv)
    }

    fn quick_retries() -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(1))
            .with_max_delay(Duration::from_millis(5))
            .with_max_times(3)
    }

    #[tokio::test]
    async fn documents_travel_as_set_and_get_commands() {
        let (store, kv) = rest_kv("kv-token").await;
        let doc = json!({"businessName": "Glow Bar"});

        store.store(DocumentKey::Config, &doc).await.unwrap();
        assert_eq!(store.load(DocumentKey::Config).await.unwrap(), Some(doc));
        assert_eq!(store.load(DocumentKey::Gallery).await.unwrap(), None);

        let seen = kv.seen.lock().unwrap();
        assert_eq!(
            seen[0],
            (
                "Bearer kv-token".to_string(),
                vec![
                    "SET".to_string(),
                    "config".to_string(),
                    r#"{"businessName":"Glow Bar"}"#.to_string()
                ]
            )
        );
        assert_eq!(seen[1].1, vec!["GET".to_string(), "config".to_string()]);
        assert_eq!(seen.len(), 3);
    }

    #[tokio::test]
    async fn error_envelopes_surface_without_retrying() {
        let (store, kv) = rest_kv("wrong").await;
        let err = store.load(DocumentKey::Config).await.unwrap_err();
        match err {
            StoreError::Backend { backend, message } => {
                assert_eq!(backend, "kv");
                assert_eq!(message, "WRONGPASS invalid token");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(kv.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn transient_unavailability_is_retried() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        let router = Router::new().route(
            "/",
            post(move || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                        (StatusCode::SERVICE_UNAVAILABLE, Json(json!({})))
                    } else {
                        (StatusCode::OK, Json(json!({"result": r#""$2b$04$hash""#})))
                    }
                }
            }),
        );
        let store = CloudKvStore::new(reqwest::Client::new(), serve(router).await, "t");

        let loaded = store.load(DocumentKey::PasswordHash).await.unwrap();
        assert_eq!(loaded, Some(json!("$2b$04$hash")));
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn persistent_unavailability_gives_up() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        let router = Router::new().route(
            "/",
            post(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { StatusCode::SERVICE_UNAVAILABLE }
            }),
        );
        let store = CloudKvStore::new(reqwest::Client::new(), serve(router).await, "t")
            .with_retry_policy(quick_retries());

        let err = store.load(DocumentKey::Config).await.unwrap_err();
        assert!(matches!(err, StoreError::Http(_)));
        assert!(err.is_retryable());
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn envelope_error_becomes_backend_error() {
        let env: KvEnvelope = serde_json::from_value(json!({"error": "WRONGPASS"})).unwrap();
        let err = decode_envelope(env).unwrap_err();
        assert!(matches!(err, StoreError::Backend { backend: "kv", .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn envelope_result_is_returned() {
        let env: KvEnvelope = serde_json::from_value(json!({"result": "OK"})).unwrap();
        assert_eq!(decode_envelope(env).unwrap(), json!("OK"));
    }

    #[test]
    fn stored_values_decode() {
        assert_eq!(decode_stored(Value::Null), None);
        assert_eq!(
            decode_stored(json!(r#"[{"id":"1"}]"#)),
            Some(json!([{"id": "1"}]))
        );
        assert_eq!(
            decode_stored(json!(r#""$2b$10$hash""#)),
            Some(json!("$2b$10$hash"))
        );
        assert_eq!(
            decode_stored(json!("$2b$10$plain")),
            Some(json!("$2b$10$plain"))
        );
    }

    #[test]
    fn missing_settings_fail_construction() {
        let cfg = Config::default();
        assert!(matches!(
            CloudKvStore::from_config(&cfg),
            Err(StoreError::StorageUnavailable(_))
        ));
    }
}
