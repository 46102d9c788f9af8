use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use super::blob::CloudBlobStore;
use super::error::{StoreError, StoreResult};
use super::kv::CloudKvStore;
use super::lazy::LazyBackend;
use super::local::{LocalBlobStore, LocalDocumentStore};
use super::models::{DocumentKey, GalleryItem, SiteConfig, ensure_unique_ids, gallery_from_value};
use super::naming::content_type_for;
use super::traits::{BlobStore, DocumentStore};
use crate::config::Config;
use crate::service::password::{BCRYPT_COST, DEFAULT_ADMIN_PASSWORD, hash_password};

pub const DEFAULT_CONTENT_TYPE: &str = "image/jpeg";

/// Which kinds of backend this process may use. Decided once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoragePolicy {
    /// Managed cloud environment: the KV and blob backends are eligible.
    pub cloud_managed: bool,
    /// The local filesystem is writable and may hold documents and uploads.
    pub filesystem: bool,
}

/// Outcome of walking the document chain for one key.
enum Lookup<T> {
    Found(T),
    /// Every eligible backend answered that nothing is stored.
    Missing,
    /// Nothing found, and at least one backend failed to answer.
    Unreadable,
}

impl<T> Lookup<T> {
    fn found(self) -> Option<T> {
        match self {
            Lookup::Found(doc) => Some(doc),
            Lookup::Missing | Lookup::Unreadable => None,
        }
    }

    /// Found or defaulted; an unreadable document is an error.
    fn or_default(self, key: DocumentKey) -> StoreResult<T>
    where
        T: Default,
    {
        match self {
            Lookup::Found(doc) => Ok(doc),
            Lookup::Missing => Ok(T::default()),
            Lookup::Unreadable => Err(StoreError::StorageUnavailable(format!(
                "{} could not be read",
                key.kv_key()
            ))),
        }
    }
}

/// Single entry point for every document and file the site persists.
///
/// Each call walks an ordered chain of backends: the cloud backend first when
/// the policy allows it and its client could be built, then the local
/// filesystem when allowed. The `get_*` reads never fail; the `load_*` reads
/// used before updates fail when a backend could not answer. Writes fail only
/// once every eligible backend has been tried.
pub struct Storage {
    policy: StoragePolicy,
    kv: Option<LazyBackend<dyn DocumentStore>>,
    blob: Option<LazyBackend<dyn BlobStore>>,
    local_docs: Option<Arc<LocalDocumentStore>>,
    local_blobs: Option<Arc<LocalBlobStore>>,
    password_cost: u32,
    default_hash: OnceCell<String>,
    default_persisted: OnceCell<()>,
}

pub struct StorageBuilder {
    policy: StoragePolicy,
    kv: Option<LazyBackend<dyn DocumentStore>>,
    blob: Option<LazyBackend<dyn BlobStore>>,
    data_dir: Option<PathBuf>,
    uploads_dir: Option<PathBuf>,
    password_cost: u32,
}

impl StorageBuilder {
    pub fn kv(mut self, kv: LazyBackend<dyn DocumentStore>) -> Self {
        self.kv = Some(kv);
        self
    }

    pub fn blob(mut self, blob: LazyBackend<dyn BlobStore>) -> Self {
        self.blob = Some(blob);
        self
    }

    pub fn filesystem(mut self, data_dir: impl Into<PathBuf>, uploads_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(data_dir.into());
        self.uploads_dir = Some(uploads_dir.into());
        self
    }

    pub fn password_cost(mut self, cost: u32) -> Self {
        self.password_cost = cost;
        self
    }

    pub fn build(self) -> Storage {
        let filesystem = self.policy.filesystem;
        Storage {
            policy: self.policy,
            kv: self.kv,
            blob: self.blob,
            local_docs: self
                .data_dir
                .filter(|_| filesystem)
                .map(|dir| Arc::new(LocalDocumentStore::new(dir))),
            local_blobs: self
                .uploads_dir
                .filter(|_| filesystem)
                .map(|dir| Arc::new(LocalBlobStore::new(dir))),
            password_cost: self.password_cost,
            default_hash: OnceCell::new(),
            default_persisted: OnceCell::new(),
        }
    }
}

impl Storage {
    pub fn builder(policy: StoragePolicy) -> StorageBuilder {
        StorageBuilder {
            policy,
            kv: None,
            blob: None,
            data_dir: None,
            uploads_dir: None,
            password_cost: BCRYPT_COST,
        }
    }

    /// Wire the backends the configuration makes eligible. Cloud clients are
    /// only constructed on first use.
    pub fn from_config(cfg: &Config) -> Self {
        let policy = StoragePolicy {
            cloud_managed: cfg.cloud_managed(),
            filesystem: cfg.filesystem_enabled(),
        };
        let mut builder = Storage::builder(policy).password_cost(cfg.password_cost);

        if policy.cloud_managed {
            let kv_cfg = cfg.clone();
            builder = builder.kv(LazyBackend::new("kv", move || {
                Ok(Arc::new(CloudKvStore::from_config(&kv_cfg)?) as Arc<dyn DocumentStore>)
            }));
            let blob_cfg = cfg.clone();
            builder = builder.blob(LazyBackend::new("blob", move || {
                Ok(Arc::new(CloudBlobStore::from_config(&blob_cfg)?) as Arc<dyn BlobStore>)
            }));
        }
        if policy.filesystem {
            builder = builder.filesystem(&cfg.data_dir, &cfg.uploads_dir);
        }
        builder.build()
    }

    pub fn policy(&self) -> StoragePolicy {
        self.policy
    }

    /// bcrypt cost for newly stored admin passwords.
    pub fn password_cost(&self) -> u32 {
        self.password_cost
    }

    /// Build cloud clients, create local directories and install the
    /// default admin password if none is stored.
    pub async fn ensure_initialized(&self) -> StoreResult<()> {
        if let Some(local) = &self.local_docs
            && let Err(e) = tokio::fs::create_dir_all(local.data_dir()).await
        {
            warn!(path = %local.data_dir().display(), error = %e, "could not create data directory");
        }
        if let Some(local) = &self.local_blobs
            && let Err(e) = tokio::fs::create_dir_all(local.uploads_dir()).await
        {
            warn!(path = %local.uploads_dir().display(), error = %e, "could not create uploads directory");
        }

        let documents: Vec<&str> = self
            .document_chain()
            .iter()
            .map(|b| b.backend_tag())
            .collect();
        let files: Vec<&str> = self.blob_chain().iter().map(|b| b.backend_tag()).collect();
        info!(
            cloud_managed = self.policy.cloud_managed,
            filesystem = self.policy.filesystem,
            documents = ?documents,
            files = ?files,
            "storage backends resolved"
        );
        if documents.is_empty() {
            warn!("no document backend available; settings changes will fail");
        }

        self.get_password_hash().await?;
        Ok(())
    }

    // ---- config ----

    pub async fn get_config(&self) -> SiteConfig {
        self.lookup::<SiteConfig>(DocumentKey::Config)
            .await
            .found()
            .unwrap_or_default()
    }

    /// Like `get_config`, but fails instead of defaulting when a backend
    /// could not answer. Used before read-modify-write updates.
    pub async fn load_config(&self) -> StoreResult<SiteConfig> {
        self.lookup::<SiteConfig>(DocumentKey::Config)
            .await
            .or_default(DocumentKey::Config)
    }

    pub async fn save_config(&self, config: &SiteConfig) -> StoreResult<()> {
        let value = serde_json::to_value(config)?;
        self.write_document(DocumentKey::Config, &value).await
    }

    // ---- gallery ----

    pub async fn get_gallery(&self) -> Vec<GalleryItem> {
        self.lookup::<Vec<GalleryItem>>(DocumentKey::Gallery)
            .await
            .found()
            .unwrap_or_default()
    }

    /// Like `get_gallery`, but fails when the stored sequence could not be
    /// read or does not parse.
    pub async fn load_gallery(&self) -> StoreResult<Vec<GalleryItem>> {
        self.lookup::<Vec<GalleryItem>>(DocumentKey::Gallery)
            .await
            .or_default(DocumentKey::Gallery)
    }

    /// Validate untyped input (e.g. a reorder request) as a gallery sequence.
    pub fn parse_gallery(&self, value: Value) -> StoreResult<Vec<GalleryItem>> {
        gallery_from_value(value)
    }

    pub async fn save_gallery(&self, gallery: &[GalleryItem]) -> StoreResult<()> {
        ensure_unique_ids(gallery)?;
        let value = serde_json::to_value(gallery)?;
        self.write_document(DocumentKey::Gallery, &value).await
    }

    // ---- admin password ----

    /// The stored admin password hash. With nothing stored, a hash of the
    /// default credential is created once per process. It is persisted the
    /// first time every backend confirms that nothing is stored.
    pub async fn get_password_hash(&self) -> StoreResult<String> {
        let lookup = self.lookup::<String>(DocumentKey::PasswordHash).await;
        let persist = match lookup {
            Lookup::Found(hash) if !hash.is_empty() => return Ok(hash),
            Lookup::Found(_) | Lookup::Missing => true,
            // A backend that could not answer may still hold a real password.
            Lookup::Unreadable => false,
        };

        let hash = self
            .default_hash
            .get_or_try_init(|| async {
                info!("no admin password stored; using the default credential");
                hash_password(DEFAULT_ADMIN_PASSWORD, self.password_cost).await
            })
            .await?;

        if persist {
            let saved = self
                .default_persisted
                .get_or_try_init(|| self.save_password_hash(hash))
                .await;
            if let Err(e) = saved {
                warn!(error = %e, "failed to persist default password hash");
            }
        }
        Ok(hash.clone())
    }

    pub async fn save_password_hash(&self, hash: &str) -> StoreResult<()> {
        if hash.is_empty() {
            return Err(StoreError::InvalidArgument(
                "password hash is required".to_string(),
            ));
        }
        self.write_document(DocumentKey::PasswordHash, &Value::String(hash.to_string()))
            .await
    }

    // ---- files ----

    /// Store an uploaded file and return the URL or path that addresses it.
    pub async fn upload_file(
        &self,
        bytes: &[u8],
        filename: &str,
        content_type: Option<&str>,
    ) -> StoreResult<String> {
        if bytes.is_empty() || filename.is_empty() {
            return Err(StoreError::InvalidArgument(
                "file bytes and filename are required".to_string(),
            ));
        }
        let content_type = content_type
            .filter(|c| !c.is_empty())
            .unwrap_or(DEFAULT_CONTENT_TYPE);

        let mut last_error = None;
        for backend in self.blob_chain() {
            match backend.put(filename, bytes, content_type).await {
                Ok(url) => {
                    info!(backend = backend.backend_tag(), %url, "file uploaded");
                    return Ok(url);
                }
                Err(e) => {
                    warn!(backend = backend.backend_tag(), error = %e, "upload failed; falling back");
                    last_error = Some(e);
                }
            }
        }
        Err(StoreError::UploadUnavailable(match last_error {
            Some(e) => format!("failed to upload `{filename}`: {e}"),
            None => "no file storage backend is available".to_string(),
        }))
    }

    /// Remove a previously uploaded file. Never fails: a missing file or a
    /// backend error must not block the record update that triggered it.
    pub async fn delete_file(&self, reference: &str) {
        if reference.is_empty() {
            return;
        }
        for backend in self.blob_chain() {
            if !backend.owns(reference) {
                continue;
            }
            match backend.delete(reference).await {
                Ok(()) => {
                    info!(backend = backend.backend_tag(), reference, "file deleted");
                    return;
                }
                Err(StoreError::NotFound(_)) => {
                    debug!(backend = backend.backend_tag(), reference, "file already gone");
                    return;
                }
                Err(e) => {
                    warn!(backend = backend.backend_tag(), reference, error = %e, "file delete failed");
                }
            }
        }
    }

    /// Bytes and content type of a file kept in the local uploads directory.
    pub async fn read_upload(&self, filename: &str) -> Option<(Vec<u8>, &'static str)> {
        let local = self.local_blobs.as_ref()?;
        match local.read(filename).await {
            Ok(bytes) => Some((bytes, content_type_for(filename))),
            Err(StoreError::NotFound(_) | StoreError::InvalidArgument(_)) => None,
            Err(e) => {
                warn!(filename, error = %e, "failed to read upload");
                None
            }
        }
    }

    // ---- chains ----

    fn document_chain(&self) -> Vec<Arc<dyn DocumentStore>> {
        let mut chain: Vec<Arc<dyn DocumentStore>> = Vec::with_capacity(2);
        if self.policy.cloud_managed
            && let Some(kv) = self.kv.as_ref().and_then(LazyBackend::get)
        {
            chain.push(kv);
        }
        if let Some(local) = &self.local_docs {
            chain.push(local.clone());
        }
        chain
    }

    fn blob_chain(&self) -> Vec<Arc<dyn BlobStore>> {
        let mut chain: Vec<Arc<dyn BlobStore>> = Vec::with_capacity(2);
        if self.policy.cloud_managed
            && let Some(blob) = self.blob.as_ref().and_then(LazyBackend::get)
        {
            chain.push(blob);
        }
        if let Some(local) = &self.local_blobs {
            chain.push(local.clone());
        }
        chain
    }

    async fn lookup<T: DeserializeOwned>(&self, key: DocumentKey) -> Lookup<T> {
        let mut failed = false;
        for backend in self.document_chain() {
            let tag = backend.backend_tag();
            match backend.load(key).await {
                Ok(Some(value)) => match serde_json::from_value::<T>(value) {
                    Ok(doc) => return Lookup::Found(doc),
                    Err(e) => {
                        warn!(backend = tag, key = key.kv_key(), error = %e, "stored document has an unexpected shape");
                        failed = true;
                    }
                },
                Ok(None) => debug!(backend = tag, key = key.kv_key(), "document not stored"),
                Err(e) => {
                    warn!(backend = tag, key = key.kv_key(), error = %e, "document read failed; falling back");
                    failed = true;
                }
            }
        }
        if failed { Lookup::Unreadable } else { Lookup::Missing }
    }

    async fn write_document(&self, key: DocumentKey, value: &Value) -> StoreResult<()> {
        let mut last_error = None;
        for backend in self.document_chain() {
            match backend.store(key, value).await {
                Ok(()) => {
                    debug!(backend = backend.backend_tag(), key = key.kv_key(), "document saved");
                    return Ok(());
                }
                Err(e) => {
                    warn!(backend = backend.backend_tag(), key = key.kv_key(), error = %e, "document write failed; falling back");
                    last_error = Some(e);
                }
            }
        }
        Err(StoreError::StorageUnavailable(match last_error {
            Some(e) => format!("failed to save {}: {e}", key.kv_key()),
            None => format!("no storage backend available to save {}", key.kv_key()),
        }))
    }
}
