use async_trait::async_trait;
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use super::error::{StoreError, StoreResult};
use super::models::{DocumentKey, PasswordRecord};
use super::traits::{BlobStore, DocumentStore};

/// URL prefix under which locally stored uploads are served.
pub const UPLOADS_URL_PREFIX: &str = "/uploads/";

/// JSON documents as files in a data directory.
#[derive(Debug, Clone)]
pub struct LocalDocumentStore {
    data_dir: PathBuf,
}

impl LocalDocumentStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn path_for(&self, key: DocumentKey) -> PathBuf {
        self.data_dir.join(key.file_name())
    }
}

#[async_trait]
impl DocumentStore for LocalDocumentStore {
    fn backend_tag(&self) -> &'static str {
        "filesystem"
    }

    async fn load(&self, key: DocumentKey) -> StoreResult<Option<Value>> {
        let path = self.path_for(key);
        let contents = match fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let value: Value = serde_json::from_str(&contents)?;

        // password.json wraps the hash in an object.
        if key == DocumentKey::PasswordHash {
            let record: PasswordRecord = serde_json::from_value(value)?;
            if record.hash.is_empty() {
                return Ok(None);
            }
            return Ok(Some(Value::String(record.hash)));
        }
        Ok(Some(value))
    }

    async fn store(&self, key: DocumentKey, value: &Value) -> StoreResult<()> {
        let body = match (key, value) {
            (DocumentKey::PasswordHash, Value::String(hash)) => {
                serde_json::to_string_pretty(&PasswordRecord { hash: hash.clone() })?
            }
            (DocumentKey::PasswordHash, _) => {
                return Err(StoreError::InvalidArgument(
                    "password hash must be a string".to_string(),
                ));
            }
            _ => serde_json::to_string_pretty(value)?,
        };

        fs::create_dir_all(&self.data_dir).await?;
        let path = self.path_for(key);
        write_replace(&path, body.as_bytes()).await?;
        debug!(path = %path.display(), "document written");
        Ok(())
    }
}

/// Uploaded files in a directory served under `/uploads/`.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    uploads_dir: PathBuf,
}

impl LocalBlobStore {
    pub fn new(uploads_dir: impl Into<PathBuf>) -> Self {
        Self {
            uploads_dir: uploads_dir.into(),
        }
    }

    pub fn uploads_dir(&self) -> &Path {
        &self.uploads_dir
    }

    /// Read a stored upload by bare file name.
    pub async fn read(&self, filename: &str) -> StoreResult<Vec<u8>> {
        let path = self.resolve(filename)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::NotFound(format!(
                "upload `{filename}`"
            ))),
            Err(e) => Err(e.into()),
        }
    }

    /// Map a file name onto the uploads directory, refusing anything that
    /// could escape it.
    fn resolve(&self, filename: &str) -> StoreResult<PathBuf> {
        if filename.is_empty()
            || filename == "."
            || filename == ".."
            || filename.contains(['/', '\\'])
        {
            return Err(StoreError::InvalidArgument(format!(
                "invalid upload name `{filename}`"
            )));
        }
        Ok(self.uploads_dir.join(filename))
    }
}

/// Last path segment of a URL or path, without query string.
pub fn reference_basename(reference: &str) -> &str {
    let without_query = reference.split(['?', '#']).next().unwrap_or_default();
    without_query
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    fn backend_tag(&self) -> &'static str {
        "filesystem"
    }

    async fn put(&self, filename: &str, bytes: &[u8], _content_type: &str) -> StoreResult<String> {
        let path = self.resolve(filename)?;
        fs::create_dir_all(&self.uploads_dir).await?;
        fs::write(&path, bytes).await?;
        debug!(path = %path.display(), size = bytes.len(), "upload written");
        Ok(format!("{UPLOADS_URL_PREFIX}{filename}"))
    }

    /// Any reference with a file name: a stale cloud URL in a local install
    /// still names a file that may sit in the uploads directory.
    fn owns(&self, reference: &str) -> bool {
        !reference_basename(reference).is_empty()
    }

    async fn delete(&self, reference: &str) -> StoreResult<()> {
        let path = self.resolve(reference_basename(reference))?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StoreError::NotFound(format!("upload `{reference}`")))
            }
            Err(e) => Err(e.into()),
        }
    }
}

async fn write_replace(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, bytes).await?;
    fs::rename(&tmp, path).await
}
