pub mod blob;
pub mod error;
pub mod facade;
pub mod kv;
pub mod lazy;
pub mod local;
pub mod models;
pub mod naming;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use facade::{Storage, StorageBuilder, StoragePolicy};
pub use lazy::LazyBackend;
pub use models::{DocumentKey, GalleryItem, SiteConfig};
pub use traits::{BlobStore, DocumentStore};
