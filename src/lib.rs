pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod service;
pub mod storage;

pub use error::SiteError;
pub use storage::{Storage, StoreError};
