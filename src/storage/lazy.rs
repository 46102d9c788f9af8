use std::sync::{Arc, OnceLock};
use tracing::{info, warn};

use super::error::StoreResult;

type Factory<T> = Box<dyn Fn() -> StoreResult<Arc<T>> + Send + Sync>;

/// A backend client constructed on first use, at most once per process.
///
/// A failed construction is remembered as "unavailable" and never retried.
pub struct LazyBackend<T: ?Sized> {
    name: &'static str,
    cell: OnceLock<Option<Arc<T>>>,
    factory: Option<Factory<T>>,
}

impl<T: ?Sized> LazyBackend<T> {
    pub fn new<F>(name: &'static str, factory: F) -> Self
    where
        F: Fn() -> StoreResult<Arc<T>> + Send + Sync + 'static,
    {
        Self {
            name,
            cell: OnceLock::new(),
            factory: Some(Box::new(factory)),
        }
    }

    /// Wrap an already constructed client.
    pub fn ready(name: &'static str, backend: Arc<T>) -> Self {
        Self {
            name,
            cell: OnceLock::from(Some(backend)),
            factory: None,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The client, or `None` when construction failed.
    pub fn get(&self) -> Option<Arc<T>> {
        self.cell
            .get_or_init(|| {
                let Some(factory) = self.factory.as_ref() else {
                    return None;
                };
                match factory() {
                    Ok(backend) => {
                        info!(backend = self.name, "storage backend initialized");
                        Some(backend)
                    }
                    Err(e) => {
                        warn!(
                            backend = self.name,
                            error = %e,
                            "storage backend unavailable; falling back"
                        );
                        None
                    }
                }
            })
            .clone()
    }
}
