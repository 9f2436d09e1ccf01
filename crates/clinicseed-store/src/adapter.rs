use async_trait::async_trait;

use crate::error::StoreResult;
use crate::query::{Filter, Query};
use clinicseed_core::Record;

/// Trait implemented by every row store the engine can seed.
#[async_trait]
pub trait Store: Send + Sync {
    /// Returns the backend identifier (e.g. `postgres`).
    fn backend(&self) -> &'static str;

    /// Rows of `table` matching the query.
    async fn select(&self, table: &str, query: &Query) -> StoreResult<Vec<Record>>;

    /// Insert one row and return it as stored, generated `id` included.
    async fn insert(&self, table: &str, record: &Record) -> StoreResult<Record>;

    /// Apply `patch` to every row matching `filters`; returns the number of rows touched.
    async fn update(&self, table: &str, filters: &[Filter], patch: &Record) -> StoreResult<u64>;

    /// Delete every row matching `filters`; returns the number of rows removed.
    async fn delete(&self, table: &str, filters: &[Filter]) -> StoreResult<u64>;
}
