use crate::db::{self, EntryQuery, Pool};
use crate::model::Entry;
use anyhow::Result;
use async_trait::async_trait;

/// Read side of the content store as seen by the renderer.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Entries matching `query`, in the query's order.
    async fn query_entries(&self, query: &EntryQuery) -> Result<Vec<Entry>>;
}

/// SQLite-backed store.
#[derive(Clone, Debug)]
pub struct SqliteStore {
    pool: Pool,
}

impl SqliteStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }
}

#[async_trait]
impl ContentStore for SqliteStore {
    async fn query_entries(&self, query: &EntryQuery) -> Result<Vec<Entry>> {
        db::query_entries(&self.pool, query).await
    }
}
