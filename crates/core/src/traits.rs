use crate::error::StoreError;
use crate::models::{SearchHit, VectorRecord};
use async_trait::async_trait;

/// External vector index: idempotent provisioning, upsert-by-id writes,
/// and similarity queries.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Create the index if absent, with the configured dimensionality and
    /// a cosine similarity metric. Must be safe to call repeatedly.
    async fn ensure_index(&self) -> Result<(), StoreError>;

    /// Write one batch. Records sharing an id with prior content overwrite
    /// it rather than appending.
    async fn upsert(&self, records: &[VectorRecord]) -> Result<(), StoreError>;

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<SearchHit>, StoreError>;
}
