use crate::error::StoreError;
use crate::models::{FailedFragment, RetryPolicy, VectorRecord};
use crate::retry::retry_with_backoff;
use crate::traits::VectorIndex;

/// Outcome of writing one document's records: which ids landed and which
/// batches were lost after retries.
#[derive(Debug, Default)]
pub struct UpsertReport {
    pub upserted_ids: Vec<String>,
    pub failed: Vec<FailedFragment>,
}

/// Writes vector records in size-bounded batches.
///
/// Each batch is retried on transient store errors; a batch that still
/// fails reports its member ids and is excluded from the success count
/// while the remaining batches proceed.
#[derive(Debug, Clone, Copy)]
pub struct UpsertManager {
    batch_size: usize,
    retry: RetryPolicy,
}

impl UpsertManager {
    pub fn new(batch_size: usize, retry: RetryPolicy) -> Self {
        Self {
            batch_size: batch_size.max(1),
            retry,
        }
    }

    pub async fn run<V>(&self, index: &V, records: &[VectorRecord]) -> UpsertReport
    where
        V: VectorIndex + ?Sized,
    {
        let mut report = UpsertReport::default();

        for batch in records.chunks(self.batch_size) {
            let outcome = retry_with_backoff(&self.retry, StoreError::is_transient, || {
                index.upsert(batch)
            })
            .await;

            match outcome {
                Ok(()) => {
                    report
                        .upserted_ids
                        .extend(batch.iter().map(|record| record.id.clone()));
                }
                Err(error) => {
                    tracing::warn!(
                        batch_len = batch.len(),
                        error = %error,
                        "Upsert batch failed after retries"
                    );
                    let reason = format!("upsert batch failed: {error}");
                    report.failed.extend(batch.iter().map(|record| FailedFragment {
                        id: record.id.clone(),
                        reason: reason.clone(),
                    }));
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::UpsertManager;
    use crate::error::StoreError;
    use crate::models::{
        BoundingBox, FragmentMetadata, RetryPolicy, SearchHit, VectorRecord,
    };
    use crate::traits::VectorIndex;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    fn record(index: u64) -> VectorRecord {
        VectorRecord {
            id: format!("doc.pdf_chunk_{index}"),
            embedding: vec![0.0; 4],
            metadata: FragmentMetadata {
                text: format!("fragment {index}"),
                source_file: "doc.pdf".to_string(),
                page_number: 1,
                bbox: BoundingBox::ZERO,
                sequence_index: index,
            },
        }
    }

    fn fast_retry(max_attempts: usize) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
        }
    }

    /// Index double that can fail batches containing a marked id, either
    /// permanently or only for the first few calls.
    #[derive(Default)]
    struct ScriptedIndex {
        upsert_calls: AtomicUsize,
        fail_id: Option<String>,
        transient_failures: AtomicUsize,
        stored: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl VectorIndex for ScriptedIndex {
        async fn ensure_index(&self) -> Result<(), StoreError> {
            Ok(())
        }

        async fn upsert(&self, records: &[VectorRecord]) -> Result<(), StoreError> {
            self.upsert_calls.fetch_add(1, Ordering::SeqCst);

            if self.transient_failures.load(Ordering::SeqCst) > 0 {
                self.transient_failures.fetch_sub(1, Ordering::SeqCst);
                return Err(StoreError::BackendResponse {
                    backend: "pinecone".to_string(),
                    details: "503 Service Unavailable".to_string(),
                });
            }

            if let Some(fail_id) = &self.fail_id {
                if records.iter().any(|record| &record.id == fail_id) {
                    return Err(StoreError::Request("payload rejected".to_string()));
                }
            }

            self.stored
                .lock()
                .expect("stored lock")
                .extend(records.iter().map(|record| record.id.clone()));
            Ok(())
        }

        async fn query(&self, _: &[f32], _: usize) -> Result<Vec<SearchHit>, StoreError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn records_are_split_into_bounded_batches() {
        let index = ScriptedIndex::default();
        let records: Vec<_> = (0..5).map(record).collect();

        let report = UpsertManager::new(2, fast_retry(1)).run(&index, &records).await;

        assert_eq!(index.upsert_calls.load(Ordering::SeqCst), 3);
        assert_eq!(report.upserted_ids.len(), 5);
        assert!(report.failed.is_empty());
    }

    #[tokio::test]
    async fn failed_batch_reports_members_and_others_proceed() {
        let index = ScriptedIndex {
            fail_id: Some("doc.pdf_chunk_2".to_string()),
            ..ScriptedIndex::default()
        };
        let records: Vec<_> = (0..5).map(record).collect();

        let report = UpsertManager::new(2, fast_retry(1)).run(&index, &records).await;

        // Batch [2,3] is lost; [0,1] and [4] still land.
        assert_eq!(report.upserted_ids, vec![
            "doc.pdf_chunk_0".to_string(),
            "doc.pdf_chunk_1".to_string(),
            "doc.pdf_chunk_4".to_string(),
        ]);
        assert_eq!(report.failed.len(), 2);
        assert!(report.failed[0].reason.contains("upsert batch failed"));
    }

    #[tokio::test]
    async fn transient_batch_failure_is_retried_to_success() {
        let index = ScriptedIndex {
            transient_failures: AtomicUsize::new(1),
            ..ScriptedIndex::default()
        };
        let records: Vec<_> = (0..2).map(record).collect();

        let report = UpsertManager::new(10, fast_retry(3)).run(&index, &records).await;

        assert_eq!(report.upserted_ids.len(), 2);
        assert!(report.failed.is_empty());
        assert_eq!(index.upsert_calls.load(Ordering::SeqCst), 2);
    }
}
