use crate::blob::BlobStore;
use crate::embedder::Embedder;
use crate::error::{EmbedError, IngestError, SearchError};
use crate::extractor::FragmentExtractor;
use crate::identity::fragment_id;
use crate::models::{
    FailedFragment, FragmentMetadata, JobStatus, JobSummary, PipelineOptions, SearchHit,
    TextFragment, VectorRecord,
};
use crate::retry::retry_with_backoff;
use crate::traits::VectorIndex;
use crate::upsert::UpsertManager;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use tokio::sync::Mutex as AsyncMutex;
use uuid::Uuid;

/// Coordinates one document's journey from blob store to vector index.
///
/// Collaborators are passed in explicitly so tests can substitute fakes;
/// there are no module-level clients. The pipeline owns the per-filename
/// lock table and the partial-failure policy:
///
/// `Pending → Extracting → Embedding → Upserting → {Completed | Failed}`
///
/// Fetch, extraction, and index-provisioning failures are fatal. Embedding
/// failures are fatal only when every fragment fails; upsert batch failures
/// degrade the result but never fail the job.
pub struct IngestionPipeline<B, X, E, V> {
    blob: B,
    extractor: X,
    embedder: E,
    index: V,
    bucket: String,
    options: PipelineOptions,
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

struct IngestionJob {
    job_id: Uuid,
    source_file: String,
    status: JobStatus,
}

impl IngestionJob {
    fn new(source_file: &str) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            source_file: source_file.to_string(),
            status: JobStatus::Pending,
        }
    }

    fn advance(&mut self, status: JobStatus) {
        tracing::info!(
            job = %self.job_id,
            source = %self.source_file,
            from = ?self.status,
            to = ?status,
            "Job transition"
        );
        self.status = status;
    }
}

impl<B, X, E, V> IngestionPipeline<B, X, E, V>
where
    B: BlobStore,
    X: FragmentExtractor,
    E: Embedder,
    V: VectorIndex,
{
    pub fn new(
        blob: B,
        extractor: X,
        embedder: E,
        index: V,
        bucket: impl Into<String>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            blob,
            extractor,
            embedder,
            index,
            bucket: bucket.into(),
            options,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Run one ingestion job for the given storage key. A second call for
    /// the same key waits until this job reaches a terminal state; both
    /// would target the same deterministic ids and must not interleave.
    pub async fn ingest(&self, key: &str) -> Result<JobSummary, IngestError> {
        let _guard = self.lock_cell(key).lock_owned().await;
        self.run_job(key).await
    }

    /// Like [`ingest`](Self::ingest) but rejects instead of waiting when a
    /// job for the same key is already in flight.
    pub async fn try_ingest(&self, key: &str) -> Result<JobSummary, IngestError> {
        let _guard = self
            .lock_cell(key)
            .try_lock_owned()
            .map_err(|_| IngestError::JobAlreadyRunning {
                key: key.to_string(),
            })?;
        self.run_job(key).await
    }

    /// Embed a free-text query and return the closest fragments; the read
    /// side of the contract the index population exists for.
    pub async fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchHit>, SearchError> {
        let vector = retry_with_backoff(&self.options.retry, EmbedError::is_transient, || {
            self.embedder.embed(query)
        })
        .await?;

        Ok(self.index.query(&vector, top_k).await?)
    }

    fn lock_cell(&self, key: &str) -> Arc<AsyncMutex<()>> {
        let mut table = self.locks.lock().expect("lock table poisoned");
        // A strong count of 1 means no job holds or awaits the cell; drop
        // it so the table stays bounded by in-flight keys.
        table.retain(|_, cell| Arc::strong_count(cell) > 1);
        table.entry(key.to_string()).or_default().clone()
    }

    async fn run_job(&self, key: &str) -> Result<JobSummary, IngestError> {
        let mut job = IngestionJob::new(key);
        match self.run_stages(&mut job, key).await {
            Ok(summary) => Ok(summary),
            Err(error) => {
                job.advance(JobStatus::Failed);
                tracing::warn!(job = %job.job_id, source = %key, error = %error, "Ingestion job failed");
                Err(error)
            }
        }
    }

    async fn run_stages(
        &self,
        job: &mut IngestionJob,
        key: &str,
    ) -> Result<JobSummary, IngestError> {
        let started_at = Utc::now();

        let bytes = self
            .blob
            .fetch(&self.bucket, key)
            .await
            .map_err(|source| IngestError::SourceFetch {
                key: key.to_string(),
                source,
            })?;
        let checksum = format!("{:x}", Sha256::digest(&bytes));

        job.advance(JobStatus::Extracting);
        let fragments = self.extractor.extract(key, &bytes)?;
        let fragments_extracted = fragments.len();
        drop(bytes);

        job.advance(JobStatus::Embedding);
        let (records, mut failed_fragments) = self.embed_fragments(fragments).await;

        if records.is_empty() {
            return Err(IngestError::Embedding {
                failed: failed_fragments.len(),
            });
        }

        job.advance(JobStatus::Upserting);
        self.index.ensure_index().await?;

        let manager = UpsertManager::new(self.options.upsert_batch_size, self.options.retry);
        let report = manager.run(&self.index, &records).await;
        failed_fragments.extend(report.failed);

        job.advance(JobStatus::Completed);
        tracing::info!(
            job = %job.job_id,
            source = %key,
            extracted = fragments_extracted,
            upserted = report.upserted_ids.len(),
            failed = failed_fragments.len(),
            "Ingestion job completed"
        );

        let sample_ids = report
            .upserted_ids
            .iter()
            .take(self.options.sample_ids)
            .cloned()
            .collect();

        Ok(JobSummary {
            job_id: job.job_id,
            status: job.status,
            source_file: key.to_string(),
            checksum,
            fragments_extracted,
            fragments_upserted: report.upserted_ids.len(),
            failed_fragments,
            sample_ids,
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// Fan fragments out to the embedding provider with bounded
    /// concurrency. Each result stays attached to its originating fragment;
    /// the combined output is re-sorted by `sequence_index` so reported
    /// order never depends on completion order.
    async fn embed_fragments(
        &self,
        fragments: Vec<TextFragment>,
    ) -> (Vec<VectorRecord>, Vec<FailedFragment>) {
        let retry = self.options.retry;
        let embedder = &self.embedder;

        let mut outcomes: Vec<(TextFragment, Result<Vec<f32>, EmbedError>)> =
            stream::iter(fragments)
                .map(|fragment| async move {
                    let outcome = retry_with_backoff(&retry, EmbedError::is_transient, || {
                        embedder.embed(&fragment.text)
                    })
                    .await;
                    (fragment, outcome)
                })
                .buffer_unordered(self.options.embed_concurrency.max(1))
                .collect()
                .await;

        outcomes.sort_by_key(|(fragment, _)| fragment.sequence_index);

        let mut records = Vec::with_capacity(outcomes.len());
        let mut failed = Vec::new();

        for (fragment, outcome) in outcomes {
            let id = fragment_id(&fragment.source_file, fragment.sequence_index);
            match outcome {
                Ok(embedding) => records.push(VectorRecord {
                    id,
                    embedding,
                    metadata: FragmentMetadata::from_fragment(&fragment),
                }),
                Err(error) => {
                    tracing::warn!(
                        fragment = %id,
                        error = %error,
                        "Fragment embedding failed after retries"
                    );
                    failed.push(FailedFragment {
                        id,
                        reason: format!("embedding failed: {error}"),
                    });
                }
            }
        }

        (records, failed)
    }
}
