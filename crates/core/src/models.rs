use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Span coordinates in the rendering engine's native space.
///
/// The four values are carried through exactly as the engine reports them;
/// no normalization to page-relative units is applied.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl BoundingBox {
    pub const ZERO: Self = Self {
        x0: 0.0,
        y0: 0.0,
        x1: 0.0,
        y1: 0.0,
    };
}

/// A minimal contiguous unit of extracted text with page and spatial metadata.
///
/// `sequence_index` is dense over emitted fragments: spans that trim to empty
/// never consume an index slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextFragment {
    pub source_file: String,
    /// 1-based page number.
    pub page_number: u32,
    /// 0-based order of discovery within the document.
    pub sequence_index: u64,
    /// Whitespace-trimmed, never empty.
    pub text: String,
    pub bbox: BoundingBox,
}

/// Payload persisted alongside each vector; downstream search consumers
/// depend on this shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FragmentMetadata {
    pub text: String,
    pub source_file: String,
    pub page_number: u32,
    pub bbox: BoundingBox,
    pub sequence_index: u64,
}

impl FragmentMetadata {
    pub fn from_fragment(fragment: &TextFragment) -> Self {
        Self {
            text: fragment.text.clone(),
            source_file: fragment.source_file.clone(),
            page_number: fragment.page_number,
            bbox: fragment.bbox,
            sequence_index: fragment.sequence_index,
        }
    }
}

/// One embedded fragment ready for the index. Transient; the persisted
/// representation lives only in the external index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    /// Pure function of `(source_file, sequence_index)`; re-ingestion
    /// overwrites instead of duplicating.
    pub id: String,
    pub embedding: Vec<f32>,
    pub metadata: FragmentMetadata,
}

/// A hit returned by a similarity query against the index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub score: f64,
    pub metadata: Option<FragmentMetadata>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Pending,
    Extracting,
    Embedding,
    Upserting,
    Completed,
    Failed,
}

/// A fragment that could not be embedded or upserted, with a
/// human-readable reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedFragment {
    pub id: String,
    pub reason: String,
}

/// Result of one ingestion job, returned to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSummary {
    pub job_id: uuid::Uuid,
    pub status: JobStatus,
    pub source_file: String,
    /// SHA-256 of the fetched source bytes.
    pub checksum: String,
    pub fragments_extracted: usize,
    pub fragments_upserted: usize,
    pub failed_fragments: Vec<FailedFragment>,
    /// First few record ids in `sequence_index` order.
    pub sample_ids: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl JobSummary {
    pub fn failed_fragment_ids(&self) -> Vec<&str> {
        self.failed_fragments
            .iter()
            .map(|failure| failure.id.as_str())
            .collect()
    }
}

/// Bounded retry schedule with exponential backoff.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Must be at least 1.
    pub max_attempts: usize,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Delay before the given retry (1-based), doubling per attempt and
    /// capped to avoid unbounded sleeps.
    pub fn backoff(&self, attempt: usize) -> Duration {
        let capped = attempt.min(6) as u32;
        self.base_delay.saturating_mul(1 << capped.saturating_sub(1))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

/// Explicit pipeline constants; passed in rather than read from globals.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Records per index write, bounding request payload size.
    pub upsert_batch_size: usize,
    /// Concurrent in-flight embedding calls.
    pub embed_concurrency: usize,
    pub retry: RetryPolicy,
    pub embedding_dimension: usize,
    /// How many record ids to surface in the job summary.
    pub sample_ids: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            upsert_batch_size: 100,
            embed_concurrency: 8,
            retry: RetryPolicy::default(),
            embedding_dimension: 1536,
            sample_ids: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{FailedFragment, JobStatus, JobSummary, RetryPolicy};
    use chrono::Utc;
    use std::time::Duration;

    #[test]
    fn backoff_doubles_per_attempt() {
        let policy = RetryPolicy {
            max_attempts: 4,
            base_delay: Duration::from_millis(100),
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(400));
    }

    #[test]
    fn failed_fragment_ids_projects_in_order() {
        let now = Utc::now();
        let summary = JobSummary {
            job_id: uuid::Uuid::new_v4(),
            status: JobStatus::Completed,
            source_file: "doc.pdf".to_string(),
            checksum: "abc".to_string(),
            fragments_extracted: 3,
            fragments_upserted: 1,
            failed_fragments: vec![
                FailedFragment {
                    id: "doc.pdf_chunk_1".to_string(),
                    reason: "embedding failed".to_string(),
                },
                FailedFragment {
                    id: "doc.pdf_chunk_2".to_string(),
                    reason: "upsert batch failed".to_string(),
                },
            ],
            sample_ids: vec!["doc.pdf_chunk_0".to_string()],
            started_at: now,
            finished_at: now,
        };

        assert_eq!(
            summary.failed_fragment_ids(),
            vec!["doc.pdf_chunk_1", "doc.pdf_chunk_2"]
        );
    }

    #[test]
    fn backoff_is_capped() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay: Duration::from_millis(100),
        };
        assert_eq!(policy.backoff(6), policy.backoff(60));
    }
}
