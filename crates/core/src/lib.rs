pub mod blob;
pub mod embedder;
pub mod error;
pub mod extractor;
pub mod identity;
pub mod models;
pub mod pipeline;
pub mod retry;
pub mod stores;
pub mod traits;
pub mod upsert;

pub use blob::{BlobStore, FsBlobStore, HttpBlobStore};
pub use embedder::{Embedder, OpenAiEmbedder, DEFAULT_EMBEDDING_MODEL};
pub use error::{BlobError, EmbedError, IngestError, SearchError, StoreError};
pub use extractor::{fragments_from_spans, FragmentExtractor, PdfiumExtractor, RawSpan};
pub use identity::{ascii_safe_id, fragment_id};
pub use models::{
    BoundingBox, FailedFragment, FragmentMetadata, JobStatus, JobSummary, PipelineOptions,
    RetryPolicy, SearchHit, TextFragment, VectorRecord,
};
pub use pipeline::IngestionPipeline;
pub use retry::retry_with_backoff;
pub use stores::{PineconeConfig, PineconeIndex};
pub use traits::VectorIndex;
pub use upsert::{UpsertManager, UpsertReport};
