use thiserror::Error;

/// Errors raised while fetching source bytes from the blob store.
#[derive(Debug, Error)]
pub enum BlobError {
    #[error("object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("blob store returned {status} for {bucket}/{key}")]
    BackendResponse {
        bucket: String,
        key: String,
        status: String,
    },
}

/// Errors raised by the embedding provider for a single fragment.
#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("embedding provider rate limited the request")]
    RateLimited,

    #[error("embedding request timed out")]
    Timeout,

    #[error("embedding provider rejected the input: {0}")]
    InvalidInput(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },
}

impl EmbedError {
    /// Transient failures are eligible for retry with backoff.
    pub fn is_transient(&self) -> bool {
        match self {
            EmbedError::RateLimited | EmbedError::Timeout => true,
            EmbedError::Http(error) => error.is_timeout() || error.is_connect(),
            EmbedError::BackendResponse { .. } => true,
            EmbedError::InvalidInput(_) => false,
        }
    }
}

/// Errors raised by the vector index transport.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("index request failed: {0}")]
    Request(String),
}

impl StoreError {
    /// Whether an upsert batch hitting this error should be retried.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Http(error) => error.is_timeout() || error.is_connect(),
            StoreError::BackendResponse { details, .. } => {
                details.starts_with("429") || details.starts_with('5')
            }
            StoreError::Url(_) | StoreError::Serialization(_) | StoreError::Request(_) => false,
        }
    }
}

/// Job-level failures. Only the fatal classes surface here; per-fragment and
/// per-batch failures are enumerated in the job summary instead.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to fetch source {key}: {source}")]
    SourceFetch {
        key: String,
        #[source]
        source: BlobError,
    },

    #[error("pdf extraction failed: {0}")]
    Extraction(String),

    #[error("embedding failed for all {failed} fragments")]
    Embedding { failed: usize },

    #[error("vector index provisioning failed: {0}")]
    IndexProvisioning(#[from] StoreError),

    #[error("an ingestion job for {key} is already running")]
    JobAlreadyRunning { key: String },
}

/// Failures on the query path, outside the ingestion job state machine.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("query embedding failed: {0}")]
    Embedding(#[from] EmbedError),

    #[error("index query failed: {0}")]
    Store(#[from] StoreError),
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::{EmbedError, StoreError};

    #[test]
    fn rate_limit_and_timeout_are_transient() {
        assert!(EmbedError::RateLimited.is_transient());
        assert!(EmbedError::Timeout.is_transient());
    }

    #[test]
    fn invalid_input_is_permanent() {
        assert!(!EmbedError::InvalidInput("too long".to_string()).is_transient());
    }

    #[test]
    fn store_server_errors_are_transient() {
        let error = StoreError::BackendResponse {
            backend: "pinecone".to_string(),
            details: "503 Service Unavailable".to_string(),
        };
        assert!(error.is_transient());

        let error = StoreError::BackendResponse {
            backend: "pinecone".to_string(),
            details: "400 Bad Request".to_string(),
        };
        assert!(!error.is_transient());
    }
}
