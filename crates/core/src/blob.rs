use crate::error::BlobError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::path::PathBuf;

/// Opaque object storage: fetch raw bytes by bucket and key.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn fetch(&self, bucket: &str, key: &str) -> Result<Vec<u8>, BlobError>;
}

/// Blob store reachable over plain HTTP path addressing
/// (`{endpoint}/{bucket}/{key}`), the layout MinIO and S3-compatible
/// gateways expose.
pub struct HttpBlobStore {
    endpoint: String,
    client: Client,
}

impl HttpBlobStore {
    pub fn new(endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        Self {
            endpoint,
            client: Client::new(),
        }
    }
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    async fn fetch(&self, bucket: &str, key: &str) -> Result<Vec<u8>, BlobError> {
        let url = format!("{}/{}/{}", self.endpoint, bucket, key);
        let response = self.client.get(&url).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(BlobError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            }),
            status if !status.is_success() => Err(BlobError::BackendResponse {
                bucket: bucket.to_string(),
                key: key.to_string(),
                status: status.to_string(),
            }),
            _ => Ok(response.bytes().await?.to_vec()),
        }
    }
}

/// Blob store backed by a local directory; `bucket/key` resolves to a
/// relative path under the root.
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn fetch(&self, bucket: &str, key: &str) -> Result<Vec<u8>, BlobError> {
        let path = self.root.join(bucket).join(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                Err(BlobError::NotFound {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                })
            }
            Err(error) => Err(BlobError::Io(error)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{BlobStore, FsBlobStore};
    use crate::error::BlobError;
    use std::fs;
    use tempfile::tempdir;

    #[tokio::test]
    async fn fs_store_returns_stored_bytes() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        fs::create_dir(dir.path().join("docs"))?;
        fs::write(dir.path().join("docs/a.pdf"), b"%PDF-1.4")?;

        let store = FsBlobStore::new(dir.path());
        let bytes = store.fetch("docs", "a.pdf").await?;
        assert_eq!(bytes, b"%PDF-1.4");
        Ok(())
    }

    #[tokio::test]
    async fn fs_store_maps_missing_key_to_not_found() {
        let dir = tempdir().expect("tempdir");
        let store = FsBlobStore::new(dir.path());

        let result = store.fetch("docs", "missing.pdf").await;
        assert!(matches!(result, Err(BlobError::NotFound { .. })));
    }
}
