use crate::error::StoreError;
use crate::models::{SearchHit, VectorRecord};
use crate::traits::VectorIndex;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

/// Connection settings for one Pinecone index. The control plane handles
/// provisioning; the data plane host handles reads and writes.
#[derive(Debug, Clone)]
pub struct PineconeConfig {
    pub api_key: String,
    /// Control plane base, e.g. `https://api.pinecone.io`.
    pub control_url: String,
    /// Data plane host for the index, e.g. `https://{index}-{project}.svc.{env}.pinecone.io`.
    pub index_host: String,
    pub index_name: String,
    pub cloud: String,
    pub region: String,
}

/// Pinecone-backed vector index. String record ids are legal here, which
/// is what the sanitized fragment id scheme relies on.
pub struct PineconeIndex {
    config: PineconeConfig,
    client: Client,
    dimension: usize,
}

const METRIC: &str = "cosine";

impl PineconeIndex {
    /// Fails when either plane URL does not parse; a bad endpoint should
    /// surface at construction, not on the first job.
    pub fn new(config: PineconeConfig, dimension: usize) -> Result<Self, StoreError> {
        url::Url::parse(&config.control_url)?;
        url::Url::parse(&config.index_host)?;
        Ok(Self {
            config,
            client: Client::new(),
            dimension,
        })
    }

    fn control_endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.control_url.trim_end_matches('/'), path)
    }

    fn data_endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.index_host.trim_end_matches('/'), path)
    }

    async fn create_index(&self) -> Result<(), StoreError> {
        let body = json!({
            "name": self.config.index_name,
            "dimension": self.dimension,
            "metric": METRIC,
            "spec": {
                "serverless": {
                    "cloud": self.config.cloud,
                    "region": self.config.region,
                }
            }
        });

        let response = self
            .client
            .post(self.control_endpoint("indexes"))
            .header("Api-Key", &self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        // 409 means another caller created it first; that is still "exists".
        if status.is_success() || status == StatusCode::CONFLICT {
            Ok(())
        } else {
            Err(StoreError::BackendResponse {
                backend: "pinecone".to_string(),
                details: status.to_string(),
            })
        }
    }
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    async fn ensure_index(&self) -> Result<(), StoreError> {
        let describe = self
            .client
            .get(self.control_endpoint(&format!("indexes/{}", self.config.index_name)))
            .header("Api-Key", &self.config.api_key)
            .send()
            .await?;

        match describe.status() {
            StatusCode::NOT_FOUND => {
                tracing::info!(
                    index = %self.config.index_name,
                    dimension = self.dimension,
                    "Creating vector index"
                );
                self.create_index().await
            }
            status if status.is_success() => {
                let described: Value = describe.json().await?;
                let dimension = described
                    .pointer("/dimension")
                    .and_then(Value::as_u64)
                    .unwrap_or(0) as usize;
                if dimension != self.dimension {
                    return Err(StoreError::Request(format!(
                        "index {} has dimension {}, configured {}",
                        self.config.index_name, dimension, self.dimension
                    )));
                }
                Ok(())
            }
            status => Err(StoreError::BackendResponse {
                backend: "pinecone".to_string(),
                details: status.to_string(),
            }),
        }
    }

    async fn upsert(&self, records: &[VectorRecord]) -> Result<(), StoreError> {
        if records.is_empty() {
            return Ok(());
        }

        let body = upsert_body(records)?;
        let response = self
            .client
            .post(self.data_endpoint("vectors/upsert"))
            .header("Api-Key", &self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::BackendResponse {
                backend: "pinecone".to_string(),
                details: status.to_string(),
            });
        }

        Ok(())
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<SearchHit>, StoreError> {
        let response = self
            .client
            .post(self.data_endpoint("query"))
            .header("Api-Key", &self.config.api_key)
            .json(&json!({
                "vector": vector,
                "topK": top_k,
                "includeMetadata": true,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::BackendResponse {
                backend: "pinecone".to_string(),
                details: status.to_string(),
            });
        }

        let parsed: Value = response.json().await?;
        Ok(hits_from_response(&parsed))
    }
}

fn upsert_body(records: &[VectorRecord]) -> Result<Value, StoreError> {
    let vectors = records
        .iter()
        .map(|record| {
            Ok(json!({
                "id": record.id,
                "values": record.embedding,
                "metadata": serde_json::to_value(&record.metadata)?,
            }))
        })
        .collect::<Result<Vec<_>, StoreError>>()?;

    Ok(json!({ "vectors": vectors }))
}

fn hits_from_response(parsed: &Value) -> Vec<SearchHit> {
    parsed
        .pointer("/matches")
        .and_then(Value::as_array)
        .map(|matches| {
            matches
                .iter()
                .map(|hit| SearchHit {
                    id: hit
                        .pointer("/id")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    score: hit.pointer("/score").and_then(Value::as_f64).unwrap_or(0.0),
                    metadata: hit
                        .pointer("/metadata")
                        .and_then(|meta| serde_json::from_value(meta.clone()).ok()),
                })
                .collect()
        })
        .unwrap_or_default()
}
