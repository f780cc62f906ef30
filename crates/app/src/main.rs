use chrono::Utc;
use clap::{Parser, Subcommand};
use pdf_ingest_core::{
    BlobStore, FsBlobStore, HttpBlobStore, IngestionPipeline, OpenAiEmbedder, PdfiumExtractor,
    PineconeConfig, PineconeIndex, PipelineOptions, RetryPolicy, DEFAULT_EMBEDDING_MODEL,
};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "pdf-ingest", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Blob store HTTP endpoint (MinIO-style path addressing). When unset,
    /// `--blob-root` is used instead.
    #[arg(long, env = "BLOB_ENDPOINT")]
    blob_endpoint: Option<String>,

    /// Local directory standing in for the blob store.
    #[arg(long, default_value = ".")]
    blob_root: String,

    /// Bucket holding the source documents.
    #[arg(long, default_value = "documents")]
    bucket: String,

    /// OpenAI-compatible API base URL.
    #[arg(long, default_value = "https://api.openai.com/v1")]
    openai_url: String,

    #[arg(long, env = "OPENAI_API_KEY", default_value = "")]
    openai_api_key: String,

    #[arg(long, default_value = DEFAULT_EMBEDDING_MODEL)]
    embedding_model: String,

    #[arg(long, default_value = "1536")]
    embedding_dimension: usize,

    /// Pinecone control plane URL.
    #[arg(long, default_value = "http://localhost:5080")]
    pinecone_control_url: String,

    /// Pinecone data plane host for the index.
    #[arg(long, default_value = "http://localhost:5081")]
    pinecone_index_host: String,

    #[arg(long, env = "PINECONE_API_KEY", default_value = "")]
    pinecone_api_key: String,

    #[arg(long, default_value = "asignaturas")]
    index_name: String,

    #[arg(long, default_value = "aws")]
    pinecone_cloud: String,

    #[arg(long, default_value = "us-east-1")]
    pinecone_region: String,

    /// Records per index write.
    #[arg(long, default_value = "100")]
    upsert_batch_size: usize,

    /// Concurrent in-flight embedding calls.
    #[arg(long, default_value = "8")]
    embed_concurrency: usize,

    /// Attempts per external call, including the first.
    #[arg(long, default_value = "3")]
    retry_attempts: usize,

    #[arg(long, default_value = "500")]
    retry_base_delay_ms: u64,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch one document from the blob store, extract and embed its
    /// fragments, and upsert them into the vector index.
    Ingest {
        /// Storage key of the document, e.g. `Física_I.pdf`.
        #[arg(long)]
        key: String,
    },
    /// Embed a query and print the closest fragments with their source
    /// page and position.
    Search {
        #[arg(long)]
        query: String,

        #[arg(long, default_value = "10")]
        top_k: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();

    let options = PipelineOptions {
        upsert_batch_size: cli.upsert_batch_size,
        embed_concurrency: cli.embed_concurrency,
        retry: RetryPolicy {
            max_attempts: cli.retry_attempts,
            base_delay: Duration::from_millis(cli.retry_base_delay_ms),
        },
        embedding_dimension: cli.embedding_dimension,
        ..PipelineOptions::default()
    };

    let embedder = OpenAiEmbedder::new(
        &cli.openai_url,
        &cli.openai_api_key,
        &cli.embedding_model,
        cli.embedding_dimension,
    );
    let index = PineconeIndex::new(
        PineconeConfig {
            api_key: cli.pinecone_api_key.clone(),
            control_url: cli.pinecone_control_url.clone(),
            index_host: cli.pinecone_index_host.clone(),
            index_name: cli.index_name.clone(),
            cloud: cli.pinecone_cloud.clone(),
            region: cli.pinecone_region.clone(),
        },
        cli.embedding_dimension,
    )?;

    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        index = %cli.index_name,
        "pdf-ingest boot"
    );

    match cli.blob_endpoint.clone() {
        Some(endpoint) => {
            let blob = HttpBlobStore::new(endpoint);
            run(cli, blob, embedder, index, options).await
        }
        None => {
            let blob = FsBlobStore::new(cli.blob_root.clone());
            run(cli, blob, embedder, index, options).await
        }
    }
}

async fn run<B: BlobStore>(
    cli: Cli,
    blob: B,
    embedder: OpenAiEmbedder,
    index: PineconeIndex,
    options: PipelineOptions,
) -> anyhow::Result<()> {
    let pipeline = IngestionPipeline::new(
        blob,
        PdfiumExtractor,
        embedder,
        index,
        cli.bucket.clone(),
        options,
    );

    match cli.command {
        Command::Ingest { key } => {
            let summary = pipeline.ingest(&key).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            if !summary.failed_fragments.is_empty() {
                eprintln!(
                    "warning: {} fragment(s) not indexed: {}",
                    summary.failed_fragments.len(),
                    summary.failed_fragment_ids().join(", ")
                );
            }
        }
        Command::Search { query, top_k } => {
            let hits = pipeline.search(&query, top_k).await?;
            if hits.is_empty() {
                println!("no results");
                return Ok(());
            }
            for hit in hits {
                match hit.metadata {
                    Some(metadata) => println!(
                        "{:.4}  {} p.{} [{:.1},{:.1},{:.1},{:.1}]  {}",
                        hit.score,
                        metadata.source_file,
                        metadata.page_number,
                        metadata.bbox.x0,
                        metadata.bbox.y0,
                        metadata.bbox.x1,
                        metadata.bbox.y1,
                        metadata.text,
                    ),
                    None => println!("{:.4}  {}", hit.score, hit.id),
                }
            }
        }
    }

    Ok(())
}
