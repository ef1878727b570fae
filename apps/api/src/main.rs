mod cache;
mod config;
mod db;
mod embeddings;
mod errors;
mod llm_client;
mod matching;
mod models;
mod records;
mod routes;
mod state;
mod vector_index;

use anyhow::Result;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use std::net::SocketAddr;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use std::sync::Arc;

use crate::cache::EvaluationCache;
use crate::config::Config;
use crate::db::create_pool;
use crate::embeddings::{Embedder, EmbeddingProvider, HttpEmbeddingProvider};
use crate::llm_client::{LanguageModel, LlmClient};
use crate::matching::evaluator::Evaluator;
use crate::matching::indexing::Indexer;
use crate::matching::orchestrator::Matcher;
use crate::matching::reranker::Reranker;
use crate::records::documents::DocumentStore;
use crate::records::postgres::PgRecordStore;
use crate::records::RecordStore;
use crate::routes::build_router;
use crate::state::AppState;
use crate::vector_index::{InMemoryVectorIndex, PineconeIndex, VectorIndex};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Matchmaker API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;
    let store: Arc<dyn RecordStore> = Arc::new(PgRecordStore::new(db));

    // Initialize Redis
    let redis = redis::Client::open(config.redis_url.clone())?;
    let cache = EvaluationCache::new(
        redis,
        config.evaluation_cache_ttl_secs,
        Duration::from_millis(config.cache_timeout_ms),
    );
    info!("Redis client initialized");

    // Initialize S3 / MinIO
    let s3 = build_s3_client(&config).await;
    let documents = DocumentStore::new(s3, config.s3_bucket.clone());
    info!("S3 client initialized");

    // Initialize LLM client
    let llm: Arc<dyn LanguageModel> = Arc::new(LlmClient::new(config.anthropic_api_key.clone())?);
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    // Initialize embeddings
    let provider: Arc<dyn EmbeddingProvider> = Arc::new(HttpEmbeddingProvider::new(
        config.embedding.api_url.clone(),
        config.embedding.api_key.clone(),
        config.embedding.model.clone(),
    )?);
    let embedder = Embedder::new(provider, config.embedding.dimensions);
    info!(
        "Embedding provider initialized (model: {}, {} dimensions)",
        config.embedding.model,
        embedder.dimensions()
    );

    // Initialize vector index
    let index: Arc<dyn VectorIndex> = match &config.pinecone {
        Some(pinecone) => {
            info!("Using Pinecone index at {}", pinecone.host);
            Arc::new(PineconeIndex::new(&pinecone.host, pinecone.api_key.clone())?)
        }
        None => {
            warn!("PINECONE_HOST/PINECONE_API_KEY not set, using in-process vector index");
            Arc::new(InMemoryVectorIndex::new())
        }
    };

    let indexer = Indexer::new(embedder.clone(), index.clone());
    let matcher = Matcher::new(
        store.clone(),
        embedder,
        index,
        Evaluator::new(llm.clone()),
        Reranker::new(llm),
        config.evaluation_concurrency,
    );
    info!(
        "Matcher initialized (evaluation concurrency: {})",
        config.evaluation_concurrency
    );

    // Index existing jobs in the background
    spawn_job_indexing(store.clone(), indexer.clone());

    // Build app state
    let state = AppState {
        store,
        documents,
        cache,
        matcher: Arc::new(matcher),
        indexer,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn spawn_job_indexing(store: Arc<dyn RecordStore>, indexer: Indexer) {
    tokio::spawn(async move {
        match store.list_jobs().await {
            Ok(jobs) => {
                indexer.index_jobs(&jobs).await;
            }
            Err(e) => warn!("Skipping startup job indexing, could not list jobs: {e}"),
        }
    });
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
        None,
        None,
        "matchmaker-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .load()
        .await;

    aws_sdk_s3::Client::new(&s3_config)
}
