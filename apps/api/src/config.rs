use anyhow::{ensure, Context, Result};

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub s3_bucket: String,
    pub s3_endpoint: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub anthropic_api_key: String,
    pub port: u16,
    pub rust_log: String,
    pub embedding: EmbeddingConfig,
    /// Hosted index; `None` selects the in-process index.
    pub pinecone: Option<PineconeConfig>,
    pub evaluation_concurrency: usize,
    pub evaluation_cache_ttl_secs: u64,
    pub cache_timeout_ms: u64,
}

#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    pub api_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub dimensions: usize,
}

#[derive(Debug, Clone)]
pub struct PineconeConfig {
    pub host: String,
    pub api_key: String,
}

const DEFAULT_EMBEDDING_URL: &str = "https://api.openai.com/v1/embeddings";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let evaluation_concurrency: usize = parse_env("EVALUATION_CONCURRENCY", 8)?;
        ensure!(
            evaluation_concurrency >= 1,
            "EVALUATION_CONCURRENCY must be at least 1"
        );

        let pinecone = match (optional_env("PINECONE_HOST"), optional_env("PINECONE_API_KEY")) {
            (Some(host), Some(api_key)) => Some(PineconeConfig { host, api_key }),
            _ => None,
        };

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            redis_url: require_env("REDIS_URL")?,
            s3_bucket: require_env("S3_BUCKET")?,
            s3_endpoint: require_env("S3_ENDPOINT")?,
            aws_access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            embedding: EmbeddingConfig {
                api_url: optional_env("EMBEDDING_API_URL")
                    .unwrap_or_else(|| DEFAULT_EMBEDDING_URL.to_string()),
                api_key: optional_env("EMBEDDING_API_KEY"),
                model: optional_env("EMBEDDING_MODEL")
                    .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
                dimensions: parse_env("EMBEDDING_DIMENSIONS", 1536)?,
            },
            pinecone,
            evaluation_concurrency,
            evaluation_cache_ttl_secs: parse_env("EVALUATION_CACHE_TTL_SECS", 86_400)?,
            cache_timeout_ms: parse_env("CACHE_TIMEOUT_MS", 2_000)?,
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

/// Unset and blank both read as absent.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number, got '{raw}'")),
        None => Ok(default),
    }
}
