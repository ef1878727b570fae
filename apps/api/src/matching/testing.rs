//! Test doubles for the matching pipelines.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use crate::cache::EvaluationCache;
use crate::config::{Config, EmbeddingConfig};
use crate::embeddings::{Embedder, EmbeddingError, EmbeddingProvider};
use crate::llm_client::{CompletionRequest, LanguageModel, LlmError};
use crate::matching::evaluator::Evaluator;
use crate::matching::indexing::Indexer;
use crate::matching::orchestrator::Matcher;
use crate::matching::reranker::Reranker;
use crate::models::candidate::{Candidate, CandidateUpdate, NewCandidate};
use crate::models::job::{Job, NewJob};
use crate::records::documents::DocumentStore;
use crate::records::{RecordStore, RecordStoreError};
use crate::state::AppState;
use crate::vector_index::{IndexEntry, IndexFilter, IndexMatch, VectorIndex, VectorIndexError};

pub fn make_candidate(id: i64, skills: &str) -> Candidate {
    Candidate {
        id,
        name: format!("Candidate {id}"),
        email: format!("candidate{id}@example.com"),
        linkedin: None,
        skills: skills.to_string(),
        experience: "Several years of professional work".to_string(),
        resume_text: None,
        resume_key: None,
        job_title: None,
        created_at: Utc::now(),
    }
}

pub fn make_job(id: i64, requirements: &str) -> Job {
    Job {
        id,
        title: "Frontend Developer".to_string(),
        description: "Join our product team.".to_string(),
        requirements: requirements.to_string(),
        created_at: Utc::now(),
    }
}

type Responder = dyn Fn(&str) -> Result<String, LlmError> + Send + Sync;

/// Language model that answers from a closure and records every prompt.
pub struct ScriptedModel {
    responder: Box<Responder>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn new(
        responder: impl Fn(&str) -> Result<String, LlmError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            responder: Box::new(responder),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn always(text: &str) -> Arc<Self> {
        let text = text.to_string();
        Self::new(move |_| Ok(text.clone()))
    }

    pub fn failing() -> Arc<Self> {
        Self::new(|_| {
            Err(LlmError::Api {
                status: 503,
                message: "overloaded".to_string(),
            })
        })
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<String, LlmError> {
        self.prompts.lock().unwrap().push(request.prompt.to_string());
        (self.responder)(request.prompt)
    }
}

/// Language model that takes `delay` to answer and counts calls started and
/// the peak number of calls in flight.
pub struct SlowModel {
    delay: Duration,
    started: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl SlowModel {
    pub fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            started: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        })
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LanguageModel for SlowModel {
    async fn complete(&self, _request: CompletionRequest<'_>) -> Result<String, LlmError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(r#"{"score": 60, "feedback": "steady"}"#.to_string())
    }
}

/// Embedding provider returning the same vector for every text.
pub struct ConstantEmbeddings(pub Vec<f32>);

#[async_trait]
impl EmbeddingProvider for ConstantEmbeddings {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Ok(self.0.clone())
    }

    fn model_name(&self) -> &str {
        "constant"
    }
}

/// Vector index that errors on every call.
pub struct UnreachableIndex;

#[async_trait]
impl VectorIndex for UnreachableIndex {
    async fn upsert(&self, _entries: Vec<IndexEntry>) -> Result<(), VectorIndexError> {
        Err(VectorIndexError::Api {
            status: 503,
            message: "index unavailable".to_string(),
        })
    }

    async fn query(
        &self,
        _vector: &[f32],
        _top_k: usize,
        _filter: IndexFilter,
    ) -> Result<Vec<IndexMatch>, VectorIndexError> {
        Err(VectorIndexError::Api {
            status: 503,
            message: "index unavailable".to_string(),
        })
    }
}

/// Vector index that returns a fixed match list.
pub struct FixedMatchesIndex(pub Vec<IndexMatch>);

#[async_trait]
impl VectorIndex for FixedMatchesIndex {
    async fn upsert(&self, _entries: Vec<IndexEntry>) -> Result<(), VectorIndexError> {
        Ok(())
    }

    async fn query(
        &self,
        _vector: &[f32],
        top_k: usize,
        _filter: IndexFilter,
    ) -> Result<Vec<IndexMatch>, VectorIndexError> {
        Ok(self.0.iter().take(top_k).cloned().collect())
    }
}

/// Record store over in-memory vectors.
#[derive(Default)]
pub struct MemoryStore {
    pub candidates: Mutex<Vec<Candidate>>,
    pub jobs: Mutex<Vec<Job>>,
    pub fail_jobs: bool,
}

impl MemoryStore {
    pub fn new(candidates: Vec<Candidate>, jobs: Vec<Job>) -> Arc<Self> {
        Arc::new(Self {
            candidates: Mutex::new(candidates),
            jobs: Mutex::new(jobs),
            fail_jobs: false,
        })
    }

    /// Job lookups fail with a transport error.
    pub fn with_failing_jobs(candidates: Vec<Candidate>) -> Arc<Self> {
        Arc::new(Self {
            candidates: Mutex::new(candidates),
            jobs: Mutex::new(Vec::new()),
            fail_jobs: true,
        })
    }

    fn job_failure(&self) -> Result<(), RecordStoreError> {
        if self.fail_jobs {
            return Err(RecordStoreError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn list_candidates(&self) -> Result<Vec<Candidate>, RecordStoreError> {
        Ok(self.candidates.lock().unwrap().clone())
    }

    async fn get_candidate(&self, id: i64) -> Result<Option<Candidate>, RecordStoreError> {
        Ok(self
            .candidates
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id == id)
            .cloned())
    }

    async fn add_candidate(&self, candidate: NewCandidate) -> Result<Candidate, RecordStoreError> {
        let mut candidates = self.candidates.lock().unwrap();
        let id = candidates.iter().map(|c| c.id).max().unwrap_or(0) + 1;
        let created = Candidate {
            id,
            name: candidate.name,
            email: candidate.email,
            linkedin: candidate.linkedin,
            skills: candidate.skills,
            experience: candidate.experience,
            resume_text: candidate.resume_text,
            resume_key: candidate.resume_key,
            job_title: candidate.job_title,
            created_at: Utc::now(),
        };
        candidates.push(created.clone());
        Ok(created)
    }

    async fn update_candidate(
        &self,
        id: i64,
        update: CandidateUpdate,
    ) -> Result<Option<Candidate>, RecordStoreError> {
        let mut candidates = self.candidates.lock().unwrap();
        let Some(slot) = candidates.iter_mut().find(|c| c.id == id) else {
            return Ok(None);
        };
        *slot = update.apply_to(slot.clone());
        Ok(Some(slot.clone()))
    }

    async fn delete_candidate(&self, id: i64) -> Result<Option<Candidate>, RecordStoreError> {
        let mut candidates = self.candidates.lock().unwrap();
        let position = candidates.iter().position(|c| c.id == id);
        Ok(position.map(|p| candidates.remove(p)))
    }

    async fn list_jobs(&self) -> Result<Vec<Job>, RecordStoreError> {
        self.job_failure()?;
        Ok(self.jobs.lock().unwrap().clone())
    }

    async fn get_job(&self, id: i64) -> Result<Option<Job>, RecordStoreError> {
        self.job_failure()?;
        Ok(self.jobs.lock().unwrap().iter().find(|j| j.id == id).cloned())
    }

    async fn add_job(&self, job: NewJob) -> Result<Job, RecordStoreError> {
        self.job_failure()?;
        let mut jobs = self.jobs.lock().unwrap();
        let id = jobs.iter().map(|j| j.id).max().unwrap_or(0) + 1;
        let created = Job {
            id,
            title: job.title,
            description: job.description,
            requirements: job.requirements,
            created_at: Utc::now(),
        };
        jobs.push(created.clone());
        Ok(created)
    }
}

pub fn test_config() -> Config {
    Config {
        database_url: "postgres://localhost/matchmaker_test".to_string(),
        redis_url: "redis://127.0.0.1:1/".to_string(),
        s3_bucket: "resumes-test".to_string(),
        s3_endpoint: "http://127.0.0.1:1".to_string(),
        aws_access_key_id: "test".to_string(),
        aws_secret_access_key: "test".to_string(),
        anthropic_api_key: "test".to_string(),
        port: 0,
        rust_log: "debug".to_string(),
        embedding: EmbeddingConfig {
            api_url: "http://127.0.0.1:1/v1/embeddings".to_string(),
            api_key: None,
            model: "constant".to_string(),
            dimensions: 2,
        },
        pinecone: None,
        evaluation_concurrency: 4,
        evaluation_cache_ttl_secs: 60,
        cache_timeout_ms: 200,
    }
}

/// App state over fakes. Redis and S3 point at a closed port, so cache and
/// document calls fail fast.
pub fn test_state(
    store: Arc<MemoryStore>,
    index: Arc<dyn VectorIndex>,
    model: Arc<ScriptedModel>,
) -> AppState {
    let config = test_config();
    let provider: Arc<dyn EmbeddingProvider> = Arc::new(ConstantEmbeddings(vec![1.0, 0.0]));
    let embedder = Embedder::new(provider, config.embedding.dimensions);

    let s3_config = aws_sdk_s3::Config::builder()
        .behavior_version(aws_sdk_s3::config::BehaviorVersion::latest())
        .region(aws_sdk_s3::config::Region::new("us-east-1"))
        .endpoint_url(&config.s3_endpoint)
        .build();
    let documents = DocumentStore::new(
        aws_sdk_s3::Client::from_conf(s3_config),
        config.s3_bucket.clone(),
    );
    let cache = EvaluationCache::new(
        redis::Client::open(config.redis_url.clone()).unwrap(),
        config.evaluation_cache_ttl_secs,
        Duration::from_millis(config.cache_timeout_ms),
    );

    let matcher = Matcher::new(
        store.clone(),
        embedder.clone(),
        index.clone(),
        Evaluator::new(model.clone()),
        Reranker::new(model),
        config.evaluation_concurrency,
    );

    AppState {
        store,
        documents,
        cache,
        matcher: Arc::new(matcher),
        indexer: Indexer::new(embedder, index),
    }
}
