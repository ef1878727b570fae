//! Keeps the vector index in step with the record store.
//!
//! Indexing is best-effort: failures are logged and reported as `false`,
//! never propagated into the request that triggered them.

use std::sync::Arc;

use tracing::{info, warn};

use crate::embeddings::Embedder;
use crate::matching::profiles::{candidate_index_text, job_index_text};
use crate::models::candidate::Candidate;
use crate::models::job::Job;
use crate::vector_index::{ExternalId, IndexEntry, VectorIndex};

#[derive(Clone)]
pub struct Indexer {
    embedder: Embedder,
    index: Arc<dyn VectorIndex>,
}

impl Indexer {
    pub fn new(embedder: Embedder, index: Arc<dyn VectorIndex>) -> Self {
        Self { embedder, index }
    }

    pub async fn index_candidate(&self, candidate: &Candidate) -> bool {
        let vector = self.embedder.embed(&candidate_index_text(candidate)).await;
        let entry = IndexEntry::new(ExternalId::candidate(candidate.id), vector)
            .with_field("name", candidate.name.as_str())
            .with_field("skills", candidate.skills.as_str())
            .with_field("experience", candidate.experience.as_str());

        match self.index.upsert(vec![entry]).await {
            Ok(()) => {
                info!("Indexed candidate {}", candidate.id);
                true
            }
            Err(e) => {
                warn!("Failed to index candidate {}: {e}", candidate.id);
                false
            }
        }
    }

    pub async fn index_job(&self, job: &Job) -> bool {
        let vector = self.embedder.embed(&job_index_text(job)).await;
        let entry = IndexEntry::new(ExternalId::job(job.id), vector)
            .with_field("title", job.title.as_str());

        match self.index.upsert(vec![entry]).await {
            Ok(()) => {
                info!("Indexed job {}", job.id);
                true
            }
            Err(e) => {
                warn!("Failed to index job {}: {e}", job.id);
                false
            }
        }
    }

    /// Indexes every job; returns how many succeeded.
    pub async fn index_jobs(&self, jobs: &[Job]) -> usize {
        let mut indexed = 0;
        for job in jobs {
            if self.index_job(job).await {
                indexed += 1;
            }
        }
        info!("Indexed {indexed}/{} jobs", jobs.len());
        indexed
    }
}
