// Record store, resume documents, and the candidate/job HTTP surface.
// The matching pipelines only read through `RecordStore`.

pub mod documents;
pub mod extract;
pub mod handlers;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::candidate::{Candidate, CandidateUpdate, NewCandidate};
use crate::models::job::{Job, NewJob};

#[derive(Debug, Error)]
pub enum RecordStoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Persistence for candidates and jobs, keyed by positive integer id.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn list_candidates(&self) -> Result<Vec<Candidate>, RecordStoreError>;

    async fn get_candidate(&self, id: i64) -> Result<Option<Candidate>, RecordStoreError>;

    async fn add_candidate(&self, candidate: NewCandidate) -> Result<Candidate, RecordStoreError>;

    /// Returns `None` when no candidate has this id.
    async fn update_candidate(
        &self,
        id: i64,
        update: CandidateUpdate,
    ) -> Result<Option<Candidate>, RecordStoreError>;

    /// Returns the removed candidate, or `None` when no candidate has this id.
    async fn delete_candidate(&self, id: i64) -> Result<Option<Candidate>, RecordStoreError>;

    async fn list_jobs(&self) -> Result<Vec<Job>, RecordStoreError>;

    async fn get_job(&self, id: i64) -> Result<Option<Job>, RecordStoreError>;

    async fn add_job(&self, job: NewJob) -> Result<Job, RecordStoreError>;
}
