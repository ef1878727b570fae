use async_trait::async_trait;
use sqlx::PgPool;
use tracing::info;

use crate::models::candidate::{Candidate, CandidateUpdate, NewCandidate};
use crate::models::job::{Job, NewJob};
use crate::records::{RecordStore, RecordStoreError};

/// PostgreSQL-backed record store.
#[derive(Clone)]
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn list_candidates(&self) -> Result<Vec<Candidate>, RecordStoreError> {
        let candidates =
            sqlx::query_as::<_, Candidate>("SELECT * FROM candidates ORDER BY id")
                .fetch_all(&self.pool)
                .await?;
        Ok(candidates)
    }

    async fn get_candidate(&self, id: i64) -> Result<Option<Candidate>, RecordStoreError> {
        let candidate = sqlx::query_as::<_, Candidate>("SELECT * FROM candidates WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(candidate)
    }

    async fn add_candidate(&self, candidate: NewCandidate) -> Result<Candidate, RecordStoreError> {
        let created = sqlx::query_as::<_, Candidate>(
            r#"
            INSERT INTO candidates
                (name, email, linkedin, skills, experience, resume_text, resume_key, job_title)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(&candidate.name)
        .bind(&candidate.email)
        .bind(&candidate.linkedin)
        .bind(&candidate.skills)
        .bind(&candidate.experience)
        .bind(&candidate.resume_text)
        .bind(&candidate.resume_key)
        .bind(&candidate.job_title)
        .fetch_one(&self.pool)
        .await?;

        info!("Inserted candidate {}", created.id);
        Ok(created)
    }

    async fn update_candidate(
        &self,
        id: i64,
        update: CandidateUpdate,
    ) -> Result<Option<Candidate>, RecordStoreError> {
        let Some(existing) = self.get_candidate(id).await? else {
            return Ok(None);
        };
        let merged = update.apply_to(existing);

        let updated = sqlx::query_as::<_, Candidate>(
            r#"
            UPDATE candidates
            SET name = $1, email = $2, linkedin = $3, skills = $4, experience = $5
            WHERE id = $6
            RETURNING *
            "#,
        )
        .bind(&merged.name)
        .bind(&merged.email)
        .bind(&merged.linkedin)
        .bind(&merged.skills)
        .bind(&merged.experience)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(updated)
    }

    async fn delete_candidate(&self, id: i64) -> Result<Option<Candidate>, RecordStoreError> {
        let removed =
            sqlx::query_as::<_, Candidate>("DELETE FROM candidates WHERE id = $1 RETURNING *")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(removed)
    }

    async fn list_jobs(&self) -> Result<Vec<Job>, RecordStoreError> {
        let jobs = sqlx::query_as::<_, Job>("SELECT * FROM jobs ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(jobs)
    }

    async fn get_job(&self, id: i64) -> Result<Option<Job>, RecordStoreError> {
        let job = sqlx::query_as::<_, Job>("SELECT * FROM jobs WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(job)
    }

    async fn add_job(&self, job: NewJob) -> Result<Job, RecordStoreError> {
        let created = sqlx::query_as::<_, Job>(
            "INSERT INTO jobs (title, description, requirements) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(job.title.trim())
        .bind(job.description.trim())
        .bind(job.requirements.trim())
        .fetch_one(&self.pool)
        .await?;

        info!("Inserted job {} ({})", created.id, created.title);
        Ok(created)
    }
}
