//! Redis cache of the latest Evaluate run per job.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::models::matching::Evaluation;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Cached payload is malformed: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("Redis did not answer within {0:?}")]
    Timeout(Duration),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedEvaluations {
    pub job_id: i64,
    pub evaluations: Vec<Evaluation>,
    pub evaluated_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct EvaluationCache {
    client: redis::Client,
    ttl_secs: u64,
    /// Bound on connect plus command for every cache call.
    op_timeout: Duration,
}

impl EvaluationCache {
    pub fn new(client: redis::Client, ttl_secs: u64, op_timeout: Duration) -> Self {
        Self {
            client,
            ttl_secs,
            op_timeout,
        }
    }

    /// Replaces the cached run for `job_id`.
    pub async fn store(&self, job_id: i64, evaluations: &[Evaluation]) -> Result<(), CacheError> {
        let entry = CachedEvaluations {
            job_id,
            evaluations: evaluations.to_vec(),
            evaluated_at: Utc::now(),
        };
        let payload = serde_json::to_string(&entry)?;

        self.bounded(async {
            let mut conn = self.client.get_multiplexed_async_connection().await?;
            conn.set_ex::<_, _, ()>(cache_key(job_id), payload, self.ttl_secs)
                .await?;
            Ok::<(), CacheError>(())
        })
        .await?;
        info!(
            "Cached {} evaluations for job {job_id}",
            entry.evaluations.len()
        );
        Ok(())
    }

    pub async fn load(&self, job_id: i64) -> Result<Option<CachedEvaluations>, CacheError> {
        let payload: Option<String> = self
            .bounded(async {
                let mut conn = self.client.get_multiplexed_async_connection().await?;
                Ok::<Option<String>, CacheError>(conn.get(cache_key(job_id)).await?)
            })
            .await?;
        payload
            .map(|p| serde_json::from_str(&p))
            .transpose()
            .map_err(CacheError::from)
    }

    async fn bounded<T>(
        &self,
        op: impl Future<Output = Result<T, CacheError>>,
    ) -> Result<T, CacheError> {
        tokio::time::timeout(self.op_timeout, op)
            .await
            .map_err(|_| CacheError::Timeout(self.op_timeout))?
    }
}

fn cache_key(job_id: i64) -> String {
    format!("evaluations:job:{job_id}")
}
