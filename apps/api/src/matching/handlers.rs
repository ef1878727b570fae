use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::cache::CachedEvaluations;
use crate::errors::AppError;
use crate::matching::lenient::IdField;
use crate::matching::orchestrator::{SearchRequest, MAX_SEARCH_LIMIT};
use crate::models::matching::{Evaluation, SearchMethod, SearchResult};
use crate::state::AppState;

const NO_CANDIDATES_MESSAGE: &str = "No candidates found in the system";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateBody {
    pub job_id: Option<IdField>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateResponse {
    pub evaluations: Vec<Evaluation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchBody {
    pub query: Option<String>,
    pub job_id: Option<IdField>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    pub search_method: SearchMethod,
}

/// POST /api/v1/evaluate
pub async fn handle_evaluate(
    State(state): State<AppState>,
    body: Result<Json<EvaluateBody>, JsonRejection>,
) -> Result<Json<EvaluateResponse>, AppError> {
    let Json(body) = body?;
    let job_id = body
        .job_id
        .ok_or_else(|| AppError::Validation("Job ID is required".to_string()))
        .and_then(|id| parse_job_id(&id))?;

    let evaluations = state.matcher.evaluate(job_id).await?;
    if evaluations.is_empty() {
        return Ok(Json(EvaluateResponse {
            evaluations,
            message: Some(NO_CANDIDATES_MESSAGE.to_string()),
        }));
    }

    if let Err(e) = state.cache.store(job_id, &evaluations).await {
        warn!("Failed to cache evaluations for job {job_id}: {e}");
    }

    Ok(Json(EvaluateResponse {
        evaluations,
        message: None,
    }))
}

/// POST /api/v1/search
pub async fn handle_search(
    State(state): State<AppState>,
    body: Result<Json<SearchBody>, JsonRejection>,
) -> Result<Json<SearchResponse>, AppError> {
    let Json(body) = body?;
    let request = SearchRequest {
        query: body.query,
        job_id: body.job_id.as_ref().map(parse_job_id).transpose()?,
        limit: body
            .limit
            .map(|l| l.clamp(1, MAX_SEARCH_LIMIT as i64) as usize),
    };

    let outcome = state.matcher.search(request).await?;
    Ok(Json(SearchResponse {
        results: outcome.results,
        search_method: outcome.method,
    }))
}

/// Accepts `7` and `"7"`.
fn parse_job_id(id: &IdField) -> Result<i64, AppError> {
    id.as_i64()
        .ok_or_else(|| AppError::Validation("jobId must be an integer".to_string()))
}

/// GET /api/v1/evaluations/:job_id
pub async fn handle_cached_evaluations(
    State(state): State<AppState>,
    Path(job_id): Path<i64>,
) -> Result<Json<CachedEvaluations>, AppError> {
    let cached = state
        .cache
        .load(job_id)
        .await
        .map_err(|e| AppError::Internal(e.into()))?;
    cached
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("No evaluations cached for job {job_id}")))
}
