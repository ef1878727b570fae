//! Output types of the matching pipelines.

use serde::{Deserialize, Serialize};

use crate::models::candidate::Candidate;

/// Upper bound of an evaluation score.
pub const MAX_EVALUATION_SCORE: u32 = 100;

/// One candidate scored against one job. Produced fresh per Evaluate run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
    pub candidate_id: i64,
    pub candidate_name: String,
    /// 0 – 100
    pub score: u32,
    pub feedback: String,
    pub recommendations: Option<String>,
}

/// A candidate returned by Search, with its rerank score when one was assigned.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    #[serde(flatten)]
    pub candidate: Candidate,
    /// 0.0 – 1.0. `None` means the relevance model never ranked this row,
    /// which is not the same as a zero score.
    pub score: Option<f64>,
    pub explanation: Option<String>,
    /// Raw similarity from the vector index, when the row came from it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector_score: Option<f32>,
}

impl SearchResult {
    pub fn unranked(candidate: Candidate, vector_score: Option<f32>) -> Self {
        Self {
            candidate,
            score: None,
            explanation: None,
            vector_score,
        }
    }
}

/// Which tier of the Search pipeline produced the results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchMethod {
    #[serde(rename = "vector-and-model")]
    VectorAndModel,
    #[serde(rename = "model-only")]
    ModelOnly,
}
