//! Reranker — scores a batch of candidates against one requirements text in a
//! single model call.
//!
//! Every input row gets exactly one output row. Rows the model did not rank
//! receive `UNRANKED_SCORE`. When the model call itself fails the input is
//! returned unchanged (truncated to `limit`), so callers must read a missing
//! score as "unranked", not zero.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::llm_client::prompts::JSON_ONLY_SYSTEM;
use crate::llm_client::{extract_json_object, CompletionRequest, LanguageModel};
use crate::matching::lenient::{IdField, NumberField};
use crate::matching::profiles::rerank_block;
use crate::matching::prompts::{DEFAULT_REQUIREMENTS, RERANK_PROMPT_TEMPLATE, RERANK_SYSTEM};
use crate::models::matching::SearchResult;

const RERANK_MAX_TOKENS: u32 = 2048;
const RERANK_TEMPERATURE: f32 = 0.2;

/// Pinned score for candidates the model left out of its rankings.
/// Kept at 0.1 regardless of how the ranked scores are distributed.
pub const UNRANKED_SCORE: f64 = 0.1;
pub const UNRANKED_EXPLANATION: &str = "Not specifically ranked by the relevance model";

#[derive(Debug, Deserialize)]
struct RankingsEnvelope {
    rankings: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct ModelRanking {
    id: IdField,
    score: NumberField,
    #[serde(default)]
    explanation: Option<String>,
}

/// A usable ranking row after lenient decoding.
#[derive(Debug, Clone, PartialEq)]
pub struct Ranking {
    pub score: f64,
    pub explanation: Option<String>,
}

pub struct Reranker {
    model: Arc<dyn LanguageModel>,
}

impl Reranker {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    /// Ranks `candidates` against `requirements` and keeps the best `limit`.
    ///
    /// The caller bounds `candidates.len()` to what fits in one prompt.
    pub async fn rerank(
        &self,
        candidates: Vec<SearchResult>,
        requirements: &str,
        limit: usize,
    ) -> Vec<SearchResult> {
        if candidates.is_empty() {
            return candidates;
        }

        info!("Reranking {} candidates", candidates.len());
        let prompt = build_prompt(&candidates, requirements);
        let system = format!("{RERANK_SYSTEM} {JSON_ONLY_SYSTEM}");
        let request = CompletionRequest {
            system: &system,
            prompt: &prompt,
            max_tokens: RERANK_MAX_TOKENS,
            temperature: RERANK_TEMPERATURE,
        };

        let text = match self.model.complete(request).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Rerank model call failed, returning candidates unranked: {e}");
                let mut passthrough = candidates;
                passthrough.truncate(limit);
                return passthrough;
            }
        };

        let rankings = parse_rankings(&text);
        merge_rankings(candidates, &rankings, limit)
    }
}

fn build_prompt(candidates: &[SearchResult], requirements: &str) -> String {
    let requirements = if requirements.trim().is_empty() {
        DEFAULT_REQUIREMENTS
    } else {
        requirements.trim()
    };
    let blocks = candidates
        .iter()
        .enumerate()
        .map(|(i, r)| rerank_block(i + 1, &r.candidate))
        .collect::<Vec<_>>()
        .join("\n");

    RERANK_PROMPT_TEMPLATE
        .replace("{requirements}", requirements)
        .replace("{candidates}", &blocks)
}

/// Decodes `{ "rankings": [...] }` out of raw model text, keyed by candidate id.
///
/// Malformed rows are skipped; for duplicated ids the first row wins. Output
/// that cannot be decoded at all yields no rankings, which leaves every
/// candidate at the unranked default.
pub fn parse_rankings(text: &str) -> HashMap<i64, Ranking> {
    let mut rankings = HashMap::new();

    let Some(json) = extract_json_object(text) else {
        warn!("Rerank output contained no JSON object");
        debug!("Raw rerank output: {text}");
        return rankings;
    };
    let envelope: RankingsEnvelope = match serde_json::from_str(json) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!("Rerank output had no usable rankings array: {e}");
            debug!("Raw rerank output: {text}");
            return rankings;
        }
    };

    let mut rows: Vec<(i64, f64, Option<String>)> = Vec::new();
    for row in envelope.rankings {
        let parsed = match serde_json::from_value::<ModelRanking>(row) {
            Ok(parsed) => parsed,
            Err(e) => {
                debug!("Skipping malformed ranking row: {e}");
                continue;
            }
        };
        let (Some(id), Some(score)) = (parsed.id.as_i64(), parsed.score.as_f64()) else {
            continue;
        };
        rows.push((id, score, parsed.explanation));
    }

    let scale = ScoreScale::of_batch(rows.iter().map(|(_, score, _)| *score));
    for (id, score, explanation) in rows {
        rankings.entry(id).or_insert(Ranking {
            score: scale.normalize(score),
            explanation,
        });
    }
    rankings
}

/// Scores above this anywhere in a batch mark the whole batch as percentages.
const PERCENT_SCALE_THRESHOLD: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq)]
enum ScoreScale {
    Unit,
    Percent,
}

impl ScoreScale {
    fn of_batch(scores: impl IntoIterator<Item = f64>) -> Self {
        if scores.into_iter().any(|s| s > PERCENT_SCALE_THRESHOLD) {
            ScoreScale::Percent
        } else {
            ScoreScale::Unit
        }
    }

    /// Maps a model score into [0, 1].
    fn normalize(self, score: f64) -> f64 {
        match self {
            ScoreScale::Unit => score.clamp(0.0, 1.0),
            ScoreScale::Percent => (score / 100.0).clamp(0.0, 1.0),
        }
    }
}

/// Attaches rankings to every candidate, sorts by score descending and keeps
/// `limit` rows. Equal scores keep input order.
pub fn merge_rankings(
    candidates: Vec<SearchResult>,
    rankings: &HashMap<i64, Ranking>,
    limit: usize,
) -> Vec<SearchResult> {
    let mut merged: Vec<SearchResult> = candidates
        .into_iter()
        .map(|mut row| {
            match rankings.get(&row.candidate.id) {
                Some(ranking) => {
                    row.score = Some(ranking.score);
                    row.explanation = ranking.explanation.clone();
                }
                None => {
                    row.score = Some(UNRANKED_SCORE);
                    row.explanation = Some(UNRANKED_EXPLANATION.to_string());
                }
            }
            row
        })
        .collect();

    // sort_by is stable, so ties stay in input order
    merged.sort_by(|a, b| {
        b.score
            .unwrap_or(UNRANKED_SCORE)
            .total_cmp(&a.score.unwrap_or(UNRANKED_SCORE))
    });
    merged.truncate(limit);
    merged
}
