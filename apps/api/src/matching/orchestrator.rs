//! Matching Orchestrator — the Evaluate and Search pipelines.
//!
//! Evaluate: fetch candidates + job → per-candidate evaluation fan-out under a
//! concurrency cap → stable sort by score.
//!
//! Search: resolve search text → vector tier (embed, query, resolve, rerank) →
//! model-only fallback when the vector tier is unavailable.
//!
//! Upstream failures are absorbed here. The only errors callers see are
//! validation errors and record store failures while listing candidates.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::embeddings::Embedder;
use crate::matching::evaluator::{EvaluationOutcome, Evaluator, ParseTier};
use crate::matching::profiles::{candidate_profile, job_text};
use crate::matching::reranker::Reranker;
use crate::models::candidate::Candidate;
use crate::models::job::Job;
use crate::models::matching::{Evaluation, SearchMethod, SearchResult};
use crate::records::{RecordStore, RecordStoreError};
use crate::vector_index::{EntryKind, IndexFilter, VectorIndex, VectorIndexError};

pub const DEFAULT_SEARCH_LIMIT: usize = 10;
pub const MAX_SEARCH_LIMIT: usize = 20;
/// Candidates handed to the reranker in the model-only tier.
pub const FALLBACK_CANDIDATE_LIMIT: usize = 15;
/// Upper bound on one rerank batch from the vector tier.
pub const RERANK_BATCH_LIMIT: usize = 40;

#[derive(Debug, Error)]
pub enum MatchError {
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Records(#[from] RecordStoreError),
}

/// Why the vector tier produced nothing usable.
#[derive(Debug, Error)]
pub enum VectorTierUnavailable {
    #[error("vector index query failed: {0}")]
    Index(#[from] VectorIndexError),

    #[error("vector index returned no resolvable candidates")]
    NoMatches,
}

#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
    pub query: Option<String>,
    pub job_id: Option<i64>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub results: Vec<SearchResult>,
    pub method: SearchMethod,
}

/// Texts derived from a search request.
#[derive(Debug, Clone, PartialEq)]
struct ResolvedQuery {
    /// Embedded for the vector tier: job requirements, then the free-text query.
    search_text: String,
    /// Handed to the reranker: job requirements when known, else the query.
    requirements: String,
}

pub struct Matcher {
    store: Arc<dyn RecordStore>,
    embedder: Embedder,
    index: Arc<dyn VectorIndex>,
    evaluator: Arc<Evaluator>,
    reranker: Reranker,
    evaluation_concurrency: usize,
}

impl Matcher {
    pub fn new(
        store: Arc<dyn RecordStore>,
        embedder: Embedder,
        index: Arc<dyn VectorIndex>,
        evaluator: Evaluator,
        reranker: Reranker,
        evaluation_concurrency: usize,
    ) -> Self {
        Self {
            store,
            embedder,
            index,
            evaluator: Arc::new(evaluator),
            reranker,
            evaluation_concurrency: evaluation_concurrency.max(1),
        }
    }

    // ────────────────────────────────────────────────────────────────────────
    // Evaluate
    // ────────────────────────────────────────────────────────────────────────

    /// Scores every candidate against `job_id`, highest score first.
    pub async fn evaluate(&self, job_id: i64) -> Result<Vec<Evaluation>, MatchError> {
        if job_id <= 0 {
            return Err(MatchError::Validation(
                "jobId must be a positive integer".to_string(),
            ));
        }

        let candidates = self.store.list_candidates().await?;
        if candidates.is_empty() {
            info!("No candidates to evaluate for job {job_id}");
            return Ok(Vec::new());
        }

        let job = self.fetch_job(job_id).await;
        info!(
            "Evaluating {} candidates for job {} ({})",
            candidates.len(),
            job_id,
            job.as_ref().map_or("placeholder", |j| j.title.as_str())
        );

        let job_text: Arc<str> = job_text(job.as_ref()).into();
        let permits = Arc::new(Semaphore::new(self.evaluation_concurrency));

        // Dropping the set aborts every evaluation still queued or in flight.
        let mut tasks = JoinSet::new();
        for (position, candidate) in candidates.iter().enumerate() {
            let profile = candidate_profile(candidate);
            let evaluator = Arc::clone(&self.evaluator);
            let job_text = Arc::clone(&job_text);
            let permits = Arc::clone(&permits);
            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await.ok();
                (position, evaluator.evaluate(&profile, &job_text).await)
            });
        }

        let mut outcomes: Vec<Option<EvaluationOutcome>> = vec![None; candidates.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((position, outcome)) => outcomes[position] = Some(outcome),
                Err(e) => warn!("Evaluation task for job {job_id} aborted: {e}"),
            }
        }

        let mut degraded = 0;
        let mut evaluations: Vec<Evaluation> = candidates
            .iter()
            .zip(outcomes)
            .map(|(candidate, outcome)| match outcome {
                Some(outcome) => {
                    if outcome.tier != ParseTier::Strict {
                        degraded += 1;
                    }
                    outcome.into_evaluation(candidate)
                }
                None => {
                    degraded += 1;
                    Evaluation {
                        candidate_id: candidate.id,
                        candidate_name: candidate.name.clone(),
                        score: 0,
                        feedback: "Error during evaluation: evaluation task did not complete"
                            .to_string(),
                        recommendations: None,
                    }
                }
            })
            .collect();

        // Stable: equal scores keep candidate listing order
        evaluations.sort_by(|a, b| b.score.cmp(&a.score));
        info!(
            "Evaluated {} candidates for job {job_id} ({degraded} degraded)",
            evaluations.len()
        );
        Ok(evaluations)
    }

    /// Job lookup that never fails; `None` selects the placeholder job.
    async fn fetch_job(&self, job_id: i64) -> Option<Job> {
        match self.store.get_job(job_id).await {
            Ok(Some(job)) => Some(job),
            Ok(None) => {
                warn!("Job {job_id} not found, evaluating against placeholder job");
                None
            }
            Err(e) => {
                warn!("Failed to fetch job {job_id}, evaluating against placeholder job: {e}");
                None
            }
        }
    }

    // ────────────────────────────────────────────────────────────────────────
    // Search
    // ────────────────────────────────────────────────────────────────────────

    /// Retrieves and reranks candidates for a free-text query and/or job.
    pub async fn search(&self, request: SearchRequest) -> Result<SearchOutcome, MatchError> {
        let query = request
            .query
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty());
        if query.is_none() && request.job_id.is_none() {
            return Err(MatchError::Validation(
                "Either search query or job ID is required".to_string(),
            ));
        }
        let limit = request
            .limit
            .unwrap_or(DEFAULT_SEARCH_LIMIT)
            .clamp(1, MAX_SEARCH_LIMIT);

        let resolved = self.resolve_query(query, request.job_id).await?;
        let candidates = self.store.list_candidates().await?;

        match self.try_vector_search(&resolved, &candidates, limit).await {
            Ok(results) => {
                info!("Vector tier returned {} results", results.len());
                Ok(SearchOutcome {
                    results,
                    method: SearchMethod::VectorAndModel,
                })
            }
            Err(reason) => {
                warn!("Vector tier unavailable, falling back to model-only: {reason}");
                let results = self.run_fallback(&resolved, &candidates, limit).await;
                info!("Model-only tier returned {} results", results.len());
                Ok(SearchOutcome {
                    results,
                    method: SearchMethod::ModelOnly,
                })
            }
        }
    }

    async fn resolve_query(
        &self,
        query: Option<&str>,
        job_id: Option<i64>,
    ) -> Result<ResolvedQuery, MatchError> {
        let query = query.unwrap_or("");
        let requirements = match job_id {
            Some(id) => match self.store.get_job(id).await {
                Ok(Some(job)) => Some(job.requirements),
                Ok(None) => {
                    warn!("Job {id} not found, searching with query text only");
                    None
                }
                Err(e) => {
                    warn!("Failed to fetch job {id}, searching with query text only: {e}");
                    None
                }
            },
            None => None,
        };
        let requirements = requirements
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());

        let resolved = match requirements {
            Some(requirements) => ResolvedQuery {
                search_text: format!("{requirements} {query}").trim().to_string(),
                requirements,
            },
            None => ResolvedQuery {
                search_text: query.to_string(),
                requirements: query.to_string(),
            },
        };

        if resolved.search_text.is_empty() {
            return Err(MatchError::Validation(
                "No valid search text available".to_string(),
            ));
        }
        Ok(resolved)
    }

    /// Embed → query 2×limit neighbours → resolve to candidates → rerank.
    async fn try_vector_search(
        &self,
        resolved: &ResolvedQuery,
        candidates: &[Candidate],
        limit: usize,
    ) -> Result<Vec<SearchResult>, VectorTierUnavailable> {
        let vector = self.embedder.embed(&resolved.search_text).await;
        let matches = self
            .index
            .query(&vector, limit * 2, IndexFilter::kind(EntryKind::Candidate))
            .await?;
        info!("Vector index returned {} matches", matches.len());

        let by_id: HashMap<i64, &Candidate> = candidates.iter().map(|c| (c.id, c)).collect();
        let mut seen = HashSet::new();
        let matched: Vec<SearchResult> = matches
            .iter()
            .filter_map(|m| {
                let id = m.parsed_id().filter(|id| id.kind == EntryKind::Candidate)?;
                let candidate = by_id.get(&id.id)?;
                seen.insert(id.id)
                    .then(|| SearchResult::unranked((*candidate).clone(), Some(m.score)))
            })
            .take(RERANK_BATCH_LIMIT)
            .collect();

        if matched.is_empty() {
            return Err(VectorTierUnavailable::NoMatches);
        }

        Ok(self
            .reranker
            .rerank(matched, &resolved.requirements, limit)
            .await)
    }

    /// Reranks a bounded prefix of all candidates directly.
    async fn run_fallback(
        &self,
        resolved: &ResolvedQuery,
        candidates: &[Candidate],
        limit: usize,
    ) -> Vec<SearchResult> {
        let subset: Vec<SearchResult> = candidates
            .iter()
            .take(FALLBACK_CANDIDATE_LIMIT)
            .map(|c| SearchResult::unranked(c.clone(), None))
            .collect();
        self.reranker
            .rerank(subset, &resolved.requirements, limit)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::EmbeddingProvider;
    use crate::matching::evaluator::{DEFAULT_FEEDBACK, DEFAULT_SCORE};
    use crate::matching::reranker::UNRANKED_SCORE;
    use crate::matching::testing::{
        make_candidate, make_job, ConstantEmbeddings, FixedMatchesIndex, MemoryStore,
        ScriptedModel, SlowModel, UnreachableIndex,
    };
    use crate::vector_index::IndexMatch;
    use std::time::Duration;

    fn embedder() -> Embedder {
        let provider: Arc<dyn EmbeddingProvider> = Arc::new(ConstantEmbeddings(vec![1.0, 0.0]));
        Embedder::new(provider, 2)
    }

    fn matcher(
        store: Arc<MemoryStore>,
        index: Arc<dyn VectorIndex>,
        evaluation_model: Arc<ScriptedModel>,
        rerank_model: Arc<ScriptedModel>,
    ) -> Matcher {
        Matcher::new(
            store,
            embedder(),
            index,
            Evaluator::new(evaluation_model),
            Reranker::new(rerank_model),
            4,
        )
    }

    /// Matcher over `count` candidates whose evaluations go to `model`.
    fn capped_matcher(count: i64, model: Arc<SlowModel>, concurrency: usize) -> Matcher {
        let store = MemoryStore::new(
            (1..=count).map(|id| make_candidate(id, "Rust")).collect(),
            vec![make_job(1, "Rust")],
        );
        Matcher::new(
            store,
            embedder(),
            Arc::new(UnreachableIndex),
            Evaluator::new(model),
            Reranker::new(ScriptedModel::failing()),
            concurrency,
        )
    }

    /// Scores evaluation prompts by which skills the profile lists.
    fn skill_scoring_model() -> Arc<ScriptedModel> {
        ScriptedModel::new(|prompt| {
            let score = if prompt.contains("Skills: React, CSS") {
                85
            } else if prompt.contains("Skills: Python") {
                30
            } else {
                50
            };
            Ok(format!(
                r#"{{"score": {score}, "feedback": "fit {score}", "recommendations": "• keep going"}}"#
            ))
        })
    }

    fn ids(results: &[SearchResult]) -> Vec<i64> {
        results.iter().map(|r| r.candidate.id).collect()
    }

    #[tokio::test]
    async fn test_evaluate_scores_each_candidate_sorted_descending() {
        let store = MemoryStore::new(
            vec![make_candidate(11, "Python"), make_candidate(10, "React, CSS")],
            vec![make_job(1, "3+ years React")],
        );
        let matcher = matcher(
            store,
            Arc::new(UnreachableIndex),
            skill_scoring_model(),
            ScriptedModel::failing(),
        );

        let evaluations = matcher.evaluate(1).await.unwrap();

        assert_eq!(evaluations.len(), 2);
        assert_eq!(evaluations[0].candidate_id, 10);
        assert_eq!(evaluations[0].score, 85);
        assert_eq!(evaluations[1].candidate_id, 11);
        assert_eq!(evaluations[1].score, 30);
        assert!(evaluations.iter().all(|e| e.score <= 100));
    }

    #[tokio::test]
    async fn test_evaluate_ties_keep_listing_order() {
        let store = MemoryStore::new(
            (1..=6).map(|id| make_candidate(id, "Go")).collect(),
            vec![make_job(1, "Go")],
        );
        let matcher = matcher(
            store,
            Arc::new(UnreachableIndex),
            ScriptedModel::always(r#"{"score": 50, "feedback": "same"}"#),
            ScriptedModel::failing(),
        );

        let evaluations = matcher.evaluate(1).await.unwrap();
        let order: Vec<i64> = evaluations.iter().map(|e| e.candidate_id).collect();
        assert_eq!(order, vec![1, 2, 3, 4, 5, 6]);
    }

    #[tokio::test]
    async fn test_evaluate_one_failure_does_not_affect_others() {
        let store = MemoryStore::new(
            vec![make_candidate(1, "Rust"), make_candidate(2, "Python")],
            vec![make_job(1, "Rust")],
        );
        let model = ScriptedModel::new(|prompt| {
            if prompt.contains("Skills: Python") {
                Err(crate::llm_client::LlmError::EmptyContent)
            } else {
                Ok(r#"{"score": 90, "feedback": "great"}"#.to_string())
            }
        });
        let matcher = matcher(store, Arc::new(UnreachableIndex), model, ScriptedModel::failing());

        let evaluations = matcher.evaluate(1).await.unwrap();
        assert_eq!(evaluations.len(), 2);
        assert_eq!(evaluations[0].candidate_id, 1);
        assert_eq!(evaluations[0].score, 90);
        assert_eq!(evaluations[1].candidate_id, 2);
        assert_eq!(evaluations[1].score, 0);
    }

    #[tokio::test]
    async fn test_evaluate_missing_job_uses_placeholder() {
        let store = MemoryStore::with_failing_jobs(vec![make_candidate(1, "Rust")]);
        let model = ScriptedModel::always("not parseable at all");
        let matcher = matcher(
            store,
            Arc::new(UnreachableIndex),
            model.clone(),
            ScriptedModel::failing(),
        );

        let evaluations = matcher.evaluate(42).await.unwrap();
        assert_eq!(evaluations.len(), 1);
        assert_eq!(evaluations[0].score, DEFAULT_SCORE);
        assert_eq!(evaluations[0].feedback, DEFAULT_FEEDBACK);
        assert!(model.prompts()[0].contains("Title: Unknown Position"));
    }

    #[tokio::test]
    async fn test_evaluate_empty_candidates_is_empty() {
        let store = MemoryStore::new(vec![], vec![make_job(1, "Rust")]);
        let model = ScriptedModel::always("{}");
        let matcher = matcher(
            store,
            Arc::new(UnreachableIndex),
            model.clone(),
            ScriptedModel::failing(),
        );
        assert!(matcher.evaluate(1).await.unwrap().is_empty());
        assert!(model.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_evaluate_rejects_non_positive_job_id() {
        let store = MemoryStore::new(vec![], vec![]);
        let matcher = matcher(
            store,
            Arc::new(UnreachableIndex),
            ScriptedModel::failing(),
            ScriptedModel::failing(),
        );
        assert!(matches!(
            matcher.evaluate(0).await,
            Err(MatchError::Validation(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_evaluate_in_flight_calls_stay_under_cap() {
        let model = SlowModel::new(Duration::from_millis(100));
        let matcher = capped_matcher(12, model.clone(), 3);

        let evaluations = matcher.evaluate(1).await.unwrap();

        assert_eq!(evaluations.len(), 12);
        assert!(evaluations.iter().all(|e| e.score == 60));
        assert_eq!(model.started(), 12);
        assert_eq!(model.peak_in_flight(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_evaluate_dropped_request_starts_no_further_calls() {
        let model = SlowModel::new(Duration::from_millis(100));
        let matcher = capped_matcher(12, model.clone(), 3);

        let abandoned =
            tokio::time::timeout(Duration::from_millis(50), matcher.evaluate(1)).await;
        assert!(abandoned.is_err());

        let started_at_drop = model.started();
        assert!(started_at_drop <= 3);

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(model.started(), started_at_drop);
    }

    #[tokio::test]
    async fn test_search_requires_query_or_job() {
        let matcher = matcher(
            MemoryStore::new(vec![], vec![]),
            Arc::new(UnreachableIndex),
            ScriptedModel::failing(),
            ScriptedModel::failing(),
        );
        let result = matcher
            .search(SearchRequest {
                query: Some("   ".to_string()),
                ..Default::default()
            })
            .await;
        assert!(matches!(result, Err(MatchError::Validation(_))));
    }

    #[tokio::test]
    async fn test_search_unreachable_index_falls_back_to_model_only() {
        let candidates: Vec<Candidate> = (1..=20).map(|id| make_candidate(id, "React")).collect();
        let rerank_model = ScriptedModel::always(r#"{"rankings": [{"id": 5, "score": 0.9}]}"#);
        let matcher = matcher(
            MemoryStore::new(candidates, vec![]),
            Arc::new(UnreachableIndex),
            ScriptedModel::failing(),
            rerank_model.clone(),
        );

        let outcome = matcher
            .search(SearchRequest {
                query: Some("React developer".to_string()),
                job_id: None,
                limit: Some(3),
            })
            .await
            .unwrap();

        assert_eq!(outcome.method, SearchMethod::ModelOnly);
        assert_eq!(ids(&outcome.results), vec![5, 1, 2]);
        assert_eq!(outcome.results[1].score, Some(UNRANKED_SCORE));

        // Only the first 15 candidates reach the prompt
        let prompt = &rerank_model.prompts()[0];
        assert!(prompt.contains("ID: 15\n"));
        assert!(!prompt.contains("ID: 16\n"));
    }

    #[tokio::test]
    async fn test_search_job_only_with_failing_index_uses_model_only() {
        let rerank_model = ScriptedModel::always(r#"{"rankings": [{"id": 10, "score": 0.8}]}"#);
        let matcher = matcher(
            MemoryStore::new(
                vec![make_candidate(10, "React, CSS"), make_candidate(11, "Python")],
                vec![make_job(1, "3+ years React")],
            ),
            Arc::new(UnreachableIndex),
            ScriptedModel::failing(),
            rerank_model.clone(),
        );

        let outcome = matcher
            .search(SearchRequest {
                query: Some(String::new()),
                job_id: Some(1),
                limit: None,
            })
            .await
            .unwrap();

        assert_eq!(outcome.method, SearchMethod::ModelOnly);
        assert_eq!(ids(&outcome.results), vec![10, 11]);
        assert!(rerank_model.prompts()[0].contains("JOB REQUIREMENTS:\n3+ years React"));
    }

    #[tokio::test]
    async fn test_search_vector_tier_resolves_and_reranks() {
        let index = FixedMatchesIndex(vec![
            IndexMatch {
                external_id: "candidate_3".to_string(),
                score: 0.92,
            },
            IndexMatch {
                external_id: "candidate_404".to_string(),
                score: 0.91,
            },
            IndexMatch {
                external_id: "job_1".to_string(),
                score: 0.90,
            },
            IndexMatch {
                external_id: "candidate_1".to_string(),
                score: 0.80,
            },
        ]);
        let rerank_model = ScriptedModel::always(
            r#"{"rankings": [{"id": 1, "score": 0.95, "explanation": "best"}, {"id": 3, "score": 0.4}]}"#,
        );
        let matcher = matcher(
            MemoryStore::new(
                (1..=3).map(|id| make_candidate(id, "React")).collect(),
                vec![],
            ),
            Arc::new(index),
            ScriptedModel::failing(),
            rerank_model.clone(),
        );

        let outcome = matcher
            .search(SearchRequest {
                query: Some("React".to_string()),
                job_id: None,
                limit: Some(5),
            })
            .await
            .unwrap();

        assert_eq!(outcome.method, SearchMethod::VectorAndModel);
        assert_eq!(ids(&outcome.results), vec![1, 3]);
        assert_eq!(outcome.results[0].vector_score, Some(0.80));
        assert!(!rerank_model.prompts()[0].contains("ID: 2\n"));
    }

    #[tokio::test]
    async fn test_search_zero_matches_falls_back() {
        let matcher = matcher(
            MemoryStore::new(vec![make_candidate(1, "React")], vec![]),
            Arc::new(FixedMatchesIndex(vec![])),
            ScriptedModel::failing(),
            ScriptedModel::always(r#"{"rankings": []}"#),
        );
        let outcome = matcher
            .search(SearchRequest {
                query: Some("React".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(outcome.method, SearchMethod::ModelOnly);
        assert_eq!(ids(&outcome.results), vec![1]);
    }

    #[tokio::test]
    async fn test_search_missing_job_without_query_is_rejected() {
        let matcher = matcher(
            MemoryStore::new(vec![make_candidate(1, "React")], vec![]),
            Arc::new(UnreachableIndex),
            ScriptedModel::failing(),
            ScriptedModel::failing(),
        );
        let result = matcher
            .search(SearchRequest {
                query: None,
                job_id: Some(99),
                limit: None,
            })
            .await;
        assert!(matches!(result, Err(MatchError::Validation(_))));
    }

    #[tokio::test]
    async fn test_resolve_query_puts_requirements_first() {
        let matcher = matcher(
            MemoryStore::new(vec![], vec![make_job(1, "3+ years React")]),
            Arc::new(UnreachableIndex),
            ScriptedModel::failing(),
            ScriptedModel::failing(),
        );
        let resolved = matcher
            .resolve_query(Some("remote"), Some(1))
            .await
            .unwrap();
        assert_eq!(resolved.search_text, "3+ years React remote");
        assert_eq!(resolved.requirements, "3+ years React");

        let resolved = matcher.resolve_query(Some("remote"), Some(7)).await.unwrap();
        assert_eq!(resolved.search_text, "remote");
        assert_eq!(resolved.requirements, "remote");
    }
}
