//! Evaluator — scores one candidate profile against one job text.
//!
//! Degradation tiers, in order:
//! 1. strict decode of the `{ ... }` substring
//! 2. regex extraction of whichever fields are recognizable, merged with defaults
//! 3. fixed neutral defaults (score 60)
//! 4. model call failed: score 0 with an error note
//!
//! `evaluate` never returns an error.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::llm_client::prompts::JSON_ONLY_SYSTEM;
use crate::llm_client::{extract_json_object, CompletionRequest, LanguageModel};
use crate::matching::lenient::{extract_evaluation_fields, NumberField, TextField};
use crate::matching::prompts::{EVALUATION_PROMPT_TEMPLATE, EVALUATION_SYSTEM};
use crate::models::candidate::Candidate;
use crate::models::matching::{Evaluation, MAX_EVALUATION_SCORE};

const EVALUATION_MAX_TOKENS: u32 = 1024;
const EVALUATION_TEMPERATURE: f32 = 0.7;

/// Score used when nothing in the model output could be read.
pub const DEFAULT_SCORE: u32 = 60;
pub const DEFAULT_FEEDBACK: &str = "The candidate shows some relevant skills for the position. \
    Their background includes experience that could be valuable, though there may be some gaps \
    in specific technical requirements. Further discussion recommended to assess cultural fit \
    and technical depth.";
pub const DEFAULT_RECOMMENDATIONS: &str = "• Focus on strengthening core technical skills required for the position\n\
    • Consider gaining more hands-on project experience\n\
    • Highlight relevant achievements more prominently";

pub const MODEL_FAILURE_FEEDBACK: &str = "Error generating evaluation. Please try again later.";
pub const MODEL_FAILURE_RECOMMENDATIONS: &str = "• Unable to provide recommendations at this time";

const MISSING_FEEDBACK: &str = "No feedback available";

/// Which degradation tier produced an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseTier {
    Strict,
    Heuristic,
    Default,
    ModelFailure,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationOutcome {
    /// 0 – 100
    pub score: u32,
    pub feedback: String,
    pub recommendations: Option<String>,
    pub tier: ParseTier,
}

impl EvaluationOutcome {
    fn model_failure() -> Self {
        Self {
            score: 0,
            feedback: MODEL_FAILURE_FEEDBACK.to_string(),
            recommendations: Some(MODEL_FAILURE_RECOMMENDATIONS.to_string()),
            tier: ParseTier::ModelFailure,
        }
    }

    pub fn into_evaluation(self, candidate: &Candidate) -> Evaluation {
        Evaluation {
            candidate_id: candidate.id,
            candidate_name: candidate.name.clone(),
            score: self.score,
            feedback: self.feedback,
            recommendations: self.recommendations,
        }
    }
}

/// Shape the prompt asks for. Fields accept the loose variants models emit.
#[derive(Debug, Deserialize)]
struct ModelEvaluation {
    score: NumberField,
    #[serde(default)]
    feedback: Option<TextField>,
    #[serde(default)]
    recommendations: Option<TextField>,
}

pub struct Evaluator {
    model: Arc<dyn LanguageModel>,
}

impl Evaluator {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    pub async fn evaluate(&self, candidate_profile: &str, job_text: &str) -> EvaluationOutcome {
        let prompt = EVALUATION_PROMPT_TEMPLATE
            .replace("{job_text}", job_text)
            .replace("{candidate_profile}", candidate_profile);
        let system = format!("{EVALUATION_SYSTEM} {JSON_ONLY_SYSTEM}");

        let request = CompletionRequest {
            system: &system,
            prompt: &prompt,
            max_tokens: EVALUATION_MAX_TOKENS,
            temperature: EVALUATION_TEMPERATURE,
        };

        match self.model.complete(request).await {
            Ok(text) => parse_evaluation(&text),
            Err(e) => {
                warn!("Evaluation model call failed: {e}");
                EvaluationOutcome::model_failure()
            }
        }
    }
}

/// Parses raw model text into an outcome. Never fails.
pub fn parse_evaluation(text: &str) -> EvaluationOutcome {
    if let Some(outcome) = parse_strict(text) {
        return outcome;
    }

    let fields = extract_evaluation_fields(text);
    if fields.is_empty() {
        warn!("Evaluation output unreadable, using default evaluation");
        debug!("Raw evaluation output: {text}");
        return EvaluationOutcome {
            score: DEFAULT_SCORE,
            feedback: DEFAULT_FEEDBACK.to_string(),
            recommendations: Some(DEFAULT_RECOMMENDATIONS.to_string()),
            tier: ParseTier::Default,
        };
    }

    warn!("Evaluation output was not valid JSON, recovered fields heuristically");
    EvaluationOutcome {
        score: fields.score.map(clamp_score).unwrap_or(DEFAULT_SCORE),
        feedback: fields
            .feedback
            .unwrap_or_else(|| DEFAULT_FEEDBACK.to_string()),
        recommendations: Some(
            fields
                .recommendations
                .unwrap_or_else(|| DEFAULT_RECOMMENDATIONS.to_string()),
        ),
        tier: ParseTier::Heuristic,
    }
}

fn parse_strict(text: &str) -> Option<EvaluationOutcome> {
    let json = extract_json_object(text)?;
    let parsed: ModelEvaluation = match serde_json::from_str(json) {
        Ok(parsed) => parsed,
        Err(e) => {
            debug!("Strict evaluation decode failed: {e}");
            return None;
        }
    };
    let score = parsed.score.as_f64()?;

    Some(EvaluationOutcome {
        score: clamp_score(score),
        feedback: parsed
            .feedback
            .map(TextField::into_text)
            .filter(|f| !f.is_empty())
            .unwrap_or_else(|| MISSING_FEEDBACK.to_string()),
        recommendations: parsed
            .recommendations
            .map(TextField::into_text)
            .filter(|r| !r.is_empty()),
        tier: ParseTier::Strict,
    })
}

fn clamp_score(score: f64) -> u32 {
    score.round().clamp(0.0, MAX_EVALUATION_SCORE as f64) as u32
}
