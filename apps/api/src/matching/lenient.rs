//! Lenient parsing of semi-structured model output.
//!
//! Stage one is a strict decode of the `{ ... }` substring into typed structs
//! whose fields accept the shapes models actually emit. Stage two is a set of
//! named regex extractors, each independently optional, for text that never
//! decoded.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;

lazy_static! {
    static ref SCORE_RE: Regex = Regex::new(r#"(?i)score["\s:]+(\d+(?:\.\d+)?)"#).unwrap();
    static ref FEEDBACK_RE: Regex =
        Regex::new(r#"(?is)feedback["\s:]+([^"]+?)["\s,]*(?:recommendations|\z)"#).unwrap();
    static ref RECOMMENDATIONS_RE: Regex =
        Regex::new(r#"(?is)recommendations["\s:]+([^}]+)"#).unwrap();
}

/// A numeric field that may arrive as a number or a numeric string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum NumberField {
    Number(f64),
    Text(String),
}

impl NumberField {
    pub fn as_f64(&self) -> Option<f64> {
        let value = match self {
            NumberField::Number(n) => *n,
            NumberField::Text(s) => s.trim().trim_end_matches('%').trim().parse().ok()?,
        };
        value.is_finite().then_some(value)
    }
}

/// An id that may arrive as `7` or `"7"`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum IdField {
    Number(i64),
    Text(String),
}

impl IdField {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            IdField::Number(n) => Some(*n),
            IdField::Text(s) => s
                .trim()
                .trim_start_matches("candidate_")
                .parse()
                .ok(),
        }
    }
}

/// Free text that may arrive as a string or a list of strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TextField {
    Text(String),
    List(Vec<String>),
}

impl TextField {
    /// Lists become one `• item` line per entry.
    pub fn into_text(self) -> String {
        match self {
            TextField::Text(s) => s.trim().to_string(),
            TextField::List(items) => items
                .iter()
                .map(|item| item.trim())
                .filter(|item| !item.is_empty())
                .map(|item| {
                    if item.starts_with('•') || item.starts_with('-') {
                        item.to_string()
                    } else {
                        format!("• {item}")
                    }
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// Heuristically recovered evaluation fields. Any may be missing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialEvaluation {
    pub score: Option<f64>,
    pub feedback: Option<String>,
    pub recommendations: Option<String>,
}

impl PartialEvaluation {
    pub fn is_empty(&self) -> bool {
        self.score.is_none() && self.feedback.is_none() && self.recommendations.is_none()
    }
}

/// Runs the score, feedback and recommendations extractors over raw text.
pub fn extract_evaluation_fields(text: &str) -> PartialEvaluation {
    PartialEvaluation {
        score: extract_score(text),
        feedback: extract_feedback(text),
        recommendations: extract_recommendations(text),
    }
}

pub fn extract_score(text: &str) -> Option<f64> {
    SCORE_RE
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

pub fn extract_feedback(text: &str) -> Option<String> {
    FEEDBACK_RE
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| clean_span(m.as_str()))
        .filter(|s| !s.is_empty())
}

pub fn extract_recommendations(text: &str) -> Option<String> {
    RECOMMENDATIONS_RE
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| clean_span(m.as_str()))
        .filter(|s| !s.is_empty())
}

/// Trims whitespace, stray quotes and trailing commas left around a span.
fn clean_span(span: &str) -> String {
    span.trim()
        .trim_matches(|c: char| c == '"' || c == ',' || c.is_whitespace())
        .replace("\\n", "\n")
}
