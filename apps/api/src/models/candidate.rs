use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A candidate as held by the record store.
///
/// Scoring never mutates a candidate; evaluations and search results are
/// produced alongside it.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub linkedin: Option<String>,
    /// Comma-separated tag list, e.g. "React, CSS".
    pub skills: String,
    pub experience: String,
    pub resume_text: Option<String>,
    /// Object key of the uploaded resume document.
    pub resume_key: Option<String>,
    /// Best-effort title guessed from the resume.
    pub job_title: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Fields required to create a candidate.
#[derive(Debug, Clone)]
pub struct NewCandidate {
    pub name: String,
    pub email: String,
    pub linkedin: Option<String>,
    pub skills: String,
    pub experience: String,
    pub resume_text: Option<String>,
    pub resume_key: Option<String>,
    pub job_title: Option<String>,
}

/// Partial update. `None` keeps the stored value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CandidateUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub linkedin: Option<String>,
    pub skills: Option<String>,
    pub experience: Option<String>,
}

impl CandidateUpdate {
    /// Applies the update to a stored candidate. Blank strings count as absent.
    pub fn apply_to(self, mut candidate: Candidate) -> Candidate {
        fn pick(new: Option<String>, old: String) -> String {
            new.filter(|v| !v.trim().is_empty()).unwrap_or(old)
        }

        candidate.name = pick(self.name, candidate.name);
        candidate.email = pick(self.email, candidate.email);
        candidate.skills = pick(self.skills, candidate.skills);
        candidate.experience = pick(self.experience, candidate.experience);
        if let Some(linkedin) = self.linkedin.filter(|v| !v.trim().is_empty()) {
            candidate.linkedin = Some(linkedin);
        }
        candidate
    }
}
