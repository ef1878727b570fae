//! Natural-language renderings of jobs and candidates for prompts and embeddings.

use crate::models::candidate::Candidate;
use crate::models::job::Job;

/// Resume text sent per candidate in a rerank batch is capped to keep the
/// prompt inside the model context.
pub const RERANK_RESUME_CHARS: usize = 800;

const PLACEHOLDER_TITLE: &str = "Unknown Position";
const PLACEHOLDER_DESCRIPTION: &str = "Job details not available";
const PLACEHOLDER_REQUIREMENTS: &str = "Unknown requirements";

fn or_default<'a>(value: &'a str, default: &'a str) -> &'a str {
    if value.trim().is_empty() {
        default
    } else {
        value.trim()
    }
}

/// Job text for evaluation. `None` renders the neutral placeholder job used
/// when the job could not be fetched.
pub fn job_text(job: Option<&Job>) -> String {
    let (title, description, requirements) = match job {
        Some(job) => (
            or_default(&job.title, "No title"),
            or_default(&job.description, "No description"),
            or_default(&job.requirements, "No requirements"),
        ),
        None => (
            PLACEHOLDER_TITLE,
            PLACEHOLDER_DESCRIPTION,
            PLACEHOLDER_REQUIREMENTS,
        ),
    };
    format!("Title: {title}\nDescription: {description}\nRequirements: {requirements}")
}

/// Candidate profile for single-candidate evaluation.
pub fn candidate_profile(candidate: &Candidate) -> String {
    format!(
        "Name: {}\nEmail: {}\nLinkedIn: {}\nSkills: {}\nExperience: {}\nResume Text: {}",
        or_default(&candidate.name, "Unknown"),
        or_default(&candidate.email, "Not provided"),
        or_default(candidate.linkedin.as_deref().unwrap_or(""), "Not provided"),
        or_default(&candidate.skills, "Not specified"),
        or_default(&candidate.experience, "Not specified"),
        or_default(candidate.resume_text.as_deref().unwrap_or(""), "Not available"),
    )
}

/// Text embedded into the vector index for a candidate.
pub fn candidate_index_text(candidate: &Candidate) -> String {
    format!(
        "Name: {}\nSkills: {}\nExperience: {}\nResume: {}",
        candidate.name,
        candidate.skills,
        candidate.experience,
        candidate.resume_text.as_deref().unwrap_or("")
    )
}

/// Text embedded into the vector index for a job.
pub fn job_index_text(job: &Job) -> String {
    format!(
        "Title: {}\nDescription: {}\nRequirements: {}",
        job.title, job.description, job.requirements
    )
}

/// One numbered candidate block inside a rerank prompt.
pub fn rerank_block(position: usize, candidate: &Candidate) -> String {
    let resume = candidate
        .resume_text
        .as_deref()
        .map(|t| truncate_chars(t, RERANK_RESUME_CHARS))
        .filter(|t| !t.trim().is_empty())
        .unwrap_or("No resume text available");
    format!(
        "CANDIDATE {position}:\nID: {}\nName: {}\nSkills: {}\nExperience: {}\nResume Text: {resume}\n",
        candidate.id, candidate.name, candidate.skills, candidate.experience
    )
}

/// First `max_chars` characters of `text`, cut on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
