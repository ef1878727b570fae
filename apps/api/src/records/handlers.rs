use axum::{
    extract::{multipart::MultipartError, rejection::JsonRejection, Multipart, Path, State},
    http::StatusCode,
    Json,
};
use bytes::Bytes;
use serde::Serialize;
use tracing::{info, warn};

use crate::errors::AppError;
use crate::models::candidate::{Candidate, CandidateUpdate, NewCandidate};
use crate::models::job::{Job, NewJob};
use crate::records::extract::{extract_document, extraction_failure_text, UNSPECIFIED_TITLE};
use crate::state::AppState;

/// Largest accepted resume upload.
pub const MAX_RESUME_BYTES: usize = 5 * 1024 * 1024;
const RESUME_CONTENT_TYPE: &str = "application/pdf";

#[derive(Debug, Serialize)]
pub struct CandidateResponse {
    pub success: bool,
    pub message: String,
    pub candidate: Candidate,
}

#[derive(Debug, Serialize)]
pub struct JobResponse {
    pub success: bool,
    pub message: String,
    pub job: Job,
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub success: bool,
    pub message: String,
}

/// Multipart fields of a candidate application.
#[derive(Debug, Default)]
pub struct CandidateForm {
    pub name: Option<String>,
    pub email: Option<String>,
    pub linkedin: Option<String>,
    pub skills: Option<String>,
    pub experience: Option<String>,
    pub resume: Option<ResumeUpload>,
}

#[derive(Debug)]
pub struct ResumeUpload {
    pub content_type: Option<String>,
    pub data: Bytes,
}

/// A candidate application that passed validation.
#[derive(Debug)]
pub struct ValidApplication {
    pub name: String,
    pub email: String,
    pub linkedin: Option<String>,
    pub skills: String,
    pub experience: String,
    pub resume: Bytes,
}

impl CandidateForm {
    pub fn validate(self) -> Result<ValidApplication, AppError> {
        fn required(value: Option<String>) -> Option<String> {
            value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
        }

        let (Some(name), Some(email), Some(skills), Some(experience), Some(resume)) = (
            required(self.name),
            required(self.email),
            required(self.skills),
            required(self.experience),
            self.resume,
        ) else {
            return Err(AppError::Validation("Missing required fields".to_string()));
        };

        if resume.content_type.as_deref() != Some(RESUME_CONTENT_TYPE) {
            return Err(AppError::Validation(
                "Invalid file type. Please upload a PDF".to_string(),
            ));
        }
        if resume.data.len() > MAX_RESUME_BYTES {
            return Err(AppError::PayloadTooLarge(
                "File size too large. Maximum 5MB".to_string(),
            ));
        }

        Ok(ValidApplication {
            name,
            email,
            linkedin: required(self.linkedin),
            skills,
            experience,
            resume: resume.data,
        })
    }
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge("File size too large. Maximum 5MB".to_string())
    } else {
        AppError::Validation(format!("Malformed form data: {}", e.body_text()))
    }
}

async fn read_candidate_form(mut multipart: Multipart) -> Result<CandidateForm, AppError> {
    let mut form = CandidateForm::default();
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        if name == "resume" {
            let content_type = field.content_type().map(str::to_string);
            let data = field.bytes().await.map_err(multipart_error)?;
            form.resume = Some(ResumeUpload { content_type, data });
            continue;
        }

        let value = field.text().await.map_err(multipart_error)?;
        match name.as_str() {
            "name" => form.name = Some(value),
            "email" => form.email = Some(value),
            "linkedin" => form.linkedin = Some(value),
            "skills" => form.skills = Some(value),
            "experience" => form.experience = Some(value),
            _ => {}
        }
    }
    Ok(form)
}

// ─── Candidates ──────────────────────────────────────────────────────────────

/// GET /api/v1/candidates
pub async fn handle_list_candidates(
    State(state): State<AppState>,
) -> Result<Json<Vec<Candidate>>, AppError> {
    Ok(Json(state.store.list_candidates().await?))
}

/// POST /api/v1/candidates (multipart)
pub async fn handle_create_candidate(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<CandidateResponse>, AppError> {
    let application = read_candidate_form(multipart).await?.validate()?;

    let (resume_text, job_title) = match extract_document(application.resume.clone()).await {
        Ok(doc) => (doc.text, doc.title_guess),
        Err(e) => {
            warn!("Resume extraction failed for {}: {e}", application.email);
            (extraction_failure_text(&e), None)
        }
    };

    let resume_key = state
        .documents
        .put_resume(application.resume)
        .await
        .map_err(|e| AppError::Storage(e.to_string()))?;

    let candidate = state
        .store
        .add_candidate(NewCandidate {
            name: application.name,
            email: application.email,
            linkedin: application.linkedin,
            skills: application.skills,
            experience: application.experience,
            resume_text: Some(resume_text),
            resume_key: Some(resume_key),
            job_title: Some(job_title.unwrap_or_else(|| UNSPECIFIED_TITLE.to_string())),
        })
        .await?;
    info!("Candidate {} added", candidate.id);

    state.indexer.index_candidate(&candidate).await;

    Ok(Json(CandidateResponse {
        success: true,
        message: "Application submitted successfully!".to_string(),
        candidate,
    }))
}

/// PUT /api/v1/candidates/:id
pub async fn handle_update_candidate(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    update: Result<Json<CandidateUpdate>, JsonRejection>,
) -> Result<Json<CandidateResponse>, AppError> {
    let Json(update) = update?;
    let candidate = state
        .store
        .update_candidate(id, update)
        .await?
        .ok_or_else(|| AppError::NotFound("Candidate not found".to_string()))?;

    state.indexer.index_candidate(&candidate).await;

    Ok(Json(CandidateResponse {
        success: true,
        message: "Candidate updated successfully!".to_string(),
        candidate,
    }))
}

/// DELETE /api/v1/candidates/:id
pub async fn handle_delete_candidate(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<DeletedResponse>, AppError> {
    let removed = state
        .store
        .delete_candidate(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Candidate not found".to_string()))?;

    if let Some(key) = removed.resume_key.as_deref() {
        if let Err(e) = state.documents.delete(key).await {
            warn!("Failed to delete resume {key} of candidate {id}: {e}");
        }
    }

    Ok(Json(DeletedResponse {
        success: true,
        message: "Candidate deleted successfully!".to_string(),
    }))
}

// ─── Jobs ────────────────────────────────────────────────────────────────────

/// GET /api/v1/jobs
pub async fn handle_list_jobs(State(state): State<AppState>) -> Result<Json<Vec<Job>>, AppError> {
    Ok(Json(state.store.list_jobs().await?))
}

/// POST /api/v1/jobs
pub async fn handle_create_job(
    State(state): State<AppState>,
    new_job: Result<Json<NewJob>, JsonRejection>,
) -> Result<Json<JobResponse>, AppError> {
    let Json(new_job) = new_job?;
    if let Some(field) = new_job.missing_field() {
        return Err(AppError::Validation(format!(
            "Missing required field: {field}"
        )));
    }

    let job = state.store.add_job(new_job).await?;
    info!("Job {} created", job.id);
    state.indexer.index_job(&job).await;

    Ok(Json(JobResponse {
        success: true,
        message: "Job created successfully".to_string(),
        job,
    }))
}

/// GET /api/v1/jobs/:id
pub async fn handle_get_job(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Job>, AppError> {
    state
        .store
        .get_job(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Job not found".to_string()))
}
