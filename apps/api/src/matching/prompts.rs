// All LLM prompt constants for the matching module.
// Reuses the JSON-only fragment from llm_client::prompts.

/// System prompt for single-candidate evaluation.
pub const EVALUATION_SYSTEM: &str =
    "You are an expert talent evaluator with years of experience in technical recruiting. \
    Assess candidates honestly and with nuance.";

/// Evaluation prompt template. Replace `{job_text}` and `{candidate_profile}` before sending.
pub const EVALUATION_PROMPT_TEMPLATE: &str = r#"JOB DESCRIPTION:
{job_text}

CANDIDATE PROFILE:
{candidate_profile}

Evaluate how well this candidate's skills, experience, and background match the requirements for this position.

Provide:

1. A score from 0-100 representing the overall match between the candidate and job (be realistic and nuanced)
2. A detailed feedback analysis (3-4 paragraphs) covering:
   - Key strengths relevant to this role
   - Areas where the candidate meets or exceeds expectations
   - Gaps or areas for improvement
   - Overall fit assessment
3. Specific recommendations (in bullet points) for:
   - Skills the candidate should develop to better fit the role
   - How the candidate could position themselves better for this type of role
   - Any other constructive suggestions

Return a JSON object with this EXACT schema:
{
  "score": 72,
  "feedback": "Detailed feedback analysis",
  "recommendations": "• First recommendation\n• Second recommendation"
}"#;

/// System prompt for batch reranking.
pub const RERANK_SYSTEM: &str =
    "You are an expert HR recruiter evaluating candidate resumes against job requirements.";

/// Requirements text used when the caller supplied none.
pub const DEFAULT_REQUIREMENTS: &str = "General skills and experience relevant to this role";

/// Reranking prompt template. Replace `{requirements}` and `{candidates}` before sending.
pub const RERANK_PROMPT_TEMPLATE: &str = r#"JOB REQUIREMENTS:
{requirements}

CANDIDATES:
{candidates}

Rank these candidates based on their match to the job requirements. For each candidate provide:
1. A match score from 0.0 to 1.0 (higher is better)
2. A brief explanation of why they match or don't match

Return a JSON object with this EXACT schema, one ranking per candidate, using the candidate ID given above:
{
  "rankings": [
    {"id": 1, "score": 0.95, "explanation": "Explanation text here"}
  ]
}"#;
