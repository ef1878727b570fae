// Candidate–job matching: evaluator, reranker, and the pipelines that compose
// them with the embedder and vector index.
// All model calls go through llm_client::LanguageModel.

pub mod evaluator;
pub mod handlers;
pub mod indexing;
pub mod lenient;
pub mod orchestrator;
pub mod profiles;
pub mod prompts;
pub mod reranker;

#[cfg(test)]
pub mod testing;
