use std::sync::Arc;

use crate::cache::EvaluationCache;
use crate::matching::indexing::Indexer;
use crate::matching::orchestrator::Matcher;
use crate::records::documents::DocumentStore;
use crate::records::RecordStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RecordStore>,
    /// Resume PDFs in S3 / MinIO.
    pub documents: DocumentStore,
    pub cache: EvaluationCache,
    pub matcher: Arc<Matcher>,
    /// Keeps the vector index in step with candidate and job writes.
    pub indexer: Indexer,
}
