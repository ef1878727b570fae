//! In-process vector index used when no hosted index is configured.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{IndexEntry, IndexFilter, IndexMatch, VectorIndex, VectorIndexError};

#[derive(Default)]
pub struct InMemoryVectorIndex {
    entries: RwLock<HashMap<String, IndexEntry>>,
}

impl InMemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    #[cfg(test)]
    pub async fn get(&self, external_id: &str) -> Option<IndexEntry> {
        self.entries.read().await.get(external_id).cloned()
    }
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn upsert(&self, entries: Vec<IndexEntry>) -> Result<(), VectorIndexError> {
        let mut map = self.entries.write().await;
        for entry in entries {
            map.insert(entry.external_id.to_string(), entry);
        }
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: IndexFilter,
    ) -> Result<Vec<IndexMatch>, VectorIndexError> {
        let map = self.entries.read().await;
        let mut matches = Vec::new();
        for (id, entry) in map.iter().filter(|(_, e)| filter.matches(e)) {
            if entry.values.len() != vector.len() {
                return Err(VectorIndexError::DimensionMismatch {
                    expected: entry.values.len(),
                    actual: vector.len(),
                });
            }
            matches.push(IndexMatch {
                external_id: id.clone(),
                score: cosine_similarity(vector, &entry.values),
            });
        }

        // Id as secondary key keeps output deterministic across HashMap orderings
        matches.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.external_id.cmp(&b.external_id))
        });
        matches.truncate(top_k);
        Ok(matches)
    }
}

/// Cosine similarity; 0.0 when either vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
