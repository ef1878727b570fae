//! Pinecone REST data-plane client.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::debug;

use super::{IndexEntry, IndexFilter, IndexMatch, VectorIndex, VectorIndexError};

/// Upserts are chunked; Pinecone caps request size.
const UPSERT_BATCH_SIZE: usize = 100;

#[derive(Clone)]
pub struct PineconeIndex {
    client: Client,
    host: String,
    api_key: String,
}

#[derive(Debug, Serialize)]
struct UpsertRequest<'a> {
    vectors: Vec<UpsertVector<'a>>,
}

#[derive(Debug, Serialize)]
struct UpsertVector<'a> {
    id: String,
    values: &'a [f32],
    metadata: &'a Map<String, Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Debug, Deserialize)]
struct QueryMatch {
    id: String,
    #[serde(default)]
    score: f32,
}

impl PineconeIndex {
    /// `host` is the index host, e.g. `https://candidate-index-abc123.svc.pinecone.io`.
    pub fn new(host: &str, api_key: String) -> Result<Self, VectorIndexError> {
        let host = if host.starts_with("http://") || host.starts_with("https://") {
            host.trim_end_matches('/').to_string()
        } else {
            format!("https://{}", host.trim_end_matches('/'))
        };
        Ok(Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()?,
            host,
            api_key,
        })
    }

    async fn post<T: Serialize>(&self, path: &str, body: &T) -> Result<reqwest::Response, VectorIndexError> {
        let response = self
            .client
            .post(format!("{}{}", self.host, path))
            .header("Api-Key", &self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(VectorIndexError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }
}

fn filter_json(filter: IndexFilter) -> Option<Value> {
    filter
        .kind
        .map(|kind| json!({ "type": { "$eq": kind.as_str() } }))
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    async fn upsert(&self, entries: Vec<IndexEntry>) -> Result<(), VectorIndexError> {
        for chunk in entries.chunks(UPSERT_BATCH_SIZE) {
            let request = UpsertRequest {
                vectors: chunk
                    .iter()
                    .map(|e| UpsertVector {
                        id: e.external_id.to_string(),
                        values: &e.values,
                        metadata: &e.metadata,
                    })
                    .collect(),
            };
            self.post("/vectors/upsert", &request).await?;
            debug!("Upserted {} vectors", chunk.len());
        }
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: IndexFilter,
    ) -> Result<Vec<IndexMatch>, VectorIndexError> {
        let request = QueryRequest {
            vector,
            top_k,
            include_metadata: true,
            filter: filter_json(filter),
        };
        let response: QueryResponse = self.post("/query", &request).await?.json().await?;

        let mut matches: Vec<IndexMatch> = response
            .matches
            .into_iter()
            .map(|m| IndexMatch {
                external_id: m.id,
                score: m.score,
            })
            .collect();
        matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        matches.truncate(top_k);
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector_index::{EntryKind, ExternalId};

    #[test]
    fn test_host_normalization() {
        let index = PineconeIndex::new("candidate-index.svc.pinecone.io/", "k".to_string()).unwrap();
        assert_eq!(index.host, "https://candidate-index.svc.pinecone.io");

        let index = PineconeIndex::new("http://localhost:5080", "k".to_string()).unwrap();
        assert_eq!(index.host, "http://localhost:5080");
    }

    #[test]
    fn test_query_request_wire_format() {
        let request = QueryRequest {
            vector: &[0.5, -0.5],
            top_k: 20,
            include_metadata: true,
            filter: filter_json(IndexFilter::kind(EntryKind::Candidate)),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["topK"], 20);
        assert_eq!(value["includeMetadata"], true);
        assert_eq!(value["filter"]["type"]["$eq"], "candidate");
    }

    #[test]
    fn test_upsert_vector_wire_format() {
        let entry = IndexEntry::new(ExternalId::candidate(3), vec![1.0]).with_field("name", "Ada");
        let vector = UpsertVector {
            id: entry.external_id.to_string(),
            values: &entry.values,
            metadata: &entry.metadata,
        };
        let value = serde_json::to_value(&vector).unwrap();
        assert_eq!(value["id"], "candidate_3");
        assert_eq!(value["metadata"]["type"], "candidate");
        assert_eq!(value["metadata"]["name"], "Ada");
    }

    #[test]
    fn test_query_response_tolerates_missing_matches() {
        let response: QueryResponse = serde_json::from_str(r#"{"namespace": ""}"#).unwrap();
        assert!(response.matches.is_empty());
    }
}
