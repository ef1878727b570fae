//! Vector Index Client — append-only upsert and filtered top-K similarity query.
//!
//! Errors are surfaced to the caller; deciding whether to degrade is the
//! orchestrator's job.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub mod memory;
pub mod pinecone;

pub use memory::InMemoryVectorIndex;
pub use pinecone::PineconeIndex;

#[derive(Debug, Error)]
pub enum VectorIndexError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("vector has {actual} dimensions, index expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// What an index entry describes. Stored as metadata `type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Job,
    Candidate,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Job => "job",
            EntryKind::Candidate => "candidate",
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// External id of the form `"<kind>_<id>"`. One per (kind, id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExternalId {
    pub kind: EntryKind,
    pub id: i64,
}

impl ExternalId {
    pub fn candidate(id: i64) -> Self {
        Self {
            kind: EntryKind::Candidate,
            id,
        }
    }

    pub fn job(id: i64) -> Self {
        Self {
            kind: EntryKind::Job,
            id,
        }
    }
}

impl fmt::Display for ExternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.kind, self.id)
    }
}

impl FromStr for ExternalId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, id) = s
            .split_once('_')
            .ok_or_else(|| format!("malformed external id '{s}'"))?;
        let kind = match kind {
            "job" => EntryKind::Job,
            "candidate" => EntryKind::Candidate,
            other => return Err(format!("unknown entry kind '{other}'")),
        };
        let id = id
            .parse::<i64>()
            .map_err(|_| format!("malformed numeric id in '{s}'"))?;
        Ok(Self { kind, id })
    }
}

/// A vector plus metadata. `metadata` always carries `type`; other fields are
/// denormalized copies of the record for display and filtering.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub external_id: ExternalId,
    pub values: Vec<f32>,
    pub metadata: Map<String, Value>,
}

impl IndexEntry {
    pub fn new(external_id: ExternalId, values: Vec<f32>) -> Self {
        let mut metadata = Map::new();
        metadata.insert(
            "type".to_string(),
            Value::String(external_id.kind.as_str().to_string()),
        );
        Self {
            external_id,
            values,
            metadata,
        }
    }

    pub fn with_field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn kind(&self) -> EntryKind {
        self.external_id.kind
    }
}

/// Metadata predicate for queries.
#[derive(Debug, Clone, Copy, Default)]
pub struct IndexFilter {
    pub kind: Option<EntryKind>,
}

impl IndexFilter {
    pub fn kind(kind: EntryKind) -> Self {
        Self { kind: Some(kind) }
    }

    pub fn matches(&self, entry: &IndexEntry) -> bool {
        self.kind.map_or(true, |k| k == entry.kind())
    }
}

/// One query hit, highest similarity first in query output.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexMatch {
    pub external_id: String,
    pub score: f32,
}

impl IndexMatch {
    /// Parses the external id, returning `None` for foreign or malformed ids.
    pub fn parsed_id(&self) -> Option<ExternalId> {
        self.external_id.parse().ok()
    }
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Idempotent by external id; last write wins.
    async fn upsert(&self, entries: Vec<IndexEntry>) -> Result<(), VectorIndexError>;

    /// Up to `top_k` matches passing `filter`, ordered by descending similarity.
    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: IndexFilter,
    ) -> Result<Vec<IndexMatch>, VectorIndexError>;
}
