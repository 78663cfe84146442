//! Types for the Qdrant REST wire contract.

use magpie_core::{PointId, SparseVector};
use serde::{Deserialize, Serialize};

/// A point identifier as stored in the database.
///
/// Reads must tolerate both forms: healthy points carry UUID strings, while
/// data written by the defective predecessor can carry bare integers
/// (notably the `0` sentinel).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredPointId {
    Int(u64),
    Str(String),
}

impl StoredPointId {
    /// Whether this identifier is the historical `0` defect sentinel.
    pub fn is_zero_sentinel(&self) -> bool {
        matches!(self, StoredPointId::Int(0)) || matches!(self, StoredPointId::Str(s) if s == "0")
    }
}

impl std::fmt::Display for StoredPointId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoredPointId::Int(n) => write!(f, "{n}"),
            StoredPointId::Str(s) => write!(f, "{s}"),
        }
    }
}

impl From<PointId> for StoredPointId {
    fn from(id: PointId) -> Self {
        StoredPointId::Str(id.as_str().to_string())
    }
}

/// Payload stored alongside each point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointPayload {
    pub source: String,
    pub text: String,
}

/// Named vector data carried on a point: one dense and one sparse sub-vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedVectors {
    pub dense: Vec<f32>,
    pub sparse: SparseVector,
}

/// A point as written to the database. The identifier is always a freshly
/// generated [`PointId`]; there is no way to construct one with a caller
/// supplied or defaulted id.
#[derive(Debug, Clone, Serialize)]
pub struct PointStruct {
    pub id: PointId,
    pub vector: NamedVectors,
    pub payload: PointPayload,
}

impl PointStruct {
    pub fn new(dense: Vec<f32>, sparse: SparseVector, payload: PointPayload) -> Self {
        Self {
            id: PointId::generate(),
            vector: NamedVectors { dense, sparse },
            payload,
        }
    }
}

/// A point as read back from the database.
#[derive(Debug, Clone, Deserialize)]
pub struct PointRecord {
    pub id: StoredPointId,
    #[serde(default)]
    pub payload: Option<PointPayload>,
    #[serde(default)]
    pub vector: Option<serde_json::Value>,
}

/// A fused query hit.
#[derive(Debug, Clone, Deserialize)]
pub struct ScoredPoint {
    pub id: StoredPointId,
    pub score: f32,
    #[serde(default)]
    pub payload: Option<PointPayload>,
}
