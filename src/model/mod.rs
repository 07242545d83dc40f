use axum::body::Bytes;
use serde::Serialize;

/// One file from an upload batch. Names are unique within a batch.
#[derive(Debug, Clone)]
pub struct UploadedDocument {
    pub name: String,
    pub bytes: Bytes,
}

impl UploadedDocument {
    pub fn new(name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }
}

/// Overlap between two documents of a batch, as a percentage in `[0, 100]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarityRecord {
    pub file1: String,
    pub file2: String,
    pub similarity: f64,
}
