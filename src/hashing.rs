//! SHA-256 content digests for attachments and whole documents.

use crate::{AnalysisError, Result};
use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of `data`. Always 64 characters.
pub fn digest(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Compute the digest on the blocking pool and hand the buffer back with it.
///
/// Ownership of `data` moves into the worker, so the caller gets it back
/// alongside the digest instead of cloning large attachments.
pub async fn digest_owned(data: Vec<u8>) -> Result<(Vec<u8>, String)> {
    tokio::task::spawn_blocking(move || {
        let hash = digest(&data);
        (data, hash)
    })
    .await
    .map_err(|e| AnalysisError::HashingError(e.to_string()))
}
