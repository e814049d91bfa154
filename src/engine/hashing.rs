//! Record identifier hashing

use blake3::Hasher;
use std::hash::{DefaultHasher, Hash, Hasher as _};

use crate::error::TransformError;

/// Stable identifier for a remote path: blake3 of the UTF-8 path, hex encoded (64 chars).
///
/// Pure function of `full_path`; re-indexing the same path always upserts the same record.
pub fn unique_id(full_path: &str) -> Result<String, TransformError> {
    if full_path.is_empty() {
        return Err(TransformError::Identifier("empty path".to_string()));
    }
    let mut hasher = Hasher::new();
    hasher.update(full_path.as_bytes());
    Ok(hasher.finalize().to_hex().to_string())
}

/// Non-cryptographic fallback used when [`unique_id`] fails. 16 hex chars, so it never
/// collides with a regular identifier.
pub fn fallback_id(full_path: &str) -> String {
    let mut hasher = DefaultHasher::new();
    full_path.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}
