use crate::analysis::Role;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Identity of a cached role result.
///
/// Any change to the candidate's content fingerprint, the role or the model
/// version yields a different digest, so stale entries simply stop matching.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub fingerprint: String,
    pub role: Role,
    pub model_version: String,
}

impl CacheKey {
    pub fn new(fingerprint: impl Into<String>, role: Role, model_version: impl Into<String>) -> Self {
        Self {
            fingerprint: fingerprint.into(),
            role,
            model_version: model_version.into(),
        }
    }

    /// SHA-256 hex of `fingerprint \n role \n model_version`
    pub fn digest(&self) -> String {
        let mut h = Sha256::new();
        h.update(self.fingerprint.as_bytes());
        h.update(b"\n");
        h.update(self.role.as_str().as_bytes());
        h.update(b"\n");
        h.update(self.model_version.as_bytes());
        hex::encode(h.finalize())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.fingerprint, self.role, self.model_version)
    }
}
