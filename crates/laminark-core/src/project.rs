//! Stable per-project identifiers.

use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;

/// First 16 hex chars of SHA-256 over a canonicalized project path.
///
/// Every row in the store carries one of these; every read filters by it.
/// Constructing one always goes through [`ProjectHash::for_path`] so a raw
/// string can never masquerade as a hash elsewhere in the codebase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct ProjectHash(String);

impl ProjectHash {
    pub fn for_path(path: &Path) -> Self {
        let canonical = path
            .canonicalize()
            .unwrap_or_else(|_| path.to_path_buf());
        let digest = Sha256::digest(canonical.to_string_lossy().as_bytes());
        let hex = hex_encode(&digest);
        Self(hex[..16].to_string())
    }

    /// Construct from an already-computed 16-char hex string, e.g. when
    /// reading one back out of a database row. Does not re-derive it from a
    /// path, so it trusts the caller that the value came from the store.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        write!(s, "{:02x}", b).expect("writing to a String cannot fail");
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_path_same_hash() {
        let a = ProjectHash::for_path(Path::new("/tmp/does-not-exist-a"));
        let b = ProjectHash::for_path(Path::new("/tmp/does-not-exist-a"));
        assert_eq!(a, b);
    }

    #[test]
    fn different_paths_different_hash() {
        let a = ProjectHash::for_path(Path::new("/tmp/does-not-exist-a"));
        let b = ProjectHash::for_path(Path::new("/tmp/does-not-exist-b"));
        assert_ne!(a, b);
    }

    #[test]
    fn hash_is_16_lowercase_hex_chars() {
        let h = ProjectHash::for_path(Path::new("/tmp/does-not-exist-a"));
        assert_eq!(h.as_str().len(), 16);
        assert!(h.as_str().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }
}
