// src/graph/hash.rs

use std::fs::File;
use std::io::Read;
use std::path::Path;

use blake3::Hasher;

use crate::errors::Result;

/// Compute the content hash of a single file.
pub fn compute_file_hash(path: &Path) -> Result<String> {
    let mut hasher = Hasher::new();
    let mut file = File::open(path)?;
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().to_hex().to_string())
}

/// Hash of a structured value, used for virtual artifacts.
pub fn compute_value_hash(value: &serde_json::Value) -> String {
    let mut hasher = Hasher::new();
    hasher.update(value.to_string().as_bytes());
    hasher.finalize().to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_hash_tracks_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, "one").unwrap();
        let first = compute_file_hash(&path).unwrap();
        std::fs::write(&path, "two").unwrap();
        assert_ne!(first, compute_file_hash(&path).unwrap());
    }

    #[test]
    fn value_hash_is_stable() {
        let v = serde_json::json!({ "a": [1, 2], "b": null });
        assert_eq!(compute_value_hash(&v), compute_value_hash(&v.clone()));
    }
}
