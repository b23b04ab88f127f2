// src/utils/fingerprint.rs
use log::info;
use sha2::{Digest, Sha256};
use std::path::Path;

use crate::errors::{WeatherError, WeatherResult};

/// Hex-encoded SHA-256 of an artifact file.
pub fn sha256_file(path: &Path) -> WeatherResult<String> {
    let bytes = std::fs::read(path).map_err(|e| {
        WeatherError::configuration(format!("Failed to read {}: {}", path.display(), e))
    })?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}

/// Fingerprints `path` and checks it against `expected` when one is pinned.
pub fn verify_artifact(path: &Path, expected: Option<&str>) -> WeatherResult<String> {
    let digest = sha256_file(path)?;
    info!("Artifact {} sha256={}", path.display(), digest);

    if let Some(expected) = expected {
        if !digest.eq_ignore_ascii_case(expected.trim()) {
            return Err(WeatherError::configuration(format!(
                "Artifact {} does not match pinned sha256 (expected {}, found {})",
                path.display(),
                expected.trim(),
                digest
            )));
        }
    }
    Ok(digest)
}
