// src/utils/artifact_config.rs
use log::info;
use std::env;
use std::path::{Path, PathBuf};

use crate::utils::env::env_or;

pub const DEFAULT_ARTIFACT_DIR: &str = "artifacts";
pub const DEFAULT_PREPROCESS_FILE: &str = "preprocess.json";
pub const DEFAULT_MODEL_FILE: &str = "weather_model.safetensors";
pub const DEFAULT_TOP_K: usize = 5;

/// Where the descriptor/classifier pair lives and how results are presented.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactConfig {
    pub artifact_dir: PathBuf,
    pub preprocess_file: String,
    pub model_file: String,
    pub preprocess_sha256: Option<String>,
    pub model_sha256: Option<String>,
    pub default_locale: String,
    pub top_k: usize,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            artifact_dir: PathBuf::from(DEFAULT_ARTIFACT_DIR),
            preprocess_file: DEFAULT_PREPROCESS_FILE.to_string(),
            model_file: DEFAULT_MODEL_FILE.to_string(),
            preprocess_sha256: None,
            model_sha256: None,
            default_locale: "en".to_string(),
            top_k: DEFAULT_TOP_K,
        }
    }
}

impl ArtifactConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            artifact_dir: env::var("WEATHER_ARTIFACT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.artifact_dir),
            preprocess_file: env::var("WEATHER_PREPROCESS_FILE")
                .unwrap_or(defaults.preprocess_file),
            model_file: env::var("WEATHER_MODEL_FILE").unwrap_or(defaults.model_file),
            preprocess_sha256: non_empty_var("WEATHER_PREPROCESS_SHA256"),
            model_sha256: non_empty_var("WEATHER_MODEL_SHA256"),
            default_locale: env::var("WEATHER_DEFAULT_LOCALE")
                .unwrap_or(defaults.default_locale),
            top_k: env_or("WEATHER_TOP_K", DEFAULT_TOP_K),
        }
    }

    /// Same configuration rooted at another artifact directory.
    pub fn with_artifact_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.artifact_dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn preprocess_path(&self) -> PathBuf {
        self.artifact_dir.join(&self.preprocess_file)
    }

    pub fn model_path(&self) -> PathBuf {
        self.artifact_dir.join(&self.model_file)
    }

    pub fn log_config(&self) {
        info!("🌦️ Weather classifier artifacts");
        info!("   Descriptor: {}", self.preprocess_path().display());
        info!("   Model: {}", self.model_path().display());
        if self.preprocess_sha256.is_some() || self.model_sha256.is_some() {
            info!("   Pinned digests: descriptor={}, model={}",
                self.preprocess_sha256.is_some(), self.model_sha256.is_some());
        }
        info!("   Default locale: {}, top-k: {}", self.default_locale, self.top_k);
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}
