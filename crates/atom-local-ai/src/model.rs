//! Model download and management.

use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::LocalAIError;
use crate::paths::models_dir;
use crate::{DEFAULT_MODEL_FILENAME, DEFAULT_MODEL_NAME};

/// Model registry entry.
#[derive(Debug, Clone)]
pub struct ModelInfo {
    /// Display name of the model.
    pub name: String,
    /// Filename on disk.
    pub filename: String,
    /// Download URL.
    pub url: String,
    /// Expected SHA256 checksum (optional).
    pub sha256: Option<String>,
    /// Size in bytes (for progress display).
    pub size_bytes: Option<u64>,
}

/// Manager for downloading and managing models.
pub struct ModelManager {
    client: reqwest::Client,
    dir: PathBuf,
}

impl ModelManager {
    /// Create a model manager over the default models directory.
    pub fn new() -> Self {
        Self::with_dir(models_dir())
    }

    /// Create a model manager over a specific directory.
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            client: reqwest::Client::new(),
            dir: dir.into(),
        }
    }

    /// Directory holding the GGUF files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Get the default chat model info.
    pub fn default_model() -> ModelInfo {
        ModelInfo {
            name: DEFAULT_MODEL_NAME.to_string(),
            filename: DEFAULT_MODEL_FILENAME.to_string(),
            url: format!(
                "https://huggingface.co/TheBloke/TinyLlama-1.1B-Chat-v1.0-GGUF/resolve/main/{}",
                DEFAULT_MODEL_FILENAME
            ),
            sha256: None,
            size_bytes: None,
        }
    }

    /// List all installed models.
    pub fn list_installed(&self) -> Result<Vec<String>, LocalAIError> {
        if !self.dir.exists() {
            return Ok(vec![]);
        }

        let mut models: Vec<String> = fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok())
            .filter(|entry| {
                entry
                    .path()
                    .extension()
                    .map(|ext| ext == "gguf")
                    .unwrap_or(false)
            })
            .filter_map(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .map(|s| s.trim_end_matches(".gguf").to_string())
            })
            .collect();
        models.sort();

        Ok(models)
    }

    /// Path a model file would have in this manager's directory.
    pub fn model_path(&self, filename: &str) -> PathBuf {
        self.dir.join(filename)
    }

    /// Check if a model is installed.
    pub fn is_installed(&self, filename: &str) -> bool {
        self.model_path(filename).exists()
    }

    /// Get the path to an installed model.
    pub fn get_model_path(&self, filename: &str) -> Option<PathBuf> {
        let path = self.model_path(filename);
        if path.exists() {
            Some(path)
        } else {
            None
        }
    }

    /// Download a model from URL.
    pub async fn download(&self, model: &ModelInfo) -> Result<PathBuf, LocalAIError> {
        fs::create_dir_all(&self.dir)?;

        let dest_path = self.model_path(&model.filename);

        info!("Downloading model '{}' to {:?}", model.name, dest_path);

        let response = self
            .client
            .get(&model.url)
            .send()
            .await
            .map_err(|e| LocalAIError::DownloadFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(LocalAIError::DownloadFailed(format!(
                "HTTP {}: {}",
                response.status(),
                model.url
            )));
        }

        let total_size = response.content_length().or(model.size_bytes);

        let pb = if let Some(size) = total_size {
            let pb = ProgressBar::new(size);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("#>-"),
            );
            pb
        } else {
            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner:.green} [{elapsed_precise}] {bytes} downloaded")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            pb
        };

        let mut file = File::create(&dest_path)?;
        let mut hasher = Sha256::new();
        let mut stream = response.bytes_stream();
        let mut downloaded: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| LocalAIError::DownloadFailed(e.to_string()))?;
            file.write_all(&chunk)?;
            hasher.update(&chunk);
            downloaded += chunk.len() as u64;
            pb.set_position(downloaded);
        }

        pb.finish_with_message("Download complete");

        if let Some(expected) = &model.sha256 {
            let actual = hex::encode(hasher.finalize());
            if actual != *expected {
                let _ = fs::remove_file(&dest_path);
                return Err(LocalAIError::ChecksumMismatch {
                    expected: expected.clone(),
                    actual,
                });
            }
            debug!("Checksum verified: {}", actual);
        }

        info!("Model '{}' downloaded successfully", model.name);
        Ok(dest_path)
    }

    /// Install a model from a local file path.
    pub fn install_from_path(&self, source: &Path) -> Result<PathBuf, LocalAIError> {
        fs::create_dir_all(&self.dir)?;

        let filename = source
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| LocalAIError::ModelNotFound("Invalid path".to_string()))?;

        let dest_path = self.model_path(filename);

        if source == dest_path {
            return Ok(dest_path);
        }

        info!("Installing model from {:?} to {:?}", source, dest_path);
        fs::copy(source, &dest_path)?;

        Ok(dest_path)
    }

    /// Remove an installed model.
    pub fn remove(&self, filename: &str) -> Result<(), LocalAIError> {
        let path = self.model_path(filename);
        if path.exists() {
            fs::remove_file(&path)?;
            info!("Removed model: {}", filename);
        }
        Ok(())
    }
}

impl Default for ModelManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_model_info() {
        let model = ModelManager::default_model();
        assert_eq!(model.name, DEFAULT_MODEL_NAME);
        assert_eq!(model.filename, DEFAULT_MODEL_FILENAME);
        assert!(model.url.ends_with(DEFAULT_MODEL_FILENAME));
    }

    #[test]
    fn test_list_installed_only_reports_gguf() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("b.gguf"), b"x").unwrap();
        fs::write(dir.path().join("a.gguf"), b"x").unwrap();
        fs::write(dir.path().join("notes.txt"), b"x").unwrap();

        let manager = ModelManager::with_dir(dir.path());
        assert_eq!(manager.list_installed().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_missing_dir_lists_nothing() {
        let dir = tempdir().unwrap();
        let manager = ModelManager::with_dir(dir.path().join("nope"));
        assert!(manager.list_installed().unwrap().is_empty());
        assert!(manager.get_model_path(DEFAULT_MODEL_FILENAME).is_none());
    }

    #[test]
    fn test_install_and_remove() {
        let src = tempdir().unwrap();
        let models = tempdir().unwrap();
        let source = src.path().join("custom.gguf");
        fs::write(&source, b"weights").unwrap();

        let manager = ModelManager::with_dir(models.path());
        let dest = manager.install_from_path(&source).unwrap();
        assert_eq!(dest, models.path().join("custom.gguf"));
        assert!(manager.is_installed("custom.gguf"));

        manager.remove("custom.gguf").unwrap();
        assert!(!manager.is_installed("custom.gguf"));
    }
}
