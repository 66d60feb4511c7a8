use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strict_path::PathBoundary;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_models::error::AppError;

const MAX_NAME_LEN: usize = 100;

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Unknown upload category: {0}")]
    InvalidCategory(String),

    #[error("Uploaded file is empty")]
    EmptyFile,

    #[error("Path rejected: {0}")]
    Path(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<UploadError> for AppError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::InvalidCategory(_) | UploadError::EmptyFile | UploadError::Path(_) => {
                AppError::ValidationError(err.to_string())
            }
            UploadError::Io(e) if e.kind() == std::io::ErrorKind::NotFound => {
                AppError::NotFound("Stored file not found".to_string())
            }
            UploadError::Io(e) => AppError::Internal(e.to_string()),
        }
    }
}

/// Metadata of a file kept under `<uploads>/<category>/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredFile {
    pub original_name: String,
    pub category: String,
    pub stored_name: String,
    pub url: String,
    pub content_type: Option<String>,
    pub size_bytes: u64,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct UploadStore {
    root: PathBuf,
}

impl UploadStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    pub async fn save(
        &self,
        category: &str,
        original_name: &str,
        content_type: Option<String>,
        bytes: Vec<u8>,
    ) -> Result<StoredFile, UploadError> {
        validate_category(category)?;
        if bytes.is_empty() {
            return Err(UploadError::EmptyFile);
        }

        let stored_name = format!("{}-{}", Uuid::new_v4(), sanitize_file_name(original_name));
        let dir = self.root.join(category);
        let name = stored_name.clone();
        let size_bytes = bytes.len() as u64;

        tokio::task::spawn_blocking(move || -> Result<(), UploadError> {
            let boundary = PathBoundary::<()>::try_new_create(&dir)
                .map_err(|e| UploadError::Path(e.to_string()))?;
            let target = boundary
                .strict_join(&name)
                .map_err(|e| UploadError::Path(e.to_string()))?;
            target.write(&bytes)?;
            Ok(())
        })
        .await
        .map_err(|e| UploadError::Io(std::io::Error::other(e)))??;

        debug!("Stored upload {}/{} ({} bytes)", category, stored_name, size_bytes);

        Ok(StoredFile {
            original_name: original_name.to_string(),
            category: category.to_string(),
            url: format!("/uploads/{}/{}", category, stored_name),
            stored_name,
            content_type,
            size_bytes,
            uploaded_at: Utc::now(),
        })
    }

    pub async fn read(&self, file: &StoredFile) -> Result<Vec<u8>, UploadError> {
        validate_category(&file.category)?;
        let dir = self.root.join(&file.category);
        let name = file.stored_name.clone();

        tokio::task::spawn_blocking(move || -> Result<Vec<u8>, UploadError> {
            let boundary = PathBoundary::<()>::try_new_create(&dir)
                .map_err(|e| UploadError::Path(e.to_string()))?;
            let target = boundary
                .strict_join(&name)
                .map_err(|e| UploadError::Path(e.to_string()))?;
            Ok(target.read()?)
        })
        .await
        .map_err(|e| UploadError::Io(std::io::Error::other(e)))?
    }

    /// Removes the file; a file that is already gone is not an error.
    pub async fn remove(&self, file: &StoredFile) -> Result<(), UploadError> {
        validate_category(&file.category)?;
        let dir = self.root.join(&file.category);
        let name = file.stored_name.clone();

        tokio::task::spawn_blocking(move || -> Result<(), UploadError> {
            let boundary = PathBoundary::<()>::try_new_create(&dir)
                .map_err(|e| UploadError::Path(e.to_string()))?;
            let target = boundary
                .strict_join(&name)
                .map_err(|e| UploadError::Path(e.to_string()))?;
            match target.remove_file() {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    warn!("Upload {} already removed", name);
                    Ok(())
                }
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(|e| UploadError::Io(std::io::Error::other(e)))?
    }
}

fn validate_category(category: &str) -> Result<(), UploadError> {
    let valid = !category.is_empty()
        && category.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(UploadError::InvalidCategory(category.to_string()))
    }
}

/// Keeps the base name of a client-supplied file name, restricted to a safe alphabet.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');

    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned.chars().take(MAX_NAME_LEN).collect()
    }
}
