use crate::ChunkedUploadError;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Per-upload directory holding one file per received chunk.
///
/// Chunk files are named after their chunk number in decimal form. The
/// directory itself is named after the upload's file id with a `_tmp`
/// suffix so a periodic sweep can recognise it, see
/// [StagingSweep](crate::StagingSweep).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingDir {
    file_id: String,
    path: PathBuf,
}

impl StagingDir {
    pub fn new(file_id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self { file_id: file_id.into(), path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn chunk_path(&self, chunk_number: u64) -> PathBuf {
        self.path.join(chunk_number.to_string())
    }

    /// Create the directory unless it is already there.
    ///
    /// `create_dir_all` treats an existing directory as success, so two
    /// requests racing to create the same directory both succeed.
    pub async fn ensure_exists(&self) -> Result<(), ChunkedUploadError> {
        fs::create_dir_all(&self.path).await?;
        Ok(())
    }

    /// Fail with [ChunkedUploadError::UploadExpired] when the directory is gone.
    pub async fn exists_or_expired(&self) -> Result<(), ChunkedUploadError> {
        match fs::metadata(&self.path).await {
            Ok(metadata) if metadata.is_dir() => Ok(()),
            Ok(_) => Err(self.expired()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Err(self.expired()),
            Err(err) => Err(err.into()),
        }
    }

    /// Delete every file in the directory, then the directory itself.
    ///
    /// Deletion is best-effort: every entry is attempted even when a previous
    /// one failed. The first failure is returned once the directory removal
    /// has been attempted as well.
    pub async fn purge(&self) -> Result<(), ChunkedUploadError> {
        let mut first_error: Option<io::Error> = None;
        let mut entries = fs::read_dir(&self.path).await?;

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(err) => {
                    tracing::warn!(
                        file_id = %self.file_id,
                        error = %err,
                        "failed to list staging directory"
                    );
                    first_error.get_or_insert(err);
                    break;
                }
            };

            if let Err(err) = fs::remove_file(entry.path()).await {
                tracing::warn!(
                    file_id = %self.file_id,
                    path = %entry.path().display(),
                    error = %err,
                    "failed to delete chunk file"
                );
                first_error.get_or_insert(err);
            }
        }

        if let Err(err) = fs::remove_dir(&self.path).await {
            tracing::warn!(
                file_id = %self.file_id,
                error = %err,
                "failed to delete staging directory"
            );
            first_error.get_or_insert(err);
        }

        match first_error {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }

    fn expired(&self) -> ChunkedUploadError {
        ChunkedUploadError::UploadExpired { file_id: self.file_id.clone() }
    }
}
