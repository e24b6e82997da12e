use crate::ChunkedUploadError;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::fs;
use tokio::task::JoinHandle;

/// Deletes staging directories of uploads that were abandoned.
///
/// A staging directory is abandoned once it was not modified for `max_age`.
/// The next chunk of such an upload is then rejected with
/// [ChunkedUploadError::UploadExpired].
#[derive(Debug, Clone)]
pub struct StagingSweep {
    staging_root: PathBuf,
    max_age: Duration,
}

impl StagingSweep {
    pub fn new(staging_root: impl AsRef<Path>, max_age: Duration) -> Self {
        Self { staging_root: staging_root.as_ref().to_path_buf(), max_age }
    }

    /// Sweep the staging root once, returning the number of directories
    /// deleted.
    pub async fn run_once(&self) -> Result<usize, ChunkedUploadError> {
        let now = SystemTime::now();
        let mut removed = 0;
        let mut entries = fs::read_dir(&self.staging_root).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_staging_dir = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.ends_with("_tmp"));
            if !is_staging_dir {
                continue;
            }

            match self.is_abandoned(&entry, now).await {
                Ok(false) => continue,
                Ok(true) => {}
                Err(err) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to inspect staging directory"
                    );
                    continue;
                }
            }

            match fs::remove_dir_all(&path).await {
                Ok(()) => {
                    tracing::info!(path = %path.display(), "deleted abandoned staging directory");
                    removed += 1;
                }
                Err(err) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to delete staging directory"
                    );
                }
            }
        }

        Ok(removed)
    }

    /// Run [StagingSweep::run_once] every `period` on a new task.
    pub fn spawn(self, period: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                if let Err(err) = self.run_once().await {
                    tracing::error!(error = %err, "staging sweep failed");
                }
            }
        })
    }

    async fn is_abandoned(&self, entry: &fs::DirEntry, now: SystemTime) -> std::io::Result<bool> {
        let metadata = entry.metadata().await?;
        if !metadata.is_dir() {
            return Ok(false);
        }
        // A modification time in the future counts as fresh.
        let age = now.duration_since(metadata.modified()?).unwrap_or_default();
        Ok(age > self.max_age)
    }
}
