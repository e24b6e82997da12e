use crate::{ChunkedUploadError, StagingDir};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::task::JoinHandle;

/// Text fields sent along with a chunk, keyed by field name.
pub type PostParams = HashMap<String, String>;

/// Result of a successful assembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledFile {
    /// Location of the reassembled file, owned by the caller from now on.
    pub file_path: PathBuf,

    /// Text fields received with the chunk that completed the upload.
    pub post_params: PostParams,
}

/// Deferred action concatenating the staged chunks of a complete upload.
///
/// Handed out for the last chunk of an upload and never run implicitly: the
/// response for the chunk can be sent right away while assembly runs
/// separately, either awaited through [Assembler::assemble] or in the
/// background through [Assembler::spawn].
///
/// ## Example
///
/// ```rust,no_run
/// use axum::http::StatusCode;
/// use axum_chunked_upload::ChunkedUpload;
///
/// async fn upload(ChunkedUpload(assembler): ChunkedUpload) -> StatusCode {
///     match assembler {
///         Some(assembler) => {
///             assembler.spawn();
///             StatusCode::CREATED
///         }
///         None => StatusCode::NO_CONTENT,
///     }
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Assembler {
    file_id: String,
    staging_dir: StagingDir,
    output_path: PathBuf,
    total_chunks: u64,
    post_params: PostParams,
}

impl Assembler {
    pub fn new(
        file_id: impl Into<String>,
        staging_dir: StagingDir,
        output_path: impl Into<PathBuf>,
        total_chunks: u64,
    ) -> Self {
        Self {
            file_id: file_id.into(),
            staging_dir,
            output_path: output_path.into(),
            total_chunks,
            post_params: PostParams::new(),
        }
    }

    pub fn with_post_params(mut self, post_params: PostParams) -> Self {
        self.post_params = post_params;
        self
    }

    pub fn file_id(&self) -> &str {
        &self.file_id
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    pub fn post_params(&self) -> &PostParams {
        &self.post_params
    }

    /// Append every chunk to the output file in ascending order, then purge
    /// the staging directory.
    ///
    /// A failure while appending leaves the partial output and the staging
    /// directory untouched. Running the assembler again once it succeeded
    /// fails with [ChunkedUploadError::UploadExpired] since the chunks are
    /// gone, and leaves the assembled file alone.
    pub async fn assemble(&self) -> Result<AssembledFile, ChunkedUploadError> {
        tracing::info!(
            file_id = %self.file_id,
            total_chunks = self.total_chunks,
            "assembling chunks"
        );

        self.staging_dir.exists_or_expired().await?;
        let mut output = File::create(&self.output_path).await?;
        let mut size_bytes = 0;

        for chunk_number in 0..self.total_chunks {
            let mut chunk = File::open(self.staging_dir.chunk_path(chunk_number)).await?;
            size_bytes += tokio::io::copy(&mut chunk, &mut output).await?;
            output.flush().await?;
        }

        output.sync_all().await?;
        drop(output);

        self.staging_dir.purge().await?;

        tracing::info!(
            file_id = %self.file_id,
            size_bytes,
            path = %self.output_path.display(),
            "assembly complete"
        );

        Ok(AssembledFile {
            file_path: self.output_path.clone(),
            post_params: self.post_params.clone(),
        })
    }

    /// Run [Assembler::assemble] on a new task.
    ///
    /// Failures are logged; await the handle to observe them as well.
    pub fn spawn(self) -> JoinHandle<Result<AssembledFile, ChunkedUploadError>> {
        tokio::spawn(async move {
            let result = self.assemble().await;
            if let Err(err) = &result {
                tracing::error!(file_id = %self.file_id, error = %err, "assembly failed");
            }
            result
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn stage(root: &TempDir, chunks: &[&[u8]]) -> Assembler {
        let staging_dir = StagingDir::new("42", root.path().join("42_tmp"));
        staging_dir.ensure_exists().await.unwrap();
        for (n, data) in chunks.iter().enumerate() {
            tokio::fs::write(staging_dir.chunk_path(n as u64), data).await.unwrap();
        }
        Assembler::new("42", staging_dir, root.path().join("42"), chunks.len() as u64)
    }

    #[tokio::test]
    async fn test_assemble_in_order() {
        let root = TempDir::new().unwrap();
        let assembler = stage(&root, &[b"AA", b"BB", b"CC"]).await;

        let assembled = assembler.assemble().await.unwrap();

        assert_eq!(assembled.file_path, root.path().join("42"));
        assert_eq!(tokio::fs::read(&assembled.file_path).await.unwrap(), b"AABBCC");
        assert!(!root.path().join("42_tmp").exists());
    }

    #[tokio::test]
    async fn test_assemble_orders_numerically() {
        let root = TempDir::new().unwrap();
        let chunks: Vec<Vec<u8>> = (0..12u8).map(|n| vec![b'a' + n]).collect();
        let chunks: Vec<&[u8]> = chunks.iter().map(Vec::as_slice).collect();
        let assembler = stage(&root, &chunks).await;

        let assembled = assembler.assemble().await.unwrap();

        // Lexical ordering would put "10" and "11" right after "1".
        assert_eq!(tokio::fs::read(&assembled.file_path).await.unwrap(), b"abcdefghijkl");
    }

    #[tokio::test]
    async fn test_assemble_twice_fails() {
        let root = TempDir::new().unwrap();
        let assembler = stage(&root, &[b"AA"]).await;

        let assembled = assembler.assemble().await.unwrap();
        let error = assembler.assemble().await.unwrap_err();

        assert!(matches!(error, ChunkedUploadError::UploadExpired { .. }));
        assert_eq!(tokio::fs::read(&assembled.file_path).await.unwrap(), b"AA");
    }

    #[tokio::test]
    async fn test_missing_chunk_leaves_staging_in_place() {
        let root = TempDir::new().unwrap();
        let assembler = stage(&root, &[b"AA", b"BB", b"CC"]).await;
        tokio::fs::remove_file(root.path().join("42_tmp").join("1")).await.unwrap();

        let error = assembler.assemble().await.unwrap_err();

        assert!(matches!(error, ChunkedUploadError::Io { .. }));
        assert_eq!(tokio::fs::read(root.path().join("42")).await.unwrap(), b"AA");
        assert!(root.path().join("42_tmp").join("0").exists());
        assert!(root.path().join("42_tmp").join("2").exists());
    }

    #[tokio::test]
    async fn test_post_params() {
        let root = TempDir::new().unwrap();
        let post_params = PostParams::from([("name".to_string(), "Mr Smith".to_string())]);
        let assembler = stage(&root, &[b"AA"]).await.with_post_params(post_params.clone());

        let assembled = assembler.assemble().await.unwrap();

        assert_eq!(assembled.post_params, post_params);
    }

    #[tokio::test]
    async fn test_spawn() {
        let root = TempDir::new().unwrap();
        let assembler = stage(&root, &[b"AA", b"BB"]).await;

        let assembled = assembler.spawn().await.unwrap().unwrap();

        assert_eq!(tokio::fs::read(&assembled.file_path).await.unwrap(), b"AABB");
    }
}
