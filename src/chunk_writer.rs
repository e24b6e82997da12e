use crate::{
    Assembler, ChunkCompleter, ChunkOutcome, ChunkedUploadError, StagingDir, UploadConfig,
    UploadIdentity,
};
use axum::extract::multipart::Field;
use std::path::PathBuf;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

/// Streams the bytes of one chunk into its staging directory.
///
/// The chunk is written window by window as the decoder yields it, so memory
/// use does not depend on the chunk size. Writing a chunk number again
/// overwrites the previous file, which is how a client retries a chunk.
#[derive(Debug, Clone)]
pub struct ChunkWriter {
    identity: UploadIdentity,
    staging_dir: StagingDir,
    output_path: PathBuf,
    max_chunk_size: u64,
}

impl ChunkWriter {
    pub fn new(config: &UploadConfig, identity: UploadIdentity) -> Self {
        let staging_path = config.staging_path(&identity.file_id);
        let staging_dir = StagingDir::new(&identity.file_id, staging_path);
        let output_path = config.output_path(&identity.file_id);
        Self { identity, staging_dir, output_path, max_chunk_size: config.max_chunk_size }
    }

    /// Write `field` to disk and store the outcome in `completer`.
    ///
    /// On failure the remaining bytes of the field are drained so the decoder
    /// can move on. Returns `true` when the field carried more than
    /// `max_chunk_size` bytes, whether or not the chunk was written; the
    /// stored outcome is then [ChunkedUploadError::ChunkTooLarge].
    pub async fn write(&self, mut field: Field<'_>, completer: ChunkCompleter) -> bool {
        let mut size_bytes = 0;
        let mut outcome = self.stream_to_disk(&mut field, &mut size_bytes).await;

        if let Err(err) = &outcome {
            tracing::warn!(
                file_id = %self.identity.file_id,
                chunk_number = self.identity.chunk_number,
                error = %err,
                "chunk rejected"
            );
            size_bytes += drain(&mut field).await;
        }

        let limit_exceeded = size_bytes > self.max_chunk_size;
        if limit_exceeded {
            let max_chunk_size = self.max_chunk_size;
            outcome = Err(ChunkedUploadError::ChunkTooLarge { max_chunk_size });
        }

        completer.complete(outcome);
        limit_exceeded
    }

    async fn stream_to_disk(&self, field: &mut Field<'_>, size_bytes: &mut u64) -> ChunkOutcome {
        let identity = &self.identity;

        if !identity.is_in_range() {
            return Err(ChunkedUploadError::ChunkOutOfRange {
                chunk_number: identity.chunk_number,
                total_chunks: identity.total_chunks,
            });
        }

        if identity.is_first() {
            self.staging_dir.ensure_exists().await?;
        } else {
            self.staging_dir.exists_or_expired().await?;
        }

        let chunk_path = self.staging_dir.chunk_path(identity.chunk_number);
        let mut file = File::create(&chunk_path).await?;

        while let Some(window) = field.chunk().await? {
            *size_bytes += window.len() as u64;
            if *size_bytes > self.max_chunk_size {
                drop(file);
                if let Err(err) = tokio::fs::remove_file(&chunk_path).await {
                    tracing::warn!(
                        path = %chunk_path.display(),
                        error = %err,
                        "failed to remove oversized chunk"
                    );
                }
                let max_chunk_size = self.max_chunk_size;
                return Err(ChunkedUploadError::ChunkTooLarge { max_chunk_size });
            }
            file.write_all(&window).await?;
        }

        file.flush().await?;
        file.sync_all().await?;

        tracing::debug!(
            file_id = %identity.file_id,
            chunk_number = identity.chunk_number,
            size_bytes = *size_bytes,
            "chunk stored"
        );

        if !identity.is_last() {
            return Ok(None);
        }

        tracing::info!(
            file_id = %identity.file_id,
            total_chunks = identity.total_chunks,
            "last chunk stored"
        );

        Ok(Some(Assembler::new(
            &identity.file_id,
            self.staging_dir.clone(),
            &self.output_path,
            identity.total_chunks,
        )))
    }
}

/// Consume whatever is left of `field` without storing it, returning the
/// number of bytes read.
///
/// A broken stream ends the drain early.
pub(crate) async fn drain(field: &mut Field<'_>) -> u64 {
    let mut size_bytes = 0;
    while let Ok(Some(window)) = field.chunk().await {
        size_bytes += window.len() as u64;
    }
    size_bytes
}
