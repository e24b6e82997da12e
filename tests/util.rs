#![allow(dead_code)]

use axum::extract::FromRequest;
use axum_chunked_upload::{ChunkOutcome, ChunkUploader, ChunkedUpload, UploadConfig};
use axum_test_helper::MultipartForm;
use tempfile::TempDir;

pub fn create_uploader(root: &TempDir) -> ChunkUploader {
    let config = UploadConfig::default()
        .with_staging_root(root.path())
        .with_max_chunk_size(5)
        .with_max_file_size(40);
    ChunkUploader::new(config)
}

pub async fn send_form(
    uploader: &ChunkUploader,
    form: MultipartForm,
    file_id: &str,
    chunk_number: u64,
    total_chunks: u64,
) -> ChunkOutcome {
    let request = form.into_chunk_request(file_id, chunk_number, total_chunks);
    ChunkedUpload::from_request(request, uploader).await.map(|upload| upload.0)
}

pub async fn send_chunk(
    uploader: &ChunkUploader,
    file_id: &str,
    chunk_number: u64,
    total_chunks: u64,
    data: &[u8],
) -> ChunkOutcome {
    let form = MultipartForm::new().file("file", "blob", data);
    send_form(uploader, form, file_id, chunk_number, total_chunks).await
}

pub fn is_empty_dir(root: &TempDir) -> bool {
    std::fs::read_dir(root.path()).unwrap().next().is_none()
}
