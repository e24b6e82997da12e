use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;

/// Error type for every step of a chunked upload.
///
/// The error is cheap to clone: sources that are not [Clone] themselves are
/// kept behind an [Arc] so the outcome of a chunk write can be observed more
/// than once (see [ChunkCompletion](crate::ChunkCompletion)).
#[derive(thiserror::Error, Debug, Clone)]
pub enum ChunkedUploadError {
    #[error("header '{header_name}' is missing or malformed")]
    MissingHeaders { header_name: &'static str },

    #[error("file is larger than {max_file_size} bytes")]
    FileTooLarge { max_file_size: u64 },

    #[error("chunk is larger than {max_chunk_size} bytes")]
    ChunkTooLarge { max_chunk_size: u64 },

    #[error("chunk {chunk_number} is out of range for {total_chunks} chunks")]
    ChunkOutOfRange { chunk_number: u64, total_chunks: u64 },

    #[error("upload '{file_id}' has expired")]
    UploadExpired { file_id: String },

    #[error("request does not contain a chunk")]
    MissingChunk,

    #[error("request is malformed ({})", .source.body_text())]
    InvalidRequest { source: Arc<MultipartRejection> },

    #[error("request body is malformed ({})", .source.body_text())]
    InvalidRequestBody { source: Arc<MultipartError> },

    #[error(transparent)]
    Io { source: Arc<std::io::Error> },
}

impl ChunkedUploadError {
    fn get_status(&self) -> StatusCode {
        match self {
            | Self::MissingHeaders { .. }
            | Self::ChunkOutOfRange { .. }
            | Self::MissingChunk => StatusCode::BAD_REQUEST,
            | Self::FileTooLarge { .. } | Self::ChunkTooLarge { .. } => {
                StatusCode::PAYLOAD_TOO_LARGE
            }
            | Self::UploadExpired { .. } => StatusCode::GONE,
            | Self::InvalidRequest { source } => source.status(),
            | Self::InvalidRequestBody { source } => source.status(),
            | Self::Io { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<MultipartRejection> for ChunkedUploadError {
    fn from(source: MultipartRejection) -> Self {
        Self::InvalidRequest { source: Arc::new(source) }
    }
}

impl From<MultipartError> for ChunkedUploadError {
    fn from(source: MultipartError) -> Self {
        Self::InvalidRequestBody { source: Arc::new(source) }
    }
}

impl From<std::io::Error> for ChunkedUploadError {
    fn from(source: std::io::Error) -> Self {
        Self::Io { source: Arc::new(source) }
    }
}

impl IntoResponse for ChunkedUploadError {
    fn into_response(self) -> Response {
        (self.get_status(), self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_missing_headers() {
        let error = ChunkedUploadError::MissingHeaders { header_name: "uploader-file-id" };
        assert_eq!(error.get_status(), StatusCode::BAD_REQUEST);
        assert_eq!(error.to_string(), "header 'uploader-file-id' is missing or malformed");
    }

    #[test]
    fn test_file_too_large() {
        let error = ChunkedUploadError::FileTooLarge { max_file_size: 40 };
        assert_eq!(error.get_status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(error.to_string(), "file is larger than 40 bytes");
    }

    #[test]
    fn test_chunk_too_large() {
        let error = ChunkedUploadError::ChunkTooLarge { max_chunk_size: 5 };
        assert_eq!(error.get_status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(error.to_string(), "chunk is larger than 5 bytes");
    }

    #[test]
    fn test_chunk_out_of_range() {
        let error = ChunkedUploadError::ChunkOutOfRange { chunk_number: 3, total_chunks: 3 };
        assert_eq!(error.get_status(), StatusCode::BAD_REQUEST);
        assert_eq!(error.to_string(), "chunk 3 is out of range for 3 chunks");
    }

    #[test]
    fn test_upload_expired() {
        let error = ChunkedUploadError::UploadExpired { file_id: "42".to_string() };
        assert_eq!(error.get_status(), StatusCode::GONE);
        assert_eq!(error.to_string(), "upload '42' has expired");
    }

    #[test]
    fn test_missing_chunk() {
        let error = ChunkedUploadError::MissingChunk;
        assert_eq!(error.get_status(), StatusCode::BAD_REQUEST);
        assert_eq!(error.to_string(), "request does not contain a chunk");
    }

    #[test]
    fn test_io() {
        let error = ChunkedUploadError::from(io::Error::new(io::ErrorKind::Other, "disk full"));
        assert_eq!(error.get_status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error.to_string(), "disk full");
    }

    #[test]
    fn test_clone_shares_source() {
        let error = ChunkedUploadError::from(io::Error::new(io::ErrorKind::NotFound, "gone"));
        let cloned = error.clone();
        match (error, cloned) {
            (ChunkedUploadError::Io { source: a }, ChunkedUploadError::Io { source: b }) => {
                assert!(Arc::ptr_eq(&a, &b));
            }
            _ => panic!("expected io errors"),
        }
    }
}
