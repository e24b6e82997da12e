mod assembler;
mod chunk_completion;
mod chunk_uploader;
mod chunk_writer;
mod chunked_upload;
mod chunked_upload_error;
mod staging_dir;
mod staging_sweep;
mod upload_config;
mod upload_identity;

pub use assembler::{AssembledFile, Assembler, PostParams};
pub use chunk_completion::{ChunkCompleter, ChunkCompletion, ChunkOutcome};
pub use chunk_uploader::ChunkUploader;
pub use chunk_writer::ChunkWriter;
pub use chunked_upload::ChunkedUpload;
pub use chunked_upload_error::ChunkedUploadError;
pub use staging_dir::StagingDir;
pub use staging_sweep::StagingSweep;
pub use upload_config::{
    parse_byte_size, UploadConfig, MAX_CHUNK_SIZE_VAR, MAX_FILE_SIZE_VAR, STAGING_ROOT_VAR,
};
pub use upload_identity::{
    UploadIdentity, CHUNKS_TOTAL_HEADER, CHUNK_NUMBER_HEADER, FILE_ID_HEADER,
};
