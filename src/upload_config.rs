use crate::ChunkedUploadError;
use anyhow::Context;
use std::path::{Path, PathBuf};
use ubyte::ByteUnit;

/// Environment variable read by [UploadConfig::from_env] for the staging root.
pub const STAGING_ROOT_VAR: &str = "UPLOADER_STAGING_ROOT";

/// Environment variable read by [UploadConfig::from_env] for the file limit.
pub const MAX_FILE_SIZE_VAR: &str = "UPLOADER_MAX_FILE_SIZE";

/// Environment variable read by [UploadConfig::from_env] for the chunk limit.
pub const MAX_CHUNK_SIZE_VAR: &str = "UPLOADER_MAX_CHUNK_SIZE";

/// Where chunks are staged and how large uploads may grow.
///
/// Both limits are expressed in bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadConfig {
    /// Directory holding the staging directories and the assembled files.
    pub staging_root: PathBuf,

    /// Upper bound for the declared size of a whole upload.
    pub max_file_size: u64,

    /// Upper bound for the size of a single chunk.
    pub max_chunk_size: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            staging_root: std::env::temp_dir().join("uploads"),
            max_file_size: ByteUnit::Gibibyte(1).as_u64(),
            max_chunk_size: ByteUnit::Mebibyte(10).as_u64(),
        }
    }
}

impl UploadConfig {
    pub fn with_staging_root(mut self, staging_root: impl AsRef<Path>) -> Self {
        self.staging_root = staging_root.as_ref().to_path_buf();
        self
    }

    pub fn with_max_file_size(mut self, max_file_size: u64) -> Self {
        self.max_file_size = max_file_size;
        self
    }

    pub fn with_max_chunk_size(mut self, max_chunk_size: u64) -> Self {
        self.max_chunk_size = max_chunk_size;
        self
    }

    /// Load the configuration from the `UPLOADER_*` environment variables.
    ///
    /// Unset variables keep their default value. Sizes accept byte units such
    /// as `"10MiB"` or `"500KB"` as well as a plain number of bytes.
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = Self::default();

        if let Ok(staging_root) = std::env::var(STAGING_ROOT_VAR) {
            config.staging_root = PathBuf::from(staging_root);
        }
        if let Ok(value) = std::env::var(MAX_FILE_SIZE_VAR) {
            config.max_file_size = parse_byte_size(&value).context(MAX_FILE_SIZE_VAR)?;
        }
        if let Ok(value) = std::env::var(MAX_CHUNK_SIZE_VAR) {
            config.max_chunk_size = parse_byte_size(&value).context(MAX_CHUNK_SIZE_VAR)?;
        }

        Ok(config)
    }

    /// Reject an upload whose declared size could exceed `max_file_size`.
    ///
    /// The declared size is the worst case of every chunk being
    /// `max_chunk_size` bytes long, so an upload whose last chunk is short can
    /// be rejected even though its real size would fit.
    pub fn check_file_size(&self, total_chunks: u64) -> Result<(), ChunkedUploadError> {
        if self.max_chunk_size.saturating_mul(total_chunks) > self.max_file_size {
            return Err(ChunkedUploadError::FileTooLarge { max_file_size: self.max_file_size });
        }
        Ok(())
    }

    pub(crate) fn staging_path(&self, file_id: &str) -> PathBuf {
        self.staging_root.join(format!("{file_id}_tmp"))
    }

    pub(crate) fn output_path(&self, file_id: &str) -> PathBuf {
        self.staging_root.join(file_id)
    }
}

/// Parse a byte size like `"1MiB"`, `"500 KB"` or `"1024"`.
pub fn parse_byte_size(value: &str) -> anyhow::Result<u64> {
    let unit = value.trim().parse::<ByteUnit>().map_err(|_| {
        anyhow::anyhow!("'{value}' is not a valid byte size (e.g. \"1MiB\", \"500KB\")")
    })?;
    Ok(unit.as_u64())
}
