use crate::ChunkedUploadError;
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;

/// Header carrying the identifier shared by every chunk of an upload.
pub const FILE_ID_HEADER: &str = "uploader-file-id";

/// Header carrying the zero-based position of the chunk in the request.
pub const CHUNK_NUMBER_HEADER: &str = "uploader-chunk-number";

/// Header carrying the number of chunks the file was split into.
pub const CHUNKS_TOTAL_HEADER: &str = "uploader-chunks-total";

/// Identifies which chunk of which upload a request carries.
///
/// Parsed from the `uploader-*` request headers, each of which must be a
/// non-empty string of decimal digits. The identity is not range checked:
/// a chunk number outside of `0..total_chunks` is rejected when the chunk is
/// written, see [ChunkWriter](crate::ChunkWriter).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadIdentity {
    pub file_id: String,
    pub chunk_number: u64,
    pub total_chunks: u64,
}

impl UploadIdentity {
    /// Validate the identifying headers without touching the request body.
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, ChunkedUploadError> {
        let file_id = digit_header(headers, FILE_ID_HEADER)?.to_string();
        let chunk_number = numeric_header(headers, CHUNK_NUMBER_HEADER)?;
        let total_chunks = numeric_header(headers, CHUNKS_TOTAL_HEADER)?;
        Ok(Self { file_id, chunk_number, total_chunks })
    }

    pub fn is_first(&self) -> bool {
        self.chunk_number == 0
    }

    pub fn is_last(&self) -> bool {
        self.total_chunks.checked_sub(1) == Some(self.chunk_number)
    }

    pub fn is_in_range(&self) -> bool {
        self.chunk_number < self.total_chunks
    }
}

fn digit_header<'a>(
    headers: &'a HeaderMap,
    header_name: &'static str,
) -> Result<&'a str, ChunkedUploadError> {
    headers
        .get(header_name)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()))
        .ok_or(ChunkedUploadError::MissingHeaders { header_name })
}

fn numeric_header(
    headers: &HeaderMap,
    header_name: &'static str,
) -> Result<u64, ChunkedUploadError> {
    // Digit strings too long for a u64 are treated as malformed.
    digit_header(headers, header_name)?
        .parse()
        .map_err(|_| ChunkedUploadError::MissingHeaders { header_name })
}

#[async_trait]
impl<S> FromRequestParts<S> for UploadIdentity
where
    S: Send + Sync,
{
    type Rejection = ChunkedUploadError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Self::from_headers(&parts.headers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(values: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in values {
            headers.insert(*name, HeaderValue::from_static(*value));
        }
        headers
    }

    fn assert_missing(result: Result<UploadIdentity, ChunkedUploadError>, wanted: &str) {
        match result {
            Err(ChunkedUploadError::MissingHeaders { header_name }) => {
                assert_eq!(header_name, wanted)
            }
            other => panic!("expected missing headers, got {other:?}"),
        }
    }

    #[test]
    fn test_valid_headers() {
        let identity = UploadIdentity::from_headers(&headers(&[
            (FILE_ID_HEADER, "42"),
            (CHUNK_NUMBER_HEADER, "2"),
            (CHUNKS_TOTAL_HEADER, "3"),
        ]))
        .unwrap();

        assert_eq!(identity.file_id, "42");
        assert_eq!(identity.chunk_number, 2);
        assert_eq!(identity.total_chunks, 3);
        assert!(identity.is_last());
        assert!(!identity.is_first());
        assert!(identity.is_in_range());
    }

    #[test]
    fn test_missing_file_id() {
        let result = UploadIdentity::from_headers(&headers(&[
            (CHUNK_NUMBER_HEADER, "0"),
            (CHUNKS_TOTAL_HEADER, "3"),
        ]));
        assert_missing(result, FILE_ID_HEADER);
    }

    #[test]
    fn test_missing_chunk_number() {
        let result = UploadIdentity::from_headers(&headers(&[
            (FILE_ID_HEADER, "42"),
            (CHUNKS_TOTAL_HEADER, "3"),
        ]));
        assert_missing(result, CHUNK_NUMBER_HEADER);
    }

    #[test]
    fn test_missing_chunks_total() {
        let result = UploadIdentity::from_headers(&headers(&[
            (FILE_ID_HEADER, "42"),
            (CHUNK_NUMBER_HEADER, "0"),
        ]));
        assert_missing(result, CHUNKS_TOTAL_HEADER);
    }

    #[test]
    fn test_non_digit_values() {
        for value in ["", "-1", "1.5", "abc", " 1", "0x10"] {
            let mut map = headers(&[(FILE_ID_HEADER, "42"), (CHUNKS_TOTAL_HEADER, "3")]);
            map.insert(CHUNK_NUMBER_HEADER, HeaderValue::from_str(value).unwrap());
            assert_missing(UploadIdentity::from_headers(&map), CHUNK_NUMBER_HEADER);
        }
    }

    #[test]
    fn test_non_digit_file_id() {
        let result = UploadIdentity::from_headers(&headers(&[
            (FILE_ID_HEADER, "../etc"),
            (CHUNK_NUMBER_HEADER, "0"),
            (CHUNKS_TOTAL_HEADER, "3"),
        ]));
        assert_missing(result, FILE_ID_HEADER);
    }

    #[test]
    fn test_overflowing_number() {
        let result = UploadIdentity::from_headers(&headers(&[
            (FILE_ID_HEADER, "42"),
            (CHUNK_NUMBER_HEADER, "0"),
            (CHUNKS_TOTAL_HEADER, "99999999999999999999999"),
        ]));
        assert_missing(result, CHUNKS_TOTAL_HEADER);
    }

    #[test]
    fn test_file_id_keeps_leading_zeros() {
        let identity = UploadIdentity::from_headers(&headers(&[
            (FILE_ID_HEADER, "0042"),
            (CHUNK_NUMBER_HEADER, "0"),
            (CHUNKS_TOTAL_HEADER, "1"),
        ]))
        .unwrap();
        assert_eq!(identity.file_id, "0042");
        assert!(identity.is_first() && identity.is_last());
    }

    #[test]
    fn test_zero_total_is_never_in_range() {
        let identity = UploadIdentity::from_headers(&headers(&[
            (FILE_ID_HEADER, "42"),
            (CHUNK_NUMBER_HEADER, "0"),
            (CHUNKS_TOTAL_HEADER, "0"),
        ]))
        .unwrap();
        assert!(!identity.is_in_range());
        assert!(!identity.is_last());
    }
}
