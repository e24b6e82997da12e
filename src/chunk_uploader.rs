use crate::chunk_writer::drain;
use crate::{
    ChunkCompletion, ChunkOutcome, ChunkWriter, ChunkedUploadError, PostParams, UploadConfig,
    UploadIdentity,
};
use axum::extract::{DefaultBodyLimit, FromRequest, Multipart, Request};
use axum::http::HeaderMap;
use std::convert::Infallible;
use std::sync::Arc;
use tower::{service_fn, Layer, ServiceExt};

/// Room left above `max_chunk_size` for part headers, boundaries and text
/// fields.
const FRAMING_HEADROOM: u64 = 64 * 1024;

/// Receives the chunks of uploads sharing one staging root.
///
/// Holds no per-upload state: the progress of an upload is entirely derived
/// from the files in its staging directory, so the uploader can be cloned
/// freely and used as axum state.
///
/// ## Example
///
/// ```rust,no_run
/// use axum::extract::{Request, State};
/// use axum::http::StatusCode;
/// use axum::routing::post;
/// use axum::Router;
/// use axum_chunked_upload::{ChunkUploader, ChunkedUploadError, UploadConfig};
///
/// async fn upload(
///     State(uploader): State<ChunkUploader>,
///     request: Request,
/// ) -> Result<StatusCode, ChunkedUploadError> {
///     match uploader.handle(request).await? {
///         Some(assembler) => {
///             assembler.spawn();
///             Ok(StatusCode::CREATED)
///         }
///         None => Ok(StatusCode::NO_CONTENT),
///     }
/// }
///
/// let uploader = ChunkUploader::new(UploadConfig::default().with_staging_root("/tmp/uploads"));
/// let app: Router = Router::new().route("/upload", post(upload)).with_state(uploader);
/// ```
#[derive(Debug, Clone)]
pub struct ChunkUploader {
    config: Arc<UploadConfig>,
}

impl ChunkUploader {
    pub fn new(config: UploadConfig) -> Self {
        Self { config: Arc::new(config) }
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    /// Check the identifying headers and the declared upload size.
    ///
    /// Performs no I/O, so a request can be rejected before its body is read.
    pub fn validate(&self, headers: &HeaderMap) -> Result<UploadIdentity, ChunkedUploadError> {
        let identity = UploadIdentity::from_headers(headers)?;
        self.config.check_file_size(identity.total_chunks)?;
        Ok(identity)
    }

    /// Body limit matching `max_chunk_size`.
    ///
    /// [ChunkUploader::handle] applies it to every request, replacing any
    /// [DefaultBodyLimit] set on the router.
    pub fn body_limit(&self) -> DefaultBodyLimit {
        let limit = self.config.max_chunk_size.saturating_add(FRAMING_HEADROOM);
        DefaultBodyLimit::max(usize::try_from(limit).unwrap_or(usize::MAX))
    }

    /// Validate `request`, then store the chunk it carries.
    pub async fn handle(&self, request: Request) -> ChunkOutcome {
        let identity = self.validate(request.headers())?;
        let request = self.limit_body(request).await;
        let multipart = Multipart::from_request(request, &()).await?;
        self.receive(identity, multipart).await
    }

    /// Store the chunk carried by an already validated request.
    ///
    /// The first part with a file name is the chunk; any further file part is
    /// drained and ignored. Text fields are collected and attached to the
    /// [Assembler](crate::Assembler) returned for the last chunk of an upload.
    pub async fn receive(
        &self,
        identity: UploadIdentity,
        mut multipart: Multipart,
    ) -> ChunkOutcome {
        let writer = ChunkWriter::new(&self.config, identity);
        let (completer, completion) = ChunkCompletion::channel();
        let mut completer = Some(completer);
        let mut post_params = PostParams::new();
        let mut limit_exceeded = false;

        let decoded = async {
            while let Some(mut field) = multipart.next_field().await? {
                if field.file_name().is_some() {
                    match completer.take() {
                        Some(completer) => limit_exceeded |= writer.write(field, completer).await,
                        None => {
                            tracing::debug!("ignoring additional file part");
                            drain(&mut field).await;
                        }
                    }
                } else if let Some(name) = field.name().map(String::from) {
                    let value = field.text().await?;
                    post_params.insert(name, value);
                } else {
                    drain(&mut field).await;
                }
            }
            Ok::<_, ChunkedUploadError>(())
        }
        .await;

        // Without a file part the outcome resolves to `MissingChunk`.
        drop(completer);

        // Once the chunk is too large the body limit usually cuts the stream,
        // so decoder errors past that point are not reported.
        if limit_exceeded {
            let max_chunk_size = self.config.max_chunk_size;
            return Err(ChunkedUploadError::ChunkTooLarge { max_chunk_size });
        }
        decoded?;

        let assembler = completion.outcome().await?;
        Ok(assembler.map(|assembler| assembler.with_post_params(post_params)))
    }

    async fn limit_body(&self, request: Request) -> Request {
        let service = self
            .body_limit()
            .layer(service_fn(|request: Request| async move { Ok::<_, Infallible>(request) }));
        match service.oneshot(request).await {
            Ok(request) => request,
            Err(never) => match never {},
        }
    }
}
