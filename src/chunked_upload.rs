use crate::{Assembler, ChunkUploader, ChunkedUploadError};
use axum::async_trait;
use axum::extract::{FromRef, FromRequest, Request};

/// Used as an argument for [axum handlers](axum::handler::Handler).
///
/// Stores the chunk carried by the request using the [ChunkUploader] found
/// in the router state. Holds the deferred [Assembler] when the chunk was
/// the last one of its upload.
///
/// ## Example
///
/// ```rust,no_run
/// use axum::http::StatusCode;
/// use axum::routing::post;
/// use axum::Router;
/// use axum_chunked_upload::{ChunkUploader, ChunkedUpload, UploadConfig};
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
///
/// let uploader = ChunkUploader::new(UploadConfig::default());
/// let app: Router = Router::new().route("/upload", post(upload)).with_state(uploader);
/// ```
#[derive(Debug)]
pub struct ChunkedUpload(pub Option<Assembler>);

#[async_trait]
impl<S> FromRequest<S> for ChunkedUpload
where
    S: Send + Sync,
    ChunkUploader: FromRef<S>,
{
    type Rejection = ChunkedUploadError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let uploader = ChunkUploader::from_ref(state);
        let assembler = uploader.handle(req).await?;
        Ok(Self(assembler))
    }
}
