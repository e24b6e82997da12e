use axum::http::StatusCode;
use axum::routing::post;
use axum::Router;
use axum_chunked_upload::{ChunkUploader, ChunkedUpload, StagingSweep, UploadConfig};
use std::time::Duration;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

async fn upload(ChunkedUpload(assembler): ChunkedUpload) -> StatusCode {
    match assembler {
        // The response is sent right away, assembly runs in the background.
        Some(assembler) => {
            assembler.spawn();
            StatusCode::CREATED
        }
        None => StatusCode::NO_CONTENT,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // UPLOADER_STAGING_ROOT, UPLOADER_MAX_FILE_SIZE and UPLOADER_MAX_CHUNK_SIZE
    // override the defaults.
    let config = UploadConfig::from_env()?;
    tokio::fs::create_dir_all(&config.staging_root).await?;

    StagingSweep::new(&config.staging_root, Duration::from_secs(24 * 60 * 60))
        .spawn(Duration::from_secs(60 * 60));

    // The uploader caps each request body at the chunk limit on its own.
    let uploader = ChunkUploader::new(config);
    let router = Router::new().route("/upload", post(upload)).with_state(uploader);

    let listener = TcpListener::bind("127.0.0.1:3000").await?;
    tracing::info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, router).await?;

    Ok(())
}
