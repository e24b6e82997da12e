//! Test utilities for axum_chunked_upload.
//!
//! [TestClient] is adapted from <https://github.com/tokio-rs/axum/blob/f84105ae8b078109987b089c47febc3b544e6b80/axum/src/test_helpers/test_client.rs>

use axum::body::Body;
use axum::extract::Request;
use axum::http::header::CONTENT_TYPE;
use axum::response::Response;
use axum::serve;
use std::convert::Infallible;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower::make::Shared;
use tower_service::Service;

pub const FILE_ID_HEADER: &str = "uploader-file-id";
pub const CHUNK_NUMBER_HEADER: &str = "uploader-chunk-number";
pub const CHUNKS_TOTAL_HEADER: &str = "uploader-chunks-total";

const BOUNDARY: &str = "chunked-upload-test-boundary";

fn spawn_service<S>(svc: S) -> std::io::Result<SocketAddr>
where
    S: Service<Request, Response = Response, Error = Infallible> + Clone + Send + 'static,
    S::Future: Send,
{
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    std_listener.set_nonblocking(true)?;
    let listener = TcpListener::from_std(std_listener)?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move { serve(listener, Shared::new(svc)).await.expect("server error") });
    Ok(addr)
}

/// HTTP client talking to a service spawned on an ephemeral local port.
pub struct TestClient {
    client: reqwest::Client,
    addr: SocketAddr,
}

impl TestClient {
    pub fn new<S>(svc: S) -> Self
    where
        S: Service<Request, Response = Response, Error = Infallible> + Clone + Send + 'static,
        S::Future: Send,
    {
        let addr = spawn_service(svc).expect("failed to spawn service");
        let client = reqwest::Client::default();
        TestClient { addr, client }
    }

    pub fn post(&self, url: &str) -> reqwest::RequestBuilder {
        let url = format!("http://{}{}", self.addr, url);
        self.client.post(&url)
    }

    /// Post one chunk of `file_id` with the `uploader-*` headers set.
    ///
    /// The chunk bytes are sent as the `file` part, followed by `fields` as
    /// text parts.
    pub fn post_chunk(
        &self,
        url: &str,
        file_id: &str,
        chunk_number: u64,
        total_chunks: u64,
        data: &[u8],
        fields: &[(&str, &str)],
    ) -> reqwest::RequestBuilder {
        let part = reqwest::multipart::Part::bytes(data.to_vec()).file_name("blob");
        let form = fields.iter().fold(
            reqwest::multipart::Form::new().part("file", part),
            |form, (name, value)| form.text(name.to_string(), value.to_string()),
        );

        self.post(url)
            .header(FILE_ID_HEADER, file_id)
            .header(CHUNK_NUMBER_HEADER, chunk_number.to_string())
            .header(CHUNKS_TOTAL_HEADER, total_chunks.to_string())
            .multipart(form)
    }
}

/// Builder for `multipart/form-data` bodies used to drive extractors
/// in-process, without a server.
#[derive(Debug, Default, Clone)]
pub struct MultipartForm {
    body: Vec<u8>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.open_part(&format!("form-data; name=\"{name}\""));
        self.body.extend_from_slice(b"\r\n");
        self.body.extend_from_slice(value.as_bytes());
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn file(mut self, name: &str, file_name: &str, data: &[u8]) -> Self {
        self.open_part(&format!("form-data; name=\"{name}\"; filename=\"{file_name}\""));
        self.body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        self.body.extend_from_slice(data);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={BOUNDARY}")
    }

    pub fn into_body(mut self) -> Vec<u8> {
        self.body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        self.body
    }

    /// Build a POST request carrying this form and no other header.
    pub fn into_request(self) -> Request<Body> {
        self.request_builder().body(Body::from(self.into_body())).expect("valid request")
    }

    /// Build a POST request carrying this form as chunk `chunk_number` of
    /// `file_id`.
    pub fn into_chunk_request(
        self,
        file_id: &str,
        chunk_number: u64,
        total_chunks: u64,
    ) -> Request<Body> {
        self.request_builder()
            .header(FILE_ID_HEADER, file_id)
            .header(CHUNK_NUMBER_HEADER, chunk_number.to_string())
            .header(CHUNKS_TOTAL_HEADER, total_chunks.to_string())
            .body(Body::from(self.into_body()))
            .expect("valid request")
    }

    fn request_builder(&self) -> axum::http::request::Builder {
        axum::http::Request::builder()
            .uri("/upload")
            .method("POST")
            .header(CONTENT_TYPE, self.content_type())
    }

    fn open_part(&mut self, disposition: &str) {
        self.body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        self.body.extend_from_slice(format!("Content-Disposition: {disposition}\r\n").as_bytes());
    }
}
