//! HTTP multipart transfer to the remote store.
//!
//! Implements [`StoreClient`] over `reqwest`: the file rides as a streamed
//! part under the `file` form field, so cumulative bytes handed to the
//! transport are reported through the progress callback, and the in-flight
//! request is raced against the cancellation token. On success the store
//! answers with a JSON body carrying the public `url` of the stored file.

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use futures_util::{Stream, stream};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use updrop_uploads::{ProgressFn, StagedFile, StoreClient, TransferError};

/// Chunk size for the streamed upload body.
const CHUNK_SIZE: usize = 64 * 1024;

/// JSON body returned by the store on success.
#[derive(Debug, Deserialize)]
struct StoreResponse {
    url: String,
}

/// Store client POSTing multipart bodies to a fixed endpoint.
pub struct HttpStoreClient {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpStoreClient {
    /// Creates a client for `endpoint` with a default `reqwest` client.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_client(endpoint, reqwest::Client::new())
    }

    /// Creates a client reusing an existing `reqwest` client.
    pub fn with_client(endpoint: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            endpoint: endpoint.into(),
            client,
        }
    }

    /// The configured upload endpoint.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl StoreClient for HttpStoreClient {
    fn upload(
        &self,
        file: StagedFile,
        on_progress: ProgressFn,
        cancel: CancellationToken,
    ) -> Pin<Box<dyn Future<Output = Result<String, TransferError>> + Send + '_>> {
        Box::pin(async move {
            // A token that fired before any I/O (e.g. while the file was
            // still compressing) short-circuits without touching the
            // network.
            if cancel.is_cancelled() {
                return Err(TransferError::Cancelled);
            }

            let total = file.size_bytes();
            let name = file.name.clone();
            let body = progress_body(file.data, on_progress);
            let part = reqwest::multipart::Part::stream_with_length(body, total).file_name(name);
            let form = reqwest::multipart::Form::new().part("file", part);

            let request = self.client.post(&self.endpoint).multipart(form).send();
            let response = tokio::select! {
                // Dropping the request future aborts the connection.
                _ = cancel.cancelled() => return Err(TransferError::Cancelled),
                resp = request => resp.map_err(|e| TransferError::Http(e.to_string()))?,
            };

            let status = response.status();
            if !status.is_success() {
                return Err(TransferError::Status(status.as_u16()));
            }

            let body: StoreResponse = response
                .json()
                .await
                .map_err(|e| TransferError::InvalidResponse(e.to_string()))?;

            debug!(url = %body.url, bytes = total, "stored file");
            Ok(body.url)
        })
    }
}

/// Wraps `data` in a chunked body reporting cumulative bytes as each chunk
/// is handed to the transport.
fn progress_body(data: Vec<u8>, on_progress: ProgressFn) -> reqwest::Body {
    reqwest::Body::wrap_stream(progress_stream(data, on_progress))
}

/// Chunked byte stream invoking `on_progress` with the cumulative count as
/// each chunk is pulled.
fn progress_stream(
    data: Vec<u8>,
    on_progress: ProgressFn,
) -> impl Stream<Item = Result<Bytes, std::io::Error>> + Send {
    let total = data.len() as u64;
    let mut sent: u64 = 0;
    stream::iter(chunk_bytes(data).into_iter().map(move |chunk| {
        sent += chunk.len() as u64;
        on_progress(sent.min(total));
        Ok(chunk)
    }))
}

/// Splits `data` into `CHUNK_SIZE` chunks without copying.
fn chunk_bytes(data: Vec<u8>) -> Vec<Bytes> {
    let mut rest = Bytes::from(data);
    let mut chunks = Vec::with_capacity(rest.len() / CHUNK_SIZE + 1);
    while rest.len() > CHUNK_SIZE {
        chunks.push(rest.split_to(CHUNK_SIZE));
    }
    if !rest.is_empty() {
        chunks.push(rest);
    }
    chunks
}
