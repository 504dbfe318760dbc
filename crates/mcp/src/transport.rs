//! Line-delimited JSON-RPC transport over a duplex byte stream.
//!
//! Each message is one JSON object followed by `\n`. Requests are matched to
//! responses by id; anything else arriving in between is handled in place.

use std::sync::atomic::{AtomicI64, Ordering};

use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tracing::{debug, trace, warn};

use crate::error::TransportError;
use crate::protocol::{
    Incoming, JsonRpcError, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, RequestId,
};

/// Maximum size of a single frame (4 MiB).
/// Sized for large tool outputs (file reads, search results).
pub const MAX_FRAME_SIZE: usize = 4 * 1024 * 1024;

pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

type Result<T> = std::result::Result<T, TransportError>;

/// Read half with a persistent buffer, so a read interrupted by a timeout
/// resumes where it stopped instead of losing a partial line.
///
/// Lines are accumulated chunk by chunk and checked against
/// [`MAX_FRAME_SIZE`] as they grow. The rest of a rejected line is skipped.
struct FrameReader {
    inner: BufReader<BoxedReader>,
    buf: Vec<u8>,
    discarding: bool,
}

impl FrameReader {
    fn new(reader: BoxedReader) -> Self {
        Self {
            inner: BufReader::new(reader),
            buf: Vec::new(),
            discarding: false,
        }
    }

    async fn next_frame(&mut self) -> Result<String> {
        loop {
            let available = self.inner.fill_buf().await?;
            if available.is_empty() {
                return Err(TransportError::ServerExited);
            }

            let (chunk, complete) = match available.iter().position(|&b| b == b'\n') {
                Some(end) => (&available[..=end], true),
                None => (available, false),
            };
            let used = chunk.len();

            if self.discarding {
                self.discarding = !complete;
                self.inner.consume(used);
                continue;
            }

            let size = self.buf.len() + used - usize::from(complete);
            if size > MAX_FRAME_SIZE {
                self.buf.clear();
                self.discarding = !complete;
                self.inner.consume(used);
                return Err(TransportError::FrameTooLarge {
                    size,
                    max: MAX_FRAME_SIZE,
                });
            }

            self.buf.extend_from_slice(chunk);
            self.inner.consume(used);
            if complete {
                let frame = String::from_utf8_lossy(&self.buf).into_owned();
                self.buf.clear();
                return Ok(frame);
            }
        }
    }
}

/// Bi-directional JSON-RPC transport.
pub struct StdioTransport {
    writer: Mutex<Option<BoxedWriter>>,
    reader: Mutex<FrameReader>,
    next_id: AtomicI64,
}

impl StdioTransport {
    pub fn new(
        reader: impl AsyncRead + Send + Unpin + 'static,
        writer: impl AsyncWrite + Send + Unpin + 'static,
    ) -> Self {
        Self {
            writer: Mutex::new(Some(Box::new(writer))),
            reader: Mutex::new(FrameReader::new(Box::new(reader))),
            next_id: AtomicI64::new(1),
        }
    }

    fn next_request_id(&self) -> RequestId {
        RequestId::Number(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    /// Send a request and wait for the response carrying the same id.
    pub async fn request(&self, method: &str, params: Option<Value>) -> Result<Value> {
        let id = self.next_request_id();
        let request = JsonRpcRequest::new(id.clone(), method).with_params(params);
        debug!(%id, method, "request: sending");
        self.send(&request).await?;

        let mut reader = self.reader.lock().await;
        loop {
            let frame = reader.next_frame().await?;
            let text = frame.trim();
            if text.is_empty() {
                continue;
            }

            match Incoming::parse(text) {
                Some(Incoming::Response(response)) if response.id == id => {
                    debug!(%id, method, ok = response.error.is_none(), "request: response");
                    return Ok(response.into_result()?);
                }
                Some(Incoming::Response(response)) => {
                    debug!(expected = %id, got = %response.id, "request: skipping stale response");
                }
                Some(Incoming::Request { id, method, .. }) => {
                    self.answer_peer_request(id, &method).await?;
                }
                Some(Incoming::Notification { method, .. }) => {
                    debug!(%method, "request: ignoring notification");
                }
                None => {
                    warn!(frame = %truncate(text, 200), "request: skipping non JSON-RPC output");
                }
            }
        }
    }

    /// Send a notification (no response expected).
    pub async fn notify(&self, method: &str, params: Option<Value>) -> Result<()> {
        debug!(method, "notify: sending");
        self.send(&JsonRpcNotification::new(method, params)).await
    }

    /// Close the write half. The peer sees end of input. Idempotent.
    pub async fn close(&self) {
        if let Some(mut writer) = self.writer.lock().await.take() {
            if let Err(e) = writer.shutdown().await {
                debug!(error = %e, "close: writer shutdown failed");
            }
        }
    }

    pub async fn is_closed(&self) -> bool {
        self.writer.lock().await.is_none()
    }

    async fn answer_peer_request(&self, id: RequestId, method: &str) -> Result<()> {
        let response = if method == "ping" {
            trace!(%id, "answering ping");
            JsonRpcResponse::success(id, Value::Object(Default::default()))
        } else {
            warn!(%id, method, "unsupported request from server");
            JsonRpcResponse::failure(id, JsonRpcError::method_not_found(method))
        };
        self.send(&response).await
    }

    async fn send<T: Serialize>(&self, message: &T) -> Result<()> {
        let mut line = serde_json::to_string(message)?;
        line.push('\n');

        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(TransportError::Closed)?;
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
        Ok(())
    }
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
