//! Line-delimited Stratum JSON-RPC codec.
//!
//! A connection is split into a [`CodecReader`] and a [`CodecWriter`]. The
//! reader is owned by the engine's single demultiplexing loop: it decodes one
//! frame per [`CodecReader::read_header`] call and keeps that frame's body
//! around until the engine asks for it in a concrete type. The writer is
//! cheaply cloneable, so handler tasks can answer concurrently; whole frames
//! are written under one lock so their bytes never interleave.
//!
//! Inbound requests are renumbered with codec-assigned sequence numbers
//! because peers may use any JSON value as an id. Responses to our own calls
//! need no translation: the id we sent was already the engine's sequence
//! number.

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use serde_json::value::RawValue;
use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter,
    ReadHalf, WriteHalf,
};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::Mutex;
use tracing::{debug, trace, warn};

use crate::error::{StratumRpcError, StratumRpcResult};
use crate::message::{
    Header, NOTIFICATION_SEQ, OutgoingCall, OutgoingResponse, Request, Response, WireError,
    WireMessage, error_to_wire, positional,
};
use crate::pending::PendingTable;

/// Default upper bound on a single line, in bytes.
pub const DEFAULT_MAX_FRAME_LEN: usize = 1024 * 1024;

/// Codec configuration.
#[derive(Debug, Clone)]
pub struct CodecConfig {
    /// Longest accepted line, excluding the newline. Longer frames fail with
    /// [`StratumRpcError::FrameTooLarge`].
    pub max_frame_len: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}

/// Build a codec over separate read and write halves.
pub fn codec<R, W>(read: R, write: W, config: CodecConfig) -> (CodecReader<R>, CodecWriter<W>)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let pending = Arc::new(PendingTable::new());

    let reader = CodecReader {
        stream: BufReader::new(read),
        line_buf: String::with_capacity(4096),
        max_frame_len: config.max_frame_len,
        pending: Arc::clone(&pending),
        body: Body::None,
    };
    let writer = CodecWriter {
        inner: Arc::new(WriterInner {
            stream: Mutex::new(BufWriter::new(write)),
            pending,
        }),
    };

    (reader, writer)
}

/// Build a codec over a TCP connection.
pub fn from_tcp(
    stream: TcpStream,
    config: CodecConfig,
) -> (CodecReader<OwnedReadHalf>, CodecWriter<OwnedWriteHalf>) {
    let (read_half, write_half) = stream.into_split();
    codec(read_half, write_half, config)
}

/// Build a codec over any bidirectional stream.
pub fn from_stream<S>(
    stream: S,
    config: CodecConfig,
) -> (CodecReader<ReadHalf<S>>, CodecWriter<WriteHalf<S>>)
where
    S: AsyncRead + AsyncWrite,
{
    let (read_half, write_half) = tokio::io::split(stream);
    codec(read_half, write_half, config)
}

/// Body of the most recently read frame, awaiting decode.
#[derive(Debug)]
enum Body {
    None,
    Request(Option<Box<RawValue>>),
    Response(Option<Box<RawValue>>),
}

/// Read side of a Stratum connection.
pub struct CodecReader<R> {
    /// Buffered reader for incoming frames
    stream: BufReader<R>,

    /// Line buffer for reading frames
    line_buf: String,

    max_frame_len: usize,

    pending: Arc<PendingTable>,

    /// Only valid until the next `read_header`
    body: Body,
}

impl<R: AsyncRead + Unpin> CodecReader<R> {
    /// Read and classify the next frame.
    ///
    /// Returns `None` on clean connection close (EOF). Inbound requests that
    /// carry an id are registered and reported under a fresh sequence
    /// number; notifications are reported with [`NOTIFICATION_SEQ`].
    pub async fn read_header(&mut self) -> StratumRpcResult<Option<Header>> {
        self.body = Body::None;

        let Some(msg) = self.read_frame().await? else {
            return Ok(None);
        };

        if msg.is_request() {
            let seq = match msg.id {
                Some(id) => self.pending.register(id)?,
                None => NOTIFICATION_SEQ,
            };
            self.body = Body::Request(msg.params);

            Ok(Some(Header::Request(Request {
                method: msg.method.unwrap_or_default(),
                seq,
            })))
        } else {
            let seq = response_seq(msg.id.as_deref())?;
            let error = WireError::decode(msg.error)?.into_message();
            self.body = Body::Response(msg.result);

            Ok(Some(Header::Response(Response { seq, error })))
        }
    }

    async fn read_frame(&mut self) -> StratumRpcResult<Option<WireMessage>> {
        // One extra byte so a line of exactly `max_frame_len` still fits its
        // newline.
        let limit = self.max_frame_len as u64 + 1;

        loop {
            self.line_buf.clear();

            let n = (&mut self.stream)
                .take(limit)
                .read_line(&mut self.line_buf)
                .await?;

            if n == 0 {
                return Ok(None);
            }

            if n as u64 == limit && !self.line_buf.ends_with('\n') {
                return Err(StratumRpcError::FrameTooLarge(self.max_frame_len));
            }

            let line = self.line_buf.trim();
            if line.is_empty() {
                continue;
            }

            trace!(rx = %line, "Received frame");

            return Ok(Some(serde_json::from_str(line)?));
        }
    }

    /// Decode the current request's params as a positional list.
    ///
    /// Use this when the handler takes the whole list (`Vec<Value>`, a
    /// tuple, ...). An object-form `params` is wrapped as a one-element list
    /// first.
    pub fn read_params<T: DeserializeOwned>(&self) -> StratumRpcResult<T> {
        let params = self.request_params()?;

        if is_array(params) {
            Ok(serde_json::from_str(params.get())?)
        } else {
            Ok(serde_json::from_str(&format!("[{}]", params.get()))?)
        }
    }

    /// Decode the current request's params as a single value.
    ///
    /// The value is the first positional element, or the object-form
    /// `params` itself.
    pub fn read_arg<T: DeserializeOwned>(&self) -> StratumRpcResult<T> {
        let params = self.request_params()?;

        if !is_array(params) {
            return Ok(serde_json::from_str(params.get())?);
        }

        let items: Vec<Box<RawValue>> = serde_json::from_str(params.get())?;
        let first = items.first().ok_or(StratumRpcError::MissingParams)?;
        Ok(serde_json::from_str(first.get())?)
    }

    /// Decode the current response's result.
    ///
    /// A response without a result (error-only, or `"result": null`) yields
    /// `None`.
    pub fn read_result<T: DeserializeOwned>(&self) -> StratumRpcResult<Option<T>> {
        match &self.body {
            Body::Response(Some(result)) => Ok(Some(serde_json::from_str(result.get())?)),
            Body::Response(None) => Ok(None),
            _ => Err(StratumRpcError::NoBody("response")),
        }
    }

    /// Discard the current frame's body without decoding it.
    pub fn skip_body(&mut self) {
        self.body = Body::None;
    }

    fn request_params(&self) -> StratumRpcResult<&RawValue> {
        match &self.body {
            Body::Request(Some(params)) => Ok(params),
            Body::Request(None) => Err(StratumRpcError::MissingParams),
            _ => Err(StratumRpcError::NoBody("request")),
        }
    }
}

fn is_array(raw: &RawValue) -> bool {
    raw.get().trim_start().starts_with('[')
}

/// Responses to us carry the sequence number we sent as their id.
fn response_seq(id: Option<&RawValue>) -> StratumRpcResult<u64> {
    let id = id.ok_or_else(|| StratumRpcError::InvalidId("null".to_string()))?;
    serde_json::from_str(id.get()).map_err(|_| StratumRpcError::InvalidId(id.get().to_string()))
}

/// Write side of a Stratum connection.
///
/// Clones share the stream and the pending table.
pub struct CodecWriter<W> {
    inner: Arc<WriterInner<W>>,
}

struct WriterInner<W> {
    /// Held for a whole frame
    stream: Mutex<BufWriter<W>>,

    pending: Arc<PendingTable>,
}

impl<W> Clone for CodecWriter<W> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<W: AsyncWrite + Unpin> CodecWriter<W> {
    /// Send a call to the peer.
    ///
    /// `params` is sent as a positional list, wrapping a single non-list
    /// value. A request with [`NOTIFICATION_SEQ`] goes out with `"id": null`.
    pub async fn write_request<P>(&self, req: &Request, params: &P) -> StratumRpcResult<()>
    where
        P: Serialize + ?Sized,
    {
        let call = OutgoingCall {
            method: &req.method,
            params: positional(serde_json::to_value(params)?),
            id: (!req.is_notification()).then_some(req.seq),
        };

        self.write_frame(&call).await
    }

    /// Answer an inbound request.
    ///
    /// The reply carries the peer's original id. On error, `result` is null
    /// and `error` is the engine's error text, re-emitted as an array if it
    /// parses as one.
    pub async fn write_response<T>(&self, resp: &Response, result: &T) -> StratumRpcResult<()>
    where
        T: Serialize + ?Sized,
    {
        let (result, error) = match resp.error.as_deref() {
            None => (serde_json::to_value(result)?, Value::Null),
            Some(text) => (Value::Null, error_to_wire(text)),
        };

        let id = self.inner.pending.take(resp.seq).inspect_err(|_| {
            warn!(seq = resp.seq, "Response for a request that is not pending");
        })?;

        self.write_frame(&OutgoingResponse {
            id: &id,
            result,
            error,
        })
        .await?;

        debug!(seq = resp.seq, id = %id, "Answered inbound request");
        Ok(())
    }

    /// Drop a pending inbound request without answering it.
    ///
    /// Returns whether `seq` was pending.
    pub fn forget(&self, seq: u64) -> bool {
        self.inner.pending.forget(seq)
    }

    /// Number of inbound requests still awaiting a reply.
    pub fn pending_len(&self) -> usize {
        self.inner.pending.len()
    }

    /// Flush and shut down the write half of the connection.
    pub async fn close(&self) -> StratumRpcResult<()> {
        let mut stream = self.inner.stream.lock().await;
        stream.shutdown().await?;
        Ok(())
    }

    async fn write_frame<F: Serialize>(&self, frame: &F) -> StratumRpcResult<()> {
        let mut json = serde_json::to_string(frame)?;
        trace!(tx = %json, "Sending frame");
        json.push('\n');

        let mut stream = self.inner.stream.lock().await;
        stream.write_all(json.as_bytes()).await?;
        stream.flush().await?;

        Ok(())
    }
}
