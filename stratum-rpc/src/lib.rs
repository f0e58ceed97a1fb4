//! Stratum flavoured JSON-RPC codec.
//!
//! Stratum v1 mining links speak JSON-RPC over a line-delimited byte stream,
//! with a few quirks: requests and responses flow in both directions on one
//! connection, peers may use any JSON value as a request id, params are
//! positional lists, and errors arrive either as a string or as a
//! `[code, message, data]` array.
//!
//! This crate sits between such a connection and an RPC engine that knows
//! calls only by `u64` sequence number. The engine reads with
//! [`CodecReader`] from a single loop and answers through any number of
//! [`CodecWriter`] clones.
//!
//! # Usage
//!
//! ```rust,ignore
//! use stratum_rpc::{CodecConfig, Header, Response};
//!
//! let (mut reader, writer) = stratum_rpc::from_tcp(stream, CodecConfig::default());
//!
//! while let Some(header) = reader.read_header().await? {
//!     match header {
//!         Header::Request(req) if req.method == "add" => {
//!             let (a, b): (i64, i64) = reader.read_params()?;
//!             writer.write_response(&Response::ok(req.seq), &(a + b)).await?;
//!         }
//!         Header::Request(_) => reader.skip_body(),
//!         Header::Response(resp) => {
//!             let result: Option<bool> = reader.read_result()?;
//!             // ... complete the engine's call `resp.seq`
//!         }
//!     }
//! }
//! ```

mod codec;
mod error;
mod message;
mod pending;
mod state;
pub mod tracing;

pub use codec::{
    CodecConfig, CodecReader, CodecWriter, DEFAULT_MAX_FRAME_LEN, codec, from_stream, from_tcp,
};
pub use error::{StratumRpcError, StratumRpcResult};
pub use message::{Header, NOTIFICATION_SEQ, Request, Response, UNSPECIFIED_ERROR, WireError};
pub use state::ConnState;
