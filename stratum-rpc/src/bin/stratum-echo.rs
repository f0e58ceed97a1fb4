//! Minimal Stratum RPC server for exercising the codec by hand.
//!
//! Listens on `STRATUM_RPC_LISTEN` (default `127.0.0.1:3333`) and answers a
//! handful of methods:
//!
//! - `add` `[a, b]` -> `a + b`
//! - `echo` `[...]` -> the params list
//! - `mining.authorize` `[worker, password]` -> `true`, remembers the worker
//! - `whoami` -> the authorized worker, or a `[24, "Unauthorized worker"]`
//!   error
//!
//! Notifications are logged and never answered. Try it with
//! `nc 127.0.0.1 3333` and `{"method":"add","params":[1,2],"id":7}`.

use std::env;

use anyhow::Context;
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use stratum_rpc::tracing::prelude::*;
use stratum_rpc::{CodecConfig, CodecReader, ConnState, Header, Request, Response};

const DEFAULT_LISTEN: &str = "127.0.0.1:3333";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    stratum_rpc::tracing::init_stdout();

    let addr = env::var("STRATUM_RPC_LISTEN").unwrap_or_else(|_| DEFAULT_LISTEN.to_string());
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(addr = %addr, "Listening");

    let shutdown = CancellationToken::new();
    let tracker = TaskTracker::new();

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (socket, peer) = accepted?;
                debug!(peer = %peer, "Accepted connection");

                let shutdown = shutdown.clone();
                tracker.spawn(async move {
                    tokio::select! {
                        result = serve(socket) => {
                            if let Err(e) = result {
                                warn!(peer = %peer, error = %e, "Connection ended with error");
                            }
                        }
                        _ = shutdown.cancelled() => {}
                    }
                    debug!(peer = %peer, "Connection closed");
                });
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
        }
    }

    shutdown.cancel();
    tracker.close();
    tracker.wait().await;
    Ok(())
}

/// Drive one connection until the peer hangs up.
async fn serve(socket: TcpStream) -> anyhow::Result<()> {
    let (mut reader, writer) = stratum_rpc::from_tcp(socket, CodecConfig::default());
    let state = ConnState::new();

    while let Some(header) = reader.read_header().await? {
        let req = match header {
            Header::Request(req) => req,
            Header::Response(resp) => {
                // We never call the peer, so nothing is waiting for this
                reader.skip_body();
                warn!(seq = resp.seq, "Unsolicited response");
                continue;
            }
        };

        let outcome = dispatch(&req, &mut reader, &state);

        if req.is_notification() {
            info!(method = %req.method, "Notification");
            continue;
        }

        // Reply from a separate task, as a real handler would
        let writer = writer.clone();
        tokio::spawn(async move {
            let written = match outcome {
                Ok(result) => writer.write_response(&Response::ok(req.seq), &result).await,
                Err(error) => {
                    writer
                        .write_response(&Response::err(req.seq, error), &Value::Null)
                        .await
                }
            };
            if let Err(e) = written {
                warn!(method = %req.method, error = %e, "Failed to write response");
            }
        });
    }

    writer.close().await?;
    Ok(())
}

/// Run the handler for `req`, returning its result or error text.
fn dispatch<R>(
    req: &Request,
    reader: &mut CodecReader<R>,
    state: &ConnState,
) -> Result<Value, String>
where
    R: tokio::io::AsyncRead + Unpin,
{
    match req.method.as_str() {
        "add" => {
            let (a, b): (i64, i64) = reader.read_params().map_err(|e| e.to_string())?;
            a.checked_add(b)
                .map(Value::from)
                .ok_or_else(|| "overflow".to_string())
        }
        "echo" => reader.read_params().map_err(|e| e.to_string()),
        "mining.authorize" => {
            let worker: String = reader.read_arg().map_err(|e| e.to_string())?;
            info!(worker = %worker, "Authorized");
            state.set("worker", worker);
            Ok(Value::Bool(true))
        }
        "whoami" => {
            reader.skip_body();
            state
                .get::<String>("worker")
                .map(|worker| Value::String(worker.as_ref().clone()))
                .ok_or_else(|| r#"[24,"Unauthorized worker",null]"#.to_string())
        }
        _ => {
            reader.skip_body();
            Err(r#"[20,"Unknown method",null]"#.to_string())
        }
    }
}
