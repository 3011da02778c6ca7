//! Line framing between the host streams and the rmcp session.
//!
//! Inbound frames are screened before rmcp sees them: a frame rmcp cannot decode would
//! end its session, so such frames are answered here with a JSON-RPC error instead and
//! the connection stays open. Outbound, rmcp frames and those error replies are merged
//! onto the host writer one whole line at a time.

use crate::domain::DomainError;
use rmcp::ErrorData;
use rmcp::model::ClientJsonRpcMessage;
use serde_json::{Value, json};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// What to do with one inbound line.
#[derive(Debug, PartialEq)]
pub enum Screened {
    /// Whitespace only.
    Blank,
    /// A decodable JSON-RPC message, trimmed, without the newline.
    Forward(String),
    /// Not decodable; send this newline-terminated error frame back to the host.
    Reply(Vec<u8>),
    /// Not decodable and carries no id (a notification); nothing to answer.
    Drop,
}

pub fn screen(raw: &[u8]) -> Screened {
    let text = match std::str::from_utf8(raw) {
        Ok(t) => t.trim(),
        Err(e) => {
            warn!(error = %e, "frame is not valid UTF-8");
            return reply(Value::Null, ErrorData::parse_error(format!("Parse error: {}", e), None));
        }
    };
    if text.is_empty() {
        return Screened::Blank;
    }

    let value: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "unparseable frame");
            return reply(Value::Null, ErrorData::parse_error(format!("Parse error: {}", e), None));
        }
    };
    let id = value.get("id").cloned();
    match serde_json::from_value::<ClientJsonRpcMessage>(value) {
        Ok(_) => Screened::Forward(text.to_string()),
        Err(e) => match id {
            Some(id) => {
                warn!(error = %e, "invalid request frame");
                reply(id, ErrorData::invalid_request(format!("Invalid request: {}", e), None))
            }
            None => {
                debug!(error = %e, "dropping undecodable notification");
                Screened::Drop
            }
        },
    }
}

fn reply(id: Value, error: ErrorData) -> Screened {
    let error = serde_json::to_value(&error)
        .unwrap_or_else(|_| json!({ "code": -32603, "message": "internal error" }));
    let mut frame = json!({ "jsonrpc": "2.0", "id": id, "error": error })
        .to_string()
        .into_bytes();
    frame.push(b'\n');
    Screened::Reply(frame)
}

/// Copy screened host frames into the rmcp transport until the host closes its side.
/// The transport write half is shut down on return so rmcp sees end of stream.
pub async fn pump_inbound<R, T>(
    mut reader: R,
    mut to_server: T,
    replies: mpsc::UnboundedSender<Vec<u8>>,
) -> Result<(), DomainError>
where
    R: AsyncBufRead + Unpin,
    T: AsyncWrite + Unpin,
{
    let result = forward_frames(&mut reader, &mut to_server, &replies).await;
    if let Err(e) = to_server.shutdown().await {
        debug!(error = %e, "transport already closed");
    }
    result
}

async fn forward_frames<R, T>(
    reader: &mut R,
    to_server: &mut T,
    replies: &mpsc::UnboundedSender<Vec<u8>>,
) -> Result<(), DomainError>
where
    R: AsyncBufRead + Unpin,
    T: AsyncWrite + Unpin,
{
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            return Ok(());
        }
        match screen(&buf) {
            Screened::Blank | Screened::Drop => {}
            Screened::Reply(frame) => {
                if replies.send(frame).is_err() {
                    return Ok(());
                }
            }
            Screened::Forward(frame) => {
                let written = async {
                    to_server.write_all(frame.as_bytes()).await?;
                    to_server.write_all(b"\n").await?;
                    to_server.flush().await
                }
                .await;
                if let Err(e) = written {
                    debug!(error = %e, "session closed, stop forwarding");
                    return Ok(());
                }
            }
        }
    }
}

/// Write rmcp frames and local error replies to the host until both sources are done.
pub async fn pump_outbound<R, W>(
    mut from_server: R,
    mut replies: mpsc::UnboundedReceiver<Vec<u8>>,
    mut writer: W,
) -> Result<(), DomainError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = Vec::new();
    let mut server_open = true;
    let mut replies_open = true;
    while server_open || replies_open {
        tokio::select! {
            read = from_server.read_until(b'\n', &mut buf), if server_open => {
                if read? == 0 {
                    server_open = false;
                } else {
                    writer.write_all(&buf).await?;
                    writer.flush().await?;
                    buf.clear();
                }
            }
            reply = replies.recv(), if replies_open => match reply {
                Some(frame) => {
                    writer.write_all(&frame).await?;
                    writer.flush().await?;
                }
                None => replies_open = false,
            },
        }
    }
    Ok(())
}
