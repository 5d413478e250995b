use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::bridge::handler::BridgeHandle;
use crate::bridge::message::{BridgeError, BridgeResponse};

/// Serve the bridge over newline-delimited JSON: one message per input
/// line, one reply per output line. Returns when the input closes.
pub async fn serve_lines<R, W>(
    handle: &BridgeHandle,
    reader: R,
    mut writer: W,
) -> std::io::Result<usize>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    let mut handled = 0;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Value>(line) {
            Ok(message) => match handle.send(message).await {
                Ok(response) => response,
                Err(e) => BridgeResponse::failure(&e),
            },
            Err(e) => BridgeResponse::failure(&BridgeError::InvalidJson(e.to_string())),
        };

        let json = serde_json::to_string(&response).map_err(std::io::Error::other)?;
        writer.write_all(json.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        handled += 1;
    }

    debug!(handled, "bridge input closed");
    Ok(handled)
}
