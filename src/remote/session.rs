//! One client connection.

use command_models::CommandResponse;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use super::{handler::CommandHandler, protocol::parse_request};

/// Serves requests on `stream` until the peer disconnects, `token` is
/// cancelled, or the peer sends a request that does not fit into
/// `read_buffer_size` bytes.
///
/// Each read is treated as one request and answered before the next read.
/// Cancellation is only observed while waiting for a request, so a request
/// that was already read is applied, journaled and answered.
pub async fn serve_session<S>(
    mut stream: S,
    handler: CommandHandler,
    read_buffer_size: usize,
    token: CancellationToken,
) -> std::io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; read_buffer_size.max(1)];
    loop {
        let n = tokio::select! {
            biased;
            _ = token.cancelled() => return Ok(()),
            read = stream.read(&mut buf) => read?,
        };
        if n == 0 {
            return Ok(());
        }

        let (response, close) = match parse_request(&buf[..n], buf.len()) {
            Ok(request) => (handler.handle(request).await, false),
            Err(e) => {
                tracing::warn!(error = %e, "Rejected malformed request.");
                (CommandResponse::failure(e.to_string()), e.closes_connection())
            }
        };

        let body = serde_json::to_vec(&response).map_err(std::io::Error::other)?;
        stream.write_all(&body).await?;
        stream.flush().await?;

        if close {
            return Ok(());
        }
    }
}
