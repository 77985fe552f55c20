//! TCP listener for the command server.

use std::{net::SocketAddr, sync::Arc};

use tokio::{net::TcpListener, sync::Semaphore};
use tokio_util::sync::CancellationToken;

use super::{handler::CommandHandler, session::serve_session};
use crate::config::ServerConfig;

/// Accepts command sessions on a TCP socket.
pub struct CommandServer {
    listener: TcpListener,
    handler: CommandHandler,
    sessions: Arc<Semaphore>,
    max_sessions: u32,
    read_buffer_size: usize,
}

impl CommandServer {
    /// Binds the configured listen address.
    pub async fn bind(config: &ServerConfig, handler: CommandHandler) -> std::io::Result<Self> {
        let listener = TcpListener::bind(&config.listen_address).await?;
        let max_sessions = u32::try_from(config.max_connections.max(1)).unwrap_or(u32::MAX);
        Ok(Self {
            listener,
            handler,
            sessions: Arc::new(Semaphore::new(max_sessions as usize)),
            max_sessions,
            read_buffer_size: config.read_buffer_size,
        })
    }

    /// The address the server is listening on.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts connections until `token` is cancelled, then waits for open
    /// sessions to finish the request they are serving.
    pub async fn run(self, token: CancellationToken) {
        tracing::info!(address = ?self.listener.local_addr().ok(), "Command server listening.");
        loop {
            let (stream, peer) = tokio::select! {
                _ = token.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to accept connection.");
                        continue;
                    }
                },
            };

            let handler = self.handler.clone();
            let sessions = Arc::clone(&self.sessions);
            let session_token = token.child_token();
            let read_buffer_size = self.read_buffer_size;
            tokio::spawn(async move {
                let _permit = tokio::select! {
                    _ = session_token.cancelled() => return,
                    permit = sessions.acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => return,
                    },
                };
                tracing::debug!(%peer, "Session opened.");
                if let Err(e) = serve_session(stream, handler, read_buffer_size, session_token).await
                {
                    tracing::debug!(%peer, error = %e, "Session ended with error.");
                }
                tracing::debug!(%peer, "Session closed.");
            });
        }

        drop(self.listener);
        // Every permit back means every session has returned.
        if self.sessions.acquire_many(self.max_sessions).await.is_err() {
            tracing::warn!("Session limiter closed before sessions drained.");
        }
        tracing::info!("Command server stopped.");
    }
}
