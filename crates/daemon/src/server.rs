// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! IPC accept loop. One task per connection, one request per connection.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use trk_ipc::framing::asynchronous as framing;
use trk_ipc::Endpoint;

use crate::service::{self, Shared};

/// Time a client gets to send its request.
const READ_TIMEOUT: Duration = Duration::from_secs(5);
/// Pause after a failed accept so a persistent error doesn't spin.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

#[cfg(unix)]
pub(crate) type Listener = tokio::net::UnixListener;
#[cfg(not(unix))]
pub(crate) type Listener = tokio::net::TcpListener;

/// Binds the workspace endpoint, replacing a stale socket file.
#[cfg(unix)]
pub(crate) async fn bind(endpoint: &Endpoint) -> std::io::Result<Listener> {
    let path = endpoint.socket_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let _ = std::fs::remove_file(path);
    Listener::bind(path)
}

/// Binds the workspace's loopback port.
#[cfg(not(unix))]
pub(crate) async fn bind(endpoint: &Endpoint) -> std::io::Result<Listener> {
    Listener::bind(endpoint.addr()).await
}

/// Accepts connections until the task is aborted.
pub(crate) async fn serve(listener: Listener, shared: Arc<Shared>) {
    loop {
        match listener.accept().await {
            Ok((stream, _)) => {
                let shared = Arc::clone(&shared);
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, &shared).await {
                        tracing::debug!("ipc connection error: {}", e);
                    }
                });
            }
            Err(e) => {
                tracing::warn!("failed to accept connection: {}", e);
                tokio::time::sleep(ACCEPT_BACKOFF).await;
            }
        }
    }
}

async fn handle_connection<S>(mut stream: S, shared: &Arc<Shared>) -> std::io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let frame = tokio::time::timeout(READ_TIMEOUT, framing::read_frame(&mut stream))
        .await
        .map_err(|_| {
            std::io::Error::new(std::io::ErrorKind::TimedOut, "timed out reading request")
        })??;

    let response = service::respond(shared, &frame).await;
    framing::write_message(&mut stream, &response).await?;
    stream.shutdown().await
}
