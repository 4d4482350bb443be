// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! IPC message framing.
//!
//! Messages are framed as:
//! - 4 bytes: message length (big-endian u32)
//! - N bytes: JSON-encoded message

use std::io::{Read, Write};

use serde::Serialize;

/// Maximum message size (1MB) to prevent malformed messages from causing hangs.
pub const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

fn frame_len(len: usize) -> std::io::Result<[u8; 4]> {
    if len > MAX_MESSAGE_SIZE {
        return Err(std::io::Error::other(format!(
            "message too large: {} bytes (max {})",
            len, MAX_MESSAGE_SIZE
        )));
    }
    let len = u32::try_from(len).map_err(|_| std::io::Error::other("message too large"))?;
    Ok(len.to_be_bytes())
}

fn checked_len(len_buf: [u8; 4]) -> std::io::Result<usize> {
    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_MESSAGE_SIZE {
        return Err(std::io::Error::other(format!(
            "message too large: {} bytes (max {})",
            len, MAX_MESSAGE_SIZE
        )));
    }
    Ok(len)
}

fn encode<T: Serialize>(message: &T) -> std::io::Result<Vec<u8>> {
    serde_json::to_vec(message).map_err(|e| std::io::Error::other(format!("serialize error: {}", e)))
}

/// Write one raw frame.
pub fn write_frame<W: Write>(writer: &mut W, payload: &[u8]) -> std::io::Result<()> {
    writer.write_all(&frame_len(payload.len())?)?;
    writer.write_all(payload)?;
    writer.flush()
}

/// Read one raw frame.
pub fn read_frame<R: Read>(reader: &mut R) -> std::io::Result<Vec<u8>> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf)?;
    let len = checked_len(len_buf)?;

    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}

/// Async counterparts used by the daemon's tokio server.
pub mod asynchronous {
    use serde::Serialize;
    use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

    use super::{checked_len, encode, frame_len};

    /// Write one raw frame.
    pub async fn write_frame<W: AsyncWrite + Unpin>(
        writer: &mut W,
        payload: &[u8],
    ) -> std::io::Result<()> {
        writer.write_all(&frame_len(payload.len())?).await?;
        writer.write_all(payload).await?;
        writer.flush().await
    }

    /// Read one raw frame.
    pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> std::io::Result<Vec<u8>> {
        let mut len_buf = [0u8; 4];
        reader.read_exact(&mut len_buf).await?;
        let len = checked_len(len_buf)?;

        let mut buf = vec![0u8; len];
        reader.read_exact(&mut buf).await?;
        Ok(buf)
    }

    /// Write a serializable message.
    pub async fn write_message<W: AsyncWrite + Unpin, T: Serialize>(
        writer: &mut W,
        message: &T,
    ) -> std::io::Result<()> {
        write_frame(writer, &encode(message)?).await
    }
}
