// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace-scoped IPC endpoint.
//!
//! Unix platforms use the socket path from the workspace config. Elsewhere
//! the endpoint is a loopback TCP port derived from the workspace hash.

use std::fmt;
use std::time::Duration;

use trk_core::DaemonConfig;

#[cfg(unix)]
use std::path::{Path, PathBuf};

#[cfg(not(unix))]
use std::net::{Ipv4Addr, SocketAddr};

/// Blocking stream type for the current platform.
#[cfg(unix)]
pub type Stream = std::os::unix::net::UnixStream;
#[cfg(not(unix))]
pub type Stream = std::net::TcpStream;

/// First port of the IANA dynamic range.
#[cfg(not(unix))]
const PORT_BASE: u16 = 49152;
#[cfg(not(unix))]
const PORT_SPAN: u16 = 16383;

/// Where a workspace's daemon listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    #[cfg(unix)]
    path: PathBuf,
    #[cfg(not(unix))]
    addr: SocketAddr,
}

impl Endpoint {
    /// Derives the endpoint for a workspace config.
    pub fn for_config(config: &DaemonConfig) -> Self {
        #[cfg(unix)]
        {
            Endpoint {
                path: config.get_socket_path(),
            }
        }
        #[cfg(not(unix))]
        {
            let hash = config.workspace_hash();
            let seed = u16::from_str_radix(&hash[..4], 16).unwrap_or(0);
            let port = PORT_BASE + seed % PORT_SPAN;
            Endpoint {
                addr: SocketAddr::from((Ipv4Addr::LOCALHOST, port)),
            }
        }
    }

    /// Socket path to bind or connect to.
    #[cfg(unix)]
    pub fn socket_path(&self) -> &Path {
        &self.path
    }

    /// Loopback address to bind or connect to.
    #[cfg(not(unix))]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Opens a blocking connection to the endpoint.
    #[cfg(unix)]
    pub fn connect(&self, _timeout: Duration) -> std::io::Result<Stream> {
        Stream::connect(&self.path)
    }

    /// Opens a blocking connection to the endpoint.
    #[cfg(not(unix))]
    pub fn connect(&self, timeout: Duration) -> std::io::Result<Stream> {
        Stream::connect_timeout(&self.addr, timeout)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        #[cfg(unix)]
        {
            write!(f, "{}", self.path.display())
        }
        #[cfg(not(unix))]
        {
            write!(f, "{}", self.addr)
        }
    }
}
