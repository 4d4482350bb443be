// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Blocking IPC client.
//!
//! Every call opens a fresh connection, sends one request, reads one response
//! and closes the connection before returning.

use std::net::Shutdown;
use std::time::Duration;

use trk_core::DaemonConfig;

use crate::endpoint::Endpoint;
use crate::error::{Error, Result};
use crate::framing;
use crate::{HealthInfo, Request, Response, StatusInfo, SyncReply, SyncStats};

/// Connection timeout for daemon communication.
const TIMEOUT_SECS: u64 = 5;

/// Client for one workspace's daemon.
#[derive(Debug, Clone)]
pub struct IpcClient {
    endpoint: Endpoint,
    timeout: Duration,
}

impl IpcClient {
    pub fn new(endpoint: Endpoint) -> Self {
        IpcClient {
            endpoint,
            timeout: Duration::from_secs(TIMEOUT_SECS),
        }
    }

    /// Client for the daemon described by a workspace config.
    pub fn for_config(config: &DaemonConfig) -> Self {
        Self::new(Endpoint::for_config(config))
    }

    /// Overrides the read/write timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Send one frame and read one frame back over a fresh connection.
    fn exchange(&self, payload: &[u8]) -> Result<Vec<u8>> {
        let mut stream = self
            .endpoint
            .connect(self.timeout)
            .map_err(|source| Error::Connect {
                endpoint: self.endpoint.to_string(),
                source,
            })?;
        stream.set_read_timeout(Some(self.timeout))?;
        stream.set_write_timeout(Some(self.timeout))?;

        let reply = framing::write_frame(&mut stream, payload)
            .and_then(|()| framing::read_frame(&mut stream));

        // Release the descriptor now rather than whenever the caller drops us.
        let _ = stream.shutdown(Shutdown::Both);
        drop(stream);

        Ok(reply?)
    }

    /// Send arbitrary JSON and return the raw JSON reply.
    pub fn call_raw(&self, request: &serde_json::Value) -> Result<serde_json::Value> {
        let reply = self.exchange(&serde_json::to_vec(request)?)?;
        Ok(serde_json::from_slice(&reply)?)
    }

    /// Send a typed request.
    pub fn call(&self, request: Request) -> Result<Response> {
        let reply = self.exchange(&serde_json::to_vec(&request)?)?;
        Ok(serde_json::from_slice(&reply)?)
    }

    pub fn health(&self) -> Result<HealthInfo> {
        match self.call(Request::Health)? {
            Response::Health(info) => Ok(info),
            other => Err(unexpected(other)),
        }
    }

    pub fn status(&self) -> Result<StatusInfo> {
        match self.call(Request::Status)? {
            Response::Status(info) => Ok(info),
            other => Err(unexpected(other)),
        }
    }

    /// Run one sync cycle in the daemon and return its stats.
    pub fn sync(&self) -> Result<SyncStats> {
        match self.call(Request::Sync)? {
            Response::Sync(SyncReply::Success { stats }) => Ok(stats),
            other => Err(unexpected(other)),
        }
    }

    /// Ask the daemon to shut down. Returns once the request is acknowledged.
    pub fn stop(&self) -> Result<()> {
        match self.call(Request::Stop)? {
            Response::Stopping(_) => Ok(()),
            other => Err(unexpected(other)),
        }
    }
}

fn unexpected(response: Response) -> Error {
    match response.error_message() {
        Some(message) => Error::Remote(message.to_string()),
        None => Error::UnexpectedResponse(format!("{:?}", response)),
    }
}
