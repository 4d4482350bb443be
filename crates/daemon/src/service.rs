// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The daemon service: owns the issue store, answers IPC requests and runs
//! the periodic sync task until asked to shut down.
//!
//! The main loop:
//! 1. Acquires `daemon.lock` for single instance
//! 2. Opens the store and writes the PID file
//! 3. Binds the IPC endpoint and spawns the accept loop
//! 4. Spawns the sync task when sync is enabled
//! 5. Waits for a stop request, SIGTERM/SIGINT or the heartbeat tick

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant, SystemTime};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use trk_core::{DaemonConfig, DaemonMode, Database};
use trk_ipc::{
    Endpoint, HealthInfo, Request, Response, StatusInfo, StopReply, SyncReply, SyncStats,
};

use crate::error::{Error, Result};
use crate::server;
use crate::sync::SyncEngine;

/// Interval between liveness log lines in the main loop.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
/// How often `events` mode checks the store for changes.
const STORE_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Lifecycle state of a [`DaemonService`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonState {
    Created,
    Starting,
    Running,
    Stopping,
    Stopped,
}

impl DaemonState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DaemonState::Created => "created",
            DaemonState::Starting => "starting",
            DaemonState::Running => "running",
            DaemonState::Stopping => "stopping",
            DaemonState::Stopped => "stopped",
        }
    }
}

impl fmt::Display for DaemonState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Store handle and export engine, used by one sync cycle at a time.
struct SyncContext {
    db: Option<Database>,
    engine: SyncEngine,
}

/// State shared between the main loop, IPC handlers and the sync task.
pub(crate) struct Shared {
    config: DaemonConfig,
    pid: u32,
    started: Instant,
    state: Mutex<DaemonState>,
    sync: Mutex<SyncContext>,
    last_sync: Mutex<Option<u64>>,
    shutdown_tx: mpsc::Sender<()>,
}

/// Locks a mutex, recovering the data if a previous holder panicked.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shared {
    fn state(&self) -> DaemonState {
        *lock(&self.state)
    }

    fn set_state(&self, state: DaemonState) {
        *lock(&self.state) = state;
        tracing::debug!("daemon state: {}", state);
    }

    fn request_shutdown(&self) {
        // A full channel means shutdown is already pending.
        let _ = self.shutdown_tx.try_send(());
    }

    fn health(&self) -> HealthInfo {
        HealthInfo {
            healthy: self.state() == DaemonState::Running,
            uptime_seconds: self.started.elapsed().as_secs(),
            workspace: self.config.workspace_path.display().to_string(),
            pid: self.pid,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    fn status(&self) -> StatusInfo {
        StatusInfo {
            running: self.state() == DaemonState::Running,
            workspace: self.config.workspace_path.display().to_string(),
            pid: self.pid,
            uptime_seconds: self.started.elapsed().as_secs(),
            sync_enabled: self.config.sync_enabled,
            sync_interval: self.config.sync_interval_seconds.get(),
            daemon_mode: self.config.daemon_mode,
            last_sync: *lock(&self.last_sync),
        }
    }

    /// Runs one sync cycle on the calling thread.
    fn run_cycle(&self) -> Result<SyncStats> {
        let mut ctx = lock(&self.sync);
        let SyncContext { db, engine } = &mut *ctx;
        let db = db
            .as_mut()
            .ok_or_else(|| Error::Sync("issue store is closed".to_string()))?;

        let issues = db.list_issues()?;
        let mut stats = engine.sync(&issues);
        if stats.pulled {
            let records = engine.import_from_jsonl()?;
            stats.imported = db.merge_newer(&records)?;
        }
        drop(ctx);

        let now = u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0);
        *lock(&self.last_sync) = Some(now);

        tracing::info!(
            "sync: exported={} skipped={} committed={} pulled={} pushed={} imported={}",
            stats.exported,
            stats.skipped,
            stats.committed,
            stats.pulled,
            stats.pushed,
            stats.imported
        );
        Ok(stats)
    }
}

/// Runs one sync cycle on the blocking pool.
async fn sync_once(shared: Arc<Shared>) -> Result<SyncStats> {
    tokio::task::spawn_blocking(move || shared.run_cycle())
        .await
        .map_err(|e| Error::Sync(format!("sync task failed: {}", e)))?
}

/// Answers one request frame.
pub(crate) async fn respond(shared: &Arc<Shared>, frame: &[u8]) -> Response {
    match Request::decode(frame) {
        Ok(request) => dispatch(shared, request).await,
        Err(e) => {
            tracing::warn!("rejected request: {}", e);
            e.into()
        }
    }
}

async fn dispatch(shared: &Arc<Shared>, request: Request) -> Response {
    tracing::debug!("request: {}", request.method());
    match request {
        Request::Health => Response::Health(shared.health()),
        Request::Status => Response::Status(shared.status()),
        Request::Sync => match sync_once(Arc::clone(shared)).await {
            Ok(stats) => Response::Sync(SyncReply::Success { stats }),
            Err(e) => {
                tracing::warn!("requested sync failed: {}", e);
                Response::Sync(SyncReply::Error {
                    error: e.to_string(),
                })
            }
        },
        Request::Stop => {
            tracing::info!("stop requested over IPC");
            shared.request_shutdown();
            Response::Stopping(StopReply::Stopping)
        }
    }
}

/// Latest modification time of the store, including its WAL.
fn store_stamp(db_path: &Path) -> Option<SystemTime> {
    let mut wal = db_path.as_os_str().to_owned();
    wal.push("-wal");
    [db_path.to_path_buf(), PathBuf::from(wal)]
        .iter()
        .filter_map(|p| fs::metadata(p).and_then(|m| m.modified()).ok())
        .max()
}

/// Periodic sync: one cycle per interval until cancelled.
///
/// In `events` mode a change to the store also triggers a cycle early.
async fn sync_loop(shared: Arc<Shared>, mut cancel: watch::Receiver<bool>) {
    let interval = Duration::from_secs(shared.config.sync_interval_seconds.get());
    let watch_store = shared.config.daemon_mode == DaemonMode::Events;
    let db_path = shared.config.get_database_path();
    let mut stamp = store_stamp(&db_path);

    loop {
        let deadline = tokio::time::Instant::now() + interval;
        loop {
            if *cancel.borrow() {
                return;
            }
            let wake = if watch_store {
                deadline.min(tokio::time::Instant::now() + STORE_POLL_INTERVAL)
            } else {
                deadline
            };
            tokio::select! {
                _ = cancel.changed() => return,
                _ = tokio::time::sleep_until(wake) => {}
            }
            if tokio::time::Instant::now() >= deadline {
                break;
            }
            let current = store_stamp(&db_path);
            if current != stamp {
                tracing::debug!("issue store changed; syncing early");
                break;
            }
        }

        if let Err(e) = sync_once(Arc::clone(&shared)).await {
            tracing::warn!("periodic sync failed: {}", e);
        }
        stamp = store_stamp(&db_path);
    }
}

/// Cloneable view of a running service.
#[derive(Clone)]
pub struct DaemonHandle {
    shared: Arc<Shared>,
}

impl DaemonHandle {
    pub fn state(&self) -> DaemonState {
        self.shared.state()
    }

    pub fn is_running(&self) -> bool {
        self.shared.state() == DaemonState::Running
    }

    /// Asks the main loop to shut down, like an IPC `stop`.
    pub fn request_shutdown(&self) {
        self.shared.request_shutdown();
    }
}

/// The daemon for one workspace.
pub struct DaemonService {
    shared: Arc<Shared>,
    shutdown_rx: mpsc::Receiver<()>,
    cancel: watch::Sender<bool>,
    sync_task: Option<JoinHandle<()>>,
    server_task: Option<JoinHandle<()>>,
    lock_file: Option<File>,
}

impl DaemonService {
    pub fn new(config: DaemonConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let (cancel, _) = watch::channel(false);
        let engine = SyncEngine::new(&config);
        DaemonService {
            shared: Arc::new(Shared {
                config,
                pid: std::process::id(),
                started: Instant::now(),
                state: Mutex::new(DaemonState::Created),
                sync: Mutex::new(SyncContext { db: None, engine }),
                last_sync: Mutex::new(None),
                shutdown_tx,
            }),
            shutdown_rx,
            cancel,
            sync_task: None,
            server_task: None,
            lock_file: None,
        }
    }

    pub fn config(&self) -> &DaemonConfig {
        &self.shared.config
    }

    pub fn handle(&self) -> DaemonHandle {
        DaemonHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn state(&self) -> DaemonState {
        self.shared.state()
    }

    /// Brings the service to `Running`.
    ///
    /// On failure everything acquired so far is released again.
    pub async fn start(&mut self) -> Result<()> {
        let state = self.shared.state();
        if state != DaemonState::Created {
            return Err(Error::Process(format!(
                "cannot start daemon in state {}",
                state
            )));
        }
        self.shared.set_state(DaemonState::Starting);

        if let Err(e) = self.start_inner().await {
            tracing::error!("daemon failed to start: {}", e);
            self.shutdown().await;
            return Err(e);
        }

        self.shared.set_state(DaemonState::Running);
        tracing::info!(
            "daemon running for {} (pid {}, sync {} every {}s, mode {})",
            self.shared.config.workspace_path.display(),
            self.shared.pid,
            if self.shared.config.sync_enabled { "on" } else { "off" },
            self.shared.config.sync_interval_seconds,
            self.shared.config.daemon_mode
        );
        Ok(())
    }

    async fn start_inner(&mut self) -> Result<()> {
        let config = &self.shared.config;
        fs::create_dir_all(config.issues_dir())?;

        self.lock_file = Some(acquire_lock(&config.get_lock_path())?);

        if let Err(e) = config.ensure_gitignore() {
            tracing::warn!("cannot write .gitignore in {}: {}", config.issues_dir().display(), e);
        }

        let db = Database::open(&config.get_database_path())?;
        lock(&self.shared.sync).db = Some(db);

        fs::write(config.get_pid_path(), self.shared.pid.to_string())?;

        let endpoint = Endpoint::for_config(config);
        let listener = server::bind(&endpoint).await?;
        tracing::info!("listening on {}", endpoint);
        self.server_task = Some(tokio::spawn(server::serve(
            listener,
            Arc::clone(&self.shared),
        )));

        if config.sync_enabled {
            self.sync_task = Some(tokio::spawn(sync_loop(
                Arc::clone(&self.shared),
                self.cancel.subscribe(),
            )));
        }
        Ok(())
    }

    /// Stops every task and releases every resource. Safe to call repeatedly.
    pub async fn shutdown(&mut self) {
        if self.shared.state() == DaemonState::Stopped {
            return;
        }
        self.shared.set_state(DaemonState::Stopping);
        tracing::info!("shutting down");

        let _ = self.cancel.send(true);
        if let Some(task) = self.sync_task.take() {
            if let Err(e) = task.await {
                tracing::warn!("sync task ended abnormally: {}", e);
            }
        }

        if let Some(task) = self.server_task.take() {
            task.abort();
            let _ = task.await;
            #[cfg(unix)]
            {
                let endpoint = Endpoint::for_config(&self.shared.config);
                let _ = fs::remove_file(endpoint.socket_path());
            }
        }

        // A requested cycle may still hold the store through a slow git step.
        let shared = Arc::clone(&self.shared);
        let closed = tokio::task::spawn_blocking(move || lock(&shared.sync).db.take().is_some())
            .await
            .unwrap_or(false);
        if closed {
            tracing::debug!("issue store closed");
        }

        remove_own_pid_file(&self.shared.config.get_pid_path(), self.shared.pid);
        self.lock_file = None;

        self.shared.set_state(DaemonState::Stopped);
        tracing::info!("daemon stopped");
    }

    /// Starts the service and blocks until a stop request or signal.
    pub async fn run(mut self) -> Result<()> {
        self.start().await?;

        let mut signals = match Signals::install() {
            Ok(signals) => signals,
            Err(e) => {
                self.shutdown().await;
                return Err(e.into());
            }
        };
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;

        loop {
            tokio::select! {
                _ = self.shutdown_rx.recv() => {
                    tracing::info!("shutdown requested");
                    break;
                }
                name = signals.recv() => {
                    tracing::info!("received {}", name);
                    break;
                }
                _ = heartbeat.tick() => {
                    tracing::debug!(
                        "heartbeat: uptime {}s",
                        self.shared.started.elapsed().as_secs()
                    );
                }
            }
        }

        self.shutdown().await;
        Ok(())
    }
}

/// Takes an exclusive lock on `daemon.lock`, failing if another daemon holds it.
fn acquire_lock(lock_path: &Path) -> Result<File> {
    use fs2::FileExt;

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(lock_path)?;

    file.try_lock_exclusive().map_err(|e| {
        Error::Process(format!(
            "another daemon holds {}: {}",
            lock_path.display(),
            e
        ))
    })?;

    Ok(file)
}

/// Removes the PID file unless it now names a different process.
fn remove_own_pid_file(pid_path: &Path, pid: u32) {
    let recorded = fs::read_to_string(pid_path)
        .ok()
        .and_then(|s| s.trim().parse::<u32>().ok());
    if recorded.is_none() || recorded == Some(pid) {
        let _ = fs::remove_file(pid_path);
    }
}

/// Termination signals the main loop listens for.
#[cfg(unix)]
struct Signals {
    term: tokio::signal::unix::Signal,
    int: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl Signals {
    fn install() -> std::io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};
        Ok(Signals {
            term: signal(SignalKind::terminate())?,
            int: signal(SignalKind::interrupt())?,
        })
    }

    async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = self.term.recv() => "SIGTERM",
            _ = self.int.recv() => "SIGINT",
        }
    }
}

#[cfg(not(unix))]
struct Signals;

#[cfg(not(unix))]
impl Signals {
    fn install() -> std::io::Result<Self> {
        Ok(Signals)
    }

    async fn recv(&mut self) -> &'static str {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
        "Ctrl-C"
    }
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;
