//! Connection lifecycle state.
//!
//! Tracks brokenness and the initialization lifecycle, and owns the
//! one-shot "initialized" signal callers consume through
//! [`Connection::initialization_completed`].
//!
//! [`Connection::initialization_completed`]: super::Connection::initialization_completed

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::sync::oneshot;

use super::error::{DriverError, DriverResult};
use crate::bolt::ServerVersion;

/// What the server told us about itself during initialization.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerInfo {
    /// The address this connection was opened against
    pub address: String,
    /// The raw server agent string, e.g. `"Neo4j/3.4.0"`
    pub agent: Option<String>,
    /// The parsed server version, when the agent string carries one
    pub version: Option<ServerVersion>,
}

enum InitState {
    /// INIT has not settled; waiters park here.
    Pending(Vec<oneshot::Sender<DriverResult<ServerInfo>>>),
    Completed(ServerInfo),
    /// Memorized failure: surfaced only when a caller asks, so an init
    /// error nobody consumes raises no spurious signal.
    Failed(DriverError),
}

/// Shared lifecycle state between connection handles and the I/O task.
pub(crate) struct ConnectionState {
    broken: AtomicBool,
    open: AtomicBool,
    error: Mutex<Option<DriverError>>,
    init: Mutex<InitState>,
}

impl ConnectionState {
    pub(crate) fn new() -> Self {
        Self {
            broken: AtomicBool::new(false),
            open: AtomicBool::new(true),
            error: Mutex::new(None),
            init: Mutex::new(InitState::Pending(Vec::new())),
        }
    }

    /// Whether the connection is poisoned. Never clears once set.
    pub(crate) fn is_broken(&self) -> bool {
        self.broken.load(Ordering::SeqCst)
    }

    /// Whether the connection accepts requests.
    pub(crate) fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst) && !self.is_broken()
    }

    pub(crate) fn mark_closed(&self) {
        self.open.store(false, Ordering::SeqCst);
    }

    /// Latch a fatal error. Returns `false` when the connection was
    /// already broken; the first error wins.
    pub(crate) fn latch_error(&self, error: DriverError) -> bool {
        if self.broken.swap(true, Ordering::SeqCst) {
            return false;
        }
        *self.error.lock() = Some(error);
        true
    }

    /// The latched fatal error, if any.
    pub(crate) fn latched_error(&self) -> Option<DriverError> {
        self.error.lock().clone()
    }

    /// The error a rejected request should settle with.
    pub(crate) fn terminal_error(&self) -> DriverError {
        self.latched_error().unwrap_or(DriverError::Closed)
    }

    /// Resolve the init signal. No-op unless initialization is pending.
    pub(crate) fn complete_init(&self, info: ServerInfo) {
        let mut init = self.init.lock();
        if let InitState::Pending(waiters) = &mut *init {
            for waiter in waiters.drain(..) {
                let _ = waiter.send(Ok(info.clone()));
            }
            *init = InitState::Completed(info);
        }
    }

    /// Reject the init signal. No-op unless initialization is pending.
    pub(crate) fn fail_init(&self, error: DriverError) {
        let mut init = self.init.lock();
        if let InitState::Pending(waiters) = &mut *init {
            for waiter in waiters.drain(..) {
                let _ = waiter.send(Err(error.clone()));
            }
            *init = InitState::Failed(error);
        }
    }

    /// Await the init signal; resolves on INIT SUCCESS, rejects on INIT
    /// failure or when the connection dies first.
    pub(crate) async fn initialization_completed(&self) -> DriverResult<ServerInfo> {
        let rx = {
            let mut init = self.init.lock();
            match &mut *init {
                InitState::Completed(info) => return Ok(info.clone()),
                InitState::Failed(error) => return Err(error.clone()),
                InitState::Pending(waiters) => {
                    let (tx, rx) = oneshot::channel();
                    waiters.push(tx);
                    rx
                }
            }
        };
        rx.await.unwrap_or(Err(DriverError::Closed))
    }

    /// The server info from a completed initialization.
    pub(crate) fn server_info(&self) -> Option<ServerInfo> {
        match &*self.init.lock() {
            InitState::Completed(info) => Some(info.clone()),
            _ => None,
        }
    }
}
