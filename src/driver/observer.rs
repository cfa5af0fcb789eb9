//! Request observers.
//!
//! Every request operation takes an observer; the connection dispatches the
//! server's responses to it. A request sees zero or more `on_next` calls
//! followed by exactly one terminal: `on_completed` or `on_error`.

use std::collections::HashMap;

use super::error::DriverError;
use crate::bolt::packstream::Value;

/// The callbacks bound to one in-flight request.
///
/// All methods default to no-ops, so an observer implements only what it
/// cares about.
pub trait StreamObserver: Send {
    /// One result record arrived.
    fn on_next(&mut self, fields: Vec<Value>) {
        let _ = fields;
    }

    /// The request completed; no further calls follow.
    fn on_completed(&mut self, metadata: HashMap<String, Value>) {
        let _ = metadata;
    }

    /// The request failed or was dropped; no further calls follow.
    fn on_error(&mut self, error: DriverError) {
        let _ = error;
    }
}

pub(crate) type BoxedObserver = Box<dyn StreamObserver>;

/// An observer that discards everything. Used internally for ACK_FAILURE
/// bookkeeping, where the response matters to the connection but not to
/// any caller.
#[derive(Debug, Default)]
pub struct NoopObserver;

impl StreamObserver for NoopObserver {}

type NextFn = Box<dyn FnMut(Vec<Value>) + Send>;
type CompletedFn = Box<dyn FnMut(HashMap<String, Value>) + Send>;
type ErrorFn = Box<dyn FnMut(DriverError) + Send>;

/// An observer assembled from closures.
///
/// ```
/// use graphbolt::driver::CallbackObserver;
///
/// let observer = CallbackObserver::new()
///     .on_next(|fields| println!("record: {:?}", fields))
///     .on_completed(|metadata| println!("done: {:?}", metadata))
///     .on_error(|error| eprintln!("failed: {}", error));
/// # let _ = observer;
/// ```
#[derive(Default)]
pub struct CallbackObserver {
    next: Option<NextFn>,
    completed: Option<CompletedFn>,
    error: Option<ErrorFn>,
}

impl CallbackObserver {
    /// An observer with all callbacks unset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the record callback.
    pub fn on_next(mut self, f: impl FnMut(Vec<Value>) + Send + 'static) -> Self {
        self.next = Some(Box::new(f));
        self
    }

    /// Set the completion callback.
    pub fn on_completed(mut self, f: impl FnMut(HashMap<String, Value>) + Send + 'static) -> Self {
        self.completed = Some(Box::new(f));
        self
    }

    /// Set the error callback.
    pub fn on_error(mut self, f: impl FnMut(DriverError) + Send + 'static) -> Self {
        self.error = Some(Box::new(f));
        self
    }
}

impl StreamObserver for CallbackObserver {
    fn on_next(&mut self, fields: Vec<Value>) {
        if let Some(f) = self.next.as_mut() {
            f(fields);
        }
    }

    fn on_completed(&mut self, metadata: HashMap<String, Value>) {
        if let Some(f) = self.completed.as_mut() {
            f(metadata);
        }
    }

    fn on_error(&mut self, error: DriverError) {
        if let Some(f) = self.error.as_mut() {
            f(error);
        }
    }
}

impl std::fmt::Debug for CallbackObserver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackObserver")
            .field("next", &self.next.is_some())
            .field("completed", &self.completed.is_some())
            .field("error", &self.error.is_some())
            .finish()
    }
}
