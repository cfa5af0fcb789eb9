//! The connection layer.
//!
//! This module is the crate's public face: the [`Connection`] orchestrator,
//! the [`Channel`] trait it consumes, the [`StreamObserver`] callbacks it
//! dispatches into, and the [`connect`] bootstrap that opens a TCP channel.
//!
//! # Model
//!
//! Bolt is pipelined: any number of requests may be queued before the
//! first response arrives, and responses come back in request order. Each
//! request operation takes an observer; the connection dispatches zero or
//! more records and then exactly one terminal to it. There are no request
//! identifiers anywhere: ordering is the correspondence.
//!
//! ```rust,no_run
//! use graphbolt::driver::{connect, AuthToken, CallbackObserver, Config};
//! use std::collections::HashMap;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let connection = connect("bolt://localhost:7687", &Config::default()).await?;
//! connection.initialize(
//!     "MyApp/1.0",
//!     AuthToken::basic("neo4j", "password"),
//!     CallbackObserver::new(),
//! );
//! connection.initialization_completed().await?;
//!
//! connection.run(
//!     "RETURN 1 AS n",
//!     HashMap::new(),
//!     CallbackObserver::new().on_completed(|meta| println!("run ok: {:?}", meta)),
//! );
//! connection.pull_all(
//!     CallbackObserver::new().on_next(|fields| println!("record: {:?}", fields)),
//! );
//! connection.sync();
//! # Ok(())
//! # }
//! ```

pub mod channel;
pub mod connection;
pub mod error;
pub mod observer;
mod state;

pub use channel::Channel;
pub use connection::{Config, Connection, DEFAULT_USER_AGENT};
pub use error::{DriverError, DriverResult};
pub use observer::{CallbackObserver, NoopObserver, StreamObserver};
pub use state::ServerInfo;

// The credential bundle lives with the message types but is part of this
// module's request surface.
pub use crate::bolt::message::AuthToken;

use tokio::net::TcpStream;

/// Open a TCP channel to `address` and wrap it in a [`Connection`].
///
/// The address is `host:port`, optionally prefixed with `bolt://`. Anything
/// richer (routing schemes, TLS policy) belongs to the embedder; this is
/// only the plain-TCP bootstrap. The handshake is written before this
/// function returns, and requests may be issued immediately.
pub async fn connect(address: &str, config: &Config) -> DriverResult<Connection> {
    let target = address.strip_prefix("bolt://").unwrap_or(address);

    let stream = match config.connection_timeout {
        Some(timeout) => tokio::time::timeout(timeout, TcpStream::connect(target))
            .await
            .map_err(|_| {
                DriverError::transport(format!("connection to {} timed out", target))
            })??,
        None => TcpStream::connect(target).await?,
    };
    stream.set_nodelay(true).ok();

    Ok(Connection::with_config(stream, target, config))
}
