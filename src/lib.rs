//! # GraphBolt
//!
//! Client connection core for graph databases speaking the Bolt v1 wire
//! protocol.
//!
//! This crate is the connection layer of a driver: given a byte transport
//! it negotiates the protocol, frames requests, parses responses, pipelines
//! concurrent requests, and routes every server response to the observer
//! that issued the corresponding request. Sessions, transactions, pooling
//! and query APIs are left to the layers above.
//!
//! ## Features
//!
//! - **Bolt v1** - handshake, INIT/RUN/PULL_ALL/DISCARD_ALL/RESET, failure
//!   acknowledgement
//! - **Pipelining** - queue any number of requests before the first
//!   response; responses dispatch in request order
//! - **PackStream** - full value codec with typed Node, Relationship and
//!   Path hydration
//! - **Async** - built on Tokio; one I/O task per connection, cheap
//!   cloneable handles
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use graphbolt::{connect, AuthToken, CallbackObserver, Config};
//! use std::collections::HashMap;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let connection = connect("bolt://localhost:7687", &Config::default()).await?;
//!
//!     connection.initialize(
//!         "MyApp/1.0",
//!         AuthToken::basic("neo4j", "password"),
//!         CallbackObserver::new(),
//!     );
//!     let server = connection.initialization_completed().await?;
//!     println!("connected to {:?}", server.agent);
//!
//!     connection.run("RETURN 1 AS n", HashMap::new(), CallbackObserver::new());
//!     connection.pull_all(
//!         CallbackObserver::new()
//!             .on_next(|fields| println!("record: {:?}", fields))
//!             .on_completed(|_| println!("stream done")),
//!     );
//!     connection.sync();
//!
//!     connection.close().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Failure semantics
//!
//! A server FAILURE settles its request's observer and poisons the requests
//! already pipelined behind it: the server answers each with IGNORED until
//! the failure is acknowledged. The connection sends exactly one
//! ACK_FAILURE per failure episode and surfaces every IGNORED with the
//! originating failure, so callers see the real cause on every affected
//! request.
//!
//! Transport, handshake, protocol and serialization errors are fatal: the
//! connection latches the error, settles every queued observer with it,
//! and rejects everything submitted afterwards.
//!
//! ## Modules
//!
//! - [`driver`] - the connection, observers, channel trait and errors
//! - [`bolt`] - the protocol layer: handshake, framing, PackStream,
//!   message types

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod bolt;
pub mod driver;

// Re-exports for convenience
pub use bolt::{
    AuthToken, MapperRegistry, Node, Path, PathSegment, Relationship, ServerVersion, Structure,
    UnboundRelationship, Value,
};
pub use driver::{
    connect, CallbackObserver, Channel, Config, Connection, DriverError, DriverResult, ServerInfo,
    StreamObserver,
};
