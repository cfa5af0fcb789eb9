//! The connection: handshake, request pipelining and response dispatch.
//!
//! A [`Connection`] is a cheap handle onto a dedicated I/O task that owns
//! the channel. Request operations enqueue commands; the task serializes
//! them in order, writes them to the wire, and routes every inbound
//! response to the observer of the oldest unsettled request. Ordering is
//! the whole protocol: Bolt carries no request identifiers, so responses
//! correspond to requests purely by position.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::{mpsc, oneshot};
use tokio_util::codec::{Decoder, Encoder};
use tracing::{debug, warn};

use super::channel::Channel;
use super::error::{DriverError, DriverResult};
use super::observer::{BoxedObserver, NoopObserver, StreamObserver};
use super::state::{ConnectionState, ServerInfo};
use crate::bolt::chunk::{Chunker, Dechunker, DEFAULT_MAX_MESSAGE_SIZE};
use crate::bolt::handshake::{
    check_agreed_version, handshake_request, HandshakeError, HANDSHAKE_RESPONSE_SIZE,
};
use crate::bolt::message::{
    AuthToken, BoltRequest, BoltResponse, InitMessage, RunMessage, SuccessMessage,
};
use crate::bolt::packstream::{unpack, MapperRegistry, Packer, Value};
use crate::bolt::ServerVersion;

/// The user agent sent in INIT unless the caller supplies its own.
pub const DEFAULT_USER_AGENT: &str = concat!("GraphBolt/", env!("CARGO_PKG_VERSION"));

/// Connection tuning knobs.
#[derive(Debug, Clone)]
pub struct Config {
    /// Cap on the TCP connect, `None` to wait indefinitely
    pub connection_timeout: Option<Duration>,
    /// Cap on a reassembled inbound message
    pub max_message_size: usize,
}

impl Config {
    /// Set the connect timeout.
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = Some(timeout);
        self
    }

    /// Set the inbound message size cap.
    pub fn with_max_message_size(mut self, max: usize) -> Self {
        self.max_message_size = max;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            connection_timeout: Some(Duration::from_secs(30)),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

/// Which bookkeeping a request's terminal triggers in the I/O task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RequestKind {
    /// A caller-issued request with no extra bookkeeping
    External,
    /// INIT: settles the init signal and gates byte arrays
    Init,
    /// The internal failure acknowledgement
    AckFailure,
    /// RESET issued with failure-handling muted
    ResetAsync,
}

struct Request {
    message: BoltRequest,
    observer: BoxedObserver,
    kind: RequestKind,
    flush: bool,
}

enum Command {
    Request(Request),
    Sync,
    Close(oneshot::Sender<()>),
}

/// A handle to a Bolt v1 connection.
///
/// Handles are cheap to clone; all of them drive the same I/O task. The
/// connection is created around an already-open [`Channel`]; use
/// [`connect`](super::connect) for the TCP bootstrap.
#[derive(Clone)]
pub struct Connection {
    commands: mpsc::UnboundedSender<Command>,
    state: Arc<ConnectionState>,
    address: Arc<str>,
    encrypted: bool,
}

impl Connection {
    /// Wrap a channel with the default configuration.
    ///
    /// The 20-byte handshake is written immediately; requests may be
    /// issued right away and are pipelined behind it.
    pub fn new<C: Channel>(channel: C, address: impl Into<String>) -> Self {
        Self::with_config(channel, address, &Config::default())
    }

    /// Wrap a channel with an explicit configuration.
    pub fn with_config<C: Channel>(
        channel: C,
        address: impl Into<String>,
        config: &Config,
    ) -> Self {
        let address: Arc<str> = address.into().into();
        let encrypted = channel.is_encrypted();
        let state = Arc::new(ConnectionState::new());
        let (commands, receiver) = mpsc::unbounded_channel();

        let (reader, writer) = tokio::io::split(channel);
        let actor = Actor {
            reader,
            writer,
            commands: receiver,
            state: state.clone(),
            address: address.to_string(),
            chunker: Chunker::new(),
            dechunker: Dechunker::with_max_size(config.max_message_size),
            packer: Packer::new(),
            registry: MapperRegistry::standard(),
            inbound: BytesMut::with_capacity(8192),
            outbound: BytesMut::with_capacity(8192),
            scratch: BytesMut::with_capacity(1024),
            current: None,
            pending: VecDeque::new(),
            handling_failure: false,
            current_failure: None,
        };
        tokio::spawn(actor.run());

        Self {
            commands,
            state,
            address,
            encrypted,
        }
    }

    /// Send INIT and flush. The observer settles with the server's
    /// response; [`initialization_completed`] settles alongside it.
    ///
    /// [`initialization_completed`]: Connection::initialization_completed
    pub fn initialize(
        &self,
        user_agent: impl Into<String>,
        auth_token: AuthToken,
        observer: impl StreamObserver + 'static,
    ) {
        self.enqueue(
            BoltRequest::Init(InitMessage::new(user_agent, auth_token)),
            Box::new(observer),
            RequestKind::Init,
            true,
        );
    }

    /// Queue RUN. Not flushed until [`sync`](Connection::sync).
    pub fn run(
        &self,
        statement: impl Into<String>,
        parameters: HashMap<String, Value>,
        observer: impl StreamObserver + 'static,
    ) {
        self.enqueue(
            BoltRequest::Run(RunMessage::new(statement, parameters)),
            Box::new(observer),
            RequestKind::External,
            false,
        );
    }

    /// Queue PULL_ALL. Not flushed until [`sync`](Connection::sync).
    pub fn pull_all(&self, observer: impl StreamObserver + 'static) {
        self.enqueue(
            BoltRequest::PullAll,
            Box::new(observer),
            RequestKind::External,
            false,
        );
    }

    /// Queue DISCARD_ALL. Not flushed until [`sync`](Connection::sync).
    pub fn discard_all(&self, observer: impl StreamObserver + 'static) {
        self.enqueue(
            BoltRequest::DiscardAll,
            Box::new(observer),
            RequestKind::External,
            false,
        );
    }

    /// Queue RESET. Not flushed until [`sync`](Connection::sync).
    ///
    /// Unlike [`reset_async`](Connection::reset_async) this does not mute
    /// failure handling; it is the plain request form.
    pub fn reset(&self, observer: impl StreamObserver + 'static) {
        self.enqueue(
            BoltRequest::Reset,
            Box::new(observer),
            RequestKind::External,
            false,
        );
    }

    /// Queue RESET with failure-handling muted.
    ///
    /// This is the coarse-grained cancel: the server discards all in-flight
    /// work, and the flood of IGNORED responses from already-pipelined
    /// requests settles their observers without triggering an ACK_FAILURE
    /// per failure.
    pub fn reset_async(&self, observer: impl StreamObserver + 'static) {
        self.enqueue(
            BoltRequest::Reset,
            Box::new(observer),
            RequestKind::ResetAsync,
            false,
        );
    }

    /// Flush everything queued so far. Returns immediately; nothing is
    /// awaited.
    pub fn sync(&self) {
        let _ = self.commands.send(Command::Sync);
    }

    /// Close the connection. Queued-but-unsettled observers error with
    /// [`DriverError::Closed`]; the call resolves once the channel is shut
    /// down.
    pub async fn close(&self) {
        let (tx, rx) = oneshot::channel();
        if self.commands.send(Command::Close(tx)).is_ok() {
            let _ = rx.await;
        }
        self.state.mark_closed();
    }

    /// Whether the connection still accepts requests.
    pub fn is_open(&self) -> bool {
        self.state.is_open()
    }

    /// Whether the underlying channel encrypts traffic.
    pub fn is_encrypted(&self) -> bool {
        self.encrypted
    }

    /// The address this connection was opened against.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Await the outcome of initialization: resolves with the server info
    /// on INIT SUCCESS, rejects with the failure otherwise. An init error
    /// that arrives before anyone asks is memorized, not dropped.
    pub async fn initialization_completed(&self) -> DriverResult<ServerInfo> {
        self.state.initialization_completed().await
    }

    /// The server info, once initialization has completed.
    pub fn server_info(&self) -> Option<ServerInfo> {
        self.state.server_info()
    }

    fn enqueue(
        &self,
        message: BoltRequest,
        mut observer: BoxedObserver,
        kind: RequestKind,
        flush: bool,
    ) {
        if self.state.is_broken() {
            observer.on_error(self.state.terminal_error());
            return;
        }

        let command = Command::Request(Request {
            message,
            observer,
            kind,
            flush,
        });
        if let Err(mpsc::error::SendError(command)) = self.commands.send(command) {
            // The I/O task is gone; settle the observer here.
            if let Command::Request(request) = command {
                let mut observer = request.observer;
                observer.on_error(self.state.terminal_error());
            }
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("address", &self.address)
            .field("encrypted", &self.encrypted)
            .field("open", &self.is_open())
            .finish()
    }
}

struct PendingRequest {
    observer: BoxedObserver,
    kind: RequestKind,
}

/// The I/O task: owns the channel halves and every piece of dispatch
/// state. Commands and inbound bytes are interleaved on one task, which
/// gives the single-threaded execution the dispatch discipline relies on.
struct Actor<C: Channel> {
    reader: ReadHalf<C>,
    writer: WriteHalf<C>,
    commands: mpsc::UnboundedReceiver<Command>,
    state: Arc<ConnectionState>,
    address: String,

    chunker: Chunker,
    dechunker: Dechunker,
    packer: Packer,
    registry: MapperRegistry,

    inbound: BytesMut,
    /// Chunked frames awaiting a flush.
    outbound: BytesMut,
    scratch: BytesMut,

    current: Option<PendingRequest>,
    pending: VecDeque<PendingRequest>,
    handling_failure: bool,
    current_failure: Option<DriverError>,
}

impl<C: Channel> Actor<C> {
    async fn run(mut self) {
        if let Err(error) = self.handshake().await {
            self.poison(error);
        } else if let Err(error) = self.drain_inbound().await {
            // The version reply can arrive glued to the first messages.
            self.poison(error);
        }

        loop {
            tokio::select! {
                maybe_command = self.commands.recv() => match maybe_command {
                    Some(Command::Request(request)) => self.handle_request(request).await,
                    Some(Command::Sync) => {
                        if let Err(error) = self.flush().await {
                            self.poison(error);
                        }
                    }
                    Some(Command::Close(ack)) => {
                        self.shutdown().await;
                        let _ = ack.send(());
                        return;
                    }
                    None => {
                        // Every handle is gone; nobody can observe us now.
                        self.shutdown().await;
                        return;
                    }
                },
                read = self.reader.read_buf(&mut self.inbound), if !self.state.is_broken() => {
                    match read {
                        Ok(0) => self.poison(DriverError::transport(
                            "connection closed by remote end",
                        )),
                        Ok(_) => {
                            if let Err(error) = self.drain_inbound().await {
                                self.poison(error);
                            }
                        }
                        Err(error) => self.poison(error.into()),
                    }
                }
            }
        }
    }

    /// Write the fixed 20-byte opening and validate the 4-byte reply.
    /// Any bytes after the reply stay in the inbound buffer for the
    /// dechunker.
    async fn handshake(&mut self) -> DriverResult<()> {
        self.writer.write_all(&handshake_request()).await?;
        self.writer.flush().await?;

        while self.inbound.len() < HANDSHAKE_RESPONSE_SIZE {
            let n = self.reader.read_buf(&mut self.inbound).await?;
            if n == 0 {
                return Err(DriverError::Handshake(
                    HandshakeError::ConnectionClosed.to_string(),
                ));
            }
        }

        let agreed = self.inbound.get_u32();
        check_agreed_version(agreed)
            .map_err(|e| DriverError::Handshake(e.to_string()))?;
        debug!(address = %self.address, version = agreed, "bolt handshake agreed");
        Ok(())
    }

    async fn handle_request(&mut self, request: Request) {
        let Request {
            message,
            mut observer,
            kind,
            flush,
        } = request;

        if self.state.is_broken() {
            observer.on_error(self.state.terminal_error());
            return;
        }

        if kind == RequestKind::ResetAsync {
            // Muted from the moment the RESET is queued, so failures from
            // requests racing ahead of it do not each trigger an ACK.
            self.handling_failure = true;
        }

        debug!(request = message.name(), "queueing request");
        self.enqueue_observer(PendingRequest { observer, kind });

        if let Err(error) = self.write_message(message) {
            self.poison(error);
            return;
        }
        if flush {
            if let Err(error) = self.flush().await {
                self.poison(error);
            }
        }
    }

    /// The queueing discipline: the first unsettled request is `current`,
    /// everything behind it waits in FIFO order.
    fn enqueue_observer(&mut self, request: PendingRequest) {
        if self.current.is_none() {
            self.current = Some(request);
        } else {
            self.pending.push_back(request);
        }
    }

    /// Serialize a message through the packer and chunker into the
    /// outbound buffer. Nothing reaches the buffer on error.
    fn write_message(&mut self, message: BoltRequest) -> DriverResult<()> {
        self.scratch.clear();
        let structure = message.into_structure();
        self.packer
            .pack_structure(&structure, &mut self.scratch)
            .map_err(|e| DriverError::serialization(e.to_string()))?;
        self.chunker
            .encode(&self.scratch[..], &mut self.outbound)
            .map_err(DriverError::from)?;
        Ok(())
    }

    async fn flush(&mut self) -> DriverResult<()> {
        if self.state.is_broken() {
            self.outbound.clear();
            return Ok(());
        }
        if self.outbound.is_empty() {
            return Ok(());
        }
        let buffer = self.outbound.split();
        self.writer.write_all(&buffer).await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Reassemble and dispatch every complete message in the inbound
    /// buffer.
    async fn drain_inbound(&mut self) -> DriverResult<()> {
        loop {
            if self.state.is_broken() {
                self.inbound.clear();
                return Ok(());
            }
            let payload = match self.dechunker.decode(&mut self.inbound) {
                Ok(Some(payload)) => payload,
                Ok(None) => return Ok(()),
                Err(error) => return Err(error.into()),
            };

            let value = unpack(&payload, &self.registry)
                .map_err(|e| DriverError::protocol(e.to_string()))?;
            let structure = value
                .into_structure()
                .ok_or_else(|| DriverError::protocol("inbound message is not a structure"))?;
            let response = BoltResponse::from_structure(structure).map_err(DriverError::from)?;

            debug!(response = response.name(), "dispatching response");
            self.dispatch(response).await?;
        }
    }

    /// Route one response to the observer of the oldest unsettled request.
    /// An error return poisons the connection.
    async fn dispatch(&mut self, response: BoltResponse) -> DriverResult<()> {
        match response {
            BoltResponse::Record(record) => match self.current.as_mut() {
                Some(request) => {
                    request.observer.on_next(record.fields);
                    Ok(())
                }
                None => Err(DriverError::protocol(
                    "RECORD received with no request in flight",
                )),
            },

            BoltResponse::Success(success) => {
                let mut settled = self.advance()?;
                match settled.kind {
                    RequestKind::Init => {
                        let info = self.build_server_info(&success);
                        debug!(agent = ?info.agent, "connection initialized");
                        if let Some(version) = info.version {
                            if !version.supports_byte_arrays() {
                                self.packer.disable_byte_arrays();
                            }
                        }
                        self.state.complete_init(info);
                    }
                    RequestKind::AckFailure | RequestKind::ResetAsync => {
                        self.handling_failure = false;
                        self.current_failure = None;
                    }
                    RequestKind::External => {}
                }
                settled.observer.on_completed(success.metadata);
                Ok(())
            }

            BoltResponse::Failure(failure) => {
                let error = DriverError::Server {
                    code: failure.code,
                    message: failure.message,
                };
                self.current_failure = Some(error.clone());
                let mut settled = self.advance()?;
                match settled.kind {
                    RequestKind::Init => {
                        // A failed INIT leaves no usable connection: record
                        // it, settle the observer, then escalate.
                        self.state.fail_init(error.clone());
                        settled.observer.on_error(error.clone());
                        Err(error)
                    }
                    RequestKind::AckFailure | RequestKind::ResetAsync => {
                        self.handling_failure = false;
                        settled.observer.on_error(error);
                        Ok(())
                    }
                    RequestKind::External => {
                        settled.observer.on_error(error);
                        if !self.handling_failure {
                            self.handling_failure = true;
                            self.acknowledge_failure().await?;
                        }
                        Ok(())
                    }
                }
            }

            BoltResponse::Ignored(_) => {
                let mut settled = self.advance()?;
                if matches!(
                    settled.kind,
                    RequestKind::AckFailure | RequestKind::ResetAsync
                ) {
                    self.handling_failure = false;
                }
                let error = self.current_failure.clone().unwrap_or_else(|| {
                    DriverError::Ignored(
                        "the server dropped the request because of an earlier failure"
                            .to_string(),
                    )
                });
                settled.observer.on_error(error);
                Ok(())
            }
        }
    }

    /// Settle the current slot and promote the next queued request.
    /// Runs before any terminal callback, so a reentrantly submitted
    /// request sees a consistent queue.
    fn advance(&mut self) -> DriverResult<PendingRequest> {
        let settled = self.current.take().ok_or_else(|| {
            DriverError::protocol("terminal response received with no request in flight")
        })?;
        self.current = self.pending.pop_front();
        Ok(settled)
    }

    /// Send the single ACK_FAILURE of a failure episode. Its SUCCESS is
    /// consumed internally and clears the failure bookkeeping.
    async fn acknowledge_failure(&mut self) -> DriverResult<()> {
        debug!("acknowledging server failure");
        self.enqueue_observer(PendingRequest {
            observer: Box::new(NoopObserver),
            kind: RequestKind::AckFailure,
        });
        self.write_message(BoltRequest::AckFailure)?;
        self.flush().await
    }

    fn build_server_info(&self, success: &SuccessMessage) -> ServerInfo {
        let agent = success.server().map(|s| s.to_string());
        let version = agent.as_deref().and_then(ServerVersion::from_agent);
        ServerInfo {
            address: self.address.clone(),
            agent,
            version,
        }
    }

    /// Latch a fatal error and settle every queued observer with it.
    /// No bytes are written after this point.
    fn poison(&mut self, error: DriverError) {
        if !self.state.latch_error(error.clone()) {
            return;
        }
        warn!(address = %self.address, error = %error, "connection poisoned");

        self.state.fail_init(error.clone());
        self.outbound.clear();
        self.inbound.clear();

        if let Some(mut request) = self.current.take() {
            request.observer.on_error(error.clone());
        }
        while let Some(mut request) = self.pending.pop_front() {
            request.observer.on_error(error.clone());
        }
    }

    async fn shutdown(&mut self) {
        self.state.mark_closed();
        let _ = self.flush().await;

        // Requests that never got a terminal settle here.
        let error = self.state.terminal_error();
        self.state.fail_init(error.clone());
        if let Some(mut request) = self.current.take() {
            request.observer.on_error(error.clone());
        }
        while let Some(mut request) = self.pending.pop_front() {
            request.observer.on_error(error.clone());
        }

        let _ = self.writer.shutdown().await;
        debug!(address = %self.address, "connection closed");
    }
}
