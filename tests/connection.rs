//! Connection-level tests over an in-process transport.
//!
//! Each test wires a [`Connection`] to one half of a `tokio::io::duplex`
//! pair and scripts the server on the other half, reassembling the
//! client's messages with the crate's own framing codec and answering with
//! packed responses.

use std::collections::HashMap;
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::sync::mpsc;
use tokio_util::codec::{Decoder, Encoder};

use graphbolt::bolt::chunk::{Chunker, Dechunker};
use graphbolt::bolt::handshake::{BOLT_MAGIC, HANDSHAKE_SIZE};
use graphbolt::bolt::message::signature;
use graphbolt::bolt::packstream::{pack, unpack, MapperRegistry, Structure, Value};
use graphbolt::{AuthToken, CallbackObserver, Connection, DriverError, StreamObserver};

const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Everything an observer saw, tagged with the observer's name. All
/// recorders in a test share one channel, so the receive order is the
/// dispatch order across observers.
#[derive(Debug, Clone)]
enum Event {
    Record(&'static str, Vec<Value>),
    Completed(&'static str, HashMap<String, Value>),
    Error(&'static str, DriverError),
}

struct Recorder {
    name: &'static str,
    events: mpsc::UnboundedSender<Event>,
}

impl StreamObserver for Recorder {
    fn on_next(&mut self, fields: Vec<Value>) {
        let _ = self.events.send(Event::Record(self.name, fields));
    }

    fn on_completed(&mut self, metadata: HashMap<String, Value>) {
        let _ = self.events.send(Event::Completed(self.name, metadata));
    }

    fn on_error(&mut self, error: DriverError) {
        let _ = self.events.send(Event::Error(self.name, error));
    }
}

struct EventLog {
    tx: mpsc::UnboundedSender<Event>,
    rx: mpsc::UnboundedReceiver<Event>,
}

impl EventLog {
    fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx }
    }

    fn observer(&self, name: &'static str) -> Recorder {
        Recorder {
            name,
            events: self.tx.clone(),
        }
    }

    async fn next(&mut self) -> Event {
        tokio::time::timeout(EVENT_TIMEOUT, self.rx.recv())
            .await
            .expect("timed out waiting for an observer event")
            .expect("event channel closed")
    }

    fn assert_empty(&mut self) {
        assert!(
            self.rx.try_recv().is_err(),
            "expected no further observer events"
        );
    }
}

/// The scripted far end of the connection.
struct TestServer {
    stream: DuplexStream,
    inbound: BytesMut,
    chunker: Chunker,
    dechunker: Dechunker,
    registry: MapperRegistry,
}

impl TestServer {
    /// Read and validate the client handshake, then agree on version 1.
    async fn accept(stream: DuplexStream) -> Self {
        Self::accept_with_version(stream, &[0x00, 0x00, 0x00, 0x01]).await
    }

    /// Read the client handshake and reply with arbitrary bytes.
    async fn accept_with_version(mut stream: DuplexStream, reply: &[u8]) -> Self {
        let mut handshake = [0u8; HANDSHAKE_SIZE];
        stream.read_exact(&mut handshake).await.unwrap();

        assert_eq!(&handshake[0..4], &BOLT_MAGIC);
        assert_eq!(&handshake[4..8], &[0x00, 0x00, 0x00, 0x01]);
        assert_eq!(&handshake[8..], &[0u8; 12][..]);

        stream.write_all(reply).await.unwrap();

        Self {
            stream,
            inbound: BytesMut::new(),
            chunker: Chunker::new(),
            dechunker: Dechunker::new(),
            // No mappers: request envelopes stay generic structures.
            registry: MapperRegistry::empty(),
        }
    }

    /// Read the next complete request message.
    async fn read_message(&mut self) -> Structure {
        loop {
            if let Some(payload) = self.dechunker.decode(&mut self.inbound).unwrap() {
                let value = unpack(&payload, &self.registry).unwrap();
                return value.into_structure().expect("request is a structure");
            }
            let n = tokio::time::timeout(EVENT_TIMEOUT, self.stream.read_buf(&mut self.inbound))
                .await
                .expect("timed out waiting for a request")
                .unwrap();
            assert!(n > 0, "client closed while a request was expected");
        }
    }

    /// Send one response message.
    async fn send(&mut self, signature: u8, fields: Vec<Value>) {
        let payload = pack(&Value::Structure(Structure::new(signature, fields))).unwrap();
        let mut framed = BytesMut::new();
        self.chunker.encode(&payload[..], &mut framed).unwrap();
        self.stream.write_all(&framed).await.unwrap();
    }

    async fn send_success(&mut self, metadata: &[(&str, Value)]) {
        self.send(signature::SUCCESS, vec![Value::Map(map(metadata))])
            .await;
    }

    async fn send_record(&mut self, fields: Vec<Value>) {
        self.send(signature::RECORD, vec![Value::List(fields)]).await;
    }

    async fn send_failure(&mut self, code: &str, message: &str) {
        self.send(
            signature::FAILURE,
            vec![Value::Map(map(&[
                ("code", Value::String(code.into())),
                ("message", Value::String(message.into())),
            ]))],
        )
        .await;
    }

    async fn send_ignored(&mut self) {
        self.send(signature::IGNORED, vec![Value::Map(HashMap::new())])
            .await;
    }
}

fn map(entries: &[(&str, Value)]) -> HashMap<String, Value> {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn new_connection() -> (Connection, DuplexStream) {
    let (client, server) = tokio::io::duplex(64 * 1024);
    (Connection::new(client, "testhost:7687"), server)
}

fn node_structure(id: i64, label: &str) -> Value {
    Value::Structure(Structure::new(
        0x4E,
        vec![
            Value::Integer(id),
            Value::List(vec![Value::String(label.into())]),
            Value::Map(HashMap::new()),
        ],
    ))
}

fn unbound_rel_structure(id: i64, rel_type: &str) -> Value {
    Value::Structure(Structure::new(
        0x72,
        vec![
            Value::Integer(id),
            Value::String(rel_type.into()),
            Value::Map(HashMap::new()),
        ],
    ))
}

async fn initialize(
    connection: &Connection,
    server: &mut TestServer,
    agent: &str,
) {
    connection.initialize(
        "GraphBolt-tests/0.0",
        AuthToken::basic("neo4j", "secret"),
        CallbackObserver::new(),
    );
    let init = server.read_message().await;
    assert_eq!(init.signature, signature::INIT);
    server
        .send_success(&[("server", Value::String(agent.into()))])
        .await;
    connection.initialization_completed().await.unwrap();
}

#[tokio::test]
async fn handshake_succeeds_without_observer_traffic() {
    let (connection, server) = new_connection();
    let _server = TestServer::accept(server).await;

    // Give the client a beat to process the version reply.
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(connection.is_open());
    assert!(!connection.is_encrypted());
    assert_eq!(connection.address(), "testhost:7687");
}

#[tokio::test]
async fn http_misdial_rejects_initialization() {
    let (connection, server) = new_connection();
    let _server = TestServer::accept_with_version(server, b"HTTP").await;

    let err = connection.initialization_completed().await.unwrap_err();
    match &err {
        DriverError::Handshake(msg) => {
            assert!(msg.contains("7474"), "diagnostic should name the HTTP port: {}", msg);
            assert!(msg.contains("7687"), "diagnostic should name the Bolt port: {}", msg);
        }
        other => panic!("expected handshake error, got {:?}", other),
    }

    // The connection is poisoned: later requests settle with the same error.
    let mut events = EventLog::new();
    connection.run("RETURN 1", HashMap::new(), events.observer("late"));
    match events.next().await {
        Event::Error("late", DriverError::Handshake(_)) => {}
        other => panic!("expected the latched handshake error, got {:?}", other),
    }
    assert!(!connection.is_open());
}

#[tokio::test]
async fn unknown_version_rejects_initialization() {
    let (connection, server) = new_connection();
    let _server = TestServer::accept_with_version(server, &[0x00, 0x00, 0x00, 0x02]).await;

    let err = connection.initialization_completed().await.unwrap_err();
    match &err {
        DriverError::Handshake(msg) => {
            assert!(msg.contains("unknown Bolt protocol version"), "{}", msg);
        }
        other => panic!("expected handshake error, got {:?}", other),
    }
}

#[tokio::test]
async fn init_resolves_server_info() {
    let (connection, server) = new_connection();
    let mut server = TestServer::accept(server).await;
    let mut events = EventLog::new();

    connection.initialize(
        "GraphBolt-tests/0.0",
        AuthToken::basic("neo4j", "secret"),
        events.observer("init"),
    );

    let init = server.read_message().await;
    assert_eq!(init.signature, signature::INIT);
    assert_eq!(init.fields[0].as_str(), Some("GraphBolt-tests/0.0"));
    let token = init.fields[1].as_map().unwrap();
    assert_eq!(token.get("scheme").unwrap().as_str(), Some("basic"));
    assert_eq!(token.get("principal").unwrap().as_str(), Some("neo4j"));
    assert_eq!(token.get("credentials").unwrap().as_str(), Some("secret"));

    server
        .send_success(&[("server", Value::String("Neo4j/3.4.0".into()))])
        .await;

    match events.next().await {
        Event::Completed("init", metadata) => {
            assert_eq!(metadata.get("server").unwrap().as_str(), Some("Neo4j/3.4.0"));
        }
        other => panic!("expected init completion, got {:?}", other),
    }

    let info = connection.initialization_completed().await.unwrap();
    assert_eq!(info.agent.as_deref(), Some("Neo4j/3.4.0"));
    assert_eq!(info.version.unwrap().to_string(), "3.4.0");
    assert_eq!(info.address, "testhost:7687");
    assert_eq!(connection.server_info(), Some(info));
}

#[tokio::test]
async fn pipelined_run_and_pull_dispatch_in_order() {
    let (connection, server) = new_connection();
    let mut server = TestServer::accept(server).await;
    let mut events = EventLog::new();

    connection.run("RETURN 1 AS n", HashMap::new(), events.observer("run"));
    connection.pull_all(events.observer("pull"));
    connection.sync();

    let run = server.read_message().await;
    assert_eq!(run.signature, signature::RUN);
    assert_eq!(run.fields[0].as_str(), Some("RETURN 1 AS n"));
    assert!(run.fields[1].as_map().unwrap().is_empty());

    let pull = server.read_message().await;
    assert_eq!(pull.signature, signature::PULL_ALL);
    assert!(pull.fields.is_empty());

    server
        .send_success(&[(
            "fields",
            Value::List(vec![Value::String("n".into())]),
        )])
        .await;
    server.send_record(vec![Value::Integer(1)]).await;
    server
        .send_success(&[("type", Value::String("r".into()))])
        .await;

    match events.next().await {
        Event::Completed("run", metadata) => {
            assert_eq!(
                metadata.get("fields").unwrap().as_list().unwrap()[0].as_str(),
                Some("n")
            );
        }
        other => panic!("expected run completion first, got {:?}", other),
    }
    match events.next().await {
        Event::Record("pull", fields) => assert_eq!(fields, vec![Value::Integer(1)]),
        other => panic!("expected the record second, got {:?}", other),
    }
    match events.next().await {
        Event::Completed("pull", metadata) => {
            assert_eq!(metadata.get("type").unwrap().as_str(), Some("r"));
        }
        other => panic!("expected pull completion last, got {:?}", other),
    }
    events.assert_empty();
}

#[tokio::test]
async fn failure_acknowledged_once_and_ignored_carries_cause() {
    let (connection, server) = new_connection();
    let mut server = TestServer::accept(server).await;
    let mut events = EventLog::new();

    connection.run("BAD", HashMap::new(), events.observer("run"));
    connection.pull_all(events.observer("pull"));
    connection.sync();

    assert_eq!(server.read_message().await.signature, signature::RUN);
    assert_eq!(server.read_message().await.signature, signature::PULL_ALL);

    server.send_failure("Neo.ClientError.Statement.SyntaxError", "nope").await;
    server.send_ignored().await;

    // Exactly one ACK_FAILURE follows; its SUCCESS is consumed internally.
    let ack = server.read_message().await;
    assert_eq!(ack.signature, signature::ACK_FAILURE);
    server.send_success(&[]).await;

    match events.next().await {
        Event::Error("run", DriverError::Server { code, message }) => {
            assert_eq!(code, "Neo.ClientError.Statement.SyntaxError");
            assert_eq!(message, "nope");
        }
        other => panic!("expected the run failure, got {:?}", other),
    }
    match events.next().await {
        Event::Error("pull", DriverError::Server { code, .. }) => {
            assert_eq!(code, "Neo.ClientError.Statement.SyntaxError");
        }
        other => panic!("expected the ignored pull to carry the failure, got {:?}", other),
    }

    // The connection is still usable, and the next wire message is the new
    // RUN, proving no second ACK was sent.
    connection.run("RETURN 2", HashMap::new(), events.observer("after"));
    connection.sync();
    assert_eq!(server.read_message().await.signature, signature::RUN);
    server.send_success(&[]).await;

    match events.next().await {
        Event::Completed("after", _) => {}
        other => panic!("expected recovery after ACK, got {:?}", other),
    }
    assert!(connection.is_open());
    events.assert_empty();
}

#[tokio::test]
async fn consecutive_failures_share_one_ack() {
    let (connection, server) = new_connection();
    let mut server = TestServer::accept(server).await;
    let mut events = EventLog::new();

    connection.run("BAD 1", HashMap::new(), events.observer("first"));
    connection.run("BAD 2", HashMap::new(), events.observer("second"));
    connection.sync();

    assert_eq!(server.read_message().await.signature, signature::RUN);
    assert_eq!(server.read_message().await.signature, signature::RUN);

    // Both failures land before the client's ACK is answered.
    server.send_failure("Neo.X", "first failure").await;
    server.send_failure("Neo.Y", "second failure").await;

    assert_eq!(server.read_message().await.signature, signature::ACK_FAILURE);
    server.send_success(&[]).await;

    match events.next().await {
        Event::Error("first", DriverError::Server { code, .. }) => assert_eq!(code, "Neo.X"),
        other => panic!("unexpected event {:?}", other),
    }
    match events.next().await {
        Event::Error("second", DriverError::Server { code, .. }) => assert_eq!(code, "Neo.Y"),
        other => panic!("unexpected event {:?}", other),
    }

    // Next wire message must be a RUN, not another ACK_FAILURE.
    connection.run("RETURN 1", HashMap::new(), events.observer("after"));
    connection.sync();
    assert_eq!(server.read_message().await.signature, signature::RUN);
    server.send_success(&[]).await;
    match events.next().await {
        Event::Completed("after", _) => {}
        other => panic!("unexpected event {:?}", other),
    }
}

#[tokio::test]
async fn reset_async_mutes_failure_acknowledgement() {
    let (connection, server) = new_connection();
    let mut server = TestServer::accept(server).await;
    let mut events = EventLog::new();

    connection.run("SLOW", HashMap::new(), events.observer("run"));
    connection.pull_all(events.observer("pull"));
    connection.sync();
    connection.reset_async(events.observer("reset"));
    connection.sync();

    assert_eq!(server.read_message().await.signature, signature::RUN);
    assert_eq!(server.read_message().await.signature, signature::PULL_ALL);
    assert_eq!(server.read_message().await.signature, signature::RESET);

    // The reset is already queued, so this failure must not trigger an ACK.
    server.send_failure("Neo.Terminated", "interrupted").await;
    server.send_ignored().await;
    server.send_success(&[]).await;

    match events.next().await {
        Event::Error("run", DriverError::Server { code, .. }) => {
            assert_eq!(code, "Neo.Terminated");
        }
        other => panic!("unexpected event {:?}", other),
    }
    match events.next().await {
        Event::Error("pull", DriverError::Server { code, .. }) => {
            assert_eq!(code, "Neo.Terminated");
        }
        other => panic!("unexpected event {:?}", other),
    }
    match events.next().await {
        Event::Completed("reset", _) => {}
        other => panic!("unexpected event {:?}", other),
    }

    // The wire after RESET carries the new RUN directly: no ACK_FAILURE.
    connection.run("RETURN 1", HashMap::new(), events.observer("after"));
    connection.sync();
    assert_eq!(server.read_message().await.signature, signature::RUN);
    server.send_success(&[]).await;
    match events.next().await {
        Event::Completed("after", _) => {}
        other => panic!("unexpected event {:?}", other),
    }
}

#[tokio::test]
async fn plain_reset_still_acknowledges_failures() {
    let (connection, server) = new_connection();
    let mut server = TestServer::accept(server).await;
    let mut events = EventLog::new();

    connection.run("BAD", HashMap::new(), events.observer("run"));
    connection.reset(events.observer("reset"));
    connection.sync();

    assert_eq!(server.read_message().await.signature, signature::RUN);
    assert_eq!(server.read_message().await.signature, signature::RESET);

    server.send_failure("Neo.X", "nope").await;

    // Plain RESET does not mute failure handling: an ACK goes out.
    assert_eq!(server.read_message().await.signature, signature::ACK_FAILURE);

    server.send_success(&[]).await; // settles the RESET
    server.send_success(&[]).await; // settles the internal ACK observer

    match events.next().await {
        Event::Error("run", DriverError::Server { .. }) => {}
        other => panic!("unexpected event {:?}", other),
    }
    match events.next().await {
        Event::Completed("reset", _) => {}
        other => panic!("unexpected event {:?}", other),
    }
    events.assert_empty();
}

#[tokio::test]
async fn remote_close_breaks_the_connection() {
    let (connection, server) = new_connection();
    let server = TestServer::accept(server).await;
    let mut events = EventLog::new();

    connection.run("RETURN 1", HashMap::new(), events.observer("inflight"));
    connection.sync();

    // Drop the server: the client sees EOF and poisons itself.
    drop(server);

    match events.next().await {
        Event::Error("inflight", DriverError::Transport(_)) => {}
        other => panic!("expected a transport error, got {:?}", other),
    }
    assert!(!connection.is_open());

    // Every later request settles with the latched error.
    connection.run("RETURN 2", HashMap::new(), events.observer("late"));
    match events.next().await {
        Event::Error("late", DriverError::Transport(_)) => {}
        other => panic!("expected the latched error, got {:?}", other),
    }
}

#[tokio::test]
async fn byte_arrays_rejected_below_3_2() {
    let (connection, server) = new_connection();
    let mut server = TestServer::accept(server).await;
    let mut events = EventLog::new();

    initialize(&connection, &mut server, "Neo4j/3.1.0").await;

    let mut params = HashMap::new();
    params.insert("blob".to_string(), Value::Bytes(vec![1, 2, 3]));
    connection.run("RETURN $blob", params, events.observer("run"));

    match events.next().await {
        Event::Error("run", DriverError::Serialization(msg)) => {
            assert!(msg.contains("3.2.0"), "{}", msg);
        }
        other => panic!("expected a serialization error, got {:?}", other),
    }
    // Serialization leaves the wire state indeterminate: poisoned.
    assert!(!connection.is_open());
}

#[tokio::test]
async fn byte_arrays_accepted_from_3_2() {
    let (connection, server) = new_connection();
    let mut server = TestServer::accept(server).await;
    let mut events = EventLog::new();

    initialize(&connection, &mut server, "Neo4j/3.2.0").await;

    let mut params = HashMap::new();
    params.insert("blob".to_string(), Value::Bytes(vec![1, 2, 3]));
    connection.run("RETURN $blob", params, events.observer("run"));
    connection.sync();

    let run = server.read_message().await;
    assert_eq!(run.signature, signature::RUN);
    assert_eq!(
        run.fields[1].as_map().unwrap().get("blob").unwrap().as_bytes(),
        Some(&[1u8, 2, 3][..])
    );

    server.send_success(&[]).await;
    match events.next().await {
        Event::Completed("run", _) => {}
        other => panic!("unexpected event {:?}", other),
    }
}

#[tokio::test]
async fn records_hydrate_graph_entities() {
    let (connection, server) = new_connection();
    let mut server = TestServer::accept(server).await;
    let mut events = EventLog::new();

    connection.run("MATCH p = ...", HashMap::new(), events.observer("run"));
    connection.pull_all(events.observer("pull"));
    connection.sync();

    assert_eq!(server.read_message().await.signature, signature::RUN);
    assert_eq!(server.read_message().await.signature, signature::PULL_ALL);

    server.send_success(&[]).await;

    // A node, and a path over three nodes where the second relationship is
    // traversed against its stored direction.
    let path = Value::Structure(Structure::new(
        0x50,
        vec![
            Value::List(vec![
                node_structure(10, "A"),
                node_structure(11, "B"),
                node_structure(12, "C"),
            ]),
            Value::List(vec![
                unbound_rel_structure(100, "LINKS"),
                unbound_rel_structure(200, "LINKS"),
            ]),
            Value::List(vec![
                Value::Integer(1),
                Value::Integer(1),
                Value::Integer(-2),
                Value::Integer(2),
            ]),
        ],
    ));
    server
        .send_record(vec![node_structure(7, "Person"), path])
        .await;
    server.send_success(&[]).await;

    match events.next().await {
        Event::Completed("run", _) => {}
        other => panic!("unexpected event {:?}", other),
    }
    match events.next().await {
        Event::Record("pull", fields) => {
            match &fields[0] {
                Value::Node(node) => {
                    assert_eq!(node.id, 7);
                    assert_eq!(node.labels, vec!["Person"]);
                }
                other => panic!("expected a hydrated node, got {:?}", other),
            }
            match &fields[1] {
                Value::Path(path) => {
                    assert_eq!(path.start.id, 10);
                    assert_eq!(path.end.id, 12);
                    assert_eq!(path.segments.len(), 2);
                    // Forward traversal binds 10 -> 11.
                    assert_eq!(path.segments[0].relationship.start_node_id, 10);
                    assert_eq!(path.segments[0].relationship.end_node_id, 11);
                    // Reverse traversal binds 12 -> 11.
                    assert_eq!(path.segments[1].relationship.start_node_id, 12);
                    assert_eq!(path.segments[1].relationship.end_node_id, 11);
                    assert_eq!(path.segments[1].start.id, 11);
                    assert_eq!(path.segments[1].end.id, 12);
                }
                other => panic!("expected a hydrated path, got {:?}", other),
            }
        }
        other => panic!("unexpected event {:?}", other),
    }
    match events.next().await {
        Event::Completed("pull", _) => {}
        other => panic!("unexpected event {:?}", other),
    }
}

#[tokio::test]
async fn unknown_response_signature_is_fatal() {
    let (connection, server) = new_connection();
    let mut server = TestServer::accept(server).await;
    let mut events = EventLog::new();

    connection.run("RETURN 1", HashMap::new(), events.observer("run"));
    connection.sync();
    assert_eq!(server.read_message().await.signature, signature::RUN);

    server.send(0x5A, vec![]).await;

    match events.next().await {
        Event::Error("run", DriverError::Protocol(msg)) => {
            assert!(msg.contains("0x5A"), "{}", msg);
        }
        other => panic!("expected a protocol error, got {:?}", other),
    }
    assert!(!connection.is_open());
}

#[tokio::test]
async fn close_settles_queued_observers() {
    let (connection, server) = new_connection();
    let mut server = TestServer::accept(server).await;
    let mut events = EventLog::new();

    connection.run("RETURN 1", HashMap::new(), events.observer("run"));
    connection.sync();
    assert_eq!(server.read_message().await.signature, signature::RUN);

    // Close before the server answers.
    connection.close().await;

    match events.next().await {
        Event::Error("run", DriverError::Closed) => {}
        other => panic!("expected Closed, got {:?}", other),
    }
    assert!(!connection.is_open());

    // Requests after close are rejected outright.
    connection.run("RETURN 2", HashMap::new(), events.observer("late"));
    match events.next().await {
        Event::Error("late", DriverError::Closed) => {}
        other => panic!("expected Closed for the late request, got {:?}", other),
    }
}

#[tokio::test]
async fn observers_settle_exactly_once_across_many_requests() {
    let (connection, server) = new_connection();
    let mut server = TestServer::accept(server).await;
    let mut events = EventLog::new();

    let names = ["q0", "q1", "q2", "q3", "q4"];
    for name in names {
        connection.run(format!("RETURN '{}'", name), HashMap::new(), events.observer(name));
    }
    connection.sync();

    for _ in names {
        assert_eq!(server.read_message().await.signature, signature::RUN);
    }
    for (i, _) in names.iter().enumerate() {
        server
            .send_success(&[("n", Value::Integer(i as i64))])
            .await;
    }

    // Terminals arrive in submission order, exactly one each.
    for (i, name) in names.iter().enumerate() {
        match events.next().await {
            Event::Completed(got, metadata) => {
                assert_eq!(got, *name);
                assert_eq!(metadata.get("n").unwrap().as_int(), Some(i as i64));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }
    events.assert_empty();
}
