//! Runtime tests against a scripted server socket.

use std::io::Write;
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::time::{Duration, Instant};

use ice_config::SocketEndpoint;
use ice_protocol::{
    ClazzCheck, Envelope, FrameReader, FrameWriter, MessageKind, Op, Payload, TransferDto,
};
use rstest::{fixture, rstest};

use super::{ClientConfig, IceClient};
use crate::clazz::{Capability, ClassRegistry};
use crate::errors::ConnectError;
use crate::tests::support::MemoryEngine;

struct FakeServer {
    listener: TcpListener,
    port: u16,
}

impl FakeServer {
    fn accept(&self) -> (FrameReader<TcpStream>, FrameWriter<TcpStream>) {
        let (stream, _) = self.listener.accept().expect("accept client");
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .expect("set read timeout");
        let writer = stream.try_clone().expect("clone stream");
        (FrameReader::new(stream), FrameWriter::new(writer))
    }
}

#[fixture]
fn server() -> FakeServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind fake server");
    let port = listener.local_addr().expect("local addr").port();
    FakeServer { listener, port }
}

fn config(port: u16) -> ClientConfig {
    ClientConfig::new(9, "10.1.1.1/77", SocketEndpoint::tcp("127.0.0.1", port))
        .with_heartbeat_interval(Duration::from_secs(60))
}

fn connect(config: ClientConfig, engine: Arc<MemoryEngine>) -> IceClient {
    let loader = ClassRegistry::new().with_class("com.example.Flow", [Capability::FlowLeaf]);
    IceClient::connect(config, engine, Arc::new(loader)).expect("client connects")
}

fn next(reader: &mut FrameReader<TcpStream>) -> Envelope {
    reader
        .read_envelope()
        .expect("read frame")
        .expect("stream still open")
}

fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    false
}

#[rstest]
fn connect_sends_init_first(server: FakeServer) {
    let client = connect(config(server.port), MemoryEngine::new());
    let (mut reader, _writer) = server.accept();

    let init = next(&mut reader);

    assert_eq!(init.op, Op::Init);
    assert_eq!(init.app, 9);
    assert_eq!(
        init.payload,
        Payload::Init {
            address: "10.1.1.1/77".to_owned()
        }
    );
    assert_eq!(client.address(), "10.1.1.1/77");
    client.shutdown();
}

#[rstest]
fn heartbeats_follow_the_interval(server: FakeServer) {
    let client = connect(
        config(server.port).with_heartbeat_interval(Duration::from_millis(20)),
        MemoryEngine::new(),
    );
    let (mut reader, _writer) = server.accept();
    assert_eq!(next(&mut reader).op, Op::Init);

    for _ in 0..2 {
        let slap = next(&mut reader);
        assert_eq!(slap.op, Op::Slap);
        assert_eq!(slap.kind, MessageKind::Req);
    }
    client.shutdown();
}

#[rstest]
fn correlated_requests_are_answered(server: FakeServer) {
    let client = connect(config(server.port), MemoryEngine::new());
    let (mut reader, mut writer) = server.accept();
    assert_eq!(next(&mut reader).op, Op::Init);

    let request = Envelope::request(
        9,
        Payload::ClazzCheck {
            clazz: "com.example.Flow".to_owned(),
            node_type: 6,
        },
    )
    .with_id("abc");
    writer.write_envelope(&request).expect("send request");

    let response = next(&mut reader);
    assert_eq!(response.id(), Some("abc"));
    assert_eq!(
        response.payload,
        Payload::ClazzCheckResult(ClazzCheck::failed(
            "type not match in 10.1.1.1/77 input(com.example.Flow|6)"
        ))
    );
    client.shutdown();
}

#[rstest]
fn updates_reach_the_engine(server: FakeServer) {
    let engine = MemoryEngine::new();
    let client = connect(config(server.port), Arc::clone(&engine));
    let (mut reader, mut writer) = server.accept();
    assert_eq!(next(&mut reader).op, Op::Init);

    let mut raw = writer.get_ref();
    raw.write_all(b"{ not json\n").expect("send garbage");
    let dto = TransferDto {
        version: 3,
        ..TransferDto::default()
    };
    writer
        .write_envelope(&Envelope::request(9, Payload::Update(dto.clone())))
        .expect("send update");

    assert!(wait_until(|| engine.updates() == vec![dto.clone()]));
    assert!(client.is_connected());
    client.shutdown();
}

#[rstest]
fn server_close_marks_the_client_disconnected(server: FakeServer) {
    let client = connect(config(server.port), MemoryEngine::new());
    let (mut reader, writer) = server.accept();
    assert_eq!(next(&mut reader).op, Op::Init);

    drop(writer);
    drop(reader);

    assert!(wait_until(|| !client.is_connected()));
    client.shutdown();
}

#[rstest]
fn shutdown_closes_the_stream(server: FakeServer) {
    let client = connect(config(server.port), MemoryEngine::new());
    let (mut reader, _writer) = server.accept();
    assert_eq!(next(&mut reader).op, Op::Init);

    client.shutdown();

    assert!(reader.read_envelope().expect("clean close").is_none());
}

#[rstest]
fn unreachable_server_is_reported(server: FakeServer) {
    let port = server.port;
    drop(server);

    let error = IceClient::connect(
        config(port).with_connect_timeout(Duration::from_millis(500)),
        MemoryEngine::new(),
        Arc::new(ClassRegistry::new()),
    )
    .expect_err("nothing is listening");

    assert!(matches!(error, ConnectError::Connect { .. }));
}
