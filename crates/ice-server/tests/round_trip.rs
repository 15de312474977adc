//! End-to-end tests: a real server and real clients over loopback TCP.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use ice_client::{
    Capability, ClassRegistry, ClientConfig, ClientEngine, ConfView, IceClient, LeafKind, Node,
    NodeGraph, RelationKind,
};
use ice_config::{Config, SocketEndpoint};
use ice_protocol::{ClazzCheck, Context, Pack, TransferDto};
use ice_server::{ClientError, ErrorCode, IceServer, SystemClock};
use rstest::{fixture, rstest};

#[derive(Debug, Default)]
struct FixtureEngine {
    confs: HashMap<i64, ConfView>,
    updates: Mutex<Vec<TransferDto>>,
}

impl FixtureEngine {
    fn with_tree() -> Arc<Self> {
        let graph: NodeGraph = [
            Node::relation(1, RelationKind::And, vec![2, 3]),
            Node::leaf(2, LeafKind::Flow).with_debug(false),
            Node::leaf(3, LeafKind::Result).with_inverse(true),
        ]
        .into_iter()
        .collect();
        let mut confs = HashMap::new();
        confs.insert(
            100,
            ConfView {
                graph: Arc::new(graph),
                root: 1,
            },
        );
        Arc::new(Self {
            confs,
            updates: Mutex::default(),
        })
    }

    fn versions(&self) -> Vec<i64> {
        self.updates
            .lock()
            .expect("updates lock")
            .iter()
            .map(|dto| dto.version)
            .collect()
    }
}

impl ClientEngine for FixtureEngine {
    fn conf(&self, conf_id: i64) -> Option<ConfView> {
        self.confs.get(&conf_id).cloned()
    }

    fn process(&self, pack: &Pack) -> Vec<Context> {
        vec![Context {
            ice_id: pack.ice_id,
            pack: pack.clone(),
            process_info: "[1:AND-T]".to_owned(),
        }]
    }

    fn update(&self, dto: &TransferDto) -> Vec<String> {
        self.updates.lock().expect("updates lock").push(dto.clone());
        Vec::new()
    }
}

#[fixture]
fn server() -> IceServer {
    let config = Config {
        listen_socket: SocketEndpoint::tcp("127.0.0.1", 0),
        client_rsp_timeout_ms: 2_000,
        ..Config::default()
    };
    IceServer::start(&config, Arc::new(SystemClock)).expect("server should start")
}

fn connect(server: &IceServer, app: i32, address: &str, engine: Arc<FixtureEngine>) -> IceClient {
    let loader = ClassRegistry::new().with_class("com.example.ScoreFlow", [Capability::FlowLeaf]);
    let client = IceClient::connect(
        ClientConfig::new(app, address, server.endpoint().clone()),
        engine,
        Arc::new(loader),
    )
    .expect("client should connect");
    let registered = wait_until(|| {
        server
            .manager()
            .registered_clients(app)
            .contains(address)
    });
    assert!(registered, "{address} never registered");
    client
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
fn clazz_check_round_trip(server: IceServer) {
    let client = connect(&server, 7, "host-a", FixtureEngine::with_tree());
    let manager = server.manager();

    let passed = manager
        .conf_clazz_check(7, "com.example.ScoreFlow", 5)
        .expect("check answered");
    let mismatch = manager
        .conf_clazz_check(7, "com.example.ScoreFlow", 3)
        .expect("check answered");

    assert_eq!(passed, ClazzCheck::passed());
    assert_eq!(
        mismatch,
        ClazzCheck::failed("type not match in host-a input(com.example.ScoreFlow|3)")
    );
    assert_eq!(manager.in_flight(), 0);
    client.shutdown();
}

#[rstest]
fn show_conf_comes_from_the_pinned_client(server: IceServer) {
    let first = connect(&server, 7, "host-a", FixtureEngine::with_tree());
    let second = connect(&server, 7, "host-b", Arc::new(FixtureEngine::default()));

    let shown = server
        .manager()
        .get_client_show_conf(7, 100, Some("host-a"))
        .expect("show conf answered")
        .expect("client returns a view");
    let empty = server
        .manager()
        .get_client_show_conf(7, 100, Some("host-b"))
        .expect("show conf answered")
        .expect("client returns a view");

    assert_eq!(shown.address, "host-a");
    let root = shown.root.expect("host-a holds conf 100");
    assert_eq!(root.node_id(), 1);
    let children: Vec<_> = root
        .children()
        .iter()
        .map(|child| (child.node_id(), child.show_conf.debug, child.show_conf.inverse))
        .collect();
    assert_eq!(children, vec![(2, Some(false), None), (3, None, Some(true))]);
    assert!(empty.root.is_none());

    first.shutdown();
    second.shutdown();
}

#[rstest]
fn mock_returns_client_contexts(server: IceServer) {
    let client = connect(&server, 3, "host-a", FixtureEngine::with_tree());

    let contexts = server
        .manager()
        .mock(
            3,
            Pack {
                ice_id: 55,
                ..Pack::default()
            },
        )
        .expect("mock answered");

    assert_eq!(contexts.len(), 1);
    assert_eq!(contexts[0].ice_id, 55);
    assert_eq!(contexts[0].process_info, "[1:AND-T]");
    client.shutdown();
}

#[rstest]
fn release_reaches_every_client_of_the_app(server: IceServer) {
    let engines = [
        FixtureEngine::with_tree(),
        FixtureEngine::with_tree(),
        FixtureEngine::with_tree(),
    ];
    let clients = [
        connect(&server, 5, "host-a", Arc::clone(&engines[0])),
        connect(&server, 5, "host-b", Arc::clone(&engines[1])),
        connect(&server, 6, "host-c", Arc::clone(&engines[2])),
    ];

    server.manager().release(
        5,
        &TransferDto {
            version: 12,
            ..TransferDto::default()
        },
    );

    assert!(wait_until(|| engines[0].versions() == vec![12]));
    assert!(wait_until(|| engines[1].versions() == vec![12]));
    assert!(engines[2].versions().is_empty());
    for client in clients {
        client.shutdown();
    }
}

#[rstest]
fn disconnected_clients_are_no_longer_available(server: IceServer) {
    let client = connect(&server, 9, "host-a", FixtureEngine::with_tree());
    client.shutdown();

    assert!(wait_until(|| server.manager().registered_clients(9).is_empty()));
    let error = server
        .manager()
        .mock(9, Pack::default())
        .expect_err("no client remains");

    assert!(matches!(error, ClientError::NoAvailableClient { .. }));
    assert_eq!(error.code(), ErrorCode::NoAvailableClient);
}

#[rstest]
fn stopping_the_server_disconnects_clients(server: IceServer) {
    let client = connect(&server, 4, "host-a", FixtureEngine::with_tree());
    let manager = Arc::clone(server.manager());

    server.stop().expect("server should stop");

    assert!(wait_until(|| !client.is_connected()));
    assert!(manager.registered_clients(4).is_empty());
    client.shutdown();
}
