//! Behavioural tests for correlated requests through the facade.

use std::cell::RefCell;
use std::sync::{Arc, Weak};
use std::time::Duration;

use ice_config::PoolSettings;
use ice_protocol::{ClazzCheck, Envelope, Pack, Payload};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};

use crate::channel::ClientChannel;
use crate::clock::{Clock, SystemClock};
use crate::errors::ClientError;
use crate::manager::ClientManager;
use crate::tests::support::RecordingChannel;

struct CorrelationWorld {
    manager: Arc<ClientManager>,
    client: Option<Arc<RecordingChannel>>,
    check: Option<ClazzCheck>,
    error: Option<ClientError>,
}

impl CorrelationWorld {
    fn new() -> Self {
        Self {
            manager: Arc::new(ClientManager::new(
                Arc::new(SystemClock) as Arc<dyn Clock>,
                PoolSettings::default(),
                Duration::from_millis(150),
            )),
            client: None,
            check: None,
            error: None,
        }
    }

    fn connect(&mut self, app: i32) -> Arc<RecordingChannel> {
        let channel = RecordingChannel::new();
        self.manager.handle_inbound(
            &channel.handle(),
            Envelope::request(
                app,
                Payload::Init {
                    address: "bdd-client".to_owned(),
                },
            ),
        );
        self.client = Some(Arc::clone(&channel));
        channel
    }

    fn client(&self) -> &Arc<RecordingChannel> {
        self.client.as_ref().expect("a client should be connected")
    }
}

#[fixture]
fn world() -> RefCell<CorrelationWorld> {
    RefCell::new(CorrelationWorld::new())
}

#[given("a client of app {app} that approves every class")]
fn given_approving_client(world: &RefCell<CorrelationWorld>, app: i32) {
    let channel = world.borrow_mut().connect(app);
    let manager: Weak<ClientManager> = Arc::downgrade(&world.borrow().manager);
    let peer: Weak<RecordingChannel> = Arc::downgrade(&channel);
    channel.set_hook(Box::new(move |request| {
        let (Some(manager), Some(peer)) = (manager.upgrade(), peer.upgrade()) else {
            return;
        };
        let response =
            Envelope::response_to(request, Payload::ClazzCheckResult(ClazzCheck::passed()));
        manager.handle_inbound(&peer.handle(), response);
    }));
}

#[given("a client of app {app} that never answers")]
fn given_silent_client(world: &RefCell<CorrelationWorld>, app: i32) {
    world.borrow_mut().connect(app);
}

#[when("the server checks class \"{clazz}\" as node type {node_type}")]
fn when_server_checks_class(world: &RefCell<CorrelationWorld>, clazz: String, node_type: u8) {
    let manager = Arc::clone(&world.borrow().manager);
    match manager.conf_clazz_check(1, &clazz, node_type) {
        Ok(check) => world.borrow_mut().check = Some(check),
        Err(error) => world.borrow_mut().error = Some(error),
    }
}

#[when("the server requests the rule tree for configuration {conf_id}")]
fn when_server_requests_tree(world: &RefCell<CorrelationWorld>, conf_id: i64) {
    let manager = Arc::clone(&world.borrow().manager);
    if let Err(error) = manager.get_client_show_conf(1, conf_id, None) {
        world.borrow_mut().error = Some(error);
    }
}

#[when("the server requests a mock evaluation for app {app}")]
fn when_server_requests_mock(world: &RefCell<CorrelationWorld>, app: i32) {
    let manager = Arc::clone(&world.borrow().manager);
    if let Err(error) = manager.mock(app, Pack::default()) {
        world.borrow_mut().error = Some(error);
    }
}

#[then("the check passes")]
fn then_check_passes(world: &RefCell<CorrelationWorld>) {
    let world = world.borrow();
    assert!(world.error.is_none(), "unexpected error {:?}", world.error);
    assert_eq!(world.check, Some(ClazzCheck::passed()));
}

#[then("the client received {count} request with an id")]
fn then_client_received(world: &RefCell<CorrelationWorld>, count: usize) {
    let sent = world.borrow().client().sent();
    assert_eq!(sent.len(), count);
    assert!(sent.iter().all(|envelope| envelope.id().is_some()));
}

#[then("the request fails with code \"{code}\"")]
fn then_request_fails(world: &RefCell<CorrelationWorld>, code: String) {
    let world = world.borrow();
    let error = world.error.as_ref().expect("request should fail");
    assert_eq!(error.code().to_string(), code);
}

#[then("a late answer is dropped")]
fn then_late_answer_dropped(world: &RefCell<CorrelationWorld>) {
    let world = world.borrow();
    let channel = world.client();
    let request = channel.sent().into_iter().next().expect("request was sent");
    let late = Envelope::response_to(&request, Payload::ShowConfResult(None));
    let handle: Arc<dyn ClientChannel> = channel.handle();
    world.manager.handle_inbound(&handle, late);
    assert_eq!(world.manager.in_flight(), 0);
    assert!(matches!(world.error, Some(ClientError::Timeout { .. })));
}

#[scenario(path = "tests/features/correlated_requests.feature")]
fn correlated_requests(#[from(world)] world: RefCell<CorrelationWorld>) {
    drop(world);
}
