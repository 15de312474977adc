//! Server-side request facade.
//!
//! [`ClientManager`] owns the registry, the pending-request table and the
//! release pool, and exposes the four operations the rest of the server
//! calls. It is also the sink for every envelope read from a client.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use ice_config::PoolSettings;
use ice_protocol::{
    ClazzCheck, Context, Envelope, MessageKind, Op, Pack, Payload, ShowConf, TransferDto,
};
use tracing::{debug, warn};

use crate::channel::{ChannelId, ClientChannel};
use crate::clock::Clock;
use crate::correlation::PendingRequests;
use crate::errors::ClientError;
use crate::registry::{ClientRegistry, Registration};
use crate::release::ReleasePool;

const MANAGER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::manager");

/// Entry point for server-to-client operations.
#[derive(Debug)]
pub struct ClientManager {
    registry: Arc<ClientRegistry>,
    pending: Arc<PendingRequests>,
    pool: ReleasePool,
    timeout: Duration,
}

impl ClientManager {
    /// Builds a manager with fresh state.
    pub fn new(clock: Arc<dyn Clock>, pool: PoolSettings, timeout: Duration) -> Self {
        Self {
            registry: Arc::new(ClientRegistry::new(clock)),
            pending: Arc::new(PendingRequests::new()),
            pool: ReleasePool::new(pool),
            timeout,
        }
    }

    /// Shared registry, for the reaper.
    pub fn registry(&self) -> &Arc<ClientRegistry> {
        &self.registry
    }

    /// Asks one client of `app` whether `clazz` can back a node of type
    /// `node_type`.
    pub fn conf_clazz_check(
        &self,
        app: i32,
        clazz: &str,
        node_type: u8,
    ) -> Result<ClazzCheck, ClientError> {
        let payload = Payload::ClazzCheck {
            clazz: clazz.to_owned(),
            node_type,
        };
        match self.call(app, None, payload)? {
            Payload::ClazzCheckResult(check) => Ok(check),
            _ => Err(ClientError::UnexpectedResponse { op: Op::ClazzCheck }),
        }
    }

    /// Fetches the materialized rule tree for `conf_id`, from `address` when
    /// given or from the most recently seen client otherwise.
    pub fn get_client_show_conf(
        &self,
        app: i32,
        conf_id: i64,
        address: Option<&str>,
    ) -> Result<Option<ShowConf>, ClientError> {
        match self.call(app, address, Payload::ShowConf { conf_id })? {
            Payload::ShowConfResult(conf) => Ok(conf),
            _ => Err(ClientError::UnexpectedResponse { op: Op::ShowConf }),
        }
    }

    /// Evaluates `pack` on one client of `app`.
    pub fn mock(&self, app: i32, pack: Pack) -> Result<Vec<Context>, ClientError> {
        match self.call(app, None, Payload::Mock(pack))? {
            Payload::MockResult(contexts) => Ok(contexts),
            _ => Err(ClientError::UnexpectedResponse { op: Op::Mock }),
        }
    }

    /// Pushes `dto` to every client of `app`. Delivery is best effort;
    /// failures are logged.
    pub fn release(&self, app: i32, dto: &TransferDto) {
        let channels = self.registry.channels(app);
        if channels.is_empty() {
            debug!(target: MANAGER_TARGET, app, version = dto.version, "no clients to release to");
            return;
        }
        let update = Arc::new(Envelope::request(app, Payload::Update(dto.clone())));
        for channel in channels {
            let update = Arc::clone(&update);
            self.pool.execute(Box::new(move || {
                if let Err(error) = channel.send(&update) {
                    warn!(
                        target: MANAGER_TARGET,
                        app,
                        channel = %channel.id(),
                        peer = channel.peer(),
                        error = %error,
                        "failed to release update"
                    );
                }
            }));
        }
    }

    /// Addresses of the clients currently registered for `app`.
    pub fn registered_clients(&self, app: i32) -> BTreeSet<String> {
        self.registry.list_addresses(app)
    }

    /// Number of correlated calls waiting for a response.
    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }

    /// Routes one envelope read from `channel`.
    pub fn handle_inbound(&self, channel: &Arc<dyn ClientChannel>, envelope: Envelope) {
        if envelope.kind == MessageKind::Rsp {
            self.pending.complete(envelope);
            return;
        }
        match &envelope.payload {
            Payload::Init { address } | Payload::Slap { address } => {
                let outcome = self.registry.register(envelope.app, channel, address);
                if outcome == Registration::Refreshed && envelope.op == Op::Init {
                    debug!(
                        target: MANAGER_TARGET,
                        channel = %channel.id(),
                        "repeated init treated as heartbeat"
                    );
                }
            }
            _ => {
                warn!(
                    target: MANAGER_TARGET,
                    channel = %channel.id(),
                    op = %envelope.op,
                    "ignoring request from client"
                );
            }
        }
    }

    /// Forgets a channel whose connection ended.
    pub fn connection_closed(&self, id: ChannelId) {
        self.registry.unregister(id);
    }

    /// Refuses new calls, wakes pending callers, drains the release pool,
    /// then closes every registered connection.
    pub fn shutdown(&self) {
        self.pending.close();
        self.pool.shutdown();
        for entry in self.registry.drain() {
            entry.channel.close();
        }
    }

    fn call(
        &self,
        app: i32,
        address: Option<&str>,
        payload: Payload,
    ) -> Result<Payload, ClientError> {
        let channel = self
            .registry
            .pick_channel(app, address)
            .ok_or_else(|| ClientError::no_available_client(app, address))?;
        let request = Envelope::request(app, payload);
        let op = request.op;
        let response = self.pending.call(channel.as_ref(), request, self.timeout)?;
        if response.op != op {
            return Err(ClientError::UnexpectedResponse { op });
        }
        Ok(response.payload)
    }
}
