//! Dispatches server requests to the client's local operations.

use std::sync::Arc;

use ice_protocol::{
    ClazzCheck, Context, Envelope, MessageKind, Pack, Payload, ShowConf, TransferDto,
};
use tracing::{debug, error, warn};

use crate::clazz::{TypeLoader, check_clazz};
use crate::engine::ClientEngine;
use crate::show;

const SERVICE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::service");

/// Answers requests arriving from the server.
pub struct ClientService {
    address: String,
    engine: Arc<dyn ClientEngine>,
    loader: Arc<dyn TypeLoader>,
}

impl std::fmt::Debug for ClientService {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("ClientService")
            .field("address", &self.address)
            .field("loader", &self.loader)
            .finish_non_exhaustive()
    }
}

impl ClientService {
    /// Serves requests as the client at `address`.
    pub fn new(
        address: impl Into<String>,
        engine: Arc<dyn ClientEngine>,
        loader: Arc<dyn TypeLoader>,
    ) -> Self {
        Self {
            address: address.into(),
            engine,
            loader,
        }
    }

    /// Address this client reports to the server.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Handles one inbound envelope, returning the response to send back.
    ///
    /// Updates and anything that is not a server request produce no response.
    pub fn handle(&self, request: &Envelope) -> Option<Envelope> {
        if request.kind != MessageKind::Req {
            debug!(
                target: SERVICE_TARGET,
                op = %request.op,
                "ignoring response from server"
            );
            return None;
        }
        let payload = match &request.payload {
            Payload::ClazzCheck { clazz, node_type } => {
                Payload::ClazzCheckResult(self.clazz_check(clazz, *node_type))
            }
            Payload::ShowConf { conf_id } => {
                Payload::ShowConfResult(Some(self.show_conf(*conf_id)))
            }
            Payload::Mock(pack) => Payload::MockResult(self.mock(pack)),
            Payload::Update(dto) => {
                self.update(dto);
                return None;
            }
            other => {
                warn!(
                    target: SERVICE_TARGET,
                    op = %other.op(),
                    "unsupported request from server"
                );
                return None;
            }
        };
        Some(Envelope::response_to(request, payload))
    }

    /// Answers a `CLAZZ_CHECK` for this client.
    pub fn clazz_check(&self, clazz: &str, node_type: u8) -> ClazzCheck {
        check_clazz(self.loader.as_ref(), &self.address, clazz, node_type)
    }

    /// Materialized view of `conf_id`. A tree that cannot be materialized is
    /// reported with no root.
    pub fn show_conf(&self, conf_id: i64) -> ShowConf {
        let empty = || ShowConf {
            address: self.address.clone(),
            conf_id,
            root: None,
        };
        let Some(view) = self.engine.conf(conf_id) else {
            return empty();
        };
        match show::show_conf(&view.graph, Some(view.root), &self.address, conf_id) {
            Ok(shown) => shown,
            Err(show_error) => {
                error!(
                    target: SERVICE_TARGET,
                    conf_id,
                    error = %show_error,
                    "failed to materialize configuration"
                );
                empty()
            }
        }
    }

    /// Evaluates `pack` on the engine.
    pub fn mock(&self, pack: &Pack) -> Vec<Context> {
        self.engine.process(pack)
    }

    /// Applies `dto`, logging every error the engine reports.
    pub fn update(&self, dto: &TransferDto) -> Vec<String> {
        let errors = self.engine.update(dto);
        for message in &errors {
            error!(
                target: SERVICE_TARGET,
                version = dto.version,
                error = %message,
                "update apply failed"
            );
        }
        errors
    }
}
