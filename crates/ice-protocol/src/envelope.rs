//! The tagged message carried over every client channel.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::CodecError;
use crate::model::{ClazzCheck, Context, Pack, TransferDto};
use crate::show::ShowConf;

/// Direction of an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageKind {
    /// A request; the peer may answer with a response carrying the same id.
    Req,
    /// A response to a correlated request.
    Rsp,
}

/// Operation selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Op {
    /// Verify a rule-implementation class on a client.
    ClazzCheck,
    /// Push a configuration update to a client.
    Update,
    /// Fetch the materialized rule tree for a configuration.
    ShowConf,
    /// Evaluate a request pack on a client.
    Mock,
    /// First registration of a client channel.
    Init,
    /// Client heartbeat.
    Slap,
}

impl Op {
    /// Returns `true` when requests for this operation expect a response.
    #[must_use]
    pub const fn is_correlated(self) -> bool {
        matches!(self, Self::ClazzCheck | Self::ShowConf | Self::Mock)
    }
}

impl fmt::Display for Op {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::ClazzCheck => "CLAZZ_CHECK",
            Self::Update => "UPDATE",
            Self::ShowConf => "SHOW_CONF",
            Self::Mock => "MOCK",
            Self::Init => "INIT",
            Self::Slap => "SLAP",
        };
        formatter.write_str(label)
    }
}

/// Operation-specific body of an envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Payload {
    /// `CLAZZ_CHECK` request.
    ClazzCheck {
        /// Fully-qualified class name.
        clazz: String,
        /// Node-type tag byte, see [`crate::NodeType`].
        node_type: u8,
    },
    /// `CLAZZ_CHECK` response.
    ClazzCheckResult(ClazzCheck),
    /// `UPDATE` request.
    Update(TransferDto),
    /// `SHOW_CONF` request.
    ShowConf {
        /// Root configuration id.
        conf_id: i64,
    },
    /// `SHOW_CONF` response; absent when the client could not materialize.
    ShowConfResult(Option<ShowConf>),
    /// `MOCK` request.
    Mock(Pack),
    /// `MOCK` response.
    MockResult(Vec<Context>),
    /// `INIT` request.
    Init {
        /// Client-reported identity, unique within an app.
        address: String,
    },
    /// `SLAP` request.
    Slap {
        /// Client-reported identity, unique within an app.
        address: String,
    },
}

impl Payload {
    /// Operation this payload belongs to.
    #[must_use]
    pub const fn op(&self) -> Op {
        match self {
            Self::ClazzCheck { .. } | Self::ClazzCheckResult(_) => Op::ClazzCheck,
            Self::Update(_) => Op::Update,
            Self::ShowConf { .. } | Self::ShowConfResult(_) => Op::ShowConf,
            Self::Mock(_) | Self::MockResult(_) => Op::Mock,
            Self::Init { .. } => Op::Init,
            Self::Slap { .. } => Op::Slap,
        }
    }

    /// Direction this payload travels in.
    #[must_use]
    pub const fn kind(&self) -> MessageKind {
        match self {
            Self::ClazzCheckResult(_) | Self::ShowConfResult(_) | Self::MockResult(_) => {
                MessageKind::Rsp
            }
            Self::ClazzCheck { .. }
            | Self::Update(_)
            | Self::ShowConf { .. }
            | Self::Mock(_)
            | Self::Init { .. }
            | Self::Slap { .. } => MessageKind::Req,
        }
    }
}

/// A single wire message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Correlation id; absent on fire-and-forget messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Tenant application id.
    pub app: i32,
    /// Message direction.
    #[serde(rename = "type")]
    pub kind: MessageKind,
    /// Operation selector.
    pub op: Op,
    /// Operation-specific body.
    pub payload: Payload,
}

impl Envelope {
    /// Builds a request without a correlation id. Callers that expect a
    /// response attach one with [`Envelope::with_id`].
    #[must_use]
    pub fn request(app: i32, payload: Payload) -> Self {
        Self {
            id: None,
            app,
            kind: MessageKind::Req,
            op: payload.op(),
            payload,
        }
    }

    /// Builds the response to `request`, copying its id and app.
    #[must_use]
    pub fn response_to(request: &Self, payload: Payload) -> Self {
        Self {
            id: request.id.clone(),
            app: request.app,
            kind: MessageKind::Rsp,
            op: payload.op(),
            payload,
        }
    }

    /// Sets the correlation id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Correlation id, if any.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Checks that `type` and `op` agree with the payload and that
    /// correlated messages carry an id.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::InvalidStructure`] describing the first
    /// inconsistency found.
    pub fn validate(&self) -> Result<(), CodecError> {
        if self.payload.op() != self.op {
            return Err(CodecError::invalid_structure(format!(
                "payload belongs to {} but op is {}",
                self.payload.op(),
                self.op
            )));
        }
        if self.payload.kind() != self.kind {
            return Err(CodecError::invalid_structure(format!(
                "{} payload cannot travel as {:?}",
                self.op, self.kind
            )));
        }
        let needs_id = self.kind == MessageKind::Rsp || self.op.is_correlated();
        let has_id = self.id.as_deref().is_some_and(|id| !id.trim().is_empty());
        if needs_id && !has_id {
            return Err(CodecError::invalid_structure(format!(
                "{} {:?} requires an id",
                self.op, self.kind
            )));
        }
        Ok(())
    }
}
