//! Errors surfaced by server-to-client requests.

use std::fmt;

use ice_protocol::{CodecError, Op};
use thiserror::Error;

/// Coarse error class reported to callers of the request facade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// No client is registered for the requested app or address.
    NoAvailableClient,
    /// The client did not answer in time.
    Timeout,
    /// The request could not be completed for any other reason.
    InternalError,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::NoAvailableClient => "NO_AVAILABLE_CLIENT",
            Self::Timeout => "TIMEOUT",
            Self::InternalError => "INTERNAL_ERROR",
        };
        formatter.write_str(label)
    }
}

/// Failure of a correlated request to a client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// No registered channel matched the target.
    #[error("no available client for {target}")]
    NoAvailableClient {
        /// `app` or `app:address`.
        target: String,
    },
    /// The wait budget elapsed without a response.
    #[error("request {id} timed out")]
    Timeout {
        /// Correlation id of the abandoned request.
        id: String,
    },
    /// The wait was cancelled or the engine is closed.
    #[error("internal error: {message}")]
    Internal {
        /// What went wrong.
        message: String,
    },
    /// Writing the request to the channel failed.
    #[error("failed to send request {id}: {source}")]
    Send {
        /// Correlation id of the request.
        id: String,
        /// Underlying write failure.
        #[source]
        source: CodecError,
    },
    /// The client answered with a payload for another operation.
    #[error("unexpected response payload for {op}")]
    UnexpectedResponse {
        /// Operation of the original request.
        op: Op,
    },
}

impl ClientError {
    /// Builds [`ClientError::NoAvailableClient`] for an app, optionally
    /// pinned to one address.
    pub fn no_available_client(app: i32, address: Option<&str>) -> Self {
        let target = match address {
            Some(address) => format!("{app}:{address}"),
            None => app.to_string(),
        };
        Self::NoAvailableClient { target }
    }

    pub(crate) fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Error class for callers.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::NoAvailableClient { .. } => ErrorCode::NoAvailableClient,
            Self::Timeout { .. } => ErrorCode::Timeout,
            Self::Internal { .. } | Self::Send { .. } | Self::UnexpectedResponse { .. } => {
                ErrorCode::InternalError
            }
        }
    }
}
