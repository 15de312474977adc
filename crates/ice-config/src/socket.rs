//! Client-facing endpoint of the server.

use std::fmt;
use std::fs::DirBuilder;
use std::io;
use std::str::FromStr;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::{Host, Url};

use crate::defaults::DEFAULT_TCP_PORT;

/// Endpoint through which clients reach the server.
///
/// Production fleets connect over TCP; the Unix variant serves co-located
/// clients and tests. The textual forms are `tcp://host[:port]` and
/// `unix:///path`. A TCP endpoint without a port uses [`DEFAULT_TCP_PORT`].
/// Configuration files and environment variables carry the textual form.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(try_from = "String", into = "String")]
pub enum SocketEndpoint {
    /// Unix domain socket at `path`.
    Unix { path: Utf8PathBuf },
    /// TCP socket. IPv6 hosts are stored without brackets.
    Tcp { host: String, port: u16 },
}

impl SocketEndpoint {
    /// Builds a Unix domain socket endpoint.
    #[must_use]
    pub fn unix(path: impl Into<Utf8PathBuf>) -> Self {
        Self::Unix { path: path.into() }
    }

    /// Builds a TCP socket endpoint.
    #[must_use]
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self::Tcp {
            host: host.into(),
            port,
        }
    }

    /// Socket path of a Unix endpoint.
    #[must_use]
    pub fn unix_path(&self) -> Option<&Utf8Path> {
        match self {
            Self::Unix { path } => Some(path.as_path()),
            Self::Tcp { .. } => None,
        }
    }

    /// Creates the parent directory of a Unix socket, owner-only on Unix.
    /// TCP endpoints need nothing.
    pub fn prepare_filesystem(&self) -> Result<(), SocketPreparationError> {
        let Some(path) = self.unix_path() else {
            return Ok(());
        };
        let parent = path
            .parent()
            .filter(|parent| !parent.as_str().is_empty())
            .ok_or_else(|| SocketPreparationError::MissingParent {
                path: path.to_path_buf(),
            })?;
        if parent.is_dir() {
            return Ok(());
        }

        let mut builder = DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        std::os::unix::fs::DirBuilderExt::mode(&mut builder, 0o700);
        builder
            .create(parent)
            .map_err(|source| SocketPreparationError::CreateDirectory {
                path: parent.to_path_buf(),
                source,
            })
    }
}

impl fmt::Display for SocketEndpoint {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unix { path } => write!(formatter, "unix://{path}"),
            Self::Tcp { host, port } if host.contains(':') => {
                write!(formatter, "tcp://[{host}]:{port}")
            }
            Self::Tcp { host, port } => write!(formatter, "tcp://{host}:{port}"),
        }
    }
}

impl FromStr for SocketEndpoint {
    type Err = SocketParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let url = Url::parse(input)?;
        match url.scheme() {
            "tcp" => {
                let host = match url.host() {
                    Some(Host::Domain(name)) => name.to_owned(),
                    Some(Host::Ipv4(addr)) => addr.to_string(),
                    Some(Host::Ipv6(addr)) => addr.to_string(),
                    None => return Err(SocketParseError::MissingHost(input.to_owned())),
                };
                Ok(Self::tcp(host, url.port().unwrap_or(DEFAULT_TCP_PORT)))
            }
            "unix" if url.path().is_empty() || url.path() == "/" => {
                Err(SocketParseError::MissingUnixPath(input.to_owned()))
            }
            "unix" => Ok(Self::unix(url.path())),
            other => Err(SocketParseError::UnsupportedScheme(other.to_owned())),
        }
    }
}

impl TryFrom<String> for SocketEndpoint {
    type Error = SocketParseError;

    fn try_from(text: String) -> Result<Self, Self::Error> {
        text.parse()
    }
}

impl From<SocketEndpoint> for String {
    fn from(endpoint: SocketEndpoint) -> Self {
        endpoint.to_string()
    }
}

/// Errors encountered while parsing a [`SocketEndpoint`] from text.
#[derive(Debug, Error)]
pub enum SocketParseError {
    /// Only `tcp` and `unix` are accepted.
    #[error("unsupported socket scheme '{0}', expected tcp or unix")]
    UnsupportedScheme(String),
    /// A TCP endpoint named no host.
    #[error("missing TCP host in '{0}'")]
    MissingHost(String),
    /// A Unix endpoint named no path.
    #[error("missing Unix socket path in '{0}'")]
    MissingUnixPath(String),
    /// Not a URL at all.
    #[error(transparent)]
    Url(#[from] url::ParseError),
}

/// Errors raised when preparing socket directories.
#[derive(Debug, Error)]
pub enum SocketPreparationError {
    /// The socket path is a bare file name or the filesystem root.
    #[error("socket path '{path}' has no parent directory")]
    MissingParent { path: Utf8PathBuf },
    /// The parent directory could not be created.
    #[error("failed to create socket directory '{path}': {source}")]
    CreateDirectory {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("tcp://127.0.0.1:18121", SocketEndpoint::tcp("127.0.0.1", 18121))]
    #[case("tcp://config.internal:9000", SocketEndpoint::tcp("config.internal", 9000))]
    #[case("tcp://[::1]:7000", SocketEndpoint::tcp("::1", 7000))]
    #[case("unix:///run/ice/server.sock", SocketEndpoint::unix("/run/ice/server.sock"))]
    fn endpoints_survive_display(#[case] input: &str, #[case] expected: SocketEndpoint) {
        let endpoint: SocketEndpoint = input.parse().expect("endpoint should parse");
        assert_eq!(endpoint, expected);
        assert_eq!(endpoint.to_string(), input);
    }

    #[rstest]
    fn serde_uses_the_textual_form() {
        let endpoint = SocketEndpoint::tcp("::1", 7000);
        let text = serde_json::to_string(&endpoint).expect("serialize");
        assert_eq!(text, "\"tcp://[::1]:7000\"");
        let bad = serde_json::from_str::<SocketEndpoint>("\"udp://x\"");
        assert!(bad.is_err());
    }

    #[rstest]
    fn tcp_without_port_uses_the_server_default() {
        let endpoint: SocketEndpoint = "tcp://ice.internal".parse().expect("port is optional");
        assert_eq!(endpoint, SocketEndpoint::tcp("ice.internal", DEFAULT_TCP_PORT));
    }

    #[rstest]
    #[case("http://127.0.0.1:80")]
    #[case("ws://ice.internal")]
    fn rejects_other_schemes(#[case] input: &str) {
        let error = input
            .parse::<SocketEndpoint>()
            .expect_err("scheme should be rejected");
        assert!(matches!(error, SocketParseError::UnsupportedScheme(_)));
    }

    #[rstest]
    fn rejects_unix_without_path() {
        let error = "unix://"
            .parse::<SocketEndpoint>()
            .expect_err("path is required");
        assert!(matches!(error, SocketParseError::MissingUnixPath(_)));
    }

    #[rstest]
    fn tcp_needs_no_filesystem_preparation() {
        SocketEndpoint::tcp("0.0.0.0", 0)
            .prepare_filesystem()
            .expect("tcp endpoints skip preparation");
    }

    #[rstest]
    fn prepares_unix_parent_directory() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("nested").join("ice.sock");
        let endpoint = SocketEndpoint::unix(path.to_str().expect("utf8 path"));
        endpoint
            .prepare_filesystem()
            .expect("parent directory should be created");
        assert!(dir.path().join("nested").is_dir());
        endpoint
            .prepare_filesystem()
            .expect("existing parent is accepted");
    }

    #[rstest]
    fn bare_socket_name_has_no_parent() {
        let error = SocketEndpoint::unix("ice.sock")
            .prepare_filesystem()
            .expect_err("relative bare name");
        assert!(matches!(error, SocketPreparationError::MissingParent { .. }));
    }
}
