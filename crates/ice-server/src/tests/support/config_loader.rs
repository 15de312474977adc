//! Configuration loaders for lifecycle scenarios.

use std::sync::Arc;

use ice_config::{Config, SocketEndpoint};
use ortho_config::{OrthoConfig, OrthoError};
use tempfile::TempDir;

use crate::bootstrap::ConfigLoader;

/// Loader that binds a Unix socket under a temporary directory, with an
/// optional tweak applied on top of the defaults.
pub struct TestConfigLoader {
    socket_dir: TempDir,
    tweak: fn(&mut Config),
}

impl TestConfigLoader {
    #[must_use]
    pub fn new() -> Self {
        Self::with(|_| {})
    }

    #[must_use]
    pub fn with(tweak: fn(&mut Config)) -> Self {
        Self {
            socket_dir: TempDir::new().expect("socket tempdir"),
            tweak,
        }
    }

    fn socket_path(&self) -> String {
        format!("{}/ice.sock", self.socket_dir.path().display())
    }
}

impl ConfigLoader for TestConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        let mut config = Config {
            listen_socket: SocketEndpoint::unix(self.socket_path()),
            log_filter: "warn".to_owned(),
            ..Config::default()
        };
        (self.tweak)(&mut config);
        Ok(config)
    }
}

/// Loader whose command line names an unknown socket scheme.
pub struct FailingConfigLoader;

impl ConfigLoader for FailingConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load_from_iter(["ice-server", "--listen-socket", "invalid://socket"])
    }
}
