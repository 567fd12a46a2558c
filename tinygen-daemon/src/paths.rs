use std::path::{Path, PathBuf};

use tinygen_core::config::tinygen_root;

pub const DAEMON_SOCKET: &str = "daemon.sock";

pub fn socket_path(home: &Path) -> PathBuf {
    tinygen_root(home).join(DAEMON_SOCKET)
}
