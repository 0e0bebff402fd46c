//! Shared utilities for integration tests.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use revproxy_conf::config::{Config, HostSettings};

/// Write a TOML settings file to a fresh temporary path.
pub fn settings_file(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

/// A host plus a resolver connected to it.
pub fn connected_conf() -> (HostSettings, Arc<Config>) {
    let host = HostSettings::new();
    let conf = Arc::new(Config::new(Arc::new(host.clone())));
    host.connect(&conf);
    (host, conf)
}

/// Poll `check` until it holds or roughly `timeout` has passed.
#[allow(dead_code)]
pub fn eventually<F: FnMut() -> bool>(timeout: Duration, mut check: F) -> bool {
    let step = Duration::from_millis(50);
    let mut waited = Duration::ZERO;
    while waited < timeout {
        if check() {
            return true;
        }
        std::thread::sleep(step);
        waited += step;
    }
    check()
}
