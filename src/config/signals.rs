//! Async change-event listener.
//!
//! Drives [`Config::reload_on_change`] from the host's broadcast channel for
//! resolvers that are not connected synchronously.

use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

use crate::config::host::SettingChanged;
use crate::config::resolver::Config;

/// Spawn a task that reloads `conf` whenever its namespace changes.
///
/// The task ends when the sending side of the channel is dropped.
pub fn spawn_reload_listener(
    conf: Arc<Config>,
    mut rx: broadcast::Receiver<SettingChanged>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => conf.reload_on_change(&event),
                Err(RecvError::Lagged(missed)) => {
                    // A missed event may have been ours.
                    tracing::warn!(missed, "Settings listener lagged, reloading");
                    conf.reload();
                }
                Err(RecvError::Closed) => break,
            }
        }
        tracing::debug!(namespace = %conf.namespace(), "Settings listener stopped");
    })
}
