//! Settings subsystem.
//!
//! # Data Flow
//! ```text
//! settings file (TOML/JSON)
//!     → loader.rs (parse namespaces)
//!     → HostSettings (global namespaces, atomic swap)
//!     → resolver.rs (DRF_REVPROXY overrides over defaults, cached per name)
//!     → consumers read by name
//!
//! On change:
//!     watcher.rs / host mutation / test override
//!     → SettingChanged { setting }
//!     → resolver reloads iff setting == DRF_REVPROXY
//! ```
//!
//! # Design Decisions
//! - Defaults are immutable and double as the list of valid names
//! - Values are resolved lazily and stay fixed until an explicit reload
//! - A missing namespace means "no overrides"; an unknown name is an error

pub mod host;
pub mod loader;
pub mod resolver;
pub mod schema;
pub mod signals;
pub mod validation;
pub mod watcher;

use std::sync::{Arc, LazyLock};

pub use host::{HostSettings, SettingChanged, SettingsSource};
pub use resolver::{Config, ConfigError, ConfigResult};
pub use schema::{Defaults, OverrideMapping, SettingValue, NAMESPACE};

static HOST_SETTINGS: LazyLock<HostSettings> = LazyLock::new(HostSettings::new);

static CONF: LazyLock<Arc<Config>> = LazyLock::new(|| {
    let conf = Arc::new(Config::new(Arc::new(settings().clone())));
    settings().connect(&conf);
    conf
});

/// The process-wide host settings.
pub fn settings() -> &'static HostSettings {
    &HOST_SETTINGS
}

/// The process-wide resolver, subscribed to [`settings`] on first use.
pub fn conf() -> &'static Config {
    &CONF
}
