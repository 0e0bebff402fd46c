//! Settings for the reverse-proxy library.
//!
//! All settings live in the `DRF_REVPROXY` namespace of the host settings.
//! Values are read through a resolver that checks the user's overrides first
//! and falls back to the built-in defaults:
//!
//! ```
//! use revproxy_conf::config::{conf, settings, OverrideMapping, SettingValue, NAMESPACE};
//!
//! assert_eq!(conf().default_amt().unwrap(), 65536);
//!
//! let mut overrides = OverrideMapping::new();
//! overrides.insert("DEFAULT_AMT".into(), SettingValue::Integer(1024));
//! settings().set_namespace(NAMESPACE, overrides);
//!
//! assert_eq!(conf().default_amt().unwrap(), 1024);
//! ```

pub mod config;
pub mod observability;

pub use config::{conf, settings, Config, ConfigError, HostSettings, SettingValue};
