//! Lazy settings resolver.
//!
//! # Resolution
//! ```text
//! get(name)
//!     → reject names missing from the defaults table
//!     → Cached(value)? return it
//!     → fetch + memoize the namespace's override mapping (absent = empty)
//!     → override value, else default
//!     → store Cached(value), return it
//! ```
//!
//! # Slot States
//! ```text
//! Unresolved → Cached: first successful get
//! Cached → Cached:     repeat get (no work)
//! Cached → Unresolved: reload (every name at once)
//! ```
//!
//! # Design Decisions
//! - Slots live in a concurrent map; each is written whole, so a racing read
//!   sees either the old or the new value
//! - The override mapping is held by reference and only re-fetched after reload
//! - Each reload starts a new epoch; a value resolved in an older epoch is
//!   returned to its caller but not cached

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use dashmap::DashMap;
use thiserror::Error;

use crate::config::host::{ChangeHandler, SettingChanged, SettingsSource};
use crate::config::schema::{
    Defaults, OverrideMapping, SettingValue, DEFAULTS, DEFAULT_AMT, DEFAULT_CHARSET,
    HTML_CONTENT_TYPES, IGNORE_HEADERS, MIN_STREAMING_LENGTH, NAMESPACE,
};

/// Errors raised while reading settings.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The name is not a recognized setting.
    #[error("Invalid {namespace} setting: '{name}'")]
    UnknownSetting { namespace: String, name: String },

    /// The resolved value does not have the shape the accessor needs.
    #[error("{namespace} setting '{name}' must be {expected}, got {found}")]
    WrongType {
        namespace: String,
        name: String,
        expected: &'static str,
        found: SettingValue,
    },
}

/// Result type for settings reads.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Per-setting cache state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot {
    Unresolved,
    Cached(SettingValue),
}

/// Settings view layering a namespace's overrides over the defaults table.
pub struct Config {
    namespace: String,
    defaults: Arc<Defaults>,
    source: Arc<dyn SettingsSource>,
    user_config: ArcSwapOption<OverrideMapping>,
    slots: DashMap<&'static str, Slot>,
    epoch: AtomicU64,
}

impl Config {
    /// Resolver over the built-in defaults and the reserved namespace.
    pub fn new(source: Arc<dyn SettingsSource>) -> Self {
        Self::with_defaults(source, NAMESPACE, DEFAULTS.clone())
    }

    pub fn with_defaults(
        source: Arc<dyn SettingsSource>,
        namespace: impl Into<String>,
        defaults: Arc<Defaults>,
    ) -> Self {
        let slots = defaults.names().map(|name| (name, Slot::Unresolved)).collect();
        Self {
            namespace: namespace.into(),
            defaults,
            source,
            user_config: ArcSwapOption::empty(),
            slots,
            epoch: AtomicU64::new(0),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn defaults(&self) -> &Defaults {
        &self.defaults
    }

    /// Resolve `name`, caching the result until the next reload.
    pub fn get(&self, name: &str) -> ConfigResult<SettingValue> {
        let (key, default) = self.lookup_default(name)?;

        let cached = self.slots.get(key).and_then(|slot| match slot.value() {
            Slot::Cached(value) => Some(value.clone()),
            Slot::Unresolved => None,
        });
        if let Some(value) = cached {
            return Ok(value);
        }

        let epoch = self.epoch.load(Ordering::Acquire);
        let user_config = self.user_config(epoch);
        let value = match user_config.get(key) {
            Some(value) => {
                tracing::debug!(setting = %key, value = %value, "Resolved setting from overrides");
                value.clone()
            }
            None => {
                tracing::debug!(setting = %key, value = %default, "Resolved setting from defaults");
                default.clone()
            }
        };

        self.cache(key, epoch, &value);
        Ok(value)
    }

    /// Drop every cached value and the memoized override mapping.
    pub fn reload(&self) {
        self.epoch.fetch_add(1, Ordering::AcqRel);
        for mut slot in self.slots.iter_mut() {
            *slot.value_mut() = Slot::Unresolved;
        }
        self.user_config.store(None);
        tracing::info!(namespace = %self.namespace, "Settings cache cleared");
    }

    /// Reload if `event` names this resolver's namespace.
    pub fn reload_on_change(&self, event: &SettingChanged) {
        if event.setting == self.namespace {
            self.reload();
        } else {
            tracing::trace!(namespace = %event.setting, "Ignoring unrelated setting change");
        }
    }

    pub fn is_cached(&self, name: &str) -> bool {
        self.slots
            .get(name)
            .is_some_and(|slot| matches!(slot.value(), Slot::Cached(_)))
    }

    /// Names currently holding a cached value, sorted.
    pub fn cached_names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self
            .slots
            .iter()
            .filter(|slot| matches!(slot.value(), Slot::Cached(_)))
            .map(|slot| *slot.key())
            .collect();
        names.sort_unstable();
        names
    }

    /// Resolve every recognized setting.
    pub fn snapshot(&self) -> BTreeMap<&'static str, SettingValue> {
        let mut resolved = BTreeMap::new();
        for name in self.defaults.names() {
            if let Ok(value) = self.get(name) {
                resolved.insert(name, value);
            }
        }
        resolved
    }

    pub fn min_streaming_length(&self) -> ConfigResult<usize> {
        self.size(MIN_STREAMING_LENGTH)
    }

    pub fn default_charset(&self) -> ConfigResult<String> {
        let value = self.get(DEFAULT_CHARSET)?;
        match value {
            SettingValue::Text(charset) => Ok(charset),
            other => Err(self.wrong_type(DEFAULT_CHARSET, "a string", other)),
        }
    }

    pub fn ignore_headers(&self) -> ConfigResult<Vec<String>> {
        self.list(IGNORE_HEADERS)
    }

    pub fn html_content_types(&self) -> ConfigResult<Vec<String>> {
        self.list(HTML_CONTENT_TYPES)
    }

    pub fn default_amt(&self) -> ConfigResult<usize> {
        self.size(DEFAULT_AMT)
    }

    fn lookup_default(&self, name: &str) -> ConfigResult<(&'static str, &SettingValue)> {
        self.defaults.entry(name).ok_or_else(|| ConfigError::UnknownSetting {
            namespace: self.namespace.clone(),
            name: name.to_string(),
        })
    }

    /// Store `value` unless a reload started after `epoch` was read.
    fn cache(&self, key: &'static str, epoch: u64, value: &SettingValue) -> bool {
        let Some(mut slot) = self.slots.get_mut(key) else {
            return false;
        };
        // Checked under the slot's write lock so a reload's clearing pass
        // cannot interleave with the store.
        if self.epoch.load(Ordering::Acquire) != epoch {
            tracing::debug!(setting = %key, "Reload raced resolution, not caching");
            return false;
        }
        *slot.value_mut() = Slot::Cached(value.clone());
        true
    }

    fn user_config(&self, epoch: u64) -> Arc<OverrideMapping> {
        if let Some(existing) = self.user_config.load_full() {
            return existing;
        }
        let fetched = match self.source.namespace(&self.namespace) {
            Some(mapping) => mapping,
            None => {
                tracing::debug!(namespace = %self.namespace, "No overrides defined, using defaults");
                Arc::default()
            }
        };
        self.user_config.store(Some(fetched.clone()));
        // Dropping the memo is always safe; keeping a pre-reload one is not.
        if self.epoch.load(Ordering::Acquire) != epoch {
            self.user_config.store(None);
        }
        fetched
    }

    fn size(&self, name: &'static str) -> ConfigResult<usize> {
        let value = self.get(name)?;
        value
            .as_integer()
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| self.wrong_type(name, "a non-negative integer", value))
    }

    fn list(&self, name: &'static str) -> ConfigResult<Vec<String>> {
        match self.get(name)? {
            SettingValue::List(items) => Ok(items),
            other => Err(self.wrong_type(name, "a list of strings", other)),
        }
    }

    fn wrong_type(&self, name: &str, expected: &'static str, found: SettingValue) -> ConfigError {
        ConfigError::WrongType {
            namespace: self.namespace.clone(),
            name: name.to_string(),
            expected,
            found,
        }
    }
}

impl ChangeHandler for Config {
    fn setting_changed(&self, event: &SettingChanged) {
        self.reload_on_change(event);
    }
}
