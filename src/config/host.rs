//! Host-side global settings and change notifications.
//!
//! # Responsibilities
//! - Hold every namespace's override mapping behind an atomic swap
//! - Broadcast a [`SettingChanged`] event for each namespace that is mutated
//! - Deliver the same event synchronously to connected handlers
//!
//! # Design Decisions
//! - Namespaces are immutable snapshots (`Arc<OverrideMapping>`); a mutation
//!   replaces the snapshot, so readers holding the old one keep a stable view
//! - Handlers are held weakly so a dropped resolver unsubscribes itself

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use arc_swap::ArcSwap;
use tokio::sync::broadcast;

use crate::config::schema::OverrideMapping;

/// Capacity of the async change channel.
const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// Settings keyed by namespace name.
pub type Namespaces = HashMap<String, OverrideMapping>;

/// Notification that the namespace named by `setting` changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingChanged {
    pub setting: String,
}

impl SettingChanged {
    pub fn new(setting: impl Into<String>) -> Self {
        Self {
            setting: setting.into(),
        }
    }
}

/// Source of per-namespace override mappings.
pub trait SettingsSource: Send + Sync {
    /// The mapping stored under `namespace`, if the host defines one.
    fn namespace(&self, namespace: &str) -> Option<Arc<OverrideMapping>>;
}

/// Receiver of synchronous change notifications.
pub trait ChangeHandler: Send + Sync {
    fn setting_changed(&self, event: &SettingChanged);
}

/// The host's global settings object.
///
/// Cloning yields another handle onto the same settings.
#[derive(Clone)]
pub struct HostSettings {
    namespaces: Arc<ArcSwap<HashMap<String, Arc<OverrideMapping>>>>,
    handlers: Arc<ArcSwap<Vec<Weak<dyn ChangeHandler>>>>,
    changes: broadcast::Sender<SettingChanged>,
}

impl HostSettings {
    /// Create empty host settings.
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            namespaces: Arc::new(ArcSwap::from_pointee(HashMap::new())),
            handlers: Arc::new(ArcSwap::from_pointee(Vec::new())),
            changes,
        }
    }

    /// Create host settings pre-populated with `namespaces`. No events are sent.
    pub fn with_namespaces(namespaces: Namespaces) -> Self {
        let settings = Self::new();
        settings.namespaces.store(Arc::new(
            namespaces
                .into_iter()
                .map(|(name, mapping)| (name, Arc::new(mapping)))
                .collect(),
        ));
        settings
    }

    /// Subscribe to change events on an async channel.
    pub fn subscribe(&self) -> broadcast::Receiver<SettingChanged> {
        self.changes.subscribe()
    }

    /// Register a handler called synchronously for every change.
    pub fn connect<H>(&self, handler: &Arc<H>)
    where
        H: ChangeHandler + 'static,
    {
        let handler: Arc<dyn ChangeHandler> = handler.clone();
        let weak = Arc::downgrade(&handler);
        self.handlers.rcu(|current| {
            let mut next: Vec<Weak<dyn ChangeHandler>> = current
                .iter()
                .filter(|h| h.strong_count() > 0)
                .cloned()
                .collect();
            next.push(weak.clone());
            next
        });
    }

    /// Replace the mapping stored under `namespace`.
    pub fn set_namespace(&self, namespace: &str, mapping: OverrideMapping) {
        let mapping = Arc::new(mapping);
        self.namespaces.rcu(|current| {
            let mut next = (**current).clone();
            next.insert(namespace.to_string(), mapping.clone());
            next
        });
        self.notify(namespace);
    }

    /// Remove `namespace`. Returns whether it was present.
    pub fn remove_namespace(&self, namespace: &str) -> bool {
        let previous = self.namespaces.rcu(|current| {
            let mut next = (**current).clone();
            next.remove(namespace);
            next
        });
        let existed = previous.contains_key(namespace);
        if existed {
            self.notify(namespace);
        }
        existed
    }

    /// Replace every namespace at once, notifying only those whose content changed.
    pub fn replace_all(&self, namespaces: Namespaces) {
        let next: HashMap<String, Arc<OverrideMapping>> = namespaces
            .into_iter()
            .map(|(name, mapping)| (name, Arc::new(mapping)))
            .collect();
        let previous = self.namespaces.swap(Arc::new(next));
        let current = self.namespaces.load();

        let mut changed: Vec<&String> = previous
            .iter()
            .filter(|(name, old)| current.get(*name).map_or(true, |new| new != *old))
            .map(|(name, _)| name)
            .collect();
        changed.extend(current.keys().filter(|name| !previous.contains_key(*name)));
        changed.sort();

        for name in changed {
            self.notify(name);
        }
    }

    /// Temporarily replace `namespace`; the previous mapping is restored when
    /// the guard is dropped. Both transitions send a change event.
    pub fn override_namespace(&self, namespace: &str, mapping: OverrideMapping) -> OverrideGuard {
        let previous = self.namespace(namespace);
        self.set_namespace(namespace, mapping);
        OverrideGuard {
            settings: self.clone(),
            namespace: namespace.to_string(),
            previous,
        }
    }

    /// Names of all defined namespaces.
    pub fn namespace_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.namespaces.load().keys().cloned().collect();
        names.sort();
        names
    }

    fn restore(&self, namespace: &str, previous: Option<Arc<OverrideMapping>>) {
        self.namespaces.rcu(|current| {
            let mut next = (**current).clone();
            match &previous {
                Some(mapping) => {
                    next.insert(namespace.to_string(), mapping.clone());
                }
                None => {
                    next.remove(namespace);
                }
            }
            next
        });
        self.notify(namespace);
    }

    fn notify(&self, namespace: &str) {
        let event = SettingChanged::new(namespace);
        tracing::debug!(namespace = %namespace, "Setting changed");

        for handler in self.handlers.load().iter() {
            if let Some(handler) = handler.upgrade() {
                handler.setting_changed(&event);
            }
        }
        // No subscribers is fine.
        let _ = self.changes.send(event);
    }
}

impl Default for HostSettings {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsSource for HostSettings {
    fn namespace(&self, namespace: &str) -> Option<Arc<OverrideMapping>> {
        self.namespaces.load().get(namespace).cloned()
    }
}

/// Restores a namespace replaced by [`HostSettings::override_namespace`].
#[must_use = "the override is reverted as soon as the guard is dropped"]
pub struct OverrideGuard {
    settings: HostSettings,
    namespace: String,
    previous: Option<Arc<OverrideMapping>>,
}

impl Drop for OverrideGuard {
    fn drop(&mut self) {
        self.settings.restore(&self.namespace, self.previous.take());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::SettingValue;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<String>>,
    }

    impl ChangeHandler for Recorder {
        fn setting_changed(&self, event: &SettingChanged) {
            self.seen.lock().unwrap().push(event.setting.clone());
        }
    }

    fn mapping(name: &str, value: i64) -> OverrideMapping {
        let mut m = OverrideMapping::new();
        m.insert(name.to_string(), SettingValue::Integer(value));
        m
    }

    #[test]
    fn test_set_and_read_namespace() {
        let settings = HostSettings::new();
        assert!(settings.namespace("DRF_REVPROXY").is_none());

        settings.set_namespace("DRF_REVPROXY", mapping("DEFAULT_AMT", 1024));
        let ns = settings.namespace("DRF_REVPROXY").unwrap();
        assert_eq!(ns["DEFAULT_AMT"], SettingValue::Integer(1024));
    }

    #[test]
    fn test_handlers_receive_events() {
        let settings = HostSettings::new();
        let recorder = Arc::new(Recorder::default());
        settings.connect(&recorder);

        settings.set_namespace("DRF_REVPROXY", mapping("DEFAULT_AMT", 1));
        settings.set_namespace("UNRELATED", OverrideMapping::new());
        assert!(settings.remove_namespace("UNRELATED"));
        assert!(!settings.remove_namespace("UNRELATED"));

        let seen = recorder.seen.lock().unwrap().clone();
        assert_eq!(seen, vec!["DRF_REVPROXY", "UNRELATED", "UNRELATED"]);
    }

    #[test]
    fn test_dropped_handler_is_skipped() {
        let settings = HostSettings::new();
        let recorder = Arc::new(Recorder::default());
        settings.connect(&recorder);
        drop(recorder);

        // Must not panic on a dead weak reference.
        settings.set_namespace("DRF_REVPROXY", OverrideMapping::new());
    }

    #[test]
    fn test_replace_all_notifies_changed_only() {
        let mut initial = Namespaces::new();
        initial.insert("A".into(), mapping("X", 1));
        initial.insert("B".into(), mapping("X", 2));
        let settings = HostSettings::with_namespaces(initial);

        let recorder = Arc::new(Recorder::default());
        settings.connect(&recorder);

        let mut next = Namespaces::new();
        next.insert("A".into(), mapping("X", 1));
        next.insert("C".into(), mapping("X", 3));
        settings.replace_all(next);

        let seen = recorder.seen.lock().unwrap().clone();
        assert_eq!(seen, vec!["B", "C"]);
        assert_eq!(settings.namespace_names(), vec!["A", "C"]);
    }

    #[test]
    fn test_override_guard_restores() {
        let settings = HostSettings::new();
        settings.set_namespace("DRF_REVPROXY", mapping("DEFAULT_AMT", 1));

        {
            let _guard = settings.override_namespace("DRF_REVPROXY", mapping("DEFAULT_AMT", 2));
            assert_eq!(
                settings.namespace("DRF_REVPROXY").unwrap()["DEFAULT_AMT"],
                SettingValue::Integer(2)
            );
        }

        assert_eq!(
            settings.namespace("DRF_REVPROXY").unwrap()["DEFAULT_AMT"],
            SettingValue::Integer(1)
        );

        {
            let _guard = settings.override_namespace("NEW_NS", OverrideMapping::new());
            assert!(settings.namespace("NEW_NS").is_some());
        }
        assert!(settings.namespace("NEW_NS").is_none());
    }

    #[tokio::test]
    async fn test_async_subscribers_receive_events() {
        let settings = HostSettings::new();
        let mut rx = settings.subscribe();

        settings.set_namespace("DRF_REVPROXY", OverrideMapping::new());
        let event = rx.recv().await.unwrap();
        assert_eq!(event, SettingChanged::new("DRF_REVPROXY"));
    }
}
