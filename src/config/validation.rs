//! Override inspection.
//!
//! # Responsibilities
//! - Report override keys that are not recognized settings
//!
//! # Design Decisions
//! - Reporting only: unknown keys stay in the mapping and are never consulted,
//!   since the resolver rejects names missing from the defaults table
//! - Values are not type-checked against their defaults

use crate::config::schema::{Defaults, OverrideMapping};

/// Override keys absent from `defaults`, in sorted order.
pub fn unknown_settings<'a>(overrides: &'a OverrideMapping, defaults: &Defaults) -> Vec<&'a str> {
    overrides
        .keys()
        .filter(|name| !defaults.contains(name))
        .map(String::as_str)
        .collect()
}

/// Log a warning for each unknown key in `overrides`. Returns how many were found.
pub fn warn_unknown_settings(
    namespace: &str,
    overrides: &OverrideMapping,
    defaults: &Defaults,
) -> usize {
    let unknown = unknown_settings(overrides, defaults);
    for name in &unknown {
        tracing::warn!(
            namespace = %namespace,
            setting = %name,
            "Ignoring unrecognized setting"
        );
    }
    unknown.len()
}
