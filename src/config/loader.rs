//! Settings file loading from disk.
//!
//! A settings file holds one table per namespace:
//! ```toml
//! [DRF_REVPROXY]
//! MIN_STREAMING_LENGTH = 8192
//! IGNORE_HEADERS = ["HTTP_HOST"]
//! ```
//! JSON files use the same shape. Top-level entries that are not tables are
//! ignored. Within a namespace, a value that cannot be read as a setting
//! (bool, float, nested table) is skipped on its own; the rest of the
//! namespace is kept.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::host::Namespaces;
use crate::config::schema::{OverrideMapping, SettingValue, DEFAULTS, NAMESPACE};
use crate::config::validation::warn_unknown_settings;

/// Error type for settings file loading.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Expected a table of namespaces at the top level")]
    NotATable,

    #[error("Unsupported settings format: {0:?}")]
    UnsupportedFormat(String),
}

/// Settings file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Toml,
    Json,
}

impl Format {
    /// Pick a format from the file extension.
    pub fn from_path(path: &Path) -> Result<Self, LoadError> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(Format::Toml),
            Some("json") => Ok(Format::Json),
            other => Err(LoadError::UnsupportedFormat(other.unwrap_or_default().to_string())),
        }
    }
}

/// Load every namespace from a settings file.
pub fn load_settings(path: &Path) -> Result<Namespaces, LoadError> {
    let format = Format::from_path(path)?;
    let content = fs::read_to_string(path)?;
    let namespaces = parse_settings(&content, format)?;

    tracing::info!(
        path = %path.display(),
        namespaces = namespaces.len(),
        "Settings loaded"
    );
    Ok(namespaces)
}

/// Parse settings content in the given format.
pub fn parse_settings(content: &str, format: Format) -> Result<Namespaces, LoadError> {
    let mut namespaces = Namespaces::new();

    match format {
        Format::Toml => {
            let root: toml::Table = toml::from_str(content)?;
            for (name, value) in root {
                let toml::Value::Table(table) = value else {
                    continue;
                };
                let mapping =
                    collect_mapping(&name, table, |value| value.try_into::<SettingValue>());
                namespaces.insert(name, mapping);
            }
        }
        Format::Json => {
            let root: serde_json::Value = serde_json::from_str(content)?;
            let serde_json::Value::Object(root) = root else {
                return Err(LoadError::NotATable);
            };
            for (name, value) in root {
                let serde_json::Value::Object(object) = value else {
                    continue;
                };
                let mapping =
                    collect_mapping(&name, object, serde_json::from_value::<SettingValue>);
                namespaces.insert(name, mapping);
            }
        }
    }

    if let Some(overrides) = namespaces.get(NAMESPACE) {
        warn_unknown_settings(NAMESPACE, overrides, &DEFAULTS);
    }
    Ok(namespaces)
}

/// Convert each entry of a namespace table, skipping values that are not settings.
fn collect_mapping<V, E, F>(
    namespace: &str,
    entries: impl IntoIterator<Item = (String, V)>,
    convert: F,
) -> OverrideMapping
where
    F: Fn(V) -> Result<SettingValue, E>,
    E: std::fmt::Display,
{
    let mut mapping = OverrideMapping::new();
    for (setting, value) in entries {
        match convert(value) {
            Ok(value) => {
                mapping.insert(setting, value);
            }
            Err(e) => {
                tracing::warn!(
                    namespace = %namespace,
                    setting = %setting,
                    error = %e,
                    "Skipping setting with unsupported value"
                );
            }
        }
    }
    mapping
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_toml() {
        let content = r#"
            DEBUG = true

            [DRF_REVPROXY]
            MIN_STREAMING_LENGTH = 8192
            DEFAULT_CHARSET = "utf-8"
            IGNORE_HEADERS = ["HTTP_HOST"]

            [CACHES]
            BACKEND = "memory"
        "#;
        let namespaces = parse_settings(content, Format::Toml).unwrap();
        assert_eq!(namespaces.len(), 2);

        let ours = &namespaces[NAMESPACE];
        assert_eq!(ours["MIN_STREAMING_LENGTH"], SettingValue::Integer(8192));
        assert_eq!(ours["DEFAULT_CHARSET"], SettingValue::from("utf-8"));
        assert_eq!(ours["IGNORE_HEADERS"], SettingValue::List(vec!["HTTP_HOST".into()]));
    }

    #[test]
    fn test_parse_json() {
        let content = r#"{"DRF_REVPROXY": {"DEFAULT_AMT": 1024}, "SECRET_KEY": "abc"}"#;
        let namespaces = parse_settings(content, Format::Json).unwrap();
        assert_eq!(namespaces.len(), 1);
        assert_eq!(namespaces[NAMESPACE]["DEFAULT_AMT"], SettingValue::Integer(1024));
    }

    #[test]
    fn test_json_root_must_be_object() {
        let err = parse_settings("[1, 2]", Format::Json).unwrap_err();
        assert!(matches!(err, LoadError::NotATable));
    }

    #[test]
    fn test_unsupported_value_skips_only_that_setting() {
        let content = r#"
            [DRF_REVPROXY]
            DEFAULT_AMT = 1024
            LEGACY_FLAG = true
            RATIO = 0.5

            [OTHER]
            ENABLED = true
            NAME = "x"
        "#;
        let namespaces = parse_settings(content, Format::Toml).unwrap();

        let ours = &namespaces[NAMESPACE];
        assert_eq!(ours.len(), 1);
        assert_eq!(ours["DEFAULT_AMT"], SettingValue::Integer(1024));

        let other = &namespaces["OTHER"];
        assert_eq!(other.len(), 1);
        assert_eq!(other["NAME"], SettingValue::from("x"));
    }

    #[test]
    fn test_json_unsupported_value_skips_only_that_setting() {
        let content = r#"{"DRF_REVPROXY": {"DEFAULT_AMT": 1024, "LEGACY_FLAG": true, "NESTED": {"a": 1}}}"#;
        let namespaces = parse_settings(content, Format::Json).unwrap();

        let ours = &namespaces[NAMESPACE];
        assert_eq!(ours.len(), 1);
        assert_eq!(ours["DEFAULT_AMT"], SettingValue::Integer(1024));
    }

    #[test]
    fn test_invalid_toml() {
        let err = parse_settings("[DRF_REVPROXY\n", Format::Toml).unwrap_err();
        assert!(matches!(err, LoadError::Toml(_)));
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(Format::from_path(Path::new("settings.toml")).unwrap(), Format::Toml);
        assert_eq!(Format::from_path(Path::new("settings.json")).unwrap(), Format::Json);
        assert!(matches!(
            Format::from_path(Path::new("settings.yaml")),
            Err(LoadError::UnsupportedFormat(ext)) if ext == "yaml"
        ));
        assert!(Format::from_path(Path::new("settings")).is_err());
    }

    #[test]
    fn test_load_settings_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[DRF_REVPROXY]\nDEFAULT_AMT = 2048").unwrap();

        let namespaces = load_settings(file.path()).unwrap();
        assert_eq!(namespaces[NAMESPACE]["DEFAULT_AMT"], SettingValue::Integer(2048));
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_settings(Path::new("/nonexistent/settings.toml")).unwrap_err();
        assert!(matches!(err, LoadError::Io(_)));
    }
}
