//! Configuration files with inline documentation
//!
//! A config struct derives `Serialize`/`Deserialize`/`Default` and gets its
//! [`DocumentedConfig`] implementation from `documented_config!`. Regular
//! fields are always written; `[optional]` fields are written commented out
//! while unset so the file still shows what can be configured.
//!
//! ```ignore
//! documented_config!(InstallerConfig,
//!     cache_dir, "Directory for downloaded artifacts",
//!     [optional] catalog_overlay, "Extra catalog merged over the built-in one",
//!     => Ok(paths::config_dir()?.join("config.toml"))
//! );
//! ```

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};

/// Metadata about a configuration field
#[derive(Debug, Clone)]
pub struct ConfigFieldMeta {
    pub name: &'static str,
    /// TOML-serialized default value, or None if serialization failed
    pub default_value: Option<String>,
    pub description: &'static str,
    pub is_optional: bool,
}

/// Trait for configs with documented defaults, implemented by
/// `documented_config!`.
pub trait DocumentedConfig: Sized + Default {
    fn field_metadata() -> Vec<ConfigFieldMeta>;

    fn is_optional_field_set(&self, field_name: &str) -> bool;

    /// TOML-serialized value of a field
    fn get_field_value(&self, field_name: &str) -> String;

    /// Get path where this config should be stored
    fn config_path() -> Result<PathBuf>;

    /// Render the config with one documented `key = value` line per field
    fn to_documented_toml(&self) -> String {
        let mut output = String::new();
        for field in Self::field_metadata() {
            if field.is_optional && !self.is_optional_field_set(field.name) {
                let Some(default_val) = &field.default_value else {
                    continue;
                };
                output.push_str(&format!(
                    "# {} = {}  # {}\n",
                    field.name, default_val, field.description
                ));
            } else {
                output.push_str(&format!(
                    "{} = {}  # {}\n",
                    field.name,
                    self.get_field_value(field.name),
                    field.description
                ));
            }
        }
        output
    }

    fn save_with_documentation(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating config directory {}", parent.display()))?;
        }
        fs::write(path, self.to_documented_toml())
            .with_context(|| format!("writing config to {}", path.display()))?;
        Ok(())
    }

    /// Load from `path`, writing a documented default file first if none exists
    fn load_from_path_documented(path: &Path) -> Result<Self>
    where
        Self: DeserializeOwned,
    {
        if !path.exists() {
            let config = Self::default();
            config.save_with_documentation(path)?;
            return Ok(config);
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("parsing config {}", path.display()))
    }
}

/// Macro to generate a `DocumentedConfig` implementation
#[macro_export]
macro_rules! documented_config {
    (
        $config_name:ident,
        $($field:ident, $desc:expr,)*
        $([optional] $opt_field:ident, $opt_desc:expr,)*
        => $path:expr $(,)?
    ) => {
        impl $crate::common::config::DocumentedConfig for $config_name {
            fn field_metadata() -> Vec<$crate::common::config::ConfigFieldMeta> {
                let default_config = Self::default();
                vec![
                    $(
                        $crate::common::config::ConfigFieldMeta {
                            name: stringify!($field),
                            default_value: toml::Value::try_from(&default_config.$field)
                                .map(|v| v.to_string())
                                .ok(),
                            description: $desc,
                            is_optional: false,
                        },
                    )*
                    $(
                        $crate::common::config::ConfigFieldMeta {
                            name: stringify!($opt_field),
                            default_value: {
                                let inner_default = default_config.$opt_field.clone()
                                    .unwrap_or_default();
                                toml::Value::try_from(&inner_default)
                                    .map(|v| v.to_string())
                                    .ok()
                            },
                            description: $opt_desc,
                            is_optional: true,
                        },
                    )*
                ]
            }

            #[allow(unused_variables)]
            fn is_optional_field_set(&self, field_name: &str) -> bool {
                match field_name {
                    $(
                        stringify!($opt_field) => self.$opt_field.is_some(),
                    )*
                    _ => false,
                }
            }

            fn get_field_value(&self, field_name: &str) -> String {
                match field_name {
                    $(
                        stringify!($field) => toml::Value::try_from(&self.$field)
                            .map(|v| v.to_string())
                            .unwrap_or_else(|_| format!("{:?}", self.$field)),
                    )*
                    $(
                        stringify!($opt_field) => {
                            let value = self.$opt_field.clone().unwrap_or_default();
                            toml::Value::try_from(&value)
                                .map(|v| v.to_string())
                                .unwrap_or_else(|_| "\"\"".to_string())
                        }
                    )*
                    _ => String::new(),
                }
            }

            fn config_path() -> ::anyhow::Result<::std::path::PathBuf> {
                $path
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(default)]
    struct SampleConfig {
        retries: u32,
        mirror: Option<String>,
    }

    impl Default for SampleConfig {
        fn default() -> Self {
            Self {
                retries: 3,
                mirror: None,
            }
        }
    }

    crate::documented_config!(SampleConfig,
        retries, "How often to retry",
        [optional] mirror, "Mirror to download from",
        => Ok(PathBuf::from("sample.toml"))
    );

    #[test]
    fn unset_optional_fields_are_commented() {
        let rendered = SampleConfig::default().to_documented_toml();
        assert!(rendered.contains("retries = 3  # How often to retry"));
        assert!(rendered.contains("# mirror = \"\"  # Mirror to download from"));
    }

    #[test]
    fn set_optional_fields_are_written() {
        let config = SampleConfig {
            retries: 1,
            mirror: Some("https://mirror.example".into()),
        };
        let rendered = config.to_documented_toml();
        assert!(rendered.contains("mirror = \"https://mirror.example\"  #"));
        assert!(!rendered.contains("# mirror"));
    }

    #[test]
    fn load_creates_documented_default_then_reads_it_back() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("config.toml");

        let created = SampleConfig::load_from_path_documented(&path).expect("create");
        assert_eq!(created, SampleConfig::default());
        assert!(path.exists());

        fs::write(&path, "retries = 7\nmirror = \"m\"\n").expect("write");
        let loaded = SampleConfig::load_from_path_documented(&path).expect("load");
        assert_eq!(loaded.retries, 7);
        assert_eq!(loaded.mirror.as_deref(), Some("m"));
    }

    #[test]
    fn documented_output_parses_as_toml() {
        let rendered = SampleConfig::default().to_documented_toml();
        let parsed: SampleConfig = toml::from_str(&rendered).expect("valid toml");
        assert_eq!(parsed, SampleConfig::default());
    }
}
