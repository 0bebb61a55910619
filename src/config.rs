// ABOUTME: Configuration module for the markdownreveal application
// ABOUTME: Loads the layered YAML configuration (defaults, style bundle, local file)

use crate::assets::STYLE_DIR;
use crate::errors::{RevealError, Result};
use log::debug;
use serde::Deserialize;
use serde_yml::Value;
use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Built-in defaults, always the first configuration layer.
const CONFIG_TEMPLATE: &str = include_str!("config.template.yaml");

/// Name of the local and style-level configuration files
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Environment variable overriding the home directory (for isolated runs)
pub const HOME_ENV_VAR: &str = "MARKDOWNREVEAL_HOME";

/// A scalar configuration value, as found in the extra flags/variables maps
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(value) => write!(f, "{}", value),
            Scalar::Integer(value) => write!(f, "{}", value),
            // Debug keeps the fractional part, so 2.0 stays "2.0"
            Scalar::Float(value) => write!(f, "{:?}", value),
            Scalar::Text(value) => f.write_str(value),
        }
    }
}

/// Which Markdown to slides converter to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConverterKind {
    Builtin,
    Pandoc,
}

/// Which tool mirrors the source directory into the output directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MirrorKind {
    Builtin,
    Rsync,
}

/// How the browser learns that the output changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReloadMode {
    /// HTTP request to the live server, pushed to browsers over a WebSocket
    Push,
    /// Append to a marker file the browser polls
    Poll,
}

/// Fully merged configuration for one generation run
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Cache root; relative in the YAML layers, absolute once loaded
    pub local_path: PathBuf,
    #[serde(skip)]
    pub output_path: PathBuf,
    pub reveal_version: String,
    pub katex_version: String,
    pub style: String,
    pub theme: String,
    pub footer: String,
    pub header: String,
    pub logo: String,
    pub background: String,
    pub warmup: String,
    pub custom_css: String,
    pub no_warmup: bool,
    pub katex: bool,
    pub emoji_codes: bool,
    /// Reveal list items one at a time; `increment` in configuration files
    #[serde(rename = "increment")]
    pub incremental: bool,
    pub converter: ConverterKind,
    pub mirror: MirrorKind,
    pub reload: ReloadMode,
    #[serde(rename = "pandoc_extra")]
    pub converter_flags: BTreeMap<String, Scalar>,
    #[serde(rename = "reveal_extra")]
    pub template_variables: BTreeMap<String, Scalar>,
}

/// Recursively update `template` with the values found in `overrides`.
///
/// Nested mappings are merged key by key; any other value in `overrides`
/// replaces the template value wholesale. A null override (an empty YAML
/// file) leaves the template untouched.
pub fn merge_config(template: Value, overrides: Value) -> Value {
    match (template, overrides) {
        (template, Value::Null) => template,
        (Value::Mapping(mut base), Value::Mapping(overrides)) => {
            for (key, value) in overrides {
                match base.get_mut(&key) {
                    Some(existing) if existing.is_mapping() && value.is_mapping() => {
                        let current = std::mem::replace(existing, Value::Null);
                        *existing = merge_config(current, value);
                    }
                    Some(existing) => *existing = value,
                    None => {
                        base.insert(key, value);
                    }
                }
            }
            Value::Mapping(base)
        }
        (_, overrides) => overrides,
    }
}

/// Loads configuration layers from disk; rebuilt on every generation
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    home: PathBuf,
    local_file: PathBuf,
    require_local_file: bool,
}

impl ConfigLoader {
    /// Create a loader with an explicit home directory and local config file
    pub fn new(home: impl Into<PathBuf>, local_file: impl Into<PathBuf>) -> Self {
        Self {
            home: home.into(),
            local_file: local_file.into(),
            require_local_file: false,
        }
    }

    /// Create a loader whose home comes from `MARKDOWNREVEAL_HOME` or the user's home
    pub fn from_env(local_file: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self::new(Self::home_dir()?, local_file))
    }

    /// Fail with `ConfigurationMissing` if the local file does not exist
    pub fn require_local_file(mut self) -> Self {
        self.require_local_file = true;
        self
    }

    pub fn home_dir() -> Result<PathBuf> {
        match env::var_os(HOME_ENV_VAR) {
            Some(home) if !home.is_empty() => Ok(PathBuf::from(home)),
            _ => dirs::home_dir().ok_or_else(|| {
                RevealError::ConfigError("Could not determine the home directory".to_string())
            }),
        }
    }

    pub fn local_file(&self) -> &Path {
        &self.local_file
    }

    /// Merge defaults, local file, style file and the local file again.
    ///
    /// The local file is applied twice so that it can point at a style
    /// bundle (first pass) and still override that style's settings.
    pub fn load(&self) -> Result<Config> {
        let template: Value = serde_yml::from_str(CONFIG_TEMPLATE)?;
        if !template.is_mapping() {
            return Err(RevealError::ConfigError(
                "Default configuration template is not a mapping".to_string(),
            ));
        }

        if self.require_local_file && !self.local_file.is_file() {
            return Err(RevealError::ConfigurationMissing(self.local_file.clone()));
        }
        let local = read_layer(&self.local_file)?;

        let merged = merge_config(template, local.clone());
        let config = self.complete(merged.clone())?;

        let style_file = config.output_path.join(STYLE_DIR).join(CONFIG_FILE_NAME);
        let style = read_layer(&style_file)?;

        let merged = merge_config(merge_config(merged, style), local);
        self.complete(merged)
    }

    /// Turn a merged layer into a typed config with absolute paths
    fn complete(&self, merged: Value) -> Result<Config> {
        let mut config: Config = serde_yml::from_value(merged)?;
        config.local_path = self.home.join(&config.local_path);
        config.output_path = config.local_path.join("out");
        config
            .template_variables
            .insert("theme".to_string(), Scalar::Text(config.theme.clone()));
        Ok(config)
    }
}

/// Read one YAML layer; a missing file is an empty layer
fn read_layer(path: &Path) -> Result<Value> {
    if !path.is_file() {
        return Ok(Value::Null);
    }
    debug!("Loading configuration layer {:?}", path);
    let content = fs::read_to_string(path)?;
    let value: Value = serde_yml::from_str(&content)?;
    match value {
        Value::Null | Value::Mapping(_) => Ok(value),
        _ => Err(RevealError::ConfigError(format!(
            "Configuration file {:?} must contain a mapping",
            path
        ))),
    }
}
