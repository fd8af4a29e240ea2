//! Settings sources
//!
//! A [`SettingsSource`] is a flat key/value view read once at registry
//! construction. Implementations:
//! - [`ProcessEnv`]: the process environment
//! - [`MapSource`]: an in-memory map (embedding hosts, tests)
//! - [`FileSource`]: a flat YAML or TOML settings file

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use idgate_core::{Error, Result};
use serde_json::Value;
use tracing::{debug, error};

/// Flat key/value settings lookup
pub trait SettingsSource {
    /// Value for `key`, if set
    fn get(&self, key: &str) -> Option<String>;

    /// All keys known to this source
    fn keys(&self) -> Vec<String>;

    /// Value for `key`, treating empty or whitespace-only values as unset
    fn get_non_empty(&self, key: &str) -> Option<String> {
        self.get(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

/// The process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl SettingsSource for ProcessEnv {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }

    fn keys(&self) -> Vec<String> {
        std::env::vars_os()
            .filter_map(|(k, _)| k.into_string().ok())
            .collect()
    }
}

/// In-memory settings
#[derive(Debug, Clone, Default)]
pub struct MapSource {
    values: BTreeMap<String, String>,
}

impl MapSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value (builder style)
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.values.remove(key)
    }
}

impl<K, V> FromIterator<(K, V)> for MapSource
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl SettingsSource for MapSource {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn keys(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }
}

/// Settings file holding a flat map of `IDGATE_*` keys.
///
/// The format follows the extension: `.toml` is parsed as TOML, anything
/// else as YAML. Scalar values are converted to strings; nested tables are
/// rejected.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    values: MapSource,
}

impl FileSource {
    /// Read and parse the settings file
    ///
    /// # Errors
    /// - `Error::Io` if the file can't be read
    /// - `Error::Config` if the file isn't a flat YAML/TOML map
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = expand_tilde(path.as_ref())?;

        let contents = std::fs::read_to_string(&path).map_err(|e| {
            error!("Failed to read settings file {}: {}", path.display(), e);
            Error::Io(e)
        })?;

        let tree: Value = if path.extension().and_then(|s| s.to_str()) == Some("toml") {
            let toml_value: toml::Value = toml::from_str(&contents)
                .map_err(|e| Error::Config(format!("Invalid TOML in {}: {}", path.display(), e)))?;
            serde_json::to_value(toml_value)?
        } else {
            serde_yaml::from_str(&contents)
                .map_err(|e| Error::Config(format!("Invalid YAML in {}: {}", path.display(), e)))?
        };

        let values = flatten(&tree, &path)?;
        debug!(path = %path.display(), keys = values.values.len(), "Loaded settings file");

        Ok(Self { path, values })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsSource for FileSource {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key)
    }

    fn keys(&self) -> Vec<String> {
        self.values.keys()
    }
}

fn flatten(tree: &Value, path: &Path) -> Result<MapSource> {
    let obj = match tree {
        Value::Object(obj) => obj,
        Value::Null => return Ok(MapSource::new()),
        _ => {
            return Err(Error::Config(format!(
                "Settings file {} must contain a key/value map",
                path.display()
            )));
        }
    };

    let mut values = MapSource::new();
    for (key, value) in obj {
        let rendered = match value {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Null => continue,
            // Aliases may be written as a list instead of a comma-separated string
            Value::Array(list) => list
                .iter()
                .filter_map(|v| match v {
                    Value::String(s) => Some(s.clone()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join(","),
            Value::Object(_) => {
                return Err(Error::Config(format!(
                    "Settings key '{}' in {} must be a scalar value",
                    key,
                    path.display()
                )));
            }
        };
        values.set(key.clone(), rendered);
    }

    Ok(values)
}

fn expand_tilde(path: &Path) -> Result<PathBuf> {
    let path_str = path
        .to_str()
        .ok_or_else(|| Error::Config("Invalid UTF-8 in path".to_string()))?;

    if let Some(stripped) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| Error::Config("Could not determine home directory".to_string()))?;
        Ok(home.join(stripped))
    } else {
        Ok(path.to_path_buf())
    }
}
