use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use toml::{map::Map, Value};
use validator::Validate;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("invalid environment override {key}: {message}")]
    Override { key: String, message: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("failed to initialise logging: {0}")]
    Logging(String),
}

pub trait ConfigLoader: Default + Serialize + DeserializeOwned + Validate {
    /// Environment variables `{PREFIX}__SECTION__KEY` override file values.
    fn config_prefix() -> &'static str;
}

/// Builds a config from defaults, `{dir}/default.toml`, `{dir}/{run_env}.toml`
/// and the given environment, in that order. Missing files are skipped.
pub fn load_config_from<T: ConfigLoader>(
    dir: &Path,
    run_env: &str,
    vars: impl IntoIterator<Item = (String, String)>,
) -> Result<T, ConfigError> {
    let mut merged = Value::try_from(T::default())
        .map_err(|err| ConfigError::Invalid(format!("default config is not a table: {err}")))?;

    for name in ["default".to_string(), run_env.to_ascii_lowercase()] {
        let path = dir.join(format!("{name}.toml"));
        if let Some(layer) = read_layer(&path)? {
            tracing::debug!(path = %path.display(), "applying config file");
            merge(&mut merged, layer);
        }
    }

    apply_env_overrides(&mut merged, T::config_prefix(), vars)?;

    let config: T = merged
        .try_into()
        .map_err(|err: toml::de::Error| ConfigError::Invalid(err.to_string()))?;
    config
        .validate()
        .map_err(|err| ConfigError::Invalid(err.to_string().replace('\n', "; ")))?;
    Ok(config)
}

fn read_layer(path: &Path) -> Result<Option<Value>, ConfigError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let table: Map<String, Value> = toml::from_str(&raw).map_err(|err| ConfigError::Parse {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;
    Ok(Some(Value::Table(table)))
}

fn merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Table(base), Value::Table(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

fn apply_env_overrides(
    root: &mut Value,
    prefix: &str,
    vars: impl IntoIterator<Item = (String, String)>,
) -> Result<(), ConfigError> {
    let marker = format!("{prefix}__");

    for (key, raw) in vars {
        let Some(path) = key.strip_prefix(&marker) else {
            continue;
        };
        let segments: Vec<String> = path.split("__").map(str::to_ascii_lowercase).collect();
        if segments.iter().any(String::is_empty) {
            return Err(ConfigError::Override {
                key,
                message: "empty path segment".to_string(),
            });
        }

        set_path(root, &segments, &raw).map_err(|message| ConfigError::Override {
            key: key.clone(),
            message,
        })?;
        tracing::debug!(key = %key, "applied environment override");
    }

    Ok(())
}

fn set_path(root: &mut Value, segments: &[String], raw: &str) -> Result<(), String> {
    let (last, parents) = segments
        .split_last()
        .ok_or_else(|| "empty key".to_string())?;

    let mut node = root;
    for segment in parents {
        let table = node
            .as_table_mut()
            .ok_or_else(|| format!("`{segment}` is not inside a section"))?;
        node = table
            .entry(segment.clone())
            .or_insert(Value::Table(Map::new()));
    }

    let table = node
        .as_table_mut()
        .ok_or_else(|| format!("`{last}` is not inside a section"))?;
    let value = parse_scalar(raw, table.get(last));
    table.insert(last.clone(), value);
    Ok(())
}

/// Keeps the type of the value being replaced; guesses for new keys.
fn parse_scalar(raw: &str, existing: Option<&Value>) -> Value {
    match existing {
        Some(Value::String(_)) => return Value::String(raw.to_string()),
        Some(Value::Float(_)) => {
            if let Ok(float) = raw.parse::<f64>() {
                return Value::Float(float);
            }
        }
        _ => {}
    }

    if let Ok(flag) = raw.parse::<bool>() {
        Value::Boolean(flag)
    } else if let Ok(int) = raw.parse::<i64>() {
        Value::Integer(int)
    } else if let Ok(float) = raw.parse::<f64>() {
        Value::Float(float)
    } else {
        Value::String(raw.to_string())
    }
}
