use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::static_config::{StaticConfigItem, ValueKind, STATIC_CONFIG_TABLE};

/// Flattened view of the TOML configuration, keyed by dotted path
/// (`storage.dsn`, `telemetry.null_temperature`, ...).
///
/// Lookups fall back to the defaults declared in [`STATIC_CONFIG_TABLE`].
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SystemConfig {
    values: HashMap<String, String>,
}

impl SystemConfig {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn get_string(&self, key: &str) -> String {
        self.get(key)
            .map(str::to_string)
            .or_else(|| default_value(key))
            .unwrap_or_default()
    }

    pub fn get_number(&self, key: &str) -> i64 {
        self.get(key)
            .and_then(parse_number)
            .or_else(|| default_value(key).as_deref().and_then(parse_number))
            .unwrap_or_default()
    }

    pub fn get_bool(&self, key: &str) -> bool {
        self.get(key)
            .and_then(parse_bool)
            .or_else(|| default_value(key).as_deref().and_then(parse_bool))
            .unwrap_or(false)
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) -> Result<(), ConfigError> {
        if config_item(key).is_none() {
            return Err(ConfigError::UnknownKey(key.to_string()));
        }
        self.values.insert(key.to_string(), value.into());
        Ok(())
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.values.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config parse error: {0}")]
    Parse(String),
    #[error("unknown config key: {0}")]
    UnknownKey(String),
    #[error("type mismatch for key {0}: expected {1}")]
    TypeMismatch(String, String),
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),
}

pub struct SystemConfigLoader;

impl SystemConfigLoader {
    pub fn from_str(input: &str) -> Result<SystemConfig, ConfigError> {
        let root: toml::Table =
            toml::from_str(input).map_err(|err| ConfigError::Parse(err.to_string()))?;
        let mut values = HashMap::new();
        collect_table(&mut values, None, &root)?;
        Ok(SystemConfig { values })
    }

    pub fn from_path(path: &Path) -> Result<(String, SystemConfig), ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config = Self::from_str(&raw)?;
        Ok((raw, config))
    }
}

/// Renders every known key with its default, grouped by table, as a
/// starting point for a fresh installation.
pub fn default_config_template() -> String {
    let mut tables: Vec<(&str, Vec<String>)> = Vec::new();
    for item in STATIC_CONFIG_TABLE {
        let Some((table, field)) = item.key.split_once('.') else {
            continue;
        };
        let rendered = match item.kind {
            ValueKind::String => format!("{field} = \"{}\"", item.default_value),
            ValueKind::Number | ValueKind::Boolean => format!("{field} = {}", item.default_value),
        };
        match tables.iter_mut().find(|(name, _)| *name == table) {
            Some((_, fields)) => fields.push(rendered),
            None => tables.push((table, vec![rendered])),
        }
    }
    let lines: Vec<String> = tables
        .into_iter()
        .map(|(table, fields)| format!("{table} = {{ {} }}", fields.join(", ")))
        .collect();
    format!("{}\n", lines.join("\n"))
}

/// Walks nested tables depth-first; the first unknown key or mistyped value
/// aborts the load.
fn collect_table(
    output: &mut HashMap<String, String>,
    prefix: Option<&str>,
    table: &toml::Table,
) -> Result<(), ConfigError> {
    for (name, value) in table {
        let key = match prefix {
            Some(prefix) => format!("{prefix}.{name}"),
            None => name.clone(),
        };
        if let toml::Value::Table(nested) = value {
            collect_table(output, Some(&key), nested)?;
            continue;
        }
        let Some((text, found)) = scalar(value) else {
            return Err(ConfigError::TypeMismatch(key, "string|number|boolean".to_string()));
        };
        let item = config_item(&key).ok_or_else(|| ConfigError::UnknownKey(key.clone()))?;
        if item.kind != found {
            return Err(ConfigError::TypeMismatch(key, item.kind.as_str().to_string()));
        }
        output.insert(key, text);
    }
    Ok(())
}

fn scalar(value: &toml::Value) -> Option<(String, ValueKind)> {
    match value {
        toml::Value::String(text) => Some((text.clone(), ValueKind::String)),
        toml::Value::Integer(number) => Some((number.to_string(), ValueKind::Number)),
        toml::Value::Float(number) => Some((number.to_string(), ValueKind::Number)),
        toml::Value::Boolean(flag) => Some((flag.to_string(), ValueKind::Boolean)),
        _ => None,
    }
}

fn config_item(key: &str) -> Option<&'static StaticConfigItem> {
    STATIC_CONFIG_TABLE.iter().find(|item| item.key == key)
}

fn default_value(key: &str) -> Option<String> {
    config_item(key).map(|item| item.default_value.to_string())
}

fn parse_number(value: &str) -> Option<i64> {
    value
        .parse::<i64>()
        .ok()
        .or_else(|| value.parse::<f64>().ok().map(|float| float as i64))
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}
