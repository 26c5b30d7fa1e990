//! Bundle representation and the typed views of the "database" and "upload" bundles.

use crate::error::ConfigError;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;

/// Immutable option mapping loaded from one named bundle file.
#[derive(Clone, Debug, PartialEq)]
pub struct ConfigBundle {
    name: String,
    values: Map<String, Value>,
}

impl ConfigBundle {
    pub fn new(name: impl Into<String>, values: Map<String, Value>) -> Self {
        ConfigBundle {
            name: name.into(),
            values,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    /// Deserialize the whole bundle into a typed view.
    pub fn parse<T>(&self) -> Result<T, ConfigError>
    where
        T: for<'de> Deserialize<'de>,
    {
        serde_json::from_value(Value::Object(self.values.clone()))
            .map_err(|e| ConfigError::Load(format!("{}: {}", self.name, e)))
    }
}

/// The "database" bundle.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub hostname: String,
    pub dbname: String,
    #[serde(default = "default_port", deserialize_with = "port_from_number_or_string")]
    pub port: u16,
    #[serde(default = "default_charset")]
    pub charset: String,
    pub username: String,
    #[serde(default)]
    pub password: String,
}

fn default_port() -> u16 {
    5432
}

fn default_charset() -> String {
    "utf8".into()
}

fn port_from_number_or_string<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Value::deserialize(deserializer)?;
    match v {
        Value::Number(n) => n
            .as_u64()
            .and_then(|n| u16::try_from(n).ok())
            .ok_or_else(|| serde::de::Error::custom(format!("invalid port: {}", n))),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid port: {}", s))),
        other => Err(serde::de::Error::custom(format!("invalid port: {}", other))),
    }
}

/// The "upload" bundle.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UploadConfig {
    pub directory: PathBuf,
    #[serde(default)]
    pub allowed_extensions: Vec<String>,
    pub max_size: u64,
}
