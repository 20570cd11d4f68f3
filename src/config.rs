//! Registry configuration.
//!
//! A [`RegistryConfig`] can be built in code, deserialized with serde, or
//! assembled from layered [`ConfigSource`]s such as environment variables.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{DiError, DiResult};

/// Default wait before deferred properties fall back to the empty value.
pub const DEFAULT_DEFERRED_TIMEOUT: Duration = Duration::from_secs(5);

/// Environment prefix read by [`RegistryConfig::from_env`].
pub const DEFAULT_ENV_PREFIX: &str = "FERROUS_WIRE";

/// How the registry reacts to dependency cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionPolicy {
    /// Cyclic edges are wired through the deferred pass
    #[default]
    Lazy,
    /// A registration that closes a cycle fails with `CircularDependency`
    Eager,
}

impl FromStr for DetectionPolicy {
    type Err = DiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lazy" | "deferred" => Ok(DetectionPolicy::Lazy),
            "eager" | "strict" => Ok(DetectionPolicy::Eager),
            other => Err(DiError::Config(format!("unknown detection policy '{}'", other))),
        }
    }
}

impl fmt::Display for DetectionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectionPolicy::Lazy => f.write_str("lazy"),
            DetectionPolicy::Eager => f.write_str("eager"),
        }
    }
}

/// Registry settings.
///
/// # Examples
///
/// ```rust
/// use ferrous_wire::{DetectionPolicy, RegistryConfig};
/// use std::time::Duration;
///
/// let config = RegistryConfig::from_json(
///     r#"{ "detection_policy": "eager", "deferred_timeout_ms": 250 }"#,
/// )
/// .unwrap();
///
/// assert_eq!(config.detection_policy, DetectionPolicy::Eager);
/// assert_eq!(config.deferred_timeout, Duration::from_millis(250));
/// assert!(config.cache_declarations);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub detection_policy: DetectionPolicy,
    #[serde(
        rename = "deferred_timeout_ms",
        serialize_with = "serialize_ms",
        deserialize_with = "deserialize_ms"
    )]
    pub deferred_timeout: Duration,
    /// Memoize declared dependencies per target type
    pub cache_declarations: bool,
    /// Infer the category from the identifier suffix when none is given
    pub infer_categories: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            detection_policy: DetectionPolicy::Lazy,
            deferred_timeout: DEFAULT_DEFERRED_TIMEOUT,
            cache_declarations: true,
            infer_categories: true,
        }
    }
}

fn serialize_ms<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_millis() as u64)
}

fn deserialize_ms<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    u64::deserialize(deserializer).map(Duration::from_millis)
}

impl RegistryConfig {
    pub fn from_json(json: &str) -> DiResult<Self> {
        serde_json::from_str(json).map_err(|e| DiError::Config(e.to_string()))
    }

    pub fn from_yaml(yaml: &str) -> DiResult<Self> {
        serde_yaml::from_str(yaml).map_err(|e| DiError::Config(e.to_string()))
    }

    /// Reads `FERROUS_WIRE_*` environment variables over the defaults.
    pub fn from_env() -> DiResult<Self> {
        Self::from_sources(&[&EnvironmentConfigSource::with_prefix(DEFAULT_ENV_PREFIX)])
    }

    /// Layers `sources` over the defaults; earlier sources win.
    pub fn from_sources(sources: &[&dyn ConfigSource]) -> DiResult<Self> {
        let lookup = |key: &str| sources.iter().find_map(|source| source.get(key));
        let mut config = Self::default();

        if let Some(value) = lookup("detection_policy") {
            config.detection_policy = value.as_string()?.parse()?;
        }
        if let Some(value) = lookup("deferred_timeout_ms") {
            config.deferred_timeout = value.as_duration_ms()?;
        }
        if let Some(value) = lookup("cache_declarations") {
            config.cache_declarations = value.as_bool()?;
        }
        if let Some(value) = lookup("infer_categories") {
            config.infer_categories = value.as_bool()?;
        }
        Ok(config)
    }
}

/// A configuration value read from a source.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    String(String),
    Integer(i64),
    Boolean(bool),
}

impl ConfigValue {
    /// Parses raw text the way environment values are read.
    pub fn parse(raw: &str) -> Self {
        if let Ok(int_val) = raw.parse::<i64>() {
            ConfigValue::Integer(int_val)
        } else if let Ok(bool_val) = raw.parse::<bool>() {
            ConfigValue::Boolean(bool_val)
        } else {
            ConfigValue::String(raw.to_string())
        }
    }

    pub fn as_string(&self) -> DiResult<&str> {
        match self {
            ConfigValue::String(s) => Ok(s),
            other => Err(DiError::Config(format!("{:?} is not a string", other))),
        }
    }

    pub fn as_i64(&self) -> DiResult<i64> {
        match self {
            ConfigValue::Integer(i) => Ok(*i),
            other => Err(DiError::Config(format!("{:?} is not an integer", other))),
        }
    }

    pub fn as_bool(&self) -> DiResult<bool> {
        match self {
            ConfigValue::Boolean(b) => Ok(*b),
            other => Err(DiError::Config(format!("{:?} is not a boolean", other))),
        }
    }

    pub fn as_duration_ms(&self) -> DiResult<Duration> {
        let ms = self.as_i64()?;
        if ms < 0 {
            return Err(DiError::Config("duration cannot be negative".into()));
        }
        Ok(Duration::from_millis(ms as u64))
    }
}

/// Source of configuration values.
pub trait ConfigSource: Send + Sync + fmt::Debug {
    fn get(&self, key: &str) -> Option<ConfigValue>;

    fn keys(&self) -> Vec<String>;
}

/// Environment variables, optionally under a prefix.
#[derive(Debug, Default)]
pub struct EnvironmentConfigSource {
    prefix: Option<String>,
}

impl EnvironmentConfigSource {
    pub fn new() -> Self {
        Self { prefix: None }
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
        }
    }

    fn env_key(&self, key: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}_{}", prefix.to_uppercase(), key.to_uppercase()),
            None => key.to_uppercase(),
        }
    }
}

impl ConfigSource for EnvironmentConfigSource {
    fn get(&self, key: &str) -> Option<ConfigValue> {
        env::var(self.env_key(key)).ok().map(|raw| ConfigValue::parse(&raw))
    }

    fn keys(&self) -> Vec<String> {
        env::vars()
            .filter_map(|(key, _)| match &self.prefix {
                Some(prefix) => key
                    .strip_prefix(&format!("{}_", prefix.to_uppercase()))
                    .map(str::to_lowercase),
                None => Some(key.to_lowercase()),
            })
            .collect()
    }
}

/// In-memory source, mostly for tests and programmatic overrides.
#[derive(Debug, Default, Clone)]
pub struct MapConfigSource {
    values: HashMap<String, ConfigValue>,
}

impl MapConfigSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: impl Into<String>, value: ConfigValue) -> Self {
        self.values.insert(key.into(), value);
        self
    }
}

impl ConfigSource for MapConfigSource {
    fn get(&self, key: &str) -> Option<ConfigValue> {
        self.values.get(key).cloned()
    }

    fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.values.keys().cloned().collect();
        keys.sort();
        keys
    }
}
