//! Deployment configuration.
//!
//! Mirrors the Configuration table: a JSON file on disk supplies a base
//! set of values (all optional, falling back to the documented
//! defaults), and `GRIDRUNNER_*` environment variables overlay it — the
//! way a deployable service is actually configured, not a feature the
//! core itself exposes.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read { path: String, #[source] source: std::io::Error },

    #[error("failed to parse config file {path}: {source}")]
    Parse { path: String, #[source] source: serde_json::Error },

    #[error("environment variable {0} was not valid UTF-8")]
    InvalidEnvValue(String),

    #[error("environment variable {name} is not a valid number: {value}")]
    InvalidEnvNumber { name: String, value: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GridrunnerConfig {
    #[serde(default = "defaults::script_dir")]
    pub script_dir: PathBuf,
    #[serde(default = "defaults::lock_dir")]
    pub lock_dir: PathBuf,
    #[serde(default = "defaults::js_dir")]
    pub js_dir: PathBuf,
    #[serde(default = "defaults::grid_url")]
    pub grid_url: String,
    #[serde(default = "defaults::pool_init_timeout_s")]
    pub pool_init_timeout_s: u64,
    #[serde(default = "defaults::default_lock_ttl_s")]
    pub default_lock_ttl_s: u64,
    #[serde(default = "defaults::stream_lock_ttl_s")]
    pub stream_lock_ttl_s: u64,
    #[serde(default = "defaults::implicit_wait_s")]
    pub implicit_wait_s: u64,
}

mod defaults {
    use std::path::PathBuf;

    pub fn script_dir() -> PathBuf {
        PathBuf::from("./storage/sides")
    }
    pub fn lock_dir() -> PathBuf {
        PathBuf::from("./storage/locks")
    }
    pub fn js_dir() -> PathBuf {
        PathBuf::from("./storage/js")
    }
    pub fn grid_url() -> String {
        "http://localhost:4444".to_string()
    }
    pub fn pool_init_timeout_s() -> u64 {
        30
    }
    pub fn default_lock_ttl_s() -> u64 {
        300
    }
    pub fn stream_lock_ttl_s() -> u64 {
        3600
    }
    pub fn implicit_wait_s() -> u64 {
        10
    }
}

impl Default for GridrunnerConfig {
    fn default() -> Self {
        GridrunnerConfig {
            script_dir: defaults::script_dir(),
            lock_dir: defaults::lock_dir(),
            js_dir: defaults::js_dir(),
            grid_url: defaults::grid_url(),
            pool_init_timeout_s: defaults::pool_init_timeout_s(),
            default_lock_ttl_s: defaults::default_lock_ttl_s(),
            stream_lock_ttl_s: defaults::stream_lock_ttl_s(),
            implicit_wait_s: defaults::implicit_wait_s(),
        }
    }
}

impl GridrunnerConfig {
    /// Loads defaults, overlays an optional JSON file, then overlays
    /// `GRIDRUNNER_*` environment variables. Missing file or missing env
    /// vars are not errors; a present-but-malformed file or a present but
    /// non-numeric env var is.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) if path.exists() => {
                let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.display().to_string(),
                    source,
                })?;
                serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
                    path: path.display().to_string(),
                    source,
                })?
            }
            _ => GridrunnerConfig::default(),
        };
        config.apply_env(&std::env::vars().collect())?;
        Ok(config)
    }

    fn apply_env(&mut self, env: &HashMap<String, String>) -> Result<(), ConfigError> {
        if let Some(v) = env.get("GRIDRUNNER_SCRIPT_DIR") {
            self.script_dir = PathBuf::from(v);
        }
        if let Some(v) = env.get("GRIDRUNNER_LOCK_DIR") {
            self.lock_dir = PathBuf::from(v);
        }
        if let Some(v) = env.get("GRIDRUNNER_JS_DIR") {
            self.js_dir = PathBuf::from(v);
        }
        if let Some(v) = env.get("GRIDRUNNER_GRID_URL") {
            self.grid_url = v.clone();
        }
        self.pool_init_timeout_s =
            parse_env_u64(env, "GRIDRUNNER_POOL_INIT_TIMEOUT_S", self.pool_init_timeout_s)?;
        self.default_lock_ttl_s =
            parse_env_u64(env, "GRIDRUNNER_DEFAULT_LOCK_TTL_S", self.default_lock_ttl_s)?;
        self.stream_lock_ttl_s =
            parse_env_u64(env, "GRIDRUNNER_STREAM_LOCK_TTL_S", self.stream_lock_ttl_s)?;
        self.implicit_wait_s =
            parse_env_u64(env, "GRIDRUNNER_IMPLICIT_WAIT_S", self.implicit_wait_s)?;
        Ok(())
    }
}

fn parse_env_u64(
    env: &HashMap<String, String>,
    name: &str,
    current: u64,
) -> Result<u64, ConfigError> {
    match env.get(name) {
        Some(value) => value.parse().map_err(|_| ConfigError::InvalidEnvNumber {
            name: name.to_string(),
            value: value.clone(),
        }),
        None => Ok(current),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_table() {
        let config = GridrunnerConfig::default();
        assert_eq!(config.grid_url, "http://localhost:4444");
        assert_eq!(config.pool_init_timeout_s, 30);
        assert_eq!(config.default_lock_ttl_s, 300);
        assert_eq!(config.stream_lock_ttl_s, 3600);
        assert_eq!(config.implicit_wait_s, 10);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = GridrunnerConfig::load(Some(Path::new("/nonexistent/gridrunner.json"))).unwrap();
        assert_eq!(config, GridrunnerConfig::default());
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gridrunner.json");
        std::fs::write(&path, r#"{"grid_url": "http://grid.internal:4444"}"#).unwrap();
        let config = GridrunnerConfig::load(Some(&path)).unwrap();
        assert_eq!(config.grid_url, "http://grid.internal:4444");
        assert_eq!(config.implicit_wait_s, 10, "unset fields keep their default");
    }

    #[test]
    fn env_vars_override_the_file() {
        let mut config = GridrunnerConfig::default();
        let mut env = HashMap::new();
        env.insert("GRIDRUNNER_GRID_URL".to_string(), "http://override:4444".to_string());
        env.insert("GRIDRUNNER_IMPLICIT_WAIT_S".to_string(), "25".to_string());
        config.apply_env(&env).unwrap();
        assert_eq!(config.grid_url, "http://override:4444");
        assert_eq!(config.implicit_wait_s, 25);
    }

    #[test]
    fn invalid_env_number_is_rejected() {
        let mut config = GridrunnerConfig::default();
        let mut env = HashMap::new();
        env.insert("GRIDRUNNER_IMPLICIT_WAIT_S".to_string(), "not-a-number".to_string());
        let err = config.apply_env(&env).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvNumber { .. }));
    }
}
