//! Configuration: layered defaults -> `redcell.toml` -> env vars via the
//! `config` crate, built as a single struct with `#[serde(default = "...")]`
//! fallbacks on every field.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::ExternalError;

fn default_store_path() -> PathBuf {
    PathBuf::from("./redcell-data/knowledge.sled")
}

fn default_session_log_root() -> PathBuf {
    PathBuf::from("./redcell-data/sessions")
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_max_concurrent_invocations() -> usize {
    4
}

fn default_stdout_line_cap() -> usize {
    10_000
}

fn default_raw_output_byte_cap() -> u64 {
    100 * 1024 * 1024
}

fn default_runtime_probe_ttl_secs() -> u64 {
    60
}

fn default_prune_every_n_inserts() -> u64 {
    1_000
}

fn default_prune_every_seconds() -> i64 {
    600
}

fn default_entity_ttl_secs() -> i64 {
    3_600
}

fn default_container_runtime_binary() -> String {
    "docker".to_string()
}

/// The engine's full configuration surface. Secret material (the credential
/// encryption key) is deliberately absent here — it is supplied by the
/// caller at `KnowledgeStore::open_with_key`, never loaded from a config
/// file or logged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,

    #[serde(default = "default_session_log_root")]
    pub session_log_root: PathBuf,

    #[serde(default = "default_timeout_secs")]
    pub default_timeout_secs: u64,

    #[serde(default = "default_max_concurrent_invocations")]
    pub max_concurrent_invocations: usize,

    #[serde(default = "default_stdout_line_cap")]
    pub stdout_line_cap: usize,

    #[serde(default = "default_raw_output_byte_cap")]
    pub raw_output_byte_cap: u64,

    #[serde(default = "default_runtime_probe_ttl_secs")]
    pub runtime_probe_ttl_secs: u64,

    #[serde(default = "default_prune_every_n_inserts")]
    pub prune_every_n_inserts: u64,

    #[serde(default = "default_prune_every_seconds")]
    pub prune_every_seconds: i64,

    #[serde(default = "default_entity_ttl_secs")]
    pub entity_ttl_secs: i64,

    #[serde(default = "default_container_runtime_binary")]
    pub container_runtime_binary: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
            session_log_root: default_session_log_root(),
            default_timeout_secs: default_timeout_secs(),
            max_concurrent_invocations: default_max_concurrent_invocations(),
            stdout_line_cap: default_stdout_line_cap(),
            raw_output_byte_cap: default_raw_output_byte_cap(),
            runtime_probe_ttl_secs: default_runtime_probe_ttl_secs(),
            prune_every_n_inserts: default_prune_every_n_inserts(),
            prune_every_seconds: default_prune_every_seconds(),
            entity_ttl_secs: default_entity_ttl_secs(),
            container_runtime_binary: default_container_runtime_binary(),
        }
    }
}

impl EngineConfig {
    /// Loads defaults, then `path` if it exists, then `REDCELL_*` env vars,
    /// in that precedence order. `.env` loading is an external CLI concern
    /// and is never done here.
    pub fn load(path: Option<&std::path::Path>) -> Result<Self, ExternalError> {
        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&EngineConfig::default()).map_err(|e| {
                ExternalError::RuntimeProbeFailed(format!("default config serialization: {e}"))
            })?);

        if let Some(path) = path {
            if path.exists() {
                builder = builder.add_source(config::File::from(path));
            }
        }

        builder = builder.add_source(
            config::Environment::with_prefix("REDCELL")
                .separator("__")
                .try_parsing(true),
        );

        let built = builder
            .build()
            .map_err(|e| ExternalError::RuntimeProbeFailed(e.to_string()))?;

        built
            .try_deserialize()
            .map_err(|e| ExternalError::RuntimeProbeFailed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_bounds() {
        let cfg = EngineConfig::default();
        assert!(cfg.max_concurrent_invocations > 0);
        assert!(cfg.default_timeout_secs > 0);
        assert!(cfg.entity_ttl_secs > 0);
    }

    #[test]
    fn load_with_no_file_falls_back_to_defaults() {
        let cfg = EngineConfig::load(None).unwrap();
        assert_eq!(cfg.container_runtime_binary, "docker");
    }
}
