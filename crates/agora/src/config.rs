use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{AgoraError, AgoraResult};

const DEFAULT_CONFIG_NAME: &str = "agora.json";

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum DatabaseConfig {
    Sqlite { path: Option<String> },
    Postgres { url: String },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PoolConfig {
    pub max_connections: Option<u32>,
    pub min_connections: Option<u32>,
    pub connect_timeout_ms: Option<u64>,
    pub acquire_timeout_ms: Option<u64>,
    pub idle_timeout_ms: Option<u64>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Directory holding the on-disk index; relative paths resolve against the
    /// base directory passed to `open`.
    pub path: Option<String>,
    /// Stemming language for the analyzed text field ("german", "english", …).
    pub language: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IndexingConfig {
    /// Receive-count threshold after which a job moves to the dead-letter set.
    pub max_attempts: i32,
    pub backoff_base_ms: i64,
    pub backoff_max_ms: i64,
    pub batch_size: u32,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff_base_ms: 500,
            backoff_max_ms: 60_000,
            batch_size: 10,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AgoraConfig {
    pub database: DatabaseConfig,
    pub pool: Option<PoolConfig>,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub indexing: IndexingConfig,
}

impl AgoraConfig {
    pub fn default_sqlite(path: impl Into<String>) -> Self {
        Self {
            database: DatabaseConfig::Sqlite {
                path: Some(path.into()),
            },
            pool: None,
            search: SearchConfig::default(),
            indexing: IndexingConfig::default(),
        }
    }

    pub fn load_or_init(base_dir: &Path, default_sqlite_path: &Path) -> AgoraResult<Self> {
        fs::create_dir_all(base_dir)
            .map_err(|err| AgoraError::storage(format!("create config dir: {err}")))?;
        let config_path = base_dir.join(DEFAULT_CONFIG_NAME);
        if config_path.exists() {
            let raw = fs::read_to_string(&config_path)
                .map_err(|err| AgoraError::storage(format!("read config: {err}")))?;
            let config: AgoraConfig = serde_json::from_str(&raw)
                .map_err(|err| AgoraError::validation("config", err.to_string()))?;
            return Ok(config);
        }
        let default = AgoraConfig::default_sqlite(default_sqlite_path.to_string_lossy());
        let payload = serde_json::to_string_pretty(&default)
            .map_err(|err| AgoraError::storage(format!("serialize config: {err}")))?;
        fs::write(&config_path, payload)
            .map_err(|err| AgoraError::storage(format!("write config: {err}")))?;
        Ok(default)
    }

    pub fn sqlite_path(&self, base_dir: &Path) -> AgoraResult<PathBuf> {
        match &self.database {
            DatabaseConfig::Sqlite { path } => {
                let path = path.clone().unwrap_or_else(|| "agora.sqlite".to_string());
                let candidate = PathBuf::from(path);
                if candidate.is_absolute() {
                    Ok(candidate)
                } else {
                    Ok(base_dir.join(candidate))
                }
            }
            _ => Err(AgoraError::validation(
                "database",
                "config is not sqlite backend",
            )),
        }
    }

    pub fn search_path(&self, base_dir: &Path) -> PathBuf {
        match &self.search.path {
            Some(path) => {
                let candidate = PathBuf::from(path);
                if candidate.is_absolute() {
                    candidate
                } else {
                    base_dir.join(candidate)
                }
            }
            None => base_dir.join("agora_index"),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match self.database {
            DatabaseConfig::Sqlite { .. } => "sqlite",
            DatabaseConfig::Postgres { .. } => "postgres",
        }
    }

    pub fn connection_url(&self) -> Option<&str> {
        match &self.database {
            DatabaseConfig::Sqlite { .. } => None,
            DatabaseConfig::Postgres { url } => Some(url.as_str()),
        }
    }
}
