use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{AppError, Result};

pub const DEFAULT_MONGODB_URI: &str = "mongodb://localhost:27017/doctorados";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_mongodb_uri")]
    pub mongodb_uri: String,

    /// Database name used when the URI does not carry one.
    #[serde(default = "default_database")]
    pub database: String,

    #[serde(default = "default_collection")]
    pub collection: String,

    pub openai_api_key: Option<String>,

    #[serde(default = "default_openai_base_url")]
    pub openai_base_url: String,

    #[serde(default = "default_openai_model")]
    pub openai_model: String,

    #[serde(default = "default_geocoding_url")]
    pub geocoding_url: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_backup_dir")]
    pub backup_dir: String,

    #[serde(default = "default_enrich_workers")]
    pub enrich_workers: usize,
}

fn default_mongodb_uri() -> String {
    DEFAULT_MONGODB_URI.to_string()
}

fn default_database() -> String {
    "doctorados".to_string()
}

fn default_collection() -> String {
    "programas".to_string()
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_openai_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_geocoding_url() -> String {
    "https://nominatim.openstreetmap.org/search".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_backup_dir() -> String {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("doctorados")
        .join("backups")
        .to_string_lossy()
        .to_string()
}

fn default_enrich_workers() -> usize {
    1
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mongodb_uri: default_mongodb_uri(),
            database: default_database(),
            collection: default_collection(),
            openai_api_key: None,
            openai_base_url: default_openai_base_url(),
            openai_model: default_openai_model(),
            geocoding_url: default_geocoding_url(),
            port: default_port(),
            backup_dir: default_backup_dir(),
            enrich_workers: default_enrich_workers(),
        }
    }
}

impl Config {
    /// Load the TOML config file (writing defaults on first run), then apply
    /// environment overrides. A `.env` file in the working directory is honoured.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config_path = Self::config_path();

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            let config = Config::default();
            config.save()?;
            config
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        // Secrets come from the environment; never persist them.
        let persisted = Config {
            openai_api_key: None,
            ..self.clone()
        };
        let content = toml::to_string_pretty(&persisted)
            .map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("doctorados")
            .join("config.toml")
    }

    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(uri) = non_empty("MONGODB_URI") {
            self.mongodb_uri = uri;
        }
        if let Some(key) = non_empty("OPENAI_API_KEY") {
            self.openai_api_key = Some(key);
        }
        if let Some(port) = non_empty("PORT") {
            self.port = port
                .trim()
                .parse()
                .map_err(|_| AppError::Config(format!("PORT is not a valid port: {}", port)))?;
        }
        if let Some(dir) = non_empty("BACKUP_DIR") {
            self.backup_dir = dir;
        }
        if let Some(workers) = non_empty("ENRICH_WORKERS") {
            self.enrich_workers = workers.trim().parse().map_err(|_| {
                AppError::Config(format!("ENRICH_WORKERS is not a number: {}", workers))
            })?;
        }
        if self.enrich_workers == 0 {
            self.enrich_workers = 1;
        }
        Ok(())
    }

    /// Database named in the URI path (`mongodb://host/dbname?opts`), if any,
    /// otherwise the configured fallback.
    pub fn database_name(&self) -> String {
        let without_scheme = self
            .mongodb_uri
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(&self.mongodb_uri);

        without_scheme
            .split_once('/')
            .map(|(_, path)| path.split('?').next().unwrap_or_default())
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| self.database.clone())
    }

    pub fn backup_path(&self) -> PathBuf {
        PathBuf::from(&self.backup_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_match_documented_environment() {
        let config = Config::default();
        assert_eq!(config.mongodb_uri, DEFAULT_MONGODB_URI);
        assert_eq!(config.port, 3000);
        assert_eq!(config.collection, "programas");
        assert_eq!(config.enrich_workers, 1);
        assert!(config.openai_api_key.is_none());
    }

    #[test]
    fn environment_overrides_file_values() {
        let vars = env(&[
            ("MONGODB_URI", "mongodb://db:27017/otra"),
            ("OPENAI_API_KEY", "sk-test"),
            ("PORT", "8080"),
            ("BACKUP_DIR", "/tmp/backups"),
        ]);
        let mut config = Config::default();
        config.apply_env(|k| vars.get(k).cloned()).unwrap();

        assert_eq!(config.mongodb_uri, "mongodb://db:27017/otra");
        assert_eq!(config.openai_api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.port, 8080);
        assert_eq!(config.backup_dir, "/tmp/backups");
        assert_eq!(config.database_name(), "otra");
    }

    #[test]
    fn invalid_port_is_a_config_error() {
        let vars = env(&[("PORT", "http")]);
        let mut config = Config::default();
        let err = config.apply_env(|k| vars.get(k).cloned()).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn database_name_falls_back_when_uri_has_no_path() {
        let mut config = Config::default();
        config.mongodb_uri = "mongodb://localhost:27017".to_string();
        assert_eq!(config.database_name(), "doctorados");

        config.mongodb_uri = "mongodb+srv://u:p@cluster.example.net/prod?retryWrites=true".to_string();
        assert_eq!(config.database_name(), "prod");
    }

    #[test]
    fn zero_workers_is_clamped_to_one() {
        let vars = env(&[("ENRICH_WORKERS", "0")]);
        let mut config = Config::default();
        config.apply_env(|k| vars.get(k).cloned()).unwrap();
        assert_eq!(config.enrich_workers, 1);
    }
}
