// Configuration management and loading
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, debug};

use super::AppConfig;

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid YAML configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid JSON configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

/// Configuration manager for loading and saving the app configuration
pub struct ConfigManager {
    config_path: PathBuf,
    config: Arc<RwLock<AppConfig>>,
}

impl ConfigManager {
    pub fn new(config_path: PathBuf) -> Self {
        Self {
            config_path,
            config: Arc::new(RwLock::new(AppConfig::default())),
        }
    }

    /// Load configuration from file, writing defaults if it does not exist yet
    pub async fn load(&self) -> Result<(), ConfigError> {
        if tokio::fs::try_exists(&self.config_path).await? {
            info!("Loading configuration from: {:?}", self.config_path);

            let content = tokio::fs::read_to_string(&self.config_path).await?;
            let loaded_config: AppConfig = if self.is_json() {
                serde_json::from_str(&content)?
            } else {
                // Default to YAML
                serde_yaml::from_str(&content)?
            };

            validate(&loaded_config).map_err(ConfigError::Invalid)?;

            *self.config.write().await = loaded_config;
            debug!("Configuration loaded successfully");
        } else {
            info!("Configuration file not found, using defaults: {:?}", self.config_path);
            self.save().await?;
        }

        Ok(())
    }

    /// Save configuration to file
    pub async fn save(&self) -> Result<(), ConfigError> {
        info!("Saving configuration to: {:?}", self.config_path);

        if let Some(parent) = self.config_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let content = {
            let config = self.config.read().await;
            if self.is_json() {
                serde_json::to_string_pretty(&*config)?
            } else {
                serde_yaml::to_string(&*config)?
            }
        };

        tokio::fs::write(&self.config_path, content).await?;
        debug!("Configuration saved successfully");

        Ok(())
    }

    /// Get a copy of the current configuration
    pub async fn get_config(&self) -> AppConfig {
        self.config.read().await.clone()
    }

    /// Replace the configuration after validating it
    pub async fn update_config(&self, new_config: AppConfig) -> Result<(), ConfigError> {
        validate(&new_config).map_err(ConfigError::Invalid)?;
        *self.config.write().await = new_config;
        Ok(())
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    fn is_json(&self) -> bool {
        self.config_path.extension().and_then(|ext| ext.to_str()) == Some("json")
    }
}

/// Check a configuration, collecting every problem found
pub fn validate(config: &AppConfig) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();

    if config.cache.capacity == 0 {
        errors.push("Cache capacity must be greater than 0".to_string());
    }

    if !["error", "warn", "info", "debug", "trace"].contains(&config.logging.level.as_str()) {
        errors.push(format!("Invalid logging level: {}", config.logging.level));
    }

    let sim = &config.simulation;
    if sim.producers == 0 {
        errors.push("Simulation needs at least one producer".to_string());
    }

    if sim.workers == 0 {
        errors.push("Simulation needs at least one worker".to_string());
    }

    if sim.push_interval_ms == 0 {
        errors.push("Push interval must be greater than 0".to_string());
    }

    if !(0.0..=1.0).contains(&sim.rescind_ratio) {
        errors.push("Rescind ratio must be between 0.0 and 1.0".to_string());
    }

    if sim.report_interval_secs == 0 {
        errors.push("Report interval must be greater than 0".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conf").join("offercache.yaml");

        let manager = ConfigManager::new(path.clone());
        manager.load().await.unwrap();

        assert!(path.exists());
        assert_eq!(manager.get_config().await, AppConfig::default());
    }

    #[tokio::test]
    async fn test_load_partial_yaml_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("offercache.yaml");
        std::fs::write(&path, "cache:\n  capacity: 5\n").unwrap();

        let manager = ConfigManager::new(path);
        manager.load().await.unwrap();

        let config = manager.get_config().await;
        assert_eq!(config.cache.capacity, 5);
        assert_eq!(config.logging, AppConfig::default().logging);
    }

    #[tokio::test]
    async fn test_json_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("offercache.json");

        let mut config = AppConfig::default();
        config.cache.capacity = 42;
        config.simulation.rescind_ratio = 0.5;

        let writer = ConfigManager::new(path.clone());
        writer.update_config(config.clone()).await.unwrap();
        writer.save().await.unwrap();

        let reader = ConfigManager::new(path);
        reader.load().await.unwrap();
        assert_eq!(reader.get_config().await, config);
    }

    #[tokio::test]
    async fn test_zero_capacity_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("offercache.yaml");
        std::fs::write(&path, "cache:\n  capacity: 0\n").unwrap();

        let manager = ConfigManager::new(path);
        match manager.load().await {
            Err(ConfigError::Invalid(errors)) => {
                assert_eq!(errors, vec!["Cache capacity must be greater than 0".to_string()]);
            }
            other => panic!("expected invalid configuration, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_collects_all_errors() {
        let mut config = AppConfig::default();
        config.logging.level = "loud".to_string();
        config.simulation.workers = 0;
        config.simulation.rescind_ratio = 1.5;

        let errors = validate(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }
}
