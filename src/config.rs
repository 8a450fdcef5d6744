use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_BIND: &str = "127.0.0.1:8080";
pub const DEFAULT_PROVIDER: &str = "openrouter";

/// Client-side streaming deadline; a stalled request is aborted after this.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Gateway settings loaded from `config.toml`.
///
/// Every field is optional in the file; accessors apply defaults and the
/// `DRAMATIS_DATA_DIR` environment override so callers never see a partial
/// configuration.
#[derive(Debug, Serialize, Deserialize, Default, Clone)]
pub struct GatewayConfig {
    /// Socket address the HTTP server binds to (e.g. "127.0.0.1:8080")
    pub bind: Option<String>,
    /// Directory holding the JSON catalog files
    pub data_dir: Option<PathBuf>,
    /// Upstream provider id: "openrouter" or "vertex"
    pub provider: Option<String>,
    /// Streaming request deadline in seconds
    pub request_timeout_secs: Option<u64>,
}

impl GatewayConfig {
    pub fn load() -> Result<GatewayConfig, Box<dyn std::error::Error>> {
        Self::load_from_path(&Self::config_path())
    }

    pub fn load_from_path(path: &Path) -> Result<GatewayConfig, Box<dyn std::error::Error>> {
        if path.exists() {
            let contents = fs::read_to_string(path)?;
            let config: GatewayConfig = toml::from_str(&contents)?;
            Ok(config)
        } else {
            Ok(GatewayConfig::default())
        }
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> PathBuf {
        Self::project_dirs().config_dir().join("config.toml")
    }

    fn project_dirs() -> ProjectDirs {
        ProjectDirs::from("dev", "dramatis", "dramatis")
            .expect("Failed to determine config directory")
    }

    pub fn bind(&self) -> String {
        self.bind.clone().unwrap_or_else(|| DEFAULT_BIND.to_string())
    }

    /// Catalog directory, with `DRAMATIS_DATA_DIR` taking precedence over the
    /// config file and the platform data directory as the last resort.
    pub fn data_dir(&self) -> PathBuf {
        if let Ok(dir) = env::var("DRAMATIS_DATA_DIR") {
            return PathBuf::from(dir);
        }
        self.data_dir
            .clone()
            .unwrap_or_else(|| Self::project_dirs().data_dir().to_path_buf())
    }

    pub fn provider(&self) -> String {
        self.provider
            .clone()
            .unwrap_or_else(|| DEFAULT_PROVIDER.to_string())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(
            self.request_timeout_secs
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn load_nonexistent_config_returns_defaults() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("missing.toml");

        let config = GatewayConfig::load_from_path(&path).expect("Failed to load config");

        assert_eq!(config.bind(), DEFAULT_BIND);
        assert_eq!(config.provider(), DEFAULT_PROVIDER);
        assert_eq!(
            config.request_timeout(),
            Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)
        );
    }

    #[test]
    fn save_and_load_round_trip() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("config.toml");

        let config = GatewayConfig {
            bind: Some("0.0.0.0:9000".to_string()),
            data_dir: Some(temp_dir.path().join("data")),
            provider: Some("vertex".to_string()),
            request_timeout_secs: Some(10),
        };
        config.save_to_path(&path).expect("Failed to save config");

        let loaded = GatewayConfig::load_from_path(&path).expect("Failed to load config");
        assert_eq!(loaded.bind(), "0.0.0.0:9000");
        assert_eq!(loaded.provider(), "vertex");
        assert_eq!(loaded.request_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn malformed_config_is_an_error() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "bind = [not toml").unwrap();

        assert!(GatewayConfig::load_from_path(&path).is_err());
    }
}
