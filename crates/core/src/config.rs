//! Configuration management
//!
//! This module handles loading and saving the s3knife configuration file.
//! The file is TOML, stored at `$S3K_CONFIG_DIR/config.toml` or
//! `~/.config/s3knife/config.toml`.
//!
//! PROTECTED FILE: Changes to schema_version require migration support.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::options::CannedAcl;
use crate::pool::{DEFAULT_QUEUE_CAPACITY, DEFAULT_WORKERS};

/// Current configuration schema version
pub const SCHEMA_VERSION: u32 = 1;

/// Environment variable overriding the configuration directory
pub const CONFIG_DIR_ENV: &str = "S3K_CONFIG_DIR";

/// Region used when nothing else names one
pub const FALLBACK_REGION: &str = "us-east-1";

/// Environment variables consulted for the region, in order
pub const REGION_ENV: [&str; 2] = ["AWS_DEFAULT_REGION", "EC2_REGION"];

const DEFAULT_OUTPUT: &str = "human";
const DEFAULT_COLOR: &str = "auto";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Schema version for migration support
    pub schema_version: u32,

    /// Default settings
    #[serde(default)]
    pub defaults: Defaults,

    /// Object store connection
    #[serde(default)]
    pub s3: S3Settings,
}

/// Default settings for CLI behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Defaults {
    /// Number of concurrent workers
    #[serde(default = "default_parallel")]
    pub parallel: usize,

    /// Queue capacity between producers and workers
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Output format: "human" or "json"
    #[serde(default = "default_output")]
    pub output: String,

    /// Color mode: "auto", "always", or "never"
    #[serde(default = "default_color")]
    pub color: String,

    /// Show progress spinners
    #[serde(default = "default_true")]
    pub progress: bool,

    /// Canned ACL for created objects
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acl: Option<CannedAcl>,
}

fn default_parallel() -> usize {
    DEFAULT_WORKERS
}

fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

fn default_output() -> String {
    DEFAULT_OUTPUT.to_string()
}

fn default_color() -> String {
    DEFAULT_COLOR.to_string()
}

fn default_true() -> bool {
    true
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            parallel: default_parallel(),
            queue_capacity: default_queue_capacity(),
            output: default_output(),
            color: default_color(),
            progress: true,
            acl: None,
        }
    }
}

/// Connection settings for the object store
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct S3Settings {
    /// Region name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    /// Custom endpoint for S3-compatible servers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Use path-style addressing
    #[serde(default)]
    pub path_style: bool,

    /// Static access key; the default credential chain is used when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_key: Option<String>,
}

impl S3Settings {
    /// Check the endpoint URL and that static credentials come in pairs
    pub fn validate(&self) -> Result<()> {
        if let Some(endpoint) = &self.endpoint {
            let url = url::Url::parse(endpoint)?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(Error::Config(format!(
                    "endpoint must be http or https, got '{endpoint}'"
                )));
            }
        }
        if self.access_key.is_some() != self.secret_key.is_some() {
            return Err(Error::Config(
                "access_key and secret_key must be set together".into(),
            ));
        }
        Ok(())
    }

    /// Resolve the region: explicit value, configuration, environment, fallback
    pub fn resolve_region(&self, flag: Option<&str>) -> String {
        let env = REGION_ENV
            .iter()
            .find_map(|name| std::env::var(name).ok().filter(|v| !v.is_empty()));
        pick_region(flag, self.region.as_deref(), env)
    }
}

fn pick_region(flag: Option<&str>, configured: Option<&str>, env: Option<String>) -> String {
    flag.or(configured)
        .map(str::to_string)
        .or(env)
        .unwrap_or_else(|| FALLBACK_REGION.to_string())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            defaults: Defaults::default(),
            s3: S3Settings::default(),
        }
    }
}

/// Configuration manager handles loading and saving config
#[derive(Debug)]
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new ConfigManager with the default config path
    pub fn new() -> Result<Self> {
        if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV).filter(|d| !d.is_empty()) {
            return Ok(Self {
                config_path: PathBuf::from(dir).join("config.toml"),
            });
        }

        let config_dir = dirs::config_dir()
            .ok_or_else(|| Error::Config("Could not determine config directory".into()))?;
        let config_path = config_dir.join("s3knife").join("config.toml");
        Ok(Self { config_path })
    }

    /// Create a ConfigManager with a custom path (useful for testing)
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the configuration file path
    pub fn config_path(&self) -> &PathBuf {
        &self.config_path
    }

    /// Load configuration from disk
    ///
    /// If the configuration file doesn't exist, returns a default configuration.
    pub fn load(&self) -> Result<Config> {
        if !self.config_path.exists() {
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(&self.config_path)?;
        let mut config: Config = toml::from_str(&content)?;

        if config.schema_version < SCHEMA_VERSION {
            config.schema_version = SCHEMA_VERSION;
        } else if config.schema_version > SCHEMA_VERSION {
            return Err(Error::Config(format!(
                "Configuration file version {} is newer than supported version {}. Please upgrade s3k.",
                config.schema_version, SCHEMA_VERSION
            )));
        }

        config.s3.validate()?;
        if config.defaults.parallel == 0 || config.defaults.queue_capacity == 0 {
            return Err(Error::Config(
                "parallel and queue_capacity must be at least 1".into(),
            ));
        }

        Ok(config)
    }

    /// Save configuration to disk
    ///
    /// Creates parent directories if they don't exist.
    /// Sets file permissions to 600 (owner read/write only).
    pub fn save(&self, config: &Config) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(config)?;
        std::fs::write(&self.config_path, content)?;

        // Owner read/write only
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let permissions = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&self.config_path, permissions)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_config_manager() -> (ConfigManager, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        let manager = ConfigManager::with_path(config_path);
        (manager, temp_dir)
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.schema_version, SCHEMA_VERSION);
        assert_eq!(config.defaults.output, "human");
        assert_eq!(config.defaults.color, "auto");
        assert_eq!(config.defaults.parallel, 32);
        assert_eq!(config.defaults.queue_capacity, 1000);
        assert!(config.defaults.progress);
        assert!(config.s3.endpoint.is_none());
    }

    #[test]
    fn test_load_nonexistent_returns_default() {
        let (manager, _temp_dir) = temp_config_manager();
        let config = manager.load().unwrap();
        assert_eq!(config.schema_version, SCHEMA_VERSION);
    }

    #[test]
    fn test_save_and_load() {
        let (manager, _temp_dir) = temp_config_manager();

        let mut config = Config::default();
        config.defaults.parallel = 8;
        config.defaults.acl = Some(CannedAcl::PublicRead);
        config.s3 = S3Settings {
            region: Some("eu-west-1".into()),
            endpoint: Some("http://localhost:9000".into()),
            path_style: true,
            access_key: Some("minioadmin".into()),
            secret_key: Some("minioadmin".into()),
        };

        manager.save(&config).unwrap();
        let loaded = manager.load().unwrap();

        assert_eq!(loaded.defaults.parallel, 8);
        assert_eq!(loaded.defaults.acl, Some(CannedAcl::PublicRead));
        assert_eq!(loaded.s3.region.as_deref(), Some("eu-west-1"));
        assert!(loaded.s3.path_style);
    }

    #[cfg(unix)]
    #[test]
    fn test_save_restricts_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let (manager, _temp_dir) = temp_config_manager();
        manager.save(&Config::default()).unwrap();
        let mode = std::fs::metadata(manager.config_path())
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let (manager, _temp_dir) = temp_config_manager();
        std::fs::write(
            manager.config_path(),
            "schema_version = 1\n[defaults]\nparallel = 4\n",
        )
        .unwrap();

        let config = manager.load().unwrap();
        assert_eq!(config.defaults.parallel, 4);
        assert_eq!(config.defaults.queue_capacity, 1000);
        assert_eq!(config.defaults.output, "human");
    }

    #[test]
    fn test_schema_version_too_new() {
        let (manager, _temp_dir) = temp_config_manager();

        let content = format!(
            r#"
            schema_version = {}
            "#,
            SCHEMA_VERSION + 1
        );
        std::fs::write(manager.config_path(), content).unwrap();

        let result = manager.load();
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("newer than supported"));
    }

    #[test]
    fn test_invalid_endpoint_rejected() {
        let settings = S3Settings {
            endpoint: Some("not a url".into()),
            ..Default::default()
        };
        assert!(settings.validate().is_err());

        let settings = S3Settings {
            endpoint: Some("ftp://files.example.com".into()),
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_credentials_come_in_pairs() {
        let settings = S3Settings {
            access_key: Some("key".into()),
            ..Default::default()
        };
        assert_eq!(settings.validate().unwrap_err().exit_code(), 2);
    }

    #[test]
    fn test_unknown_acl_in_file_fails_to_parse() {
        let (manager, _temp_dir) = temp_config_manager();
        std::fs::write(
            manager.config_path(),
            "schema_version = 1\n[defaults]\nacl = \"world\"\n",
        )
        .unwrap();
        assert!(matches!(manager.load(), Err(Error::TomlParse(_))));
    }

    #[test]
    fn test_region_precedence() {
        assert_eq!(
            pick_region(Some("flag"), Some("cfg"), Some("env".into())),
            "flag"
        );
        assert_eq!(pick_region(None, Some("cfg"), Some("env".into())), "cfg");
        assert_eq!(pick_region(None, None, Some("env".into())), "env");
        assert_eq!(pick_region(None, None, None), "us-east-1");
    }
}
