//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::Deserialize;
use serde::de::Error;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub worker: WorkerConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Worker process configuration
#[derive(Debug, Deserialize, Clone)]
pub struct WorkerConfig {
    /// Interpreter used to run the worker scripts
    #[serde(default = "default_interpreter")]
    pub interpreter: String,

    /// Directory containing the worker scripts
    #[serde(default = "default_script_dir")]
    pub script_dir: PathBuf,

    /// Wait between detecting a failure and force-killing the worker,
    /// giving it a chance to shut down on its own
    #[serde(default = "default_grace_delay_ms")]
    pub grace_delay_ms: u64,
}

/// Capture storage configuration
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Directory where scan captures are stored
    #[serde(default = "default_capture_dir")]
    pub capture_dir: PathBuf,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Directory for rolling log files
    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    /// Whether to log to files in addition to stderr
    #[serde(default = "default_log_to_file")]
    pub log_to_file: bool,
}

// Default value functions
fn default_interpreter() -> String { "python3".to_string() }
fn default_script_dir() -> PathBuf { PathBuf::from("./scanner") }
fn default_grace_delay_ms() -> u64 { 500 }

fn default_capture_dir() -> PathBuf { PathBuf::from("./captures") }

fn default_log_dir() -> String { "./logs".to_string() }
fn default_log_to_file() -> bool { true }

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            interpreter: default_interpreter(),
            script_dir: default_script_dir(),
            grace_delay_ms: default_grace_delay_ms(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            capture_dir: default_capture_dir(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
            log_to_file: default_log_to_file(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            worker: WorkerConfig::default(),
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if self.worker.interpreter.is_empty() {
            return Err(crate::error::ScanRigError::Config(
                toml::de::Error::custom("worker interpreter cannot be empty")
            ));
        }

        if self.worker.script_dir.as_os_str().is_empty() {
            return Err(crate::error::ScanRigError::Config(
                toml::de::Error::custom("worker script_dir cannot be empty")
            ));
        }

        if self.worker.grace_delay_ms == 0 || self.worker.grace_delay_ms > 60000 {
            return Err(crate::error::ScanRigError::Config(
                toml::de::Error::custom("grace_delay_ms must be between 1 and 60000")
            ));
        }

        if self.storage.capture_dir.as_os_str().is_empty() {
            return Err(crate::error::ScanRigError::Config(
                toml::de::Error::custom("capture_dir cannot be empty")
            ));
        }

        if self.logging.log_to_file && self.logging.log_dir.is_empty() {
            return Err(crate::error::ScanRigError::Config(
                toml::de::Error::custom("log_dir cannot be empty when log_to_file is enabled")
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.worker.interpreter, "python3");
        assert_eq!(config.worker.script_dir, PathBuf::from("./scanner"));
        assert_eq!(config.worker.grace_delay_ms, 500);
        assert_eq!(config.storage.capture_dir, PathBuf::from("./captures"));
        assert_eq!(config.logging.log_dir, "./logs");
        assert!(config.logging.log_to_file);
    }

    #[test]
    fn test_empty_interpreter() {
        let mut config = Config::default();
        config.worker.interpreter = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_script_dir() {
        let mut config = Config::default();
        config.worker.script_dir = PathBuf::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_grace_delay_zero() {
        let mut config = Config::default();
        config.worker.grace_delay_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_grace_delay_too_high() {
        let mut config = Config::default();
        config.worker.grace_delay_ms = 60001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_capture_dir() {
        let mut config = Config::default();
        config.storage.capture_dir = PathBuf::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_log_dir_when_enabled() {
        let mut config = Config::default();
        config.logging.log_to_file = true;
        config.logging.log_dir = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_log_dir_when_disabled() {
        let mut config = Config::default();
        config.logging.log_to_file = false;
        config.logging.log_dir = String::new();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_config_from_file() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let toml_content = r#"
[worker]
interpreter = "python"
grace_delay_ms = 250

[storage]
capture_dir = "/var/lib/scan-rig/captures"

[logging]
log_to_file = false
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config.worker.interpreter, "python");
        assert_eq!(config.worker.grace_delay_ms, 250);
        assert_eq!(
            config.storage.capture_dir,
            PathBuf::from("/var/lib/scan-rig/captures")
        );
        assert!(!config.logging.log_to_file);
        // unspecified fields fall back to defaults
        assert_eq!(config.worker.script_dir, PathBuf::from("./scanner"));
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[worker]\ngrace_delay_ms = 0\n")
            .unwrap();
        temp_file.flush().unwrap();

        assert!(Config::load(temp_file.path()).is_err());
    }
}
