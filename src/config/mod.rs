//! Configuration management for Letterbox

use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use crate::error::{Result, LetterboxError};

pub mod naming;
pub use naming::*;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Batch conversion settings
    pub conversion: ConversionConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Batch conversion settings
///
/// Canvas size, background and fit-box are constants in `processing::canvas`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionConfig {
    /// Destination directory (None = `<Pictures>/converted`)
    pub destination: Option<PathBuf>,

    /// Candidate ordering
    pub order: CandidateOrder,

    /// Output name collision policy
    pub collisions: CollisionPolicy,

    /// Maximum input file size to process (in bytes)
    pub max_file_size: u64,

    /// Maximum decoder allocation (in bytes)
    pub max_decode_bytes: u64,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            destination: None,
            order: CandidateOrder::Listing,
            collisions: CollisionPolicy::LastWins,
            max_file_size: 100 * 1024 * 1024, // 100MB
            max_decode_bytes: 512 * 1024 * 1024, // 512MB
        }
    }
}

impl ConversionConfig {
    /// Destination to use when the caller supplies none
    pub fn destination_or_default(&self) -> PathBuf {
        self.destination.clone().unwrap_or_else(default_destination)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Enable JSON logging
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

/// `<Pictures>/converted`, falling back to `~/Pictures` and then the working directory
pub fn default_destination() -> PathBuf {
    dirs::picture_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join("Pictures")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("converted")
}

impl Config {
    /// Load configuration from file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .map_err(|e| LetterboxError::config(
                format!("Failed to read config file {:?}: {}", path.as_ref(), e)
            ))?;

        let extension = path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("");

        match extension.to_lowercase().as_str() {
            "toml" => toml::from_str(&content).map_err(Into::into),
            "yaml" | "yml" => serde_yaml::from_str(&content).map_err(Into::into),
            _ => Err(LetterboxError::config(
                "Unsupported config file format. Use .toml or .yaml"
            )),
        }
    }

    /// Save configuration to file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let extension = path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("");

        let content = match extension.to_lowercase().as_str() {
            "toml" => toml::to_string_pretty(self)
                .map_err(|e| LetterboxError::config(format!("TOML serialization failed: {}", e)))?,
            "yaml" | "yml" => serde_yaml::to_string(self)
                .map_err(|e| LetterboxError::config(format!("YAML serialization failed: {}", e)))?,
            _ => return Err(LetterboxError::config(
                "Unsupported config file format. Use .toml or .yaml"
            )),
        };

        std::fs::write(&path, content)
            .map_err(|e| LetterboxError::config(
                format!("Failed to write config file {:?}: {}", path.as_ref(), e)
            ))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.conversion.max_file_size == 0 {
            return Err(LetterboxError::config(
                "max_file_size must be greater than 0"
            ));
        }

        if self.conversion.max_decode_bytes == 0 {
            return Err(LetterboxError::config(
                "max_decode_bytes must be greater than 0"
            ));
        }

        if let Some(destination) = &self.conversion.destination {
            if destination.as_os_str().is_empty() {
                return Err(LetterboxError::config("destination must not be empty"));
            }
        }

        tracing_subscriber::EnvFilter::try_new(&self.logging.level)
            .map_err(|e| LetterboxError::config(
                format!("Invalid log level '{}': {}", self.logging.level, e)
            ))?;

        Ok(())
    }

    /// Merge with another configuration (other takes precedence)
    pub fn merge(mut self, other: Config) -> Self {
        if other.conversion.destination.is_some() {
            self.conversion.destination = other.conversion.destination;
        }
        self.conversion.order = other.conversion.order;
        self.conversion.collisions = other.conversion.collisions;
        self.conversion.max_file_size = other.conversion.max_file_size;
        self.conversion.max_decode_bytes = other.conversion.max_decode_bytes;
        self.logging = other.logging;

        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.conversion.order, CandidateOrder::Listing);
        assert_eq!(config.conversion.collisions, CollisionPolicy::LastWins);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_destination_ends_in_converted() {
        let destination = default_destination();
        assert_eq!(destination.file_name().unwrap(), "converted");
        assert_eq!(Config::default().conversion.destination_or_default(), destination);
    }

    #[test]
    fn test_config_serialization() {
        let mut config = Config::default();
        config.conversion.order = CandidateOrder::Lexicographic;
        config.conversion.collisions = CollisionPolicy::Rename;

        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.conversion.order, CandidateOrder::Lexicographic);
        assert_eq!(parsed.conversion.collisions, CollisionPolicy::Rename);

        let yaml_str = serde_yaml::to_string(&config).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml_str).unwrap();
        assert_eq!(parsed.conversion.collisions, CollisionPolicy::Rename);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let parsed: Config = toml::from_str("[conversion]\ncollisions = \"error\"\n").unwrap();
        assert_eq!(parsed.conversion.collisions, CollisionPolicy::Error);
        assert_eq!(parsed.conversion.order, CandidateOrder::Listing);
        assert_eq!(parsed.logging.level, "info");
    }

    #[test]
    fn test_config_file_io() {
        let dir = TempDir::new().unwrap();
        let config = Config::default();

        let toml_path = dir.path().join("letterbox.toml");
        config.to_file(&toml_path).unwrap();
        assert!(Config::from_file(&toml_path).unwrap().validate().is_ok());

        let yaml_path = dir.path().join("letterbox.yaml");
        config.to_file(&yaml_path).unwrap();
        assert!(Config::from_file(&yaml_path).unwrap().validate().is_ok());

        let json_path = dir.path().join("letterbox.json");
        assert!(config.to_file(&json_path).is_err());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = Config::default();
        config.conversion.max_file_size = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.logging.level = "letterbox=loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_merge_prefers_other() {
        let base = Config::default();
        let mut other = Config::default();
        other.conversion.destination = Some(PathBuf::from("/tmp/out"));
        other.conversion.order = CandidateOrder::Lexicographic;

        let merged = base.merge(other);
        assert_eq!(merged.conversion.destination, Some(PathBuf::from("/tmp/out")));
        assert_eq!(merged.conversion.order, CandidateOrder::Lexicographic);
    }
}
