//! TripPlanner configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Main TripPlanner configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Planning service endpoint
    pub service: ServiceConfig,

    /// Where results are written
    pub output: OutputConfig,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR); the CLI flag takes priority
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,
}

impl Config {
    /// Validate configuration before use
    pub fn validate(&self) -> Result<()> {
        let base = self.service.base_url.trim();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(eyre::eyre!(
                "service.base-url must start with http:// or https:// (got '{}')",
                self.service.base_url
            ));
        }
        if !self.service.plan_path.starts_with('/') {
            return Err(eyre::eyre!(
                "service.plan-path must start with '/' (got '{}')",
                self.service.plan_path
            ));
        }
        Ok(())
    }

    /// Load and validate configuration
    ///
    /// An explicit path must load. Without one, the first candidate from
    /// [`Config::search_paths`] that parses wins; unreadable candidates are
    /// logged and skipped, and defaults apply when none is left.
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        let config = match config_path {
            Some(path) => {
                Self::load_from_file(path).wrap_err_with(|| format!("Failed to load config from {}", path.display()))?
            }
            None => Self::search_paths()
                .into_iter()
                .filter(|candidate| candidate.exists())
                .find_map(|candidate| match Self::load_from_file(&candidate) {
                    Ok(config) => Some(config),
                    Err(e) => {
                        warn!("Skipping config {}: {:#}", candidate.display(), e);
                        None
                    }
                })
                .unwrap_or_else(|| {
                    info!("No config file found, using defaults");
                    Self::default()
                }),
        };

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }

    /// Implicit config locations, highest priority first
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(".tripplanner.yml")];
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("tripplanner").join("tripplanner.yml"));
        }
        paths
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).context("Failed to read config file")?;
        let config = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        info!("Loaded config from: {}", path.display());
        Ok(config)
    }
}

/// Planning service endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Service base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Path of the streaming planning endpoint
    #[serde(rename = "plan-path")]
    pub plan_path: String,

    /// Path of the liveness endpoint
    #[serde(rename = "health-path")]
    pub health_path: String,

    /// TCP connect timeout in milliseconds
    #[serde(rename = "connect-timeout-ms")]
    pub connect_timeout_ms: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            plan_path: "/plan-trip".to_string(),
            health_path: "/".to_string(),
            connect_timeout_ms: 10_000,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Write the itinerary map here when the planner returns one
    #[serde(rename = "map-file")]
    pub map_file: Option<PathBuf>,
}

impl OutputConfig {
    /// Map file with `~/` expanded
    pub fn expanded_map_file(&self) -> Option<PathBuf> {
        self.map_file.as_ref().map(|p| match p.strip_prefix("~") {
            Ok(rest) => dirs::home_dir().map(|home| home.join(rest)).unwrap_or_else(|| p.clone()),
            Err(_) => p.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.service.base_url, "http://127.0.0.1:8000");
        assert_eq!(config.service.plan_path, "/plan-trip");
        assert!(config.output.map_file.is_none());
        assert!(config.log_level.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_deserialize_config() {
        let yaml = r#"
log-level: debug

service:
  base-url: https://planner.example.com
  plan-path: /v2/plan
  health-path: /healthz
  connect-timeout-ms: 2500

output:
  map-file: /tmp/trip-map.html
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert_eq!(config.service.base_url, "https://planner.example.com");
        assert_eq!(config.service.plan_path, "/v2/plan");
        assert_eq!(config.service.health_path, "/healthz");
        assert_eq!(config.service.connect_timeout_ms, 2500);
        assert_eq!(config.output.map_file, Some(PathBuf::from("/tmp/trip-map.html")));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let yaml = r#"
service:
  base-url: http://10.0.0.5:8000
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        // Specified value
        assert_eq!(config.service.base_url, "http://10.0.0.5:8000");

        // Defaults for unspecified
        assert_eq!(config.service.plan_path, "/plan-trip");
        assert_eq!(config.service.connect_timeout_ms, 10_000);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.service.base_url = "localhost:8000".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.service.plan_path = "plan-trip".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_explicit_path() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "service:\n  plan-path: /stream").unwrap();

        let config = Config::load(Some(&file.path().to_path_buf())).unwrap();
        assert_eq!(config.service.plan_path, "/stream");
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "service:\n  base-url: ftp://planner.example.com").unwrap();

        let err = Config::load(Some(&file.path().to_path_buf())).unwrap_err();
        assert!(format!("{:#}", err).contains("Invalid configuration"));
    }

    #[test]
    fn test_search_paths_start_with_local_file() {
        let paths = Config::search_paths();
        assert_eq!(paths[0], PathBuf::from(".tripplanner.yml"));
        assert!(paths.iter().skip(1).all(|p| p.ends_with("tripplanner/tripplanner.yml")));
    }

    #[test]
    fn test_load_explicit_path_missing() {
        let path = PathBuf::from("/nonexistent/tripplanner.yml");
        assert!(Config::load(Some(&path)).is_err());
    }

    #[test]
    fn test_expanded_map_file() {
        let output = OutputConfig {
            map_file: Some(PathBuf::from("maps/trip.html")),
        };
        assert_eq!(output.expanded_map_file(), Some(PathBuf::from("maps/trip.html")));
        assert!(OutputConfig::default().expanded_map_file().is_none());
    }
}
