use anyhow::{anyhow, Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::git::CloneMethod;
use crate::report::ReportFieldSelection;

/// Main configuration structure for orgsync
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    /// Organization whose repositories are mirrored
    #[serde(default)]
    pub organization: Option<String>,

    /// Directory holding one checkout per repository
    #[serde(default = "default_root_path")]
    pub root_path: String,

    /// GitHub listing and cloning settings
    #[serde(default)]
    pub github: GitHubConfig,

    /// Synchronization behavior settings
    #[serde(default)]
    pub sync: SyncConfig,

    /// Final report settings
    #[serde(default)]
    pub report: ReportConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where the organization's repository list comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ListingSource {
    /// GitHub REST API through octocrab
    #[default]
    Api,
    /// `gh repo list`
    GhCli,
}

/// GitHub configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GitHubConfig {
    #[serde(default)]
    pub source: ListingSource,

    /// Authentication method for API listing
    #[serde(default = "default_auth_method")]
    pub auth_method: String, // "auto", "gh_cli", "token", "none"

    /// Maximum number of organization repositories to list
    #[serde(default = "default_repo_list_limit")]
    pub repo_list_limit: usize,

    #[serde(default)]
    pub clone_method: CloneMethod,

    /// Host used to build clone URLs
    #[serde(default = "default_host")]
    pub host: String,
}

/// Synchronization configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SyncConfig {
    /// Number of concurrent workers
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,

    /// Prune deleted remote branches on fetch
    #[serde(default = "default_true")]
    pub prune: bool,

    /// Fast-forward only pulls
    #[serde(default)]
    pub fast_forward_only: bool,
}

/// Report configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ReportConfig {
    /// Comma separated sections: error, cloned, synced, other, all
    #[serde(default = "default_report_fields")]
    pub fields: String,
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Enable colored output
    #[serde(default = "default_true")]
    pub color: bool,
}

// Default value functions
fn default_root_path() -> String {
    ".".to_string()
}
fn default_auth_method() -> String {
    "auto".to_string()
}
fn default_repo_list_limit() -> usize {
    5000
}
fn default_host() -> String {
    "github.com".to_string()
}
fn default_parallelism() -> usize {
    10
}
fn default_true() -> bool {
    true
}
fn default_report_fields() -> String {
    "error".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            source: ListingSource::default(),
            auth_method: default_auth_method(),
            repo_list_limit: default_repo_list_limit(),
            clone_method: CloneMethod::default(),
            host: default_host(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            parallelism: default_parallelism(),
            prune: default_true(),
            fast_forward_only: false,
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            fields: default_report_fields(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            color: default_true(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            organization: None,
            root_path: default_root_path(),
            github: GitHubConfig::default(),
            sync: SyncConfig::default(),
            report: ReportConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location, falling back to defaults
    pub fn load_or_default() -> Result<Self> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let mut config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        // Expand environment variables in paths
        config.expand_paths()?;

        Ok(config)
    }

    /// Get the default configuration file path (XDG compliant)
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = config_dir().context("Failed to get user config directory")?;

        Ok(config_dir.join("orgsync").join("config.yml"))
    }

    /// Expand `~` and environment variables in the root path
    pub fn expand_paths(&mut self) -> Result<()> {
        self.root_path = shellexpand::full(&self.root_path)
            .context("Failed to expand root_path")?
            .into_owned();

        Ok(())
    }

    /// The configured organization, if non-empty
    pub fn organization(&self) -> Result<&str> {
        match self.organization.as_deref().map(str::trim) {
            Some(org) if !org.is_empty() => Ok(org),
            _ => Err(anyhow!("org was not provided (use --org or set `organization` in the config file)")),
        }
    }

    /// Parsed report field selection
    pub fn report_fields(&self) -> Result<ReportFieldSelection> {
        self.report
            .fields
            .parse::<ReportFieldSelection>()
            .with_context(|| format!("Invalid report fields: {:?}", self.report.fields))
    }

    /// Reject configurations that cannot start a run
    pub fn validate(&self) -> Result<()> {
        self.organization()?;

        if self.sync.parallelism == 0 {
            return Err(anyhow!("parallelism must be at least 1"));
        }

        if self.github.repo_list_limit == 0 {
            return Err(anyhow!("repo list limit must be at least 1"));
        }

        self.report_fields()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use tempfile::TempDir;

    fn valid_config() -> Config {
        Config {
            organization: Some("acme".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_config_default_values() {
        let config = Config::default();

        assert!(config.organization.is_none());
        assert_eq!(config.root_path, ".");
        assert_eq!(config.github.source, ListingSource::Api);
        assert_eq!(config.github.repo_list_limit, 5000);
        assert_eq!(config.github.clone_method, CloneMethod::GhCli);
        assert_eq!(config.sync.parallelism, 10);
        assert!(config.sync.prune);
        assert!(!config.sync.fast_forward_only);
        assert_eq!(config.report.fields, "error");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_validate_requires_organization() {
        let mut config = Config::default();
        assert!(config.validate().is_err());

        config.organization = Some("   ".to_string());
        assert!(config.validate().is_err());

        config.organization = Some("acme".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_parallelism() {
        let mut config = valid_config();
        config.sync.parallelism = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("parallelism"));
    }

    #[test]
    fn test_validate_rejects_duplicate_report_field() {
        let mut config = valid_config();
        config.report.fields = "error,error".to_string();
        let err = config.validate().unwrap_err();
        assert!(format!("{:#}", err).contains("duplicate"));
    }

    #[test]
    fn test_validate_rejects_unknown_report_field() {
        let mut config = valid_config();
        config.report.fields = "error,warnings".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_expand_paths() {
        env::set_var("TEST_ORGSYNC_HOME", "/test/home");

        let mut config = Config::default();
        config.root_path = "${TEST_ORGSYNC_HOME}/src".to_string();

        config.expand_paths().expect("Failed to expand paths");

        assert_eq!(config.root_path, "/test/home/src");

        env::remove_var("TEST_ORGSYNC_HOME");
    }

    #[test]
    fn test_config_load_nonexistent_file() {
        let nonexistent_path = Path::new("/nonexistent/path/config.yml");
        let result = Config::load(nonexistent_path);
        assert!(result.is_err());
    }

    #[test]
    fn test_config_load_from_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("config.yml");
        std::fs::write(
            &config_path,
            "organization: acme\nroot_path: /srv/acme\nsync:\n  parallelism: 3\n",
        )
        .expect("Failed to write config");

        let config = Config::load(&config_path).expect("Failed to load config");

        assert_eq!(config.organization.as_deref(), Some("acme"));
        assert_eq!(config.root_path, "/srv/acme");
        assert_eq!(config.sync.parallelism, 3);
        assert!(config.sync.prune);
    }

    #[test]
    fn test_config_default_path_xdg() {
        let default_path = Config::default_config_path().expect("Failed to get default path");
        assert!(default_path.to_string_lossy().contains("orgsync"));
        assert!(default_path.to_string_lossy().ends_with("config.yml"));
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml_content = r#"
organization: "acme"
root_path: "~/src/acme"
github:
  source: gh-cli
  auth_method: "token"
  repo_list_limit: 200
  clone_method: ssh
  host: "github.example.com"
sync:
  parallelism: 32
  prune: false
  fast_forward_only: true
report:
  fields: "error,cloned"
logging:
  level: "debug"
  color: false
"#;

        let config: Config = serde_yaml::from_str(yaml_content).expect("Failed to parse YAML");

        assert_eq!(config.organization.as_deref(), Some("acme"));
        assert_eq!(config.root_path, "~/src/acme");
        assert_eq!(config.github.source, ListingSource::GhCli);
        assert_eq!(config.github.auth_method, "token");
        assert_eq!(config.github.repo_list_limit, 200);
        assert_eq!(config.github.clone_method, CloneMethod::Ssh);
        assert_eq!(config.github.host, "github.example.com");
        assert_eq!(config.sync.parallelism, 32);
        assert!(!config.sync.prune);
        assert!(config.sync.fast_forward_only);
        assert_eq!(config.report.fields, "error,cloned");
        assert_eq!(config.logging.level, "debug");
        assert!(!config.logging.color);
    }

    #[test]
    fn test_invalid_clone_method_fails_to_parse() {
        let result: std::result::Result<Config, _> =
            serde_yaml::from_str("github:\n  clone_method: ftp\n");
        assert!(result.is_err());
    }
}
