//! Configuration file handling

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::paths::config_path;
use super::Result;

/// Main configuration structure
#[derive(Debug, Deserialize, Serialize, Default, Clone)]
pub struct Config {
    /// Resource manager settings
    #[serde(default)]
    pub azure: AzureConfig,

    /// Build tool settings
    #[serde(default)]
    pub tool: ToolConfig,

    /// Filesystem locations
    #[serde(default)]
    pub paths: PathsConfig,

    /// Timeout settings
    #[serde(default)]
    pub timeouts: Timeouts,

    /// Fixture lifecycle settings
    #[serde(default)]
    pub fixture: FixtureConfig,
}

/// Resource manager configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AzureConfig {
    /// Management endpoint
    #[serde(default = "default_management_endpoint")]
    pub management_endpoint: String,

    /// Subscription that owns the resource group
    #[serde(default)]
    pub subscription_id: Option<String>,

    /// Resource group the sites are deployed into
    #[serde(default)]
    pub resource_group: Option<String>,

    /// Region passed to the deployment template
    #[serde(default = "default_location")]
    pub location: String,

    /// Environment variable holding the bearer token
    #[serde(default = "default_token_env")]
    pub token_env: String,

    /// api-version for deployment requests
    #[serde(default = "default_deployments_api_version")]
    pub deployments_api_version: String,

    /// api-version for Microsoft.Web requests
    #[serde(default = "default_web_api_version")]
    pub web_api_version: String,
}

impl Default for AzureConfig {
    fn default() -> Self {
        Self {
            management_endpoint: default_management_endpoint(),
            subscription_id: None,
            resource_group: None,
            location: default_location(),
            token_env: default_token_env(),
            deployments_api_version: default_deployments_api_version(),
            web_api_version: default_web_api_version(),
        }
    }
}

fn default_management_endpoint() -> String {
    "https://management.azure.com".to_string()
}
fn default_location() -> String {
    "westus2".to_string()
}
fn default_token_env() -> String {
    "AZURE_ACCESS_TOKEN".to_string()
}
fn default_deployments_api_version() -> String {
    "2021-04-01".to_string()
}
fn default_web_api_version() -> String {
    "2022-03-01".to_string()
}

/// Build tool configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ToolConfig {
    /// Program used for `new` and `publish`
    #[serde(default = "default_program")]
    pub program: String,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
        }
    }
}

fn default_program() -> String {
    "dotnet".to_string()
}

/// Filesystem locations
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PathsConfig {
    /// Directory under which per-test working directories are created
    #[serde(default = "default_work_root")]
    pub work_root: PathBuf,

    /// Directory for per-test log files; platform data dir when unset
    #[serde(default)]
    pub log_root: Option<PathBuf>,

    /// Declarative template used to provision each site
    #[serde(default = "default_deployment_template")]
    pub deployment_template: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            work_root: default_work_root(),
            log_root: None,
            deployment_template: default_deployment_template(),
        }
    }
}

fn default_work_root() -> PathBuf {
    PathBuf::from(".")
}
fn default_deployment_template() -> PathBuf {
    Path::new("templates").join("BasicAppServices.json")
}

/// Timeout settings in seconds
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Timeouts {
    /// Upper bound for a deployment to reach a terminal state
    #[serde(default = "default_deployment")]
    pub deployment_secs: u64,

    /// Delay between deployment status polls
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Timeout for a single HTTP request against the deployed site
    #[serde(default = "default_http_request")]
    pub http_request_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            deployment_secs: default_deployment(),
            poll_interval_secs: default_poll_interval(),
            http_request_secs: default_http_request(),
        }
    }
}

fn default_deployment() -> u64 {
    900
}
fn default_poll_interval() -> u64 {
    5
}
fn default_http_request() -> u64 {
    120
}

/// Fixture lifecycle configuration
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct FixtureConfig {
    /// Leave provisioned sites in place after the run
    #[serde(default)]
    pub keep_resources: bool,
}

impl Config {
    /// Load configuration from the default config file
    ///
    /// Returns default configuration if file doesn't exist
    pub fn load() -> Result<Self> {
        match config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load configuration from an explicit path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| super::Error::file_read(path, e))?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| super::Error::ConfigParse(e.to_string()))
    }

    /// Read the bearer token from the configured environment variable
    pub fn token(&self) -> Option<String> {
        std::env::var(&self.azure.token_env)
            .ok()
            .filter(|t| !t.trim().is_empty())
    }

    /// Resolve the log root, falling back to the platform data directory
    pub fn log_root(&self) -> Option<PathBuf> {
        self.paths
            .log_root
            .clone()
            .or_else(super::paths::log_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.tool.program, "dotnet");
        assert_eq!(config.azure.location, "westus2");
        assert_eq!(config.timeouts.poll_interval_secs, 5);
        assert!(!config.fixture.keep_resources);
        assert_eq!(
            config.paths.deployment_template,
            Path::new("templates").join("BasicAppServices.json")
        );
    }

    #[test]
    fn test_partial_sections() {
        let config = Config::parse(
            r#"
[azure]
subscription_id = "0000-1111"
resource_group = "smoke-tests"

[tool]
program = "/usr/share/dotnet/dotnet"

[timeouts]
http_request_secs = 30

[fixture]
keep_resources = true
"#,
        )
        .unwrap();
        assert_eq!(config.azure.subscription_id.as_deref(), Some("0000-1111"));
        assert_eq!(config.azure.resource_group.as_deref(), Some("smoke-tests"));
        assert_eq!(config.azure.token_env, "AZURE_ACCESS_TOKEN");
        assert_eq!(config.tool.program, "/usr/share/dotnet/dotnet");
        assert_eq!(config.timeouts.http_request_secs, 30);
        assert_eq!(config.timeouts.deployment_secs, 900);
        assert!(config.fixture.keep_resources);
    }

    #[test]
    fn test_invalid_toml_is_parse_error() {
        let err = Config::parse("[azure\nlocation = 1").unwrap_err();
        assert!(matches!(err, super::super::Error::ConfigParse(_)));
    }
}
