//! Configuration management using Figment
//!
//! Configuration is loaded from multiple sources with the following precedence (highest to lowest):
//! 1. Environment variables (prefix: REPO_REST_)
//! 2. Current working directory: ./config.toml
//! 3. XDG config directory: ~/.config/repo-rest/{service_name}/config.toml
//! 4. System directory: /etc/repo-rest/{service_name}/config.toml
//! 5. Default values

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

const ENV_PREFIX: &str = "REPO_REST_";
const XDG_PREFIX: &str = "repo-rest";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Service configuration
    pub service: ServiceConfig,

    /// REST surface configuration
    #[serde(default)]
    pub rest: RestConfig,

    /// Middleware configuration
    #[serde(default)]
    pub middleware: MiddlewareConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Service name
    pub name: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Environment (dev, staging, production)
    #[serde(default = "default_environment")]
    pub environment: String,
}

impl ServiceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// What `PUT` does when the addressed item does not exist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UpsertPolicy {
    /// Missing items follow the `errorIfMissing` policy
    Never,
    /// Create the item when the request sets `createIfMissing=true`
    #[default]
    OnRequest,
    /// Always create missing items
    Always,
}

/// How delete and find-and-delete report their result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeletionReport {
    /// 204 with no body
    #[default]
    NoContent,
    /// 200 with the outcome: a boolean for one item, a count for many
    Outcome,
}

/// What happens to a request that names a collection but matches no route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnmatchedPolicy {
    /// Hand the request to the next handler
    #[default]
    PassThrough,
    /// Answer 400 for a missing id, 405 otherwise
    Strict,
}

/// REST surface configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestConfig {
    /// Path prefix the surface is mounted under
    #[serde(default = "default_mount_path")]
    pub mount_path: String,

    /// Value reported by `GET /`
    #[serde(default = "default_repository_id")]
    pub repository_id: String,

    #[serde(default)]
    pub upsert: UpsertPolicy,

    #[serde(default)]
    pub deletion_report: DeletionReport,

    #[serde(default)]
    pub unmatched: UnmatchedPolicy,

    /// Maximum JSON body read by the dispatcher, in KB
    #[serde(default = "default_body_limit_kb")]
    pub body_limit_kb: usize,

    /// Query parameter carrying the authorization token
    #[serde(default = "default_authorization_param")]
    pub authorization_param: String,

    /// Expose the `/authorizations` routes (requires a credential handler)
    #[serde(default = "default_false")]
    pub sign_in: bool,
}

impl RestConfig {
    pub fn body_limit_bytes(&self) -> usize {
        self.body_limit_kb.saturating_mul(1024)
    }
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            mount_path: default_mount_path(),
            repository_id: default_repository_id(),
            upsert: UpsertPolicy::default(),
            deletion_report: DeletionReport::default(),
            unmatched: UnmatchedPolicy::default(),
            body_limit_kb: default_body_limit_kb(),
            authorization_param: default_authorization_param(),
            sign_in: false,
        }
    }
}

/// Middleware configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MiddlewareConfig {
    /// Request body size limit in MB
    #[serde(default = "default_body_limit_mb")]
    pub body_limit_mb: usize,

    /// Enable panic recovery middleware
    #[serde(default = "default_true")]
    pub catch_panic: bool,

    /// Enable compression
    #[serde(default = "default_true")]
    pub compression: bool,

    /// CORS mode: permissive, restrictive or disabled
    #[serde(default = "default_cors_mode")]
    pub cors_mode: String,
}

impl Default for MiddlewareConfig {
    fn default() -> Self {
        Self {
            body_limit_mb: default_body_limit_mb(),
            catch_panic: true,
            compression: true,
            cors_mode: default_cors_mode(),
        }
    }
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_environment() -> String {
    "dev".to_string()
}

fn default_mount_path() -> String {
    "/".to_string()
}

fn default_repository_id() -> String {
    "repo-rest".to_string()
}

fn default_body_limit_kb() -> usize {
    1024
}

fn default_authorization_param() -> String {
    "authorization".to_string()
}

fn default_true() -> bool {
    true
}

fn default_false() -> bool {
    false
}

fn default_body_limit_mb() -> usize {
    10
}

fn default_cors_mode() -> String {
    "permissive".to_string()
}

impl Config {
    /// Load configuration from all sources
    ///
    /// The service name is taken from the binary name.
    pub fn load() -> Result<Self> {
        let service_name = std::env::current_exe()
            .ok()
            .and_then(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .unwrap_or_else(|| XDG_PREFIX.to_string());

        Self::load_for_service(&service_name)
    }

    /// Load configuration for a specific service name
    pub fn load_for_service(service_name: &str) -> Result<Self> {
        let config_paths = Self::find_config_paths(service_name);

        tracing::debug!("Searching for config files in order:");
        for path in &config_paths {
            tracing::debug!("  - {}", path.display());
        }

        let mut defaults = Config::default();
        defaults.service.name = service_name.to_string();
        let mut figment = Figment::new().merge(Serialized::defaults(defaults));

        // lowest priority first
        for path in config_paths.iter().rev() {
            if path.exists() {
                tracing::info!("Loading configuration from: {}", path.display());
                figment = figment.merge(Toml::file(path));
            }
        }

        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("_"));

        Ok(figment.extract()?)
    }

    /// Load configuration from a specific file, bypassing the search path
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("_"))
            .extract()?;

        Ok(config)
    }

    /// Config file paths in priority order (highest first)
    fn find_config_paths(service_name: &str) -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("config.toml")];

        let xdg_dirs = xdg::BaseDirectories::with_prefix(XDG_PREFIX);
        let config_file_path = Path::new(service_name).join("config.toml");
        if let Some(path) = xdg_dirs.find_config_file(&config_file_path) {
            paths.push(path);
        }

        paths.push(
            PathBuf::from("/etc")
                .join(XDG_PREFIX)
                .join(service_name)
                .join("config.toml"),
        );

        paths
    }

    /// Create ~/.config/repo-rest/{service_name}/ and return it
    pub fn create_config_dir(service_name: &str) -> Result<PathBuf> {
        let xdg_dirs = xdg::BaseDirectories::with_prefix(XDG_PREFIX);
        let config_file_path = Path::new(service_name).join("config.toml");

        let config_path = xdg_dirs.place_config_file(&config_file_path)?;

        config_path
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| Error::Internal("Invalid config path".to_string()))
    }

    /// Validate combinations the individual fields cannot express
    pub fn validate(&self) -> Result<()> {
        if !self.rest.mount_path.starts_with('/') {
            return Err(Error::Misconfigured(format!(
                "rest.mount_path must start with '/', got '{}'",
                self.rest.mount_path
            )));
        }
        if self.rest.authorization_param.is_empty() {
            return Err(Error::Misconfigured(
                "rest.authorization_param must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service: ServiceConfig {
                name: XDG_PREFIX.to_string(),
                port: default_port(),
                log_level: default_log_level(),
                timeout_secs: default_timeout(),
                environment: default_environment(),
            },
            rest: RestConfig::default(),
            middleware: MiddlewareConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.service.port, 8080);
        assert_eq!(config.service.log_level, "info");
        assert_eq!(config.rest.mount_path, "/");
        assert_eq!(config.rest.upsert, UpsertPolicy::OnRequest);
        assert_eq!(config.rest.deletion_report, DeletionReport::NoContent);
        assert_eq!(config.rest.unmatched, UnmatchedPolicy::PassThrough);
        assert_eq!(config.rest.body_limit_bytes(), 1024 * 1024);
        assert!(!config.rest.sign_in);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[service]
name = "people-api"
port = 9000

[rest]
mount_path = "/api"
upsert = "always"
deletion_report = "outcome"
unmatched = "strict"
"#
        )
        .unwrap();

        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.service.name, "people-api");
        assert_eq!(config.service.port, 9000);
        assert_eq!(config.service.log_level, "info");
        assert_eq!(config.rest.mount_path, "/api");
        assert_eq!(config.rest.upsert, UpsertPolicy::Always);
        assert_eq!(config.rest.deletion_report, DeletionReport::Outcome);
        assert_eq!(config.rest.unmatched, UnmatchedPolicy::Strict);
        assert_eq!(config.rest.authorization_param, "authorization");
    }

    #[test]
    fn test_unknown_policy_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[rest]\nupsert = \"sometimes\"").unwrap();
        assert!(matches!(Config::load_from(file.path()), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_mount_path() {
        let mut config = Config::default();
        config.rest.mount_path = "api".to_string();
        assert!(matches!(config.validate(), Err(Error::Misconfigured(_))));
    }
}
