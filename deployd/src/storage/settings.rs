//! Settings file management

use serde::{Deserialize, Serialize};

use crate::logs::LogLevel;

/// deployd settings, read from `settings.json` in the base directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Emit JSON log lines
    #[serde(default)]
    pub json_logs: bool,

    /// Also write rolling log files under the logs directory
    #[serde(default)]
    pub log_to_file: bool,

    /// Control API server
    #[serde(default)]
    pub server: ServerSettings,

    /// Deployment hosting
    #[serde(default)]
    pub deployments: DeploymentSettings,

    /// Repository listing
    #[serde(default)]
    pub github: GithubSettings,
}

fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            json_logs: false,
            log_to_file: false,
            server: ServerSettings::default(),
            deployments: DeploymentSettings::default(),
            github: GithubSettings::default(),
        }
    }
}

/// Control API server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_server_host")]
    pub host: String,

    #[serde(default = "default_server_port")]
    pub port: u16,
}

fn default_server_host() -> String {
    "127.0.0.1".to_string()
}

fn default_server_port() -> u16 {
    8000
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_server_host(),
            port: default_server_port(),
        }
    }
}

/// Deployment hosting settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentSettings {
    /// Address deployment listeners bind to
    #[serde(default = "default_bind_host")]
    pub bind_host: String,

    /// Host used when building deployment URLs
    #[serde(default = "default_public_host")]
    pub public_host: String,

    /// First port handed out when no state exists
    #[serde(default = "default_base_port")]
    pub base_port: u16,

    /// Maximum concurrent provisioning jobs
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Provisioning jobs that may wait for a worker
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Per-deployment provisioning timeout
    #[serde(default = "default_provision_timeout")]
    pub provision_timeout_secs: u64,

    /// Serve previously live deployments again after a restart
    #[serde(default)]
    pub restore_listeners: bool,
}

fn default_bind_host() -> String {
    "127.0.0.1".to_string()
}

fn default_public_host() -> String {
    "localhost".to_string()
}

fn default_base_port() -> u16 {
    8001
}

fn default_concurrency() -> usize {
    4
}

fn default_queue_capacity() -> usize {
    64
}

fn default_provision_timeout() -> u64 {
    60
}

impl Default for DeploymentSettings {
    fn default() -> Self {
        Self {
            bind_host: default_bind_host(),
            public_host: default_public_host(),
            base_port: default_base_port(),
            concurrency: default_concurrency(),
            queue_capacity: default_queue_capacity(),
            provision_timeout_secs: default_provision_timeout(),
            restore_listeners: false,
        }
    }
}

/// Where repository listings come from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepoSourceKind {
    /// Fixed sample list
    #[default]
    Static,

    /// The GitHub REST API
    Api,
}

/// Repository listing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubSettings {
    #[serde(default)]
    pub source: RepoSourceKind,

    #[serde(default = "default_github_api_url")]
    pub api_base_url: String,
}

fn default_github_api_url() -> String {
    "https://api.github.com".to_string()
}

impl Default for GithubSettings {
    fn default() -> Self {
        Self {
            source: RepoSourceKind::Static,
            api_base_url: default_github_api_url(),
        }
    }
}
