//! Application configuration options

use std::time::Duration;

use crate::deploy::registry::RegistryOptions;
use crate::storage::layout::StorageLayout;
use crate::storage::settings::{GithubSettings, Settings};
use crate::workers::deployer;

/// Main application options
#[derive(Debug, Clone)]
pub struct AppOptions {
    /// Lifecycle configuration
    pub lifecycle: LifecycleOptions,

    /// Storage configuration
    pub storage: StorageOptions,

    /// Enable the control API server
    pub enable_socket_server: bool,

    /// Control API server configuration
    pub server: ServerOptions,

    /// Deployment hosting configuration
    pub deployments: DeploymentOptions,

    /// Deployer worker options
    pub deployer: deployer::Options,

    /// Repository listing configuration
    pub github: GithubSettings,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            lifecycle: LifecycleOptions::default(),
            storage: StorageOptions::default(),
            enable_socket_server: true,
            server: ServerOptions::default(),
            deployments: DeploymentOptions::default(),
            deployer: deployer::Options::default(),
            github: GithubSettings::default(),
        }
    }
}

impl AppOptions {
    /// Build options from a settings file rooted at `layout`
    pub fn from_settings(settings: &Settings, layout: StorageLayout) -> Self {
        let deployments = &settings.deployments;
        Self {
            storage: StorageOptions { layout },
            enable_socket_server: settings.server.enabled,
            server: ServerOptions {
                host: settings.server.host.clone(),
                port: settings.server.port,
            },
            deployments: DeploymentOptions {
                bind_host: deployments.bind_host.clone(),
                public_host: deployments.public_host.clone(),
                base_port: deployments.base_port,
                queue_capacity: deployments.queue_capacity,
                provision_timeout: Duration::from_secs(deployments.provision_timeout_secs),
                restore_listeners: deployments.restore_listeners,
            },
            deployer: deployer::Options {
                concurrency: deployments.concurrency,
            },
            github: settings.github.clone(),
            ..Default::default()
        }
    }
}

/// Lifecycle options
#[derive(Debug, Clone)]
pub struct LifecycleOptions {
    /// Maximum delay for graceful shutdown
    pub max_shutdown_delay: Duration,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            max_shutdown_delay: Duration::from_secs(30),
        }
    }
}

/// Storage configuration options
#[derive(Debug, Clone, Default)]
pub struct StorageOptions {
    /// Storage layout paths
    pub layout: StorageLayout,
}

/// Control API server options
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

/// Deployment hosting options
#[derive(Debug, Clone)]
pub struct DeploymentOptions {
    /// Address deployment listeners bind to
    pub bind_host: String,

    /// Host used in deployment URLs
    pub public_host: String,

    /// First port when no state exists
    pub base_port: u16,

    /// Provisioning jobs that may wait for a worker
    pub queue_capacity: usize,

    /// Per-deployment provisioning timeout
    pub provision_timeout: Duration,

    /// Serve previously live deployments again at startup
    pub restore_listeners: bool,
}

impl Default for DeploymentOptions {
    fn default() -> Self {
        Self {
            bind_host: "127.0.0.1".to_string(),
            public_host: "localhost".to_string(),
            base_port: 8001,
            queue_capacity: 64,
            provision_timeout: Duration::from_secs(60),
            restore_listeners: false,
        }
    }
}

impl DeploymentOptions {
    pub fn registry_options(&self) -> RegistryOptions {
        RegistryOptions {
            public_host: self.public_host.clone(),
            provision_timeout: self.provision_timeout,
        }
    }
}
