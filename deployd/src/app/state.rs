//! Application state management

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::info;

use crate::app::options::AppOptions;
use crate::deploy::provisioner::Provisioner;
use crate::deploy::registry::{DeployJob, Registry};
use crate::deploy::supervisor::Supervisor;
use crate::errors::PlatformError;
use crate::http::repos::{GithubRepoSource, RepoSource, StaticRepoSource};
use crate::storage::layout::StorageLayout;
use crate::storage::settings::{GithubSettings, RepoSourceKind};
use crate::storage::state::StateStore;

/// Main application state
pub struct AppState {
    /// Storage layout
    pub layout: StorageLayout,

    /// Deployment registry
    pub registry: Arc<Registry>,

    /// Deployment listeners
    pub supervisor: Arc<Supervisor>,
}

impl AppState {
    /// Initialize application state.
    ///
    /// Returns the receiving end of the provisioning queue, to be handed to
    /// the deployer worker.
    pub async fn init(
        options: &AppOptions,
    ) -> Result<(Self, mpsc::Receiver<DeployJob>), PlatformError> {
        info!("Initializing application state...");

        let layout = options.storage.layout.clone();
        layout.setup().await?;

        let store = StateStore::new(layout.state_file(), options.deployments.base_port);
        let state = store.load().await;

        let supervisor = Arc::new(Supervisor::new(options.deployments.bind_host.clone()));
        let repos = repo_source(&options.github)?;
        let (jobs_tx, jobs_rx) = mpsc::channel(options.deployments.queue_capacity.max(1));

        let registry = Arc::new(Registry::new(
            options.deployments.registry_options(),
            store,
            state,
            Provisioner::new(layout.deployments_dir()),
            supervisor.clone(),
            repos,
            jobs_tx,
        ));

        let state = Self {
            layout,
            registry,
            supervisor,
        };

        Ok((state, jobs_rx))
    }

    /// Shutdown application state
    pub async fn shutdown(&self) -> Result<(), PlatformError> {
        info!("Shutting down application state...");
        self.supervisor.shutdown().await
    }
}

fn repo_source(settings: &GithubSettings) -> Result<Arc<dyn RepoSource>, PlatformError> {
    Ok(match settings.source {
        RepoSourceKind::Static => Arc::new(StaticRepoSource),
        RepoSourceKind::Api => Arc::new(GithubRepoSource::new(&settings.api_base_url)?),
    })
}
