//! Deployment registry: creates deployment records and drives them through
//! their lifecycle

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use api_models::{FileSet, RepoSummary};
use tokio::sync::{mpsc, Mutex};
use tracing::{error, info, warn};

use crate::deploy::fsm::{DeploymentEvent, DeploymentStatus};
use crate::deploy::ports::PortAllocator;
use crate::deploy::provisioner::{confine, Provisioner};
use crate::deploy::supervisor::Supervisor;
use crate::errors::PlatformError;
use crate::http::repos::RepoSource;
use crate::models::deployment::Deployment;
use crate::models::project::Project;
use crate::storage::state::{PersistedState, StateStore};
use crate::utils::generate_deployment_id;

/// Background work scheduled for a freshly created deployment
#[derive(Debug, Clone)]
pub struct DeployJob {
    pub deployment_id: String,
    pub project_name: String,
    pub port: u16,
    pub files: Option<FileSet>,
}

/// Registry settings
#[derive(Debug, Clone)]
pub struct RegistryOptions {
    /// Host used in deployment URLs
    pub public_host: String,

    /// Upper bound on provisioning plus binding for one deployment
    pub provision_timeout: Duration,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            public_host: "localhost".to_string(),
            provision_timeout: Duration::from_secs(60),
        }
    }
}

struct Records {
    deployments: BTreeMap<String, Deployment>,
    projects: BTreeMap<String, Project>,
}

/// Coordinates the state store, port allocator, provisioner and supervisor
pub struct Registry {
    options: RegistryOptions,
    store: StateStore,
    ports: PortAllocator,
    // Guards every read-modify-write of the records, port allocation and save
    records: Mutex<Records>,
    provisioner: Provisioner,
    supervisor: Arc<Supervisor>,
    repos: Arc<dyn RepoSource>,
    jobs: mpsc::Sender<DeployJob>,
}

impl Registry {
    pub fn new(
        options: RegistryOptions,
        store: StateStore,
        state: PersistedState,
        provisioner: Provisioner,
        supervisor: Arc<Supervisor>,
        repos: Arc<dyn RepoSource>,
        jobs: mpsc::Sender<DeployJob>,
    ) -> Self {
        Self {
            options,
            store,
            ports: PortAllocator::new(state.next_port),
            records: Mutex::new(Records {
                deployments: state.deployments,
                projects: state.projects,
            }),
            provisioner,
            supervisor,
            repos,
            jobs,
        }
    }

    /// Create a deployment and schedule its provisioning.
    ///
    /// The returned record is already persisted and visible to
    /// [`Registry::get_all`] with status `deploying`.
    pub async fn create(
        &self,
        project_name: &str,
        files: Option<FileSet>,
        github_repo: Option<String>,
    ) -> Result<Deployment, PlatformError> {
        let project_name = project_name.trim();
        if project_name.is_empty() {
            return Err(PlatformError::ValidationError(
                "project_name must not be empty".to_string(),
            ));
        }
        if let Some(files) = &files {
            for name in files.keys() {
                confine(name)?;
            }
        }
        let github_repo = github_repo
            .map(|repo| repo.trim().to_string())
            .filter(|repo| !repo.is_empty());

        let deployment = {
            let mut records = self.records.lock().await;

            let port = self.ports.next()?;
            let mut id = generate_deployment_id();
            while records.deployments.contains_key(&id) {
                id = generate_deployment_id();
            }

            let deployment = Deployment::new(
                id,
                project_name.to_string(),
                port,
                &self.options.public_host,
                github_repo,
            );
            records
                .deployments
                .insert(deployment.id.clone(), deployment.clone());
            self.persist(&records).await;
            deployment
        };

        info!(
            "Created deployment {} for project '{}' on port {}",
            deployment.id, deployment.project_name, deployment.port
        );

        let job = DeployJob {
            deployment_id: deployment.id.clone(),
            project_name: deployment.project_name.clone(),
            port: deployment.port,
            files,
        };
        if self.jobs.send(job).await.is_err() {
            error!("Provisioning queue is closed, failing deployment {}", deployment.id);
            let failed = self
                .finish(
                    &deployment.id,
                    DeploymentEvent::DeployFailed("provisioning queue is closed".to_string()),
                )
                .await;
            return Ok(failed.unwrap_or(deployment));
        }

        Ok(deployment)
    }

    /// Run a scheduled job: write the files, start the listener, record the
    /// outcome
    pub async fn execute(&self, job: DeployJob) -> Option<Deployment> {
        let timeout = self.options.provision_timeout;
        let event = match tokio::time::timeout(timeout, self.provision(&job)).await {
            Ok(Ok(())) => DeploymentEvent::DeploySuccess,
            Ok(Err(e)) => {
                error!("Deployment error for {}: {}", job.deployment_id, e);
                DeploymentEvent::DeployFailed(e.to_string())
            }
            Err(_) => {
                let e = PlatformError::Timeout(format!("provisioning exceeded {:?}", timeout));
                error!("Deployment error for {}: {}", job.deployment_id, e);
                DeploymentEvent::DeployFailed(e.to_string())
            }
        };

        self.finish(&job.deployment_id, event).await
    }

    /// Fail a job that will never run
    pub async fn abandon(&self, job: DeployJob, reason: &str) -> Option<Deployment> {
        warn!("Abandoning deployment {}: {}", job.deployment_id, reason);
        self.finish(&job.deployment_id, DeploymentEvent::DeployFailed(reason.to_string()))
            .await
    }

    async fn provision(&self, job: &DeployJob) -> Result<(), PlatformError> {
        let dir = self
            .provisioner
            .materialize(&job.deployment_id, &job.project_name, job.files.as_ref())
            .await?;
        self.supervisor.serve(&job.deployment_id, &dir, job.port).await
    }

    async fn finish(&self, deployment_id: &str, event: DeploymentEvent) -> Option<Deployment> {
        let mut records = self.records.lock().await;

        let deployment = match records.deployments.get_mut(deployment_id) {
            Some(deployment) => deployment,
            None => {
                error!("Deployment {} vanished before completion", deployment_id);
                return None;
            }
        };
        if let Err(e) = deployment.process(event) {
            warn!("Deployment {}: {}", deployment_id, e);
            return None;
        }
        let deployment = deployment.clone();

        match deployment.status {
            DeploymentStatus::Live => info!(
                "Deployment {} is live at {}",
                deployment.id, deployment.url
            ),
            _ => info!("Deployment {} is {}", deployment.id, deployment.status),
        }

        self.persist(&records).await;
        Some(deployment)
    }

    /// Serve previously live deployments again after a restart.
    ///
    /// Failures are logged; the recorded status is left untouched.
    pub async fn restore_listeners(&self) -> usize {
        let live: Vec<Deployment> = self
            .records
            .lock()
            .await
            .deployments
            .values()
            .filter(|d| d.status == DeploymentStatus::Live)
            .cloned()
            .collect();

        let mut restored = 0;
        for deployment in live {
            let dir = self.provisioner.deployment_dir(&deployment.id);
            if !dir.exists().await {
                warn!(
                    "Directory for live deployment {} is missing, not serving it",
                    deployment.id
                );
                continue;
            }
            match self
                .supervisor
                .serve(&deployment.id, dir.path(), deployment.port)
                .await
            {
                Ok(()) => restored += 1,
                Err(e) => warn!("Could not restore deployment {}: {}", deployment.id, e),
            }
        }

        info!("Restored {} deployment listeners", restored);
        restored
    }

    /// Snapshot of every deployment keyed by id
    pub async fn get_all(&self) -> BTreeMap<String, Deployment> {
        self.records.lock().await.deployments.clone()
    }

    /// A single deployment
    pub async fn get(&self, deployment_id: &str) -> Option<Deployment> {
        self.records
            .lock()
            .await
            .deployments
            .get(deployment_id)
            .cloned()
    }

    /// Repositories a user could deploy from
    pub async fn list_repos(&self, username: &str) -> Result<Vec<RepoSummary>, PlatformError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(PlatformError::ValidationError(
                "username must not be empty".to_string(),
            ));
        }
        self.repos.list_repos(username).await
    }

    /// The listener supervisor
    pub fn supervisor(&self) -> &Arc<Supervisor> {
        &self.supervisor
    }

    async fn persist(&self, records: &Records) {
        let state = PersistedState {
            deployments: records.deployments.clone(),
            projects: records.projects.clone(),
            next_port: self.ports.peek(),
        };
        self.store.save(&state).await;
    }
}
