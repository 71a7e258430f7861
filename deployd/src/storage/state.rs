//! Persisted platform state

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::errors::PlatformError;
use crate::filesys::file::File;
use crate::models::deployment::Deployment;
use crate::models::project::Project;

/// Snapshot of everything the registry persists
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistedState {
    pub deployments: BTreeMap<String, Deployment>,
    pub projects: BTreeMap<String, Project>,
    /// Next port to hand out; past `u16::MAX` once the range is spent
    pub next_port: u32,
}

/// On-disk document. Unknown fields are ignored.
#[derive(Debug, Serialize, Deserialize)]
struct StateDocument {
    #[serde(default)]
    deployments: BTreeMap<String, Deployment>,

    #[serde(default)]
    projects: BTreeMap<String, Project>,

    #[serde(default)]
    next_port: Option<u32>,
}

/// Durable store for the registry, a single JSON file overwritten in full
#[derive(Debug, Clone)]
pub struct StateStore {
    file: File,
    base_port: u16,
}

impl StateStore {
    pub fn new(file: File, base_port: u16) -> Self {
        Self { file, base_port }
    }

    pub fn file(&self) -> &File {
        &self.file
    }

    /// Load the last saved state.
    ///
    /// A missing or unreadable file yields the default state.
    pub async fn load(&self) -> PersistedState {
        match self.read().await {
            Ok(Some(state)) => {
                info!(
                    "Loaded {} deployments from {}",
                    state.deployments.len(),
                    self.file.path().display()
                );
                state
            }
            Ok(None) => {
                debug!("No state file at {}, starting empty", self.file.path().display());
                self.default_state()
            }
            Err(e) => {
                error!("Error loading state, starting empty: {}", e);
                self.default_state()
            }
        }
    }

    /// Overwrite the state file with `state`. Failures are logged only.
    pub async fn save(&self, state: &PersistedState) {
        if let Err(e) = self.write(state).await {
            error!("Error saving state: {}", e);
        }
    }

    async fn read(&self) -> Result<Option<PersistedState>, PlatformError> {
        if !self.file.exists().await {
            return Ok(None);
        }

        let document: StateDocument = self
            .file
            .read_json()
            .await
            .map_err(|e| PlatformError::PersistenceError(e.to_string()))?;

        let mut next_port = document
            .next_port
            .unwrap_or_else(|| u32::from(self.base_port));
        if let Some(highest) = document
            .deployments
            .values()
            .map(|d| u32::from(d.port))
            .max()
        {
            if next_port <= highest {
                warn!(
                    "Stored next_port {} is not above highest used port {}, adjusting",
                    next_port, highest
                );
                next_port = highest + 1;
            }
        }

        Ok(Some(PersistedState {
            deployments: document.deployments,
            projects: document.projects,
            next_port,
        }))
    }

    async fn write(&self, state: &PersistedState) -> Result<(), PlatformError> {
        let document = StateDocument {
            deployments: state.deployments.clone(),
            projects: state.projects.clone(),
            next_port: Some(state.next_port),
        };

        self.file
            .write_json(&document)
            .await
            .map_err(|e| PlatformError::PersistenceError(e.to_string()))
    }

    fn default_state(&self) -> PersistedState {
        PersistedState {
            next_port: u32::from(self.base_port),
            ..Default::default()
        }
    }
}
