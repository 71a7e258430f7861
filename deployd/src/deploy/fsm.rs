//! Finite state machine for a deployment's lifecycle

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::models::deployment::Deployment;

/// Deployment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentStatus {
    /// Files are being provisioned and the listener started
    Deploying,

    /// Serving on its port
    Live,

    /// Provisioning or binding failed
    Failed,
}

impl DeploymentStatus {
    /// Whether no further transition is possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, DeploymentStatus::Live | DeploymentStatus::Failed)
    }
}

impl std::fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DeploymentStatus::Deploying => "deploying",
            DeploymentStatus::Live => "live",
            DeploymentStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Deployment event
#[derive(Debug, Clone)]
pub enum DeploymentEvent {
    /// Files written and listener bound
    DeploySuccess,

    /// Provisioning, binding or the timeout failed
    DeployFailed(String),
}

/// Compute the status an event leads to
pub fn transition(
    state: DeploymentStatus,
    event: &DeploymentEvent,
) -> Result<DeploymentStatus, String> {
    match (state, event) {
        (DeploymentStatus::Deploying, DeploymentEvent::DeploySuccess) => Ok(DeploymentStatus::Live),
        (DeploymentStatus::Deploying, DeploymentEvent::DeployFailed(_)) => {
            Ok(DeploymentStatus::Failed)
        }
        (state, event) => Err(format!("Invalid transition: {} -> {:?}", state, event)),
    }
}

impl Deployment {
    /// Process an event, updating status, timestamps and error together
    pub fn process(&mut self, event: DeploymentEvent) -> Result<(), String> {
        let next = transition(self.status, &event)?;

        match event {
            DeploymentEvent::DeploySuccess => {
                self.deployed_at = Some(Utc::now());
                self.error = None;
            }
            DeploymentEvent::DeployFailed(err) => {
                self.error = Some(err);
            }
        }

        self.status = next;
        Ok(())
    }
}
