//! Deployment models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::deploy::fsm::DeploymentStatus;

/// One tracked attempt at making a project live on a dedicated port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    /// Unique deployment ID, also the name of its directory
    pub id: String,

    /// Display label provided by the caller
    pub project_name: String,

    /// Current lifecycle status
    pub status: DeploymentStatus,

    /// Port the deployment listens on, never reused
    pub port: u16,

    /// Public URL derived from host and port
    pub url: String,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Set when the deployment went live
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployed_at: Option<DateTime<Utc>>,

    /// Repository the project came from, if any
    #[serde(default)]
    pub github_repo: Option<String>,

    /// Failure diagnostic, set only when failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Deployment {
    /// Create a record in the initial `deploying` state
    pub fn new(
        id: String,
        project_name: String,
        port: u16,
        public_host: &str,
        github_repo: Option<String>,
    ) -> Self {
        Self {
            url: deployment_url(public_host, port),
            id,
            project_name,
            status: DeploymentStatus::Deploying,
            port,
            created_at: Utc::now(),
            deployed_at: None,
            github_repo,
            error: None,
        }
    }
}

/// Build the URL a deployment is reachable at
pub fn deployment_url(host: &str, port: u16) -> String {
    format!("http://{}:{}/", host, port)
}
