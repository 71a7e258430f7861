//! Project models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A recurring deployment target.
///
/// Kept in the persisted state so it survives restarts; nothing creates
/// projects yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub name: String,

    #[serde(default)]
    pub github_repo: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}
