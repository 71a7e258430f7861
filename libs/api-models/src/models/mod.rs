//! Control API models

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

/// Health response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

/// Version response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionResponse {
    pub version: String,
    pub git_hash: String,
    pub build_time: String,
}

/// Error body returned by every failing endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Contents of a single uploaded file.
///
/// On the wire a text file is a plain JSON string and a binary file is an
/// object of the form `{"base64": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileContent {
    Text(String),
    Bytes(Vec<u8>),
}

impl FileContent {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            FileContent::Text(text) => text.as_bytes(),
            FileContent::Bytes(bytes) => bytes,
        }
    }
}

impl From<&str> for FileContent {
    fn from(text: &str) -> Self {
        FileContent::Text(text.to_string())
    }
}

impl From<Vec<u8>> for FileContent {
    fn from(bytes: Vec<u8>) -> Self {
        FileContent::Bytes(bytes)
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawFileContent {
    Text(String),
    Encoded { base64: String },
}

impl Serialize for FileContent {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let raw = match self {
            FileContent::Text(text) => RawFileContent::Text(text.clone()),
            FileContent::Bytes(bytes) => RawFileContent::Encoded {
                base64: STANDARD.encode(bytes),
            },
        };
        raw.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for FileContent {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        match RawFileContent::deserialize(deserializer)? {
            RawFileContent::Text(text) => Ok(FileContent::Text(text)),
            RawFileContent::Encoded { base64 } => STANDARD
                .decode(base64.as_bytes())
                .map(FileContent::Bytes)
                .map_err(serde::de::Error::custom),
        }
    }
}

/// A project's file set, keyed by path relative to the deployment root
pub type FileSet = BTreeMap<String, FileContent>;

/// Create deployment request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDeploymentRequest {
    #[serde(default)]
    pub project_name: String,

    #[serde(default)]
    pub files: Option<FileSet>,

    #[serde(default)]
    pub github_repo: Option<String>,
}

/// Repository summary as listed for a GitHub user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoSummary {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Query string for repository listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoQuery {
    #[serde(default)]
    pub username: String,
}
