//! Repository listing for the "deploy from GitHub" flow

use api_models::RepoSummary;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use crate::errors::PlatformError;
use crate::http::client::HttpClient;

/// Source of repositories a user can deploy from
#[async_trait]
pub trait RepoSource: Send + Sync {
    async fn list_repos(&self, username: &str) -> Result<Vec<RepoSummary>, PlatformError>;
}

/// Fixed sample listing, used when no GitHub access is configured
#[derive(Debug, Default, Clone)]
pub struct StaticRepoSource;

#[async_trait]
impl RepoSource for StaticRepoSource {
    async fn list_repos(&self, _username: &str) -> Result<Vec<RepoSummary>, PlatformError> {
        let repos = [
            ("my-website", "Personal website"),
            ("react-app", "React application"),
            ("vue-project", "Vue.js project"),
            ("static-site", "Static HTML site"),
        ];
        Ok(repos
            .into_iter()
            .map(|(name, description)| RepoSummary {
                name: name.to_string(),
                description: Some(description.to_string()),
            })
            .collect())
    }
}

/// Public repositories of a user, from the GitHub REST API
pub struct GithubRepoSource {
    client: HttpClient,
}

#[derive(Debug, Deserialize)]
struct GithubRepo {
    name: String,
    #[serde(default)]
    description: Option<String>,
}

impl GithubRepoSource {
    pub fn new(api_base_url: &str) -> Result<Self, PlatformError> {
        Ok(Self {
            client: HttpClient::new(api_base_url)?,
        })
    }
}

#[async_trait]
impl RepoSource for GithubRepoSource {
    async fn list_repos(&self, username: &str) -> Result<Vec<RepoSummary>, PlatformError> {
        let repos: Vec<GithubRepo> = self.client.get(&["users", username, "repos"]).await?;
        info!("Fetched {} repositories for {}", repos.len(), username);

        Ok(repos
            .into_iter()
            .map(|repo| RepoSummary {
                name: repo.name,
                description: repo.description,
            })
            .collect())
    }
}
