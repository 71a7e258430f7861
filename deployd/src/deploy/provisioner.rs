//! Materializes deployment files on disk

use std::path::{Component, Path, PathBuf};

use api_models::{FileContent, FileSet};
use tracing::{debug, info};

use crate::errors::PlatformError;
use crate::filesys::dir::Dir;
use crate::utils::escape_html;

/// Name of the page synthesized when a deployment has no files
pub const DEFAULT_PAGE: &str = "index.html";

/// Writes each deployment's files into its own directory under a root
#[derive(Debug, Clone)]
pub struct Provisioner {
    root: Dir,
}

impl Provisioner {
    pub fn new(root: Dir) -> Self {
        Self { root }
    }

    /// Directory owned by a deployment
    pub fn deployment_dir(&self, deployment_id: &str) -> Dir {
        self.root.subdir(deployment_id)
    }

    /// Write `files` (or a placeholder page) into the deployment's directory
    /// and return its path
    pub async fn materialize(
        &self,
        deployment_id: &str,
        project_name: &str,
        files: Option<&FileSet>,
    ) -> Result<PathBuf, PlatformError> {
        let dir = self.deployment_dir(deployment_id);
        dir.create()
            .await
            .map_err(|e| PlatformError::provision(deployment_id, e))?;

        match files.filter(|files| !files.is_empty()) {
            Some(files) => {
                info!("Writing {} files for deployment {}", files.len(), deployment_id);
                for (name, content) in files {
                    write_file(&dir, deployment_id, name, content).await?;
                }
            }
            None => {
                info!("No files for deployment {}, writing default page", deployment_id);
                dir.file(DEFAULT_PAGE)
                    .write_bytes(default_page(project_name).as_bytes())
                    .await
                    .map_err(|e| PlatformError::provision(deployment_id, e))?;
            }
        }

        Ok(dir.path().to_path_buf())
    }
}

async fn write_file(
    dir: &Dir,
    deployment_id: &str,
    name: &str,
    content: &FileContent,
) -> Result<(), PlatformError> {
    let relative = confine(name).map_err(|e| PlatformError::provision(deployment_id, e))?;
    debug!("Writing {} ({} bytes)", relative.display(), content.as_bytes().len());

    dir.file(&relative)
        .write_bytes(content.as_bytes())
        .await
        .map_err(|e| {
            PlatformError::provision(deployment_id, format!("{}: {}", relative.display(), e))
        })
}

/// Normalize a caller-supplied path so it stays inside the deployment root.
///
/// Absolute paths, parent components and empty paths are rejected.
pub fn confine(name: &str) -> Result<PathBuf, PlatformError> {
    let mut relative = PathBuf::new();

    for component in Path::new(name).components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(PlatformError::ValidationError(format!(
                    "file path escapes the deployment directory: {}",
                    name
                )));
            }
        }
    }

    if relative.as_os_str().is_empty() {
        return Err(PlatformError::ValidationError(format!(
            "invalid file path: {:?}",
            name
        )));
    }

    Ok(relative)
}

/// Placeholder page for deployments created without files
pub fn default_page(project_name: &str) -> String {
    let name = escape_html(project_name);
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{name}</title>
    <style>
        body {{ font-family: system-ui, -apple-system, sans-serif; margin: 0; padding: 40px; background: #f8fafc; }}
        .container {{ max-width: 800px; margin: 0 auto; text-align: center; }}
        h1 {{ color: #1e293b; margin-bottom: 16px; }}
        p {{ color: #64748b; font-size: 18px; }}
        .badge {{ background: #10b981; color: white; padding: 8px 16px; border-radius: 20px; display: inline-block; margin-top: 20px; }}
    </style>
</head>
<body>
    <div class="container">
        <h1>{name}</h1>
        <p>Your project has been successfully deployed!</p>
        <div class="badge">Live on deployd</div>
    </div>
</body>
</html>
"#
    )
}
