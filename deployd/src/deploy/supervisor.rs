//! Per-deployment static file listeners

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::errors::PlatformError;

/// A running listener owned by the supervisor
struct ListenerHandle {
    port: u16,
    root: PathBuf,
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<Result<(), PlatformError>>,
}

/// Starts and tracks one static file server per live deployment
pub struct Supervisor {
    bind_host: String,
    listeners: Mutex<HashMap<String, ListenerHandle>>,
}

impl Supervisor {
    pub fn new(bind_host: impl Into<String>) -> Self {
        Self {
            bind_host: bind_host.into(),
            listeners: Mutex::new(HashMap::new()),
        }
    }

    /// Bind `port` and serve `directory` on it in the background.
    ///
    /// Returns once the socket is bound; the server keeps running until
    /// [`Supervisor::shutdown`].
    pub async fn serve(
        &self,
        deployment_id: &str,
        directory: &Path,
        port: u16,
    ) -> Result<(), PlatformError> {
        let mut listeners = self.listeners.lock().await;
        if let Some(existing) = listeners.get(deployment_id) {
            return Err(PlatformError::BindError {
                deployment_id: deployment_id.to_string(),
                port,
                cause: format!("already serving on port {}", existing.port),
            });
        }

        let addr = format!("{}:{}", self.bind_host, port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| PlatformError::BindError {
                deployment_id: deployment_id.to_string(),
                port,
                cause: e.to_string(),
            })?;

        let app = Router::new()
            .fallback_service(ServeDir::new(directory).append_index_html_on_directories(true))
            .layer(TraceLayer::new_for_http());

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let id = deployment_id.to_string();
        let task = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await
                .map_err(|e| PlatformError::ServerError(e.to_string()));
            if let Err(e) = &result {
                error!("Listener for deployment {} stopped: {}", id, e);
            }
            result
        });

        info!(
            "Deployment {} serving {} at {}",
            deployment_id,
            directory.display(),
            addr
        );

        listeners.insert(
            deployment_id.to_string(),
            ListenerHandle {
                port,
                root: directory.to_path_buf(),
                shutdown_tx,
                task,
            },
        );
        Ok(())
    }

    /// Whether a listener is running for the deployment
    pub async fn is_serving(&self, deployment_id: &str) -> bool {
        self.listeners
            .lock()
            .await
            .get(deployment_id)
            .is_some_and(|handle| !handle.task.is_finished())
    }

    /// Root directory served for a deployment
    pub async fn root_of(&self, deployment_id: &str) -> Option<PathBuf> {
        self.listeners
            .lock()
            .await
            .get(deployment_id)
            .map(|handle| handle.root.clone())
    }

    /// Ports with a listener, sorted
    pub async fn listening_ports(&self) -> Vec<u16> {
        let mut ports: Vec<u16> = self
            .listeners
            .lock()
            .await
            .values()
            .map(|handle| handle.port)
            .collect();
        ports.sort_unstable();
        ports
    }

    /// Stop every listener and wait for them to finish
    pub async fn shutdown(&self) -> Result<(), PlatformError> {
        let handles: Vec<(String, ListenerHandle)> =
            self.listeners.lock().await.drain().collect();
        if handles.is_empty() {
            return Ok(());
        }

        info!("Stopping {} deployment listeners...", handles.len());

        let tasks = handles.into_iter().map(|(id, handle)| {
            let ListenerHandle {
                shutdown_tx, task, ..
            } = handle;
            let _ = shutdown_tx.send(());
            async move { (id, task.await) }
        });

        for (id, result) in futures::future::join_all(tasks).await {
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Listener for deployment {} ended with error: {}", id, e),
                Err(e) => {
                    return Err(PlatformError::ShutdownError(format!(
                        "listener for deployment {}: {}",
                        id, e
                    )))
                }
            }
        }

        Ok(())
    }
}
