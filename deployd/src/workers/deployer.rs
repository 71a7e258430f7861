//! Deployer worker: drains the provisioning queue with bounded concurrency

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::deploy::registry::{DeployJob, Registry};

/// Deployer worker options
#[derive(Debug, Clone)]
pub struct Options {
    /// Maximum deployments provisioned at the same time
    pub concurrency: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self { concurrency: 4 }
    }
}

/// Run the deployer worker until shutdown or until the queue closes.
///
/// In-flight jobs are always awaited. Jobs still queued at shutdown are
/// failed so that no record stays `deploying` forever.
pub async fn run(
    options: &Options,
    registry: Arc<Registry>,
    mut jobs: mpsc::Receiver<DeployJob>,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) {
    info!(
        "Deployer worker starting with {} slots...",
        options.concurrency.max(1)
    );

    let slots = Arc::new(Semaphore::new(options.concurrency.max(1)));
    let mut in_flight = JoinSet::new();

    loop {
        let permit = tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Deployer worker shutting down...");
                break;
            }
            permit = slots.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        let job = tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Deployer worker shutting down...");
                break;
            }
            job = jobs.recv() => match job {
                Some(job) => job,
                None => {
                    info!("Provisioning queue closed, deployer worker stopping...");
                    break;
                }
            },
        };

        while let Some(result) = in_flight.try_join_next() {
            log_join_result(result);
        }

        debug!("Provisioning deployment {}", job.deployment_id);
        let registry = registry.clone();
        in_flight.spawn(async move {
            let _permit = permit;
            registry.execute(job).await;
        });
    }

    jobs.close();
    while let Ok(job) = jobs.try_recv() {
        registry
            .abandon(job, "deployd shut down before provisioning started")
            .await;
    }

    while let Some(result) = in_flight.join_next().await {
        log_join_result(result);
    }

    info!("Deployer worker stopped");
}

fn log_join_result(result: Result<(), tokio::task::JoinError>) {
    if let Err(e) = result {
        error!("Provisioning task panicked: {}", e);
    }
}
