//! Kubernetes access used by the launcher and the cleanup loop
//!
//! `ClusterClient` is the seam tests mock; `KubeClusterClient` is the real
//! implementation bound to a single namespace.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, DeleteParams, ListParams, PostParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use tracing::info;

#[cfg(test)]
use mockall::automock;

use kubekite_common::Error;

/// How dependents of a deleted Job are handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletePropagation {
    /// Pods are deleted before the Job deletion completes
    Foreground,
    /// The Job goes away immediately, pods are collected afterwards
    Background,
    /// Pods are left running without an owner
    Orphan,
}

impl DeletePropagation {
    pub fn delete_params(self) -> DeleteParams {
        match self {
            DeletePropagation::Foreground => DeleteParams::foreground(),
            DeletePropagation::Background => DeleteParams::background(),
            DeletePropagation::Orphan => DeleteParams::orphan(),
        }
    }
}

/// Cluster operations the job engine consumes.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Get a Job by name; `Ok(None)` when it does not exist
    async fn get_job(&self, name: &str) -> Result<Option<Job>, Error>;

    /// Create a Job, returning the object as stored by the API server
    async fn create_job(&self, job: &Job) -> Result<Job, Error>;

    /// List pods matching an equality label selector
    async fn list_pods(&self, label_selector: &str) -> Result<Vec<Pod>, Error>;

    /// Delete a Job by name with the given propagation policy
    async fn delete_job(&self, name: &str, propagation: DeletePropagation) -> Result<(), Error>;
}

/// `ClusterClient` backed by the Kubernetes API.
pub struct KubeClusterClient {
    jobs: Api<Job>,
    pods: Api<Pod>,
}

impl KubeClusterClient {
    pub fn new(client: Client, namespace: &str) -> Self {
        Self {
            jobs: Api::namespaced(client.clone(), namespace),
            pods: Api::namespaced(client, namespace),
        }
    }
}

#[async_trait]
impl ClusterClient for KubeClusterClient {
    async fn get_job(&self, name: &str) -> Result<Option<Job>, Error> {
        match self.jobs.get(name).await {
            Ok(job) => Ok(Some(job)),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn create_job(&self, job: &Job) -> Result<Job, Error> {
        Ok(self.jobs.create(&PostParams::default(), job).await?)
    }

    async fn list_pods(&self, label_selector: &str) -> Result<Vec<Pod>, Error> {
        let pods = self
            .pods
            .list(&ListParams::default().labels(label_selector))
            .await?;
        Ok(pods.items)
    }

    async fn delete_job(&self, name: &str, propagation: DeletePropagation) -> Result<(), Error> {
        self.jobs
            .delete(name, &propagation.delete_params())
            .await?;
        Ok(())
    }
}

/// Build a Kubernetes client.
///
/// Without a kubeconfig path the in-cluster / default config is inferred.
/// `timeout` bounds connecting to and reading from the API server.
pub async fn kube_client(
    kubeconfig: Option<&Path>,
    timeout: Option<Duration>,
) -> Result<Client, Error> {
    let mut config = match kubeconfig {
        Some(path) => {
            let kc = Kubeconfig::read_from(path)
                .map_err(|e| Error::config("kubeconfig", e.to_string()))?;
            Config::from_custom_kubeconfig(kc, &KubeConfigOptions::default())
                .await
                .map_err(|e| Error::config("kubeconfig", e.to_string()))?
        }
        None => {
            info!("No kubeconfig was provided; using in-cluster or default config");
            Config::infer()
                .await
                .map_err(|e| Error::config("kubeconfig", e.to_string()))?
        }
    };

    if let Some(timeout) = timeout {
        config.connect_timeout = Some(timeout);
        config.read_timeout = Some(timeout);
    }

    Ok(Client::try_from(config)?)
}
