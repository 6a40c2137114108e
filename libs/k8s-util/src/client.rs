use crate::error::{Error, Result};

use kube::{Client, Config};
use tracing::{info, warn};

/// Handle to the Kubernetes API, bound once at process start from in-cluster
/// configuration. Every resource manager shares one handle; there is no
/// request-scoped reinitialization.
///
/// Outside a cluster the handle still constructs, but every attempt to use it
/// fails with [`Error::UnsupportedRuntimeEnvironment`] so that callers get a
/// precise failure instead of a connection error.
#[derive(Clone)]
pub struct ClusterClient {
    inner: Option<Client>,
}

impl ClusterClient {
    pub fn bind() -> Self {
        let inner = match Config::incluster() {
            Ok(config) => match Client::try_from(config) {
                Ok(client) => {
                    info!(msg = "bound in-cluster Kubernetes client");
                    Some(client)
                }
                Err(e) => {
                    warn!(msg = "failed to build Kubernetes client", error = %e);
                    None
                }
            },
            Err(e) => {
                info!(msg = "not running inside a Kubernetes cluster", reason = %e);
                None
            }
        };
        Self { inner }
    }

    /// Wrap an already-built client. Used by integration tests that run
    /// against a kubeconfig instead of in-cluster credentials.
    pub fn from_client(client: Client) -> Self {
        Self {
            inner: Some(client),
        }
    }

    pub fn is_in_cluster(&self) -> bool {
        self.inner.is_some()
    }

    /// Typed access to the underlying client; fails fast outside a cluster.
    pub fn get(&self) -> Result<Client> {
        self.inner.clone().ok_or_else(|| {
            Error::UnsupportedRuntimeEnvironment(
                "the process is not running inside a Kubernetes cluster".to_string(),
            )
        })
    }

    #[cfg(test)]
    pub fn detached() -> Self {
        Self { inner: None }
    }
}
