use crate::config::{NAMESPACE_TERMINATION_TIMEOUT, POLL_INTERVAL};
use crate::types::NamespaceView;

use gantry_k8s_util::client::ClusterClient;
use gantry_k8s_util::error::{Error, Result};

use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::api::networking::v1::{NetworkPolicy, NetworkPolicySpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use kube::api::{DeleteParams, ListParams, ObjectMeta, PostParams};
use kube::{Api, ResourceExt};
use tokio::time::{sleep, timeout};
use tracing::debug;

/// Manage Kubernetes namespaces, the tenancy boundary exposed to callers as
/// a "network".
#[derive(Clone)]
pub struct NamespaceManager {
    cluster: ClusterClient,
}

impl NamespaceManager {
    pub fn new(cluster: ClusterClient) -> Self {
        Self { cluster }
    }

    fn api(&self) -> Result<Api<Namespace>> {
        Ok(Api::all(self.cluster.get()?))
    }

    fn policies(&self, namespace: &str) -> Result<Api<NetworkPolicy>> {
        Ok(Api::namespaced(self.cluster.get()?, namespace))
    }

    pub async fn list(&self) -> Result<Vec<NamespaceView>> {
        let namespaces = self
            .api()?
            .list(&ListParams::default())
            .await
            .map_err(|e| Error::api("failed to list namespaces", e))?;
        Ok(namespaces.items.iter().map(project_namespace).collect())
    }

    pub async fn get(&self, name: &str) -> Result<Option<NamespaceView>> {
        let namespace = self
            .api()?
            .get_opt(name)
            .await
            .map_err(|e| Error::api(format!("failed to get namespace {name}"), e))?;
        Ok(namespace.as_ref().map(project_namespace))
    }

    /// Create a namespace, or return it unchanged if it already exists. A
    /// fresh namespace also gets a default-deny ingress network policy.
    pub async fn create(&self, name: &str) -> Result<NamespaceView> {
        if let Some(existing) = self.get(name).await? {
            return Ok(existing);
        }
        let namespace = Namespace {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..ObjectMeta::default()
            },
            ..Namespace::default()
        };
        let created = self
            .api()?
            .create(&PostParams::default(), &namespace)
            .await
            .map_err(|e| Error::api(format!("failed to create namespace {name}"), e))?;
        self.policies(name)?
            .create(&PostParams::default(), &default_deny_ingress_policy(name))
            .await
            .map_err(|e| {
                Error::api(format!("failed to create network policy for namespace {name}"), e)
            })?;
        Ok(project_namespace(&created))
    }

    pub async fn delete(&self, name: &str) -> Result<()> {
        self.api()?
            .delete(name, &DeleteParams::default())
            .await
            .map_err(|e| Error::api(format!("failed to delete namespace {name}"), e))?;
        self.await_termination(name).await
    }

    async fn await_termination(&self, name: &str) -> Result<()> {
        timeout(NAMESPACE_TERMINATION_TIMEOUT, async {
            loop {
                if self.get(name).await?.is_none() {
                    debug!(namespace = name, msg = "namespace deleted");
                    return Ok(());
                }
                sleep(POLL_INTERVAL).await;
            }
        })
        .await
        .map_err(|_| {
            Error::Timeout(format!(
                "namespace {name} was not deleted within {NAMESPACE_TERMINATION_TIMEOUT:?}"
            ))
        })?
    }
}

fn project_namespace(namespace: &Namespace) -> NamespaceView {
    NamespaceView {
        id: namespace.uid().unwrap_or_default(),
        name: namespace.name_any(),
    }
}

/// Default-deny for incoming traffic: selects every pod in the namespace and
/// allows no ingress rule.
fn default_deny_ingress_policy(namespace: &str) -> NetworkPolicy {
    NetworkPolicy {
        metadata: ObjectMeta {
            name: Some(namespace.to_string()),
            namespace: Some(namespace.to_string()),
            ..ObjectMeta::default()
        },
        spec: Some(NetworkPolicySpec {
            pod_selector: Some(LabelSelector::default()),
            policy_types: Some(vec!["Ingress".to_string()]),
            ..NetworkPolicySpec::default()
        }),
        ..NetworkPolicy::default()
    }
}
