use crate::config::{
    POLL_INTERVAL, SAVE_POD_CONCURRENCY, SERVICE_IP_TIMEOUT, SERVICE_TERMINATION_TIMEOUT,
};
use crate::pod::PodManager;
use crate::types::{CreateService, PodView, PortView, PublishPort, SavedPod, ServiceKind, ServiceView};

use gantry_k8s_util::client::ClusterClient;
use gantry_k8s_util::error::{Error, Result};

use std::collections::{BTreeMap, BTreeSet};

use futures::StreamExt;
use futures::stream;
use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::api::{DeleteParams, ListParams, ObjectMeta, PostParams};
use kube::{Api, ResourceExt};
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

/// Reject duplicate publish or target ports within one request. The
/// orchestrator validates before any write; the service manager re-checks
/// right before the API call.
pub fn validate_publish_information(publish_information: &[PublishPort]) -> Result<()> {
    let mut target_ports = BTreeSet::new();
    let mut publish_ports = BTreeSet::new();
    for entry in publish_information {
        if !target_ports.insert(entry.target_port) {
            return Err(Error::Validation(format!(
                "duplicate target port: {}",
                entry.target_port
            )));
        }
        if !publish_ports.insert(entry.publish_port) {
            return Err(Error::Validation(format!(
                "duplicate publish port: {}",
                entry.publish_port
            )));
        }
    }
    Ok(())
}

/// Manage the services that give pods a stable virtual address.
#[derive(Clone)]
pub struct ServiceManager {
    cluster: ClusterClient,
    pods: PodManager,
}

impl ServiceManager {
    pub fn new(cluster: ClusterClient, pods: PodManager) -> Self {
        Self { cluster, pods }
    }

    fn api(&self, namespace: &str) -> Result<Api<Service>> {
        Ok(Api::namespaced(self.cluster.get()?, namespace))
    }

    pub async fn list(&self, namespace: &str) -> Result<Vec<ServiceView>> {
        let services = self
            .api(namespace)?
            .list(&ListParams::default())
            .await
            .map_err(|e| Error::api(format!("failed to list services in {namespace}"), e))?;
        let mut views = Vec::with_capacity(services.items.len());
        for service in &services.items {
            views.push(self.project(service).await?);
        }
        Ok(views)
    }

    pub async fn get(&self, namespace: &str, name: &str) -> Result<Option<ServiceView>> {
        let service = self
            .api(namespace)?
            .get_opt(name)
            .await
            .map_err(|e| Error::api(format!("failed to get service {namespace}/{name}"), e))?;
        match service {
            Some(service) => Ok(Some(self.project(&service).await?)),
            None => Ok(None),
        }
    }

    /// Create a service, or return it unchanged if one with that name
    /// exists. Does not return before the cluster IP is assigned.
    pub async fn create(&self, spec: &CreateService) -> Result<ServiceView> {
        if let Some(existing) = self.get(&spec.namespace, &spec.name).await? {
            return Ok(existing);
        }
        validate_publish_information(&spec.publish_information)?;
        let manifest = build_service_manifest(spec);
        self.api(&spec.namespace)?
            .create(&PostParams::default(), &manifest)
            .await
            .map_err(|e| {
                Error::api(
                    format!("failed to create service {}/{}", spec.namespace, spec.name),
                    e,
                )
            })?;
        self.await_cluster_ip(&spec.namespace, &spec.name).await?;
        self.get(&spec.namespace, &spec.name).await?.ok_or_else(|| {
            Error::Unknown(format!("service {} disappeared after creation", spec.name))
        })
    }

    /// Save every pod behind the service, at most [`SAVE_POD_CONCURRENCY`]
    /// at a time. Per-pod failures are logged and dropped; the result is
    /// the list of successful saves.
    pub async fn save_service_pods(&self, namespace: &str, name: &str) -> Result<Vec<SavedPod>> {
        let service = self.get(namespace, name).await?.ok_or_else(|| {
            Error::Validation(format!("service {name} not found in namespace {namespace}"))
        })?;
        let saved: Vec<SavedPod> = stream::iter(service.pods)
            .map(|pod| {
                let pods = self.pods.clone();
                let namespace = namespace.to_string();
                async move {
                    match pods.save(&namespace, &pod.name).await {
                        Ok(saved) => Some(saved),
                        Err(e) => {
                            warn!(pod = %pod.name, error = %e, msg = "failed to save service pod");
                            None
                        }
                    }
                }
            })
            .buffer_unordered(SAVE_POD_CONCURRENCY)
            .filter_map(|saved| async move { saved })
            .collect()
            .await;
        Ok(saved)
    }

    pub async fn delete(&self, namespace: &str, name: &str) -> Result<()> {
        self.api(namespace)?
            .delete(name, &DeleteParams::default())
            .await
            .map_err(|e| Error::api(format!("failed to delete service {namespace}/{name}"), e))?;
        self.await_termination(namespace, name).await
    }

    async fn project(&self, service: &Service) -> Result<ServiceView> {
        let namespace = service.namespace().unwrap_or_default();
        let spec = service.spec.clone().unwrap_or_default();
        let pods = match &spec.selector {
            Some(selector) => self.associated_pods(&namespace, selector).await?,
            None => Vec::new(),
        };
        Ok(ServiceView {
            id: service.uid().unwrap_or_default(),
            name: service.name_any(),
            namespace,
            cluster_ip: spec.cluster_ip.clone(),
            service_type: spec
                .type_
                .as_deref()
                .map(ServiceKind::parse)
                .unwrap_or(ServiceKind::ClusterIp),
            ports: spec
                .ports
                .iter()
                .flatten()
                .map(|p| PortView {
                    name: p.name.clone(),
                    port: p.port,
                    protocol: p.protocol.clone().unwrap_or_else(|| "TCP".to_string()),
                })
                .collect(),
            pods,
        })
    }

    /// Pods whose labels are a superset of the selector.
    async fn associated_pods(
        &self,
        namespace: &str,
        selector: &BTreeMap<String, String>,
    ) -> Result<Vec<PodView>> {
        let pods = self.pods.list(namespace).await?;
        Ok(pods
            .into_iter()
            .filter(|pod| selector_matches(selector, &pod.labels))
            .collect())
    }

    async fn await_cluster_ip(&self, namespace: &str, name: &str) -> Result<String> {
        let api = self.api(namespace)?;
        timeout(SERVICE_IP_TIMEOUT, async {
            loop {
                if let Some(service) = api
                    .get_opt(name)
                    .await
                    .map_err(|e| Error::api(format!("failed to poll service {name}"), e))?
                {
                    let cluster_ip = service
                        .spec
                        .as_ref()
                        .and_then(|s| s.cluster_ip.clone())
                        .filter(|ip| !ip.is_empty());
                    if let Some(ip) = cluster_ip {
                        info!(service = name, %ip, msg = "service cluster ip assigned");
                        return Ok(ip);
                    }
                }
                sleep(POLL_INTERVAL).await;
            }
        })
        .await
        .map_err(|_| {
            Error::Timeout(format!(
                "service {name} did not report a cluster ip within {SERVICE_IP_TIMEOUT:?}"
            ))
        })?
    }

    async fn await_termination(&self, namespace: &str, name: &str) -> Result<()> {
        let api = self.api(namespace)?;
        timeout(SERVICE_TERMINATION_TIMEOUT, async {
            loop {
                let service = api
                    .get_opt(name)
                    .await
                    .map_err(|e| Error::api(format!("failed to poll service {name}"), e))?;
                if service.is_none() {
                    debug!(service = name, msg = "service deleted");
                    return Ok(());
                }
                sleep(POLL_INTERVAL).await;
            }
        })
        .await
        .map_err(|_| {
            Error::Timeout(format!(
                "service {name} was not deleted within {SERVICE_TERMINATION_TIMEOUT:?}"
            ))
        })?
    }
}

pub(crate) fn selector_matches(
    selector: &BTreeMap<String, String>,
    labels: &BTreeMap<String, String>,
) -> bool {
    selector
        .iter()
        .all(|(key, value)| labels.get(key) == Some(value))
}

/// Ports come from the publish information; the selector binds the service
/// to its pod by the `app` label. NodePorts are honored only for NodePort
/// services.
fn build_service_manifest(spec: &CreateService) -> Service {
    let ports: Vec<ServicePort> = spec
        .publish_information
        .iter()
        .map(|entry| ServicePort {
            name: Some(format!("port-{}", entry.publish_port)),
            port: entry.publish_port,
            target_port: Some(IntOrString::Int(entry.target_port)),
            protocol: Some(entry.protocol.clone()),
            node_port: if spec.service_type == ServiceKind::NodePort {
                entry.node_port
            } else {
                None
            },
            ..ServicePort::default()
        })
        .collect();

    Service {
        metadata: ObjectMeta {
            name: Some(spec.name.clone()),
            namespace: Some(spec.namespace.clone()),
            ..ObjectMeta::default()
        },
        spec: Some(ServiceSpec {
            selector: Some(BTreeMap::from([("app".to_string(), spec.pod_name.clone())])),
            ports: Some(ports),
            type_: Some(spec.service_type.as_str().to_string()),
            ..ServiceSpec::default()
        }),
        ..Service::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn publish(publish_port: i32, target_port: i32) -> PublishPort {
        PublishPort {
            publish_port,
            target_port,
            protocol: "TCP".to_string(),
            node_port: None,
        }
    }

    fn create_spec(service_type: ServiceKind) -> CreateService {
        CreateService {
            namespace: "ns1".to_string(),
            name: "c-service".to_string(),
            pod_name: "c-pod".to_string(),
            publish_information: vec![PublishPort {
                publish_port: 2222,
                target_port: 22,
                protocol: "TCP".to_string(),
                node_port: Some(30022),
            }],
            service_type,
        }
    }

    #[test]
    fn duplicate_ports_are_rejected() {
        let duplicate_publish = [publish(2222, 22), publish(2222, 23)];
        let err = validate_publish_information(&duplicate_publish).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let duplicate_target = [publish(2222, 22), publish(2223, 22)];
        let err = validate_publish_information(&duplicate_target).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        assert!(validate_publish_information(&[publish(2222, 22), publish(2223, 23)]).is_ok());
    }

    #[test]
    fn manifest_selector_binds_the_app_label_to_the_pod() {
        let service = build_service_manifest(&create_spec(ServiceKind::ClusterIp));
        let spec = service.spec.expect("service spec");
        assert_eq!(
            spec.selector,
            Some(BTreeMap::from([("app".to_string(), "c-pod".to_string())]))
        );
        assert_eq!(spec.type_.as_deref(), Some("ClusterIP"));
        let ports = spec.ports.expect("ports");
        let port = &ports[0];
        assert_eq!(port.port, 2222);
        assert_eq!(port.target_port, Some(IntOrString::Int(22)));
        assert_eq!(port.name.as_deref(), Some("port-2222"));
    }

    #[test]
    fn node_port_is_honored_only_for_node_port_services() {
        let cluster_ip = build_service_manifest(&create_spec(ServiceKind::ClusterIp));
        let ports = cluster_ip.spec.unwrap().ports.unwrap();
        assert_eq!(ports[0].node_port, None);

        let node_port = build_service_manifest(&create_spec(ServiceKind::NodePort));
        let ports = node_port.spec.unwrap().ports.unwrap();
        assert_eq!(ports[0].node_port, Some(30022));
    }

    #[test]
    fn selector_matching_is_a_superset_check() {
        let selector = BTreeMap::from([("app".to_string(), "c-pod".to_string())]);
        let exact = selector.clone();
        let superset = BTreeMap::from([
            ("app".to_string(), "c-pod".to_string()),
            ("tier".to_string(), "backend".to_string()),
        ]);
        let other = BTreeMap::from([("app".to_string(), "d-pod".to_string())]);
        assert!(selector_matches(&selector, &exact));
        assert!(selector_matches(&selector, &superset));
        assert!(!selector_matches(&selector, &other));
        assert!(!selector_matches(&selector, &BTreeMap::new()));
    }
}
