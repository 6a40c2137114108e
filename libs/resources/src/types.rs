use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One exposed port of a resource. For pods this is the container port, for
/// services the published port, for ingresses one of the fixed entry ports.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortView {
    pub name: Option<String>,
    pub port: i32,
    pub protocol: String,
}

/// Per-container compute envelope as projected back to callers. All fields
/// are optional; `snapshot_size_limit` is derived from the pod's EmptyDir
/// volume rather than the container's Kubernetes resources.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerResourcesView {
    pub cpu_request: Option<String>,
    pub cpu_limit: Option<String>,
    pub memory_request: Option<String>,
    pub memory_limit: Option<String>,
    pub ephemeral_request: Option<String>,
    pub ephemeral_limit: Option<String>,
    pub snapshot_size_limit: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodContainerView {
    pub name: String,
    pub image: Option<String>,
    pub ports: Vec<PortView>,
    pub resources: ContainerResourcesView,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodView {
    pub id: String,
    pub name: String,
    pub namespace: String,
    pub ip: Option<String>,
    pub ports: Vec<PortView>,
    pub labels: BTreeMap<String, String>,
    pub containers: Vec<PodContainerView>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceView {
    pub id: String,
    pub name: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceKind {
    ClusterIp,
    NodePort,
    LoadBalancer,
}

impl ServiceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceKind::ClusterIp => "ClusterIP",
            ServiceKind::NodePort => "NodePort",
            ServiceKind::LoadBalancer => "LoadBalancer",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "NodePort" => ServiceKind::NodePort,
            "LoadBalancer" => ServiceKind::LoadBalancer,
            _ => ServiceKind::ClusterIp,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceView {
    pub id: String,
    pub name: String,
    pub namespace: String,
    pub cluster_ip: Option<String>,
    pub service_type: ServiceKind,
    pub ports: Vec<PortView>,
    /// Pods whose labels are a superset of this service's selector.
    pub pods: Vec<PodView>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngressView {
    pub id: String,
    pub name: String,
    pub namespace: String,
    /// External address: load-balancer IP, or hostname when no IP is set.
    pub address: Option<String>,
    pub ports: Vec<PortView>,
    /// Services referenced by this ingress's rule paths, deduplicated.
    pub services: Vec<ServiceView>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedPod {
    pub pod_name: String,
    pub namespace_name: String,
    pub image_name: String,
}

/// Requested compute envelope. Empty strings mean "unset" and are omitted
/// from the generated manifest.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResourceEnvelope {
    pub cpu_request: String,
    pub cpu_limit: String,
    pub memory_request: String,
    pub memory_limit: String,
    pub ephemeral_request: String,
    pub ephemeral_limit: String,
    pub snapshot_size_limit: String,
}

#[derive(Clone, Debug)]
pub struct CreatePod {
    pub namespace: String,
    pub name: String,
    pub image: String,
    /// Sorted, deduplicated container ports of the main container.
    pub target_ports: Vec<i32>,
    pub env: BTreeMap<String, String>,
    pub resources: ResourceEnvelope,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublishPort {
    pub publish_port: i32,
    pub target_port: i32,
    pub protocol: String,
    pub node_port: Option<i32>,
}

#[derive(Clone, Debug)]
pub struct CreateService {
    pub namespace: String,
    pub name: String,
    /// Pod the selector binds to: `{app: <pod_name>}`.
    pub pod_name: String,
    pub publish_information: Vec<PublishPort>,
    pub service_type: ServiceKind,
}

#[derive(Clone, Debug)]
pub struct CreateIngress {
    pub namespace: String,
    pub name: String,
    pub service_name: String,
    pub host: String,
    /// Ports of the backing service; one ingress path is created per port.
    pub service_ports: Vec<PortView>,
}
