use gantry_resources::types::{IngressView, PodView, PortView, ServiceView};

/// Exposure ladder. The orchestrator creates the smallest composite that
/// satisfies the requested level.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ExposureLevel {
    /// Pod only, reachable inside its namespace.
    Internal = 1,
    /// Adds a ClusterIP service.
    ClusterLocal = 2,
    /// Adds a LoadBalancer service instead.
    ClusterExternal = 3,
    /// Adds an ingress over the service.
    Exposed = 4,
}

impl ExposureLevel {
    /// Wire levels are 1..4; anything else falls back to cluster-local.
    pub fn from_wire(level: i32) -> Self {
        match level {
            1 => ExposureLevel::Internal,
            3 => ExposureLevel::ClusterExternal,
            4 => ExposureLevel::Exposed,
            _ => ExposureLevel::ClusterLocal,
        }
    }
}

/// The logical container exposed to callers: whichever primitive represents
/// the composite at its exposure level.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Container {
    Pod(PodView),
    Service(ServiceView),
    Ingress(IngressView),
}

impl Container {
    pub fn kind(&self) -> &'static str {
        match self {
            Container::Pod(_) => "pod",
            Container::Service(_) => "service",
            Container::Ingress(_) => "ingress",
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Container::Pod(pod) => &pod.id,
            Container::Service(service) => &service.id,
            Container::Ingress(ingress) => &ingress.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Container::Pod(pod) => &pod.name,
            Container::Service(service) => &service.name,
            Container::Ingress(ingress) => &ingress.name,
        }
    }

    /// Pod IP, service cluster IP, or ingress external address.
    pub fn ip(&self) -> Option<&str> {
        match self {
            Container::Pod(pod) => pod.ip.as_deref(),
            Container::Service(service) => service.cluster_ip.as_deref(),
            Container::Ingress(ingress) => ingress.address.as_deref(),
        }
    }

    /// The namespace, which callers know as the network.
    pub fn network(&self) -> &str {
        match self {
            Container::Pod(pod) => &pod.namespace,
            Container::Service(service) => &service.namespace,
            Container::Ingress(ingress) => &ingress.namespace,
        }
    }

    pub fn ports(&self) -> &[PortView] {
        match self {
            Container::Pod(pod) => &pod.ports,
            Container::Service(service) => &service.ports,
            Container::Ingress(ingress) => &ingress.ports,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::BTreeMap;

    #[test]
    fn wire_levels_map_onto_the_ladder() {
        assert_eq!(ExposureLevel::from_wire(1), ExposureLevel::Internal);
        assert_eq!(ExposureLevel::from_wire(2), ExposureLevel::ClusterLocal);
        assert_eq!(ExposureLevel::from_wire(3), ExposureLevel::ClusterExternal);
        assert_eq!(ExposureLevel::from_wire(4), ExposureLevel::Exposed);
        // unknown levels default to cluster-local
        assert_eq!(ExposureLevel::from_wire(0), ExposureLevel::ClusterLocal);
        assert_eq!(ExposureLevel::from_wire(9), ExposureLevel::ClusterLocal);
    }

    #[test]
    fn the_ladder_is_ordered() {
        assert!(ExposureLevel::Internal < ExposureLevel::ClusterLocal);
        assert!(ExposureLevel::ClusterLocal < ExposureLevel::ClusterExternal);
        assert!(ExposureLevel::ClusterExternal < ExposureLevel::Exposed);
    }

    #[test]
    fn a_pod_container_projects_pod_attributes() {
        let pod = PodView {
            id: "uid-1".to_string(),
            name: "c-pod".to_string(),
            namespace: "ns1".to_string(),
            ip: Some("10.1.2.3".to_string()),
            ports: vec![PortView {
                name: None,
                port: 22,
                protocol: "TCP".to_string(),
            }],
            labels: BTreeMap::from([("app".to_string(), "c-pod".to_string())]),
            containers: Vec::new(),
        };
        let container = Container::Pod(pod);
        assert_eq!(container.kind(), "pod");
        assert_eq!(container.id(), "uid-1");
        assert_eq!(container.name(), "c-pod");
        assert_eq!(container.ip(), Some("10.1.2.3"));
        assert_eq!(container.network(), "ns1");
        assert_eq!(container.ports().len(), 1);
    }
}
