pub mod container;

pub use container::{Container, ExposureLevel};

use gantry_k8s_util::error::{Error, Result};
use gantry_resources::config::{INGRESS_HOST, PROTECTED_NAMESPACES};
use gantry_resources::ingress::IngressManager;
use gantry_resources::namespace::NamespaceManager;
use gantry_resources::pod::PodManager;
use gantry_resources::service::{ServiceManager, validate_publish_information};
use gantry_resources::types::{
    CreateIngress, CreatePod, CreateService, IngressView, PublishPort, ResourceEnvelope, SavedPod,
    ServiceKind, ServiceView,
};

use std::collections::{BTreeMap, HashSet};

use tracing::info;

/// A fully validated create request for one logical container.
#[derive(Clone, Debug)]
pub struct CreateContainer {
    pub name: String,
    pub network: String,
    pub image: String,
    pub exposure_level: ExposureLevel,
    pub publish_information: Vec<PublishPort>,
    pub env: BTreeMap<String, String>,
    pub resources: ResourceEnvelope,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub container_id: String,
    pub status: String,
}

pub fn pod_name_for(container_name: &str) -> String {
    format!("{container_name}-pod")
}

pub fn service_name_for(container_name: &str) -> String {
    format!("{container_name}-service")
}

pub fn ingress_name_for(container_name: &str) -> String {
    format!("{container_name}-ingress")
}

fn service_type_for(level: ExposureLevel) -> ServiceKind {
    if level >= ExposureLevel::ClusterExternal {
        ServiceKind::LoadBalancer
    } else {
        ServiceKind::ClusterIp
    }
}

/// Composes namespaces, pods, services and ingresses into the logical
/// containers exposed over the wire. The collection of resources is a
/// whole: deletes cascade downward and empty namespaces are reclaimed.
#[derive(Clone)]
pub struct ContainerOrchestrator {
    namespaces: NamespaceManager,
    pods: PodManager,
    services: ServiceManager,
    ingresses: IngressManager,
}

impl ContainerOrchestrator {
    pub fn new(
        namespaces: NamespaceManager,
        pods: PodManager,
        services: ServiceManager,
        ingresses: IngressManager,
    ) -> Self {
        Self {
            namespaces,
            pods,
            services,
            ingresses,
        }
    }

    /// Create the smallest composite satisfying the exposure level. Port
    /// uniqueness is validated before anything is written to the cluster.
    /// The response is the last resource created.
    pub async fn create(&self, spec: &CreateContainer) -> Result<Container> {
        validate_publish_information(&spec.publish_information)?;
        self.namespaces.create(&spec.network).await?;

        let pod_name = pod_name_for(&spec.name);
        let mut target_ports: Vec<i32> = spec
            .publish_information
            .iter()
            .map(|entry| entry.target_port)
            .collect();
        target_ports.sort_unstable();
        target_ports.dedup();

        let pod = self
            .pods
            .create(&CreatePod {
                namespace: spec.network.clone(),
                name: pod_name.clone(),
                image: spec.image.clone(),
                target_ports,
                env: spec.env.clone(),
                resources: spec.resources.clone(),
            })
            .await?;
        if spec.exposure_level == ExposureLevel::Internal {
            return Ok(Container::Pod(pod));
        }

        let service = self
            .services
            .create(&CreateService {
                namespace: spec.network.clone(),
                name: service_name_for(&spec.name),
                pod_name,
                publish_information: spec.publish_information.clone(),
                service_type: service_type_for(spec.exposure_level),
            })
            .await?;
        if spec.exposure_level < ExposureLevel::Exposed {
            return Ok(Container::Service(service));
        }

        let ingress = self
            .ingresses
            .create(&CreateIngress {
                namespace: spec.network.clone(),
                name: ingress_name_for(&spec.name),
                service_name: service.name.clone(),
                host: INGRESS_HOST.clone(),
                service_ports: service.ports.clone(),
            })
            .await?;
        Ok(Container::Ingress(ingress))
    }

    /// List the representatives in a network: ingresses, then services not
    /// under an ingress, then pods not under a service. A missing network
    /// is an empty listing.
    pub async fn list(&self, network: &str) -> Result<Vec<Container>> {
        if self.namespaces.get(network).await?.is_none() {
            return Ok(Vec::new());
        }

        let ingresses = self.ingresses.list(network).await?;
        let ingress_service_ids: HashSet<String> = ingresses
            .iter()
            .flat_map(|i| i.services.iter().map(|s| s.id.clone()))
            .collect();
        let ingress_pod_ids: HashSet<String> = ingresses
            .iter()
            .flat_map(|i| i.services.iter())
            .flat_map(|s| s.pods.iter().map(|p| p.id.clone()))
            .collect();

        let services: Vec<ServiceView> = self
            .services
            .list(network)
            .await?
            .into_iter()
            .filter(|s| !ingress_service_ids.contains(&s.id))
            .collect();
        let service_pod_ids: HashSet<String> = services
            .iter()
            .flat_map(|s| s.pods.iter().map(|p| p.id.clone()))
            .collect();

        let pods = self
            .pods
            .list(network)
            .await?
            .into_iter()
            .filter(|p| !ingress_pod_ids.contains(&p.id) && !service_pod_ids.contains(&p.id));

        let mut containers: Vec<Container> =
            ingresses.into_iter().map(Container::Ingress).collect();
        containers.extend(services.into_iter().map(Container::Service));
        containers.extend(pods.map(Container::Pod));
        Ok(containers)
    }

    /// Resolve an id to its representative, scanning pods, then services,
    /// then ingresses. A missing network yields `None`; an unmatched id in
    /// an existing network is a validation failure.
    pub async fn get(&self, container_id: &str, network: &str) -> Result<Option<Container>> {
        if self.namespaces.get(network).await?.is_none() {
            return Ok(None);
        }
        match self.find(container_id, network).await? {
            Some(container) => Ok(Some(container)),
            None => Err(Error::Validation(format!(
                "cannot find container_id={container_id} in network={network}"
            ))),
        }
    }

    /// Snapshot the pods behind an id: one pod, a service's pods, or every
    /// pod behind an ingress's services. A missing network saves nothing.
    pub async fn save(&self, container_id: &str, network: &str) -> Result<Vec<SavedPod>> {
        if self.namespaces.get(network).await?.is_none() {
            return Ok(Vec::new());
        }
        match self.find(container_id, network).await? {
            Some(Container::Pod(pod)) => Ok(vec![self.pods.save(network, &pod.name).await?]),
            Some(Container::Service(service)) => {
                self.services.save_service_pods(network, &service.name).await
            }
            Some(Container::Ingress(ingress)) => {
                self.ingresses
                    .save_ingress_services(network, &ingress.name)
                    .await
            }
            None => Err(Error::Validation(format!(
                "cannot find container_id={container_id} in network={network}"
            ))),
        }
    }

    /// Delete the composite rooted at an id: a pod alone, a service with
    /// its pods, or an ingress with its services and their pods. Afterwards
    /// every unprotected namespace left without workload is reclaimed.
    pub async fn delete(&self, container_id: &str, network: &str) -> Result<DeleteOutcome> {
        if self.namespaces.get(network).await?.is_none() {
            return Ok(DeleteOutcome {
                container_id: container_id.to_string(),
                status: format!("Network: {network} does not exist."),
            });
        }
        match self.find(container_id, network).await? {
            Some(Container::Pod(pod)) => self.pods.delete(network, &pod.name).await?,
            Some(Container::Service(service)) => {
                self.delete_service_cascade(network, &service).await?
            }
            Some(Container::Ingress(ingress)) => {
                self.delete_ingress_cascade(network, &ingress).await?
            }
            None => {
                return Err(Error::Validation(format!(
                    "cannot find container_id={container_id} in network={network}"
                )));
            }
        }
        self.sweep_lingering_namespaces().await?;
        Ok(DeleteOutcome {
            container_id: container_id.to_string(),
            status: "Deleted".to_string(),
        })
    }

    async fn find(&self, container_id: &str, network: &str) -> Result<Option<Container>> {
        if let Some(pod) = self
            .pods
            .list(network)
            .await?
            .into_iter()
            .find(|p| p.id == container_id)
        {
            return Ok(Some(Container::Pod(pod)));
        }
        if let Some(service) = self
            .services
            .list(network)
            .await?
            .into_iter()
            .find(|s| s.id == container_id)
        {
            return Ok(Some(Container::Service(service)));
        }
        if let Some(ingress) = self
            .ingresses
            .list(network)
            .await?
            .into_iter()
            .find(|i| i.id == container_id)
        {
            return Ok(Some(Container::Ingress(ingress)));
        }
        Ok(None)
    }

    async fn delete_service_cascade(&self, network: &str, service: &ServiceView) -> Result<()> {
        for pod in &service.pods {
            self.pods.delete(network, &pod.name).await?;
        }
        self.services.delete(network, &service.name).await
    }

    async fn delete_ingress_cascade(&self, network: &str, ingress: &IngressView) -> Result<()> {
        for service in &ingress.services {
            self.delete_service_cascade(network, service).await?;
        }
        self.ingresses.delete(network, &ingress.name).await
    }

    /// Reclaim namespaces with no pods, services or ingresses, skipping the
    /// protected set.
    async fn sweep_lingering_namespaces(&self) -> Result<()> {
        for namespace in self.namespaces.list().await? {
            if PROTECTED_NAMESPACES.contains(&namespace.name.as_str()) {
                continue;
            }
            let pods = self.pods.list(&namespace.name).await?;
            let services = self.services.list(&namespace.name).await?;
            let ingresses = self.ingresses.list(&namespace.name).await?;
            if pods.is_empty() && services.is_empty() && ingresses.is_empty() {
                info!(namespace = %namespace.name, msg = "reclaiming lingering namespace");
                self.namespaces.delete(&namespace.name).await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composite_resource_names_derive_from_the_container_name() {
        assert_eq!(pod_name_for("c"), "c-pod");
        assert_eq!(service_name_for("c"), "c-service");
        assert_eq!(ingress_name_for("c"), "c-ingress");
    }

    #[test]
    fn service_type_follows_the_exposure_level() {
        assert_eq!(
            service_type_for(ExposureLevel::ClusterLocal),
            ServiceKind::ClusterIp
        );
        assert_eq!(
            service_type_for(ExposureLevel::ClusterExternal),
            ServiceKind::LoadBalancer
        );
        assert_eq!(
            service_type_for(ExposureLevel::Exposed),
            ServiceKind::LoadBalancer
        );
    }

    #[test]
    fn protected_namespaces_cover_the_system_set() {
        for name in ["default", "kube-system", "kube-public", "kube-node-lease"] {
            assert!(PROTECTED_NAMESPACES.contains(&name));
        }
    }
}
