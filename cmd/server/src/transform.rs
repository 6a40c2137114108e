//! Input and output transformers of the request façade: wire messages in,
//! typed commands out, and the single projection from the logical container
//! back to the wire shape. No business logic lives here.

use gantry_k8s_util::error::Error;
use gantry_orchestrator::{Container, CreateContainer, ExposureLevel};
use gantry_proto as pb;
use gantry_resources::types::{
    ContainerResourcesView, PodView, PublishPort, ResourceEnvelope, SavedPod, ServiceView,
};

use std::collections::BTreeMap;

use tonic::Status;

fn or_default(value: String, default: &str) -> String {
    if value.is_empty() {
        default.to_string()
    } else {
        value
    }
}

pub fn create_command(request: pb::CreateContainerRequest) -> CreateContainer {
    let publish_information = request
        .publish_information
        .iter()
        .map(|entry| PublishPort {
            publish_port: entry.publish_port,
            target_port: entry.target_port,
            protocol: or_default(entry.protocol.clone(), "TCP"),
            // 0 is the wire default for an unset integer field
            node_port: (entry.node_port != 0).then_some(entry.node_port),
        })
        .collect();

    let resources = match request.resource_requirements {
        Some(envelope) => ResourceEnvelope {
            cpu_request: or_default(envelope.cpu_request, "100m"),
            cpu_limit: or_default(envelope.cpu_limit, "1"),
            memory_request: or_default(envelope.memory_request, "256Mi"),
            memory_limit: or_default(envelope.memory_limit, "1Gi"),
            ephemeral_request: or_default(envelope.ephemeral_request, "512Mi"),
            ephemeral_limit: or_default(envelope.ephemeral_limit, "1Gi"),
            snapshot_size_limit: or_default(envelope.snapshot_size_limit, "2Gi"),
        },
        None => ResourceEnvelope::default(),
    };

    CreateContainer {
        name: request.container_name,
        network: request.network_name,
        image: request.image_name,
        exposure_level: ExposureLevel::from_wire(request.exposure_level),
        publish_information,
        env: request
            .environment_variables
            .into_iter()
            .collect::<BTreeMap<String, String>>(),
        resources,
    }
}

pub fn container_response(container: &Container) -> pb::ContainerResponse {
    pb::ContainerResponse {
        container_id: container.id().to_string(),
        container_name: container.name().to_string(),
        container_ip: container.ip().unwrap_or_default().to_string(),
        container_network: container.network().to_string(),
        ports: container
            .ports()
            .iter()
            .map(|port| pb::PortInformation {
                name: port.name.clone().unwrap_or_default(),
                container_port: port.port,
                protocol: port.protocol.clone(),
            })
            .collect(),
        associated_resources: match container {
            Container::Pod(pod) => pod_children(pod),
            Container::Service(service) => service.pods.iter().map(pod_resource).collect(),
            Container::Ingress(ingress) => {
                ingress.services.iter().map(service_resource).collect()
            }
        },
    }
}

pub fn saved_pod_response(saved: &SavedPod) -> pb::SavedPodResponse {
    pb::SavedPodResponse {
        pod_name: saved.pod_name.clone(),
        namespace_name: saved.namespace_name.clone(),
        image_name: saved.image_name.clone(),
    }
}

fn pod_children(pod: &PodView) -> Vec<pb::AssociatedResource> {
    pod.containers
        .iter()
        .map(|container| pb::AssociatedResource {
            resource_name: container.name.clone(),
            resource_type: "pod_container".to_string(),
            container_resources: Some(resources_message(&container.resources)),
            associated_resources: Vec::new(),
        })
        .collect()
}

fn pod_resource(pod: &PodView) -> pb::AssociatedResource {
    pb::AssociatedResource {
        resource_name: pod.name.clone(),
        resource_type: "pod".to_string(),
        container_resources: None,
        associated_resources: pod_children(pod),
    }
}

fn service_resource(service: &ServiceView) -> pb::AssociatedResource {
    pb::AssociatedResource {
        resource_name: service.name.clone(),
        resource_type: "service".to_string(),
        container_resources: None,
        associated_resources: service.pods.iter().map(pod_resource).collect(),
    }
}

fn resources_message(resources: &ContainerResourcesView) -> pb::ContainerResources {
    pb::ContainerResources {
        cpu_request: resources.cpu_request.clone().unwrap_or_default(),
        cpu_limit: resources.cpu_limit.clone().unwrap_or_default(),
        memory_request: resources.memory_request.clone().unwrap_or_default(),
        memory_limit: resources.memory_limit.clone().unwrap_or_default(),
        ephemeral_request: resources.ephemeral_request.clone().unwrap_or_default(),
        ephemeral_limit: resources.ephemeral_limit.clone().unwrap_or_default(),
        snapshot_size_limit: resources.snapshot_size_limit.clone().unwrap_or_default(),
    }
}

/// Map the failure taxonomy to wire status codes. The original low-level
/// detail travels in the status message.
pub fn status_from_error(error: Error) -> Status {
    let message = error.to_string();
    match error {
        Error::UnsupportedRuntimeEnvironment(_) | Error::Config(_) => {
            Status::failed_precondition(message)
        }
        Error::Api(_, _) => Status::internal(message),
        Error::Timeout(_) => Status::deadline_exceeded(message),
        Error::Validation(_) => Status::invalid_argument(message),
        Error::Unknown(_) => Status::unknown(message),
    }
}
