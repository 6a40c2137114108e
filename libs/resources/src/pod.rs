use crate::config::{
    CONTAINER_READINESS_TIMEOUT, POD_IP_TIMEOUT, POD_RUNNING_TIMEOUT, POD_TERMINATION_TIMEOUT,
    POLL_INTERVAL,
};
use crate::types::{
    ContainerResourcesView, CreatePod, PodContainerView, PodView, PortView, ResourceEnvelope,
    SavedPod,
};

use gantry_k8s_util::client::ClusterClient;
use gantry_k8s_util::error::{Error, Result};
use gantry_k8s_util::exec::ExecClient;
use gantry_snapshot::config::{
    SNAPSHOT_DIR, SNAPSHOT_SIDECAR_IMAGE, SNAPSHOT_SIDECAR_NAME, SNAPSHOT_VOLUME_NAME,
    STATUS_SIDECAR_IMAGE, STATUS_SIDECAR_NAME,
};
use gantry_snapshot::{SaveTarget, SnapshotEngine};

use std::collections::BTreeMap;
use std::time::Duration;

use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EmptyDirVolumeSource, EnvVar, Pod, PodSpec, ResourceRequirements,
    SecurityContext, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use kube::api::{DeleteParams, ListParams, ObjectMeta, PostParams};
use kube::{Api, ResourceExt};
use tokio::time::{sleep, timeout};
use tracing::{debug, info};

/// Manage the three-container pods (main + snapshot sidecar + status
/// sidecar) that back every logical container.
#[derive(Clone)]
pub struct PodManager {
    cluster: ClusterClient,
    snapshots: SnapshotEngine<ExecClient>,
}

impl PodManager {
    pub fn new(cluster: ClusterClient, snapshots: SnapshotEngine<ExecClient>) -> Self {
        Self { cluster, snapshots }
    }

    fn api(&self, namespace: &str) -> Result<Api<Pod>> {
        Ok(Api::namespaced(self.cluster.get()?, namespace))
    }

    pub async fn list(&self, namespace: &str) -> Result<Vec<PodView>> {
        let pods = self
            .api(namespace)?
            .list(&ListParams::default())
            .await
            .map_err(|e| Error::api(format!("failed to list pods in {namespace}"), e))?;
        Ok(pods.items.iter().map(project_pod).collect())
    }

    pub async fn get(&self, namespace: &str, name: &str) -> Result<Option<PodView>> {
        let pod = self
            .api(namespace)?
            .get_opt(name)
            .await
            .map_err(|e| Error::api(format!("failed to get pod {namespace}/{name}"), e))?;
        Ok(pod.as_ref().map(project_pod))
    }

    /// Create a pod, or return it unchanged if one with that name exists.
    /// Does not return before the pod reports phase `Running` and an IP.
    pub async fn create(&self, spec: &CreatePod) -> Result<PodView> {
        if let Some(existing) = self.get(&spec.namespace, &spec.name).await? {
            return Ok(existing);
        }
        let manifest = build_pod_manifest(spec);
        self.api(&spec.namespace)?
            .create(&PostParams::default(), &manifest)
            .await
            .map_err(|e| {
                Error::api(format!("failed to create pod {}/{}", spec.namespace, spec.name), e)
            })?;
        self.await_phase_running(&spec.namespace, &spec.name).await?;
        self.await_ip(&spec.namespace, &spec.name).await?;
        self.get(&spec.namespace, &spec.name).await?.ok_or_else(|| {
            Error::Unknown(format!("pod {} disappeared after creation", spec.name))
        })
    }

    /// Snapshot a pod into a registry image. Guards, in order: the pod
    /// exists; it has exactly three containers; the container names cover
    /// the main container and both sidecars. Only then are the required
    /// containers awaited and the snapshot engine invoked.
    pub async fn save(&self, namespace: &str, name: &str) -> Result<SavedPod> {
        let pod = self.get(namespace, name).await?.ok_or_else(|| {
            Error::Validation(format!("pod {name} not found in namespace {namespace}"))
        })?;
        if pod.containers.is_empty() {
            return Err(Error::Validation(format!("pod {name} has no containers")));
        }
        if pod.containers.len() != 3 {
            return Err(Error::Validation(format!(
                "pod {name} needs a main container, a snapshot sidecar and a status sidecar"
            )));
        }
        let container_names: Vec<&str> =
            pod.containers.iter().map(|c| c.name.as_str()).collect();
        if !container_names.contains(&SNAPSHOT_SIDECAR_NAME) {
            return Err(Error::Validation(format!(
                "pod {name} is missing the {SNAPSHOT_SIDECAR_NAME} container"
            )));
        }
        if !container_names.contains(&STATUS_SIDECAR_NAME) {
            return Err(Error::Validation(format!(
                "pod {name} is missing the {STATUS_SIDECAR_NAME} container"
            )));
        }
        if !container_names.contains(&name) {
            return Err(Error::Validation(format!(
                "pod {name} is missing its main container"
            )));
        }

        self.await_containers_running(
            namespace,
            name,
            &[name, SNAPSHOT_SIDECAR_NAME],
            CONTAINER_READINESS_TIMEOUT,
        )
        .await?;

        let target = SaveTarget {
            namespace: namespace.to_string(),
            pod_name: name.to_string(),
            sidecar_name: SNAPSHOT_SIDECAR_NAME.to_string(),
        };
        let saved = self.snapshots.save_image(&target).await?;
        Ok(SavedPod {
            pod_name: name.to_string(),
            namespace_name: namespace.to_string(),
            image_name: saved.image_name,
        })
    }

    pub async fn delete(&self, namespace: &str, name: &str) -> Result<()> {
        self.api(namespace)?
            .delete(name, &DeleteParams::default())
            .await
            .map_err(|e| Error::api(format!("failed to delete pod {namespace}/{name}"), e))?;
        self.await_termination(namespace, name).await
    }

    async fn await_phase_running(&self, namespace: &str, name: &str) -> Result<()> {
        let api = self.api(namespace)?;
        timeout(POD_RUNNING_TIMEOUT, async {
            loop {
                // 404s are expected while the pod is being scheduled
                if let Some(pod) = api
                    .get_opt(name)
                    .await
                    .map_err(|e| Error::api(format!("failed to poll pod {name}"), e))?
                {
                    let phase = pod.status.as_ref().and_then(|s| s.phase.clone());
                    debug!(pod = name, ?phase, msg = "polling pod phase");
                    match phase.as_deref() {
                        Some("Running") => return Ok(()),
                        Some(phase @ ("Failed" | "Unknown")) => {
                            return Err(Error::Unknown(format!(
                                "pod {name} entered {phase} state"
                            )));
                        }
                        _ => {}
                    }
                }
                sleep(POLL_INTERVAL).await;
            }
        })
        .await
        .map_err(|_| {
            Error::Timeout(format!(
                "pod {name} did not reach Running within {POD_RUNNING_TIMEOUT:?}"
            ))
        })?
    }

    async fn await_ip(&self, namespace: &str, name: &str) -> Result<String> {
        let api = self.api(namespace)?;
        timeout(POD_IP_TIMEOUT, async {
            loop {
                if let Some(pod) = api
                    .get_opt(name)
                    .await
                    .map_err(|e| Error::api(format!("failed to poll pod {name}"), e))?
                {
                    if let Some(ip) = pod.status.as_ref().and_then(|s| s.pod_ip.clone()) {
                        info!(pod = name, %ip, msg = "pod ip assigned");
                        return Ok(ip);
                    }
                }
                sleep(POLL_INTERVAL).await;
            }
        })
        .await
        .map_err(|_| {
            Error::Timeout(format!(
                "pod {name} did not report an ip within {POD_IP_TIMEOUT:?}"
            ))
        })?
    }

    /// Wait until all `required` containers report a running state.
    async fn await_containers_running(
        &self,
        namespace: &str,
        name: &str,
        required: &[&str],
        deadline: Duration,
    ) -> Result<()> {
        let api = self.api(namespace)?;
        timeout(deadline, async {
            loop {
                if let Some(pod) = api
                    .get_opt(name)
                    .await
                    .map_err(|e| Error::api(format!("failed to poll pod {name}"), e))?
                {
                    if pod.status.as_ref().and_then(|s| s.phase.as_deref()) == Some("Running") {
                        let statuses = pod
                            .status
                            .as_ref()
                            .and_then(|s| s.container_statuses.as_ref());
                        let running = |container: &str| {
                            statuses.is_some_and(|statuses| {
                                statuses.iter().any(|s| {
                                    s.name == container
                                        && s.state
                                            .as_ref()
                                            .is_some_and(|state| state.running.is_some())
                                })
                            })
                        };
                        if required.iter().all(|c| running(c)) {
                            info!(pod = name, msg = "all required containers are running");
                            return Ok(());
                        }
                    }
                }
                sleep(POLL_INTERVAL).await;
            }
        })
        .await
        .map_err(|_| {
            Error::Timeout(format!(
                "containers {required:?} of pod {name} were not running within {deadline:?}"
            ))
        })?
    }

    async fn await_termination(&self, namespace: &str, name: &str) -> Result<()> {
        timeout(POD_TERMINATION_TIMEOUT, async {
            loop {
                if self.get(namespace, name).await?.is_none() {
                    debug!(pod = name, msg = "pod deleted");
                    return Ok(());
                }
                sleep(POLL_INTERVAL).await;
            }
        })
        .await
        .map_err(|_| {
            Error::Timeout(format!(
                "pod {name} was not deleted within {POD_TERMINATION_TIMEOUT:?}"
            ))
        })?
    }
}

/// Build the fixed three-container pod manifest: the user's main container,
/// the snapshot sidecar and the status sidecar, all privileged, the first
/// two sharing the snapshot EmptyDir volume.
pub(crate) fn build_pod_manifest(spec: &CreatePod) -> Pod {
    let env: Vec<EnvVar> = spec
        .env
        .iter()
        .map(|(name, value)| EnvVar {
            name: name.clone(),
            value: Some(value.clone()),
            value_from: None,
        })
        .collect();
    let ports: Vec<ContainerPort> = spec
        .target_ports
        .iter()
        .map(|&port| ContainerPort {
            container_port: port,
            ..ContainerPort::default()
        })
        .collect();
    let privileged = SecurityContext {
        privileged: Some(true),
        ..SecurityContext::default()
    };
    let snapshot_mount = VolumeMount {
        name: SNAPSHOT_VOLUME_NAME.to_string(),
        mount_path: SNAPSHOT_DIR.to_string(),
        ..VolumeMount::default()
    };
    let resources = build_resource_requirements(&spec.resources);

    let containers = vec![
        Container {
            name: spec.name.clone(),
            image: Some(spec.image.clone()),
            ports: Some(ports),
            env: Some(env.clone()),
            security_context: Some(privileged.clone()),
            volume_mounts: Some(vec![snapshot_mount.clone()]),
            resources: resources.clone(),
            ..Container::default()
        },
        Container {
            name: SNAPSHOT_SIDECAR_NAME.to_string(),
            image: Some(SNAPSHOT_SIDECAR_IMAGE.clone()),
            security_context: Some(privileged.clone()),
            volume_mounts: Some(vec![snapshot_mount]),
            resources: resources.clone(),
            ..Container::default()
        },
        Container {
            name: STATUS_SIDECAR_NAME.to_string(),
            image: Some(STATUS_SIDECAR_IMAGE.clone()),
            env: Some(env),
            security_context: Some(privileged),
            resources,
            ..Container::default()
        },
    ];

    let size_limit = (!spec.resources.snapshot_size_limit.is_empty())
        .then(|| Quantity(spec.resources.snapshot_size_limit.clone()));
    let volumes = vec![Volume {
        name: SNAPSHOT_VOLUME_NAME.to_string(),
        empty_dir: Some(EmptyDirVolumeSource {
            medium: None,
            size_limit,
        }),
        ..Volume::default()
    }];

    Pod {
        metadata: ObjectMeta {
            name: Some(spec.name.clone()),
            labels: Some(BTreeMap::from([("app".to_string(), spec.name.clone())])),
            annotations: Some(BTreeMap::from([
                ("nginx.org/websocket-services".to_string(), spec.name.clone()),
                (
                    "nginx.ingress.kubernetes.io/proxy-read-timeout".to_string(),
                    "3600".to_string(),
                ),
                (
                    "nginx.ingress.kubernetes.io/proxy-send-timeout".to_string(),
                    "3600".to_string(),
                ),
            ])),
            ..ObjectMeta::default()
        },
        spec: Some(PodSpec {
            containers,
            volumes: Some(volumes),
            ..PodSpec::default()
        }),
        ..Pod::default()
    }
}

enum Bucket {
    Requests,
    Limits,
}

/// Map the logical envelope onto Kubernetes requests/limits. Empty strings
/// are unset; `snapshot_size_limit` is volume-level and handled separately.
fn build_resource_requirements(envelope: &ResourceEnvelope) -> Option<ResourceRequirements> {
    let table: [(&str, Bucket, &str); 6] = [
        (&envelope.cpu_request, Bucket::Requests, "cpu"),
        (&envelope.cpu_limit, Bucket::Limits, "cpu"),
        (&envelope.memory_request, Bucket::Requests, "memory"),
        (&envelope.memory_limit, Bucket::Limits, "memory"),
        (&envelope.ephemeral_request, Bucket::Requests, "ephemeral-storage"),
        (&envelope.ephemeral_limit, Bucket::Limits, "ephemeral-storage"),
    ];

    let mut requests = BTreeMap::new();
    let mut limits = BTreeMap::new();
    for (value, bucket, key) in table {
        if value.is_empty() {
            continue;
        }
        let quantity = Quantity(value.to_string());
        match bucket {
            Bucket::Requests => requests.insert(key.to_string(), quantity),
            Bucket::Limits => limits.insert(key.to_string(), quantity),
        };
    }

    if requests.is_empty() && limits.is_empty() {
        return None;
    }
    Some(ResourceRequirements {
        requests: (!requests.is_empty()).then_some(requests),
        limits: (!limits.is_empty()).then_some(limits),
        ..ResourceRequirements::default()
    })
}

pub(crate) fn project_pod(pod: &Pod) -> PodView {
    let spec = pod.spec.clone().unwrap_or_default();

    // snapshot_size_limit is a property of the EmptyDir volume, not a
    // container resource; the first size-limited EmptyDir wins
    let snapshot_size_limit = spec.volumes.as_ref().and_then(|volumes| {
        volumes.iter().find_map(|v| {
            v.empty_dir
                .as_ref()
                .and_then(|e| e.size_limit.as_ref())
                .map(|q| q.0.clone())
        })
    });

    PodView {
        id: pod.uid().unwrap_or_default(),
        name: pod.name_any(),
        namespace: pod.namespace().unwrap_or_default(),
        ip: pod.status.as_ref().and_then(|s| s.pod_ip.clone()),
        ports: spec.containers.iter().flat_map(container_ports).collect(),
        labels: pod.labels().clone(),
        containers: spec
            .containers
            .iter()
            .map(|c| project_container(c, snapshot_size_limit.clone()))
            .collect(),
    }
}

fn project_container(container: &Container, snapshot_size_limit: Option<String>) -> PodContainerView {
    let resources = container.resources.clone().unwrap_or_default();
    let requests = resources.requests.unwrap_or_default();
    let limits = resources.limits.unwrap_or_default();
    let value = |bucket: &BTreeMap<String, Quantity>, key: &str| {
        bucket.get(key).map(|q| q.0.clone())
    };
    PodContainerView {
        name: container.name.clone(),
        image: container.image.clone(),
        ports: container_ports(container),
        resources: ContainerResourcesView {
            cpu_request: value(&requests, "cpu"),
            cpu_limit: value(&limits, "cpu"),
            memory_request: value(&requests, "memory"),
            memory_limit: value(&limits, "memory"),
            ephemeral_request: value(&requests, "ephemeral-storage"),
            ephemeral_limit: value(&limits, "ephemeral-storage"),
            snapshot_size_limit,
        },
    }
}

fn container_ports(container: &Container) -> Vec<PortView> {
    container
        .ports
        .iter()
        .flatten()
        .map(|p| PortView {
            name: p.name.clone(),
            port: p.container_port,
            protocol: p.protocol.clone().unwrap_or_else(|| "TCP".to_string()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_spec() -> CreatePod {
        CreatePod {
            namespace: "ns1".to_string(),
            name: "c-pod".to_string(),
            image: "zim95/ssh_ubuntu:latest".to_string(),
            target_ports: vec![22],
            env: BTreeMap::from([("SSH_USER".to_string(), "dev".to_string())]),
            resources: ResourceEnvelope {
                cpu_request: "100m".to_string(),
                cpu_limit: "1".to_string(),
                memory_request: "256Mi".to_string(),
                memory_limit: "1Gi".to_string(),
                ephemeral_request: String::new(),
                ephemeral_limit: String::new(),
                snapshot_size_limit: "2Gi".to_string(),
            },
        }
    }

    #[test]
    fn manifest_has_three_privileged_containers_in_fixed_order() {
        let pod = build_pod_manifest(&create_spec());
        let spec = pod.spec.expect("pod spec");
        let names: Vec<&str> = spec.containers.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["c-pod", SNAPSHOT_SIDECAR_NAME, STATUS_SIDECAR_NAME]);
        for container in &spec.containers {
            let privileged = container
                .security_context
                .as_ref()
                .and_then(|s| s.privileged);
            assert_eq!(privileged, Some(true), "{} must be privileged", container.name);
        }
    }

    #[test]
    fn main_and_snapshot_sidecar_share_the_snapshot_volume() {
        let pod = build_pod_manifest(&create_spec());
        let spec = pod.spec.expect("pod spec");
        let mounts = |i: usize| {
            spec.containers[i]
                .volume_mounts
                .clone()
                .unwrap_or_default()
        };
        assert_eq!(mounts(0)[0].mount_path, SNAPSHOT_DIR);
        assert_eq!(mounts(1)[0].mount_path, SNAPSHOT_DIR);
        assert!(spec.containers[2].volume_mounts.is_none());

        let volumes = spec.volumes.expect("volumes");
        let volume = &volumes[0];
        assert_eq!(volume.name, SNAPSHOT_VOLUME_NAME);
        let size = volume
            .empty_dir
            .as_ref()
            .and_then(|e| e.size_limit.as_ref())
            .map(|q| q.0.as_str());
        assert_eq!(size, Some("2Gi"));
    }

    #[test]
    fn manifest_carries_app_label_and_websocket_annotations() {
        let pod = build_pod_manifest(&create_spec());
        let labels = pod.metadata.labels.expect("labels");
        assert_eq!(labels.get("app").map(String::as_str), Some("c-pod"));
        let annotations = pod.metadata.annotations.expect("annotations");
        assert_eq!(
            annotations.get("nginx.org/websocket-services").map(String::as_str),
            Some("c-pod")
        );
        assert_eq!(
            annotations
                .get("nginx.ingress.kubernetes.io/proxy-read-timeout")
                .map(String::as_str),
            Some("3600")
        );
    }

    #[test]
    fn resource_mapping_omits_empty_fields() {
        let requirements =
            build_resource_requirements(&create_spec().resources).expect("requirements");
        let requests = requirements.requests.expect("requests");
        let limits = requirements.limits.expect("limits");
        assert_eq!(requests.get("cpu"), Some(&Quantity("100m".to_string())));
        assert_eq!(requests.get("memory"), Some(&Quantity("256Mi".to_string())));
        assert!(!requests.contains_key("ephemeral-storage"));
        assert_eq!(limits.get("cpu"), Some(&Quantity("1".to_string())));
        assert!(!limits.contains_key("ephemeral-storage"));
    }

    #[test]
    fn fully_unset_envelope_maps_to_no_requirements() {
        assert!(build_resource_requirements(&ResourceEnvelope::default()).is_none());
    }

    #[test]
    fn projection_derives_snapshot_size_limit_from_the_volume() {
        let pod = build_pod_manifest(&create_spec());
        let view = project_pod(&pod);
        assert_eq!(view.name, "c-pod");
        assert_eq!(view.containers.len(), 3);
        for container in &view.containers {
            assert_eq!(container.resources.snapshot_size_limit.as_deref(), Some("2Gi"));
        }
        // sidecars carry no ports; the pod's ports are the main container's
        assert_eq!(view.ports.len(), 1);
        assert_eq!(view.ports[0].port, 22);
        assert_eq!(view.ports[0].protocol, "TCP");
    }
}
