use crate::config::{INGRESS_ADDRESS_TIMEOUT, INGRESS_TERMINATION_TIMEOUT, POLL_INTERVAL};
use crate::service::ServiceManager;
use crate::types::{CreateIngress, IngressView, PortView, SavedPod, ServiceView};

use gantry_k8s_util::client::ClusterClient;
use gantry_k8s_util::error::{Error, Result};

use std::collections::BTreeMap;

use k8s_openapi::api::networking::v1::{
    HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule,
    IngressServiceBackend, IngressSpec, ServiceBackendPort,
};
use kube::api::{DeleteParams, ListParams, ObjectMeta, PostParams};
use kube::{Api, ResourceExt};
use tokio::time::{sleep, timeout};
use tracing::{debug, info};

/// Manage the nginx ingresses that expose services outside the cluster.
#[derive(Clone)]
pub struct IngressManager {
    cluster: ClusterClient,
    services: ServiceManager,
}

impl IngressManager {
    pub fn new(cluster: ClusterClient, services: ServiceManager) -> Self {
        Self { cluster, services }
    }

    fn api(&self, namespace: &str) -> Result<Api<Ingress>> {
        Ok(Api::namespaced(self.cluster.get()?, namespace))
    }

    pub async fn list(&self, namespace: &str) -> Result<Vec<IngressView>> {
        let ingresses = self
            .api(namespace)?
            .list(&ListParams::default())
            .await
            .map_err(|e| Error::api(format!("failed to list ingresses in {namespace}"), e))?;
        let mut views = Vec::with_capacity(ingresses.items.len());
        for ingress in &ingresses.items {
            views.push(self.project(ingress).await?);
        }
        Ok(views)
    }

    pub async fn get(&self, namespace: &str, name: &str) -> Result<Option<IngressView>> {
        let ingress = self
            .api(namespace)?
            .get_opt(name)
            .await
            .map_err(|e| Error::api(format!("failed to get ingress {namespace}/{name}"), e))?;
        match ingress {
            Some(ingress) => Ok(Some(self.project(&ingress).await?)),
            None => Ok(None),
        }
    }

    /// Create an ingress, or return it unchanged if one with that name
    /// exists. Does not return before the load balancer publishes an
    /// address.
    pub async fn create(&self, spec: &CreateIngress) -> Result<IngressView> {
        if let Some(existing) = self.get(&spec.namespace, &spec.name).await? {
            return Ok(existing);
        }
        let manifest = build_ingress_manifest(spec);
        self.api(&spec.namespace)?
            .create(&PostParams::default(), &manifest)
            .await
            .map_err(|e| {
                Error::api(
                    format!("failed to create ingress {}/{}", spec.namespace, spec.name),
                    e,
                )
            })?;
        self.await_address(&spec.namespace, &spec.name).await?;
        self.get(&spec.namespace, &spec.name).await?.ok_or_else(|| {
            Error::Unknown(format!("ingress {} disappeared after creation", spec.name))
        })
    }

    /// Save the pods of every service this ingress routes to, flattening
    /// the per-service results.
    pub async fn save_ingress_services(&self, namespace: &str, name: &str) -> Result<Vec<SavedPod>> {
        let ingress = self.get(namespace, name).await?.ok_or_else(|| {
            Error::Validation(format!("ingress {name} not found in namespace {namespace}"))
        })?;
        let mut saved = Vec::new();
        for service in &ingress.services {
            saved.extend(
                self.services
                    .save_service_pods(namespace, &service.name)
                    .await?,
            );
        }
        Ok(saved)
    }

    pub async fn delete(&self, namespace: &str, name: &str) -> Result<()> {
        self.api(namespace)?
            .delete(name, &DeleteParams::default())
            .await
            .map_err(|e| Error::api(format!("failed to delete ingress {namespace}/{name}"), e))?;
        self.await_termination(namespace, name).await
    }

    async fn project(&self, ingress: &Ingress) -> Result<IngressView> {
        let namespace = ingress.namespace().unwrap_or_default();
        let mut services: Vec<ServiceView> = Vec::new();
        for service_name in associated_service_names(ingress) {
            if let Some(service) = self.services.get(&namespace, &service_name).await? {
                services.push(service);
            }
        }
        Ok(IngressView {
            id: ingress.uid().unwrap_or_default(),
            name: ingress.name_any(),
            namespace,
            address: address_of(ingress),
            ports: entry_ports(),
            services,
        })
    }

    async fn await_address(&self, namespace: &str, name: &str) -> Result<String> {
        let api = self.api(namespace)?;
        timeout(INGRESS_ADDRESS_TIMEOUT, async {
            loop {
                if let Some(ingress) = api
                    .get_opt(name)
                    .await
                    .map_err(|e| Error::api(format!("failed to poll ingress {name}"), e))?
                {
                    if let Some(address) = address_of(&ingress) {
                        info!(ingress = name, %address, msg = "ingress address published");
                        return Ok(address);
                    }
                }
                sleep(POLL_INTERVAL).await;
            }
        })
        .await
        .map_err(|_| {
            Error::Timeout(format!(
                "ingress {name} did not publish an address within {INGRESS_ADDRESS_TIMEOUT:?}"
            ))
        })?
    }

    async fn await_termination(&self, namespace: &str, name: &str) -> Result<()> {
        let api = self.api(namespace)?;
        timeout(INGRESS_TERMINATION_TIMEOUT, async {
            loop {
                let ingress = api
                    .get_opt(name)
                    .await
                    .map_err(|e| Error::api(format!("failed to poll ingress {name}"), e))?;
                if ingress.is_none() {
                    debug!(ingress = name, msg = "ingress deleted");
                    return Ok(());
                }
                sleep(POLL_INTERVAL).await;
            }
        })
        .await
        .map_err(|_| {
            Error::Timeout(format!(
                "ingress {name} was not deleted within {INGRESS_TERMINATION_TIMEOUT:?}"
            ))
        })?
    }
}

/// Every ingress fronts the fixed http/https entry ports.
fn entry_ports() -> Vec<PortView> {
    vec![
        PortView {
            name: Some("http".to_string()),
            port: 80,
            protocol: "TCP".to_string(),
        },
        PortView {
            name: Some("https".to_string()),
            port: 443,
            protocol: "TCP".to_string(),
        },
    ]
}

/// Load-balancer IP, falling back to hostname.
pub(crate) fn address_of(ingress: &Ingress) -> Option<String> {
    ingress
        .status
        .as_ref()
        .and_then(|s| s.load_balancer.as_ref())
        .and_then(|lb| lb.ingress.as_ref())
        .and_then(|entries| entries.first())
        .and_then(|entry| entry.ip.clone().or_else(|| entry.hostname.clone()))
}

/// Unique backend service names across the rule paths, in rule order.
pub(crate) fn associated_service_names(ingress: &Ingress) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    let rules = ingress
        .spec
        .as_ref()
        .and_then(|s| s.rules.as_ref())
        .map(Vec::as_slice)
        .unwrap_or_default();
    for rule in rules {
        let paths = rule.http.as_ref().map(|h| h.paths.as_slice()).unwrap_or_default();
        for path in paths {
            if let Some(service) = path.backend.service.as_ref() {
                if !names.contains(&service.name) {
                    names.push(service.name.clone());
                }
            }
        }
    }
    names
}

/// One rule keyed by host; one path per service port, routing
/// `/<prefix>/port-<port>` to the backing service, where the prefix is the
/// first hyphen-separated token of the ingress name.
fn build_ingress_manifest(spec: &CreateIngress) -> Ingress {
    let prefix = spec.name.split('-').next().unwrap_or(spec.name.as_str());
    let paths: Vec<HTTPIngressPath> = spec
        .service_ports
        .iter()
        .map(|port| HTTPIngressPath {
            path: Some(format!("/{prefix}/port-{}", port.port)),
            path_type: "Prefix".to_string(),
            backend: IngressBackend {
                service: Some(IngressServiceBackend {
                    name: spec.service_name.clone(),
                    port: Some(ServiceBackendPort {
                        number: Some(port.port),
                        ..ServiceBackendPort::default()
                    }),
                }),
                ..IngressBackend::default()
            },
        })
        .collect();

    Ingress {
        metadata: ObjectMeta {
            name: Some(spec.name.clone()),
            namespace: Some(spec.namespace.clone()),
            annotations: Some(BTreeMap::from([
                (
                    "nginx.ingress.kubernetes.io/rewrite-target".to_string(),
                    "/".to_string(),
                ),
                (
                    "nginx.ingress.kubernetes.io/proxy-read-timeout".to_string(),
                    "3600".to_string(),
                ),
                (
                    "nginx.ingress.kubernetes.io/proxy-send-timeout".to_string(),
                    "3600".to_string(),
                ),
                (
                    "nginx.ingress.kubernetes.io/proxy-connect-timeout".to_string(),
                    "3600".to_string(),
                ),
                (
                    "nginx.ingress.kubernetes.io/websocket-services".to_string(),
                    spec.service_name.clone(),
                ),
            ])),
            ..ObjectMeta::default()
        },
        spec: Some(IngressSpec {
            ingress_class_name: Some("nginx".to_string()),
            rules: Some(vec![IngressRule {
                host: Some(spec.host.clone()),
                http: Some(HTTPIngressRuleValue { paths }),
            }]),
            ..IngressSpec::default()
        }),
        ..Ingress::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use k8s_openapi::api::networking::v1::{
        IngressLoadBalancerIngress, IngressLoadBalancerStatus, IngressStatus,
    };

    fn create_spec() -> CreateIngress {
        CreateIngress {
            namespace: "ns1".to_string(),
            name: "c-ingress".to_string(),
            service_name: "c-service".to_string(),
            host: "gantry.local".to_string(),
            service_ports: vec![
                PortView {
                    name: Some("port-2222".to_string()),
                    port: 2222,
                    protocol: "TCP".to_string(),
                },
                PortView {
                    name: Some("port-8080".to_string()),
                    port: 8080,
                    protocol: "TCP".to_string(),
                },
            ],
        }
    }

    #[test]
    fn manifest_routes_one_path_per_service_port() {
        let ingress = build_ingress_manifest(&create_spec());
        let spec = ingress.spec.expect("ingress spec");
        assert_eq!(spec.ingress_class_name.as_deref(), Some("nginx"));
        let rules = spec.rules.expect("rules");
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].host.as_deref(), Some("gantry.local"));

        let paths = &rules[0].http.as_ref().expect("http").paths;
        let path_values: Vec<&str> = paths.iter().filter_map(|p| p.path.as_deref()).collect();
        assert_eq!(path_values, ["/c/port-2222", "/c/port-8080"]);
        for path in paths {
            assert_eq!(path.path_type, "Prefix");
            let backend = path.backend.service.as_ref().expect("service backend");
            assert_eq!(backend.name, "c-service");
        }
    }

    #[test]
    fn manifest_enables_rewrite_and_websocket_annotations() {
        let ingress = build_ingress_manifest(&create_spec());
        let annotations = ingress.metadata.annotations.expect("annotations");
        assert_eq!(
            annotations
                .get("nginx.ingress.kubernetes.io/rewrite-target")
                .map(String::as_str),
            Some("/")
        );
        assert_eq!(
            annotations
                .get("nginx.ingress.kubernetes.io/websocket-services")
                .map(String::as_str),
            Some("c-service")
        );
        assert_eq!(
            annotations
                .get("nginx.ingress.kubernetes.io/proxy-connect-timeout")
                .map(String::as_str),
            Some("3600")
        );
    }

    #[test]
    fn address_prefers_ip_over_hostname() {
        let mut ingress = build_ingress_manifest(&create_spec());
        assert_eq!(address_of(&ingress), None);

        ingress.status = Some(IngressStatus {
            load_balancer: Some(IngressLoadBalancerStatus {
                ingress: Some(vec![IngressLoadBalancerIngress {
                    ip: Some("10.0.0.7".to_string()),
                    hostname: Some("lb.example.com".to_string()),
                    ..IngressLoadBalancerIngress::default()
                }]),
            }),
        });
        assert_eq!(address_of(&ingress).as_deref(), Some("10.0.0.7"));

        ingress.status = Some(IngressStatus {
            load_balancer: Some(IngressLoadBalancerStatus {
                ingress: Some(vec![IngressLoadBalancerIngress {
                    ip: None,
                    hostname: Some("lb.example.com".to_string()),
                    ..IngressLoadBalancerIngress::default()
                }]),
            }),
        });
        assert_eq!(address_of(&ingress).as_deref(), Some("lb.example.com"));
    }

    #[test]
    fn associated_services_are_unique_backend_names() {
        let ingress = build_ingress_manifest(&create_spec());
        assert_eq!(associated_service_names(&ingress), ["c-service"]);
    }

    #[test]
    fn fixed_entry_ports_are_http_and_https() {
        let ports = entry_ports();
        assert_eq!(ports.len(), 2);
        assert_eq!((ports[0].port, ports[1].port), (80, 443));
    }
}
