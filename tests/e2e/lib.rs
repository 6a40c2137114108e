#[cfg(all(test, feature = "e2e-test"))]
mod test {
    use gantry_k8s_util::client::ClusterClient;
    use gantry_k8s_util::error::Error;
    use gantry_k8s_util::exec::ExecClient;
    use gantry_orchestrator::{Container, ContainerOrchestrator, CreateContainer, ExposureLevel};
    use gantry_resources::ingress::IngressManager;
    use gantry_resources::namespace::NamespaceManager;
    use gantry_resources::pod::PodManager;
    use gantry_resources::service::ServiceManager;
    use gantry_resources::types::{PublishPort, ResourceEnvelope};
    use gantry_snapshot::SnapshotEngine;

    use std::collections::BTreeMap;

    use kube::Client;
    use uuid::Uuid;

    const TEST_IMAGE: &str = "zim95/ssh_ubuntu:latest";

    struct Harness {
        orchestrator: ContainerOrchestrator,
        namespaces: NamespaceManager,
        pods: PodManager,
        services: ServiceManager,
        ingresses: IngressManager,
        network: String,
    }

    async fn setup() -> Harness {
        let client = Client::try_default()
            .await
            .expect("kube client from kubeconfig");
        let cluster = ClusterClient::from_client(client);
        let snapshots = SnapshotEngine::new(ExecClient::new(cluster.clone()));
        let pods = PodManager::new(cluster.clone(), snapshots);
        let services = ServiceManager::new(cluster.clone(), pods.clone());
        let ingresses = IngressManager::new(cluster.clone(), services.clone());
        let namespaces = NamespaceManager::new(cluster);
        let orchestrator = ContainerOrchestrator::new(
            namespaces.clone(),
            pods.clone(),
            services.clone(),
            ingresses.clone(),
        );
        Harness {
            orchestrator,
            namespaces,
            pods,
            services,
            ingresses,
            network: format!("e2e-{}", Uuid::new_v4().simple()),
        }
    }

    fn create_spec(harness: &Harness, level: ExposureLevel) -> CreateContainer {
        CreateContainer {
            name: "c".to_string(),
            network: harness.network.clone(),
            image: TEST_IMAGE.to_string(),
            exposure_level: level,
            publish_information: vec![PublishPort {
                publish_port: 2222,
                target_port: 22,
                protocol: "TCP".to_string(),
                node_port: None,
            }],
            env: BTreeMap::new(),
            resources: ResourceEnvelope::default(),
        }
    }

    async fn resource_counts(harness: &Harness) -> (usize, usize, usize) {
        let pods = harness.pods.list(&harness.network).await.unwrap_or_default();
        let services = harness
            .services
            .list(&harness.network)
            .await
            .unwrap_or_default();
        let ingresses = harness
            .ingresses
            .list(&harness.network)
            .await
            .unwrap_or_default();
        (pods.len(), services.len(), ingresses.len())
    }

    #[tokio::test]
    async fn internal_create_list_delete_roundtrip() {
        let harness = setup().await;
        let container = harness
            .orchestrator
            .create(&create_spec(&harness, ExposureLevel::Internal))
            .await
            .expect("internal create");

        assert_eq!(container.name(), "c-pod");
        assert_eq!(container.network(), harness.network);
        assert_eq!(container.ports().len(), 1);
        assert_eq!(container.ports()[0].port, 22);
        assert_eq!(resource_counts(&harness).await, (1, 0, 0));

        let listed = harness.orchestrator.list(&harness.network).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id(), container.id());

        let fetched = harness
            .orchestrator
            .get(container.id(), &harness.network)
            .await
            .unwrap()
            .expect("container must be found");
        assert_eq!(fetched.name(), "c-pod");

        let outcome = harness
            .orchestrator
            .delete(container.id(), &harness.network)
            .await
            .expect("delete");
        assert_eq!(outcome.status, "Deleted");
        assert_eq!(resource_counts(&harness).await, (0, 0, 0));

        // the emptied namespace is reclaimed by the lingering sweep
        assert!(harness.namespaces.get(&harness.network).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn exposed_create_materializes_the_full_composite() {
        let harness = setup().await;
        let container = harness
            .orchestrator
            .create(&create_spec(&harness, ExposureLevel::Exposed))
            .await
            .expect("exposed create");

        assert_eq!(container.name(), "c-ingress");
        let ports: Vec<i32> = container.ports().iter().map(|p| p.port).collect();
        assert_eq!(ports, [80, 443]);
        assert_eq!(resource_counts(&harness).await, (1, 1, 1));

        harness
            .orchestrator
            .delete(container.id(), &harness.network)
            .await
            .expect("cascade delete");
        assert_eq!(resource_counts(&harness).await, (0, 0, 0));
        assert!(harness.namespaces.get(&harness.network).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_create_is_idempotent() {
        let harness = setup().await;
        let spec = create_spec(&harness, ExposureLevel::Exposed);
        let first = harness.orchestrator.create(&spec).await.expect("first create");
        let second = harness.orchestrator.create(&spec).await.expect("second create");
        assert_eq!(first.id(), second.id());

        let listed = harness.orchestrator.list(&harness.network).await.unwrap();
        assert_eq!(listed.len(), 1);

        harness
            .orchestrator
            .delete(first.id(), &harness.network)
            .await
            .expect("delete");
    }

    #[tokio::test]
    async fn duplicate_ports_are_rejected_before_any_write() {
        let harness = setup().await;
        let mut spec = create_spec(&harness, ExposureLevel::Internal);
        spec.publish_information.push(PublishPort {
            publish_port: 2222,
            target_port: 23,
            protocol: "TCP".to_string(),
            node_port: None,
        });

        let err = harness
            .orchestrator
            .create(&spec)
            .await
            .expect_err("duplicate publish port must be rejected");
        assert!(matches!(err, Error::Validation(_)));

        // nothing was written, not even the namespace
        assert!(harness.namespaces.get(&harness.network).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_internal_container_publishes_a_pod_image() {
        let harness = setup().await;
        let container = harness
            .orchestrator
            .create(&create_spec(&harness, ExposureLevel::Internal))
            .await
            .expect("internal create");

        let saved = harness
            .orchestrator
            .save(container.id(), &harness.network)
            .await
            .expect("save");
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].pod_name, "c-pod");
        assert_eq!(saved[0].namespace_name, harness.network);
        assert_eq!(saved[0].image_name, "c-pod-image:latest");

        harness
            .orchestrator
            .delete(container.id(), &harness.network)
            .await
            .expect("delete");
    }

    #[tokio::test]
    async fn save_exposed_container_saves_the_backing_pod() {
        let harness = setup().await;
        let container = harness
            .orchestrator
            .create(&create_spec(&harness, ExposureLevel::Exposed))
            .await
            .expect("exposed create");

        let saved = harness
            .orchestrator
            .save(container.id(), &harness.network)
            .await
            .expect("save");
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].image_name, "c-pod-image:latest");

        harness
            .orchestrator
            .delete(container.id(), &harness.network)
            .await
            .expect("delete");
    }

    #[tokio::test]
    async fn unpullable_image_fails_with_a_timeout() {
        let harness = setup().await;
        let mut spec = create_spec(&harness, ExposureLevel::Internal);
        spec.image = "gantry-e2e/does-not-exist:latest".to_string();

        let err = harness
            .orchestrator
            .create(&spec)
            .await
            .expect_err("unpullable image must not create a running pod");
        assert!(matches!(err, Error::Timeout(_)));

        // the stuck pod is still addressable and deletable afterwards
        if let Some(Container::Pod(pod)) = harness
            .orchestrator
            .list(&harness.network)
            .await
            .unwrap()
            .into_iter()
            .next()
        {
            harness
                .orchestrator
                .delete(&pod.id, &harness.network)
                .await
                .expect("delete stuck pod");
        }
    }
}
