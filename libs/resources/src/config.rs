use std::env;
use std::sync::LazyLock;
use std::time::Duration;

/// Sleep between probes of a polling loop.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

pub const POD_RUNNING_TIMEOUT: Duration = Duration::from_secs(80);
pub const POD_IP_TIMEOUT: Duration = Duration::from_secs(20);
pub const POD_TERMINATION_TIMEOUT: Duration = Duration::from_secs(20);

pub const SERVICE_IP_TIMEOUT: Duration = Duration::from_secs(20);
pub const SERVICE_TERMINATION_TIMEOUT: Duration = Duration::from_secs(20);

pub const INGRESS_ADDRESS_TIMEOUT: Duration = Duration::from_secs(60);
pub const INGRESS_TERMINATION_TIMEOUT: Duration = Duration::from_secs(20);

pub const NAMESPACE_TERMINATION_TIMEOUT: Duration = Duration::from_secs(20);

/// How long a save waits for the required containers to be running.
pub const CONTAINER_READINESS_TIMEOUT: Duration = Duration::from_secs(30);

/// Worker-pool width for saving a service's pods in parallel.
pub const SAVE_POD_CONCURRENCY: usize = 4;

/// Namespaces the lingering-resource sweep never touches.
pub const PROTECTED_NAMESPACES: [&str; 6] = [
    "default",
    "kube-system",
    "kube-public",
    "kube-node-lease",
    "ingress-nginx",
    "metallb-system",
];

/// Host used for the single rule of every ingress this service creates.
pub static INGRESS_HOST: LazyLock<String> =
    LazyLock::new(|| env::var("INGRESS_HOST").unwrap_or_else(|_| "gantry.local".to_string()));
