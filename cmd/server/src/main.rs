use gantry_k8s_util::client::ClusterClient;
use gantry_k8s_util::exec::ExecClient;
use gantry_orchestrator::ContainerOrchestrator;
use gantry_proto::container_maker_server::ContainerMakerServer;
use gantry_resources::ingress::IngressManager;
use gantry_resources::namespace::NamespaceManager;
use gantry_resources::pod::PodManager;
use gantry_resources::service::ServiceManager;
use gantry_snapshot::SnapshotEngine;

use std::net::SocketAddr;
use std::path::Path;

use clap::{Parser, crate_authors, crate_description, crate_version};
use tokio::signal::unix::{SignalKind, signal};
use tonic::transport::{Certificate, Identity, Server, ServerTlsConfig};
use tracing::info;

mod service;
mod telemetry;
mod transform;

use service::ContainerMakerService;

#[derive(Parser, Debug)]
#[command(
    name = "gantry",
    about = crate_description!(),
    version = crate_version!(),
    author = crate_authors!("\n"),
)]
struct Args {
    /// Number of worker threads serving requests
    #[arg(long, default_value_t = 10, env)]
    server_threads: usize,

    /// Listen address
    #[arg(long, default_value = "[::]", env)]
    address: String,

    /// Listen port
    #[arg(short, long, default_value_t = 50052, env)]
    port: u16,

    /// Serve with TLS. Certificate material is read from SERVER_KEY,
    /// SERVER_CRT and CA_CRT, falling back to ./cert/ files.
    #[arg(long, default_value_t = false, env)]
    use_ssl: bool,

    /// Set logging filter directive for `tracing_subscriber::filter::EnvFilter`. Example: "info,kube=debug,gantry=debug"
    #[arg(long, default_value = "info", env)]
    log_filter: String,

    /// Set log format
    #[arg(long, value_enum, default_value_t = telemetry::LogFormat::Text, env)]
    log_format: telemetry::LogFormat,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(args.server_threads)
        .enable_all()
        .build()?;
    runtime.block_on(run(args))
}

async fn run(args: Args) -> anyhow::Result<()> {
    telemetry::init(&args.log_filter, args.log_format)?;

    let cluster = ClusterClient::bind();
    let snapshots = SnapshotEngine::new(ExecClient::new(cluster.clone()));
    let pods = PodManager::new(cluster.clone(), snapshots);
    let services = ServiceManager::new(cluster.clone(), pods.clone());
    let ingresses = IngressManager::new(cluster.clone(), services.clone());
    let namespaces = NamespaceManager::new(cluster);
    let orchestrator = ContainerOrchestrator::new(namespaces, pods, services, ingresses);

    let addr: SocketAddr = format!("{}:{}", args.address, args.port).parse()?;
    let mut builder = Server::builder();
    if args.use_ssl {
        let key = read_cert_material("SERVER_KEY", "./cert/server.key")?;
        let cert = read_cert_material("SERVER_CRT", "./cert/server.crt")?;
        let ca = read_cert_material("CA_CRT", "./cert/ca.crt")?;
        let tls = ServerTlsConfig::new()
            .identity(Identity::from_pem(cert, key))
            .client_ca_root(Certificate::from_pem(ca));
        builder = builder.tls_config(tls)?;
    }

    info!(%addr, use_ssl = args.use_ssl, msg = "starting gantry");
    builder
        .add_service(ContainerMakerServer::new(ContainerMakerService::new(
            orchestrator,
        )))
        .serve_with_shutdown(addr, shutdown_signal())
        .await?;
    Ok(())
}

/// Certificate material from the environment, falling back to disk.
fn read_cert_material(env_key: &str, path: &str) -> anyhow::Result<Vec<u8>> {
    if let Ok(value) = std::env::var(env_key) {
        return Ok(value.into_bytes());
    }
    Ok(std::fs::read(Path::new(path))?)
}

async fn shutdown_signal() {
    let mut sigterm =
        signal(SignalKind::terminate()).expect("failed to install SIGTERM signal handler");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {},
        _ = sigterm.recv() => {},
    }
}
