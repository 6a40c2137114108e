use crate::client::ClusterClient;
use crate::error::{Error, Result};

use std::future::Future;
use std::time::Duration;

use futures::StreamExt;
use k8s_openapi::api::core::v1::Pod;
use kube::Api;
use kube::api::{AttachParams, AttachedProcess};
use tokio::time::{Instant, sleep};
use tokio_util::io::ReaderStream;
use tracing::{debug, info};

/// How long a single read on a streamed exec session may block before the
/// loop re-checks the absolute deadline.
pub const STREAM_READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Narrow capability to run a command inside a named container of a named
/// pod. The snapshot engine depends on this seam instead of on the pod
/// manager, which keeps the pod/snapshot collaboration acyclic and lets
/// tests substitute a scripted executor.
pub trait ContainerExec: Clone + Send + Sync + 'static {
    /// Buffered mode: run a short command and return its whole output.
    /// A non-`Success` exec status is an error carrying stderr and stdout.
    fn run(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
        command: &str,
    ) -> impl Future<Output = Result<String>> + Send;

    /// Line-streamed mode: echo output chunks to the log as they arrive and
    /// return the accumulated output. The session is torn down on every exit
    /// path; exceeding `deadline` is a [`Error::Timeout`].
    fn run_streamed(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
        command: &str,
        deadline: Duration,
    ) -> impl Future<Output = Result<String>> + Send;
}

/// Exec transport backed by the shared in-cluster client.
#[derive(Clone)]
pub struct ExecClient {
    cluster: ClusterClient,
}

impl ExecClient {
    pub fn new(cluster: ClusterClient) -> Self {
        Self { cluster }
    }

    async fn attach(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
        command: &str,
    ) -> Result<AttachedProcess> {
        let pods: Api<Pod> = Api::namespaced(self.cluster.get()?, namespace);
        let params = AttachParams::default()
            .container(container)
            .stdout(true)
            .stderr(true);
        pods.exec(pod, ["/bin/bash", "-c", command], &params)
            .await
            .map_err(|e| Error::api(format!("failed to exec in {namespace}/{pod}:{container}"), e))
    }
}

impl ContainerExec for ExecClient {
    async fn run(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
        command: &str,
    ) -> Result<String> {
        let mut attached = self.attach(namespace, pod, container, command).await?;

        let stdout = ReaderStream::new(
            attached
                .stdout()
                .ok_or_else(|| Error::Unknown("exec stdout unavailable".to_string()))?,
        );
        let stderr = ReaderStream::new(
            attached
                .stderr()
                .ok_or_else(|| Error::Unknown("exec stderr unavailable".to_string()))?,
        );
        let status_fut = attached
            .take_status()
            .ok_or_else(|| Error::Unknown("exec status unavailable".to_string()))?;

        let out_fut = stdout
            .filter_map(|r| async { r.ok().and_then(|b| String::from_utf8(b.to_vec()).ok()) })
            .collect::<Vec<_>>();
        let err_fut = stderr
            .filter_map(|r| async { r.ok().and_then(|b| String::from_utf8(b.to_vec()).ok()) })
            .collect::<Vec<_>>();

        let (out_vec, err_vec, status) = tokio::join!(out_fut, err_fut, status_fut);
        let out = out_vec.join("");

        match status.and_then(|s| s.status) {
            Some(s) if s == "Success" => Ok(out.trim().to_string()),
            _ => Err(Error::Unknown(format!(
                "command failed in {container}: stderr: {}: stdout: {}",
                err_vec.join("").replace('\n', "\\n"),
                out.replace('\n', "\\n"),
            ))),
        }
    }

    async fn run_streamed(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
        command: &str,
        deadline: Duration,
    ) -> Result<String> {
        let mut attached = self.attach(namespace, pod, container, command).await?;

        let mut stdout = ReaderStream::new(
            attached
                .stdout()
                .ok_or_else(|| Error::Unknown("exec stdout unavailable".to_string()))?,
        );
        let mut stderr = ReaderStream::new(
            attached
                .stderr()
                .ok_or_else(|| Error::Unknown("exec stderr unavailable".to_string()))?,
        );

        let hard_stop = Instant::now() + deadline;
        let mut output = String::new();
        let mut out_open = true;
        let mut err_open = true;

        while out_open || err_open {
            if Instant::now() >= hard_stop {
                // dropping `attached` tears down the websocket
                return Err(Error::Timeout(format!(
                    "command in {container} exceeded {deadline:?}"
                )));
            }
            tokio::select! {
                chunk = stdout.next(), if out_open => match chunk {
                    Some(Ok(bytes)) => echo_chunk(&mut output, container, &bytes),
                    Some(Err(_)) | None => out_open = false,
                },
                chunk = stderr.next(), if err_open => match chunk {
                    Some(Ok(bytes)) => echo_chunk(&mut output, container, &bytes),
                    Some(Err(_)) | None => err_open = false,
                },
                _ = sleep(STREAM_READ_TIMEOUT) => {}
            }
        }

        if let Some(status_fut) = attached.take_status() {
            if let Some(status) = status_fut.await {
                debug!(msg = "exec stream finished", status = ?status.status);
            }
        }
        Ok(output.trim().to_string())
    }
}

fn echo_chunk(output: &mut String, container: &str, bytes: &[u8]) {
    let text = String::from_utf8_lossy(bytes);
    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        info!(container, "{line}");
    }
    output.push_str(&text);
}
