use crate::config::{
    DOCKER_BUILD_MAX_RETRIES, DOCKER_BUILD_RETRY_DELAY, DOCKER_LOGIN_MAX_RETRIES,
    DOCKER_LOGIN_RETRY_DELAY, IMAGE_BUILD_TIMEOUT, IMAGE_PUSH_TIMEOUT, REGISTRY_LOGIN_TIMEOUT,
    RegistrySettings, SNAPSHOT_DIR, SNAPSHOT_FILE_NAME,
};

use gantry_k8s_util::error::{Error, Result};
use gantry_k8s_util::exec::ContainerExec;
use gantry_k8s_util::retry;

use backon::Retryable;
use tracing::{info, warn};

/// The pod a snapshot is taken from. The engine assumes the caller has
/// already verified the pod topology (main container named after the pod,
/// snapshot and status sidecars) and that the required containers are
/// running.
#[derive(Clone, Debug)]
pub struct SaveTarget {
    pub namespace: String,
    pub pod_name: String,
    pub sidecar_name: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SavedImage {
    pub image_name: String,
}

const DOCKERFILE_CONTENT: &str = "FROM scratch\nCOPY . /\nENTRYPOINT [\"/entrypoint.sh\"]\n";
const BUILD_SUCCESS_PATTERNS: [&str; 2] = ["Successfully built", "Successfully tagged"];

pub fn image_name_for(pod_name: &str) -> String {
    format!("{pod_name}-image:latest")
}

fn list_mount_cmd() -> String {
    format!("ls -l {SNAPSHOT_DIR}")
}

fn build_tar_cmd() -> String {
    format!(
        "tar --exclude=/proc --exclude=/sys --exclude=/dev --exclude={SNAPSHOT_DIR} \
         -czvf {SNAPSHOT_DIR}/{SNAPSHOT_FILE_NAME}.tar.gz /"
    )
}

fn unpack_tar_cmd() -> String {
    format!(
        "mkdir -p {SNAPSHOT_DIR}/rootfs && \
         tar -xzvf {SNAPSHOT_DIR}/{SNAPSHOT_FILE_NAME}.tar.gz -C {SNAPSHOT_DIR}/rootfs"
    )
}

fn write_dockerfile_cmd() -> String {
    format!("echo '{DOCKERFILE_CONTENT}' > {SNAPSHOT_DIR}/rootfs/Dockerfile")
}

fn build_image_cmd(image_name: &str) -> String {
    format!(
        "docker image build -t {image_name} -f {SNAPSHOT_DIR}/rootfs/Dockerfile {SNAPSHOT_DIR}/rootfs"
    )
}

fn verify_image_cmd(image_name: &str) -> String {
    format!("docker images {image_name} --format 'table {{{{.Repository}}}}:{{{{.Tag}}}}'")
}

fn build_succeeded(output: &str) -> bool {
    BUILD_SUCCESS_PATTERNS.iter().any(|p| output.contains(p))
}

/// Drives the fixed snapshot-and-publish pipeline against one running pod.
/// All commands run via exec-stream inside the pod's containers; the engine
/// itself talks only to the [`ContainerExec`] capability, never to the pod
/// manager.
#[derive(Clone)]
pub struct SnapshotEngine<E: ContainerExec> {
    exec: E,
}

impl<E: ContainerExec> SnapshotEngine<E> {
    pub fn new(exec: E) -> Self {
        Self { exec }
    }

    /// Snapshot the pod's root filesystem into `<pod>-image:latest`, push it
    /// to the configured registry and reclaim the local copies. Registry
    /// credentials come from the environment; their absence fails the whole
    /// operation before any command is issued.
    pub async fn save_image(&self, target: &SaveTarget) -> Result<SavedImage> {
        let registry = RegistrySettings::from_env()?;
        self.save_image_with(target, &registry).await
    }

    pub async fn save_image_with(
        &self,
        target: &SaveTarget,
        registry: &RegistrySettings,
    ) -> Result<SavedImage> {
        self.check_shared_volume(target).await?;
        self.build_tar(target).await?;
        self.unpack_tar(target).await?;
        self.write_dockerfile(target).await?;
        let image_name = self.build_image(target).await?;
        self.tag_image(target, &image_name, &registry.repo_name).await?;
        self.registry_login(target, registry).await?;
        self.push_image(target, &image_name, &registry.repo_name).await?;
        // local cleanup never fails the save; the image is already published
        if let Err(e) = self
            .remove_local_images(target, &image_name, &registry.repo_name)
            .await
        {
            warn!(
                msg = "failed to reclaim local images after push",
                pod = %target.pod_name,
                error = %e,
            );
        }
        Ok(SavedImage { image_name })
    }

    async fn run_in_sidecar(&self, target: &SaveTarget, command: &str) -> Result<String> {
        self.exec
            .run(&target.namespace, &target.pod_name, &target.sidecar_name, command)
            .await
    }

    async fn run_in_main(&self, target: &SaveTarget, command: &str) -> Result<String> {
        // the main container carries the pod's own name
        self.exec
            .run(&target.namespace, &target.pod_name, &target.pod_name, command)
            .await
    }

    /// Both containers must see the same listing of the shared mount.
    async fn check_shared_volume(&self, target: &SaveTarget) -> Result<()> {
        let command = list_mount_cmd();
        let sidecar_listing = self.run_in_sidecar(target, &command).await?;
        let main_listing = self.run_in_main(target, &command).await?;
        if sidecar_listing != main_listing {
            return Err(Error::Validation(format!(
                "main and snapshot sidecar containers of pod {} do not share the snapshot volume",
                target.pod_name
            )));
        }
        Ok(())
    }

    async fn build_tar(&self, target: &SaveTarget) -> Result<()> {
        self.run_in_main(target, &build_tar_cmd()).await?;
        info!(pod = %target.pod_name, msg = "filesystem snapshot created in main container");
        Ok(())
    }

    async fn unpack_tar(&self, target: &SaveTarget) -> Result<()> {
        self.run_in_sidecar(target, &unpack_tar_cmd()).await?;
        info!(pod = %target.pod_name, msg = "filesystem snapshot unpacked in sidecar");
        Ok(())
    }

    async fn write_dockerfile(&self, target: &SaveTarget) -> Result<()> {
        self.run_in_sidecar(target, &write_dockerfile_cmd()).await?;
        info!(pod = %target.pod_name, msg = "Dockerfile written");
        Ok(())
    }

    /// Build the image from the unpacked rootfs and verify it exists in the
    /// sidecar's local daemon. The streamed build output decides success;
    /// failed or unverified builds retry with exponential backoff.
    async fn build_image(&self, target: &SaveTarget) -> Result<String> {
        let image_name = image_name_for(&target.pod_name);
        let build_cmd = build_image_cmd(&image_name);
        let verify_cmd = verify_image_cmd(&image_name);

        (|| async {
            info!(pod = %target.pod_name, image = %image_name, msg = "starting image build");
            let output = self
                .exec
                .run_streamed(
                    &target.namespace,
                    &target.pod_name,
                    &target.sidecar_name,
                    &build_cmd,
                    IMAGE_BUILD_TIMEOUT,
                )
                .await?;
            if !build_succeeded(&output) {
                return Err(Error::Unknown(format!(
                    "docker build of {image_name} reported no success"
                )));
            }
            let listed = self.run_in_sidecar(target, &verify_cmd).await?;
            if !listed.contains(&image_name) {
                return Err(Error::Unknown(format!(
                    "image {image_name} was not found after build"
                )));
            }
            Ok(())
        })
        .retry(retry::backoff(DOCKER_BUILD_MAX_RETRIES, DOCKER_BUILD_RETRY_DELAY))
        .when(retry::error_is_transient)
        .notify(|err: &Error, delay| {
            warn!(error = %err, ?delay, msg = "image build failed, retrying");
        })
        .await?;

        info!(pod = %target.pod_name, image = %image_name, msg = "image built and verified");
        Ok(image_name)
    }

    async fn tag_image(
        &self,
        target: &SaveTarget,
        image_name: &str,
        repo_name: &str,
    ) -> Result<()> {
        let command = format!("docker image tag {image_name} {repo_name}/{image_name}");
        self.run_in_sidecar(target, &command).await?;
        info!(pod = %target.pod_name, msg = "image tagged");
        Ok(())
    }

    async fn registry_login(&self, target: &SaveTarget, registry: &RegistrySettings) -> Result<()> {
        let command = format!(
            "docker login -u {} -p {}",
            registry.repo_name, registry.repo_password
        );

        (|| async {
            let output = self
                .exec
                .run_streamed(
                    &target.namespace,
                    &target.pod_name,
                    &target.sidecar_name,
                    &command,
                    REGISTRY_LOGIN_TIMEOUT,
                )
                .await?;
            if output.contains("Login Succeeded") {
                return Ok(());
            }
            let detail: String = output.chars().take(200).collect();
            Err(Error::Unknown(format!("docker login failed: {detail}")))
        })
        .retry(retry::backoff(DOCKER_LOGIN_MAX_RETRIES, DOCKER_LOGIN_RETRY_DELAY))
        .when(retry::error_is_retryable)
        .notify(|err: &Error, delay| {
            warn!(error = %err, ?delay, msg = "docker login failed, retrying");
        })
        .await?;

        info!(pod = %target.pod_name, msg = "registry login succeeded");
        Ok(())
    }

    async fn push_image(
        &self,
        target: &SaveTarget,
        image_name: &str,
        repo_name: &str,
    ) -> Result<()> {
        let command = format!("docker image push {repo_name}/{image_name}");
        let output = self
            .exec
            .run_streamed(
                &target.namespace,
                &target.pod_name,
                &target.sidecar_name,
                &command,
                IMAGE_PUSH_TIMEOUT,
            )
            .await?;
        if !output.contains("Pushed") {
            return Err(Error::Unknown(format!(
                "docker push of {repo_name}/{image_name} reported no success"
            )));
        }
        info!(pod = %target.pod_name, msg = "image pushed to registry");
        Ok(())
    }

    /// Remove both local references and verify neither remains. A grep that
    /// matches nothing exits non-zero, which is the verified-clean case.
    async fn remove_local_images(
        &self,
        target: &SaveTarget,
        image_name: &str,
        repo_name: &str,
    ) -> Result<()> {
        let tagged = format!("{repo_name}/{image_name}");
        let remove_cmd = format!("docker rmi {image_name} {tagged}");
        self.run_in_sidecar(target, &remove_cmd).await?;

        let verify_cmd = format!(
            "docker images --format '{{{{.Repository}}}}:{{{{.Tag}}}}' | grep -E '^({image_name}|{tagged})$'"
        );
        match self.run_in_sidecar(target, &verify_cmd).await {
            Ok(output) if output.trim().is_empty() => Ok(()),
            Ok(output) => Err(Error::Unknown(format!(
                "local images still present after rmi: {output}"
            ))),
            Err(_) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Scripted executor: answers by command shape and records every call as
    /// (container, command) so tests can assert pipeline ordering.
    #[derive(Clone, Default)]
    struct ScriptedExec {
        calls: Arc<Mutex<Vec<(String, String)>>>,
        main_mount_listing: Arc<Mutex<String>>,
        build_output: Arc<Mutex<String>>,
    }

    impl ScriptedExec {
        fn new() -> Self {
            let exec = Self::default();
            *exec.main_mount_listing.lock().unwrap() = "total 0".to_string();
            *exec.build_output.lock().unwrap() = "Successfully built 3c0ffee".to_string();
            exec
        }

        fn record(&self, container: &str, command: &str) {
            self.calls
                .lock()
                .unwrap()
                .push((container.to_string(), command.to_string()));
        }

        fn commands(&self) -> Vec<String> {
            self.calls.lock().unwrap().iter().map(|(_, c)| c.clone()).collect()
        }
    }

    impl ContainerExec for ScriptedExec {
        async fn run(
            &self,
            _namespace: &str,
            _pod: &str,
            container: &str,
            command: &str,
        ) -> Result<String> {
            self.record(container, command);
            if command.starts_with("ls -l") {
                if container == "web-pod" {
                    return Ok(self.main_mount_listing.lock().unwrap().clone());
                }
                return Ok("total 0".to_string());
            }
            if command.contains("--format 'table") {
                return Ok("web-pod-image:latest".to_string());
            }
            if command.contains("| grep -E") {
                // grep with no matches exits non-zero
                return Err(Error::Unknown("command failed in snapshot-sidecar".to_string()));
            }
            Ok(String::new())
        }

        async fn run_streamed(
            &self,
            _namespace: &str,
            _pod: &str,
            container: &str,
            command: &str,
            _deadline: Duration,
        ) -> Result<String> {
            self.record(container, command);
            if command.contains("docker image build") {
                return Ok(self.build_output.lock().unwrap().clone());
            }
            if command.contains("docker login") {
                return Ok("Login Succeeded".to_string());
            }
            if command.contains("docker image push") {
                return Ok("latest: digest: sha256:abc size: 1234 Pushed".to_string());
            }
            Ok(String::new())
        }
    }

    fn target() -> SaveTarget {
        SaveTarget {
            namespace: "ns1".to_string(),
            pod_name: "web-pod".to_string(),
            sidecar_name: "snapshot-sidecar".to_string(),
        }
    }

    fn registry() -> RegistrySettings {
        RegistrySettings {
            repo_name: "example".to_string(),
            repo_password: "secret".to_string(),
        }
    }

    #[test]
    fn image_name_follows_pod_name() {
        assert_eq!(image_name_for("c-pod"), "c-pod-image:latest");
    }

    #[test]
    fn tar_command_excludes_virtual_filesystems_and_snapshot_dir() {
        let cmd = build_tar_cmd();
        for excluded in ["/proc", "/sys", "/dev", SNAPSHOT_DIR] {
            assert!(cmd.contains(&format!("--exclude={excluded}")), "missing {excluded}");
        }
        assert!(cmd.ends_with("/"));
    }

    #[test]
    fn dockerfile_is_the_fixed_three_liner() {
        let cmd = write_dockerfile_cmd();
        assert!(cmd.contains("FROM scratch\nCOPY . /\nENTRYPOINT [\"/entrypoint.sh\"]"));
        assert!(cmd.ends_with(&format!("> {SNAPSHOT_DIR}/rootfs/Dockerfile")));
    }

    #[test]
    fn build_success_requires_a_known_marker() {
        assert!(build_succeeded("Step 3/3 : ...\nSuccessfully built deadbeef"));
        assert!(build_succeeded("Successfully tagged web-pod-image:latest"));
        assert!(!build_succeeded("error checking context"));
    }

    #[tokio::test]
    async fn pipeline_runs_steps_in_order_and_returns_the_image_name() {
        let exec = ScriptedExec::new();
        let engine = SnapshotEngine::new(exec.clone());

        let saved = engine.save_image_with(&target(), &registry()).await.unwrap();
        assert_eq!(saved.image_name, "web-pod-image:latest");

        let commands = exec.commands();
        let position = |needle: &str| {
            commands
                .iter()
                .position(|c| c.contains(needle))
                .unwrap_or_else(|| panic!("no command containing {needle:?}"))
        };
        let tar = position("tar --exclude");
        let untar = position("tar -xzvf");
        let dockerfile = position("Dockerfile");
        let build = position("docker image build");
        let tag = position("docker image tag");
        let login = position("docker login");
        let push = position("docker image push");
        let rmi = position("docker rmi");
        assert!(tar < untar && untar < dockerfile && dockerfile < build);
        assert!(build < tag && tag < login && login < push && push < rmi);
    }

    #[tokio::test]
    async fn mismatched_mount_listings_abort_before_any_side_effect() {
        let exec = ScriptedExec::new();
        *exec.main_mount_listing.lock().unwrap() =
            "ls: cannot access '/mnt/snapshot': No such file or directory".to_string();
        let engine = SnapshotEngine::new(exec.clone());

        let err = engine
            .save_image_with(&target(), &registry())
            .await
            .expect_err("shared volume check must fail");
        assert!(matches!(err, Error::Validation(_)));
        assert!(!exec.commands().iter().any(|c| c.contains("tar")));
    }

    #[tokio::test(start_paused = true)]
    async fn build_without_success_marker_retries_then_fails() {
        let exec = ScriptedExec::new();
        *exec.build_output.lock().unwrap() = "error checking context".to_string();
        let engine = SnapshotEngine::new(exec.clone());

        let err = engine
            .save_image_with(&target(), &registry())
            .await
            .expect_err("build must fail");
        assert!(matches!(err, Error::Unknown(_)));

        let attempts = exec
            .commands()
            .iter()
            .filter(|c| c.contains("docker image build"))
            .count();
        assert_eq!(attempts, DOCKER_BUILD_MAX_RETRIES);
    }

    #[test]
    fn missing_credentials_are_a_config_error() {
        // from_env reads the real environment, which the test runner leaves
        // unset; assert on the constructor contract instead of mutating env
        if std::env::var("REPO_NAME").is_err() || std::env::var("REPO_PASSWORD").is_err() {
            let err = RegistrySettings::from_env().expect_err("credentials must be required");
            assert!(matches!(err, Error::Config(_)));
        }
    }
}
