use gantry_k8s_util::error::{Error, Result};

use std::env;
use std::sync::LazyLock;
use std::time::Duration;

/// Mount path of the EmptyDir volume shared by all three pod containers.
pub const SNAPSHOT_DIR: &str = "/mnt/snapshot";
/// Base name of the root filesystem archive written into the shared volume.
pub const SNAPSHOT_FILE_NAME: &str = "full_fs_snapshot";
/// Name of the shared volume in the pod spec.
pub const SNAPSHOT_VOLUME_NAME: &str = "snapshot-volume";

pub const SNAPSHOT_SIDECAR_NAME: &str = "snapshot-sidecar";
pub const STATUS_SIDECAR_NAME: &str = "status-sidecar";

pub const IMAGE_BUILD_TIMEOUT: Duration = Duration::from_secs(25 * 60);
pub const IMAGE_PUSH_TIMEOUT: Duration = Duration::from_secs(25 * 60);
pub const REGISTRY_LOGIN_TIMEOUT: Duration = Duration::from_secs(10 * 60);

pub const DOCKER_BUILD_MAX_RETRIES: usize = 3;
pub const DOCKER_BUILD_RETRY_DELAY: Duration = Duration::from_secs(5);
pub const DOCKER_LOGIN_MAX_RETRIES: usize = 3;
pub const DOCKER_LOGIN_RETRY_DELAY: Duration = Duration::from_secs(2);

static REPO_NAME: LazyLock<String> =
    LazyLock::new(|| env::var("REPO_NAME").unwrap_or_default());

/// Fixed sidecar images, hosted under the configured registry account.
pub static SNAPSHOT_SIDECAR_IMAGE: LazyLock<String> =
    LazyLock::new(|| format!("{}/snapshot_sidecar:latest", &*REPO_NAME));
pub static STATUS_SIDECAR_IMAGE: LazyLock<String> =
    LazyLock::new(|| format!("{}/status_sidecar:latest", &*REPO_NAME));

/// Registry credentials used by the publish steps of the pipeline.
#[derive(Clone, Debug)]
pub struct RegistrySettings {
    pub repo_name: String,
    pub repo_password: String,
}

impl RegistrySettings {
    pub fn from_env() -> Result<Self> {
        let repo_name = env::var("REPO_NAME").unwrap_or_default();
        let repo_password = env::var("REPO_PASSWORD").unwrap_or_default();
        if repo_name.is_empty() || repo_password.is_empty() {
            return Err(Error::Config(
                "REPO_NAME or REPO_PASSWORD is not set".to_string(),
            ));
        }
        Ok(Self {
            repo_name,
            repo_password,
        })
    }
}
