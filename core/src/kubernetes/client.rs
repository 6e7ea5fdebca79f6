//! kubectl invocation pinned to one kubeconfig.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use super::errors::{KubectlError, Result};
use crate::error::CredentialError;

/// Default paths to search for kubectl.
const KUBECTL_PATHS: &[&str] = &[
    "/opt/homebrew/bin/kubectl", // Apple Silicon
    "/usr/local/bin/kubectl",    // Intel Mac / Homebrew
    "/usr/bin/kubectl",          // System
];

/// Timeout for one-shot kubectl commands.
const KUBECTL_TIMEOUT: Duration = Duration::from_secs(15);

/// Handle for running kubectl against one cluster.
#[derive(Debug, Clone)]
pub struct KubectlClient {
    kubectl_path: PathBuf,
    kubeconfig: PathBuf,
}

impl KubectlClient {
    /// Creates a client without checking the cluster.
    pub fn new(kubectl_path: impl Into<PathBuf>, kubeconfig: impl Into<PathBuf>) -> Self {
        Self {
            kubectl_path: kubectl_path.into(),
            kubeconfig: kubeconfig.into(),
        }
    }

    /// Build a client from local credentials and make sure the API server answers.
    pub async fn connect(kubeconfig: &Path) -> std::result::Result<Self, CredentialError> {
        if !kubeconfig.is_file() {
            return Err(CredentialError::KubeconfigMissing(kubeconfig.to_path_buf()));
        }

        let kubectl_path = find_kubectl().ok_or(CredentialError::KubectlNotFound)?;
        let client = Self::new(kubectl_path, kubeconfig);

        let version = client
            .execute(&["version", "-o", "json", "--request-timeout=10s"])
            .await?;
        debug!(kubectl = %client.kubectl_path.display(), %version, "cluster reachable");

        Ok(client)
    }

    /// A kubectl command with the kubeconfig flag already applied.
    pub fn command(&self) -> Command {
        let mut command = Command::new(&self.kubectl_path);
        command.arg("--kubeconfig").arg(&self.kubeconfig);
        command
    }

    /// Executes a kubectl command and returns its stdout.
    pub async fn execute(&self, args: &[&str]) -> Result<String> {
        let result = timeout(KUBECTL_TIMEOUT, async {
            let output = self.command().args(args).kill_on_drop(true).output().await?;

            Ok::<_, std::io::Error>((output.status, output.stdout, output.stderr))
        })
        .await;

        match result {
            Ok(Ok((status, stdout, stderr))) => {
                if status.success() {
                    String::from_utf8(stdout)
                        .map_err(|e| KubectlError::ParsingFailed(e.to_string()))
                } else {
                    let stderr_str = String::from_utf8_lossy(&stderr);
                    Err(KubectlError::from_kubectl_error(&stderr_str))
                }
            }
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(KubectlError::KubectlNotFound)
            }
            Ok(Err(e)) => Err(KubectlError::Io(e)),
            Err(_) => Err(KubectlError::Timeout),
        }
    }

    /// Executes a kubectl command and parses its JSON output.
    pub async fn execute_json<T: serde::de::DeserializeOwned>(&self, args: &[&str]) -> Result<T> {
        let output = self.execute(args).await?;
        serde_json::from_str(&output).map_err(|e| KubectlError::ParsingFailed(e.to_string()))
    }
}

/// Finds kubectl in the well-known locations, then on `PATH`.
fn find_kubectl() -> Option<PathBuf> {
    find_executable(KUBECTL_PATHS).or_else(|| {
        let paths = std::env::var_os("PATH")?;
        std::env::split_paths(&paths)
            .map(|dir| dir.join(kubectl_file_name()))
            .find(|candidate| candidate.is_file())
    })
}

fn kubectl_file_name() -> &'static str {
    if cfg!(windows) {
        "kubectl.exe"
    } else {
        "kubectl"
    }
}

/// Finds an executable in the given paths.
fn find_executable(paths: &[&str]) -> Option<PathBuf> {
    paths
        .iter()
        .map(PathBuf::from)
        .find(|path_buf| path_buf.exists())
}
