//! Forward file loading and runtime settings.
//!
//! The forward file is YAML:
//!
//! ```yaml
//! services:
//!   - name: api
//!     namespace: default
//!     port: 8080
//!     targetPort: 80
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::ForwardSpec;
use crate::error::{ConfigError, CredentialError};

/// Default forward file, relative to the working directory.
pub const DEFAULT_FORWARD_FILE: &str = "forward.yml";

/// Fixed wait between failed attempts.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(10);

/// On-disk shape of the forward file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ForwardFile {
    #[serde(default)]
    pub services: Vec<ForwardSpec>,
}

/// Load and validate the forward file at `path`.
///
/// Specs are returned in declaration order.
pub async fn load_forward_file(path: &Path) -> Result<Vec<ForwardSpec>, ConfigError> {
    let path = absolute(path);

    let content = tokio::fs::read_to_string(&path)
        .await
        .map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;

    parse_forward_file(&content, &path)
}

/// Parse and validate forward file contents. `path` is only used in errors.
pub fn parse_forward_file(content: &str, path: &Path) -> Result<Vec<ForwardSpec>, ConfigError> {
    let file: ForwardFile =
        serde_yaml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

    if file.services.is_empty() {
        return Err(ConfigError::NoServices(path.to_path_buf()));
    }

    for (index, spec) in file.services.iter().enumerate() {
        spec.validate()
            .map_err(|reason| ConfigError::InvalidService { index, reason })?;
    }

    Ok(file.services)
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|dir| dir.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

/// Returns `$HOME/.kube/config`.
pub fn default_kubeconfig_path() -> Result<PathBuf, CredentialError> {
    dirs::home_dir()
        .map(|home| home.join(".kube").join("config"))
        .ok_or(CredentialError::NoHomeDirectory)
}

/// Settings for one `kbf connect` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardSettings {
    /// Path of the forward file.
    pub forward_file: PathBuf,
    /// Kubeconfig used for every kubectl call.
    pub kubeconfig: PathBuf,
    /// Wait between failed attempts.
    pub retry_backoff: Duration,
}

impl ForwardSettings {
    pub fn new(forward_file: impl Into<PathBuf>, kubeconfig: impl Into<PathBuf>) -> Self {
        Self {
            forward_file: forward_file.into(),
            kubeconfig: kubeconfig.into(),
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }

    /// Override the retry backoff.
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tokio_test::{assert_err, assert_ok};

    const TWO_SERVICES: &str = r#"
services:
  - name: svc-a
    namespace: ns1
    port: 8080
    targetPort: 80
  - name: svc-b
    namespace: ns2
    port: 8080
    targetPort: 9090
"#;

    #[tokio::test]
    async fn test_load_forward_file_keeps_order() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("forward.yml");
        std::fs::write(&path, TWO_SERVICES).unwrap();

        let specs = assert_ok!(load_forward_file(&path).await);
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0], ForwardSpec::new("svc-a", "ns1", 8080, 80));
        assert_eq!(specs[1], ForwardSpec::new("svc-b", "ns2", 8080, 9090));
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("missing.yml");

        let err = assert_err!(load_forward_file(&path).await);
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_parse_rejects_bad_shape() {
        let path = Path::new("forward.yml");

        let err = assert_err!(parse_forward_file("services: nope", path));
        assert!(matches!(err, ConfigError::Parse { .. }));

        let err = assert_err!(parse_forward_file(
            "services:\n  - name: a\n    namespace: b\n    port: 70000\n    targetPort: 80\n",
            path
        ));
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_parse_rejects_invalid_entries() {
        let path = Path::new("forward.yml");

        let err = assert_err!(parse_forward_file(
            "services:\n  - name: a\n    namespace: ''\n    port: 1\n    targetPort: 80\n",
            path
        ));
        assert!(matches!(err, ConfigError::InvalidService { index: 0, .. }));

        let err = assert_err!(parse_forward_file("services: []", path));
        assert!(matches!(err, ConfigError::NoServices(_)));
    }

    #[test]
    fn test_settings_defaults() {
        let settings = ForwardSettings::new("forward.yml", "/tmp/kubeconfig");
        assert_eq!(settings.retry_backoff, Duration::from_secs(10));

        let settings = settings.with_retry_backoff(Duration::from_secs(1));
        assert_eq!(settings.retry_backoff, Duration::from_secs(1));
    }
}
