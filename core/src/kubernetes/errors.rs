//! kubectl execution errors.

use thiserror::Error;

use crate::error::{CredentialError, ResolutionError};

/// Result type alias for kubectl operations.
pub type Result<T> = std::result::Result<T, KubectlError>;

/// Errors raised while running kubectl.
#[derive(Error, Debug)]
pub enum KubectlError {
    /// No kubectl binary was found.
    #[error("kubectl not found")]
    KubectlNotFound,

    /// kubectl ran but reported a failure.
    #[error("kubectl failed: {0}")]
    CommandFailed(String),

    /// kubectl could not reach the API server.
    #[error("cluster not connected: {0}")]
    ClusterNotConnected(String),

    /// The requested object does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// kubectl output could not be parsed.
    #[error("failed to parse kubectl output: {0}")]
    ParsingFailed(String),

    /// kubectl did not answer in time.
    #[error("kubectl timed out")]
    Timeout,

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl KubectlError {
    /// Classify kubectl stderr output.
    pub fn from_kubectl_error(stderr: &str) -> Self {
        let message = stderr.trim().to_string();
        let lower = message.to_lowercase();

        if lower.contains("connection refused")
            || lower.contains("no configuration has been provided")
            || lower.contains("dial tcp")
            || lower.contains("unable to connect to the server")
            || lower.contains("i/o timeout")
        {
            Self::ClusterNotConnected(message)
        } else if lower.contains("notfound") || lower.contains("not found") {
            Self::NotFound(message)
        } else {
            Self::CommandFailed(message)
        }
    }

    /// Returns true if the error means the cluster itself is unreachable.
    pub fn is_cluster_not_connected(&self) -> bool {
        matches!(self, Self::ClusterNotConnected(_) | Self::Timeout)
    }

    /// Convert into the resolver's error for `service` in `namespace`.
    pub fn into_resolution_error(self, namespace: &str, service: &str) -> ResolutionError {
        ResolutionError::LookupFailed {
            service: service.to_string(),
            namespace: namespace.to_string(),
            reason: self.to_string(),
        }
    }
}

impl From<KubectlError> for CredentialError {
    fn from(err: KubectlError) -> Self {
        match err {
            KubectlError::KubectlNotFound => CredentialError::KubectlNotFound,
            other if other.is_cluster_not_connected() => {
                CredentialError::ClusterUnreachable(other.to_string())
            }
            other => CredentialError::Rejected(other.to_string()),
        }
    }
}
