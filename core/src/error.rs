//! Error types for the kbf-core library.
//!
//! Startup-class errors (`ConfigError`, `CredentialError`) are fatal and
//! surface through [`Error`]. Per-session errors (`ResolutionError`,
//! `TransportError`) stay inside the owning forwarding session and only ever
//! drive its retry logic.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for kbf operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that stop the process before any forwarding session starts.
#[derive(Error, Debug)]
pub enum Error {
    /// The forward declarations could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The cluster client could not be built.
    #[error(transparent)]
    Credential(#[from] CredentialError),
}

/// Malformed or unreadable forward declarations.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file is missing or unreadable.
    #[error("failed to read forward file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid YAML or does not have the expected shape.
    #[error("failed to parse forward file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// A single service entry is invalid.
    #[error("service #{index} is invalid: {reason}")]
    InvalidService { index: usize, reason: String },

    /// The file declares no services at all.
    #[error("forward file {0} declares no services")]
    NoServices(PathBuf),
}

/// The cluster client could not be built from local credentials.
#[derive(Error, Debug)]
pub enum CredentialError {
    /// Neither a kubeconfig flag nor a home directory was available.
    #[error("could not determine home directory; pass --kubeconfig explicitly")]
    NoHomeDirectory,

    /// The kubeconfig file does not exist.
    #[error("kubeconfig not found at {0}")]
    KubeconfigMissing(PathBuf),

    /// No kubectl binary was found.
    #[error("kubectl not found in PATH or the usual install locations")]
    KubectlNotFound,

    /// The API server could not be reached with the given credentials.
    #[error("cluster unreachable: {0}")]
    ClusterUnreachable(String),

    /// kubectl reached a verdict but refused the kubeconfig.
    #[error("kubectl rejected the kubeconfig: {0}")]
    Rejected(String),
}

/// Failure to turn a service name into a pod name.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    /// The service has no pod selector.
    #[error("no pod selector for service {service} in {namespace}")]
    NoSelector { service: String, namespace: String },

    /// The selector matched no ready pods.
    #[error("no running pods for service {service} in {namespace} (selector {selector})")]
    NoPods {
        service: String,
        namespace: String,
        selector: String,
    },

    /// The directory lookup itself failed.
    #[error("lookup of service {service} in {namespace} failed: {reason}")]
    LookupFailed {
        service: String,
        namespace: String,
        reason: String,
    },
}

/// The tunnel failed to establish or dropped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The local port is already bound by someone else.
    #[error("local port {0} is already in use")]
    PortInUse(u16),

    /// The tunnel process could not be started.
    #[error("failed to start tunnel: {0}")]
    Spawn(String),

    /// The tunnel process exited on its own.
    #[error("tunnel exited ({status}): {detail}")]
    Exited { status: String, detail: String },

    /// The tunnel closed without reporting a cause.
    #[error("tunnel closed unexpectedly")]
    Closed,

    /// The tunnel task panicked or was aborted.
    #[error("tunnel task aborted: {0}")]
    Aborted(String),
}
