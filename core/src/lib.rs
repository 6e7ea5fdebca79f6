//! kbf Core Library
//!
//! Keeps a declared set of Kubernetes services port-forwarded to localhost.
//! Provides functionality to:
//! - Load forward declarations from a YAML file
//! - Resolve a service to one ready backing pod
//! - Run and supervise one `kubectl port-forward` tunnel per service
//! - Retry failed tunnels with a fixed backoff and stop them all on interrupt
//!
//! # Architecture
//! This library follows hexagonal architecture (ports & adapters):
//! - `domain`: Pure data models and session states
//! - `ports`: Trait definitions for the pod resolver and tunnel transport
//! - `kubernetes`: kubectl-backed implementations of those traits
//! - `application`: Forwarding sessions and the orchestrator

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod kubernetes;
pub mod ports;

// Re-export domain types (primary API)
pub use domain::{ForwardSpec, PodRef, SessionReport, SessionState, SessionStatus};

// Re-export other commonly used types
pub use application::{ForwardOrchestrator, ForwardRun, ForwardSession, ShutdownSignal};
pub use config::{
    default_kubeconfig_path, load_forward_file, ForwardSettings, DEFAULT_FORWARD_FILE,
    DEFAULT_RETRY_BACKOFF,
};
pub use error::{ConfigError, CredentialError, Error, ResolutionError, Result, TransportError};
pub use kubernetes::{KubectlClient, KubectlPodResolver, KubectlTunnel};
