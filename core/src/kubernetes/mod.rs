//! Kubernetes module for service resolution and port forwarding.
//!
//! This module provides:
//! - kubectl invocation pinned to one kubeconfig
//! - Service to pod resolution via label selectors
//! - Tunnels backed by `kubectl port-forward`

pub mod client;
pub mod errors;
pub mod models;
pub mod resolver;
pub mod tunnel;

// Re-export commonly used types
pub use client::KubectlClient;
pub use errors::{KubectlError, Result};
pub use resolver::KubectlPodResolver;
pub use tunnel::KubectlTunnel;
