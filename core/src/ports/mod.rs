//! Ports layer - Trait definitions (interfaces).
//!
//! This module defines the interfaces that the application layer uses
//! to interact with the cluster. Implementations live in `kubernetes`.

mod resolver;
mod transport;

pub use resolver::PodResolverPort;
pub use transport::{TunnelRequest, TunnelTransportPort};
