//! Application layer - Use case services.
//!
//! This module contains the services that orchestrate domain logic and
//! cluster interactions:
//! - `ForwardSession` keeps one service forwarded, retrying on failure
//! - `ForwardOrchestrator` runs every session and coordinates shutdown
//!
//! Both depend only on the traits in `ports`, so tests can inject
//! scripted collaborators.

mod orchestrator;
mod session;
mod shutdown;

#[cfg(test)]
pub(crate) mod mocks;

pub use orchestrator::{ForwardOrchestrator, ForwardRun};
pub use session::ForwardSession;
pub use shutdown::ShutdownSignal;
