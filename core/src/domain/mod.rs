//! Domain layer - Pure business logic and data models.
//!
//! This module contains domain entities that represent core business concepts.
//! These types have no I/O dependencies and can be tested in isolation.

mod forward;
mod session;

// Re-export all domain types
pub use forward::{ForwardSpec, PodRef};
pub use session::{SessionReport, SessionState, SessionStatus};
