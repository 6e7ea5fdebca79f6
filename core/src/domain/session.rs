//! Forwarding session state and reporting types.

use std::fmt;

use super::forward::ForwardSpec;

/// State of one forwarding session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    /// Looking up a pod for the service.
    #[default]
    Resolving,
    /// Tunnel requested, waiting for readiness.
    Connecting,
    /// Tunnel is carrying traffic.
    Ready,
    /// Waiting out the backoff before the next attempt.
    RetryWait,
    /// Session is done; no further attempts.
    Terminated,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Resolving => "resolving",
            Self::Connecting => "connecting",
            Self::Ready => "ready",
            Self::RetryWait => "retry-wait",
            Self::Terminated => "terminated",
        }
    }

    /// Whether the session will never change state again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminated)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observable snapshot of a running session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStatus {
    pub state: SessionState,
    /// Number of completed backoff cycles.
    pub retry_count: u32,
    /// Pod chosen by the current attempt, if any.
    pub resolved_pod: Option<String>,
}

/// Summary returned once a session has terminated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    /// Position of the spec in the forward file.
    pub index: usize,
    pub spec: ForwardSpec,
    pub retry_count: u32,
    /// How many times the tunnel reached `Ready`.
    pub ready_count: u32,
    pub final_state: SessionState,
}
