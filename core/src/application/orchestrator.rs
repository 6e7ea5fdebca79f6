//! Fan-out of forwarding sessions and coordinated shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::session::ForwardSession;
use super::shutdown::ShutdownSignal;
use crate::config::ForwardSettings;
use crate::domain::{ForwardSpec, SessionReport, SessionStatus};
use crate::ports::{PodResolverPort, TunnelTransportPort};

/// Runs one forwarding session per declared service.
///
/// A failing service never stops its siblings; every session keeps retrying
/// until the shared [`ShutdownSignal`] fires.
pub struct ForwardOrchestrator<R, T> {
    resolver: Arc<R>,
    transport: Arc<T>,
    retry_backoff: Duration,
    shutdown: ShutdownSignal,
}

impl<R, T> ForwardOrchestrator<R, T>
where
    R: PodResolverPort + 'static,
    T: TunnelTransportPort + 'static,
{
    /// Create an orchestrator using the given collaborators and settings.
    pub fn new(resolver: R, transport: T, settings: &ForwardSettings) -> Self {
        Self {
            resolver: Arc::new(resolver),
            transport: Arc::new(transport),
            retry_backoff: settings.retry_backoff,
            shutdown: ShutdownSignal::new(),
        }
    }

    /// Returns a handle that stops every session when triggered.
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    /// Spawn one session per spec, in declaration order.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self, specs: Vec<ForwardSpec>) -> ForwardRun {
        let mut sessions = JoinSet::new();
        let mut statuses = Vec::with_capacity(specs.len());

        for (index, spec) in specs.into_iter().enumerate() {
            let (session, status) = ForwardSession::new(
                index,
                spec.clone(),
                Arc::clone(&self.resolver),
                Arc::clone(&self.transport),
                self.retry_backoff,
                self.shutdown.clone(),
            );
            debug!(index, forward = %spec, "starting session");
            statuses.push((spec, status));
            sessions.spawn(session.run());
        }

        ForwardRun { sessions, statuses }
    }

    /// Run every session to completion.
    ///
    /// Returns once all sessions have terminated, which only happens after
    /// the shutdown signal fires.
    pub async fn run(&self, specs: Vec<ForwardSpec>) -> Vec<SessionReport> {
        self.start(specs).wait().await
    }

    /// Like [`run`](Self::run), with SIGINT/SIGTERM wired to the shutdown signal.
    ///
    /// Returns at once when `specs` is empty.
    pub async fn run_until_interrupted(&self, specs: Vec<ForwardSpec>) -> Vec<SessionReport> {
        let forwards = self.start(specs);
        if forwards.is_empty() {
            warn!("no services to forward");
            return Vec::new();
        }

        let listener = tokio::spawn(listen_for_interrupts(self.shutdown.clone()));
        info!("Ready to get traffic!");
        info!("Press [Ctrl-C] to stop forwarding.");

        let reports = forwards.wait().await;
        listener.abort();
        reports
    }
}

/// Sessions spawned by [`ForwardOrchestrator::start`].
pub struct ForwardRun {
    sessions: JoinSet<SessionReport>,
    statuses: Vec<(ForwardSpec, watch::Receiver<SessionStatus>)>,
}

impl ForwardRun {
    /// Number of sessions started.
    pub fn len(&self) -> usize {
        self.statuses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }

    /// Live status of each session, in declaration order.
    pub fn statuses(&self) -> &[(ForwardSpec, watch::Receiver<SessionStatus>)] {
        &self.statuses
    }

    /// Wait for every session to terminate.
    ///
    /// Reports come back in declaration order. A session that panicked is
    /// logged and left out.
    pub async fn wait(mut self) -> Vec<SessionReport> {
        let total = self.statuses.len();
        let mut reports = Vec::with_capacity(total);

        while let Some(joined) = self.sessions.join_next().await {
            match joined {
                Ok(report) => {
                    debug!(
                        service = %report.spec.name,
                        stopped = reports.len() + 1,
                        total,
                        "session terminated"
                    );
                    reports.push(report);
                }
                Err(e) => error!("forwarding session failed: {}", e),
            }
        }

        reports.sort_by_key(|report| report.index);
        reports
    }
}

/// Trigger `shutdown` on the first interrupt; later ones are ignored.
async fn listen_for_interrupts(shutdown: ShutdownSignal) {
    loop {
        if let Err(e) = wait_for_interrupt().await {
            warn!("failed to listen for interrupt signals: {}", e);
            return;
        }

        if shutdown.trigger() {
            info!("Stop requested, shutting down all forwards");
        } else {
            debug!("shutdown already in progress, ignoring interrupt");
        }
    }
}

#[cfg(unix)]
async fn wait_for_interrupt() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = sigterm.recv() => debug!("Received SIGTERM"),
        _ = sigint.recv() => debug!("Received SIGINT"),
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_interrupt() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
