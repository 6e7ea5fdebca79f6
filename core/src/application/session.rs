//! Supervision of a single forwarded service.
//!
//! A session walks the state machine
//! `Resolving -> Connecting -> Ready`, falling back to `RetryWait` on any
//! resolution or transport failure and reaching `Terminated` only when the
//! shutdown signal fires. Every wait races against that signal.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{oneshot, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::shutdown::ShutdownSignal;
use crate::domain::{ForwardSpec, PodRef, SessionReport, SessionState, SessionStatus};
use crate::error::TransportError;
use crate::ports::{PodResolverPort, TunnelRequest, TunnelTransportPort};

type TunnelTask = JoinHandle<Result<(), TransportError>>;

/// A spawned tunnel attempt.
struct Attempt {
    pod: PodRef,
    stop: CancellationToken,
    task: TunnelTask,
}

enum Phase {
    Resolving,
    Connecting(PodRef),
    Ready(Attempt),
    RetryWait,
    Terminated,
}

impl Phase {
    fn state(&self) -> SessionState {
        match self {
            Phase::Resolving => SessionState::Resolving,
            Phase::Connecting(_) => SessionState::Connecting,
            Phase::Ready(_) => SessionState::Ready,
            Phase::RetryWait => SessionState::RetryWait,
            Phase::Terminated => SessionState::Terminated,
        }
    }
}

/// What ended the wait in `Connecting`.
enum ConnectEvent {
    Shutdown,
    Ready,
    Ended(Result<Result<(), TransportError>, JoinError>),
}

/// Keeps one service forwarded until shutdown.
pub struct ForwardSession<R, T> {
    index: usize,
    spec: ForwardSpec,
    resolver: Arc<R>,
    transport: Arc<T>,
    retry_backoff: Duration,
    shutdown: ShutdownSignal,
    status: watch::Sender<SessionStatus>,
    resolved_pod: Option<PodRef>,
    retry_count: u32,
    ready_count: u32,
}

impl<R, T> ForwardSession<R, T>
where
    R: PodResolverPort + 'static,
    T: TunnelTransportPort + 'static,
{
    /// Creates a session and the receiver its status is published on.
    pub fn new(
        index: usize,
        spec: ForwardSpec,
        resolver: Arc<R>,
        transport: Arc<T>,
        retry_backoff: Duration,
        shutdown: ShutdownSignal,
    ) -> (Self, watch::Receiver<SessionStatus>) {
        let (status, status_rx) = watch::channel(SessionStatus::default());
        let session = Self {
            index,
            spec,
            resolver,
            transport,
            retry_backoff,
            shutdown,
            status,
            resolved_pod: None,
            retry_count: 0,
            ready_count: 0,
        };
        (session, status_rx)
    }

    /// Drive the state machine until the session terminates.
    pub async fn run(mut self) -> SessionReport {
        let mut phase = Phase::Resolving;

        loop {
            if let Phase::RetryWait = phase {
                self.resolved_pod = None;
            }
            self.publish(phase.state());
            phase = match phase {
                Phase::Resolving => self.resolve().await,
                Phase::Connecting(pod) => self.connect(pod).await,
                Phase::Ready(attempt) => self.serve(attempt).await,
                Phase::RetryWait => self.retry_wait().await,
                Phase::Terminated => break,
            };
        }

        info!(
            service = %self.spec.name,
            namespace = %self.spec.namespace,
            local_port = self.spec.local_port,
            "Stop forwarding {}:{}",
            self.spec.name,
            self.spec.local_port
        );

        SessionReport {
            index: self.index,
            spec: self.spec,
            retry_count: self.retry_count,
            ready_count: self.ready_count,
            final_state: SessionState::Terminated,
        }
    }

    async fn resolve(&mut self) -> Phase {
        let result = tokio::select! {
            biased;
            _ = self.shutdown.triggered() => return Phase::Terminated,
            result = self.resolver.resolve(&self.spec.namespace, &self.spec.name) => result,
        };

        match result {
            Ok(pod_name) => {
                let pod = PodRef::new(pod_name, self.spec.namespace.clone());
                debug!(service = %self.spec.name, pod = %pod, "resolved pod");
                self.resolved_pod = Some(pod.clone());
                Phase::Connecting(pod)
            }
            Err(e) => {
                warn!(
                    service = %self.spec.name,
                    namespace = %self.spec.namespace,
                    retry = self.retry_count,
                    "{}",
                    e
                );
                Phase::RetryWait
            }
        }
    }

    async fn connect(&mut self, pod: PodRef) -> Phase {
        let (ready_tx, ready_rx) = oneshot::channel();
        let stop = CancellationToken::new();
        let request = TunnelRequest {
            pod: pod.clone(),
            local_port: self.spec.local_port,
            remote_port: self.spec.target_port,
            ready: ready_tx,
            stop: stop.clone(),
        };

        info!(
            service = %self.spec.name,
            pod = %pod,
            local_port = self.spec.local_port,
            "Start forwarding {}",
            self.spec.name
        );
        let transport = Arc::clone(&self.transport);
        let mut task: TunnelTask = tokio::spawn(async move { transport.forward(request).await });

        // A dropped sender means the transport gave up; its task result tells why.
        let ready = async move {
            if ready_rx.await.is_err() {
                std::future::pending::<()>().await;
            }
        };

        let event = tokio::select! {
            biased;
            _ = self.shutdown.triggered() => ConnectEvent::Shutdown,
            outcome = &mut task => ConnectEvent::Ended(outcome),
            _ = ready => ConnectEvent::Ready,
        };

        match event {
            ConnectEvent::Shutdown => {
                debug!(service = %self.spec.name, "shutdown before tunnel became ready");
                self.stop_attempt(Attempt { pod, stop, task }).await;
                Phase::Terminated
            }
            ConnectEvent::Ready => {
                self.ready_count += 1;
                info!(
                    service = %self.spec.name,
                    namespace = %self.spec.namespace,
                    pod = %pod,
                    local_port = self.spec.local_port,
                    "{} ready to receive traffic on 127.0.0.1:{}",
                    self.spec.name,
                    self.spec.local_port
                );
                Phase::Ready(Attempt { pod, stop, task })
            }
            ConnectEvent::Ended(outcome) => {
                self.log_tunnel_end(&pod, outcome);
                Phase::RetryWait
            }
        }
    }

    async fn serve(&mut self, attempt: Attempt) -> Phase {
        let Attempt {
            pod,
            stop,
            mut task,
        } = attempt;

        let outcome = tokio::select! {
            biased;
            _ = self.shutdown.triggered() => None,
            outcome = &mut task => Some(outcome),
        };

        match outcome {
            None => {
                info!(service = %self.spec.name, pod = %pod, "stopping forward for {}", self.spec.name);
                self.stop_attempt(Attempt { pod, stop, task }).await;
                Phase::Terminated
            }
            Some(outcome) => {
                self.log_tunnel_end(&pod, outcome);
                Phase::RetryWait
            }
        }
    }

    async fn retry_wait(&mut self) -> Phase {
        info!(
            service = %self.spec.name,
            retry = self.retry_count + 1,
            "Forward {} retry in {} seconds",
            self.spec.name,
            self.retry_backoff.as_secs()
        );

        let interrupted = tokio::select! {
            biased;
            _ = self.shutdown.triggered() => true,
            _ = tokio::time::sleep(self.retry_backoff) => false,
        };

        if interrupted {
            return Phase::Terminated;
        }
        self.retry_count += 1;
        Phase::Resolving
    }

    /// Fire the attempt's stop token and wait for the transport to unwind.
    async fn stop_attempt(&self, attempt: Attempt) {
        attempt.stop.cancel();
        match attempt.task.await {
            Ok(Ok(())) => debug!(service = %self.spec.name, pod = %attempt.pod, "tunnel closed"),
            // Late failure after stop was requested; nothing to retry.
            Ok(Err(e)) => debug!(service = %self.spec.name, pod = %attempt.pod, "tunnel error during shutdown: {}", e),
            Err(e) => warn!(service = %self.spec.name, pod = %attempt.pod, "tunnel task failed: {}", e),
        }
    }

    fn log_tunnel_end(&self, pod: &PodRef, outcome: Result<Result<(), TransportError>, JoinError>) {
        let err = match outcome {
            Ok(Ok(())) => TransportError::Closed,
            Ok(Err(e)) => e,
            Err(e) => TransportError::Aborted(e.to_string()),
        };
        warn!(
            service = %self.spec.name,
            namespace = %self.spec.namespace,
            pod = %pod,
            retry = self.retry_count,
            "{}",
            err
        );
    }

    fn publish(&self, state: SessionState) {
        self.status.send_replace(SessionStatus {
            state,
            retry_count: self.retry_count,
            resolved_pod: self.resolved_pod.as_ref().map(|pod| pod.name.clone()),
        });
    }
}
