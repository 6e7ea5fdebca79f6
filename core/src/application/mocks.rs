//! Scripted resolver and transport used by the application tests.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use super::shutdown::ShutdownSignal;
use crate::domain::PodRef;
use crate::error::{ResolutionError, TransportError};
use crate::ports::{PodResolverPort, TunnelRequest, TunnelTransportPort};

/// Resolver that replays a script, then falls back to a fixed answer.
pub(crate) struct MockResolver {
    script: Mutex<VecDeque<Result<String, ResolutionError>>>,
    fallback: Option<String>,
    calls: AtomicUsize,
}

impl MockResolver {
    pub(crate) fn always(pod: &str) -> Self {
        Self::failing_then(0, pod)
    }

    pub(crate) fn failing_then(failures: usize, pod: &str) -> Self {
        let script = (0..failures)
            .map(|_| {
                Err(ResolutionError::LookupFailed {
                    service: "svc".to_string(),
                    namespace: "ns".to_string(),
                    reason: "scripted failure".to_string(),
                })
            })
            .collect();
        Self {
            script: Mutex::new(script),
            fallback: Some(pod.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn always_failing() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl PodResolverPort for MockResolver {
    async fn resolve(&self, namespace: &str, service: &str) -> Result<String, ResolutionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().pop_front();
        if let Some(result) = next {
            return result;
        }
        self.fallback.clone().ok_or_else(|| ResolutionError::NoPods {
            service: service.to_string(),
            namespace: namespace.to_string(),
            selector: "app=mock".to_string(),
        })
    }
}

/// How one scripted tunnel attempt behaves.
#[derive(Debug, Clone)]
pub(crate) enum TunnelBehavior {
    /// Become ready and hold until stopped.
    Hold,
    /// Become ready, then drop after the delay.
    DropAfter(Duration),
    /// Fail without becoming ready.
    Fail(TransportError),
    /// Never become ready; wait for stop.
    Hang,
}

/// Transport that replays a script of behaviors.
pub(crate) struct MockTransport {
    script: Mutex<VecDeque<TunnelBehavior>>,
    fallback: TunnelBehavior,
    calls: AtomicUsize,
    stops: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
    pods: Mutex<Vec<PodRef>>,
}

impl MockTransport {
    pub(crate) fn new(behavior: TunnelBehavior) -> Self {
        Self::scripted(Vec::new(), behavior)
    }

    pub(crate) fn scripted(script: Vec<TunnelBehavior>, fallback: TunnelBehavior) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            calls: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            pods: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Attempts that unwound because their stop token fired.
    pub(crate) fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub(crate) fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub(crate) fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub(crate) fn pods(&self) -> Vec<PodRef> {
        self.pods.lock().clone()
    }
}

impl TunnelTransportPort for MockTransport {
    async fn forward(&self, request: TunnelRequest) -> Result<(), TransportError> {
        let TunnelRequest {
            pod, ready, stop, ..
        } = request;

        self.calls.fetch_add(1, Ordering::SeqCst);
        self.pods.lock().push(pod);
        let behavior = self.script.lock().pop_front();
        let behavior = behavior.unwrap_or_else(|| self.fallback.clone());

        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);

        let result = match behavior {
            TunnelBehavior::Hold => {
                let _ = ready.send(());
                stop.cancelled().await;
                self.stops.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            TunnelBehavior::DropAfter(delay) => {
                let _ = ready.send(());
                tokio::select! {
                    _ = stop.cancelled() => {
                        self.stops.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }
                    _ = tokio::time::sleep(delay) => Err(TransportError::Closed),
                }
            }
            TunnelBehavior::Fail(err) => Err(err),
            TunnelBehavior::Hang => {
                stop.cancelled().await;
                self.stops.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        };

        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// Transport that binds local ports exclusively, like a real listener.
#[derive(Default)]
pub(crate) struct PortTableTransport {
    bound: Mutex<HashSet<u16>>,
    conflicts: AtomicUsize,
}

impl PortTableTransport {
    pub(crate) fn conflicts(&self) -> usize {
        self.conflicts.load(Ordering::SeqCst)
    }
}

impl TunnelTransportPort for PortTableTransport {
    async fn forward(&self, request: TunnelRequest) -> Result<(), TransportError> {
        let bound = self.bound.lock().insert(request.local_port);
        if !bound {
            self.conflicts.fetch_add(1, Ordering::SeqCst);
            return Err(TransportError::PortInUse(request.local_port));
        }

        let _ = request.ready.send(());
        request.stop.cancelled().await;
        self.bound.lock().remove(&request.local_port);
        Ok(())
    }
}

/// Transport that reports ready and fires shutdown before the session can react.
pub(crate) struct ReadyThenShutdown {
    shutdown: ShutdownSignal,
    stops: AtomicUsize,
}

impl ReadyThenShutdown {
    pub(crate) fn new(shutdown: ShutdownSignal) -> Self {
        Self {
            shutdown,
            stops: AtomicUsize::new(0),
        }
    }

    pub(crate) fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

impl TunnelTransportPort for ReadyThenShutdown {
    async fn forward(&self, request: TunnelRequest) -> Result<(), TransportError> {
        let _ = request.ready.send(());
        self.shutdown.trigger();

        request.stop.cancelled().await;
        self.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
