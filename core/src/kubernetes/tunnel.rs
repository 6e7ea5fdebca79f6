//! `kubectl port-forward` as a tunnel transport.

use std::collections::VecDeque;
use std::process::{ExitStatus, Stdio};
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Child;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use super::client::KubectlClient;
use crate::domain::PodRef;
use crate::error::TransportError;
use crate::ports::{TunnelRequest, TunnelTransportPort};

/// Grace period between SIGTERM and a hard kill.
const KILL_GRACE_PERIOD: Duration = Duration::from_millis(300);

/// Number of stderr lines kept for the exit report.
const STDERR_TAIL: usize = 20;

/// Runs one `kubectl port-forward` child per tunnel.
#[derive(Debug, Clone)]
pub struct KubectlTunnel {
    client: KubectlClient,
}

impl KubectlTunnel {
    pub fn new(client: KubectlClient) -> Self {
        Self { client }
    }
}

impl TunnelTransportPort for KubectlTunnel {
    async fn forward(&self, request: TunnelRequest) -> Result<(), TransportError> {
        let TunnelRequest {
            pod,
            local_port,
            remote_port,
            ready,
            stop,
        } = request;

        let target = format!("pod/{}", pod.name);
        let ports = format!("{}:{}", local_port, remote_port);

        let mut child = self
            .client
            .command()
            .args([
                "port-forward",
                "-n",
                pod.namespace.as_str(),
                target.as_str(),
                ports.as_str(),
                "--address=127.0.0.1",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| TransportError::Spawn(e.to_string()))?;

        debug!(pod = %pod, pid = ?child.id(), local_port, remote_port, "kubectl port-forward started");

        let stdout_task = child
            .stdout
            .take()
            .map(|stdout| tokio::spawn(watch_stdout(stdout, ready, pod.clone())));
        let stderr_task = child
            .stderr
            .take()
            .map(|stderr| tokio::spawn(collect_stderr(stderr, pod.clone())));

        let exit = tokio::select! {
            biased;
            _ = stop.cancelled() => None,
            status = child.wait() => Some(status),
        };

        if let Some(task) = stdout_task {
            task.abort();
        }

        match exit {
            None => {
                terminate(&mut child).await;
                if let Some(task) = stderr_task {
                    task.abort();
                }
                debug!(pod = %pod, "kubectl port-forward stopped");
                Ok(())
            }
            Some(status) => {
                let summary = match stderr_task {
                    Some(task) => task.await.unwrap_or_default(),
                    None => StderrSummary::default(),
                };
                Err(classify_exit(status, summary))
            }
        }
    }
}

/// Fires `ready` on the first "Forwarding from" line.
async fn watch_stdout<R>(stdout: R, ready: oneshot::Sender<()>, pod: PodRef)
where
    R: AsyncRead + Unpin,
{
    let mut ready = Some(ready);
    let mut lines = BufReader::new(stdout).lines();

    while let Ok(Some(line)) = lines.next_line().await {
        if let Some((address, local, remote)) = parse_forwarding_line(&line) {
            info!(pod = %pod, "forwarding from {}:{} -> {}", address, local, remote);
            if let Some(tx) = ready.take() {
                let _ = tx.send(());
            }
        } else if line.starts_with("Handling connection") {
            debug!(pod = %pod, "{}", line);
        }
    }
}

/// What stderr told us before kubectl exited.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct StderrSummary {
    port_conflict: Option<u16>,
    tail: VecDeque<String>,
}

impl StderrSummary {
    fn push(&mut self, line: String) {
        if self.port_conflict.is_none() {
            self.port_conflict = detect_port_conflict(&line);
        }
        if self.tail.len() == STDERR_TAIL {
            self.tail.pop_front();
        }
        self.tail.push_back(line);
    }

    fn last_error(&self) -> Option<&str> {
        self.tail
            .iter()
            .rev()
            .find(|line| is_error_line(line))
            .or_else(|| self.tail.back())
            .map(String::as_str)
    }
}

async fn collect_stderr<R>(stderr: R, pod: PodRef) -> StderrSummary
where
    R: AsyncRead + Unpin,
{
    let mut summary = StderrSummary::default();
    let mut lines = BufReader::new(stderr).lines();

    while let Ok(Some(line)) = lines.next_line().await {
        if is_error_line(&line) {
            warn!(pod = %pod, "kubectl: {}", line);
        } else {
            debug!(pod = %pod, "kubectl: {}", line);
        }
        summary.push(line);
    }

    summary
}

fn classify_exit(status: std::io::Result<ExitStatus>, summary: StderrSummary) -> TransportError {
    if let Some(port) = summary.port_conflict {
        return TransportError::PortInUse(port);
    }

    let status = match status {
        Ok(status) => status,
        Err(e) => {
            return TransportError::Exited {
                status: "unknown".to_string(),
                detail: e.to_string(),
            }
        }
    };

    match summary.last_error() {
        None if status.success() => TransportError::Closed,
        detail => TransportError::Exited {
            status: status.to_string(),
            detail: detail.unwrap_or("no output").to_string(),
        },
    }
}

/// SIGTERM first so kubectl can close its streams, then kill.
async fn terminate(child: &mut Child) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;
        use tokio::time::timeout;

        if let Some(pid) = child.id() {
            if kill(Pid::from_raw(pid as i32), Signal::SIGTERM).is_ok()
                && timeout(KILL_GRACE_PERIOD, child.wait()).await.is_ok()
            {
                return;
            }
        }
    }

    if let Err(e) = child.kill().await {
        debug!("kubectl port-forward already gone: {}", e);
    }
}

// ============================================================================
// Output Parsing
// ============================================================================

fn forwarding_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^Forwarding from (\S+):(\d+) -> (\d+)").expect("valid forwarding regex")
    })
}

fn listen_address_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?:\d{1,3}(?:\.\d{1,3}){3}|\[[0-9a-fA-F:]*\]):(\d{1,5})|listen on port (\d{1,5})")
            .expect("valid listen address regex")
    })
}

/// Parses `Forwarding from 127.0.0.1:8080 -> 80` into its parts.
pub fn parse_forwarding_line(line: &str) -> Option<(&str, u16, u16)> {
    let caps = forwarding_regex().captures(line.trim())?;
    let address = caps.get(1)?.as_str();
    let local = caps.get(2)?.as_str().parse().ok()?;
    let remote = caps.get(3)?.as_str().parse().ok()?;
    Some((address, local, remote))
}

/// Checks if a line indicates an error.
pub fn is_error_line(line: &str) -> bool {
    let line_lower = line.to_lowercase();
    line_lower.contains("error")
        || line_lower.contains("failed")
        || line_lower.contains("unable to")
        || line_lower.contains("connection refused")
        || line_lower.contains("lost connection")
}

/// Detects a local bind conflict and returns the port.
pub fn detect_port_conflict(line: &str) -> Option<u16> {
    // kubectl format: "unable to create listener: Error listen tcp4 127.0.0.1:8080: bind: address already in use"
    if !line.to_lowercase().contains("address already in use") {
        return None;
    }

    listen_address_regex()
        .captures_iter(line)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
        .find_map(|m| m.as_str().parse::<u16>().ok())
}


#[cfg(all(test, unix))]
mod process_tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;

    use tempfile::tempdir;
    use tokio::time::{timeout, Instant};
    use tokio_util::sync::CancellationToken;

    /// A stand-in `kubectl` that runs `body` as a shell script.
    fn fake_kubectl(dir: &Path, body: &str) -> KubectlTunnel {
        let path = dir.join("kubectl");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        KubectlTunnel::new(KubectlClient::new(path, dir.join("config")))
    }

    fn request() -> (TunnelRequest, oneshot::Receiver<()>, CancellationToken) {
        let (ready, ready_rx) = oneshot::channel();
        let stop = CancellationToken::new();
        let request = TunnelRequest {
            pod: PodRef::new("svc-a-1", "ns1"),
            local_port: 8080,
            remote_port: 80,
            ready,
            stop: stop.clone(),
        };
        (request, ready_rx, stop)
    }

    #[tokio::test]
    async fn test_forward_ready_then_stopped() {
        let temp_dir = tempdir().unwrap();
        let tunnel = fake_kubectl(
            temp_dir.path(),
            "echo 'Forwarding from 127.0.0.1:8080 -> 80'\nexec sleep 30",
        );
        let (request, ready_rx, stop) = request();
        let task = tokio::spawn(async move { tunnel.forward(request).await });

        timeout(Duration::from_secs(5), ready_rx)
            .await
            .expect("tunnel never became ready")
            .unwrap();
        stop.cancel();

        let result = timeout(Duration::from_secs(5), task).await.unwrap().unwrap();
        assert_eq!(result, Ok(()));
    }

    #[tokio::test]
    async fn test_forward_reports_port_in_use() {
        let temp_dir = tempdir().unwrap();
        let tunnel = fake_kubectl(
            temp_dir.path(),
            "echo 'Unable to listen on port 8080: Listeners failed to create with the following errors: [unable to create listener: Error listen tcp4 127.0.0.1:8080: bind: address already in use]' >&2\nexit 1",
        );
        let (request, ready_rx, _stop) = request();

        let result = timeout(Duration::from_secs(5), tunnel.forward(request))
            .await
            .unwrap();
        assert_eq!(result, Err(TransportError::PortInUse(8080)));
        assert!(ready_rx.await.is_err());
    }

    #[tokio::test]
    async fn test_forward_kills_when_sigterm_ignored() {
        let temp_dir = tempdir().unwrap();
        let tunnel = fake_kubectl(
            temp_dir.path(),
            "trap '' TERM\necho 'Forwarding from 127.0.0.1:8080 -> 80'\nexec sleep 30",
        );
        let (request, ready_rx, stop) = request();
        let task = tokio::spawn(async move { tunnel.forward(request).await });

        timeout(Duration::from_secs(5), ready_rx)
            .await
            .expect("tunnel never became ready")
            .unwrap();
        let stopped_at = Instant::now();
        stop.cancel();

        let result = timeout(Duration::from_secs(5), task).await.unwrap().unwrap();
        assert_eq!(result, Ok(()));
        assert!(stopped_at.elapsed() >= KILL_GRACE_PERIOD);
    }
}
