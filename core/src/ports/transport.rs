//! Tunnel transport port (interface).

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::domain::PodRef;
use crate::error::TransportError;

/// Everything a transport needs for one tunnel attempt.
#[derive(Debug)]
pub struct TunnelRequest {
    pub pod: PodRef,
    pub local_port: u16,
    pub remote_port: u16,
    /// Fired once traffic can flow.
    pub ready: oneshot::Sender<()>,
    /// Cancelled when the tunnel must unwind.
    pub stop: CancellationToken,
}

/// Port for opening a forwarding channel to a pod.
///
/// `forward` blocks for the whole lifetime of the tunnel. It returns
/// `Ok(())` after unwinding because `stop` fired. Any other return, `Ok` or
/// `Err`, means the tunnel ended on its own.
pub trait TunnelTransportPort: Send + Sync {
    fn forward(
        &self,
        request: TunnelRequest,
    ) -> impl std::future::Future<Output = Result<(), TransportError>> + Send;
}
