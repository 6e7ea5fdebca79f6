//! Pod resolver port (interface).

use crate::error::ResolutionError;

/// Port for turning a service name into a backing pod.
///
/// Implementations return one healthy pod name. When several pods qualify
/// the first one in the directory's own order is returned.
pub trait PodResolverPort: Send + Sync {
    /// Resolve `service` in `namespace` to a pod name.
    fn resolve(
        &self,
        namespace: &str,
        service: &str,
    ) -> impl std::future::Future<Output = Result<String, ResolutionError>> + Send;
}
