//! Service to pod resolution through kubectl.

use tracing::debug;

use super::client::KubectlClient;
use super::models::{PodListResponse, ServiceResponse};
use crate::error::ResolutionError;
use crate::ports::PodResolverPort;

/// Resolves a service to the first ready pod matching its selector.
#[derive(Debug, Clone)]
pub struct KubectlPodResolver {
    client: KubectlClient,
}

impl KubectlPodResolver {
    pub fn new(client: KubectlClient) -> Self {
        Self { client }
    }
}

impl PodResolverPort for KubectlPodResolver {
    async fn resolve(&self, namespace: &str, service: &str) -> Result<String, ResolutionError> {
        let svc: ServiceResponse = self
            .client
            .execute_json(&[
                "get",
                "service",
                service,
                "-n",
                namespace,
                "-o",
                "json",
                "--request-timeout=10s",
            ])
            .await
            .map_err(|e| e.into_resolution_error(namespace, service))?;

        let selector = svc
            .label_selector()
            .ok_or_else(|| ResolutionError::NoSelector {
                service: service.to_string(),
                namespace: namespace.to_string(),
            })?;

        let pods: PodListResponse = self
            .client
            .execute_json(&[
                "get",
                "pods",
                "-n",
                namespace,
                "-l",
                &selector,
                "-o",
                "json",
                "--request-timeout=10s",
            ])
            .await
            .map_err(|e| e.into_resolution_error(namespace, service))?;

        debug!(
            service,
            namespace,
            %selector,
            candidates = pods.items.len(),
            "listed pods for service"
        );

        pods.first_ready()
            .map(str::to_string)
            .ok_or_else(|| ResolutionError::NoPods {
                service: service.to_string(),
                namespace: namespace.to_string(),
                selector,
            })
    }
}
