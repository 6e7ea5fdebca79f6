//! kubectl JSON response models for services and pods.

use std::collections::BTreeMap;

use serde::Deserialize;

// ============================================================================
// Services
// ============================================================================

/// Response structure for `kubectl get service <name> -o json`.
#[derive(Debug, Deserialize)]
pub struct ServiceResponse {
    pub metadata: ObjectMetadata,
    #[serde(default)]
    pub spec: ServiceSpec,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMetadata {
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub deletion_timestamp: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ServiceSpec {
    /// Label selector. Kept sorted by key.
    #[serde(default)]
    pub selector: Option<BTreeMap<String, String>>,
}

impl ServiceResponse {
    /// Renders the selector as `k=v,k2=v2`, or `None` when the service has none.
    pub fn label_selector(&self) -> Option<String> {
        let selector = self.spec.selector.as_ref()?;
        if selector.is_empty() {
            return None;
        }
        Some(
            selector
                .iter()
                .map(|(key, value)| format!("{}={}", key, value))
                .collect::<Vec<_>>()
                .join(","),
        )
    }
}

// ============================================================================
// Pods
// ============================================================================

/// Response structure for `kubectl get pods -l <selector> -o json`.
#[derive(Debug, Deserialize)]
pub struct PodListResponse {
    #[serde(default)]
    pub items: Vec<PodItem>,
}

#[derive(Debug, Deserialize)]
pub struct PodItem {
    pub metadata: ObjectMetadata,
    #[serde(default)]
    pub status: PodStatus,
}

#[derive(Debug, Default, Deserialize)]
pub struct PodStatus {
    #[serde(default)]
    pub phase: Option<String>,
    #[serde(default)]
    pub conditions: Vec<PodCondition>,
}

#[derive(Debug, Deserialize)]
pub struct PodCondition {
    #[serde(rename = "type")]
    pub condition_type: String,
    pub status: String,
}

impl PodItem {
    /// Running, not terminating, and not explicitly marked unready.
    pub fn is_ready(&self) -> bool {
        if self.metadata.deletion_timestamp.is_some() {
            return false;
        }
        if self.status.phase.as_deref() != Some("Running") {
            return false;
        }
        !self
            .status
            .conditions
            .iter()
            .any(|c| c.condition_type == "Ready" && c.status == "False")
    }
}

impl PodListResponse {
    /// First ready pod in list order.
    pub fn first_ready(&self) -> Option<&str> {
        self.items
            .iter()
            .find(|pod| pod.is_ready())
            .map(|pod| pod.metadata.name.as_str())
    }
}
