//! Forward declaration domain model.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One desired tunnel: a cluster service bound to a local port.
///
/// Specs are created once at startup and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForwardSpec {
    /// Service name in the cluster.
    pub name: String,
    /// Namespace the service lives in.
    pub namespace: String,
    /// Local port to bind.
    #[serde(rename = "port")]
    pub local_port: u16,
    /// Port on the pod to forward to.
    #[serde(rename = "targetPort")]
    pub target_port: u16,
}

impl ForwardSpec {
    /// Create a new forward spec.
    pub fn new(
        name: impl Into<String>,
        namespace: impl Into<String>,
        local_port: u16,
        target_port: u16,
    ) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            local_port,
            target_port,
        }
    }

    /// Check the field invariants.
    ///
    /// Two specs sharing a local port are accepted here; that conflict only
    /// shows up later as a bind failure in one of the tunnels.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("service name is empty".to_string());
        }
        if self.namespace.trim().is_empty() {
            return Err(format!("namespace of service {} is empty", self.name));
        }
        if self.local_port == 0 {
            return Err(format!("local port of service {} must be 1-65535", self.name));
        }
        if self.target_port == 0 {
            return Err(format!("target port of service {} must be 1-65535", self.name));
        }
        Ok(())
    }

    /// Returns the service ID in the format "namespace/name".
    pub fn label(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

impl fmt::Display for ForwardSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} 127.0.0.1:{} -> {}",
            self.namespace, self.name, self.local_port, self.target_port
        )
    }
}

/// The pod picked to back one tunnel attempt.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PodRef {
    pub name: String,
    pub namespace: String,
}

impl PodRef {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
        }
    }
}

impl fmt::Display for PodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_spec_yaml_field_names() {
        let yaml = "name: svc-a\nnamespace: ns1\nport: 8080\ntargetPort: 80\n";
        let spec: ForwardSpec = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(spec, ForwardSpec::new("svc-a", "ns1", 8080, 80));
    }

    #[test]
    fn test_forward_spec_validate() {
        assert!(ForwardSpec::new("svc-a", "ns1", 8080, 80).validate().is_ok());
        assert!(ForwardSpec::new("", "ns1", 8080, 80).validate().is_err());
        assert!(ForwardSpec::new("svc-a", " ", 8080, 80).validate().is_err());
        assert!(ForwardSpec::new("svc-a", "ns1", 0, 80).validate().is_err());
        assert!(ForwardSpec::new("svc-a", "ns1", 8080, 0).validate().is_err());
    }

    #[test]
    fn test_forward_spec_display() {
        let spec = ForwardSpec::new("svc-a", "ns1", 8080, 80);
        assert_eq!(spec.label(), "ns1/svc-a");
        assert_eq!(spec.to_string(), "ns1/svc-a 127.0.0.1:8080 -> 80");
        assert_eq!(PodRef::new("svc-a-6d9f", "ns1").to_string(), "ns1/svc-a-6d9f");
    }
}
