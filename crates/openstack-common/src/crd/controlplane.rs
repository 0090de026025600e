//! OpenStackControlPlane Custom Resource Definition
//!
//! The control plane is the user-facing root object. Its spec embeds the
//! configuration of every child it rolls out; its status tracks the rollout
//! phase.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::infra::{DatabaseSpec, MemcachedSpec, OVNNetworkSpec, RabbitMQSpec};
use super::services::{GlanceSpec, KeystoneSpec, NeutronSpec, NovaSpec, PlacementSpec};
use super::types::{Condition, GatewayRef};
use crate::Error;

/// Default public domain when none is configured
pub const DEFAULT_PUBLIC_DOMAIN: &str = "openstack.local";

/// Network backend of the cloud
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NetworkBackend {
    /// Open Virtual Network
    #[default]
    Ovn,
    /// Open vSwitch agents
    Ovs,
}

impl std::fmt::Display for NetworkBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ovn => write!(f, "ovn"),
            Self::Ovs => write!(f, "ovs"),
        }
    }
}

/// Storage backend for images and volumes
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Ceph RBD
    Ceph,
    /// LVM on the nodes
    Lvm,
    /// Kubernetes persistent volume claims
    #[default]
    Pvc,
}

impl std::fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ceph => write!(f, "ceph"),
            Self::Lvm => write!(f, "lvm"),
            Self::Pvc => write!(f, "pvc"),
        }
    }
}

/// Rollout phase of a control plane.
///
/// Phases advance strictly in declaration order; `Failed` is terminal until
/// the spec is edited.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum ControlPlanePhase {
    /// Nothing created yet
    #[default]
    Pending,
    /// Database, message broker, cache, and network databases rolling out
    Infrastructure,
    /// Keystone rolling out
    Identity,
    /// Glance, Placement, and Neutron rolling out
    CoreServices,
    /// Nova rolling out
    Compute,
    /// Every tier is up
    Ready,
    /// Spec rejected; waiting for an edit
    Failed,
}

impl std::fmt::Display for ControlPlanePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::Infrastructure => write!(f, "Infrastructure"),
            Self::Identity => write!(f, "Identity"),
            Self::CoreServices => write!(f, "CoreServices"),
            Self::Compute => write!(f, "Compute"),
            Self::Ready => write!(f, "Ready"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

/// Status of an OpenStackControlPlane
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OpenStackControlPlaneStatus {
    /// Status conditions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    /// Generation of the spec last fully processed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    /// Current rollout phase; absent means Pending
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<ControlPlanePhase>,
}

fn default_region() -> String {
    "RegionOne".to_string()
}

/// Specification for an OpenStackControlPlane
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "openstack.k8s.io",
    version = "v1alpha1",
    kind = "OpenStackControlPlane",
    plural = "openstackcontrolplanes",
    shortname = "oscp",
    namespaced,
    status = "OpenStackControlPlaneStatus",
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Ready","type":"string","jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#,
    printcolumn = r#"{"name":"Network","type":"string","jsonPath":".spec.networkBackend"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct OpenStackControlPlaneSpec {
    /// OpenStack region name
    #[serde(default = "default_region")]
    pub region: String,

    /// Storage backend for images and volumes
    #[serde(default)]
    pub storage_backend: StorageBackend,

    /// Network backend
    #[serde(default)]
    pub network_backend: NetworkBackend,

    /// Terminate TLS at the gateway
    #[serde(default)]
    pub tls: bool,

    /// Gateway inherited by every service that does not name its own
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway_ref: Option<GatewayRef>,

    /// Domain public hostnames are derived from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_domain: Option<String>,

    /// Shared database server
    #[serde(default)]
    pub database: DatabaseSpec,

    /// Message broker
    #[serde(default)]
    pub rabbitmq: RabbitMQSpec,

    /// Cache
    #[serde(default)]
    pub memcached: MemcachedSpec,

    /// OVN databases and northd; only used with the ovn network backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ovn_network: Option<OVNNetworkSpec>,

    /// Identity service
    #[serde(default)]
    pub keystone: KeystoneSpec,

    /// Image service
    #[serde(default)]
    pub glance: GlanceSpec,

    /// Placement service
    #[serde(default)]
    pub placement: PlacementSpec,

    /// Networking service
    #[serde(default)]
    pub neutron: NeutronSpec,

    /// Compute service
    #[serde(default)]
    pub nova: NovaSpec,
}

impl Default for OpenStackControlPlaneSpec {
    fn default() -> Self {
        Self {
            region: default_region(),
            storage_backend: StorageBackend::default(),
            network_backend: NetworkBackend::default(),
            tls: false,
            gateway_ref: None,
            public_domain: None,
            database: DatabaseSpec::default(),
            rabbitmq: RabbitMQSpec::default(),
            memcached: MemcachedSpec::default(),
            ovn_network: None,
            keystone: KeystoneSpec::default(),
            glance: GlanceSpec::default(),
            placement: PlacementSpec::default(),
            neutron: NeutronSpec::default(),
            nova: NovaSpec::default(),
        }
    }
}

impl OpenStackControlPlaneSpec {
    /// Domain public hostnames are derived from
    pub fn public_domain(&self) -> &str {
        self.public_domain
            .as_deref()
            .filter(|d| !d.is_empty())
            .unwrap_or(DEFAULT_PUBLIC_DOMAIN)
    }

    /// Returns true when the OVN tier is part of the rollout
    pub fn uses_ovn(&self) -> bool {
        self.network_backend == NetworkBackend::Ovn
    }

    /// Validate the spec.
    ///
    /// Failures are permanent: the control plane moves to `Failed` and waits
    /// for an edit.
    pub fn validate(&self, name: &str) -> Result<(), Error> {
        if self.region.trim().is_empty() {
            return Err(Error::validation_for_field(
                name,
                "spec.region",
                "region must not be empty",
            ));
        }

        if let Some(domain) = self.public_domain.as_deref() {
            if !domain.is_empty() && !is_dns_name(domain) {
                return Err(Error::validation_for_field(
                    name,
                    "spec.publicDomain",
                    format!("'{}' is not a valid DNS name", domain),
                ));
            }
        }

        for (field, replicas) in [
            ("spec.database.replicas", self.database.template.replicas),
            ("spec.rabbitmq.replicas", self.rabbitmq.template.replicas),
            ("spec.memcached.replicas", self.memcached.template.replicas),
            ("spec.keystone.replicas", self.keystone.template.replicas),
            ("spec.glance.replicas", self.glance.template.replicas),
            ("spec.placement.replicas", self.placement.template.replicas),
            ("spec.neutron.replicas", self.neutron.template.replicas),
            ("spec.nova.replicas", self.nova.template.replicas),
            ("spec.nova.computeReplicas", self.nova.compute_replicas),
        ] {
            if replicas < 0 {
                return Err(Error::validation_for_field(
                    name,
                    field,
                    "replicas must not be negative",
                ));
            }
        }

        if self.uses_ovn() {
            if let Some(ovn) = &self.ovn_network {
                ovn.validate().map_err(|e| {
                    Error::validation_for_field(name, "spec.ovnNetwork", e.to_string())
                })?;
            }
        }

        Ok(())
    }
}

/// Lowercase RFC 1123 DNS name check
fn is_dns_name(s: &str) -> bool {
    if s.len() > 253 {
        return false;
    }
    s.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_spec_takes_defaults() {
        let spec: OpenStackControlPlaneSpec = serde_yaml::from_str("{}").unwrap();
        assert_eq!(spec.region, "RegionOne");
        assert_eq!(spec.network_backend, NetworkBackend::Ovn);
        assert_eq!(spec.storage_backend, StorageBackend::Pvc);
        assert_eq!(spec.public_domain(), DEFAULT_PUBLIC_DOMAIN);
        assert!(spec.uses_ovn());
        assert!(spec.validate("openstack").is_ok());
    }

    #[test]
    fn test_full_spec_parses() {
        let spec: OpenStackControlPlaneSpec = serde_yaml::from_str(
            r#"
region: RegionTwo
networkBackend: ovs
storageBackend: ceph
publicDomain: cloud.example.com
gatewayRef:
  name: public
  namespace: gateways
database:
  engine: mariadb
  storage:
    size: 50Gi
nova:
  computeReplicas: 3
"#,
        )
        .unwrap();
        assert_eq!(spec.region, "RegionTwo");
        assert!(!spec.uses_ovn());
        assert_eq!(spec.storage_backend.to_string(), "ceph");
        assert_eq!(spec.public_domain(), "cloud.example.com");
        assert_eq!(spec.database.storage.size, "50Gi");
        assert_eq!(spec.nova.compute_replicas, 3);
        assert_eq!(
            spec.gateway_ref.as_ref().map(|g| g.name.as_str()),
            Some("public")
        );
    }

    #[test]
    fn test_invalid_public_domain_rejected() {
        let spec = OpenStackControlPlaneSpec {
            public_domain: Some("Not A Domain!".to_string()),
            ..Default::default()
        };
        match spec.validate("openstack").unwrap_err() {
            Error::Validation { field, .. } => {
                assert_eq!(field.as_deref(), Some("spec.publicDomain"))
            }
            other => panic!("Expected Validation, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_region_rejected() {
        let spec = OpenStackControlPlaneSpec {
            region: " ".to_string(),
            ..Default::default()
        };
        assert!(spec.validate("openstack").is_err());
    }

    #[test]
    fn test_ovn_raft_validated_only_with_ovn_backend() {
        let mut spec = OpenStackControlPlaneSpec {
            ovn_network: Some(OVNNetworkSpec {
                enable_raft_clustering: true,
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(spec.validate("openstack").is_err());

        spec.network_backend = NetworkBackend::Ovs;
        assert!(spec.validate("openstack").is_ok());
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(ControlPlanePhase::default(), ControlPlanePhase::Pending);
        assert_eq!(ControlPlanePhase::CoreServices.to_string(), "CoreServices");
        assert_eq!(ControlPlanePhase::Failed.to_string(), "Failed");
    }

    #[test]
    fn test_dns_names() {
        assert!(is_dns_name("openstack.local"));
        assert!(is_dns_name("a-b.example.com"));
        assert!(!is_dns_name("-bad.example.com"));
        assert!(!is_dns_name("double..dot"));
        assert!(!is_dns_name("UPPER.example.com"));
    }
}
