//! OpenStack API service CRDs: Keystone, Glance, Placement, Neutron, Nova
//!
//! All five share [`ServiceStatus`] and compose [`ServiceTemplate`] and
//! [`ExposureSpec`] into a flat spec.

use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::controlplane::NetworkBackend;
use super::types::{DatabaseConfig, ExposureSpec, ServiceStatus, ServiceTemplate};

fn default_region() -> String {
    "RegionOne".to_string()
}

fn default_cell_name() -> String {
    "cell1".to_string()
}

fn default_compute_replicas() -> i32 {
    1
}

/// Keystone identity service
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "openstack.k8s.io",
    version = "v1alpha1",
    kind = "Keystone",
    plural = "keystones",
    shortname = "ks",
    namespaced,
    status = "ServiceStatus",
    printcolumn = r#"{"name":"Ready","type":"string","jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#,
    printcolumn = r#"{"name":"Endpoint","type":"string","jsonPath":".status.apiEndpoint"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct KeystoneSpec {
    /// Replicas, image, and scheduling
    #[serde(default, flatten)]
    pub template: ServiceTemplate,

    /// Database binding
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Public hostname and gateway
    #[serde(default, flatten)]
    pub exposure: ExposureSpec,

    /// Secret holding the admin password; `<name>-admin-password` when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_password_secret_name: Option<String>,

    /// Region the identity endpoints are registered in
    #[serde(default = "default_region")]
    pub region: String,
}

impl Default for KeystoneSpec {
    fn default() -> Self {
        Self {
            template: ServiceTemplate::default(),
            database: DatabaseConfig::default(),
            exposure: ExposureSpec::default(),
            admin_password_secret_name: None,
            region: default_region(),
        }
    }
}

impl Keystone {
    /// Secret holding the admin password
    pub fn admin_secret_name(&self) -> String {
        self.spec
            .admin_password_secret_name
            .clone()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| format!("{}-admin-password", self.name_any()))
    }
}

/// Glance image service
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "openstack.k8s.io",
    version = "v1alpha1",
    kind = "Glance",
    plural = "glances",
    namespaced,
    status = "ServiceStatus",
    printcolumn = r#"{"name":"Ready","type":"string","jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#,
    printcolumn = r#"{"name":"Endpoint","type":"string","jsonPath":".status.apiEndpoint"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct GlanceSpec {
    /// Replicas, image, and scheduling
    #[serde(default, flatten)]
    pub template: ServiceTemplate,

    /// Database binding
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Public hostname and gateway
    #[serde(default, flatten)]
    pub exposure: ExposureSpec,

    /// Region the image endpoints are registered in
    #[serde(default = "default_region")]
    pub region: String,
}

impl Default for GlanceSpec {
    fn default() -> Self {
        Self {
            template: ServiceTemplate::default(),
            database: DatabaseConfig::default(),
            exposure: ExposureSpec::default(),
            region: default_region(),
        }
    }
}

/// Placement service
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "openstack.k8s.io",
    version = "v1alpha1",
    kind = "Placement",
    plural = "placements",
    namespaced,
    status = "ServiceStatus",
    printcolumn = r#"{"name":"Ready","type":"string","jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#,
    printcolumn = r#"{"name":"Endpoint","type":"string","jsonPath":".status.apiEndpoint"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct PlacementSpec {
    /// Replicas, image, and scheduling
    #[serde(default, flatten)]
    pub template: ServiceTemplate,

    /// Database binding
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Public hostname and gateway
    #[serde(default, flatten)]
    pub exposure: ExposureSpec,

    /// Region the placement endpoints are registered in
    #[serde(default = "default_region")]
    pub region: String,
}

impl Default for PlacementSpec {
    fn default() -> Self {
        Self {
            template: ServiceTemplate::default(),
            database: DatabaseConfig::default(),
            exposure: ExposureSpec::default(),
            region: default_region(),
        }
    }
}

/// Neutron networking service
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "openstack.k8s.io",
    version = "v1alpha1",
    kind = "Neutron",
    plural = "neutrons",
    namespaced,
    status = "ServiceStatus",
    printcolumn = r#"{"name":"Mechanism","type":"string","jsonPath":".spec.mechanism"}"#,
    printcolumn = r#"{"name":"Ready","type":"string","jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct NeutronSpec {
    /// Replicas, image, and scheduling
    #[serde(default, flatten)]
    pub template: ServiceTemplate,

    /// Database binding
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Public hostname and gateway
    #[serde(default, flatten)]
    pub exposure: ExposureSpec,

    /// ML2 mechanism driver backend
    #[serde(default)]
    pub mechanism: NetworkBackend,

    /// Region the network endpoints are registered in
    #[serde(default = "default_region")]
    pub region: String,
}

impl Default for NeutronSpec {
    fn default() -> Self {
        Self {
            template: ServiceTemplate::default(),
            database: DatabaseConfig::default(),
            exposure: ExposureSpec::default(),
            mechanism: NetworkBackend::default(),
            region: default_region(),
        }
    }
}

/// Nova compute service
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "openstack.k8s.io",
    version = "v1alpha1",
    kind = "Nova",
    plural = "novas",
    namespaced,
    status = "ServiceStatus",
    printcolumn = r#"{"name":"Compute","type":"integer","jsonPath":".spec.computeReplicas"}"#,
    printcolumn = r#"{"name":"Ready","type":"string","jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct NovaSpec {
    /// Replicas, image, and scheduling of the API tier
    #[serde(default, flatten)]
    pub template: ServiceTemplate,

    /// Database binding
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Public hostname and gateway
    #[serde(default, flatten)]
    pub exposure: ExposureSpec,

    /// Number of nova-compute replicas
    #[serde(default = "default_compute_replicas")]
    pub compute_replicas: i32,

    /// Name of the first compute cell
    #[serde(default = "default_cell_name")]
    pub cell_name: String,

    /// Region the compute endpoints are registered in
    #[serde(default = "default_region")]
    pub region: String,
}

impl Default for NovaSpec {
    fn default() -> Self {
        Self {
            template: ServiceTemplate::default(),
            database: DatabaseConfig::default(),
            exposure: ExposureSpec::default(),
            compute_replicas: default_compute_replicas(),
            cell_name: default_cell_name(),
            region: default_region(),
        }
    }
}
