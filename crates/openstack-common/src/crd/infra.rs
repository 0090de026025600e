//! Infrastructure tier CRDs: Database, RabbitMQ, Memcached, OVNNetwork

use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{Condition, DatabaseEngine, ServiceTemplate, StorageSpec};

/// Status shared by the single-endpoint infrastructure kinds
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InfraStatus {
    /// Status conditions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    /// Generation of the spec last fully processed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    /// In-cluster endpoint (host:port)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

/// Shared relational database server
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "openstack.k8s.io",
    version = "v1alpha1",
    kind = "Database",
    plural = "databases",
    shortname = "osdb",
    namespaced,
    status = "InfraStatus",
    printcolumn = r#"{"name":"Engine","type":"string","jsonPath":".spec.engine"}"#,
    printcolumn = r#"{"name":"Ready","type":"string","jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#,
    printcolumn = r#"{"name":"Endpoint","type":"string","jsonPath":".status.endpoint"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseSpec {
    /// Replicas, image, and scheduling
    #[serde(default, flatten)]
    pub template: ServiceTemplate,

    /// Database engine
    #[serde(default)]
    pub engine: DatabaseEngine,

    /// Data volume
    #[serde(default)]
    pub storage: StorageSpec,
}

impl Database {
    /// Secret holding the server's root password
    pub fn root_secret_name(&self) -> String {
        format!("{}-root-password", self.name_any())
    }
}

/// Message broker
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "openstack.k8s.io",
    version = "v1alpha1",
    kind = "RabbitMQ",
    plural = "rabbitmqs",
    shortname = "rmq",
    namespaced,
    status = "InfraStatus",
    printcolumn = r#"{"name":"Ready","type":"string","jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#,
    printcolumn = r#"{"name":"Endpoint","type":"string","jsonPath":".status.endpoint"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct RabbitMQSpec {
    /// Replicas, image, and scheduling
    #[serde(default, flatten)]
    pub template: ServiceTemplate,

    /// Data volume
    #[serde(default)]
    pub storage: StorageSpec,
}

/// Token and cache store
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "openstack.k8s.io",
    version = "v1alpha1",
    kind = "Memcached",
    plural = "memcacheds",
    namespaced,
    status = "InfraStatus",
    printcolumn = r#"{"name":"Ready","type":"string","jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#,
    printcolumn = r#"{"name":"Endpoint","type":"string","jsonPath":".status.endpoint"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct MemcachedSpec {
    /// Replicas, image, and scheduling
    #[serde(default, flatten)]
    pub template: ServiceTemplate,
}

fn default_one() -> i32 {
    1
}

/// Status of an OVN network control plane
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OVNNetworkStatus {
    /// Status conditions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    /// Generation of the spec last fully processed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    /// Northbound database connection string
    #[serde(
        rename = "northboundDBEndpoint",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub northbound_db_endpoint: Option<String>,

    /// Southbound database connection string
    #[serde(
        rename = "southboundDBEndpoint",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub southbound_db_endpoint: Option<String>,
}

/// OVN northbound/southbound databases and northd
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "openstack.k8s.io",
    version = "v1alpha1",
    kind = "OVNNetwork",
    plural = "ovnnetworks",
    shortname = "ovn",
    namespaced,
    status = "OVNNetworkStatus",
    printcolumn = r#"{"name":"Ready","type":"string","jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#,
    printcolumn = r#"{"name":"NB","type":"string","jsonPath":".status.northboundDBEndpoint"}"#,
    printcolumn = r#"{"name":"SB","type":"string","jsonPath":".status.southboundDBEndpoint"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct OVNNetworkSpec {
    /// Northbound database replicas
    #[serde(rename = "northboundDBReplicas", default = "default_one")]
    pub northbound_db_replicas: i32,

    /// Southbound database replicas
    #[serde(rename = "southboundDBReplicas", default = "default_one")]
    pub southbound_db_replicas: i32,

    /// ovn-northd replicas
    #[serde(default = "default_one")]
    pub northd_replicas: i32,

    /// Volume for each database replica
    #[serde(rename = "dbStorage", default)]
    pub db_storage: StorageSpec,

    /// Run the databases as a RAFT cluster
    #[serde(default)]
    pub enable_raft_clustering: bool,

    /// Northbound database image override
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub northbound_image: String,

    /// Southbound database image override
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub southbound_image: String,

    /// ovn-northd image override
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub northd_image: String,
}

impl Default for OVNNetworkSpec {
    fn default() -> Self {
        Self {
            northbound_db_replicas: 1,
            southbound_db_replicas: 1,
            northd_replicas: 1,
            db_storage: StorageSpec::default(),
            enable_raft_clustering: false,
            northbound_image: String::new(),
            southbound_image: String::new(),
            northd_image: String::new(),
        }
    }
}

impl OVNNetworkSpec {
    /// Validate replica counts for the requested clustering mode
    pub fn validate(&self) -> Result<(), crate::Error> {
        for (field, replicas) in [
            ("northboundDBReplicas", self.northbound_db_replicas),
            ("southboundDBReplicas", self.southbound_db_replicas),
        ] {
            if replicas < 1 {
                return Err(crate::Error::validation(format!(
                    "{field} must be at least 1"
                )));
            }
            if self.enable_raft_clustering && replicas < 3 {
                return Err(crate::Error::validation(format!(
                    "{field} must be at least 3 when RAFT clustering is enabled"
                )));
            }
        }
        if self.northd_replicas < 1 {
            return Err(crate::Error::validation("northdReplicas must be at least 1"));
        }
        Ok(())
    }
}
