//! Supporting types shared by every OpenStack CRD

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Condition status following Kubernetes conventions
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum ConditionStatus {
    /// Condition is true
    True,
    /// Condition is false
    False,
    /// Condition status is unknown
    #[default]
    Unknown,
}

impl std::fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::True => write!(f, "True"),
            Self::False => write!(f, "False"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Kubernetes-style condition for status reporting
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct Condition {
    /// Type of condition (e.g., Ready, DatabaseReady)
    #[serde(rename = "type")]
    pub type_: String,

    /// Status of the condition (True, False, Unknown)
    pub status: ConditionStatus,

    /// Machine-readable reason for the condition
    pub reason: String,

    /// Human-readable message
    pub message: String,

    /// Last time the condition's status changed
    #[serde(rename = "lastTransitionTime")]
    pub last_transition_time: DateTime<Utc>,

    /// Generation of the object this condition was computed from
    #[serde(
        rename = "observedGeneration",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub observed_generation: Option<i64>,
}

impl Condition {
    /// Create a new condition with the current timestamp
    pub fn new(
        type_: impl Into<String>,
        status: ConditionStatus,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            type_: type_.into(),
            status,
            reason: reason.into(),
            message: message.into(),
            last_transition_time: Utc::now(),
            observed_generation: None,
        }
    }
}

/// Container resource limits and requests
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct ResourceRequirements {
    /// Resource requests
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requests: Option<ResourceQuantity>,

    /// Resource limits
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limits: Option<ResourceQuantity>,
}

/// Resource quantity for CPU and memory
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct ResourceQuantity {
    /// CPU quantity (e.g., "100m", "1")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<String>,

    /// Memory quantity (e.g., "128Mi", "1Gi")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<String>,
}

/// Deployment knobs common to every managed workload.
///
/// Composed into each CRD's spec via `#[serde(flatten)]`.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceTemplate {
    /// Number of pod replicas
    #[serde(default = "default_replicas")]
    pub replicas: i32,

    /// Container image; the built-in default is used when empty
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image: String,

    /// Container resources
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,

    /// Node selector for scheduling
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub node_selector: BTreeMap<String, String>,
}

impl Default for ServiceTemplate {
    fn default() -> Self {
        Self {
            replicas: default_replicas(),
            image: String::new(),
            resources: None,
            node_selector: BTreeMap::new(),
        }
    }
}

fn default_replicas() -> i32 {
    1
}

/// Persistent storage request for stateful infrastructure
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StorageSpec {
    /// Requested volume size
    #[serde(default = "default_storage_size")]
    pub size: String,

    /// Storage class; the cluster default is used when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_class: Option<String>,
}

impl Default for StorageSpec {
    fn default() -> Self {
        Self {
            size: default_storage_size(),
            storage_class: None,
        }
    }
}

fn default_storage_size() -> String {
    "10Gi".to_string()
}

/// Relational database engine backing a service
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseEngine {
    /// PostgreSQL
    #[default]
    Postgresql,
    /// MariaDB
    Mariadb,
    /// MySQL
    Mysql,
}

impl DatabaseEngine {
    /// Port the engine listens on
    pub fn port(&self) -> u16 {
        match self {
            Self::Postgresql => 5432,
            Self::Mariadb | Self::Mysql => 3306,
        }
    }

    /// Returns true for the MySQL wire-compatible engines
    pub fn is_mysql_family(&self) -> bool {
        matches!(self, Self::Mariadb | Self::Mysql)
    }
}

impl std::fmt::Display for DatabaseEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Postgresql => write!(f, "postgresql"),
            Self::Mariadb => write!(f, "mariadb"),
            Self::Mysql => write!(f, "mysql"),
        }
    }
}

/// Database binding of an API service
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseConfig {
    /// Secret holding the service's database password; `<name>-db-password` when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_name: Option<String>,

    /// Engine of the shared database server
    #[serde(default)]
    pub engine: DatabaseEngine,
}

impl DatabaseConfig {
    /// Name of the secret holding the service's database password
    pub fn secret_name_for(&self, service_name: &str) -> String {
        self.secret_name
            .clone()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| format!("{}-db-password", service_name))
    }
}

/// Reference to a Gateway API Gateway listener
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GatewayRef {
    /// Gateway name
    #[serde(default)]
    pub name: String,

    /// Gateway namespace; the route's own namespace when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Listener (sectionName) on the gateway
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listener_name: Option<String>,
}

/// External exposure of an API service.
///
/// Composed into each API service spec via `#[serde(flatten)]`.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExposureSpec {
    /// Public hostname routed through the gateway
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_hostname: Option<String>,

    /// Gateway the HTTPRoute attaches to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway_ref: Option<GatewayRef>,
}

impl ExposureSpec {
    /// Returns true when a gateway with a non-empty name is referenced
    pub fn has_gateway(&self) -> bool {
        self.gateway_ref
            .as_ref()
            .map(|g| !g.name.is_empty())
            .unwrap_or(false)
    }
}

/// Status shared by the five API service kinds
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
    /// Status conditions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    /// Generation of the spec last fully processed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    /// Internal API endpoint of the service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_endpoint: Option<String>,
}
