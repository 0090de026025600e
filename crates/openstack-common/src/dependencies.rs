//! Dependency references by naming convention
//!
//! A service finds its shared infrastructure without lookups: when its name
//! is `<prefix><suffix>` (as the control plane names its children), the
//! dependency is `<prefix>-<component>`; otherwise the bare component name.

use crate::svc_dns;

/// Keystone public API port
pub const KEYSTONE_PORT: u16 = 5000;
/// RabbitMQ AMQP port
pub const RABBITMQ_PORT: u16 = 5672;
/// OVN northbound database port
pub const OVN_NB_PORT: u16 = 6641;
/// OVN southbound database port
pub const OVN_SB_PORT: u16 = 6642;

/// Prefix of `name` when it ends with `suffix` and something precedes it
pub fn control_plane_prefix<'a>(name: &'a str, suffix: &str) -> Option<&'a str> {
    name.strip_suffix(suffix).filter(|prefix| !prefix.is_empty())
}

/// Name of the shared `component` that `name` depends on
pub fn dependency_name(name: &str, suffix: &str, component: &str) -> String {
    match control_plane_prefix(name, suffix) {
        Some(prefix) => format!("{}-{}", prefix, component),
        None => component.to_string(),
    }
}

/// Shared database server a service connects to
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatabaseDependency {
    /// Name of the Database object
    pub name: String,
    /// In-cluster host
    pub host: String,
    /// Secret holding the server's root password
    pub root_secret: String,
}

/// Resolve the database of the service `name` whose kind suffix is `suffix`
pub fn database_dependency(name: &str, suffix: &str, namespace: &str) -> DatabaseDependency {
    let db = dependency_name(name, suffix, "database");
    DatabaseDependency {
        host: svc_dns(&db, namespace),
        root_secret: format!("{}-root-password", db),
        name: db,
    }
}

/// Identity service a service registers with
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeystoneDependency {
    /// Name of the Keystone object
    pub name: String,
    /// Internal identity API URL
    pub auth_url: String,
    /// Secret holding the admin password
    pub admin_secret: String,
}

/// Resolve the identity service of the service `name`
pub fn keystone_dependency(name: &str, suffix: &str, namespace: &str) -> KeystoneDependency {
    let ks = dependency_name(name, suffix, "keystone");
    KeystoneDependency {
        auth_url: format!(
            "http://{}:{}/v3",
            svc_dns(&format!("{}-api", ks), namespace),
            KEYSTONE_PORT
        ),
        admin_secret: format!("{}-admin-password", ks),
        name: ks,
    }
}

/// Message broker a service connects to
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RabbitMQDependency {
    /// Name of the RabbitMQ object
    pub name: String,
    /// `host:port`
    pub address: String,
    /// Secret holding username and password
    pub credentials_secret: String,
}

/// Resolve the message broker of the service `name`
pub fn rabbitmq_dependency(name: &str, suffix: &str, namespace: &str) -> RabbitMQDependency {
    let mq = dependency_name(name, suffix, "rabbitmq");
    RabbitMQDependency {
        address: format!("{}:{}", svc_dns(&mq, namespace), RABBITMQ_PORT),
        credentials_secret: format!("{}-credentials", mq),
        name: mq,
    }
}

/// OVN databases a network service connects to
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OvnDependency {
    /// Name of the OVNNetwork object
    pub name: String,
    /// Northbound database connection string
    pub northbound: String,
    /// Southbound database connection string
    pub southbound: String,
}

/// Connection strings of the OVN databases of `ovn` in `namespace`
pub fn ovn_endpoints(ovn: &str, namespace: &str) -> (String, String) {
    (
        format!(
            "tcp:{}:{}",
            svc_dns(&format!("{}-nb-db", ovn), namespace),
            OVN_NB_PORT
        ),
        format!(
            "tcp:{}:{}",
            svc_dns(&format!("{}-sb-db", ovn), namespace),
            OVN_SB_PORT
        ),
    )
}

/// Resolve the OVN databases of the service `name`
pub fn ovn_dependency(name: &str, suffix: &str, namespace: &str) -> OvnDependency {
    let ovn = dependency_name(name, suffix, "ovn");
    let (northbound, southbound) = ovn_endpoints(&ovn, namespace);
    OvnDependency {
        name: ovn,
        northbound,
        southbound,
    }
}
