//! Custom Resource Definitions for the OpenStack operator
//!
//! This module contains all CRD definitions reconciled by the operator.

mod controlplane;
mod infra;
mod services;
mod types;

pub use controlplane::{
    ControlPlanePhase, NetworkBackend, OpenStackControlPlane, OpenStackControlPlaneSpec,
    OpenStackControlPlaneStatus, StorageBackend, DEFAULT_PUBLIC_DOMAIN,
};
pub use infra::{
    Database, DatabaseSpec, InfraStatus, Memcached, MemcachedSpec, OVNNetwork, OVNNetworkSpec,
    OVNNetworkStatus, RabbitMQ, RabbitMQSpec,
};
pub use services::{
    Glance, GlanceSpec, Keystone, KeystoneSpec, Neutron, NeutronSpec, Nova, NovaSpec, Placement,
    PlacementSpec,
};
pub use types::{
    Condition, ConditionStatus, DatabaseConfig, DatabaseEngine, ExposureSpec, GatewayRef,
    ResourceQuantity, ResourceRequirements, ServiceStatus, ServiceTemplate, StorageSpec,
};

// Empty objects for the applier, which fills identity and spec in through a
// mutator. `Kind::new` needs a name, so the blank carries an empty one.
macro_rules! impl_blank_default {
    ($($kind:ident),* $(,)?) => {
        $(
            impl Default for $kind {
                fn default() -> Self {
                    Self::new("", Default::default())
                }
            }
        )*
    };
}

impl_blank_default!(
    OpenStackControlPlane,
    Database,
    RabbitMQ,
    Memcached,
    OVNNetwork,
    Keystone,
    Glance,
    Placement,
    Neutron,
    Nova,
);
