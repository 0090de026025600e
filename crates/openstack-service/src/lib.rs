//! Service and infrastructure reconcilers for the OpenStack operator
//!
//! - **Pipeline**: one generic reconciler for the API services, driven by a
//!   per-kind [`ServicePlan`]
//! - **Services**: the plans of Keystone, Glance, Placement, Neutron, and Nova
//! - **Infra**: Database, RabbitMQ, Memcached, and OVNNetwork reconcilers
//! - **Workload**: Deployment, StatefulSet, and Service builders
//! - **Provisioning**: the Jobs that create databases, migrate schemas, and
//!   register endpoints

pub mod context;
pub mod infra;
pub mod pipeline;
pub mod provisioning;
pub mod services;
pub mod workload;

// Bridge openstack_common types into this crate's namespace.
pub(crate) use openstack_common::Error;

pub use context::ServiceContext;
pub use infra::{reconcile_infra, ManagedInfra};
pub use pipeline::{error_policy, reconcile_service, ManagedService, ServicePlan};
