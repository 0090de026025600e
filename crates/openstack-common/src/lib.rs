//! Common types for the OpenStack operator: CRDs, errors, and the
//! reconciliation primitives shared by every controller.

#![deny(missing_docs)]

pub mod apply;
pub mod conditions;
pub mod credentials;
pub mod crd;
pub mod dependencies;
pub mod error;
pub mod events;
pub mod finalizer;
pub mod images;
pub mod job;
pub mod kube_utils;
pub mod readiness;
pub mod route;
pub mod store;
pub mod telemetry;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// API group shared by every managed kind
pub const API_GROUP: &str = "openstack.k8s.io";

/// API version shared by every managed kind
pub const API_VERSION: &str = "openstack.k8s.io/v1alpha1";

/// Field manager used for every write issued by the operator
pub const FIELD_MANAGER: &str = "openstack-operator";

/// Label key identifying the managing component
pub const LABEL_MANAGED_BY: &str = "app.kubernetes.io/managed-by";

/// Value of [`LABEL_MANAGED_BY`] on everything this operator creates
pub const LABEL_MANAGED_BY_OPERATOR: &str = "openstack-operator";

/// Label key carrying the application name
pub const LABEL_NAME: &str = "app.kubernetes.io/name";

/// Label key carrying the owning instance name
pub const LABEL_INSTANCE: &str = "app.kubernetes.io/instance";

/// Label key carrying the component within an application
pub const LABEL_COMPONENT: &str = "app.kubernetes.io/component";

/// In-cluster DNS name for a service in the given namespace.
pub fn svc_dns(name: &str, namespace: &str) -> String {
    format!("{}.{}.svc", name, namespace)
}
