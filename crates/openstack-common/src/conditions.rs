//! Condition ledger
//!
//! Every managed object reports progress through a list of typed conditions.
//! There is at most one entry per type, and an entry's `lastTransitionTime`
//! moves only when its status flips.

use chrono::{DateTime, Utc};

use crate::crd::{
    Condition, ConditionStatus, Database, Glance, Keystone, Memcached, Neutron, Nova, OVNNetwork,
    OpenStackControlPlane, Placement, RabbitMQ,
};

/// Well-known condition types
pub mod types {
    /// Terminal success signal of every managed object
    pub const READY: &str = "Ready";
    /// Database created and schema migrated
    pub const DATABASE_READY: &str = "DatabaseReady";
    /// Workloads rolled out
    pub const DEPLOYMENT_READY: &str = "DeploymentReady";
    /// Identity bootstrap or endpoint registration finished
    pub const BOOTSTRAP_READY: &str = "BootstrapReady";
}

/// Well-known condition reasons
pub mod reasons {
    /// A reconcile pass is in progress
    pub const RECONCILING: &str = "Reconciling";
    /// Waiting on a job
    pub const JOB_RUNNING: &str = "JobRunning";
    /// Workloads report every replica ready
    pub const DEPLOYMENT_READY: &str = "DeploymentReady";
    /// Every StatefulSet replica is ready
    pub const STATEFULSET_READY: &str = "StatefulSetReady";
    /// Workloads not yet available
    pub const DEPLOYMENT_PENDING: &str = "DeploymentPending";
    /// Migrations finished
    pub const DATABASE_SYNCED: &str = "DatabaseSynced";
    /// Bootstrap or endpoint registration finished
    pub const REGISTERED: &str = "Registered";
    /// Spec rejected
    pub const VALIDATION_FAILED: &str = "ValidationFailed";
    /// Every child of the control plane reports ready
    pub const CONTROL_PLANE_READY: &str = "ControlPlaneReady";
    /// A previously ready child stopped reporting ready
    pub const DEGRADED: &str = "Degraded";
}

/// Return `conditions` with the entry of `type_` set to the given values.
///
/// An existing entry keeps its `lastTransitionTime` unless `status` changes.
/// A new entry is appended with the current time.
pub fn set_condition(
    conditions: &[Condition],
    type_: &str,
    status: ConditionStatus,
    reason: &str,
    message: &str,
    observed_generation: Option<i64>,
) -> Vec<Condition> {
    set_condition_at(
        conditions,
        type_,
        status,
        reason,
        message,
        observed_generation,
        Utc::now(),
    )
}

/// [`set_condition`] with an explicit clock.
pub fn set_condition_at(
    conditions: &[Condition],
    type_: &str,
    status: ConditionStatus,
    reason: &str,
    message: &str,
    observed_generation: Option<i64>,
    now: DateTime<Utc>,
) -> Vec<Condition> {
    let mut out = conditions.to_vec();
    match out.iter_mut().find(|c| c.type_ == type_) {
        Some(existing) => {
            if existing.status != status {
                existing.last_transition_time = now;
            }
            existing.status = status;
            existing.reason = reason.to_string();
            existing.message = message.to_string();
            existing.observed_generation = observed_generation;
        }
        None => out.push(Condition {
            type_: type_.to_string(),
            status,
            reason: reason.to_string(),
            message: message.to_string(),
            last_transition_time: now,
            observed_generation,
        }),
    }
    out
}

/// Find the entry of the given type
pub fn find_condition<'a>(conditions: &'a [Condition], type_: &str) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.type_ == type_)
}

/// True iff a `Ready` entry exists with status `True`
pub fn is_ready(conditions: &[Condition]) -> bool {
    find_condition(conditions, types::READY)
        .map(|c| c.status == ConditionStatus::True)
        .unwrap_or(false)
}

/// Capability of exposing a condition list.
///
/// Readiness gates work over any kind implementing this, so new kinds need no
/// changes to the aggregation code.
pub trait HasConditions {
    /// The object's current conditions; empty when it has no status yet
    fn conditions(&self) -> &[Condition];

    /// True iff the object reports `Ready=True`
    fn is_ready(&self) -> bool {
        is_ready(self.conditions())
    }
}

macro_rules! impl_has_conditions {
    ($($kind:ty),* $(,)?) => {
        $(
            impl HasConditions for $kind {
                fn conditions(&self) -> &[Condition] {
                    self.status
                        .as_ref()
                        .map(|s| s.conditions.as_slice())
                        .unwrap_or(&[])
                }
            }
        )*
    };
}

impl_has_conditions!(
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
