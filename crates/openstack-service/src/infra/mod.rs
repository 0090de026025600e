//! Infrastructure tier reconcilers
//!
//! Database, RabbitMQ, Memcached, and OVNNetwork run the service skeleton
//! without jobs: finalizer, generated secrets, Services, workloads, then
//! readiness of every workload.

mod database;
mod memcached;
mod ovn;
mod rabbitmq;

use std::fmt::Debug;
use std::sync::Arc;

use kube::runtime::controller::Action;
use kube::runtime::events::EventType;
use kube::{Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use openstack_common::conditions::{reasons, set_condition, types, HasConditions};
use openstack_common::credentials::ensure_secret;
use openstack_common::crd::{
    Condition, ConditionStatus, InfraStatus, OVNNetworkStatus,
};
use openstack_common::events::{actions, reasons as event_reasons};
use openstack_common::finalizer::{ensure_lifecycle, Lifecycle};
use openstack_common::kube_utils::Owner;
use openstack_common::readiness::{is_deployment_ready, is_statefulset_ready};
use openstack_common::store::{get_typed, patch_status_typed};
use openstack_common::Result;

use crate::context::{ServiceContext, FINALIZER_REQUEUE};
use crate::pipeline::SecretRequest;
use crate::workload::{ensure_deployment, ensure_service, ensure_statefulset, WorkloadSpec};
use crate::Error;

/// Controller kind of an infrastructure workload
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkloadKind {
    Deployment,
    StatefulSet,
}

/// Service in front of an infrastructure workload
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceFront {
    pub name: String,
    pub headless: bool,
}

/// One workload of an infrastructure object
#[derive(Clone, Debug, PartialEq)]
pub struct InfraWorkload {
    pub kind: WorkloadKind,
    pub spec: WorkloadSpec,
    /// Service selecting the workload's pods; StatefulSets are governed by it
    pub service: Option<ServiceFront>,
}

impl InfraWorkload {
    pub fn stateful(spec: WorkloadSpec, service: &str) -> Self {
        Self {
            kind: WorkloadKind::StatefulSet,
            spec,
            service: Some(ServiceFront {
                name: service.to_string(),
                headless: true,
            }),
        }
    }

    pub fn deployment(spec: WorkloadSpec, service: Option<&str>) -> Self {
        Self {
            kind: WorkloadKind::Deployment,
            spec,
            service: service.map(|name| ServiceFront {
                name: name.to_string(),
                headless: false,
            }),
        }
    }
}

/// Everything the reconciler does for one infrastructure object
#[derive(Clone, Debug, PartialEq)]
pub struct InfraPlan {
    pub secrets: Vec<SecretRequest>,
    /// Applied in order; the object is ready when all are
    pub workloads: Vec<InfraWorkload>,
    /// Reason of `Ready=True`
    pub ready_reason: &'static str,
}

/// Status fields the infrastructure reconciler maintains
pub trait InfraStatusFields: Clone + Debug + Default + PartialEq + Serialize + Send + Sync {
    fn conditions(&self) -> &[Condition];
    fn set_conditions(&mut self, conditions: Vec<Condition>);
    fn set_observed_generation(&mut self, generation: Option<i64>);
}

impl InfraStatusFields for InfraStatus {
    fn conditions(&self) -> &[Condition] {
        &self.conditions
    }
    fn set_conditions(&mut self, conditions: Vec<Condition>) {
        self.conditions = conditions;
    }
    fn set_observed_generation(&mut self, generation: Option<i64>) {
        self.observed_generation = generation;
    }
}

impl InfraStatusFields for OVNNetworkStatus {
    fn conditions(&self) -> &[Condition] {
        &self.conditions
    }
    fn set_conditions(&mut self, conditions: Vec<Condition>) {
        self.conditions = conditions;
    }
    fn set_observed_generation(&mut self, generation: Option<i64>) {
        self.observed_generation = generation;
    }
}

/// An infrastructure kind driven by [`reconcile_infra`]
pub trait ManagedInfra:
    Resource<DynamicType = ()>
    + HasConditions
    + Clone
    + Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
    type Status: InfraStatusFields;

    fn infra_status(&self) -> Option<&Self::Status>;

    /// Build the plan; a validation error parks the object until its spec changes
    fn plan(&self) -> Result<InfraPlan>;

    /// Write the resolved endpoints into `status`
    fn record_endpoints(&self, status: &mut Self::Status);
}

fn set_ready<T: InfraStatusFields>(
    status: &mut T,
    ready: ConditionStatus,
    reason: &str,
    message: &str,
    generation: Option<i64>,
) {
    let conditions = set_condition(
        status.conditions(),
        types::READY,
        ready,
        reason,
        message,
        generation,
    );
    status.set_conditions(conditions);
}

/// Reconcile one infrastructure object
#[instrument(
    skip(obj, ctx),
    fields(service = %obj.name_any(), kind = %K::kind(&()))
)]
pub async fn reconcile_infra<K: ManagedInfra>(
    obj: Arc<K>,
    ctx: Arc<ServiceContext>,
) -> std::result::Result<Action, Error> {
    let client = ctx.kube.as_ref();
    let name = obj.name_any();
    let namespace = obj.namespace().unwrap_or_default();

    let Some(current) = get_typed::<K>(client, &namespace, &name).await? else {
        debug!("object no longer exists");
        return Ok(Action::await_change());
    };

    match ensure_lifecycle(client, &current).await? {
        Lifecycle::Finalized => return Ok(Action::await_change()),
        Lifecycle::FinalizerAdded => return Ok(Action::requeue(FINALIZER_REQUEUE)),
        Lifecycle::Active => {}
    }

    let generation = current.meta().generation;
    let previous = current.infra_status().cloned().unwrap_or_default();
    let mut status = previous.clone();

    let plan = match current.plan() {
        Ok(plan) => plan,
        Err(error @ Error::Validation { .. }) => {
            warn!(%error, "spec rejected");
            set_ready(
                &mut status,
                ConditionStatus::False,
                reasons::VALIDATION_FAILED,
                &error.to_string(),
                generation,
            );
            status.set_observed_generation(generation);
            if status != previous {
                patch_status_typed(client, &current, &status).await?;
                ctx.events
                    .publish(
                        &current.object_ref(&()),
                        EventType::Warning,
                        event_reasons::VALIDATION_FAILED,
                        actions::VALIDATE,
                        Some(error.to_string()),
                    )
                    .await;
            }
            return Ok(Action::await_change());
        }
        Err(error) => return Err(error),
    };

    let owner = Owner::of(&current)?;
    for secret in &plan.secrets {
        ensure_secret(client, &owner, &secret.name, &secret.keys).await?;
    }

    let mut pending = None;
    for workload in &plan.workloads {
        if let Some(front) = &workload.service {
            ensure_service(client, &owner, &front.name, &workload.spec, front.headless).await?;
        }
        let ready = match workload.kind {
            WorkloadKind::StatefulSet => {
                let service = workload
                    .service
                    .as_ref()
                    .map(|f| f.name.as_str())
                    .unwrap_or(workload.spec.name.as_str());
                ensure_statefulset(client, &owner, &workload.spec, service).await?;
                is_statefulset_ready(client, &namespace, &workload.spec.name).await?
            }
            WorkloadKind::Deployment => {
                ensure_deployment(client, &owner, &workload.spec).await?;
                is_deployment_ready(client, &namespace, &workload.spec.name).await?
            }
        };
        if !ready && pending.is_none() {
            pending = Some(workload.spec.name.clone());
        }
    }

    current.record_endpoints(&mut status);
    status.set_observed_generation(generation);
    let action = match &pending {
        Some(workload) => {
            set_ready(
                &mut status,
                ConditionStatus::False,
                reasons::DEPLOYMENT_PENDING,
                &format!("Waiting for {}", workload),
                generation,
            );
            Action::requeue(ctx.rollout_requeue)
        }
        None => {
            set_ready(
                &mut status,
                ConditionStatus::True,
                plan.ready_reason,
                &format!("{} is ready", K::kind(&())),
                generation,
            );
            Action::await_change()
        }
    };

    if status == previous {
        return Ok(action);
    }
    patch_status_typed(client, &current, &status).await?;

    if pending.is_none() && !current.is_ready() {
        info!("infrastructure is ready");
        ctx.events
            .publish(
                &current.object_ref(&()),
                EventType::Normal,
                event_reasons::SERVICE_READY,
                actions::RECONCILE,
                Some(format!("{} is ready", K::kind(&()))),
            )
            .await;
    }
    Ok(action)
}
