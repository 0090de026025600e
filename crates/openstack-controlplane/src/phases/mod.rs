//! Phase handlers for the OpenStackControlPlane controller.
//!
//! Each rollout phase has its own module. A handler waits on the tier
//! created by the previous phase, creates the next tier, and records the
//! new phase in one status write.

mod compute;
mod core_services;
mod failed;
mod identity;
mod infrastructure;
mod pending;
mod ready;

pub use compute::handle_compute;
pub use core_services::handle_core_services;
pub use failed::{fail, handle_failed};
pub use identity::handle_identity;
pub use infrastructure::handle_infrastructure;
pub use pending::handle_pending;
pub use ready::handle_ready;

use kube::runtime::controller::Action;
use kube::runtime::events::EventType;
use kube::{Resource, ResourceExt};
use serde::Serialize;
use tracing::{debug, info};

use openstack_common::apply::create_if_absent;
use openstack_common::conditions::{reasons, set_condition, types};
use openstack_common::crd::{ConditionStatus, ControlPlanePhase, OpenStackControlPlane};
use openstack_common::events::{actions, reasons as event_reasons};
use openstack_common::kube_utils::Owner;
use openstack_common::readiness::{first_not_ready, ChildRef};
use openstack_common::store::patch_status_typed;

use crate::controller::Context;
use crate::Error;

/// Record `phase` with the current generation and the matching `Ready`
/// condition, then announce the transition.
pub async fn set_phase(
    cp: &OpenStackControlPlane,
    ctx: &Context,
    phase: ControlPlanePhase,
) -> Result<(), Error> {
    let previous = cp.status.clone().unwrap_or_default();
    let from = previous.phase.unwrap_or_default();
    let generation = cp.meta().generation;

    let (ready, reason, message) = match phase {
        ControlPlanePhase::Ready => (
            ConditionStatus::True,
            reasons::CONTROL_PLANE_READY,
            "All services are ready".to_string(),
        ),
        other => (
            ConditionStatus::False,
            reasons::RECONCILING,
            format!("Rolling out phase {}", other),
        ),
    };

    let mut status = previous;
    status.phase = Some(phase);
    status.observed_generation = generation;
    status.conditions = set_condition(
        &status.conditions,
        types::READY,
        ready,
        reason,
        &message,
        generation,
    );
    patch_status_typed(ctx.kube.as_ref(), cp, &status).await?;

    info!(%from, to = %phase, "phase changed");
    let object = cp.object_ref(&());
    ctx.events
        .publish(
            &object,
            EventType::Normal,
            event_reasons::PHASE_CHANGED,
            actions::RECONCILE,
            Some(format!("{} -> {}", from, phase)),
        )
        .await;
    if phase == ControlPlanePhase::Ready {
        ctx.events
            .publish(
                &object,
                EventType::Normal,
                event_reasons::CONTROL_PLANE_READY,
                actions::RECONCILE,
                Some(message),
            )
            .await;
    }
    Ok(())
}

/// Requeue while any of `children` is not ready; `None` once all are.
pub async fn wait_for(ctx: &Context, children: &[ChildRef]) -> Result<Option<Action>, Error> {
    match first_not_ready(ctx.kube.as_ref(), children).await? {
        Some(child) => {
            debug!(%child, "waiting for child");
            Ok(Some(Action::requeue(ctx.gate_requeue)))
        }
        None => Ok(None),
    }
}

/// Create `child` owned by the control plane unless it already exists
pub async fn ensure_child<K>(
    cp: &OpenStackControlPlane,
    ctx: &Context,
    owner: &Owner,
    child: K,
) -> Result<(), Error>
where
    K: Resource<DynamicType = ()> + Serialize,
{
    let kind = K::kind(&()).to_string();
    let name = child.name_any();
    if create_if_absent(ctx.kube.as_ref(), Some(owner), child).await? {
        info!(%kind, child = %name, "created child");
        ctx.events
            .publish(
                &cp.object_ref(&()),
                EventType::Normal,
                event_reasons::CHILD_CREATED,
                actions::PROVISION,
                Some(format!("Created {} {}", kind, name)),
            )
            .await;
    }
    Ok(())
}
