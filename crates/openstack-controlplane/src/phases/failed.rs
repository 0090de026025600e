//! Failed phase handler.
//!
//! A control plane whose spec fails validation parks here. Nothing is
//! retried until the spec is edited; an edit that validates restarts the
//! rollout from Pending.

use kube::runtime::controller::Action;
use kube::runtime::events::EventType;
use kube::{Resource, ResourceExt};
use tracing::{debug, info, warn};

use openstack_common::conditions::{reasons, set_condition, types};
use openstack_common::crd::{ConditionStatus, ControlPlanePhase, OpenStackControlPlane};
use openstack_common::events::{actions, reasons as event_reasons};
use openstack_common::store::patch_status_typed;

use super::handle_pending;
use crate::controller::Context;
use crate::Error;

/// Move the control plane to Failed with `error` as the `Ready` message
pub async fn fail(
    cp: &OpenStackControlPlane,
    ctx: &Context,
    error: &Error,
) -> Result<Action, Error> {
    let previous = cp.status.clone().unwrap_or_default();
    let generation = cp.meta().generation;
    let message = error.to_string();

    let mut status = previous.clone();
    status.phase = Some(ControlPlanePhase::Failed);
    status.observed_generation = generation;
    status.conditions = set_condition(
        &status.conditions,
        types::READY,
        ConditionStatus::False,
        reasons::VALIDATION_FAILED,
        &message,
        generation,
    );
    if status == previous {
        return Ok(Action::await_change());
    }

    patch_status_typed(ctx.kube.as_ref(), cp, &status).await?;
    ctx.events
        .publish(
            &cp.object_ref(&()),
            EventType::Warning,
            event_reasons::VALIDATION_FAILED,
            actions::VALIDATE,
            Some(message),
        )
        .await;
    Ok(Action::await_change())
}

/// Handle a control plane in the Failed phase
pub async fn handle_failed(cp: &OpenStackControlPlane, ctx: &Context) -> Result<Action, Error> {
    let observed = cp.status.as_ref().and_then(|s| s.observed_generation);
    if observed == cp.meta().generation {
        debug!("spec unchanged since failure");
        return Ok(Action::await_change());
    }

    match cp.spec.validate(&cp.name_any()) {
        Err(e) => {
            warn!(error = %e, "edited spec is still invalid");
            fail(cp, ctx, &e).await
        }
        Ok(()) => {
            info!("spec fixed, restarting rollout");
            handle_pending(cp, ctx).await
        }
    }
}
