//! Compute phase handler.

use kube::runtime::controller::Action;
use tracing::info;

use openstack_common::crd::{ControlPlanePhase, OpenStackControlPlane};

use super::{set_phase, wait_for};
use crate::controller::Context;
use crate::defaults;
use crate::Error;

/// Wait for Nova, then declare the control plane Ready
pub async fn handle_compute(cp: &OpenStackControlPlane, ctx: &Context) -> Result<Action, Error> {
    if let Some(action) = wait_for(ctx, &defaults::compute_refs(cp)).await? {
        return Ok(action);
    }

    info!("every tier is ready");
    set_phase(cp, ctx, ControlPlanePhase::Ready).await?;
    Ok(Action::requeue(ctx.ready_requeue))
}
