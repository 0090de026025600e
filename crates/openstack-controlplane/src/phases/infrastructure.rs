//! Infrastructure phase handler.

use kube::runtime::controller::Action;

use openstack_common::crd::{ControlPlanePhase, OpenStackControlPlane};
use openstack_common::kube_utils::Owner;

use super::{ensure_child, set_phase, wait_for};
use crate::controller::Context;
use crate::defaults;
use crate::Error;

/// Wait for the infrastructure tier, then create Keystone
pub async fn handle_infrastructure(
    cp: &OpenStackControlPlane,
    ctx: &Context,
) -> Result<Action, Error> {
    if let Some(action) = wait_for(ctx, &defaults::infrastructure_refs(cp)).await? {
        return Ok(action);
    }

    let owner = Owner::of(cp)?;
    ensure_child(cp, ctx, &owner, defaults::keystone(cp)).await?;

    set_phase(cp, ctx, ControlPlanePhase::Identity).await?;
    Ok(Action::requeue(ctx.gate_requeue))
}
