//! CoreServices phase handler.

use kube::runtime::controller::Action;

use openstack_common::crd::{ControlPlanePhase, OpenStackControlPlane};
use openstack_common::kube_utils::Owner;

use super::{ensure_child, set_phase, wait_for};
use crate::controller::Context;
use crate::defaults;
use crate::Error;

/// Wait for Glance, Placement, and Neutron, then create Nova
pub async fn handle_core_services(
    cp: &OpenStackControlPlane,
    ctx: &Context,
) -> Result<Action, Error> {
    if let Some(action) = wait_for(ctx, &defaults::core_service_refs(cp)).await? {
        return Ok(action);
    }

    let owner = Owner::of(cp)?;
    ensure_child(cp, ctx, &owner, defaults::nova(cp)).await?;

    set_phase(cp, ctx, ControlPlanePhase::Compute).await?;
    Ok(Action::requeue(ctx.gate_requeue))
}
