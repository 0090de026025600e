//! Pending phase handler.
//!
//! Creates the infrastructure tier: database, message broker, cache, and
//! the OVN databases when the network backend is OVN.

use kube::runtime::controller::Action;
use tracing::info;

use openstack_common::crd::{ControlPlanePhase, OpenStackControlPlane};
use openstack_common::kube_utils::Owner;

use super::{ensure_child, set_phase};
use crate::controller::Context;
use crate::defaults;
use crate::Error;

/// Handle a control plane in the Pending phase (or with no phase yet)
pub async fn handle_pending(cp: &OpenStackControlPlane, ctx: &Context) -> Result<Action, Error> {
    let owner = Owner::of(cp)?;

    info!("creating infrastructure tier");
    ensure_child(cp, ctx, &owner, defaults::database(cp)).await?;
    ensure_child(cp, ctx, &owner, defaults::rabbitmq(cp)).await?;
    ensure_child(cp, ctx, &owner, defaults::memcached(cp)).await?;
    if let Some(ovn) = defaults::ovn_network(cp) {
        ensure_child(cp, ctx, &owner, ovn).await?;
    }

    set_phase(cp, ctx, ControlPlanePhase::Infrastructure).await?;
    Ok(Action::requeue(ctx.gate_requeue))
}
