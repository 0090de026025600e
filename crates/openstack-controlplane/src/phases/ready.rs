//! Ready phase handler.
//!
//! Ready is the steady state and is never left. Spec edits converge every
//! child of the enabled tiers; the `Ready` condition follows the health of
//! the children.

use kube::runtime::controller::Action;
use kube::runtime::events::EventType;
use kube::{Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use openstack_common::apply::{create_or_update, ApplyOutcome};
use openstack_common::conditions::{is_ready, reasons, set_condition, types};
use openstack_common::crd::{
    ConditionStatus, Database, Glance, Keystone, Memcached, Neutron, Nova, OVNNetwork,
    OpenStackControlPlane, Placement, RabbitMQ,
};
use openstack_common::events::{actions, reasons as event_reasons};
use openstack_common::kube_utils::Owner;
use openstack_common::readiness::first_not_ready;
use openstack_common::store::patch_status_typed;

use crate::controller::Context;
use crate::defaults;
use crate::Error;

/// A child whose spec the control plane owns outright
trait OwnedSpec:
    Resource<DynamicType = ()> + Default + Serialize + DeserializeOwned + Send + Sync
{
    fn adopt_spec(&mut self, desired: &Self);
}

macro_rules! impl_owned_spec {
    ($($kind:ty),* $(,)?) => {
        $(
            impl OwnedSpec for $kind {
                fn adopt_spec(&mut self, desired: &Self) {
                    self.spec = desired.spec.clone();
                }
            }
        )*
    };
}

impl_owned_spec!(
    Database, RabbitMQ, Memcached, OVNNetwork, Keystone, Glance, Placement, Neutron, Nova,
);

async fn converge<K: OwnedSpec>(ctx: &Context, owner: &Owner, desired: K) -> Result<(), Error> {
    let name = desired.name_any();
    let outcome = create_or_update::<K, _>(ctx.kube.as_ref(), owner, &name, |current| {
        if let Some(labels) = &desired.meta().labels {
            current.labels_mut().extend(labels.clone());
        }
        current.adopt_spec(&desired);
    })
    .await?;
    if outcome != ApplyOutcome::Unchanged {
        info!(kind = %K::kind(&()), child = %name, ?outcome, "converged child");
    }
    Ok(())
}

/// Bring every child of the enabled tiers to the current spec
async fn converge_children(cp: &OpenStackControlPlane, ctx: &Context) -> Result<(), Error> {
    let owner = Owner::of(cp)?;
    converge(ctx, &owner, defaults::database(cp)).await?;
    converge(ctx, &owner, defaults::rabbitmq(cp)).await?;
    converge(ctx, &owner, defaults::memcached(cp)).await?;
    if let Some(ovn) = defaults::ovn_network(cp) {
        converge(ctx, &owner, ovn).await?;
    }
    converge(ctx, &owner, defaults::keystone(cp)).await?;
    converge(ctx, &owner, defaults::glance(cp)).await?;
    converge(ctx, &owner, defaults::placement(cp)).await?;
    converge(ctx, &owner, defaults::neutron(cp)).await?;
    converge(ctx, &owner, defaults::nova(cp)).await
}

/// Handle a control plane in the Ready phase
pub async fn handle_ready(cp: &OpenStackControlPlane, ctx: &Context) -> Result<Action, Error> {
    let client = ctx.kube.as_ref();
    let generation = cp.meta().generation;
    let previous = cp.status.clone().unwrap_or_default();
    let mut status = previous.clone();

    if generation != previous.observed_generation {
        if let Err(e) = cp.spec.validate(&cp.name_any()) {
            warn!(error = %e, "rejected spec edit");
            status.conditions = set_condition(
                &status.conditions,
                types::READY,
                ConditionStatus::False,
                reasons::VALIDATION_FAILED,
                &e.to_string(),
                generation,
            );
            if status != previous {
                patch_status_typed(client, cp, &status).await?;
                ctx.events
                    .publish(
                        &cp.object_ref(&()),
                        EventType::Warning,
                        event_reasons::VALIDATION_FAILED,
                        actions::VALIDATE,
                        Some(e.to_string()),
                    )
                    .await;
            }
            return Ok(Action::await_change());
        }

        info!(?generation, "spec changed, converging children");
        converge_children(cp, ctx).await?;
        status.observed_generation = generation;
    }

    let (ready, reason, message) = match first_not_ready(client, &defaults::all_refs(cp)).await? {
        Some(child) => (
            ConditionStatus::False,
            reasons::DEGRADED,
            format!("{} is not ready", child),
        ),
        None => (
            ConditionStatus::True,
            reasons::CONTROL_PLANE_READY,
            "All services are ready".to_string(),
        ),
    };
    let now_ready = ready == ConditionStatus::True;
    status.conditions = set_condition(
        &status.conditions,
        types::READY,
        ready,
        reason,
        &message,
        generation,
    );

    if status == previous {
        debug!("control plane unchanged");
        return Ok(Action::requeue(ctx.ready_requeue));
    }
    patch_status_typed(client, cp, &status).await?;

    let was_ready = is_ready(&previous.conditions);
    if was_ready != now_ready {
        let (type_, reason) = if now_ready {
            (EventType::Normal, event_reasons::CONTROL_PLANE_READY)
        } else {
            warn!(%message, "control plane degraded");
            (EventType::Warning, event_reasons::DEGRADED)
        };
        ctx.events
            .publish(
                &cp.object_ref(&()),
                type_,
                reason,
                actions::RECONCILE,
                Some(message),
            )
            .await;
    }
    Ok(Action::requeue(ctx.ready_requeue))
}
