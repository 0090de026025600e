//! OpenStackControlPlane controller implementation
//!
//! Drives a control plane through its rollout phases. Each tick re-reads the
//! object, settles its finalizer, validates the spec, and hands off to the
//! handler of the current phase, which takes at most one step forward.

use std::sync::Arc;
use std::time::Duration;

use kube::runtime::controller::Action;
use kube::{Client, ResourceExt};
use tracing::{debug, error, info, instrument, warn};

use openstack_common::crd::{ControlPlanePhase, OpenStackControlPlane};
use openstack_common::events::{EventPublisher, KubeEventPublisher};
use openstack_common::finalizer::{ensure_lifecycle, Lifecycle};
use openstack_common::store::{get_typed, KubeClient, KubeClientImpl};

use crate::phases::{
    fail, handle_compute, handle_core_services, handle_failed, handle_identity,
    handle_infrastructure, handle_pending, handle_ready,
};
use crate::Error;

/// Requeue delay while a gate waits on children
pub const GATE_REQUEUE: Duration = Duration::from_secs(10);

/// Requeue delay of the steady-state readiness check
pub const READY_REQUEUE: Duration = Duration::from_secs(60);

/// Requeue delay after a failed reconciliation
pub const ERROR_REQUEUE: Duration = Duration::from_secs(5);

/// Controller context for OpenStackControlPlane reconciliation
pub struct Context {
    /// Object store client (trait object for testability)
    pub kube: Arc<dyn KubeClient>,
    /// Event publisher for emitting Kubernetes Events
    pub events: Arc<dyn EventPublisher>,
    /// Requeue delay while a gate waits on children
    pub gate_requeue: Duration,
    /// Requeue delay once the control plane is Ready
    pub ready_requeue: Duration,
}

impl Context {
    /// Create a new context with the given dependencies
    pub fn new(kube: Arc<dyn KubeClient>, events: Arc<dyn EventPublisher>) -> Self {
        Self {
            kube,
            events,
            gate_requeue: GATE_REQUEUE,
            ready_requeue: READY_REQUEUE,
        }
    }

    /// Create a new context from a Kubernetes client
    pub fn from_client(client: Client) -> Self {
        let events = Arc::new(KubeEventPublisher::new(
            client.clone(),
            "openstack-controlplane-controller",
        ));
        Self::new(Arc::new(KubeClientImpl::new(client)), events)
    }

    /// Override the gate requeue delay
    pub fn with_gate_requeue(mut self, delay: Duration) -> Self {
        self.gate_requeue = delay;
        self
    }

    /// Create a context for testing with a no-op event publisher
    #[cfg(test)]
    pub fn for_testing(kube: Arc<dyn KubeClient>) -> Self {
        Self::new(kube, Arc::new(openstack_common::events::NoopEventPublisher))
    }
}

/// Reconcile an OpenStackControlPlane
#[instrument(skip(cp, ctx), fields(controlplane = %cp.name_any()))]
pub async fn reconcile(
    cp: Arc<OpenStackControlPlane>,
    ctx: Arc<Context>,
) -> Result<Action, Error> {
    let client = ctx.kube.as_ref();
    let name = cp.name_any();
    let namespace = cp.namespace().unwrap_or_default();

    let Some(current) = get_typed::<OpenStackControlPlane>(client, &namespace, &name).await?
    else {
        debug!("control plane no longer exists");
        return Ok(Action::await_change());
    };

    let current = match ensure_lifecycle(client, &current).await? {
        Lifecycle::Finalized => {
            info!("control plane finalized");
            return Ok(Action::await_change());
        }
        // The finalizer write moved the resourceVersion; carry on from the stored copy
        Lifecycle::FinalizerAdded => {
            match get_typed::<OpenStackControlPlane>(client, &namespace, &name).await? {
                Some(cp) => cp,
                None => return Ok(Action::await_change()),
            }
        }
        Lifecycle::Active => current,
    };

    let phase = current
        .status
        .as_ref()
        .and_then(|s| s.phase)
        .unwrap_or_default();
    debug!(%phase, "current phase");

    // Ready validates edits itself and never leaves Ready
    if !matches!(phase, ControlPlanePhase::Ready | ControlPlanePhase::Failed) {
        if let Err(e) = current.spec.validate(&name) {
            warn!(error = %e, "control plane validation failed");
            return fail(&current, &ctx, &e).await;
        }
    }

    match phase {
        ControlPlanePhase::Pending => handle_pending(&current, &ctx).await,
        ControlPlanePhase::Infrastructure => handle_infrastructure(&current, &ctx).await,
        ControlPlanePhase::Identity => handle_identity(&current, &ctx).await,
        ControlPlanePhase::CoreServices => handle_core_services(&current, &ctx).await,
        ControlPlanePhase::Compute => handle_compute(&current, &ctx).await,
        ControlPlanePhase::Ready => handle_ready(&current, &ctx).await,
        ControlPlanePhase::Failed => handle_failed(&current, &ctx).await,
    }
}

/// Error policy for the controller: log and retry after a short delay
pub fn error_policy(cp: Arc<OpenStackControlPlane>, error: &Error, _ctx: Arc<Context>) -> Action {
    error!(
        ?error,
        controlplane = %cp.name_any(),
        retryable = error.is_retryable(),
        "reconciliation failed"
    );
    Action::requeue(ERROR_REQUEUE)
}
