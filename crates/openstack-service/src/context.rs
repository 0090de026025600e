//! Shared context of the service and infrastructure controllers

use std::sync::Arc;
use std::time::Duration;

use kube::Client;
use openstack_common::events::{EventPublisher, KubeEventPublisher};
use openstack_common::job::JobDelays;
use openstack_common::store::{KubeClient, KubeClientImpl};

/// Requeue delay while a workload is still rolling out
pub const ROLLOUT_REQUEUE: Duration = Duration::from_secs(10);

/// Requeue delay right after the finalizer was added
pub const FINALIZER_REQUEUE: Duration = Duration::from_secs(1);

/// Context for the service and infrastructure controllers
pub struct ServiceContext {
    /// Object store client
    pub kube: Arc<dyn KubeClient>,
    /// Event publisher for emitting Kubernetes Events
    pub events: Arc<dyn EventPublisher>,
    /// Retry delays of the job gates
    pub delays: JobDelays,
    /// Requeue delay while a workload is rolling out
    pub rollout_requeue: Duration,
}

impl ServiceContext {
    /// Create a new ServiceContext with the given dependencies
    pub fn new(kube: Arc<dyn KubeClient>, events: Arc<dyn EventPublisher>) -> Self {
        Self {
            kube,
            events,
            delays: JobDelays::default(),
            rollout_requeue: ROLLOUT_REQUEUE,
        }
    }

    /// Create a new ServiceContext from a Kubernetes client
    pub fn from_client(client: Client) -> Self {
        let events = Arc::new(KubeEventPublisher::new(
            client.clone(),
            "openstack-service-controller",
        ));
        Self::new(Arc::new(KubeClientImpl::new(client)), events)
    }

    /// Override the job gate delays
    pub fn with_delays(mut self, delays: JobDelays) -> Self {
        self.delays = delays;
        self
    }

    /// Override the rollout requeue delay
    pub fn with_rollout_requeue(mut self, delay: Duration) -> Self {
        self.rollout_requeue = delay;
        self
    }

    /// Create a context for testing with a no-op event publisher
    #[cfg(test)]
    pub fn for_testing(kube: Arc<dyn KubeClient>) -> Self {
        Self::new(kube, Arc::new(openstack_common::events::NoopEventPublisher))
    }
}
