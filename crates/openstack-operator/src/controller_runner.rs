//! Controller runner - builds one controller future per managed kind
//!
//! Each controller watches its primary kind plus the children it owns, so a
//! change to a child re-triggers the owner. The caller joins the futures.

use std::fmt::Debug;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{Secret, Service};
use k8s_openapi::NamespaceResourceScope;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::Controller;
use kube::{Api, Client, Resource};
use serde::de::DeserializeOwned;

use openstack_common::crd::{
    Database, Glance, Keystone, Memcached, Neutron, Nova, OVNNetwork, OpenStackControlPlane,
    Placement, RabbitMQ,
};
use openstack_controlplane::{error_policy as controlplane_error_policy, reconcile, Context};
use openstack_service::{
    error_policy, reconcile_infra, reconcile_service, ManagedInfra, ManagedService,
    ServiceContext,
};

/// Watcher timeout (seconds) - must be less than client read_timeout (30s)
/// This forces the API server to close the watch before the client times out,
/// preventing "body read timed out" errors on idle watches.
const WATCH_TIMEOUT_SECS: u32 = 25;

/// A running controller
pub type ControllerFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Settings shared by every controller
#[derive(Clone, Debug)]
pub struct RunnerConfig {
    /// Namespace to watch; all namespaces when `None`
    pub namespace: Option<String>,
    /// Requeue delay while waiting on rollouts and children
    pub requeue: Duration,
}

fn watcher() -> WatcherConfig {
    WatcherConfig::default().timeout(WATCH_TIMEOUT_SECS)
}

fn scoped<K>(client: &Client, namespace: Option<&str>) -> Api<K>
where
    K: Resource<Scope = NamespaceResourceScope>,
    K::DynamicType: Default,
{
    match namespace {
        Some(ns) => Api::namespaced(client.clone(), ns),
        None => Api::all(client.clone()),
    }
}

/// Build the OpenStackControlPlane controller
pub fn build_controlplane_controller(client: Client, config: &RunnerConfig) -> ControllerFuture {
    let ns = config.namespace.as_deref();
    let ctx = Arc::new(Context::from_client(client.clone()).with_gate_requeue(config.requeue));

    tracing::info!("- OpenStackControlPlane controller");
    Box::pin(
        Controller::new(scoped::<OpenStackControlPlane>(&client, ns), watcher())
            .owns(scoped::<Database>(&client, ns), watcher())
            .owns(scoped::<RabbitMQ>(&client, ns), watcher())
            .owns(scoped::<Memcached>(&client, ns), watcher())
            .owns(scoped::<OVNNetwork>(&client, ns), watcher())
            .owns(scoped::<Keystone>(&client, ns), watcher())
            .owns(scoped::<Glance>(&client, ns), watcher())
            .owns(scoped::<Placement>(&client, ns), watcher())
            .owns(scoped::<Neutron>(&client, ns), watcher())
            .owns(scoped::<Nova>(&client, ns), watcher())
            .shutdown_on_signal()
            .run(reconcile, controlplane_error_policy, ctx)
            .for_each(log_reconcile_result("OpenStackControlPlane")),
    )
}

fn service_controller<S>(
    client: &Client,
    ns: Option<&str>,
    ctx: Arc<ServiceContext>,
    name: &'static str,
) -> ControllerFuture
where
    S: ManagedService + Resource<Scope = NamespaceResourceScope>,
{
    Box::pin(
        Controller::new(scoped::<S>(client, ns), watcher())
            .owns(scoped::<Deployment>(client, ns), watcher())
            .owns(scoped::<Service>(client, ns), watcher())
            .owns(scoped::<Job>(client, ns), watcher())
            .owns(scoped::<Secret>(client, ns), watcher())
            .shutdown_on_signal()
            .run(reconcile_service::<S>, error_policy::<S>, ctx)
            .for_each(log_reconcile_result(name)),
    )
}

/// Build the Keystone, Glance, Placement, Neutron, and Nova controllers
pub fn build_service_controllers(client: Client, config: &RunnerConfig) -> Vec<ControllerFuture> {
    let ns = config.namespace.as_deref();
    let ctx = Arc::new(
        ServiceContext::from_client(client.clone()).with_rollout_requeue(config.requeue),
    );

    tracing::info!("- Keystone controller");
    tracing::info!("- Glance controller");
    tracing::info!("- Placement controller");
    tracing::info!("- Neutron controller");
    tracing::info!("- Nova controller");

    vec![
        service_controller::<Keystone>(&client, ns, ctx.clone(), "Keystone"),
        service_controller::<Glance>(&client, ns, ctx.clone(), "Glance"),
        service_controller::<Placement>(&client, ns, ctx.clone(), "Placement"),
        service_controller::<Neutron>(&client, ns, ctx.clone(), "Neutron"),
        service_controller::<Nova>(&client, ns, ctx, "Nova"),
    ]
}

fn infra_controller<K, C>(
    client: &Client,
    ns: Option<&str>,
    ctx: Arc<ServiceContext>,
    name: &'static str,
) -> ControllerFuture
where
    K: ManagedInfra + Resource<Scope = NamespaceResourceScope>,
    C: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
        + Clone
        + DeserializeOwned
        + Debug
        + Send
        + Sync
        + 'static,
{
    Box::pin(
        Controller::new(scoped::<K>(client, ns), watcher())
            .owns(scoped::<C>(client, ns), watcher())
            .owns(scoped::<Service>(client, ns), watcher())
            .owns(scoped::<Secret>(client, ns), watcher())
            .shutdown_on_signal()
            .run(reconcile_infra::<K>, error_policy::<K>, ctx)
            .for_each(log_reconcile_result(name)),
    )
}

/// Build the Database, RabbitMQ, Memcached, and OVNNetwork controllers
pub fn build_infra_controllers(client: Client, config: &RunnerConfig) -> Vec<ControllerFuture> {
    let ns = config.namespace.as_deref();
    let ctx = Arc::new(
        ServiceContext::from_client(client.clone()).with_rollout_requeue(config.requeue),
    );

    tracing::info!("- Database controller");
    tracing::info!("- RabbitMQ controller");
    tracing::info!("- Memcached controller");
    tracing::info!("- OVNNetwork controller");

    // OVN owns StatefulSets and a Deployment
    let ovn: ControllerFuture = Box::pin(
        Controller::new(scoped::<OVNNetwork>(&client, ns), watcher())
            .owns(scoped::<StatefulSet>(&client, ns), watcher())
            .owns(scoped::<Deployment>(&client, ns), watcher())
            .owns(scoped::<Service>(&client, ns), watcher())
            .shutdown_on_signal()
            .run(
                reconcile_infra::<OVNNetwork>,
                error_policy::<OVNNetwork>,
                ctx.clone(),
            )
            .for_each(log_reconcile_result("OVNNetwork")),
    );

    vec![
        infra_controller::<Database, StatefulSet>(&client, ns, ctx.clone(), "Database"),
        infra_controller::<RabbitMQ, StatefulSet>(&client, ns, ctx.clone(), "RabbitMQ"),
        infra_controller::<Memcached, Deployment>(&client, ns, ctx, "Memcached"),
        ovn,
    ]
}

/// Creates a closure for logging reconciliation results.
fn log_reconcile_result<T: Debug, E: Debug>(
    controller_name: &'static str,
) -> impl Fn(Result<T, E>) -> std::future::Ready<()> {
    move |result| {
        match result {
            Ok(action) => tracing::debug!(?action, "{} reconciliation completed", controller_name),
            Err(e) => tracing::error!(error = ?e, "{} reconciliation error", controller_name),
        }
        std::future::ready(())
    }
}
