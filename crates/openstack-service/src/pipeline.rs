//! Per-service reconciliation pipeline
//!
//! Every API service runs the same ordered steps; only the [`ServicePlan`]
//! differs between kinds:
//!
//! 1. finalizer lifecycle
//! 2. credential secrets (generated once)
//! 3. provisioning jobs (db-create, db-sync, extra migrations), each gated
//! 4. Deployments, the API Service, and the HTTPRoute when exposed
//! 5. registration job (bootstrap or catalog endpoints), gated
//! 6. status: endpoint, conditions, observed generation
//!
//! An unsatisfied gate ends the tick early with `Ready=False` written to the
//! status; later steps never run before earlier ones are satisfied.

use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use kube::runtime::controller::Action;
use kube::runtime::events::EventType;
use kube::{Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error, info, instrument};

use openstack_common::conditions::{reasons, set_condition, types, HasConditions};
use openstack_common::credentials::ensure_secret;
use openstack_common::crd::{ConditionStatus, GatewayRef, ServiceStatus};
use openstack_common::events::{actions, reasons as event_reasons};
use openstack_common::finalizer::{ensure_lifecycle, Lifecycle};
use openstack_common::job::{run_step, JobStep, JobWait};
use openstack_common::kube_utils::Owner;
use openstack_common::readiness::is_deployment_ready;
use openstack_common::route::{ensure_http_route, RouteParams};
use openstack_common::store::{get_typed, patch_status_typed};
use openstack_common::Result;

use crate::context::{ServiceContext, FINALIZER_REQUEUE};
use crate::workload::{ensure_deployment, ensure_service, WorkloadSpec};
use crate::Error;

/// Requeue delay after a failed reconciliation
pub const ERROR_REQUEUE: Duration = Duration::from_secs(5);

/// A Secret generated once for the service
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SecretRequest {
    /// Secret name
    pub name: String,
    /// Keys and the length of the random value generated for each
    pub keys: Vec<(&'static str, usize)>,
}

/// How the API is reached
#[derive(Clone, Debug, PartialEq)]
pub struct ApiSpec {
    /// Name of the Service in front of the API Deployment
    pub service_name: String,
    /// API port
    pub port: u16,
    /// In-cluster URL, including the version path
    pub internal_url: String,
    /// Public URL; the internal one when no hostname is set
    pub public_url: String,
    /// Endpoint reported in the status
    pub api_endpoint: String,
    /// Public hostname
    pub hostname: Option<String>,
    /// Gateway the route attaches to
    pub gateway: Option<GatewayRef>,
}

impl ApiSpec {
    /// Returns true when the API gets an HTTPRoute
    pub fn is_exposed(&self) -> bool {
        self.hostname.is_some() || self.gateway.as_ref().is_some_and(|g| !g.name.is_empty())
    }
}

/// Everything the pipeline does for one service object
#[derive(Clone, Debug, PartialEq)]
pub struct ServicePlan {
    /// Generated credential secrets
    pub secrets: Vec<SecretRequest>,
    /// Provisioning jobs, gated in order
    pub provisioning: Vec<JobStep>,
    /// The API Deployment; its readiness is the service's readiness
    pub api: WorkloadSpec,
    /// Additional Deployments (e.g. scheduler, conductor)
    pub workers: Vec<WorkloadSpec>,
    /// API exposure
    pub endpoint: ApiSpec,
    /// Registration job, gated after the workloads are applied
    pub registration: JobStep,
}

/// An API service kind driven by [`reconcile_service`]
pub trait ManagedService:
    Resource<DynamicType = ()>
    + HasConditions
    + Clone
    + Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
    /// Name suffix the control plane gives objects of this kind
    const SUFFIX: &'static str;

    /// Current status, if any was written
    fn service_status(&self) -> Option<&ServiceStatus>;

    /// Build the plan for this object
    fn plan(&self) -> Result<ServicePlan>;
}

/// Where the pipeline stopped
#[derive(Clone, Debug, PartialEq, Eq)]
enum Progress {
    /// A job gate is not satisfied yet
    Waiting { job: String, retry: Duration },
    /// Everything is applied; the API Deployment is still rolling out
    RollingOut { deployment: String },
    /// The API Deployment is fully rolled out
    Ready,
}

/// Reconcile one API service object
#[instrument(
    skip(obj, ctx),
    fields(service = %obj.name_any(), kind = %S::kind(&()))
)]
pub async fn reconcile_service<S: ManagedService>(
    obj: Arc<S>,
    ctx: Arc<ServiceContext>,
) -> std::result::Result<Action, Error> {
    let client = ctx.kube.as_ref();
    let name = obj.name_any();
    let namespace = obj.namespace().unwrap_or_default();

    let Some(current) = get_typed::<S>(client, &namespace, &name).await? else {
        debug!("object no longer exists");
        return Ok(Action::await_change());
    };

    match ensure_lifecycle(client, &current).await? {
        Lifecycle::Finalized => return Ok(Action::await_change()),
        Lifecycle::FinalizerAdded => return Ok(Action::requeue(FINALIZER_REQUEUE)),
        Lifecycle::Active => {}
    }

    let owner = Owner::of(&current)?;
    let plan = current.plan()?;
    let generation = current.meta().generation;
    let previous = current.service_status().cloned().unwrap_or_default();
    let mut status = previous.clone();

    let progress = run_pipeline(&ctx, &current, &owner, &plan, &mut status, generation).await?;

    let (ready, reason, message, action) = match &progress {
        Progress::Waiting { job, retry } => (
            ConditionStatus::False,
            reasons::RECONCILING,
            format!("Waiting for job {}", job),
            Action::requeue(*retry),
        ),
        Progress::RollingOut { deployment } => (
            ConditionStatus::False,
            reasons::DEPLOYMENT_PENDING,
            format!("Waiting for deployment {}", deployment),
            Action::requeue(ctx.rollout_requeue),
        ),
        Progress::Ready => (
            ConditionStatus::True,
            reasons::DEPLOYMENT_READY,
            format!("{} is ready", S::kind(&())),
            Action::await_change(),
        ),
    };
    if !matches!(progress, Progress::Waiting { .. }) {
        status.observed_generation = generation;
    }
    status.conditions = set_condition(
        &status.conditions,
        types::READY,
        ready,
        reason,
        &message,
        generation,
    );

    if status == previous {
        debug!("status unchanged, skipping update");
        return Ok(action);
    }
    patch_status_typed(client, &current, &status).await?;

    let was_ready = current.is_ready();
    if progress == Progress::Ready && !was_ready {
        info!("service is ready");
        ctx.events
            .publish(
                &current.object_ref(&()),
                EventType::Normal,
                event_reasons::SERVICE_READY,
                actions::RECONCILE,
                Some(message),
            )
            .await;
    }
    Ok(action)
}

async fn run_pipeline<S: ManagedService>(
    ctx: &ServiceContext,
    obj: &S,
    owner: &Owner,
    plan: &ServicePlan,
    status: &mut ServiceStatus,
    generation: Option<i64>,
) -> Result<Progress> {
    let client = ctx.kube.as_ref();

    for secret in &plan.secrets {
        ensure_secret(client, owner, &secret.name, &secret.keys).await?;
    }

    for step in &plan.provisioning {
        if let Some(progress) = gate(ctx, obj, owner, step).await? {
            status.conditions = set_condition(
                &status.conditions,
                types::DATABASE_READY,
                ConditionStatus::False,
                reasons::JOB_RUNNING,
                &format!("Waiting for job {}", step.name),
                generation,
            );
            return Ok(progress);
        }
    }
    status.conditions = set_condition(
        &status.conditions,
        types::DATABASE_READY,
        ConditionStatus::True,
        reasons::DATABASE_SYNCED,
        "Database is provisioned and migrated",
        generation,
    );

    ensure_deployment(client, owner, &plan.api).await?;
    for worker in &plan.workers {
        ensure_deployment(client, owner, worker).await?;
    }
    ensure_service(client, owner, &plan.endpoint.service_name, &plan.api, false).await?;

    if plan.endpoint.is_exposed() {
        ensure_http_route(
            client,
            owner,
            &RouteParams {
                name: &plan.endpoint.service_name,
                namespace: &owner.namespace,
                hostname: plan.endpoint.hostname.as_deref(),
                service_name: &plan.endpoint.service_name,
                service_port: plan.endpoint.port,
                gateway: plan.endpoint.gateway.as_ref(),
            },
        )
        .await?;
    }

    if let Some(progress) = gate(ctx, obj, owner, &plan.registration).await? {
        status.conditions = set_condition(
            &status.conditions,
            types::BOOTSTRAP_READY,
            ConditionStatus::False,
            reasons::JOB_RUNNING,
            &format!("Waiting for job {}", plan.registration.name),
            generation,
        );
        return Ok(progress);
    }
    status.conditions = set_condition(
        &status.conditions,
        types::BOOTSTRAP_READY,
        ConditionStatus::True,
        reasons::REGISTERED,
        "Endpoints are registered",
        generation,
    );
    status.api_endpoint = Some(plan.endpoint.api_endpoint.clone());

    let rolled_out = is_deployment_ready(client, &owner.namespace, &plan.api.name).await?;
    let (deployment_status, reason, message) = if rolled_out {
        (
            ConditionStatus::True,
            reasons::DEPLOYMENT_READY,
            "All replicas are ready",
        )
    } else {
        (
            ConditionStatus::False,
            reasons::DEPLOYMENT_PENDING,
            "Replicas are rolling out",
        )
    };
    status.conditions = set_condition(
        &status.conditions,
        types::DEPLOYMENT_READY,
        deployment_status,
        reason,
        message,
        generation,
    );

    Ok(if rolled_out {
        Progress::Ready
    } else {
        Progress::RollingOut {
            deployment: plan.api.name.clone(),
        }
    })
}

/// Run a job step; `Some` when the pipeline has to stop here
async fn gate<S: ManagedService>(
    ctx: &ServiceContext,
    obj: &S,
    owner: &Owner,
    step: &JobStep,
) -> Result<Option<Progress>> {
    let wait = run_step(ctx.kube.as_ref(), owner, step, ctx.delays).await?;
    if let JobWait::Retrying(_) = wait {
        ctx.events
            .publish(
                &obj.object_ref(&()),
                EventType::Warning,
                event_reasons::JOB_FAILED,
                actions::PROVISION,
                Some(format!("Job {} failed and will be retried", step.name)),
            )
            .await;
    }
    Ok(wait.retry_after().map(|retry| Progress::Waiting {
        job: step.name.clone(),
        retry,
    }))
}

/// Error policy shared by the service and infrastructure controllers
pub fn error_policy<K>(obj: Arc<K>, error: &Error, _ctx: Arc<ServiceContext>) -> Action
where
    K: Resource<DynamicType = ()>,
{
    error!(
        ?error,
        service = %obj.name_any(),
        kind = %K::kind(&()),
        retryable = error.is_retryable(),
        "reconciliation failed"
    );
    Action::requeue(ERROR_REQUEUE)
}
