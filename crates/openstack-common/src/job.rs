//! Job pipeline primitive
//!
//! One-shot provisioning steps (database creation, schema migration, identity
//! bootstrap, endpoint registration) run as batch/v1 Jobs. A step is created
//! once by name and then observed through the Job's own status conditions:
//!
//! - absent or still running: retry after the pending delay
//! - `Failed`: delete the Job so the next tick recreates it
//! - `Complete`: the step is done and the pipeline moves on

use std::time::Duration;

use k8s_openapi::api::batch::v1::{Job, JobSpec};
use k8s_openapi::api::core::v1::{
    Container, EnvVar, EnvVarSource, PodSpec, PodTemplateSpec, SecretKeySelector,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use tracing::{debug, info, warn};

use crate::apply::create_if_absent;
use crate::kube_utils::{api_resource_of, set_controller_ref, standard_labels, Owner};
use crate::store::{get_typed, KubeClient};
use crate::{Result, LABEL_COMPONENT};

/// Default number of pod retries before a Job is marked failed
pub const DEFAULT_BACKOFF_LIMIT: i32 = 4;

/// Reference to one key of a Secret
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SecretKeyRef {
    /// Secret name
    pub name: String,
    /// Key within the secret
    pub key: String,
}

impl SecretKeyRef {
    /// Create a new SecretKeyRef
    pub fn new(name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key: key.into(),
        }
    }
}

/// Structured description of one Job step.
///
/// Scripts are data: the command and its arguments are carried verbatim and
/// credentials reach the container only as secret references.
#[derive(Clone, Debug, PartialEq)]
pub struct JobStep {
    /// Job name, conventionally `<owner>-<step>`
    pub name: String,
    /// Container name
    pub container: String,
    /// Container image
    pub image: String,
    /// Entrypoint
    pub command: Vec<String>,
    /// Arguments
    pub args: Vec<String>,
    /// Literal environment variables, in order
    pub env: Vec<(String, String)>,
    /// Environment variables sourced from secrets, in order
    pub secret_env: Vec<(String, SecretKeyRef)>,
    /// Pod retries before the Job fails
    pub backoff_limit: i32,
}

impl JobStep {
    /// Start a step running `image` under the given job name
    pub fn new(name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            container: "main".to_string(),
            image: image.into(),
            command: Vec::new(),
            args: Vec::new(),
            env: Vec::new(),
            secret_env: Vec::new(),
            backoff_limit: DEFAULT_BACKOFF_LIMIT,
        }
    }

    /// Set the container name
    pub fn container(mut self, name: impl Into<String>) -> Self {
        self.container = name.into();
        self
    }

    /// Run a shell script with `/bin/sh -c`
    pub fn shell(mut self, script: impl Into<String>) -> Self {
        self.command = vec!["/bin/sh".to_string(), "-c".to_string()];
        self.args = vec![script.into()];
        self
    }

    /// Set command and arguments explicitly
    pub fn command<I, S>(mut self, command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.command = command.into_iter().map(Into::into).collect();
        self
    }

    /// Add a literal environment variable
    pub fn env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((name.into(), value.into()));
        self
    }

    /// Add an environment variable read from a secret key
    pub fn secret_env(
        mut self,
        name: impl Into<String>,
        secret: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        self.secret_env
            .push((name.into(), SecretKeyRef::new(secret, key)));
        self
    }

    /// Set the backoff limit
    pub fn backoff_limit(mut self, limit: i32) -> Self {
        self.backoff_limit = limit;
        self
    }

    /// Build the batch/v1 Job for this step, owned by `owner`
    pub fn build_job(&self, owner: &Owner) -> Job {
        let mut labels = standard_labels("openstack-job", &owner.name);
        labels.insert(LABEL_COMPONENT.to_string(), self.name.clone());

        let env = env_vars(&self.env, &self.secret_env);

        let container = Container {
            name: self.container.clone(),
            image: Some(self.image.clone()),
            command: (!self.command.is_empty()).then(|| self.command.clone()),
            args: (!self.args.is_empty()).then(|| self.args.clone()),
            env: (!env.is_empty()).then_some(env),
            ..Default::default()
        };

        let mut metadata = ObjectMeta {
            name: Some(self.name.clone()),
            namespace: Some(owner.namespace.clone()),
            labels: Some(labels.clone()),
            ..Default::default()
        };
        set_controller_ref(&mut metadata, &owner.reference);

        Job {
            metadata,
            spec: Some(JobSpec {
                backoff_limit: Some(self.backoff_limit),
                template: PodTemplateSpec {
                    metadata: Some(ObjectMeta {
                        labels: Some(labels),
                        ..Default::default()
                    }),
                    spec: Some(PodSpec {
                        containers: vec![container],
                        restart_policy: Some("OnFailure".to_string()),
                        ..Default::default()
                    }),
                },
                ..Default::default()
            }),
            ..Default::default()
        }
    }
}

/// Container environment: literal variables first, then secret references
pub fn env_vars(env: &[(String, String)], secret_env: &[(String, SecretKeyRef)]) -> Vec<EnvVar> {
    let literal = env.iter().map(|(name, value)| EnvVar {
        name: name.clone(),
        value: Some(value.clone()),
        ..Default::default()
    });
    let from_secret = secret_env.iter().map(|(name, secret)| EnvVar {
        name: name.clone(),
        value_from: Some(EnvVarSource {
            secret_key_ref: Some(SecretKeySelector {
                name: secret.name.clone(),
                key: secret.key.clone(),
                optional: None,
            }),
            ..Default::default()
        }),
        ..Default::default()
    });
    literal.chain(from_secret).collect()
}

/// Completion state of a Job as reported by its own conditions
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobState {
    /// Neither complete nor failed yet
    Pending,
    /// `Complete=True`
    Complete,
    /// `Failed=True`
    Failed,
}

fn has_true_condition(job: &Job, type_: &str) -> bool {
    job.status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .map(|conditions| {
            conditions
                .iter()
                .any(|c| c.type_ == type_ && c.status == "True")
        })
        .unwrap_or(false)
}

/// Read a Job's completion state
pub fn job_state(job: &Job) -> JobState {
    if has_true_condition(job, "Failed") {
        JobState::Failed
    } else if has_true_condition(job, "Complete") {
        JobState::Complete
    } else {
        JobState::Pending
    }
}

/// Extract the failure message from a failed Job
pub fn job_failure_message(job: &Job) -> Option<String> {
    job.status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .and_then(|conditions| {
            conditions
                .iter()
                .find(|c| c.type_ == "Failed" && c.status == "True")
                .and_then(|c| c.message.clone())
        })
}

/// Retry delays of the job gate
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct JobDelays {
    /// Delay while a Job is absent or running
    pub pending: Duration,
    /// Delay after a failed Job was deleted
    pub failed: Duration,
}

impl Default for JobDelays {
    fn default() -> Self {
        Self {
            pending: Duration::from_secs(5),
            failed: Duration::from_secs(2),
        }
    }
}

/// Outcome of the job gate
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobWait {
    /// The Job completed; the step is satisfied
    Done,
    /// Not yet; retry after the delay
    NotDone(Duration),
    /// The Job failed and was deleted; it is recreated after the delay
    Retrying(Duration),
}

impl JobWait {
    /// Returns true when the step is satisfied
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Delay before the step should be looked at again
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Done => None,
            Self::NotDone(delay) | Self::Retrying(delay) => Some(*delay),
        }
    }
}

/// Create the step's Job unless one with its name exists.
///
/// Returns true when this call created it.
pub async fn ensure_job(client: &dyn KubeClient, owner: &Owner, step: &JobStep) -> Result<bool> {
    let created = create_if_absent(client, Some(owner), step.build_job(owner)).await?;
    if created {
        info!(job = %step.name, owner = %owner.name, "created job");
    }
    Ok(created)
}

/// Observe a Job and decide whether its step is done.
///
/// A failed Job is deleted so that the following tick recreates it; a Job
/// that disappeared counts as not done.
pub async fn wait_for_completion(
    client: &dyn KubeClient,
    namespace: &str,
    name: &str,
    delays: JobDelays,
) -> Result<JobWait> {
    let Some(job) = get_typed::<Job>(client, namespace, name).await? else {
        debug!(job = %name, "job not found yet");
        return Ok(JobWait::NotDone(delays.pending));
    };

    match job_state(&job) {
        JobState::Complete => Ok(JobWait::Done),
        JobState::Failed => {
            warn!(
                job = %name,
                message = %job_failure_message(&job).unwrap_or_default(),
                "job failed, deleting for retry"
            );
            client
                .delete(&api_resource_of::<Job>(), namespace, name)
                .await?;
            Ok(JobWait::Retrying(delays.failed))
        }
        JobState::Pending => Ok(JobWait::NotDone(delays.pending)),
    }
}

/// Ensure the step's Job exists and report whether it has completed
pub async fn run_step(
    client: &dyn KubeClient,
    owner: &Owner,
    step: &JobStep,
    delays: JobDelays,
) -> Result<JobWait> {
    ensure_job(client, owner, step).await?;
    wait_for_completion(client, &owner.namespace, &step.name, delays).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{Keystone, KeystoneSpec};
    use crate::testing::{FakeStore, Write, WriteOp};
    use crate::Error;
    use k8s_openapi::api::batch::v1::{JobCondition, JobStatus};

    fn owner(store: &FakeStore) -> Owner {
        let mut ks = Keystone::new("keystone", KeystoneSpec::default());
        ks.metadata.namespace = Some("openstack".to_string());
        Owner::of(&store.insert(&ks)).unwrap()
    }

    fn sync_step() -> JobStep {
        JobStep::new("keystone-db-sync", "quay.io/openstack.kolla/keystone:2025.1")
            .container("db-sync")
            .shell("keystone-manage db_sync")
            .env("DB_HOST", "database.openstack.svc")
            .secret_env("DB_PASSWORD", "keystone-db-password", "password")
    }

    fn job_with(condition: &str, status: &str) -> Job {
        Job {
            status: Some(JobStatus {
                conditions: Some(vec![JobCondition {
                    type_: condition.to_string(),
                    status: status.to_string(),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    mod building {
        use super::*;

        #[test]
        fn test_job_shape() {
            let store = FakeStore::new();
            let job = sync_step().build_job(&owner(&store));

            assert_eq!(job.metadata.name.as_deref(), Some("keystone-db-sync"));
            assert_eq!(job.metadata.namespace.as_deref(), Some("openstack"));
            let refs = job.metadata.owner_references.as_ref().unwrap();
            assert_eq!(refs[0].kind, "Keystone");

            let spec = job.spec.unwrap();
            assert_eq!(spec.backoff_limit, Some(DEFAULT_BACKOFF_LIMIT));
            let pod = spec.template.spec.unwrap();
            assert_eq!(pod.restart_policy.as_deref(), Some("OnFailure"));

            let container = &pod.containers[0];
            assert_eq!(container.name, "db-sync");
            assert_eq!(
                container.command.as_ref().unwrap(),
                &vec!["/bin/sh".to_string(), "-c".to_string()]
            );
            assert_eq!(
                container.args.as_ref().unwrap()[0],
                "keystone-manage db_sync"
            );
        }

        #[test]
        fn test_secrets_are_referenced_never_inlined() {
            let store = FakeStore::new();
            let job = sync_step().build_job(&owner(&store));
            let pod = job.spec.unwrap().template.spec.unwrap();
            let env = pod.containers[0].env.clone().unwrap();

            let password = env.iter().find(|e| e.name == "DB_PASSWORD").unwrap();
            assert!(password.value.is_none());
            let selector = password
                .value_from
                .as_ref()
                .and_then(|v| v.secret_key_ref.as_ref())
                .unwrap();
            assert_eq!(selector.name, "keystone-db-password");
            assert_eq!(selector.key, "password");

            let host = env.iter().find(|e| e.name == "DB_HOST").unwrap();
            assert_eq!(host.value.as_deref(), Some("database.openstack.svc"));
        }
    }

    mod state {
        use super::*;

        #[test]
        fn test_job_state_from_conditions() {
            assert_eq!(job_state(&Job::default()), JobState::Pending);
            assert_eq!(job_state(&job_with("Complete", "True")), JobState::Complete);
            assert_eq!(job_state(&job_with("Complete", "False")), JobState::Pending);
            assert_eq!(job_state(&job_with("Failed", "True")), JobState::Failed);
        }

        #[test]
        fn test_failure_message() {
            let mut job = job_with("Failed", "True");
            if let Some(c) = job
                .status
                .as_mut()
                .and_then(|s| s.conditions.as_mut())
                .and_then(|c| c.first_mut())
            {
                c.message = Some("BackoffLimitExceeded".to_string());
            }
            assert_eq!(
                job_failure_message(&job).as_deref(),
                Some("BackoffLimitExceeded")
            );
            assert_eq!(job_failure_message(&Job::default()), None);
        }
    }

    mod gate {
        use super::*;

        /// Story: a step's Job is created once, stays put while it runs,
        /// and releases the gate when it completes.
        #[tokio::test]
        async fn story_job_is_created_once_and_waited_on() {
            let store = FakeStore::new();
            let owner = owner(&store);
            let delays = JobDelays::default();

            let wait = run_step(&store, &owner, &sync_step(), delays).await.unwrap();
            assert_eq!(wait, JobWait::NotDone(Duration::from_secs(5)));

            let wait = run_step(&store, &owner, &sync_step(), delays).await.unwrap();
            assert_eq!(wait, JobWait::NotDone(Duration::from_secs(5)));
            assert_eq!(store.count("Job"), 1);

            store.finish_job("openstack", "keystone-db-sync", "Complete");
            let wait = run_step(&store, &owner, &sync_step(), delays).await.unwrap();
            assert!(wait.is_done());

            assert_eq!(
                store.writes_of("Job"),
                vec![Write::new(WriteOp::Create, "Job", "keystone-db-sync")]
            );
        }

        /// Story: a failed Job is deleted and recreated on the following
        /// tick, giving the step a fresh run.
        #[tokio::test]
        async fn story_failed_job_is_retried() {
            let store = FakeStore::new();
            let owner = owner(&store);
            let delays = JobDelays::default();

            run_step(&store, &owner, &sync_step(), delays).await.unwrap();
            store.finish_job("openstack", "keystone-db-sync", "Failed");

            let wait = run_step(&store, &owner, &sync_step(), delays).await.unwrap();
            assert_eq!(wait, JobWait::Retrying(Duration::from_secs(2)));
            assert_eq!(wait.retry_after(), Some(Duration::from_secs(2)));
            assert_eq!(store.count("Job"), 0);

            let wait = run_step(&store, &owner, &sync_step(), delays).await.unwrap();
            assert_eq!(wait, JobWait::NotDone(Duration::from_secs(5)));
            assert_eq!(
                store.writes_of("Job"),
                vec![
                    Write::new(WriteOp::Create, "Job", "keystone-db-sync"),
                    Write::new(WriteOp::Delete, "Job", "keystone-db-sync"),
                    Write::new(WriteOp::Create, "Job", "keystone-db-sync"),
                ]
            );
        }

        #[tokio::test]
        async fn test_missing_job_is_not_done() {
            let store = FakeStore::new();
            let wait = wait_for_completion(&store, "openstack", "nope", JobDelays::default())
                .await
                .unwrap();
            assert_eq!(wait, JobWait::NotDone(Duration::from_secs(5)));
        }

        #[tokio::test]
        async fn test_custom_delays_are_honoured() {
            let store = FakeStore::new();
            let delays = JobDelays {
                pending: Duration::from_millis(10),
                failed: Duration::from_millis(1),
            };
            let wait = wait_for_completion(&store, "openstack", "nope", delays)
                .await
                .unwrap();
            assert_eq!(wait, JobWait::NotDone(Duration::from_millis(10)));
        }

        #[tokio::test]
        async fn test_delete_errors_propagate() {
            let store = FakeStore::new();
            let owner = owner(&store);
            ensure_job(&store, &owner, &sync_step()).await.unwrap();
            store.finish_job("openstack", "keystone-db-sync", "Failed");
            store.fail_next_write("Job");

            let err = wait_for_completion(
                &store,
                "openstack",
                "keystone-db-sync",
                JobDelays::default(),
            )
            .await
            .unwrap_err();
            assert!(matches!(err, Error::Internal { .. }));
        }
    }
}
