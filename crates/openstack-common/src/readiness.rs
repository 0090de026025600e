//! Readiness aggregator
//!
//! Gates compare fresh reads of children against their `Ready` condition.
//! Nothing is cached; a child that does not exist yet is simply not ready.

use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use kube::discovery::ApiResource;
use kube::Resource;

use crate::conditions::is_ready;
use crate::crd::Condition;
use crate::kube_utils::api_resource_of;
use crate::store::{get_typed, KubeClient};
use crate::Result;

/// A child to check, of any kind with a condition-list status
#[derive(Clone, Debug, PartialEq)]
pub struct ChildRef {
    /// Kind of the child
    pub api_resource: ApiResource,
    /// Namespace
    pub namespace: String,
    /// Name
    pub name: String,
}

impl ChildRef {
    /// Reference a child of a statically known kind
    pub fn of<K>(namespace: &str, name: impl Into<String>) -> Self
    where
        K: Resource<DynamicType = ()>,
    {
        Self {
            api_resource: api_resource_of::<K>(),
            namespace: namespace.to_string(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for ChildRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.api_resource.kind, self.name)
    }
}

/// Fresh-read readiness of a child of any kind; not-found is `false`
pub async fn is_ref_ready(client: &dyn KubeClient, child: &ChildRef) -> Result<bool> {
    let Some(obj) = client
        .get(&child.api_resource, &child.namespace, &child.name)
        .await?
    else {
        return Ok(false);
    };
    let conditions: Vec<Condition> = obj
        .data
        .get("status")
        .and_then(|s| s.get("conditions"))
        .cloned()
        .map(serde_json::from_value)
        .transpose()?
        .unwrap_or_default();
    Ok(is_ready(&conditions))
}

/// First child that is not ready, in order; `None` when all are ready.
///
/// Stops at the first not-ready child and at the first error.
pub async fn first_not_ready<'a>(
    client: &dyn KubeClient,
    children: &'a [ChildRef],
) -> Result<Option<&'a ChildRef>> {
    for child in children {
        if !is_ref_ready(client, child).await? {
            return Ok(Some(child));
        }
    }
    Ok(None)
}

/// True iff every child is ready
pub async fn all_ready(client: &dyn KubeClient, children: &[ChildRef]) -> Result<bool> {
    Ok(first_not_ready(client, children).await?.is_none())
}

/// Every replica ready and the latest generation observed
fn rollout_complete(
    generation: Option<i64>,
    observed_generation: Option<i64>,
    replicas: i32,
    ready_replicas: Option<i32>,
) -> bool {
    let ready = ready_replicas.unwrap_or(0);
    ready > 0 && ready == replicas && observed_generation == generation
}

/// Whether a Deployment has rolled out its current spec
pub fn deployment_ready(deployment: &Deployment) -> bool {
    let replicas = deployment
        .spec
        .as_ref()
        .and_then(|s| s.replicas)
        .unwrap_or(1);
    deployment
        .status
        .as_ref()
        .map(|s| {
            rollout_complete(
                deployment.metadata.generation,
                s.observed_generation,
                replicas,
                s.ready_replicas,
            )
        })
        .unwrap_or(false)
}

/// Whether a StatefulSet has rolled out its current spec
pub fn statefulset_ready(statefulset: &StatefulSet) -> bool {
    let replicas = statefulset
        .spec
        .as_ref()
        .and_then(|s| s.replicas)
        .unwrap_or(1);
    statefulset
        .status
        .as_ref()
        .map(|s| {
            rollout_complete(
                statefulset.metadata.generation,
                s.observed_generation,
                replicas,
                s.ready_replicas,
            )
        })
        .unwrap_or(false)
}

/// Fresh-read rollout state of a Deployment; not-found is `false`
pub async fn is_deployment_ready(
    client: &dyn KubeClient,
    namespace: &str,
    name: &str,
) -> Result<bool> {
    Ok(get_typed::<Deployment>(client, namespace, name)
        .await?
        .map(|d| deployment_ready(&d))
        .unwrap_or(false))
}

/// Fresh-read rollout state of a StatefulSet; not-found is `false`
pub async fn is_statefulset_ready(
    client: &dyn KubeClient,
    namespace: &str,
    name: &str,
) -> Result<bool> {
    Ok(get_typed::<StatefulSet>(client, namespace, name)
        .await?
        .map(|s| statefulset_ready(&s))
        .unwrap_or(false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{Database, DatabaseSpec, Keystone, KeystoneSpec};
    use crate::store::MockKubeClient;
    use crate::testing::FakeStore;
    use crate::Error;
    use k8s_openapi::api::apps::v1::{DeploymentSpec, DeploymentStatus};
    use rstest::rstest;

    fn keystone(name: &str) -> Keystone {
        let mut ks = Keystone::new(name, KeystoneSpec::default());
        ks.metadata.namespace = Some("openstack".to_string());
        ks
    }

    fn database(name: &str) -> Database {
        let mut db = Database::new(name, DatabaseSpec::default());
        db.metadata.namespace = Some("openstack".to_string());
        db
    }

    mod children {
        use super::*;

        #[tokio::test]
        async fn test_missing_child_is_not_ready() {
            let store = FakeStore::new();
            let child = ChildRef::of::<Keystone>("openstack", "keystone");
            assert!(!is_ref_ready(&store, &child).await.unwrap());
        }

        #[tokio::test]
        async fn test_ready_condition_is_read_fresh() {
            let store = FakeStore::new();
            store.insert(&keystone("keystone"));
            let child = ChildRef::of::<Keystone>("openstack", "keystone");
            assert!(!is_ref_ready(&store, &child).await.unwrap());

            store.set_ready::<Keystone>("openstack", "keystone", true);
            assert!(is_ref_ready(&store, &child).await.unwrap());

            store.set_ready::<Keystone>("openstack", "keystone", false);
            assert!(!is_ref_ready(&store, &child).await.unwrap());
        }

        /// Story: a gate over children of different kinds reports the first
        /// one holding it back, in declaration order.
        #[tokio::test]
        async fn story_mixed_kinds_gate_in_order() {
            let store = FakeStore::new();
            store.insert(&database("database"));
            store.insert(&keystone("keystone"));
            let children = vec![
                ChildRef::of::<Database>("openstack", "database"),
                ChildRef::of::<Keystone>("openstack", "keystone"),
            ];

            let blocker = first_not_ready(&store, &children).await.unwrap();
            assert_eq!(blocker.map(|c| c.to_string()).as_deref(), Some("Database/database"));

            store.set_ready::<Database>("openstack", "database", true);
            let blocker = first_not_ready(&store, &children).await.unwrap();
            assert_eq!(blocker.map(|c| c.name.as_str()), Some("keystone"));
            assert!(!all_ready(&store, &children).await.unwrap());

            store.set_ready::<Keystone>("openstack", "keystone", true);
            assert!(all_ready(&store, &children).await.unwrap());
        }

        #[tokio::test]
        async fn test_empty_list_is_ready() {
            let store = FakeStore::new();
            assert!(all_ready(&store, &[]).await.unwrap());
        }

        #[tokio::test]
        async fn test_short_circuits_on_first_not_ready() {
            let mut mock = MockKubeClient::new();
            mock.expect_get().times(1).returning(|_, _, _| Ok(None));
            let children = vec![
                ChildRef::of::<Database>("openstack", "database"),
                ChildRef::of::<Keystone>("openstack", "keystone"),
            ];
            assert!(!all_ready(&mock, &children).await.unwrap());
        }

        #[tokio::test]
        async fn test_errors_stop_the_scan() {
            let mut mock = MockKubeClient::new();
            mock.expect_get()
                .times(1)
                .returning(|_, _, _| Err(Error::internal("store unavailable")));
            let children = vec![
                ChildRef::of::<Database>("openstack", "database"),
                ChildRef::of::<Keystone>("openstack", "keystone"),
            ];
            assert!(all_ready(&mock, &children).await.is_err());
        }
    }

    mod workloads {
        use super::*;

        fn deployment(
            replicas: i32,
            ready: Option<i32>,
            generation: i64,
            observed: Option<i64>,
        ) -> Deployment {
            let mut d = Deployment {
                spec: Some(DeploymentSpec {
                    replicas: Some(replicas),
                    ..Default::default()
                }),
                status: Some(DeploymentStatus {
                    ready_replicas: ready,
                    observed_generation: observed,
                    ..Default::default()
                }),
                ..Default::default()
            };
            d.metadata.generation = Some(generation);
            d
        }

        #[rstest]
        #[case::all_ready(deployment(2, Some(2), 3, Some(3)), true)]
        #[case::partially_ready(deployment(2, Some(1), 3, Some(3)), false)]
        #[case::none_ready(deployment(1, None, 1, Some(1)), false)]
        #[case::stale_generation(deployment(1, Some(1), 4, Some(3)), false)]
        #[case::zero_replicas(deployment(0, Some(0), 1, Some(1)), false)]
        fn test_deployment_ready(#[case] d: Deployment, #[case] expected: bool) {
            assert_eq!(deployment_ready(&d), expected);
        }

        #[test]
        fn test_deployment_without_status_is_not_ready() {
            assert!(!deployment_ready(&Deployment::default()));
            assert!(!statefulset_ready(&StatefulSet::default()));
        }
    }
}
