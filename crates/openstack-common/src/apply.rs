//! Idempotent resource applier
//!
//! Brings a child object to its desired form with the fewest writes: create
//! when absent, replace only when the mutator actually changed something.
//! Replacement carries the fetched resourceVersion, so a concurrent writer
//! turns into a conflict error and the caller retries from a fresh read.

use kube::api::DynamicObject;
use kube::discovery::ApiResource;
use kube::{Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::kube_utils::{api_resource_of, set_controller_ref, Owner};
use crate::store::{from_dynamic, to_dynamic, KubeClient};
use crate::{Error, Result};

/// What [`create_or_update`] did
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Object did not exist and was created
    Created,
    /// Object existed and differed; it was replaced
    Updated,
    /// Object already matched; nothing was written
    Unchanged,
}

/// Create or update the child `name` of `owner`.
///
/// `mutate` receives either a blank object (creation) or the current object
/// (update) and must bring the fields it manages to their desired values.
/// Name, namespace, and controller owner reference are set here.
pub async fn create_or_update<K, F>(
    client: &dyn KubeClient,
    owner: &Owner,
    name: &str,
    mutate: F,
) -> Result<ApplyOutcome>
where
    K: Resource<DynamicType = ()> + Default + Serialize + DeserializeOwned,
    F: FnOnce(&mut K),
{
    let ar = api_resource_of::<K>();
    let current = client.get(&ar, &owner.namespace, name).await?;

    let Some(current) = current else {
        let mut obj = K::default();
        mutate(&mut obj);
        let meta = obj.meta_mut();
        meta.name = Some(name.to_string());
        meta.namespace = Some(owner.namespace.clone());
        set_controller_ref(meta, &owner.reference);
        client
            .create(&ar, &owner.namespace, &to_dynamic(&obj)?)
            .await?;
        debug!(kind = %ar.kind, name = %name, "created");
        return Ok(ApplyOutcome::Created);
    };

    let mut obj: K = from_dynamic(&current)?;
    let before = serde_json::to_value(&obj)?;
    mutate(&mut obj);
    set_controller_ref(obj.meta_mut(), &owner.reference);
    if serde_json::to_value(&obj)? == before {
        return Ok(ApplyOutcome::Unchanged);
    }

    client
        .replace(&ar, &owner.namespace, &to_dynamic(&obj)?)
        .await?;
    debug!(kind = %ar.kind, name = %name, "updated");
    Ok(ApplyOutcome::Updated)
}

/// Create `obj` unless an object of the same kind and name exists.
///
/// Returns true when this call created it. The object is never updated
/// afterwards, which makes this the primitive for create-once children such
/// as generated secrets and jobs. A create that loses a race to another
/// writer counts as already present.
pub async fn create_if_absent<K>(
    client: &dyn KubeClient,
    owner: Option<&Owner>,
    mut obj: K,
) -> Result<bool>
where
    K: Resource<DynamicType = ()> + Serialize,
{
    let ar = api_resource_of::<K>();
    let name = obj.name_any();
    if let Some(owner) = owner {
        let meta = obj.meta_mut();
        meta.namespace.get_or_insert_with(|| owner.namespace.clone());
        set_controller_ref(meta, &owner.reference);
    }
    let namespace = obj.namespace().unwrap_or_default();

    if client.get(&ar, &namespace, &name).await?.is_some() {
        return Ok(false);
    }
    match client.create(&ar, &namespace, &to_dynamic(&obj)?).await {
        Ok(_) => {
            debug!(kind = %ar.kind, name = %name, "created");
            Ok(true)
        }
        Err(Error::Conflict { .. }) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Create or update an object of a kind without a Rust binding.
///
/// `desired` carries the complete managed body. On update its labels are
/// merged into the current object's, and its top-level fields other than
/// metadata and status overwrite the current object's.
pub async fn create_or_update_dynamic(
    client: &dyn KubeClient,
    owner: &Owner,
    ar: &ApiResource,
    mut desired: DynamicObject,
) -> Result<ApplyOutcome> {
    let name = desired.name_any();
    set_controller_ref(&mut desired.metadata, &owner.reference);
    desired.metadata.namespace = Some(owner.namespace.clone());

    let Some(current) = client.get(ar, &owner.namespace, &name).await? else {
        client.create(ar, &owner.namespace, &desired).await?;
        debug!(kind = %ar.kind, name = %name, "created");
        return Ok(ApplyOutcome::Created);
    };

    let mut updated = current.clone();
    if let Some(labels) = &desired.metadata.labels {
        updated.labels_mut().extend(labels.clone());
    }
    set_controller_ref(&mut updated.metadata, &owner.reference);
    if let (Some(target), Some(source)) = (updated.data.as_object_mut(), desired.data.as_object())
    {
        for (key, value) in source {
            if key != "status" {
                target.insert(key.clone(), value.clone());
            }
        }
    }
    if serde_json::to_value(&updated)? == serde_json::to_value(&current)? {
        return Ok(ApplyOutcome::Unchanged);
    }

    client.replace(ar, &owner.namespace, &updated).await?;
    debug!(kind = %ar.kind, name = %name, "updated");
    Ok(ApplyOutcome::Updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{Keystone, KeystoneSpec};
    use crate::kube_utils::build_api_resource;
    use crate::testing::{FakeStore, Write, WriteOp};
    use k8s_openapi::api::core::v1::ConfigMap;
    use std::collections::BTreeMap;

    fn owner(store: &FakeStore) -> Owner {
        let mut ks = Keystone::new("keystone", KeystoneSpec::default());
        ks.metadata.namespace = Some("openstack".to_string());
        let ks = store.insert(&ks);
        Owner::of(&ks).unwrap()
    }

    fn set_data(value: &'static str) -> impl FnOnce(&mut ConfigMap) {
        move |cm| {
            cm.data = Some(BTreeMap::from([("key".to_string(), value.to_string())]));
        }
    }

    mod create_or_update {
        use super::*;

        /// Story: applying the same desired state twice writes exactly once,
        /// so steady-state reconciles generate no churn.
        #[tokio::test]
        async fn story_second_apply_is_a_no_op() {
            let store = FakeStore::new();
            let owner = owner(&store);

            let outcome = create_or_update(&store, &owner, "cfg", set_data("a"))
                .await
                .unwrap();
            assert_eq!(outcome, ApplyOutcome::Created);

            let outcome = create_or_update(&store, &owner, "cfg", set_data("a"))
                .await
                .unwrap();
            assert_eq!(outcome, ApplyOutcome::Unchanged);

            assert_eq!(
                store.writes_of("ConfigMap"),
                vec![Write::new(WriteOp::Create, "ConfigMap", "cfg")]
            );
        }

        #[tokio::test]
        async fn test_changed_state_is_replaced() {
            let store = FakeStore::new();
            let owner = owner(&store);
            create_or_update(&store, &owner, "cfg", set_data("a"))
                .await
                .unwrap();

            let outcome = create_or_update(&store, &owner, "cfg", set_data("b"))
                .await
                .unwrap();
            assert_eq!(outcome, ApplyOutcome::Updated);

            let cm: ConfigMap = store.get_typed("openstack", "cfg").unwrap();
            assert_eq!(cm.data.unwrap()["key"], "b");
        }

        #[tokio::test]
        async fn test_created_child_is_owned() {
            let store = FakeStore::new();
            let owner = owner(&store);
            create_or_update(&store, &owner, "cfg", set_data("a"))
                .await
                .unwrap();

            let cm: ConfigMap = store.get_typed("openstack", "cfg").unwrap();
            let refs = cm.metadata.owner_references.unwrap();
            assert_eq!(refs.len(), 1);
            assert_eq!(refs[0].kind, "Keystone");
            assert_eq!(refs[0].controller, Some(true));
        }

        #[tokio::test]
        async fn test_store_errors_are_returned_unchanged() {
            let store = FakeStore::new();
            let owner = owner(&store);
            store.fail_next_write("ConfigMap");
            let err = create_or_update(&store, &owner, "cfg", set_data("a"))
                .await
                .unwrap_err();
            assert!(matches!(err, Error::Internal { .. }));
            assert_eq!(store.count("ConfigMap"), 0);
        }
    }

    mod create_if_absent {
        use super::*;

        #[tokio::test]
        async fn test_existing_object_is_left_alone() {
            let store = FakeStore::new();
            let owner = owner(&store);
            let mut cm = ConfigMap::default();
            cm.metadata.name = Some("cfg".to_string());
            cm.data = Some(BTreeMap::from([("key".to_string(), "first".to_string())]));

            assert!(create_if_absent(&store, Some(&owner), cm.clone()).await.unwrap());

            cm.data = Some(BTreeMap::from([("key".to_string(), "second".to_string())]));
            assert!(!create_if_absent(&store, Some(&owner), cm).await.unwrap());

            let stored: ConfigMap = store.get_typed("openstack", "cfg").unwrap();
            assert_eq!(stored.data.unwrap()["key"], "first");
            assert_eq!(store.writes_of("ConfigMap").len(), 1);
        }
    }

    mod create_or_update_dynamic {
        use super::*;

        fn route(hostname: &str) -> DynamicObject {
            serde_json::from_value(serde_json::json!({
                "apiVersion": "gateway.networking.k8s.io/v1",
                "kind": "HTTPRoute",
                "metadata": {"name": "keystone", "labels": {"a": "b"}},
                "spec": {"hostnames": [hostname]},
            }))
            .unwrap()
        }

        #[tokio::test]
        async fn test_spec_changes_replace_and_repeats_do_not() {
            let store = FakeStore::new();
            let owner = owner(&store);
            let ar = build_api_resource("gateway.networking.k8s.io/v1", "HTTPRoute");

            let outcomes = [
                create_or_update_dynamic(&store, &owner, &ar, route("a.example"))
                    .await
                    .unwrap(),
                create_or_update_dynamic(&store, &owner, &ar, route("a.example"))
                    .await
                    .unwrap(),
                create_or_update_dynamic(&store, &owner, &ar, route("b.example"))
                    .await
                    .unwrap(),
            ];
            assert_eq!(
                outcomes,
                [
                    ApplyOutcome::Created,
                    ApplyOutcome::Unchanged,
                    ApplyOutcome::Updated
                ]
            );

            let stored = store.get(&ar, "openstack", "keystone").await.unwrap().unwrap();
            assert_eq!(stored.data["spec"]["hostnames"][0], "b.example");
        }
    }
}
