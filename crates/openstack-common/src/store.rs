//! Object store client
//!
//! Every read and write the reconcilers issue goes through [`KubeClient`], a
//! small dynamic-object interface. Production code wraps
//! `kube::Api<DynamicObject>`; tests use a mock or the in-memory fake.
//!
//! Typed objects cross the boundary through serde, so one trait covers native
//! kinds, our CRDs, and third-party kinds such as Gateway API routes.

use async_trait::async_trait;
use kube::api::{Api, DeleteParams, DynamicObject, Patch, PatchParams, PostParams};
use kube::discovery::ApiResource;
use kube::{Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;

#[cfg(test)]
use mockall::automock;

use crate::kube_utils::api_resource_of;
use crate::{Error, FIELD_MANAGER};

/// Trait abstracting object store operations
///
/// Not-found on read is `Ok(None)`, never an error. Writes that lose an
/// optimistic-concurrency race surface as [`Error::Conflict`].
#[cfg_attr(test, automock)]
#[async_trait]
pub trait KubeClient: Send + Sync {
    /// Fetch an object; `None` when it does not exist
    async fn get(
        &self,
        ar: &ApiResource,
        namespace: &str,
        name: &str,
    ) -> Result<Option<DynamicObject>, Error>;

    /// Create an object
    async fn create(
        &self,
        ar: &ApiResource,
        namespace: &str,
        obj: &DynamicObject,
    ) -> Result<DynamicObject, Error>;

    /// Replace an object, guarded by the resourceVersion it carries
    async fn replace(
        &self,
        ar: &ApiResource,
        namespace: &str,
        obj: &DynamicObject,
    ) -> Result<DynamicObject, Error>;

    /// Merge-patch the status subresource.
    ///
    /// When `resource_version` is given the write only succeeds if the object
    /// has not changed since it was read.
    async fn patch_status(
        &self,
        ar: &ApiResource,
        namespace: &str,
        name: &str,
        resource_version: Option<String>,
        status: &serde_json::Value,
    ) -> Result<(), Error>;

    /// Delete an object in the background; deleting a missing object succeeds
    async fn delete(&self, ar: &ApiResource, namespace: &str, name: &str) -> Result<(), Error>;
}

/// Real object store client implementation
pub struct KubeClientImpl {
    client: Client,
}

impl KubeClientImpl {
    /// Create a new KubeClientImpl wrapping the given kube Client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, ar: &ApiResource, namespace: &str) -> Api<DynamicObject> {
        Api::namespaced_with(self.client.clone(), namespace, ar)
    }
}

/// Map a write error, turning 404/409 into the store-level variants
fn write_error(e: kube::Error, ar: &ApiResource, namespace: &str, name: &str) -> Error {
    match e {
        kube::Error::Api(ae) if ae.code == 409 => {
            Error::conflict(&ar.kind, format!("{}/{}", namespace, name))
        }
        kube::Error::Api(ae) if ae.code == 404 => {
            Error::not_found(&ar.kind, format!("{}/{}", namespace, name))
        }
        e => e.into(),
    }
}

#[async_trait]
impl KubeClient for KubeClientImpl {
    async fn get(
        &self,
        ar: &ApiResource,
        namespace: &str,
        name: &str,
    ) -> Result<Option<DynamicObject>, Error> {
        match self.api(ar, namespace).get(name).await {
            Ok(obj) => Ok(Some(obj)),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn create(
        &self,
        ar: &ApiResource,
        namespace: &str,
        obj: &DynamicObject,
    ) -> Result<DynamicObject, Error> {
        let params = PostParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..Default::default()
        };
        self.api(ar, namespace)
            .create(&params, obj)
            .await
            .map_err(|e| write_error(e, ar, namespace, &obj.name_any()))
    }

    async fn replace(
        &self,
        ar: &ApiResource,
        namespace: &str,
        obj: &DynamicObject,
    ) -> Result<DynamicObject, Error> {
        let name = obj.name_any();
        let params = PostParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..Default::default()
        };
        self.api(ar, namespace)
            .replace(&name, &params, obj)
            .await
            .map_err(|e| write_error(e, ar, namespace, &name))
    }

    async fn patch_status(
        &self,
        ar: &ApiResource,
        namespace: &str,
        name: &str,
        resource_version: Option<String>,
        status: &serde_json::Value,
    ) -> Result<(), Error> {
        let mut patch = serde_json::json!({ "status": status });
        if let Some(rv) = resource_version {
            patch["metadata"] = serde_json::json!({ "resourceVersion": rv });
        }
        self.api(ar, namespace)
            .patch_status(name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(&patch))
            .await
            .map_err(|e| write_error(e, ar, namespace, name))?;
        Ok(())
    }

    async fn delete(&self, ar: &ApiResource, namespace: &str, name: &str) -> Result<(), Error> {
        match self
            .api(ar, namespace)
            .delete(name, &DeleteParams::background())
            .await
        {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(()),
            Err(e) => Err(write_error(e, ar, namespace, name)),
        }
    }
}

// =============================================================================
// Typed helpers
// =============================================================================

/// Convert a typed object into a `DynamicObject`
pub fn to_dynamic<K: Serialize>(obj: &K) -> Result<DynamicObject, Error> {
    let value = serde_json::to_value(obj)?;
    Ok(serde_json::from_value(value)?)
}

/// Convert a `DynamicObject` back into a typed object
pub fn from_dynamic<K: DeserializeOwned>(obj: &DynamicObject) -> Result<K, Error> {
    let value = serde_json::to_value(obj)?;
    serde_json::from_value(value).map_err(|e| {
        let kind = obj
            .types
            .as_ref()
            .map(|t| t.kind.clone())
            .unwrap_or_default();
        Error::serialization_for_kind(kind, e.to_string())
    })
}

/// Fetch a typed object; `None` when it does not exist
pub async fn get_typed<K>(
    client: &dyn KubeClient,
    namespace: &str,
    name: &str,
) -> Result<Option<K>, Error>
where
    K: Resource<DynamicType = ()> + DeserializeOwned,
{
    match client.get(&api_resource_of::<K>(), namespace, name).await? {
        Some(obj) => Ok(Some(from_dynamic(&obj)?)),
        None => Ok(None),
    }
}

/// Replace a typed object (metadata and spec), guarded by its resourceVersion
pub async fn replace_typed<K>(client: &dyn KubeClient, obj: &K) -> Result<K, Error>
where
    K: Resource<DynamicType = ()> + Serialize + DeserializeOwned,
{
    let namespace = obj.namespace().unwrap_or_default();
    let written = client
        .replace(&api_resource_of::<K>(), &namespace, &to_dynamic(obj)?)
        .await?;
    from_dynamic(&written)
}

/// Write the status of a typed object, guarded by its resourceVersion
pub async fn patch_status_typed<K, S>(
    client: &dyn KubeClient,
    obj: &K,
    status: &S,
) -> Result<(), Error>
where
    K: Resource<DynamicType = ()>,
    S: Serialize,
{
    let namespace = obj.namespace().unwrap_or_default();
    client
        .patch_status(
            &api_resource_of::<K>(),
            &namespace,
            &obj.name_any(),
            obj.resource_version(),
            &serde_json::to_value(status)?,
        )
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{Keystone, KeystoneSpec, ServiceStatus};
    use k8s_openapi::api::core::v1::Secret;

    fn keystone() -> Keystone {
        let mut ks = Keystone::new("keystone", KeystoneSpec::default());
        ks.metadata.namespace = Some("openstack".to_string());
        ks.metadata.resource_version = Some("7".to_string());
        ks
    }

    #[test]
    fn test_dynamic_conversion_preserves_type_and_spec() {
        let ks = keystone();
        let dynamic = to_dynamic(&ks).unwrap();
        let types = dynamic.types.as_ref().unwrap();
        assert_eq!(types.kind, "Keystone");
        assert_eq!(types.api_version, "openstack.k8s.io/v1alpha1");
        let back: Keystone = from_dynamic(&dynamic).unwrap();
        assert_eq!(back.spec, ks.spec);
        assert_eq!(back.metadata.resource_version.as_deref(), Some("7"));
    }

    #[test]
    fn test_from_dynamic_reports_kind_on_mismatch() {
        let dynamic = to_dynamic(&keystone()).unwrap();
        match from_dynamic::<Secret>(&dynamic) {
            Err(Error::Serialization { kind, .. }) => assert_eq!(kind.as_deref(), Some("Keystone")),
            other => panic!("Expected Serialization error, got {other:?}"),
        }
    }

    mod typed_helpers {
        use super::*;

        #[tokio::test]
        async fn test_get_typed_maps_missing_to_none() {
            let mut mock = MockKubeClient::new();
            mock.expect_get().returning(|_, _, _| Ok(None));
            let found: Option<Keystone> = get_typed(&mock, "openstack", "keystone").await.unwrap();
            assert!(found.is_none());
        }

        #[tokio::test]
        async fn test_patch_status_carries_resource_version() {
            let mut mock = MockKubeClient::new();
            mock.expect_patch_status()
                .withf(|ar, ns, name, rv, status| {
                    ar.kind == "Keystone"
                        && ns == "openstack"
                        && name == "keystone"
                        && rv.as_deref() == Some("7")
                        && status["apiEndpoint"] == "http://keystone-api.openstack.svc:5000/v3"
                })
                .times(1)
                .returning(|_, _, _, _, _| Ok(()));

            let status = ServiceStatus {
                api_endpoint: Some("http://keystone-api.openstack.svc:5000/v3".to_string()),
                ..Default::default()
            };
            patch_status_typed(&mock, &keystone(), &status).await.unwrap();
        }

        #[tokio::test]
        async fn test_store_errors_propagate_unchanged() {
            let mut mock = MockKubeClient::new();
            mock.expect_replace()
                .returning(|_, _, _| Err(Error::conflict("Keystone", "openstack/keystone")));
            let err = replace_typed(&mock, &keystone()).await.unwrap_err();
            assert!(matches!(err, Error::Conflict { .. }));
        }
    }
}
