//! Shared Kubernetes utilities using kube-rs

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::discovery::ApiResource;
use kube::{Resource, ResourceExt};

use crate::{Error, LABEL_INSTANCE, LABEL_MANAGED_BY, LABEL_MANAGED_BY_OPERATOR, LABEL_NAME};

// =============================================================================
// ApiResource Building
// =============================================================================
//
// Native and CRD types known at compile time use `api_resource_of::<K>()`
// (`ApiResource::erase`). Types the operator writes without a Rust binding
// (Gateway API routes) implement `HasApiResource`.

/// Trait for types that have a known API group, version, and kind.
///
/// Implement this for types without a `kube::Resource` impl so that they can
/// still be written through the dynamic store client.
pub trait HasApiResource {
    /// Full API version (e.g., "gateway.networking.k8s.io/v1")
    const API_VERSION: &'static str;
    /// Resource kind (e.g., "HTTPRoute")
    const KIND: &'static str;

    /// Build an ApiResource from the type's constants.
    fn api_resource() -> ApiResource {
        build_api_resource(Self::API_VERSION, Self::KIND)
    }
}

/// `ApiResource` of a statically known kind
pub fn api_resource_of<K>() -> ApiResource
where
    K: Resource<DynamicType = ()>,
{
    ApiResource::erase::<K>(&())
}

/// Build an ApiResource from an apiVersion string and kind.
pub fn build_api_resource(api_version: &str, kind: &str) -> ApiResource {
    let (group, version) = parse_api_version(api_version);
    ApiResource {
        group,
        version,
        kind: kind.to_string(),
        api_version: api_version.to_string(),
        plural: pluralize_kind(kind),
    }
}

/// Split "group/version" into its parts; core types have an empty group
pub fn parse_api_version(api_version: &str) -> (String, String) {
    match api_version.split_once('/') {
        Some((group, version)) => (group.to_string(), version.to_string()),
        None => (String::new(), api_version.to_string()),
    }
}

/// Pluralize a Kubernetes resource kind
pub fn pluralize_kind(kind: &str) -> String {
    let lower = kind.to_lowercase();
    if lower.ends_with('s') || lower.ends_with("ch") || lower.ends_with("sh") {
        format!("{}es", lower)
    } else if lower.ends_with('y') && !lower.ends_with("ay") && !lower.ends_with("ey") {
        format!("{}ies", &lower[..lower.len() - 1])
    } else {
        format!("{}s", lower)
    }
}

// =============================================================================
// Ownership
// =============================================================================

/// The object a child is created on behalf of.
///
/// Carries the controller owner reference stamped on every child so the
/// garbage collector cascades deletion.
#[derive(Clone, Debug, PartialEq)]
pub struct Owner {
    /// Owner name
    pub name: String,
    /// Owner namespace; children are created alongside it
    pub namespace: String,
    /// Controller owner reference for children
    pub reference: OwnerReference,
}

impl Owner {
    /// Build the owner descriptor for a namespaced object.
    ///
    /// Fails when the object has no uid yet, which only happens for objects
    /// that were never persisted.
    pub fn of<K>(obj: &K) -> Result<Self, Error>
    where
        K: Resource<DynamicType = ()>,
    {
        let name = obj.name_any();
        let namespace = obj.namespace().ok_or_else(|| {
            Error::internal_with_context("owner", format!("{} has no namespace", name))
        })?;
        let mut reference = obj.controller_owner_ref(&()).ok_or_else(|| {
            Error::internal_with_context("owner", format!("{} has no uid", name))
        })?;
        reference.block_owner_deletion = Some(true);
        Ok(Self {
            name,
            namespace,
            reference,
        })
    }
}

/// Stamp `owner` as the controlling owner, replacing any other controller ref
pub fn set_controller_ref(
    meta: &mut k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta,
    owner: &OwnerReference,
) {
    let mut refs: Vec<OwnerReference> = meta
        .owner_references
        .take()
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.controller != Some(true) && r.uid != owner.uid)
        .collect();
    refs.push(owner.clone());
    meta.owner_references = Some(refs);
}

/// Standard labels for objects created on behalf of `instance`
pub fn standard_labels(app: &str, instance: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (LABEL_NAME.to_string(), app.to_string()),
        (LABEL_INSTANCE.to_string(), instance.to_string()),
        (
            LABEL_MANAGED_BY.to_string(),
            LABEL_MANAGED_BY_OPERATOR.to_string(),
        ),
    ])
}
