//! Finalizer-gated lifecycle
//!
//! Every managed object carries [`FINALIZER`] while it is alive. Deletion of
//! children is left to owner-reference cascade, so finalization only has to
//! drop the token.

use kube::{Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::info;

use crate::store::{replace_typed, KubeClient};
use crate::Result;

/// Finalizer token placed on every managed object
pub const FINALIZER: &str = "openstack.k8s.io/cleanup";

/// Whether `obj` carries the finalizer
pub fn has_finalizer<K: Resource>(obj: &K) -> bool {
    obj.finalizers().iter().any(|f| f == FINALIZER)
}

/// Add the finalizer unless present; returns true when the list changed
pub fn add_finalizer<K: Resource>(obj: &mut K) -> bool {
    if has_finalizer(obj) {
        return false;
    }
    obj.finalizers_mut().push(FINALIZER.to_string());
    true
}

/// Remove every occurrence of the finalizer; returns true when the list changed
pub fn remove_finalizer<K: Resource>(obj: &mut K) -> bool {
    if !has_finalizer(obj) {
        return false;
    }
    let kept: Vec<String> = obj
        .finalizers()
        .iter()
        .filter(|f| *f != FINALIZER)
        .cloned()
        .collect();
    *obj.finalizers_mut() = kept;
    true
}

/// Where an object stands in its lifecycle after [`ensure_lifecycle`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lifecycle {
    /// Alive and finalized-guarded; reconcile normally
    Active,
    /// The finalizer was just added and persisted; the caller's copy is stale
    FinalizerAdded,
    /// The object is being deleted and holds no finalizer of ours any more
    Finalized,
}

/// Drive the finalizer state of `obj`, persisting any change.
///
/// Deleting objects lose the finalizer. Live objects without it gain it.
/// Either write uses the fetched resourceVersion.
pub async fn ensure_lifecycle<K>(client: &dyn KubeClient, obj: &K) -> Result<Lifecycle>
where
    K: Resource<DynamicType = ()> + Clone + Serialize + DeserializeOwned,
{
    if obj.meta().deletion_timestamp.is_some() {
        let mut updated = obj.clone();
        if remove_finalizer(&mut updated) {
            replace_typed(client, &updated).await?;
            info!(name = %obj.name_any(), "removed finalizer");
        }
        return Ok(Lifecycle::Finalized);
    }

    let mut updated = obj.clone();
    if add_finalizer(&mut updated) {
        replace_typed(client, &updated).await?;
        return Ok(Lifecycle::FinalizerAdded);
    }
    Ok(Lifecycle::Active)
}
