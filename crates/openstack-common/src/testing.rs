//! In-memory object store for tests
//!
//! [`FakeStore`] implements [`KubeClient`] with the semantics the reconcilers
//! depend on: resourceVersion-guarded writes, generation bumps on spec
//! changes, uid assignment, and status kept separate from the main resource.
//! Every write is appended to a log so tests can assert on ordering.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::api::DynamicObject;
use kube::discovery::ApiResource;
use kube::runtime::events::EventType;
use kube::{Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::events::EventPublisher;
use crate::kube_utils::api_resource_of;
use crate::store::{from_dynamic, to_dynamic, KubeClient};
use crate::Error;

/// Kind of write recorded in the log
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteOp {
    /// Object created
    Create,
    /// Object replaced
    Replace,
    /// Status patched
    PatchStatus,
    /// Object deleted
    Delete,
}

/// One entry of the write log
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Write {
    /// What happened
    pub op: WriteOp,
    /// Kind of the object
    pub kind: String,
    /// Object name
    pub name: String,
}

impl Write {
    /// Convenience constructor for assertions
    pub fn new(op: WriteOp, kind: &str, name: &str) -> Self {
        Self {
            op,
            kind: kind.to_string(),
            name: name.to_string(),
        }
    }
}

type Key = (String, String, String);

#[derive(Default)]
struct State {
    objects: BTreeMap<Key, DynamicObject>,
    version: u64,
    writes: Vec<Write>,
    failing_kinds: Vec<String>,
}

impl State {
    fn next_version(&mut self) -> String {
        self.version += 1;
        self.version.to_string()
    }

    fn check_failure(&mut self, kind: &str) -> Result<(), Error> {
        if let Some(pos) = self.failing_kinds.iter().position(|k| k == kind) {
            self.failing_kinds.remove(pos);
            return Err(Error::internal_with_context(
                "fake-store",
                format!("injected failure writing {}", kind),
            ));
        }
        Ok(())
    }
}

/// In-memory [`KubeClient`]
#[derive(Default)]
pub struct FakeStore {
    state: Mutex<State>,
}

fn key(ar: &ApiResource, namespace: &str, name: &str) -> Key {
    (ar.kind.clone(), namespace.to_string(), name.to_string())
}

/// Body of an object without metadata and status, used to detect spec changes
fn body(obj: &DynamicObject) -> serde_json::Value {
    let mut data = obj.data.clone();
    if let Some(map) = data.as_object_mut() {
        map.remove("status");
    }
    data
}

impl FakeStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Seed an object, assigning uid, resourceVersion, and generation.
    ///
    /// Seeding is not recorded in the write log. Returns the stored copy.
    pub fn insert<K>(&self, obj: &K) -> K
    where
        K: Resource<DynamicType = ()> + Serialize + DeserializeOwned,
    {
        let ar = api_resource_of::<K>();
        let mut dynamic = to_dynamic(obj).expect("object serializes");
        let namespace = dynamic.namespace().unwrap_or_default();
        let name = dynamic.name_any();
        let mut state = self.lock();
        let version = state.next_version();
        let meta = &mut dynamic.metadata;
        meta.namespace = Some(namespace.clone());
        meta.resource_version = Some(version);
        meta.uid.get_or_insert_with(|| format!("uid-{}-{}", ar.kind.to_lowercase(), name));
        meta.generation.get_or_insert(1);
        state
            .objects
            .insert(key(&ar, &namespace, &name), dynamic.clone());
        from_dynamic(&dynamic).expect("object deserializes")
    }

    /// Fetch a typed copy of a stored object
    pub fn get_typed<K>(&self, namespace: &str, name: &str) -> Option<K>
    where
        K: Resource<DynamicType = ()> + DeserializeOwned,
    {
        let ar = api_resource_of::<K>();
        let state = self.lock();
        state
            .objects
            .get(&key(&ar, namespace, name))
            .map(|o| from_dynamic(o).expect("stored object deserializes"))
    }

    /// Returns true when an object of `K` exists
    pub fn contains<K>(&self, namespace: &str, name: &str) -> bool
    where
        K: Resource<DynamicType = ()>,
    {
        let ar = api_resource_of::<K>();
        self.lock()
            .objects
            .contains_key(&key(&ar, namespace, name))
    }

    /// Number of stored objects of the given kind
    pub fn count(&self, kind: &str) -> usize {
        self.lock()
            .objects
            .keys()
            .filter(|(k, _, _)| k == kind)
            .count()
    }

    /// The write log so far
    pub fn writes(&self) -> Vec<Write> {
        self.lock().writes.clone()
    }

    /// Write log entries of one kind
    pub fn writes_of(&self, kind: &str) -> Vec<Write> {
        self.writes().into_iter().filter(|w| w.kind == kind).collect()
    }

    /// Names of created objects in creation order
    pub fn created(&self) -> Vec<(String, String)> {
        self.writes()
            .into_iter()
            .filter(|w| w.op == WriteOp::Create)
            .map(|w| (w.kind, w.name))
            .collect()
    }

    /// Empty the write log
    pub fn clear_writes(&self) {
        self.lock().writes.clear();
    }

    /// Make the next write of `kind` fail
    pub fn fail_next_write(&self, kind: &str) {
        self.lock().failing_kinds.push(kind.to_string());
    }

    /// Mutate a stored object in place, as another actor would.
    ///
    /// Bumps the resourceVersion but records nothing in the write log.
    pub fn modify<K, F>(&self, namespace: &str, name: &str, f: F)
    where
        K: Resource<DynamicType = ()> + Serialize + DeserializeOwned,
        F: FnOnce(&mut K),
    {
        let ar = api_resource_of::<K>();
        let mut state = self.lock();
        let version = state.next_version();
        let k = key(&ar, namespace, name);
        let Some(stored) = state.objects.get(&k) else {
            panic!("{} {}/{} not in store", ar.kind, namespace, name);
        };
        let mut typed: K = from_dynamic(stored).expect("stored object deserializes");
        f(&mut typed);
        let mut dynamic = to_dynamic(&typed).expect("object serializes");
        dynamic.metadata.resource_version = Some(version);
        state.objects.insert(k, dynamic);
    }

    /// Set a Job's terminal condition (`Complete` or `Failed`)
    pub fn finish_job(&self, namespace: &str, name: &str, condition: &str) {
        use k8s_openapi::api::batch::v1::{JobCondition, JobStatus};
        self.modify::<Job, _>(namespace, name, |job| {
            job.status = Some(JobStatus {
                conditions: Some(vec![JobCondition {
                    type_: condition.to_string(),
                    status: "True".to_string(),
                    ..Default::default()
                }]),
                ..Default::default()
            });
        });
    }

    /// Report every replica of a Deployment ready for its current generation
    pub fn mark_deployment_ready(&self, namespace: &str, name: &str) {
        use k8s_openapi::api::apps::v1::DeploymentStatus;
        self.modify::<Deployment, _>(namespace, name, |d| {
            let replicas = d.spec.as_ref().and_then(|s| s.replicas).unwrap_or(1);
            d.status = Some(DeploymentStatus {
                replicas: Some(replicas),
                ready_replicas: Some(replicas),
                observed_generation: d.metadata.generation,
                ..Default::default()
            });
        });
    }

    /// Report every replica of a StatefulSet ready for its current generation
    pub fn mark_statefulset_ready(&self, namespace: &str, name: &str) {
        use k8s_openapi::api::apps::v1::StatefulSetStatus;
        self.modify::<StatefulSet, _>(namespace, name, |s| {
            let replicas = s.spec.as_ref().and_then(|sp| sp.replicas).unwrap_or(1);
            s.status = Some(StatefulSetStatus {
                replicas,
                ready_replicas: Some(replicas),
                observed_generation: s.metadata.generation,
                ..Default::default()
            });
        });
    }

    /// Set the `Ready` condition on any object with a condition-list status
    pub fn set_ready<K>(&self, namespace: &str, name: &str, ready: bool)
    where
        K: Resource<DynamicType = ()>,
    {
        let ar = api_resource_of::<K>();
        let mut state = self.lock();
        let version = state.next_version();
        let Some(stored) = state.objects.get_mut(&key(&ar, namespace, name)) else {
            panic!("{} {}/{} not in store", ar.kind, namespace, name);
        };
        let status = if ready { "True" } else { "False" };
        let condition = serde_json::json!({
            "type": "Ready",
            "status": status,
            "reason": "Test",
            "message": "set by test",
            "lastTransitionTime": "2025-01-01T00:00:00Z",
        });
        let data = &mut stored.data;
        if !data["status"].is_object() {
            data["status"] = serde_json::json!({});
        }
        data["status"]["conditions"] = serde_json::json!([condition]);
        stored.metadata.resource_version = Some(version);
    }
}

/// RFC 7386 merge of `patch` into `target`
fn merge(target: &mut serde_json::Value, patch: &serde_json::Value) {
    match (target.as_object_mut(), patch.as_object()) {
        (Some(t), Some(p)) => {
            for (k, v) in p {
                if v.is_null() {
                    t.remove(k);
                } else {
                    merge(t.entry(k.clone()).or_insert(serde_json::Value::Null), v);
                }
            }
        }
        _ => *target = patch.clone(),
    }
}

#[async_trait]
impl KubeClient for FakeStore {
    async fn get(
        &self,
        ar: &ApiResource,
        namespace: &str,
        name: &str,
    ) -> Result<Option<DynamicObject>, Error> {
        Ok(self.lock().objects.get(&key(ar, namespace, name)).cloned())
    }

    async fn create(
        &self,
        ar: &ApiResource,
        namespace: &str,
        obj: &DynamicObject,
    ) -> Result<DynamicObject, Error> {
        let name = obj.name_any();
        let mut state = self.lock();
        state.check_failure(&ar.kind)?;
        let k = key(ar, namespace, &name);
        if state.objects.contains_key(&k) {
            return Err(Error::conflict(&ar.kind, format!("{}/{}", namespace, name)));
        }
        let version = state.next_version();
        let mut stored = obj.clone();
        stored.metadata.namespace = Some(namespace.to_string());
        stored.metadata.resource_version = Some(version);
        stored.metadata.uid = Some(format!("uid-{}-{}", ar.kind.to_lowercase(), name));
        stored.metadata.generation = Some(1);
        if let Some(map) = stored.data.as_object_mut() {
            map.remove("status");
        }
        state.objects.insert(k, stored.clone());
        state.writes.push(Write::new(WriteOp::Create, &ar.kind, &name));
        Ok(stored)
    }

    async fn replace(
        &self,
        ar: &ApiResource,
        namespace: &str,
        obj: &DynamicObject,
    ) -> Result<DynamicObject, Error> {
        let name = obj.name_any();
        let mut state = self.lock();
        state.check_failure(&ar.kind)?;
        let k = key(ar, namespace, &name);
        let Some(current) = state.objects.get(&k).cloned() else {
            return Err(Error::not_found(&ar.kind, format!("{}/{}", namespace, name)));
        };
        if obj.metadata.resource_version != current.metadata.resource_version {
            return Err(Error::conflict(&ar.kind, format!("{}/{}", namespace, name)));
        }
        let version = state.next_version();
        let mut stored = obj.clone();
        stored.metadata.resource_version = Some(version);
        stored.metadata.uid = current.metadata.uid.clone();
        let generation = current.metadata.generation.unwrap_or(1);
        stored.metadata.generation = Some(if body(obj) != body(&current) {
            generation + 1
        } else {
            generation
        });
        // Status is only writable through the subresource
        if let Some(map) = stored.data.as_object_mut() {
            map.remove("status");
            if let Some(status) = current.data.get("status") {
                map.insert("status".to_string(), status.clone());
            }
        }
        state.objects.insert(k, stored.clone());
        state.writes.push(Write::new(WriteOp::Replace, &ar.kind, &name));
        Ok(stored)
    }

    async fn patch_status(
        &self,
        ar: &ApiResource,
        namespace: &str,
        name: &str,
        resource_version: Option<String>,
        status: &serde_json::Value,
    ) -> Result<(), Error> {
        let mut state = self.lock();
        state.check_failure(&ar.kind)?;
        let version = state.next_version();
        let Some(stored) = state.objects.get_mut(&key(ar, namespace, name)) else {
            return Err(Error::not_found(&ar.kind, format!("{}/{}", namespace, name)));
        };
        if let Some(rv) = resource_version {
            if stored.metadata.resource_version.as_deref() != Some(rv.as_str()) {
                return Err(Error::conflict(&ar.kind, format!("{}/{}", namespace, name)));
            }
        }
        if !stored.data.is_object() {
            stored.data = serde_json::json!({});
        }
        let target = stored
            .data
            .as_object_mut()
            .map(|m| m.entry("status").or_insert(serde_json::Value::Null));
        if let Some(target) = target {
            merge(target, status);
        }
        stored.metadata.resource_version = Some(version);
        state
            .writes
            .push(Write::new(WriteOp::PatchStatus, &ar.kind, name));
        Ok(())
    }

    async fn delete(&self, ar: &ApiResource, namespace: &str, name: &str) -> Result<(), Error> {
        let mut state = self.lock();
        state.check_failure(&ar.kind)?;
        if state.objects.remove(&key(ar, namespace, name)).is_some() {
            state.writes.push(Write::new(WriteOp::Delete, &ar.kind, name));
        }
        Ok(())
    }
}

/// Event recorded by [`RecordingEventPublisher`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedEvent {
    /// Name of the object the event is about
    pub object: String,
    /// `Normal` or `Warning`
    pub warning: bool,
    /// Event reason
    pub reason: String,
    /// Event note
    pub note: Option<String>,
}

/// [`EventPublisher`] that keeps every event in memory
#[derive(Default)]
pub struct RecordingEventPublisher {
    events: Mutex<Vec<RecordedEvent>>,
}

impl RecordingEventPublisher {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Events published so far
    pub fn events(&self) -> Vec<RecordedEvent> {
        match self.events.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Reasons of the events published so far, in order
    pub fn reasons(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.reason).collect()
    }
}

#[async_trait]
impl EventPublisher for RecordingEventPublisher {
    async fn publish(
        &self,
        resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        _action: &str,
        note: Option<String>,
    ) {
        let event = RecordedEvent {
            object: resource_ref.name.clone().unwrap_or_default(),
            warning: matches!(type_, EventType::Warning),
            reason: reason.to_string(),
            note,
        };
        match self.events.lock() {
            Ok(mut guard) => guard.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}
