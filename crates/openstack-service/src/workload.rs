//! Workload builders
//!
//! Mutators that bring Deployments, StatefulSets, and Services to their
//! desired form. They overwrite the fields the operator manages and leave
//! everything else alone, so the same mutator serves creation and update and
//! the values the API server defaults on a stored object never look like
//! drift. Labels are merged, never replaced.

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, ExecAction, PersistentVolumeClaim, PersistentVolumeClaimSpec, PodSpec,
    PodTemplateSpec, Probe, ResourceRequirements as PodResources, Service, ServicePort,
    TCPSocketAction, VolumeMount, VolumeResourceRequirements,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use openstack_common::apply::{create_or_update, ApplyOutcome};
use openstack_common::crd::{ResourceQuantity, ResourceRequirements, ServiceTemplate, StorageSpec};
use openstack_common::job::{env_vars, SecretKeyRef};
use openstack_common::kube_utils::{standard_labels, Owner};
use openstack_common::store::KubeClient;
use openstack_common::{Result, LABEL_COMPONENT};

/// Named container port
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PortSpec {
    /// Port name
    pub name: String,
    /// Port number, used for both the container and the Service
    pub port: u16,
}

impl PortSpec {
    /// Create a port
    pub fn new(name: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            port,
        }
    }
}

/// Per-replica persistent volume of a StatefulSet
#[derive(Clone, Debug, PartialEq)]
pub struct VolumeSpec {
    /// Claim template name, also the volume name
    pub name: String,
    /// Mount path in the container
    pub mount_path: String,
    /// Size and class
    pub storage: StorageSpec,
}

/// Desired single-container workload
#[derive(Clone, Debug, PartialEq)]
pub struct WorkloadSpec {
    /// Object name
    pub name: String,
    /// Labels of the object and its pods; also the selector
    pub labels: BTreeMap<String, String>,
    /// Container name
    pub container: String,
    /// Container image
    pub image: String,
    /// Replica count
    pub replicas: i32,
    /// Entrypoint override
    pub command: Vec<String>,
    /// Entrypoint arguments
    pub args: Vec<String>,
    /// Exposed ports
    pub ports: Vec<PortSpec>,
    /// Literal environment
    pub env: Vec<(String, String)>,
    /// Environment read from secrets
    pub secret_env: Vec<(String, SecretKeyRef)>,
    /// Container resources
    pub resources: Option<ResourceRequirements>,
    /// Node selector
    pub node_selector: BTreeMap<String, String>,
    /// Readiness probe
    pub readiness_probe: Option<Probe>,
    /// Persistent volume; StatefulSets only
    pub volume: Option<VolumeSpec>,
}

impl WorkloadSpec {
    /// Start a workload with one replica and nothing else configured
    pub fn new(
        name: impl Into<String>,
        labels: BTreeMap<String, String>,
        container: impl Into<String>,
        image: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            labels,
            container: container.into(),
            image: image.into(),
            replicas: 1,
            command: Vec::new(),
            args: Vec::new(),
            ports: Vec::new(),
            env: Vec::new(),
            secret_env: Vec::new(),
            resources: None,
            node_selector: BTreeMap::new(),
            readiness_probe: None,
            volume: None,
        }
    }

    /// Set the replica count
    pub fn replicas(mut self, replicas: i32) -> Self {
        self.replicas = replicas;
        self
    }

    /// Take replicas, resources, and node selector from a template
    pub fn template(mut self, template: &ServiceTemplate) -> Self {
        self.replicas = template.replicas;
        self.resources = template.resources.clone();
        self.node_selector = template.node_selector.clone();
        self
    }

    /// Add a port
    pub fn port(mut self, name: impl Into<String>, port: u16) -> Self {
        self.ports.push(PortSpec::new(name, port));
        self
    }

    /// Override the entrypoint
    pub fn command<I, S>(mut self, command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.command = command.into_iter().map(Into::into).collect();
        self
    }

    /// Set the entrypoint arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
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

    /// Set the readiness probe
    pub fn readiness_probe(mut self, probe: Probe) -> Self {
        self.readiness_probe = Some(probe);
        self
    }

    /// Attach a per-replica volume
    pub fn volume(
        mut self,
        name: impl Into<String>,
        mount_path: impl Into<String>,
        storage: &StorageSpec,
    ) -> Self {
        self.volume = Some(VolumeSpec {
            name: name.into(),
            mount_path: mount_path.into(),
            storage: storage.clone(),
        });
        self
    }
}

/// Standard labels plus the component
pub fn component_labels(app: &str, instance: &str, component: &str) -> BTreeMap<String, String> {
    let mut labels = standard_labels(app, instance);
    labels.insert(LABEL_COMPONENT.to_string(), component.to_string());
    labels
}

// Timings spelled out with the API server's defaults
fn check_defaults() -> Probe {
    Probe {
        period_seconds: Some(10),
        timeout_seconds: Some(1),
        success_threshold: Some(1),
        failure_threshold: Some(3),
        ..Default::default()
    }
}

/// Readiness probe opening a TCP connection to `port`
pub fn tcp_probe(port: u16) -> Probe {
    Probe {
        tcp_socket: Some(TCPSocketAction {
            port: IntOrString::Int(i32::from(port)),
            ..Default::default()
        }),
        initial_delay_seconds: Some(5),
        ..check_defaults()
    }
}

/// Readiness probe running a command in the container
pub fn exec_probe<I, S>(command: I) -> Probe
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Probe {
        exec: Some(ExecAction {
            command: Some(command.into_iter().map(Into::into).collect()),
        }),
        initial_delay_seconds: Some(10),
        ..check_defaults()
    }
}

fn quantities(q: &ResourceQuantity) -> Option<BTreeMap<String, Quantity>> {
    let map: BTreeMap<String, Quantity> = [("cpu", &q.cpu), ("memory", &q.memory)]
        .into_iter()
        .filter_map(|(name, value)| {
            value
                .as_ref()
                .map(|v| (name.to_string(), Quantity(v.clone())))
        })
        .collect();
    (!map.is_empty()).then_some(map)
}

/// Convert template resources into the pod representation
pub fn pod_resources(resources: &ResourceRequirements) -> PodResources {
    PodResources {
        requests: resources.requests.as_ref().and_then(quantities),
        limits: resources.limits.as_ref().and_then(quantities),
        ..Default::default()
    }
}

fn container(spec: &WorkloadSpec) -> Container {
    let non_empty = |v: &Vec<String>| (!v.is_empty()).then(|| v.clone());
    let env = env_vars(&spec.env, &spec.secret_env);
    Container {
        name: spec.container.clone(),
        image: Some(spec.image.clone()),
        command: non_empty(&spec.command),
        args: non_empty(&spec.args),
        ports: (!spec.ports.is_empty()).then(|| {
            spec.ports
                .iter()
                .map(|p| ContainerPort {
                    name: Some(p.name.clone()),
                    container_port: i32::from(p.port),
                    protocol: Some("TCP".to_string()),
                    ..Default::default()
                })
                .collect()
        }),
        env: (!env.is_empty()).then_some(env),
        resources: spec.resources.as_ref().map(pod_resources),
        readiness_probe: spec.readiness_probe.clone(),
        volume_mounts: spec.volume.as_ref().map(|v| {
            vec![VolumeMount {
                name: v.name.clone(),
                mount_path: v.mount_path.clone(),
                ..Default::default()
            }]
        }),
        ..Default::default()
    }
}

fn merge_labels(target: &mut Option<BTreeMap<String, String>>, labels: &BTreeMap<String, String>) {
    target
        .get_or_insert_with(Default::default)
        .extend(labels.iter().map(|(k, v)| (k.clone(), v.clone())));
}

fn merge_container(target: &mut Container, desired: Container) {
    target.image = desired.image;
    target.command = desired.command;
    target.args = desired.args;
    target.ports = desired.ports;
    target.env = desired.env;
    target.readiness_probe = desired.readiness_probe;
    target.volume_mounts = desired.volume_mounts;
    // The API server stores absent resources as `{}`
    let none = PodResources::default();
    if desired.resources.as_ref().unwrap_or(&none) != target.resources.as_ref().unwrap_or(&none) {
        target.resources = desired.resources;
    }
}

fn merge_pod_template(template: &mut PodTemplateSpec, spec: &WorkloadSpec) {
    let metadata = template.metadata.get_or_insert_with(Default::default);
    merge_labels(&mut metadata.labels, &spec.labels);

    let pod = template.spec.get_or_insert_with(PodSpec::default);
    pod.node_selector = (!spec.node_selector.is_empty()).then(|| spec.node_selector.clone());
    let desired = container(spec);
    match pod.containers.iter_mut().find(|c| c.name == desired.name) {
        Some(current) => merge_container(current, desired),
        None => pod.containers = vec![desired],
    }
}

fn selector(labels: &BTreeMap<String, String>) -> LabelSelector {
    LabelSelector {
        match_labels: Some(labels.clone()),
        ..Default::default()
    }
}

/// Bring a Deployment to the desired form
pub fn apply_deployment(deployment: &mut Deployment, spec: &WorkloadSpec) {
    merge_labels(&mut deployment.metadata.labels, &spec.labels);
    let target = deployment.spec.get_or_insert_with(Default::default);
    target.replicas = Some(spec.replicas);
    target.selector = selector(&spec.labels);
    merge_pod_template(&mut target.template, spec);
}

/// Bring a StatefulSet governed by `service_name` to the desired form.
///
/// Volume claim templates are immutable, so they are only set on a
/// StatefulSet that has none yet.
pub fn apply_statefulset(statefulset: &mut StatefulSet, spec: &WorkloadSpec, service_name: &str) {
    merge_labels(&mut statefulset.metadata.labels, &spec.labels);
    let target = statefulset.spec.get_or_insert_with(Default::default);
    target.replicas = Some(spec.replicas);
    target.service_name = service_name.to_string().into();
    target.selector = selector(&spec.labels);
    merge_pod_template(&mut target.template, spec);

    let Some(volume) = &spec.volume else {
        return;
    };
    if target
        .volume_claim_templates
        .as_ref()
        .is_some_and(|t| !t.is_empty())
    {
        return;
    }
    target.volume_claim_templates = Some(vec![PersistentVolumeClaim {
        metadata: ObjectMeta {
            name: Some(volume.name.clone()),
            ..Default::default()
        },
        spec: Some(PersistentVolumeClaimSpec {
            access_modes: Some(vec!["ReadWriteOnce".to_string()]),
            storage_class_name: volume.storage.storage_class.clone(),
            resources: Some(VolumeResourceRequirements {
                requests: Some(BTreeMap::from([(
                    "storage".to_string(),
                    Quantity(volume.storage.size.clone()),
                )])),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }]);
}

/// Bring a Service selecting `labels` to the desired form.
///
/// A headless Service gets `clusterIP: None`; the cluster IP of a regular
/// Service is left to the API server.
pub fn apply_service(
    service: &mut Service,
    labels: &BTreeMap<String, String>,
    ports: &[PortSpec],
    headless: bool,
) {
    merge_labels(&mut service.metadata.labels, labels);
    let target = service.spec.get_or_insert_with(Default::default);
    target.selector = Some(labels.clone());
    target.ports = Some(
        ports
            .iter()
            .map(|p| ServicePort {
                name: Some(p.name.clone()),
                port: i32::from(p.port),
                target_port: Some(IntOrString::Int(i32::from(p.port))),
                protocol: Some("TCP".to_string()),
                ..Default::default()
            })
            .collect(),
    );
    if headless {
        target.cluster_ip = Some("None".to_string());
    }
}

/// Create or update the Deployment described by `spec`
pub async fn ensure_deployment(
    client: &dyn KubeClient,
    owner: &Owner,
    spec: &WorkloadSpec,
) -> Result<ApplyOutcome> {
    create_or_update::<Deployment, _>(client, owner, &spec.name, |d| apply_deployment(d, spec))
        .await
}

/// Create or update the StatefulSet described by `spec`
pub async fn ensure_statefulset(
    client: &dyn KubeClient,
    owner: &Owner,
    spec: &WorkloadSpec,
    service_name: &str,
) -> Result<ApplyOutcome> {
    create_or_update::<StatefulSet, _>(client, owner, &spec.name, |s| {
        apply_statefulset(s, spec, service_name)
    })
    .await
}

/// Create or update the Service `name` in front of the workload `spec`
pub async fn ensure_service(
    client: &dyn KubeClient,
    owner: &Owner,
    name: &str,
    spec: &WorkloadSpec,
    headless: bool,
) -> Result<ApplyOutcome> {
    create_or_update::<Service, _>(client, owner, name, |s| {
        apply_service(s, &spec.labels, &spec.ports, headless)
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use openstack_common::crd::{Memcached, MemcachedSpec};
    use openstack_common::testing::{FakeStore, Write, WriteOp};

    fn api_workload() -> WorkloadSpec {
        WorkloadSpec::new(
            "glance-api",
            component_labels("glance", "glance", "api"),
            "glance-api",
            "quay.io/openstack.kolla/glance-api:2025.1",
        )
        .port("api", 9292)
        .env("OS_REGION", "RegionOne")
        .secret_env("DB_PASSWORD", "glance-db-password", "password")
        .readiness_probe(tcp_probe(9292))
    }

    fn owner(store: &FakeStore) -> Owner {
        let mut m = Memcached::new("memcached", MemcachedSpec::default());
        m.metadata.namespace = Some("openstack".to_string());
        Owner::of(&store.insert(&m)).unwrap()
    }

    mod builders {
        use super::*;

        #[test]
        fn deployment_selects_its_own_pods() {
            let mut d = Deployment::default();
            apply_deployment(&mut d, &api_workload().replicas(3));

            let spec = d.spec.unwrap();
            assert_eq!(spec.replicas, Some(3));
            let selector = spec.selector.match_labels.unwrap();
            let pod_labels = spec.template.metadata.unwrap().labels.unwrap();
            assert_eq!(selector, pod_labels);
            assert_eq!(selector[LABEL_COMPONENT], "api");
            assert_eq!(selector["app.kubernetes.io/managed-by"], "openstack-operator");
        }

        #[test]
        fn container_carries_ports_env_and_readiness_check() {
            let mut d = Deployment::default();
            apply_deployment(&mut d, &api_workload());

            let pod = d.spec.unwrap().template.spec.unwrap();
            let c = &pod.containers[0];
            assert_eq!(c.name, "glance-api");
            assert_eq!(c.ports.as_ref().unwrap()[0].container_port, 9292);
            let env = c.env.as_ref().unwrap();
            assert_eq!(env[0].value.as_deref(), Some("RegionOne"));
            let secret = env[1]
                .value_from
                .as_ref()
                .and_then(|v| v.secret_key_ref.as_ref())
                .unwrap();
            assert_eq!(secret.name, "glance-db-password");
            assert_eq!(secret.key, "password");
            assert!(c.readiness_probe.as_ref().unwrap().tcp_socket.is_some());
            assert!(c.command.is_none());
        }

        #[test]
        fn template_resources_become_quantities() {
            let template = ServiceTemplate {
                resources: Some(ResourceRequirements {
                    requests: Some(ResourceQuantity {
                        cpu: Some("100m".to_string()),
                        memory: None,
                    }),
                    limits: Some(ResourceQuantity::default()),
                }),
                node_selector: BTreeMap::from([("role".to_string(), "control".to_string())]),
                replicas: 2,
                ..Default::default()
            };
            let mut d = Deployment::default();
            apply_deployment(&mut d, &api_workload().template(&template));

            let spec = d.spec.unwrap();
            assert_eq!(spec.replicas, Some(2));
            let pod = spec.template.spec.unwrap();
            assert_eq!(pod.node_selector.unwrap()["role"], "control");
            let resources = pod.containers[0].resources.clone().unwrap();
            assert_eq!(resources.requests.unwrap()["cpu"], Quantity("100m".to_string()));
            assert!(resources.limits.is_none());
        }

        fn claim_size(claim: &PersistentVolumeClaim) -> Quantity {
            let spec = claim.spec.as_ref().unwrap();
            spec.resources.as_ref().unwrap().requests.as_ref().unwrap()["storage"].clone()
        }

        #[test]
        fn statefulset_claim_templates_are_set_once() {
            let storage = StorageSpec::default();
            let spec = api_workload().volume("data", "/var/lib/glance", &storage);
            let mut s = StatefulSet::default();
            apply_statefulset(&mut s, &spec, "glance-api");

            let claims = s.spec.as_ref().unwrap().volume_claim_templates.clone().unwrap();
            assert_eq!(claims.len(), 1);
            assert_eq!(claim_size(&claims[0]), Quantity("10Gi".to_string()));

            let bigger = StorageSpec {
                size: "50Gi".to_string(),
                storage_class: None,
            };
            apply_statefulset(&mut s, &api_workload().volume("data", "/x", &bigger), "glance-api");
            let claims = s.spec.as_ref().unwrap().volume_claim_templates.clone().unwrap();
            assert_eq!(claim_size(&claims[0]), Quantity("10Gi".to_string()));
            let value = serde_json::to_value(&s).unwrap();
            assert_eq!(value["spec"]["serviceName"], "glance-api");
        }

        #[test]
        fn headless_service_has_no_cluster_ip() {
            let spec = api_workload();
            let mut svc = Service::default();
            apply_service(&mut svc, &spec.labels, &spec.ports, true);
            let s = svc.spec.unwrap();
            assert_eq!(s.cluster_ip.as_deref(), Some("None"));
            let port = &s.ports.unwrap()[0];
            assert_eq!(port.port, 9292);
            assert_eq!(port.target_port, Some(IntOrString::Int(9292)));

            let mut svc = Service::default();
            apply_service(&mut svc, &spec.labels, &spec.ports, false);
            assert!(svc.spec.unwrap().cluster_ip.is_none());
        }
    }

    mod apply {
        use super::*;

        /// Story: re-applying an unchanged workload writes nothing, while a
        /// replica change replaces the Deployment.
        #[tokio::test]
        async fn story_deployment_converges_without_redundant_writes() {
            let store = FakeStore::new();
            let owner = owner(&store);

            ensure_deployment(&store, &owner, &api_workload()).await.unwrap();
            ensure_service(&store, &owner, "glance-api", &api_workload(), false)
                .await
                .unwrap();
            let outcome = ensure_deployment(&store, &owner, &api_workload()).await.unwrap();
            assert_eq!(outcome, ApplyOutcome::Unchanged);

            let outcome = ensure_deployment(&store, &owner, &api_workload().replicas(2))
                .await
                .unwrap();
            assert_eq!(outcome, ApplyOutcome::Updated);
            assert_eq!(
                store.writes(),
                vec![
                    Write::new(WriteOp::Create, "Deployment", "glance-api"),
                    Write::new(WriteOp::Create, "Service", "glance-api"),
                    Write::new(WriteOp::Replace, "Deployment", "glance-api"),
                ]
            );
            let stored: Deployment = store.get_typed("openstack", "glance-api").unwrap();
            assert_eq!(stored.metadata.generation, Some(2));
        }

        // What the API server fills in on a stored pod template
        fn default_pod(pod: &mut PodSpec) {
            pod.restart_policy = Some("Always".to_string());
            pod.dns_policy = Some("ClusterFirst".to_string());
            pod.scheduler_name = Some("default-scheduler".to_string());
            pod.termination_grace_period_seconds = Some(30);
            pod.security_context = Some(Default::default());
            for c in &mut pod.containers {
                c.image_pull_policy = Some("IfNotPresent".to_string());
                c.termination_message_path = Some("/dev/termination-log".to_string());
                c.termination_message_policy = Some("File".to_string());
                c.resources.get_or_insert_with(Default::default);
            }
        }

        /// Story: once the API server has defaulted the stored objects, the
        /// next apply of the same workload writes nothing and the defaults
        /// survive a real change.
        #[tokio::test]
        async fn story_server_defaults_are_not_drift() {
            let store = FakeStore::new();
            let owner = owner(&store);
            let spec = api_workload();
            ensure_deployment(&store, &owner, &spec).await.unwrap();
            ensure_service(&store, &owner, "glance-api", &spec, false)
                .await
                .unwrap();

            store.modify::<Deployment, _>("openstack", "glance-api", |d| {
                d.metadata
                    .labels
                    .get_or_insert_with(Default::default)
                    .insert("team".to_string(), "images".to_string());
                let spec = d.spec.as_mut().unwrap();
                spec.revision_history_limit = Some(10);
                spec.progress_deadline_seconds = Some(600);
                spec.strategy = Some(Default::default());
                default_pod(spec.template.spec.as_mut().unwrap());
            });
            store.modify::<Service, _>("openstack", "glance-api", |s| {
                let spec = s.spec.as_mut().unwrap();
                spec.type_ = Some("ClusterIP".to_string());
                spec.cluster_ip = Some("10.96.0.12".to_string());
                spec.cluster_ips = Some(vec!["10.96.0.12".to_string()]);
                spec.session_affinity = Some("None".to_string());
            });
            store.clear_writes();

            let outcome = ensure_deployment(&store, &owner, &spec).await.unwrap();
            assert_eq!(outcome, ApplyOutcome::Unchanged);
            let outcome = ensure_service(&store, &owner, "glance-api", &spec, false)
                .await
                .unwrap();
            assert_eq!(outcome, ApplyOutcome::Unchanged);
            assert!(store.writes().is_empty());

            let mut newer = api_workload();
            newer.image = "quay.io/openstack.kolla/glance-api:2025.2".to_string();
            let outcome = ensure_deployment(&store, &owner, &newer).await.unwrap();
            assert_eq!(outcome, ApplyOutcome::Updated);
            let stored: Deployment = store.get_typed("openstack", "glance-api").unwrap();
            assert_eq!(stored.metadata.labels.as_ref().unwrap()["team"], "images");
            let pod = stored.spec.unwrap().template.spec.unwrap();
            assert_eq!(pod.restart_policy.as_deref(), Some("Always"));
            let c = &pod.containers[0];
            assert_eq!(
                c.image.as_deref(),
                Some("quay.io/openstack.kolla/glance-api:2025.2")
            );
            assert_eq!(c.image_pull_policy.as_deref(), Some("IfNotPresent"));
        }

        #[tokio::test]
        async fn statefulset_defaults_are_not_drift() {
            let store = FakeStore::new();
            let owner = owner(&store);
            let spec = api_workload().volume("data", "/data", &StorageSpec::default());
            ensure_statefulset(&store, &owner, &spec, "glance-api")
                .await
                .unwrap();
            store.modify::<StatefulSet, _>("openstack", "glance-api", |s| {
                let spec = s.spec.as_mut().unwrap();
                spec.pod_management_policy = Some("OrderedReady".to_string());
                spec.revision_history_limit = Some(10);
                spec.update_strategy = Some(Default::default());
                default_pod(spec.template.spec.as_mut().unwrap());
            });

            let outcome = ensure_statefulset(&store, &owner, &spec, "glance-api")
                .await
                .unwrap();
            assert_eq!(outcome, ApplyOutcome::Unchanged);
        }

        #[tokio::test]
        async fn statefulset_is_owned() {
            let store = FakeStore::new();
            let owner = owner(&store);
            let spec = api_workload().volume("data", "/data", &StorageSpec::default());
            ensure_statefulset(&store, &owner, &spec, "glance-api")
                .await
                .unwrap();

            let stored: StatefulSet = store.get_typed("openstack", "glance-api").unwrap();
            let refs = stored.metadata.owner_references.unwrap();
            assert_eq!(refs[0].name, "memcached");
            assert_eq!(refs[0].controller, Some(true));
        }
    }
}
