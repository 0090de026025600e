//! Child objects of a control plane
//!
//! Every child is named `<controlplane>-<service>` and lives in the control
//! plane's namespace. Services inherit a public hostname under the control
//! plane's public domain and the control plane's gateway unless their own
//! spec sets them.

use kube::{Resource, ResourceExt};

use openstack_common::crd::{
    Database, ExposureSpec, Glance, Keystone, Memcached, Neutron, Nova, OVNNetwork,
    OpenStackControlPlane, OpenStackControlPlaneSpec, Placement, RabbitMQ,
};
use openstack_common::kube_utils::standard_labels;
use openstack_common::readiness::ChildRef;

/// Name of the child of `cp` for `service`
pub fn child_name(cp: &OpenStackControlPlane, service: &str) -> String {
    format!("{}-{}", cp.name_any(), service)
}

/// Fill in the exposure a service inherits from the control plane.
///
/// An unset or empty hostname becomes `<service>.<public domain>`. A missing
/// gateway, or one with an empty name, is replaced by the control plane's.
pub fn inherit_exposure(
    exposure: &ExposureSpec,
    service: &str,
    spec: &OpenStackControlPlaneSpec,
) -> ExposureSpec {
    let mut inherited = exposure.clone();
    if inherited
        .public_hostname
        .as_deref()
        .map_or(true, str::is_empty)
    {
        inherited.public_hostname = Some(format!("{}.{}", service, spec.public_domain()));
    }
    if !inherited.has_gateway() {
        if let Some(gateway) = &spec.gateway_ref {
            inherited.gateway_ref = Some(gateway.clone());
        }
    }
    inherited
}

fn stamp<K: Resource>(cp: &OpenStackControlPlane, service: &str, mut child: K) -> K {
    let meta = child.meta_mut();
    meta.namespace = cp.namespace();
    meta.labels = Some(standard_labels(service, &cp.name_any()));
    child
}

/// Shared database server
pub fn database(cp: &OpenStackControlPlane) -> Database {
    let db = Database::new(&child_name(cp, "database"), cp.spec.database.clone());
    stamp(cp, "database", db)
}

/// Message broker
pub fn rabbitmq(cp: &OpenStackControlPlane) -> RabbitMQ {
    let mq = RabbitMQ::new(&child_name(cp, "rabbitmq"), cp.spec.rabbitmq.clone());
    stamp(cp, "rabbitmq", mq)
}

/// Cache
pub fn memcached(cp: &OpenStackControlPlane) -> Memcached {
    let mc = Memcached::new(&child_name(cp, "memcached"), cp.spec.memcached.clone());
    stamp(cp, "memcached", mc)
}

/// OVN databases and northd; `None` unless the network backend is OVN
pub fn ovn_network(cp: &OpenStackControlPlane) -> Option<OVNNetwork> {
    if !cp.spec.uses_ovn() {
        return None;
    }
    let spec = cp.spec.ovn_network.clone().unwrap_or_default();
    Some(stamp(cp, "ovn", OVNNetwork::new(&child_name(cp, "ovn"), spec)))
}

/// Identity service
pub fn keystone(cp: &OpenStackControlPlane) -> Keystone {
    let mut spec = cp.spec.keystone.clone();
    spec.exposure = inherit_exposure(&spec.exposure, "keystone", &cp.spec);
    spec.region = cp.spec.region.clone();
    stamp(cp, "keystone", Keystone::new(&child_name(cp, "keystone"), spec))
}

/// Image service
pub fn glance(cp: &OpenStackControlPlane) -> Glance {
    let mut spec = cp.spec.glance.clone();
    spec.exposure = inherit_exposure(&spec.exposure, "glance", &cp.spec);
    spec.region = cp.spec.region.clone();
    stamp(cp, "glance", Glance::new(&child_name(cp, "glance"), spec))
}

/// Placement service
pub fn placement(cp: &OpenStackControlPlane) -> Placement {
    let mut spec = cp.spec.placement.clone();
    spec.exposure = inherit_exposure(&spec.exposure, "placement", &cp.spec);
    spec.region = cp.spec.region.clone();
    stamp(cp, "placement", Placement::new(&child_name(cp, "placement"), spec))
}

/// Networking service; the mechanism follows the control plane's backend
pub fn neutron(cp: &OpenStackControlPlane) -> Neutron {
    let mut spec = cp.spec.neutron.clone();
    spec.exposure = inherit_exposure(&spec.exposure, "neutron", &cp.spec);
    spec.mechanism = cp.spec.network_backend;
    spec.region = cp.spec.region.clone();
    stamp(cp, "neutron", Neutron::new(&child_name(cp, "neutron"), spec))
}

/// Compute service
pub fn nova(cp: &OpenStackControlPlane) -> Nova {
    let mut spec = cp.spec.nova.clone();
    spec.exposure = inherit_exposure(&spec.exposure, "nova", &cp.spec);
    spec.region = cp.spec.region.clone();
    stamp(cp, "nova", Nova::new(&child_name(cp, "nova"), spec))
}

/// Infrastructure children in gate order
pub fn infrastructure_refs(cp: &OpenStackControlPlane) -> Vec<ChildRef> {
    let ns = cp.namespace().unwrap_or_default();
    let mut refs = vec![
        ChildRef::of::<Database>(&ns, child_name(cp, "database")),
        ChildRef::of::<RabbitMQ>(&ns, child_name(cp, "rabbitmq")),
        ChildRef::of::<Memcached>(&ns, child_name(cp, "memcached")),
    ];
    if cp.spec.uses_ovn() {
        refs.push(ChildRef::of::<OVNNetwork>(&ns, child_name(cp, "ovn")));
    }
    refs
}

/// The identity child
pub fn identity_refs(cp: &OpenStackControlPlane) -> Vec<ChildRef> {
    let ns = cp.namespace().unwrap_or_default();
    vec![ChildRef::of::<Keystone>(&ns, child_name(cp, "keystone"))]
}

/// Core service children in gate order
pub fn core_service_refs(cp: &OpenStackControlPlane) -> Vec<ChildRef> {
    let ns = cp.namespace().unwrap_or_default();
    vec![
        ChildRef::of::<Glance>(&ns, child_name(cp, "glance")),
        ChildRef::of::<Placement>(&ns, child_name(cp, "placement")),
        ChildRef::of::<Neutron>(&ns, child_name(cp, "neutron")),
    ]
}

/// The compute child
pub fn compute_refs(cp: &OpenStackControlPlane) -> Vec<ChildRef> {
    let ns = cp.namespace().unwrap_or_default();
    vec![ChildRef::of::<Nova>(&ns, child_name(cp, "nova"))]
}

/// Every child of the enabled tiers, in rollout order
pub fn all_refs(cp: &OpenStackControlPlane) -> Vec<ChildRef> {
    let mut refs = infrastructure_refs(cp);
    refs.extend(identity_refs(cp));
    refs.extend(core_service_refs(cp));
    refs.extend(compute_refs(cp));
    refs
}

#[cfg(test)]
mod tests {
    use super::*;
    use openstack_common::crd::{GatewayRef, NetworkBackend, OpenStackControlPlaneSpec};
    use openstack_common::dependencies::{database_dependency, keystone_dependency};

    fn control_plane(spec: OpenStackControlPlaneSpec) -> OpenStackControlPlane {
        let mut cp = OpenStackControlPlane::new("cloud", spec);
        cp.metadata.namespace = Some("openstack".to_string());
        cp
    }

    fn gateway(name: &str) -> GatewayRef {
        GatewayRef {
            name: name.to_string(),
            namespace: Some("gateways".to_string()),
            listener_name: None,
        }
    }

    mod exposure {
        use super::*;

        #[test]
        fn test_hostname_derived_from_default_domain() {
            let cp = control_plane(OpenStackControlPlaneSpec::default());
            let ks = keystone(&cp);
            assert_eq!(
                ks.spec.exposure.public_hostname.as_deref(),
                Some("keystone.openstack.local")
            );
            assert_eq!(ks.spec.exposure.gateway_ref, None);
        }

        #[test]
        fn test_explicit_hostname_kept() {
            let mut spec = OpenStackControlPlaneSpec {
                public_domain: Some("cloud.example.com".to_string()),
                ..Default::default()
            };
            spec.glance.exposure.public_hostname = Some("images.example.com".to_string());
            let cp = control_plane(spec);

            assert_eq!(
                glance(&cp).spec.exposure.public_hostname.as_deref(),
                Some("images.example.com")
            );
            assert_eq!(
                nova(&cp).spec.exposure.public_hostname.as_deref(),
                Some("nova.cloud.example.com")
            );
        }

        #[test]
        fn test_gateway_inherited_only_when_unnamed() {
            let mut spec = OpenStackControlPlaneSpec {
                gateway_ref: Some(gateway("public")),
                ..Default::default()
            };
            spec.placement.exposure.gateway_ref = Some(gateway(""));
            spec.neutron.exposure.gateway_ref = Some(gateway("internal"));
            let cp = control_plane(spec);

            let inherited = placement(&cp).spec.exposure.gateway_ref.unwrap();
            assert_eq!(inherited.name, "public");
            let own = neutron(&cp).spec.exposure.gateway_ref.unwrap();
            assert_eq!(own.name, "internal");
        }
    }

    #[test]
    fn test_children_are_named_after_the_control_plane() {
        let cp = control_plane(OpenStackControlPlaneSpec::default());
        let db = database(&cp);
        assert_eq!(db.name_any(), "cloud-database");
        assert_eq!(db.namespace().as_deref(), Some("openstack"));
        assert_eq!(db.labels()["app.kubernetes.io/instance"], "cloud");

        let dep = database_dependency(&keystone(&cp).name_any(), "-keystone", "openstack");
        assert_eq!(dep.name, "cloud-database");
        let ks = keystone_dependency(&glance(&cp).name_any(), "-glance", "openstack");
        assert_eq!(ks.name, "cloud-keystone");
    }

    #[test]
    fn test_ovn_child_follows_backend() {
        let mut cp = control_plane(OpenStackControlPlaneSpec::default());
        assert_eq!(ovn_network(&cp).unwrap().name_any(), "cloud-ovn");
        assert_eq!(infrastructure_refs(&cp).len(), 4);
        assert_eq!(neutron(&cp).spec.mechanism, NetworkBackend::Ovn);

        cp.spec.network_backend = NetworkBackend::Ovs;
        assert!(ovn_network(&cp).is_none());
        assert_eq!(infrastructure_refs(&cp).len(), 3);
        assert_eq!(neutron(&cp).spec.mechanism, NetworkBackend::Ovs);
    }

    #[test]
    fn test_services_take_the_control_plane_region() {
        let cp = control_plane(OpenStackControlPlaneSpec {
            region: "RegionTwo".to_string(),
            ..Default::default()
        });
        assert_eq!(keystone(&cp).spec.region, "RegionTwo");
        assert_eq!(nova(&cp).spec.region, "RegionTwo");
    }

    #[test]
    fn test_all_refs_in_rollout_order() {
        let cp = control_plane(OpenStackControlPlaneSpec::default());
        let names: Vec<_> = all_refs(&cp).into_iter().map(|r| r.name).collect();
        assert_eq!(
            names,
            vec![
                "cloud-database",
                "cloud-rabbitmq",
                "cloud-memcached",
                "cloud-ovn",
                "cloud-keystone",
                "cloud-glance",
                "cloud-placement",
                "cloud-neutron",
                "cloud-nova",
            ]
        );
    }
}
