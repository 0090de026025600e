//! Default container images
//!
//! Kolla images of the 2025.1 release. A non-empty image in a spec always
//! wins over these.

/// PostgreSQL server and client image
pub const POSTGRESQL: &str = "postgres:17";
/// MySQL server and client image
pub const MYSQL: &str = "mysql:8.4";
/// MariaDB server and client image
pub const MARIADB: &str = "quay.io/openstack.kolla/mariadb-server:2025.1";
/// RabbitMQ broker
pub const RABBITMQ: &str = "quay.io/openstack.kolla/rabbitmq:2025.1";
/// Memcached
pub const MEMCACHED: &str = "quay.io/openstack.kolla/memcached:2025.1";
/// Keystone API, also used as the OpenStack client image
pub const KEYSTONE: &str = "quay.io/openstack.kolla/keystone:2025.1";
/// Glance API
pub const GLANCE_API: &str = "quay.io/openstack.kolla/glance-api:2025.1";
/// Placement API
pub const PLACEMENT_API: &str = "quay.io/openstack.kolla/placement-api:2025.1";
/// Neutron server
pub const NEUTRON_SERVER: &str = "quay.io/openstack.kolla/neutron-server:2025.1";
/// Nova API
pub const NOVA_API: &str = "quay.io/openstack.kolla/nova-api:2025.1";
/// Nova scheduler
pub const NOVA_SCHEDULER: &str = "quay.io/openstack.kolla/nova-scheduler:2025.1";
/// Nova conductor
pub const NOVA_CONDUCTOR: &str = "quay.io/openstack.kolla/nova-conductor:2025.1";
/// Nova compute
pub const NOVA_COMPUTE: &str = "quay.io/openstack.kolla/nova-compute:2025.1";
/// OVN northd
pub const OVN_NORTHD: &str = "quay.io/openstack.kolla/ovn-northd:2025.1";
/// OVN northbound database server
pub const OVN_NB_DB: &str = "quay.io/openstack.kolla/ovn-nb-db-server:2025.1";
/// OVN southbound database server
pub const OVN_SB_DB: &str = "quay.io/openstack.kolla/ovn-sb-db-server:2025.1";

/// `image` unless empty, else `default`
pub fn image_or_default(image: &str, default: &str) -> String {
    if image.is_empty() {
        default.to_string()
    } else {
        image.to_string()
    }
}
