use openstack_common::crd::{NetworkBackend, Neutron, ServiceStatus};
use openstack_common::dependencies::ovn_dependency;
use openstack_common::images::{self, image_or_default};
use openstack_common::Result;

use super::{password_secret, ApiLayout};
use crate::pipeline::{ManagedService, ServicePlan};
use crate::provisioning::{db_create_step, db_sync_step};

/// Neutron API port
pub const NEUTRON_PORT: u16 = 9696;

impl ManagedService for Neutron {
    const SUFFIX: &'static str = "-neutron";

    fn service_status(&self) -> Option<&ServiceStatus> {
        self.status.as_ref()
    }

    fn plan(&self) -> Result<ServicePlan> {
        let layout = ApiLayout::of(self, Self::SUFFIX, "neutron", "server", NEUTRON_PORT);
        let image = image_or_default(&self.spec.template.image, images::NEUTRON_SERVER);
        let grant = layout.grant(&self.spec.database, &["neutron"]);
        let endpoint = layout.endpoint(&self.spec.exposure);

        let mut server =
            layout.with_transport(layout.api_workload(image.clone(), &self.spec.template));
        if self.spec.mechanism == NetworkBackend::Ovn {
            let ovn = ovn_dependency(&layout.name, Self::SUFFIX, &layout.namespace);
            server = server
                .env("OVN_NB_DB_CONNECTION", ovn.northbound)
                .env("OVN_SB_DB_CONNECTION", ovn.southbound);
        }

        Ok(ServicePlan {
            secrets: vec![password_secret(grant.password_secret.clone())],
            provisioning: vec![
                db_create_step(&layout.name, &grant),
                db_sync_step(&layout.name, &image, "neutron-db-manage upgrade heads", &grant),
            ],
            api: server,
            workers: Vec::new(),
            registration: layout.registration("network", &endpoint, &self.spec.region),
            endpoint,
        })
    }
}
