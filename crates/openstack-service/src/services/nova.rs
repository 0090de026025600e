use openstack_common::crd::{Nova, ServiceStatus};
use openstack_common::images::{self, image_or_default};
use openstack_common::Result;

use super::{password_secret, ApiLayout};
use crate::pipeline::{ManagedService, ServicePlan};
use crate::provisioning::{cell_setup_step, db_create_step, db_sync_step};
use crate::workload::WorkloadSpec;

/// Nova API port
pub const NOVA_PORT: u16 = 8774;

/// Databases owned by nova; the first is the main one
pub const NOVA_DATABASES: [&str; 3] = ["nova", "nova_api", "nova_cell0"];

impl ManagedService for Nova {
    const SUFFIX: &'static str = "-nova";

    fn service_status(&self) -> Option<&ServiceStatus> {
        self.status.as_ref()
    }

    fn plan(&self) -> Result<ServicePlan> {
        let layout = ApiLayout::of(self, Self::SUFFIX, "nova", "api", NOVA_PORT).with_path("/v2.1");
        let image = image_or_default(&self.spec.template.image, images::NOVA_API);
        let grant = layout.grant(&self.spec.database, &NOVA_DATABASES);
        let mut endpoint = layout.endpoint(&self.spec.exposure);
        endpoint.api_endpoint = layout.base_url();

        let worker = |component: &str, image: &str, replicas: i32| {
            let spec = WorkloadSpec::new(
                layout.worker_name(component),
                layout.labels(component),
                format!("nova-{}", component),
                image,
            )
            .replicas(replicas);
            layout.with_transport(spec)
        };
        let workers = vec![
            worker("scheduler", images::NOVA_SCHEDULER, 1),
            worker("conductor", images::NOVA_CONDUCTOR, 1),
            worker("compute", images::NOVA_COMPUTE, self.spec.compute_replicas),
        ];

        Ok(ServicePlan {
            secrets: vec![password_secret(grant.password_secret.clone())],
            provisioning: vec![
                db_create_step(&layout.name, &grant),
                db_sync_step(
                    &layout.name,
                    &image,
                    "nova-manage api_db sync && nova-manage db sync",
                    &grant,
                ),
                cell_setup_step(&layout.name, &image, &self.spec.cell_name),
            ],
            api: layout.with_transport(layout.api_workload(image, &self.spec.template)),
            workers,
            registration: layout.registration("compute", &endpoint, &self.spec.region),
            endpoint,
        })
    }
}
