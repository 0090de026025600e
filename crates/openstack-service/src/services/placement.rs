use openstack_common::crd::{Placement, ServiceStatus};
use openstack_common::images::{self, image_or_default};
use openstack_common::Result;

use super::{password_secret, ApiLayout};
use crate::pipeline::{ManagedService, ServicePlan};
use crate::provisioning::{db_create_step, db_sync_step};

/// Placement API port
pub const PLACEMENT_PORT: u16 = 8778;

impl ManagedService for Placement {
    const SUFFIX: &'static str = "-placement";

    fn service_status(&self) -> Option<&ServiceStatus> {
        self.status.as_ref()
    }

    fn plan(&self) -> Result<ServicePlan> {
        let layout = ApiLayout::of(self, Self::SUFFIX, "placement", "api", PLACEMENT_PORT);
        let image = image_or_default(&self.spec.template.image, images::PLACEMENT_API);
        let grant = layout.grant(&self.spec.database, &["placement"]);
        let endpoint = layout.endpoint(&self.spec.exposure);

        Ok(ServicePlan {
            secrets: vec![password_secret(grant.password_secret.clone())],
            provisioning: vec![
                db_create_step(&layout.name, &grant),
                db_sync_step(&layout.name, &image, "placement-manage db sync", &grant),
            ],
            api: layout.api_workload(image, &self.spec.template),
            workers: Vec::new(),
            registration: layout.registration("placement", &endpoint, &self.spec.region),
            endpoint,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use openstack_common::crd::PlacementSpec;

    #[test]
    fn plan_registers_placement_type() {
        let mut p = Placement::new("cloud-placement", PlacementSpec::default());
        p.metadata.namespace = Some("openstack".to_string());
        let plan = p.plan().unwrap();
        assert_eq!(plan.api.name, "cloud-placement-api");
        assert_eq!(plan.api.ports[0].port, 8778);
        let script = &plan.registration.args[0];
        assert!(script.contains("--name placement"));
        assert!(script.contains("http://cloud-placement-api.openstack.svc:8778"));
        let keystone_url = plan
            .registration
            .env
            .iter()
            .find(|(k, _)| k == "OS_AUTH_URL")
            .map(|(_, v)| v.as_str());
        assert_eq!(
            keystone_url,
            Some("http://cloud-keystone-api.openstack.svc:5000/v3")
        );
    }
}
