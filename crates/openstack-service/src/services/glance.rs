use openstack_common::crd::{Glance, ServiceStatus};
use openstack_common::images::{self, image_or_default};
use openstack_common::Result;

use super::{password_secret, ApiLayout};
use crate::pipeline::{ManagedService, ServicePlan};
use crate::provisioning::{db_create_step, db_sync_step};

/// Glance API port
pub const GLANCE_PORT: u16 = 9292;

impl ManagedService for Glance {
    const SUFFIX: &'static str = "-glance";

    fn service_status(&self) -> Option<&ServiceStatus> {
        self.status.as_ref()
    }

    fn plan(&self) -> Result<ServicePlan> {
        let layout = ApiLayout::of(self, Self::SUFFIX, "glance", "api", GLANCE_PORT);
        let image = image_or_default(&self.spec.template.image, images::GLANCE_API);
        let grant = layout.grant(&self.spec.database, &["glance"]);
        let endpoint = layout.endpoint(&self.spec.exposure);

        Ok(ServicePlan {
            secrets: vec![password_secret(grant.password_secret.clone())],
            provisioning: vec![
                db_create_step(&layout.name, &grant),
                db_sync_step(&layout.name, &image, "glance-manage db_sync", &grant),
            ],
            api: layout.api_workload(image, &self.spec.template),
            workers: Vec::new(),
            registration: layout.registration("image", &endpoint, &self.spec.region),
            endpoint,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use openstack_common::crd::{DatabaseConfig, DatabaseEngine, GlanceSpec};

    fn glance(name: &str, spec: GlanceSpec) -> Glance {
        let mut g = Glance::new(name, spec);
        g.metadata.namespace = Some("openstack".to_string());
        g
    }

    #[test]
    fn plan_for_standalone_glance() {
        let plan = glance("glance", GlanceSpec::default()).plan().unwrap();
        assert_eq!(plan.secrets[0].name, "glance-db-password");
        let jobs: Vec<_> = plan.provisioning.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(jobs, vec!["glance-db-create", "glance-db-sync"]);
        assert_eq!(plan.api.name, "glance-api");
        assert_eq!(plan.api.image, images::GLANCE_API);
        assert_eq!(plan.registration.name, "glance-endpoint-create");
        assert!(plan.registration.args[0].contains("image"));
        assert_eq!(plan.endpoint.api_endpoint, "http://glance-api.openstack.svc:9292");
    }

    #[test]
    fn custom_image_and_secret_are_used() {
        let mut spec = GlanceSpec::default();
        spec.template.image = "registry.local/glance:dev".to_string();
        spec.database = DatabaseConfig {
            secret_name: Some("my-glance-db".to_string()),
            engine: DatabaseEngine::Mariadb,
        };
        let plan = glance("cloud-glance", spec).plan().unwrap();
        assert_eq!(plan.secrets[0].name, "my-glance-db");
        assert_eq!(plan.api.image, "registry.local/glance:dev");
        assert_eq!(plan.provisioning[1].image, "registry.local/glance:dev");
        assert_eq!(plan.provisioning[0].image, images::MARIADB);
    }
}
