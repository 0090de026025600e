use openstack_common::crd::{Keystone, ServiceStatus};
use openstack_common::dependencies::KEYSTONE_PORT;
use openstack_common::images::{self, image_or_default};
use openstack_common::Result;

use super::{password_secret, ApiLayout};
use crate::pipeline::{ManagedService, ServicePlan};
use crate::provisioning::{bootstrap_step, db_create_step, db_sync_step, Bootstrap};

impl ManagedService for Keystone {
    const SUFFIX: &'static str = "-keystone";

    fn service_status(&self) -> Option<&ServiceStatus> {
        self.status.as_ref()
    }

    fn plan(&self) -> Result<ServicePlan> {
        let layout =
            ApiLayout::of(self, Self::SUFFIX, "keystone", "api", KEYSTONE_PORT).with_path("/v3");
        let image = image_or_default(&self.spec.template.image, images::KEYSTONE);
        let grant = layout.grant(&self.spec.database, &["keystone"]);
        let endpoint = layout.endpoint(&self.spec.exposure);
        let admin_secret = self.admin_secret_name();

        let registration = bootstrap_step(
            &layout.name,
            &image,
            &Bootstrap {
                admin_secret: admin_secret.clone(),
                internal_url: endpoint.internal_url.clone(),
                public_url: endpoint.public_url.clone(),
                region: self.spec.region.clone(),
            },
        );

        Ok(ServicePlan {
            secrets: vec![
                password_secret(grant.password_secret.clone()),
                password_secret(admin_secret),
            ],
            provisioning: vec![
                db_create_step(&layout.name, &grant),
                db_sync_step(&layout.name, &image, "keystone-manage db_sync", &grant),
            ],
            api: layout.api_workload(image, &self.spec.template),
            workers: Vec::new(),
            registration,
            endpoint,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use openstack_common::crd::{ExposureSpec, KeystoneSpec};
    use openstack_common::dependencies::keystone_dependency;

    fn keystone(name: &str, spec: KeystoneSpec) -> Keystone {
        let mut ks = Keystone::new(name, spec);
        ks.metadata.namespace = Some("openstack".to_string());
        ks
    }

    #[test]
    fn admin_secret_matches_what_dependents_expect() {
        let ks = keystone("cloud-keystone", KeystoneSpec::default());
        let dep = keystone_dependency("cloud-glance", "-glance", "openstack");
        assert_eq!(ks.admin_secret_name(), dep.admin_secret);
        let plan = ks.plan().unwrap();
        assert_eq!(plan.endpoint.internal_url, dep.auth_url);
    }

    #[test]
    fn admin_secret_override_is_generated_and_used() {
        let ks = keystone(
            "keystone",
            KeystoneSpec {
                admin_password_secret_name: Some("ops-admin".to_string()),
                ..Default::default()
            },
        );
        let plan = ks.plan().unwrap();
        let secrets: Vec<_> = plan.secrets.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(secrets, vec!["keystone-db-password", "ops-admin"]);
        assert_eq!(plan.registration.secret_env[0].1.name, "ops-admin");
    }

    #[test]
    fn bootstrap_registers_public_hostname() {
        let ks = keystone(
            "keystone",
            KeystoneSpec {
                exposure: ExposureSpec {
                    public_hostname: Some("keystone.cloud.example.com".to_string()),
                    gateway_ref: None,
                },
                ..Default::default()
            },
        );
        let plan = ks.plan().unwrap();
        assert_eq!(plan.registration.name, "keystone-bootstrap");
        let script = &plan.registration.args[0];
        assert!(script.contains("--bootstrap-public-url https://keystone.cloud.example.com/v3"));
        assert!(script.contains("--bootstrap-region-id RegionOne"));
        assert_eq!(
            plan.endpoint.api_endpoint,
            "http://keystone-api.openstack.svc:5000/v3"
        );
    }
}
