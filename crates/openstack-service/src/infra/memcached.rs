use kube::ResourceExt;
use openstack_common::conditions::reasons;
use openstack_common::crd::{InfraStatus, Memcached};
use openstack_common::images::{self, image_or_default};
use openstack_common::{svc_dns, Result};

use super::{InfraPlan, InfraWorkload, ManagedInfra};
use crate::workload::{component_labels, tcp_probe, WorkloadSpec};

/// Memcached port
pub const MEMCACHED_PORT: u16 = 11211;

impl ManagedInfra for Memcached {
    type Status = InfraStatus;

    fn infra_status(&self) -> Option<&InfraStatus> {
        self.status.as_ref()
    }

    fn plan(&self) -> Result<InfraPlan> {
        let name = self.name_any();
        let cache = WorkloadSpec::new(
            name.clone(),
            component_labels("memcached", &name, "cache"),
            "memcached",
            image_or_default(&self.spec.template.image, images::MEMCACHED),
        )
        .template(&self.spec.template)
        .port("memcached", MEMCACHED_PORT)
        .readiness_probe(tcp_probe(MEMCACHED_PORT));

        Ok(InfraPlan {
            secrets: Vec::new(),
            workloads: vec![InfraWorkload::deployment(cache, Some(&name))],
            ready_reason: reasons::DEPLOYMENT_READY,
        })
    }

    fn record_endpoints(&self, status: &mut InfraStatus) {
        let host = svc_dns(&self.name_any(), &self.namespace().unwrap_or_default());
        status.endpoint = Some(format!("{}:{}", host, MEMCACHED_PORT));
    }
}
