use kube::ResourceExt;
use openstack_common::conditions::reasons;
use openstack_common::credentials::{PASSWORD_KEY, PASSWORD_LENGTH, USERNAME_KEY};
use openstack_common::crd::{InfraStatus, RabbitMQ};
use openstack_common::dependencies::RABBITMQ_PORT;
use openstack_common::images::{self, image_or_default};
use openstack_common::{svc_dns, Result};

use super::{InfraPlan, InfraWorkload, ManagedInfra};
use crate::pipeline::SecretRequest;
use crate::workload::{component_labels, exec_probe, WorkloadSpec};

/// Management UI and API port
pub const MANAGEMENT_PORT: u16 = 15672;

/// Length of the generated broker username
pub const USERNAME_LENGTH: usize = 16;

impl ManagedInfra for RabbitMQ {
    type Status = InfraStatus;

    fn infra_status(&self) -> Option<&InfraStatus> {
        self.status.as_ref()
    }

    fn plan(&self) -> Result<InfraPlan> {
        let name = self.name_any();
        let credentials = format!("{}-credentials", name);

        let broker = WorkloadSpec::new(
            name.clone(),
            component_labels("rabbitmq", &name, "broker"),
            "rabbitmq",
            image_or_default(&self.spec.template.image, images::RABBITMQ),
        )
        .template(&self.spec.template)
        .port("amqp", RABBITMQ_PORT)
        .port("management", MANAGEMENT_PORT)
        .secret_env("RABBITMQ_DEFAULT_USER", &credentials, USERNAME_KEY)
        .secret_env("RABBITMQ_DEFAULT_PASS", &credentials, PASSWORD_KEY)
        .readiness_probe(exec_probe(["rabbitmq-diagnostics", "check_port_connectivity"]))
        .volume("data", "/var/lib/rabbitmq", &self.spec.storage);

        Ok(InfraPlan {
            secrets: vec![SecretRequest {
                name: credentials,
                keys: vec![(USERNAME_KEY, USERNAME_LENGTH), (PASSWORD_KEY, PASSWORD_LENGTH)],
            }],
            workloads: vec![InfraWorkload::stateful(broker, &name)],
            ready_reason: reasons::STATEFULSET_READY,
        })
    }

    fn record_endpoints(&self, status: &mut InfraStatus) {
        let host = svc_dns(&self.name_any(), &self.namespace().unwrap_or_default());
        status.endpoint = Some(format!("{}:{}", host, RABBITMQ_PORT));
    }
}
