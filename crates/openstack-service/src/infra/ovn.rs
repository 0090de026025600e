use kube::ResourceExt;
use openstack_common::conditions::reasons;
use openstack_common::crd::{OVNNetwork, OVNNetworkStatus};
use openstack_common::dependencies::{ovn_endpoints, OVN_NB_PORT, OVN_SB_PORT};
use openstack_common::images::{self, image_or_default};
use openstack_common::Result;

use super::{InfraPlan, InfraWorkload, ManagedInfra};
use crate::workload::{component_labels, tcp_probe, WorkloadSpec};

fn db_workload(
    ovn: &OVNNetwork,
    db: &str,
    port: u16,
    image: &str,
    replicas: i32,
) -> InfraWorkload {
    let name = format!("{}-{}", ovn.name_any(), db);
    let spec = WorkloadSpec::new(
        name.clone(),
        component_labels("ovn", &ovn.name_any(), db),
        format!("ovn-{}", db),
        image,
    )
    .replicas(replicas)
    .port("ovsdb", port)
    .readiness_probe(tcp_probe(port))
    .volume("data", format!("/var/lib/ovn/{}", name), &ovn.spec.db_storage);
    InfraWorkload::stateful(spec, &name)
}

impl ManagedInfra for OVNNetwork {
    type Status = OVNNetworkStatus;

    fn infra_status(&self) -> Option<&OVNNetworkStatus> {
        self.status.as_ref()
    }

    fn plan(&self) -> Result<InfraPlan> {
        self.spec.validate()?;
        let name = self.name_any();
        let (northbound, southbound) = ovn_endpoints(&name, &self.namespace().unwrap_or_default());

        let northd = WorkloadSpec::new(
            format!("{}-northd", name),
            component_labels("ovn", &name, "northd"),
            "ovn-northd",
            image_or_default(&self.spec.northd_image, images::OVN_NORTHD),
        )
        .replicas(self.spec.northd_replicas)
        .env("OVN_NB_DB", northbound)
        .env("OVN_SB_DB", southbound);

        Ok(InfraPlan {
            secrets: Vec::new(),
            workloads: vec![
                db_workload(
                    self,
                    "nb-db",
                    OVN_NB_PORT,
                    &image_or_default(&self.spec.northbound_image, images::OVN_NB_DB),
                    self.spec.northbound_db_replicas,
                ),
                db_workload(
                    self,
                    "sb-db",
                    OVN_SB_PORT,
                    &image_or_default(&self.spec.southbound_image, images::OVN_SB_DB),
                    self.spec.southbound_db_replicas,
                ),
                InfraWorkload::deployment(northd, None),
            ],
            ready_reason: reasons::DEPLOYMENT_READY,
        })
    }

    fn record_endpoints(&self, status: &mut OVNNetworkStatus) {
        let (northbound, southbound) =
            ovn_endpoints(&self.name_any(), &self.namespace().unwrap_or_default());
        status.northbound_db_endpoint = Some(northbound);
        status.southbound_db_endpoint = Some(southbound);
    }
}
