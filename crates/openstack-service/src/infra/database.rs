use kube::ResourceExt;
use openstack_common::conditions::reasons;
use openstack_common::credentials::{PASSWORD_KEY, PASSWORD_LENGTH};
use openstack_common::crd::{Database, DatabaseEngine, InfraStatus};
use openstack_common::images::{self, image_or_default};
use openstack_common::{svc_dns, Result};

use super::{InfraPlan, InfraWorkload, ManagedInfra};
use crate::pipeline::SecretRequest;
use crate::workload::{component_labels, exec_probe, WorkloadSpec};

struct EngineProfile {
    image: &'static str,
    password_env: &'static str,
    data_path: &'static str,
    probe: &'static [&'static str],
}

fn profile(engine: DatabaseEngine) -> EngineProfile {
    match engine {
        DatabaseEngine::Postgresql => EngineProfile {
            image: images::POSTGRESQL,
            password_env: "POSTGRES_PASSWORD",
            data_path: "/var/lib/postgresql/data",
            probe: &["pg_isready", "-U", "postgres"],
        },
        DatabaseEngine::Mariadb => EngineProfile {
            image: images::MARIADB,
            password_env: "MYSQL_ROOT_PASSWORD",
            data_path: "/var/lib/mysql",
            probe: &["mysqladmin", "ping", "-h", "127.0.0.1"],
        },
        DatabaseEngine::Mysql => EngineProfile {
            image: images::MYSQL,
            password_env: "MYSQL_ROOT_PASSWORD",
            data_path: "/var/lib/mysql",
            probe: &["mysqladmin", "ping", "-h", "127.0.0.1"],
        },
    }
}

impl ManagedInfra for Database {
    type Status = InfraStatus;

    fn infra_status(&self) -> Option<&InfraStatus> {
        self.status.as_ref()
    }

    fn plan(&self) -> Result<InfraPlan> {
        let name = self.name_any();
        let engine = self.spec.engine;
        let profile = profile(engine);
        let root_secret = self.root_secret_name();

        let server = WorkloadSpec::new(
            name.clone(),
            component_labels("database", &name, &engine.to_string()),
            engine.to_string(),
            image_or_default(&self.spec.template.image, profile.image),
        )
        .template(&self.spec.template)
        .port(engine.to_string(), engine.port())
        .secret_env(profile.password_env, &root_secret, PASSWORD_KEY)
        .readiness_probe(exec_probe(profile.probe.iter().copied()))
        .volume("data", profile.data_path, &self.spec.storage);

        Ok(InfraPlan {
            secrets: vec![SecretRequest {
                name: root_secret,
                keys: vec![(PASSWORD_KEY, PASSWORD_LENGTH)],
            }],
            workloads: vec![InfraWorkload::stateful(server, &name)],
            ready_reason: reasons::STATEFULSET_READY,
        })
    }

    fn record_endpoints(&self, status: &mut InfraStatus) {
        let host = svc_dns(&self.name_any(), &self.namespace().unwrap_or_default());
        status.endpoint = Some(format!("{}:{}", host, self.spec.engine.port()));
    }
}
