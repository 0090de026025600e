//! The five OpenStack API services
//!
//! Each kind only builds its [`ServicePlan`](crate::pipeline::ServicePlan);
//! [`ApiLayout`] holds the conventions they share.

mod glance;
mod keystone;
mod neutron;
mod nova;
mod placement;

use kube::ResourceExt;

use openstack_common::credentials::{PASSWORD_KEY, PASSWORD_LENGTH, USERNAME_KEY};
use openstack_common::crd::{DatabaseConfig, ExposureSpec, ServiceTemplate};
use openstack_common::dependencies::{database_dependency, keystone_dependency, rabbitmq_dependency};
use openstack_common::job::JobStep;
use openstack_common::svc_dns;

use crate::pipeline::{ApiSpec, SecretRequest};
use crate::provisioning::{endpoint_step, DatabaseGrant, EndpointRegistration};
use crate::workload::{component_labels, tcp_probe, WorkloadSpec};

/// Naming and exposure conventions of one API service object
#[derive(Clone, Debug)]
pub(crate) struct ApiLayout {
    /// Object name
    pub name: String,
    pub namespace: String,
    /// Suffix the control plane gives this kind
    pub suffix: &'static str,
    /// `app.kubernetes.io/name` of everything the service owns
    pub app: &'static str,
    /// Component of the API Deployment
    pub component: &'static str,
    pub port: u16,
    /// Version path appended to the API URLs
    pub path: &'static str,
}

impl ApiLayout {
    pub fn of<K: ResourceExt>(
        obj: &K,
        suffix: &'static str,
        app: &'static str,
        component: &'static str,
        port: u16,
    ) -> Self {
        Self {
            name: obj.name_any(),
            namespace: obj.namespace().unwrap_or_default(),
            suffix,
            app,
            component,
            port,
            path: "",
        }
    }

    pub fn with_path(mut self, path: &'static str) -> Self {
        self.path = path;
        self
    }

    /// Name of the API Deployment and its Service
    pub fn api_name(&self) -> String {
        format!("{}-{}", self.name, self.component)
    }

    /// Name of a secondary workload of this service
    pub fn worker_name(&self, component: &str) -> String {
        format!("{}-{}", self.name, component)
    }

    pub fn labels(&self, component: &str) -> std::collections::BTreeMap<String, String> {
        component_labels(self.app, &self.name, component)
    }

    /// Root URL of the API inside the cluster
    pub fn base_url(&self) -> String {
        format!(
            "http://{}:{}",
            svc_dns(&self.api_name(), &self.namespace),
            self.port
        )
    }

    pub fn endpoint(&self, exposure: &ExposureSpec) -> ApiSpec {
        let internal_url = format!("{}{}", self.base_url(), self.path);
        let hostname = exposure
            .public_hostname
            .clone()
            .filter(|h| !h.is_empty());
        let public_url = match &hostname {
            Some(host) => format!("https://{}{}", host, self.path),
            None => internal_url.clone(),
        };
        ApiSpec {
            service_name: self.api_name(),
            port: self.port,
            api_endpoint: internal_url.clone(),
            internal_url,
            public_url,
            hostname,
            gateway: exposure.gateway_ref.clone(),
        }
    }

    /// The API Deployment with its port and a TCP readiness probe
    pub fn api_workload(&self, image: String, template: &ServiceTemplate) -> WorkloadSpec {
        WorkloadSpec::new(
            self.api_name(),
            self.labels(self.component),
            format!("{}-{}", self.app, self.component),
            image,
        )
        .template(template)
        .port("api", self.port)
        .readiness_probe(tcp_probe(self.port))
    }

    /// Databases and login role of the service on the shared server
    pub fn grant(&self, config: &DatabaseConfig, databases: &[&str]) -> DatabaseGrant {
        DatabaseGrant {
            engine: config.engine,
            server: database_dependency(&self.name, self.suffix, &self.namespace),
            databases: databases.iter().map(|d| d.to_string()).collect(),
            user: self.app.to_string(),
            password_secret: config.secret_name_for(&self.name),
        }
    }

    /// Catalog registration against the identity service
    pub fn registration(&self, service_type: &str, endpoint: &ApiSpec, region: &str) -> JobStep {
        endpoint_step(
            &self.name,
            &EndpointRegistration {
                service_name: self.app.to_string(),
                service_type: service_type.to_string(),
                internal_url: endpoint.internal_url.clone(),
                public_url: endpoint.public_url.clone(),
                region: region.to_string(),
                keystone: keystone_dependency(&self.name, self.suffix, &self.namespace),
            },
        )
    }

    /// Point a workload at the message broker
    pub fn with_transport(&self, workload: WorkloadSpec) -> WorkloadSpec {
        let mq = rabbitmq_dependency(&self.name, self.suffix, &self.namespace);
        workload
            .env("RABBITMQ_ADDRESS", mq.address)
            .secret_env("RABBITMQ_USERNAME", &mq.credentials_secret, USERNAME_KEY)
            .secret_env("RABBITMQ_PASSWORD", &mq.credentials_secret, PASSWORD_KEY)
    }
}

/// A generated password secret
pub(crate) fn password_secret(name: String) -> SecretRequest {
    SecretRequest {
        name,
        keys: vec![(PASSWORD_KEY, PASSWORD_LENGTH)],
    }
}
