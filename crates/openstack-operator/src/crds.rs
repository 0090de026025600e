//! CRD installation and printing
//!
//! The operator installs its own CRDs on startup using server-side apply, so
//! the installed schemas always match the running binary.

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::{Api, Patch, PatchParams};
use kube::{Client, CustomResourceExt};

use openstack_common::crd::{
    Database, Glance, Keystone, Memcached, Neutron, Nova, OVNNetwork, OpenStackControlPlane,
    Placement, RabbitMQ,
};
use openstack_common::FIELD_MANAGER;

/// Every CRD the operator reconciles, control plane first
pub fn all_crds() -> Vec<CustomResourceDefinition> {
    vec![
        OpenStackControlPlane::crd(),
        Database::crd(),
        RabbitMQ::crd(),
        Memcached::crd(),
        OVNNetwork::crd(),
        Keystone::crd(),
        Glance::crd(),
        Placement::crd(),
        Neutron::crd(),
        Nova::crd(),
    ]
}

/// All CRDs as one multi-document YAML stream
pub fn crds_yaml() -> anyhow::Result<String> {
    let docs = all_crds()
        .iter()
        .map(serde_yaml::to_string)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| anyhow::anyhow!("failed to serialize CRD: {}", e))?;
    Ok(docs.join("---\n"))
}

/// Install or update every CRD
pub async fn ensure_crds_installed(client: &Client) -> anyhow::Result<()> {
    let crds: Api<CustomResourceDefinition> = Api::all(client.clone());
    let params = PatchParams::apply(FIELD_MANAGER).force();

    for crd in all_crds() {
        let name = crd.metadata.name.clone().unwrap_or_default();
        tracing::info!(crd = %name, "installing CRD");
        crds.patch(&name, &params, &Patch::Apply(&crd))
            .await
            .map_err(|e| anyhow::anyhow!("failed to install {} CRD: {}", name, e))?;
    }

    tracing::info!("all CRDs installed/updated");
    Ok(())
}
