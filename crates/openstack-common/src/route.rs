//! Gateway API HTTPRoute for externally reachable services
//!
//! Gateway API has no Rust binding in our stack, so the route is a plain
//! serde record implementing `HasApiResource` and written through the
//! dynamic applier. Fields the Gateway API CRD defaults (parent and backend
//! group/kind, backend weight, the catch-all path match) are written out
//! explicitly so a stored route compares equal to a freshly built one.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::{Deserialize, Serialize};

use crate::apply::{create_or_update_dynamic, ApplyOutcome};
use crate::crd::GatewayRef;
use crate::kube_utils::{HasApiResource, Owner};
use crate::store::{to_dynamic, KubeClient};
use crate::{Result, LABEL_MANAGED_BY, LABEL_MANAGED_BY_OPERATOR};

/// Gateway a route attaches to when none is named
pub const DEFAULT_GATEWAY_NAME: &str = "openstack-gateway";

const GATEWAY_GROUP: &str = "gateway.networking.k8s.io";

macro_rules! impl_api_defaults {
    ($type:ty) => {
        impl $type {
            fn default_api_version() -> String {
                <Self as HasApiResource>::API_VERSION.to_string()
            }
            fn default_kind() -> String {
                <Self as HasApiResource>::KIND.to_string()
            }
        }
    };
}

/// Kubernetes Gateway API HTTPRoute resource
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HttpRoute {
    /// API version (gateway.networking.k8s.io/v1)
    #[serde(default = "HttpRoute::default_api_version")]
    pub api_version: String,
    /// Resource kind (HTTPRoute)
    #[serde(default = "HttpRoute::default_kind")]
    pub kind: String,
    /// Resource metadata
    pub metadata: ObjectMeta,
    /// HTTPRoute specification
    pub spec: HttpRouteSpec,
}

impl HasApiResource for HttpRoute {
    const API_VERSION: &'static str = "gateway.networking.k8s.io/v1";
    const KIND: &'static str = "HTTPRoute";
}

impl_api_defaults!(HttpRoute);

impl HttpRoute {
    /// Create a new HTTPRoute
    pub fn new(metadata: ObjectMeta, spec: HttpRouteSpec) -> Self {
        Self {
            api_version: Self::default_api_version(),
            kind: Self::default_kind(),
            metadata,
            spec,
        }
    }
}

/// HTTPRoute spec
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HttpRouteSpec {
    /// Parent gateway references
    pub parent_refs: Vec<ParentRef>,
    /// Hostnames to match
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hostnames: Vec<String>,
    /// Routing rules
    pub rules: Vec<HttpRouteRule>,
}

/// Reference to a parent Gateway
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ParentRef {
    /// API group of the parent
    #[serde(default)]
    pub group: String,
    /// Kind of the parent
    #[serde(default)]
    pub kind: String,
    /// Gateway name
    pub name: String,
    /// Gateway namespace; omitted when it is the route's own
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Listener on the gateway
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_name: Option<String>,
}

/// HTTPRoute rule
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HttpRouteRule {
    /// Request matches
    #[serde(default)]
    pub matches: Vec<HttpRouteMatch>,
    /// Backends receiving the traffic
    pub backend_refs: Vec<BackendRef>,
}

/// Request match of a rule
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct HttpRouteMatch {
    /// Path match
    pub path: PathMatch,
}

/// Path match of a rule
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PathMatch {
    /// Match type
    #[serde(rename = "type")]
    pub type_: String,
    /// Path value
    pub value: String,
}

impl PathMatch {
    /// Everything under `/`
    pub fn any() -> Self {
        Self {
            type_: "PathPrefix".to_string(),
            value: "/".to_string(),
        }
    }
}

/// Backend service reference
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BackendRef {
    /// API group of the backend; empty for core
    #[serde(default)]
    pub group: String,
    /// Kind of the backend
    #[serde(default)]
    pub kind: String,
    /// Service name
    pub name: String,
    /// Service port
    pub port: u16,
    /// Share of the traffic
    #[serde(default)]
    pub weight: i32,
}

/// Inputs of [`build_http_route`]
#[derive(Clone, Debug, PartialEq)]
pub struct RouteParams<'a> {
    /// Route name
    pub name: &'a str,
    /// Route namespace
    pub namespace: &'a str,
    /// Public hostname; no hostname match when unset
    pub hostname: Option<&'a str>,
    /// Backend Service name
    pub service_name: &'a str,
    /// Backend Service port
    pub service_port: u16,
    /// Gateway to attach to
    pub gateway: Option<&'a GatewayRef>,
}

/// Build the HTTPRoute sending `hostname` traffic to the backend service
pub fn build_http_route(params: &RouteParams<'_>) -> HttpRoute {
    let gateway_name = params
        .gateway
        .map(|g| g.name.as_str())
        .filter(|n| !n.is_empty())
        .unwrap_or(DEFAULT_GATEWAY_NAME);
    let gateway_namespace = params
        .gateway
        .and_then(|g| g.namespace.as_deref())
        .filter(|ns| !ns.is_empty() && *ns != params.namespace);
    let section_name = params
        .gateway
        .and_then(|g| g.listener_name.as_deref())
        .filter(|l| !l.is_empty());

    let metadata = ObjectMeta {
        name: Some(params.name.to_string()),
        namespace: Some(params.namespace.to_string()),
        labels: Some(
            [(
                LABEL_MANAGED_BY.to_string(),
                LABEL_MANAGED_BY_OPERATOR.to_string(),
            )]
            .into(),
        ),
        ..Default::default()
    };

    HttpRoute::new(
        metadata,
        HttpRouteSpec {
            parent_refs: vec![ParentRef {
                group: GATEWAY_GROUP.to_string(),
                kind: "Gateway".to_string(),
                name: gateway_name.to_string(),
                namespace: gateway_namespace.map(str::to_string),
                section_name: section_name.map(str::to_string),
            }],
            hostnames: params
                .hostname
                .filter(|h| !h.is_empty())
                .map(|h| vec![h.to_string()])
                .unwrap_or_default(),
            rules: vec![HttpRouteRule {
                matches: vec![HttpRouteMatch {
                    path: PathMatch::any(),
                }],
                backend_refs: vec![BackendRef {
                    group: String::new(),
                    kind: "Service".to_string(),
                    name: params.service_name.to_string(),
                    port: params.service_port,
                    weight: 1,
                }],
            }],
        },
    )
}

/// Create or update the route, owned by `owner`
pub async fn ensure_http_route(
    client: &dyn KubeClient,
    owner: &Owner,
    params: &RouteParams<'_>,
) -> Result<ApplyOutcome> {
    let route = build_http_route(params);
    create_or_update_dynamic(client, owner, &HttpRoute::api_resource(), to_dynamic(&route)?).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{Glance, GlanceSpec};
    use crate::testing::{FakeStore, Write, WriteOp};
    use kube::ResourceExt;

    fn params<'a>(gateway: Option<&'a GatewayRef>) -> RouteParams<'a> {
        RouteParams {
            name: "glance-api",
            namespace: "openstack",
            hostname: Some("glance.openstack.local"),
            service_name: "glance-api",
            service_port: 9292,
            gateway,
        }
    }

    #[test]
    fn test_default_gateway_in_own_namespace() {
        let route = build_http_route(&params(None));
        assert_eq!(route.api_version, "gateway.networking.k8s.io/v1");
        assert_eq!(route.kind, "HTTPRoute");
        let parent = &route.spec.parent_refs[0];
        assert_eq!(parent.name, "openstack-gateway");
        assert_eq!(parent.namespace, None);
        assert_eq!(parent.section_name, None);
        assert_eq!(route.spec.hostnames, vec!["glance.openstack.local"]);
        assert_eq!(route.spec.rules[0].backend_refs[0].port, 9292);
        assert_eq!(
            route.metadata.labels.unwrap()[LABEL_MANAGED_BY],
            "openstack-operator"
        );
    }

    #[test]
    fn test_gateway_namespace_only_when_different() {
        let same = GatewayRef {
            name: "public".to_string(),
            namespace: Some("openstack".to_string()),
            listener_name: Some("https".to_string()),
        };
        let route = build_http_route(&params(Some(&same)));
        let parent = &route.spec.parent_refs[0];
        assert_eq!(parent.name, "public");
        assert_eq!(parent.namespace, None);
        assert_eq!(parent.section_name.as_deref(), Some("https"));

        let other = GatewayRef {
            namespace: Some("gateways".to_string()),
            ..same
        };
        let route = build_http_route(&params(Some(&other)));
        assert_eq!(
            route.spec.parent_refs[0].namespace.as_deref(),
            Some("gateways")
        );
    }

    #[test]
    fn test_serialized_shape() {
        let route = build_http_route(&RouteParams {
            hostname: None,
            ..params(None)
        });
        let value = serde_json::to_value(&route).unwrap();
        assert!(value["spec"].get("hostnames").is_none());
        assert_eq!(value["spec"]["parentRefs"][0]["name"], "openstack-gateway");
        assert_eq!(
            value["spec"]["rules"][0]["backendRefs"][0]["name"],
            "glance-api"
        );
    }

    #[test]
    fn test_gateway_defaults_are_explicit() {
        let value = serde_json::to_value(build_http_route(&params(None))).unwrap();
        let parent = &value["spec"]["parentRefs"][0];
        assert_eq!(parent["group"], "gateway.networking.k8s.io");
        assert_eq!(parent["kind"], "Gateway");
        let rule = &value["spec"]["rules"][0];
        assert_eq!(rule["matches"][0]["path"]["type"], "PathPrefix");
        assert_eq!(rule["matches"][0]["path"]["value"], "/");
        let backend = &rule["backendRefs"][0];
        assert_eq!(backend["group"], "");
        assert_eq!(backend["kind"], "Service");
        assert_eq!(backend["weight"], 1);
    }

    /// Story: a label added to the stored route by someone else survives
    /// the next apply, which writes nothing.
    #[tokio::test]
    async fn story_foreign_labels_do_not_cause_rewrites() {
        let store = FakeStore::new();
        let mut glance = Glance::new("glance", GlanceSpec::default());
        glance.metadata.namespace = Some("openstack".to_string());
        let owner = Owner::of(&store.insert(&glance)).unwrap();
        let ar = HttpRoute::api_resource();

        ensure_http_route(&store, &owner, &params(None)).await.unwrap();
        let mut stored = store.get(&ar, "openstack", "glance-api").await.unwrap().unwrap();
        stored
            .labels_mut()
            .insert("team".to_string(), "platform".to_string());
        store.replace(&ar, "openstack", &stored).await.unwrap();
        store.clear_writes();

        let outcome = ensure_http_route(&store, &owner, &params(None)).await.unwrap();

        assert_eq!(outcome, ApplyOutcome::Unchanged);
        assert!(store.writes().is_empty());
        let stored = store.get(&ar, "openstack", "glance-api").await.unwrap().unwrap();
        assert_eq!(stored.labels()["team"], "platform");
        assert_eq!(stored.labels()[LABEL_MANAGED_BY], "openstack-operator");
    }

    #[tokio::test]
    async fn test_ensure_is_idempotent() {
        let store = FakeStore::new();
        let mut glance = Glance::new("glance", GlanceSpec::default());
        glance.metadata.namespace = Some("openstack".to_string());
        let owner = Owner::of(&store.insert(&glance)).unwrap();

        ensure_http_route(&store, &owner, &params(None)).await.unwrap();
        let outcome = ensure_http_route(&store, &owner, &params(None)).await.unwrap();
        assert_eq!(outcome, ApplyOutcome::Unchanged);
        assert_eq!(
            store.writes_of("HTTPRoute"),
            vec![Write::new(WriteOp::Create, "HTTPRoute", "glance-api")]
        );
    }
}
