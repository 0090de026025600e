//! Provisioning steps
//!
//! Database creation, schema migration, identity bootstrap, and catalog
//! registration as [`JobStep`]s. The scripts are idempotent on their own:
//! a recreated Job after a failure must not trip over what the previous run
//! already did.

use openstack_common::credentials::PASSWORD_KEY;
use openstack_common::crd::DatabaseEngine;
use openstack_common::dependencies::{DatabaseDependency, KeystoneDependency};
use openstack_common::images;
use openstack_common::job::JobStep;

/// Backoff limit of the catalog registration Job
pub const ENDPOINT_BACKOFF_LIMIT: i32 = 6;

/// The three catalog interfaces every endpoint is registered under
pub const INTERFACES: [&str; 3] = ["internal", "public", "admin"];

/// What a service needs from the shared database server
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatabaseGrant {
    /// Engine of the server
    pub engine: DatabaseEngine,
    /// The server
    pub server: DatabaseDependency,
    /// Databases owned by the service; the first is its main one
    pub databases: Vec<String>,
    /// Login role of the service
    pub user: String,
    /// Secret holding the service's password under `password`
    pub password_secret: String,
}

impl DatabaseGrant {
    /// Port of the server
    pub fn port(&self) -> u16 {
        self.engine.port()
    }

    /// Main database of the service
    pub fn main_database(&self) -> &str {
        self.databases.first().map(String::as_str).unwrap_or(self.user.as_str())
    }
}

fn postgres_script(grant: &DatabaseGrant) -> String {
    let psql = format!(
        "PGPASSWORD=\"$ROOT_PASSWORD\" psql -h {} -U postgres",
        grant.server.host
    );
    let user = &grant.user;
    let mut parts = vec![format!(
        "{psql} -c \"DO \\$\\$BEGIN IF NOT EXISTS (SELECT FROM pg_roles WHERE rolname='{user}') \
         THEN CREATE ROLE {user} LOGIN PASSWORD '$SERVICE_PASSWORD'; END IF; END\\$\\$;\""
    )];
    for db in &grant.databases {
        parts.push(format!(
            "({psql} -tc \"SELECT 1 FROM pg_database WHERE datname='{db}'\" | grep -q 1 \
             || {psql} -c \"CREATE DATABASE {db} OWNER {user}\")"
        ));
        parts.push(format!(
            "{psql} -c \"GRANT ALL PRIVILEGES ON DATABASE {db} TO {user};\""
        ));
    }
    parts.join(" && ")
}

fn mysql_script(grant: &DatabaseGrant) -> String {
    let user = format!("'{}'@'%'", grant.user);
    let mut statements: Vec<String> = grant
        .databases
        .iter()
        .map(|db| format!("CREATE DATABASE IF NOT EXISTS {db};"))
        .collect();
    statements.push(format!(
        "CREATE USER IF NOT EXISTS {user} IDENTIFIED BY '$SERVICE_PASSWORD';"
    ));
    statements.extend(
        grant
            .databases
            .iter()
            .map(|db| format!("GRANT ALL PRIVILEGES ON {db}.* TO {user};")),
    );
    statements.push("FLUSH PRIVILEGES;".to_string());
    format!(
        "mysql -h {} -u root -p\"$ROOT_PASSWORD\" -e \"{}\"",
        grant.server.host,
        statements.join(" ")
    )
}

/// Step creating the service's databases and login role
pub fn db_create_step(owner: &str, grant: &DatabaseGrant) -> JobStep {
    let (image, script) = match grant.engine {
        DatabaseEngine::Postgresql => (images::POSTGRESQL, postgres_script(grant)),
        DatabaseEngine::Mariadb => (images::MARIADB, mysql_script(grant)),
        DatabaseEngine::Mysql => (images::MYSQL, mysql_script(grant)),
    };
    JobStep::new(format!("{owner}-db-create"), image)
        .container("db-create")
        .shell(script)
        .secret_env("ROOT_PASSWORD", &grant.server.root_secret, PASSWORD_KEY)
        .secret_env("SERVICE_PASSWORD", &grant.password_secret, PASSWORD_KEY)
}

/// Step running the service's schema migration `script`
pub fn db_sync_step(owner: &str, image: &str, script: &str, grant: &DatabaseGrant) -> JobStep {
    JobStep::new(format!("{owner}-db-sync"), image)
        .container("db-sync")
        .shell(script)
        .env("DB_HOST", &grant.server.host)
        .env("DB_PORT", grant.port().to_string())
        .env("DB_NAME", grant.main_database())
        .env("DB_USER", &grant.user)
        .secret_env("DB_PASSWORD", &grant.password_secret, PASSWORD_KEY)
}

/// Step mapping cell0 and creating the first compute cell
pub fn cell_setup_step(owner: &str, image: &str, cell_name: &str) -> JobStep {
    let script = format!(
        "set -e; nova-manage cell_v2 map_cell0; \
         if ! nova-manage cell_v2 list_cells | grep -q ' {cell_name} '; then \
         nova-manage cell_v2 create_cell --name {cell_name}; fi"
    );
    JobStep::new(format!("{owner}-cell-setup"), image)
        .container("cell-setup")
        .shell(script)
}

/// Inputs of the identity bootstrap
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bootstrap {
    /// Secret holding the admin password
    pub admin_secret: String,
    /// Internal and admin identity URL
    pub internal_url: String,
    /// Public identity URL
    pub public_url: String,
    /// Region of the endpoints
    pub region: String,
}

/// Step creating the admin user and the identity endpoints
pub fn bootstrap_step(owner: &str, image: &str, bootstrap: &Bootstrap) -> JobStep {
    let script = format!(
        "keystone-manage bootstrap --bootstrap-password \"$ADMIN_PASSWORD\" \
         --bootstrap-admin-url {internal} --bootstrap-internal-url {internal} \
         --bootstrap-public-url {public} --bootstrap-region-id {region}",
        internal = bootstrap.internal_url,
        public = bootstrap.public_url,
        region = bootstrap.region,
    );
    JobStep::new(format!("{owner}-bootstrap"), image)
        .container("bootstrap")
        .shell(script)
        .secret_env("ADMIN_PASSWORD", &bootstrap.admin_secret, PASSWORD_KEY)
}

/// Catalog entry of a service
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EndpointRegistration {
    /// Catalog service name (e.g. "glance")
    pub service_name: String,
    /// Catalog service type (e.g. "image")
    pub service_type: String,
    /// Internal URL, also registered as the admin URL
    pub internal_url: String,
    /// Public URL
    pub public_url: String,
    /// Region of the endpoints
    pub region: String,
    /// Identity service to register with
    pub keystone: KeystoneDependency,
}

impl EndpointRegistration {
    fn url(&self, interface: &str) -> &str {
        match interface {
            "public" => &self.public_url,
            _ => &self.internal_url,
        }
    }

    /// Shell script registering the service and its three endpoints
    pub fn script(&self) -> String {
        let name = &self.service_name;
        let type_ = &self.service_type;
        let region = &self.region;
        let mut commands = vec![format!(
            "(openstack service show {name} >/dev/null 2>&1 \
             || openstack service create --name {name} --description \"{name} service\" {type_})"
        )];
        commands.extend(INTERFACES.iter().map(|interface| {
            format!(
                "(openstack endpoint list --service {type_} --interface {interface} \
                 --region {region} -f value -c ID | grep -q . \
                 || openstack endpoint create --region {region} {type_} {interface} {url})",
                url = self.url(interface),
            )
        }));
        commands.join(" && ")
    }
}

/// Step registering a service in the identity catalog
pub fn endpoint_step(owner: &str, registration: &EndpointRegistration) -> JobStep {
    JobStep::new(format!("{owner}-endpoint-create"), images::KEYSTONE)
        .container("endpoint-create")
        .shell(registration.script())
        .backoff_limit(ENDPOINT_BACKOFF_LIMIT)
        .env("OS_AUTH_URL", &registration.keystone.auth_url)
        .env("OS_USERNAME", "admin")
        .env("OS_PROJECT_NAME", "admin")
        .env("OS_USER_DOMAIN_NAME", "Default")
        .env("OS_PROJECT_DOMAIN_NAME", "Default")
        .env("OS_IDENTITY_API_VERSION", "3")
        .secret_env("OS_PASSWORD", &registration.keystone.admin_secret, PASSWORD_KEY)
}
