//! Generated credentials
//!
//! Passwords are generated once into a Secret and never read back. Consumers
//! receive `secretKeyRef`s to the keys below.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use rand::RngCore;
use tracing::info;

use crate::apply::create_if_absent;
use crate::kube_utils::{standard_labels, Owner};
use crate::store::KubeClient;
use crate::Result;

/// Length of generated service and admin passwords
pub const PASSWORD_LENGTH: usize = 32;

/// Key holding a password
pub const PASSWORD_KEY: &str = "password";

/// Key holding a username
pub const USERNAME_KEY: &str = "username";

/// Random lowercase hex string of exactly `len` characters
pub fn generate_password(len: usize) -> String {
    let mut bytes = vec![0u8; len.div_ceil(2)];
    rand::thread_rng().fill_bytes(&mut bytes);
    let mut password = hex::encode(bytes);
    password.truncate(len);
    password
}

/// Build a Secret holding the given string entries
pub fn build_secret(owner: &Owner, name: &str, entries: BTreeMap<String, String>) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(owner.namespace.clone()),
            labels: Some(standard_labels("openstack-credentials", &owner.name)),
            ..Default::default()
        },
        type_: Some("Opaque".to_string()),
        string_data: Some(entries),
        ..Default::default()
    }
}

/// Create the Secret `name` with a fresh password per key unless it exists.
///
/// An existing secret is never read or regenerated, so rotated or
/// user-provided values survive. Returns true when this call created it.
pub async fn ensure_secret(
    client: &dyn KubeClient,
    owner: &Owner,
    name: &str,
    keys: &[(&str, usize)],
) -> Result<bool> {
    let entries = keys
        .iter()
        .map(|(key, len)| (key.to_string(), generate_password(*len)))
        .collect();
    let created = create_if_absent(client, Some(owner), build_secret(owner, name, entries)).await?;
    if created {
        info!(secret = %name, owner = %owner.name, "generated credentials");
    }
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{RabbitMQ, RabbitMQSpec};
    use crate::testing::FakeStore;
    use rstest::rstest;

    fn owner(store: &FakeStore) -> Owner {
        let mut mq = RabbitMQ::new("rabbitmq", RabbitMQSpec::default());
        mq.metadata.namespace = Some("openstack".to_string());
        Owner::of(&store.insert(&mq)).unwrap()
    }

    #[rstest]
    #[case::even(32)]
    #[case::odd(17)]
    #[case::empty(0)]
    fn test_generated_length_and_alphabet(#[case] len: usize) {
        let password = generate_password(len);
        assert_eq!(password.len(), len);
        assert!(password
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn test_passwords_differ() {
        assert_ne!(generate_password(32), generate_password(32));
    }

    /// Story: credentials are generated on first reconcile and the same
    /// values are kept on every later one.
    #[tokio::test]
    async fn story_secret_is_generated_once() {
        let store = FakeStore::new();
        let owner = owner(&store);
        let keys = [(USERNAME_KEY, 16), (PASSWORD_KEY, PASSWORD_LENGTH)];

        assert!(ensure_secret(&store, &owner, "rabbitmq-credentials", &keys)
            .await
            .unwrap());
        let first: Secret = store.get_typed("openstack", "rabbitmq-credentials").unwrap();

        assert!(!ensure_secret(&store, &owner, "rabbitmq-credentials", &keys)
            .await
            .unwrap());
        let second: Secret = store.get_typed("openstack", "rabbitmq-credentials").unwrap();

        assert_eq!(first.string_data, second.string_data);
        let data = first.string_data.unwrap();
        assert_eq!(data[USERNAME_KEY].len(), 16);
        assert_eq!(data[PASSWORD_KEY].len(), PASSWORD_LENGTH);
        assert_eq!(store.writes_of("Secret").len(), 1);
    }

    #[tokio::test]
    async fn test_secret_is_owned_and_labelled() {
        let store = FakeStore::new();
        let owner = owner(&store);
        ensure_secret(&store, &owner, "rabbitmq-admin", &[(PASSWORD_KEY, 8)])
            .await
            .unwrap();
        let secret: Secret = store.get_typed("openstack", "rabbitmq-admin").unwrap();
        assert_eq!(secret.type_.as_deref(), Some("Opaque"));
        assert_eq!(
            secret.metadata.owner_references.unwrap()[0].kind,
            "RabbitMQ"
        );
        assert_eq!(
            secret.metadata.labels.unwrap()[crate::LABEL_MANAGED_BY],
            crate::LABEL_MANAGED_BY_OPERATOR
        );
    }
}
