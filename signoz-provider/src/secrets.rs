//! Resolution of fields that are either literal or backed by a secret.

use std::sync::Arc;

use crate::apis::{object_key, Secret, SecretKeySelector};
use crate::error::{Error, Result};
use crate::store::ResourceStore;

/// Reads secret-backed values. Never writes anything.
#[derive(Clone)]
pub struct SecretResolver {
    secrets: Arc<dyn ResourceStore<Secret>>,
}

impl SecretResolver {
    pub fn new(secrets: Arc<dyn ResourceStore<Secret>>) -> Self {
        Self { secrets }
    }

    /// Resolve a field. The secret reference wins over the literal; with
    /// neither the value is empty.
    pub async fn resolve(
        &self,
        value: Option<&str>,
        secret_ref: Option<&SecretKeySelector>,
    ) -> Result<String> {
        match secret_ref {
            Some(selector) => self.read(selector).await,
            None => Ok(value.unwrap_or_default().to_string()),
        }
    }

    /// Resolve to `None` when the result is empty, for optional payload fields.
    pub async fn resolve_optional(
        &self,
        value: Option<&str>,
        secret_ref: Option<&SecretKeySelector>,
    ) -> Result<Option<String>> {
        let resolved = self.resolve(value, secret_ref).await?;
        Ok(Some(resolved).filter(|v| !v.is_empty()))
    }

    /// Raw bytes of one secret key.
    pub async fn read_bytes(&self, selector: &SecretKeySelector) -> Result<Vec<u8>> {
        let key = object_key(Some(&selector.namespace), &selector.name);
        let secret = self
            .secrets
            .get(&key)
            .await?
            .ok_or_else(|| Error::SecretNotFound {
                namespace: selector.namespace.clone(),
                name: selector.name.clone(),
            })?;

        secret
            .data
            .get(&selector.key)
            .cloned()
            .ok_or_else(|| Error::SecretKeyNotFound {
                namespace: selector.namespace.clone(),
                name: selector.name.clone(),
                key: selector.key.clone(),
            })
    }

    async fn read(&self, selector: &SecretKeySelector) -> Result<String> {
        let bytes = self.read_bytes(selector).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}
