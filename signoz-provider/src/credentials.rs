//! Turns a record's provider config reference into client connection settings.

use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use crate::apis::{CredentialsSource, HasProviderConfigReference, ProviderConfig, ProviderCredentials};
use crate::clients::{Config, DEFAULT_ENDPOINT};
use crate::error::{Error, Result};
use crate::secrets::SecretResolver;
use crate::store::ResourceStore;

/// Credentials document stored in the configured source.
#[derive(Deserialize)]
pub struct Credentials {
    #[serde(rename = "apiKey")]
    pub api_key: String,
}

/// Resolves connection settings on every connect. Nothing is cached, so
/// rotated credentials take effect on the next reconcile.
#[derive(Clone)]
pub struct CredentialResolver {
    provider_configs: Arc<dyn ResourceStore<ProviderConfig>>,
    secrets: SecretResolver,
}

impl CredentialResolver {
    pub fn new(
        provider_configs: Arc<dyn ResourceStore<ProviderConfig>>,
        secrets: SecretResolver,
    ) -> Self {
        Self {
            provider_configs,
            secrets,
        }
    }

    pub async fn resolve<R>(&self, record: &R) -> Result<Config>
    where
        R: HasProviderConfigReference + ?Sized,
    {
        let reference = record
            .provider_config_reference()
            .ok_or(Error::NoProviderConfig)?;

        let pc = self
            .provider_configs
            .get(&reference.name)
            .await?
            .ok_or_else(|| Error::ProviderConfigNotFound(reference.name.clone()))?;

        let data = self.extract(&pc.spec.credentials).await?;
        let creds: Credentials = serde_json::from_slice(&data).map_err(Error::CredentialDecode)?;

        let base_url = effective_endpoint(pc.spec.endpoint.as_deref());
        debug!(provider_config = %reference.name, %base_url, "Resolved provider config");

        Ok(Config {
            base_url,
            api_key: creds.api_key,
        })
    }

    async fn extract(&self, creds: &ProviderCredentials) -> Result<Vec<u8>> {
        match creds.source {
            CredentialsSource::Secret => {
                let selector = creds.secret_ref.as_ref().ok_or_else(|| {
                    Error::CredentialExtraction("no secretRef for Secret source".to_string())
                })?;
                self.secrets
                    .read_bytes(selector)
                    .await
                    .map_err(|e| Error::CredentialExtraction(e.to_string()))
            }
            CredentialsSource::Environment => {
                let env = creds.env.as_ref().ok_or_else(|| {
                    Error::CredentialExtraction("no env selector for Environment source".to_string())
                })?;
                std::env::var(&env.name)
                    .map(String::into_bytes)
                    .map_err(|e| Error::CredentialExtraction(format!("{}: {}", env.name, e)))
            }
            CredentialsSource::Filesystem => {
                let fs = creds.fs.as_ref().ok_or_else(|| {
                    Error::CredentialExtraction("no fs selector for Filesystem source".to_string())
                })?;
                tokio::fs::read(&fs.path)
                    .await
                    .map_err(|e| Error::CredentialExtraction(format!("{}: {}", fs.path, e)))
            }
        }
    }
}

/// The configured endpoint, or SigNoz Cloud, without a trailing slash.
pub fn effective_endpoint(endpoint: Option<&str>) -> String {
    let endpoint = endpoint
        .filter(|e| !e.is_empty())
        .unwrap_or(DEFAULT_ENDPOINT);
    endpoint.strip_suffix('/').unwrap_or(endpoint).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_endpoint() {
        assert_eq!(effective_endpoint(None), "https://api.signoz.cloud");
        assert_eq!(effective_endpoint(Some("")), "https://api.signoz.cloud");
        assert_eq!(
            effective_endpoint(Some("http://signoz.local:3301/")),
            "http://signoz.local:3301"
        );
        assert_eq!(
            effective_endpoint(Some("http://signoz.local:3301")),
            "http://signoz.local:3301"
        );
    }
}
