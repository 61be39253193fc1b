//! ProviderConfig and Secret records. Both are read-only inputs: the provider
//! never writes them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{DuplicateKind, KindRegistration, Object, ObjectMeta, Registry, ResourceKind, SecretKeySelector};

/// Connection settings for one SigNoz instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub metadata: ObjectMeta,
    pub spec: ProviderConfigSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfigSpec {
    /// Base URL of the SigNoz API; SigNoz Cloud when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    pub credentials: ProviderCredentials,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CredentialsSource {
    #[default]
    Secret,
    Environment,
    Filesystem,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderCredentials {
    pub source: CredentialsSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_ref: Option<SecretKeySelector>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<EnvSelector>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fs: Option<FsSelector>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvSelector {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FsSelector {
    pub path: String,
}

impl ProviderConfig {
    pub fn new(name: impl Into<String>, endpoint: Option<&str>, credentials: ProviderCredentials) -> Self {
        Self {
            metadata: ObjectMeta::new(name),
            spec: ProviderConfigSpec {
                endpoint: endpoint.map(str::to_string),
                credentials,
            },
        }
    }
}

impl Object for ProviderConfig {
    const KIND: ResourceKind = ResourceKind::ProviderConfig;

    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}

/// Namespaced key/value secret.
///
/// Values are held as bytes and written to manifests as UTF-8 strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Secret {
    pub metadata: ObjectMeta,
    #[serde(default, with = "string_bytes")]
    pub data: BTreeMap<String, Vec<u8>>,
}

impl Secret {
    pub fn new(namespace: &str, name: &str) -> Self {
        let mut metadata = ObjectMeta::new(name);
        metadata.namespace = Some(namespace.to_string());
        Self {
            metadata,
            data: BTreeMap::new(),
        }
    }

    pub fn with_entry(mut self, key: &str, value: impl AsRef<[u8]>) -> Self {
        self.data.insert(key.to_string(), value.as_ref().to_vec());
        self
    }
}

impl Object for Secret {
    const KIND: ResourceKind = ResourceKind::Secret;

    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}

mod string_bytes {
    use std::collections::BTreeMap;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(data: &BTreeMap<String, Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_map(
            data.iter()
                .map(|(k, v)| (k, String::from_utf8_lossy(v).into_owned())),
        )
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<BTreeMap<String, Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let data = BTreeMap::<String, String>::deserialize(deserializer)?;
        Ok(data.into_iter().map(|(k, v)| (k, v.into_bytes())).collect())
    }
}

pub fn register(registry: &mut Registry) -> Result<(), DuplicateKind> {
    registry.register(KindRegistration {
        kind: ResourceKind::ProviderConfig,
        managed: false,
    })?;
    registry.register(KindRegistration {
        kind: ResourceKind::Secret,
        managed: false,
    })
}
