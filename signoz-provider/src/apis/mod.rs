//! Resource model for the SigNoz provider.
//!
//! Every managed record has the same envelope: object metadata, a spec
//! holding the provider config reference plus kind-specific parameters, and a
//! status holding conditions plus kind-specific observed fields.

pub mod alert;
pub mod channel;
pub mod dashboard;
pub mod provider_config;

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use alert::{Alert, AlertObservation, AlertParameters};
pub use channel::{NotificationChannel, NotificationChannelObservation, NotificationChannelParameters};
pub use dashboard::{Dashboard, DashboardObservation, DashboardParameters};
pub use provider_config::{
    CredentialsSource, EnvSelector, FsSelector, ProviderConfig, ProviderConfigSpec,
    ProviderCredentials, Secret,
};

/// Annotation carrying the identifier assigned by SigNoz.
pub const EXTERNAL_NAME_ANNOTATION: &str = "crossplane.io/external-name";

/// Kinds of records known to the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceKind {
    Dashboard,
    Alert,
    NotificationChannel,
    ProviderConfig,
    Secret,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Dashboard => "Dashboard",
            ResourceKind::Alert => "Alert",
            ResourceKind::NotificationChannel => "NotificationChannel",
            ResourceKind::ProviderConfig => "ProviderConfig",
            ResourceKind::Secret => "Secret",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Object metadata shared by every record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    /// Set by whoever wants the record gone; the remote resource is deleted
    /// before the record is removed from the store.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub deletion_requested: bool,
}

impl ObjectMeta {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// The SigNoz identifier, if the resource has been created remotely.
    pub fn external_name(&self) -> Option<&str> {
        self.annotations
            .get(EXTERNAL_NAME_ANNOTATION)
            .map(String::as_str)
            .filter(|id| !id.is_empty())
    }

    pub fn set_external_name(&mut self, id: impl Into<String>) {
        self.annotations
            .insert(EXTERNAL_NAME_ANNOTATION.to_string(), id.into());
    }

    /// Store key: `namespace/name` for namespaced objects, `name` otherwise.
    pub fn key(&self) -> String {
        object_key(self.namespace.as_deref(), &self.name)
    }
}

pub fn object_key(namespace: Option<&str>, name: &str) -> String {
    match namespace {
        Some(ns) if !ns.is_empty() => format!("{}/{}", ns, name),
        _ => name.to_string(),
    }
}

/// Reference to another record by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub name: String,
}

/// Selects a single key of a secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretKeySelector {
    pub name: String,
    pub namespace: String,
    pub key: String,
}

/// Equality-based label selector.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelector {
    #[serde(default)]
    pub match_labels: BTreeMap<String, String>,
}

impl LabelSelector {
    /// An empty selector matches everything.
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.match_labels
            .iter()
            .all(|(k, v)| labels.get(k) == Some(v))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionType {
    Ready,
    Synced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub kind: ConditionType,
    pub status: ConditionStatus,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_transition_time: DateTime<Utc>,
}

impl Condition {
    fn new(kind: ConditionType, status: ConditionStatus, reason: &str) -> Self {
        Self {
            kind,
            status,
            reason: reason.to_string(),
            message: None,
            last_transition_time: Utc::now(),
        }
    }

    pub fn available() -> Self {
        Self::new(ConditionType::Ready, ConditionStatus::True, "Available")
    }

    pub fn creating() -> Self {
        Self::new(ConditionType::Ready, ConditionStatus::False, "Creating")
    }

    pub fn deleting() -> Self {
        Self::new(ConditionType::Ready, ConditionStatus::False, "Deleting")
    }

    pub fn reconcile_success() -> Self {
        Self::new(ConditionType::Synced, ConditionStatus::True, "ReconcileSuccess")
    }

    pub fn reconcile_error(message: impl Into<String>) -> Self {
        let mut c = Self::new(ConditionType::Synced, ConditionStatus::False, "ReconcileError");
        c.message = Some(message.into());
        c
    }

    fn same_state(&self, other: &Condition) -> bool {
        self.kind == other.kind
            && self.status == other.status
            && self.reason == other.reason
            && self.message == other.message
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSpec<P> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_config_ref: Option<Reference>,
    pub for_provider: P,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceStatus<O> {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub at_provider: O,
}

impl<O> ResourceStatus<O> {
    /// Replace the condition of the same type. The transition time is kept
    /// when nothing about the condition changed.
    pub fn set_condition(&mut self, condition: Condition) {
        match self.conditions.iter_mut().find(|c| c.kind == condition.kind) {
            Some(existing) if existing.same_state(&condition) => {}
            Some(existing) => *existing = condition,
            None => self.conditions.push(condition),
        }
    }

    pub fn condition(&self, kind: ConditionType) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.kind == kind)
    }
}

/// Kind-specific parameters of a managed record.
pub trait Parameters:
    Serialize + DeserializeOwned + Clone + fmt::Debug + Send + Sync + 'static
{
    const KIND: ResourceKind;
    type Observation: Serialize
        + DeserializeOwned
        + Clone
        + Default
        + fmt::Debug
        + Send
        + Sync
        + 'static;
}

/// A managed record: desired state for one SigNoz resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Managed<P: Parameters> {
    pub metadata: ObjectMeta,
    pub spec: ResourceSpec<P>,
    #[serde(default)]
    pub status: ResourceStatus<P::Observation>,
}

impl<P: Parameters> Managed<P> {
    pub fn new(name: impl Into<String>, provider_config: Option<&str>, params: P) -> Self {
        Self {
            metadata: ObjectMeta::new(name),
            spec: ResourceSpec {
                provider_config_ref: provider_config.map(|name| Reference {
                    name: name.to_string(),
                }),
                for_provider: params,
            },
            status: ResourceStatus::default(),
        }
    }

    pub fn params(&self) -> &P {
        &self.spec.for_provider
    }

    pub fn observation(&self) -> &P::Observation {
        &self.status.at_provider
    }
}

/// Records that point at a ProviderConfig.
pub trait HasProviderConfigReference {
    fn provider_config_reference(&self) -> Option<&Reference>;
}

impl<P: Parameters> HasProviderConfigReference for Managed<P> {
    fn provider_config_reference(&self) -> Option<&Reference> {
        self.spec.provider_config_ref.as_ref()
    }
}

/// Anything that can be kept in a resource store.
pub trait Object: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const KIND: ResourceKind;

    fn meta(&self) -> &ObjectMeta;
    fn meta_mut(&mut self) -> &mut ObjectMeta;

    fn key(&self) -> String {
        self.meta().key()
    }
}

impl<P: Parameters> Object for Managed<P> {
    const KIND: ResourceKind = P::KIND;

    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}

/// A record of any kind, as it appears in a manifest file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum AnyRecord {
    Dashboard(Dashboard),
    Alert(Alert),
    NotificationChannel(NotificationChannel),
    ProviderConfig(ProviderConfig),
    Secret(Secret),
}

// =============================================================================
// Registry
// =============================================================================

/// Registration entry for one kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KindRegistration {
    pub kind: ResourceKind,
    /// Managed kinds get a controller; the others are read-only inputs.
    pub managed: bool,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("kind {0} registered twice")]
pub struct DuplicateKind(pub ResourceKind);

/// Explicit registry of the kinds this process serves.
///
/// Populated once at startup by [`register_all`]; nothing registers itself.
#[derive(Debug, Default)]
pub struct Registry {
    entries: Vec<KindRegistration>,
}

impl Registry {
    pub fn register(&mut self, entry: KindRegistration) -> Result<(), DuplicateKind> {
        if self.contains(entry.kind) {
            return Err(DuplicateKind(entry.kind));
        }
        self.entries.push(entry);
        Ok(())
    }

    pub fn contains(&self, kind: ResourceKind) -> bool {
        self.entries.iter().any(|e| e.kind == kind)
    }

    /// Managed kinds in registration order.
    pub fn managed_kinds(&self) -> impl Iterator<Item = ResourceKind> + '_ {
        self.entries.iter().filter(|e| e.managed).map(|e| e.kind)
    }
}

/// Register every kind served by the provider.
pub fn register_all(registry: &mut Registry) -> Result<(), DuplicateKind> {
    provider_config::register(registry)?;
    channel::register(registry)?;
    dashboard::register(registry)?;
    alert::register(registry)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_external_name_ignores_empty_annotation() {
        let mut meta = ObjectMeta::new("ops");
        assert_eq!(meta.external_name(), None);

        meta.set_external_name("");
        assert_eq!(meta.external_name(), None);

        meta.set_external_name("42");
        assert_eq!(meta.external_name(), Some("42"));
    }

    #[test]
    fn test_label_selector() {
        let labels: BTreeMap<String, String> = [("team", "sre"), ("env", "prod")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        assert!(LabelSelector::default().matches(&labels));

        let mut selector = LabelSelector::default();
        selector
            .match_labels
            .insert("team".to_string(), "sre".to_string());
        assert!(selector.matches(&labels));

        selector
            .match_labels
            .insert("env".to_string(), "dev".to_string());
        assert!(!selector.matches(&labels));
    }

    #[test]
    fn test_set_condition_keeps_transition_time_when_unchanged() {
        let mut status: ResourceStatus<()> = ResourceStatus::default();
        status.set_condition(Condition::available());
        let first = status.condition(ConditionType::Ready).unwrap().last_transition_time;

        status.set_condition(Condition::available());
        assert_eq!(
            status.condition(ConditionType::Ready).unwrap().last_transition_time,
            first
        );

        status.set_condition(Condition::creating());
        assert_eq!(status.conditions.len(), 1);
        assert_eq!(status.condition(ConditionType::Ready).unwrap().reason, "Creating");
    }

    #[test]
    fn test_registry_rejects_duplicates() {
        let mut registry = Registry::default();
        register_all(&mut registry).unwrap();

        let managed: Vec<_> = registry.managed_kinds().collect();
        assert_eq!(
            managed,
            vec![
                ResourceKind::NotificationChannel,
                ResourceKind::Dashboard,
                ResourceKind::Alert
            ]
        );
        assert!(registry.contains(ResourceKind::ProviderConfig));
        assert!(registry.contains(ResourceKind::Secret));

        assert_eq!(
            alert::register(&mut registry),
            Err(DuplicateKind(ResourceKind::Alert))
        );
    }
}
