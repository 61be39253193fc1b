//! Resolution of an alert's channel references into SigNoz channel ids.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use crate::apis::{object_key, Alert, NotificationChannel};
use crate::error::{Error, Result};
use crate::store::ResourceStore;

#[derive(Clone)]
pub struct ReferenceResolver {
    channels: Arc<dyn ResourceStore<NotificationChannel>>,
}

impl ReferenceResolver {
    pub fn new(channels: Arc<dyn ResourceStore<NotificationChannel>>) -> Self {
        Self { channels }
    }

    /// Resolve preferred channels, explicit references and the selector, in
    /// that order, and record the result in the alert's status.
    ///
    /// References and the selector only see channels in the alert's own
    /// namespace. Referenced channels that have not been created in SigNoz yet
    /// are skipped; the next reconcile picks them up.
    pub async fn resolve(&self, alert: &mut Alert) -> Result<Vec<String>> {
        let params = &alert.spec.for_provider;
        let namespace = alert.metadata.namespace.as_deref().filter(|ns| !ns.is_empty());
        let mut ids = params.preferred_channels.clone();

        for reference in &params.channel_ids_ref {
            let channel = self
                .channels
                .get(&object_key(namespace, &reference.name))
                .await
                .map_err(|e| Error::ReferenceResolution {
                    reference: reference.name.clone(),
                    reason: e.to_string(),
                })?
                .ok_or_else(|| Error::ReferenceResolution {
                    reference: reference.name.clone(),
                    reason: "channel not found".to_string(),
                })?;

            match channel.metadata.external_name() {
                Some(id) => ids.push(id.to_string()),
                None => debug!(
                    alert = %alert.metadata.name,
                    channel = %reference.name,
                    "Referenced channel has no external name yet, skipping"
                ),
            }
        }

        if let Some(selector) = &params.channel_ids_selector {
            let matched = self
                .channels
                .list(selector)
                .await
                .map_err(|e| Error::ReferenceResolution {
                    reference: format!("selector {:?}", selector.match_labels),
                    reason: e.to_string(),
                })?;
            ids.extend(
                matched
                    .iter()
                    .filter(|c| c.metadata.key() == object_key(namespace, &c.metadata.name))
                    .filter_map(|c| c.metadata.external_name().map(str::to_string)),
            );
        }

        let ids = dedup_stable(ids);
        alert.status.at_provider.resolved_channel_ids = ids.clone();
        Ok(ids)
    }
}

/// Drop repeated ids, keeping the first occurrence.
pub fn dedup_stable(ids: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(id.clone())).collect()
}
