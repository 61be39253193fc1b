//! Alert rule reconciler.

use async_trait::async_trait;
use tracing::debug;

use super::{
    parse_timestamp, require_id, Connector, ExternalClient, ExternalObservation, ShutdownSignal,
};
use crate::apis::{Alert, AlertParameters};
use crate::clients::{is_not_found, RuleData, RulePayload, SignozClient};
use crate::credentials::CredentialResolver;
use crate::drift::alert_up_to_date;
use crate::error::{Error, Result};
use crate::references::ReferenceResolver;

/// Build the API payload for a rule, notifying the given channels.
pub fn rule_payload(params: &AlertParameters, channels: &[String]) -> RulePayload {
    RulePayload {
        alert_name: params.alert_name.clone(),
        alert_type: params.alert_type.clone(),
        eval_window: params.eval_window.clone(),
        frequency: params.frequency.clone(),
        condition: params.condition.clone(),
        labels: params.effective_labels(),
        annotations: params.annotations.clone(),
        preferred_channels: channels.to_vec(),
        disabled: params.disabled,
    }
}

pub struct AlertConnector {
    credentials: CredentialResolver,
    references: ReferenceResolver,
}

impl AlertConnector {
    pub fn new(credentials: CredentialResolver, references: ReferenceResolver) -> Self {
        Self {
            credentials,
            references,
        }
    }
}

#[async_trait]
impl Connector<AlertParameters> for AlertConnector {
    async fn connect(
        &self,
        record: &Alert,
        signal: ShutdownSignal,
    ) -> Result<Box<dyn ExternalClient<AlertParameters>>> {
        let config = self.credentials.resolve(record).await?;
        let client = SignozClient::new(config)?;
        Ok(Box::new(AlertExternal::new(
            client,
            self.references.clone(),
            signal,
        )))
    }
}

pub struct AlertExternal {
    client: SignozClient,
    references: ReferenceResolver,
    signal: ShutdownSignal,
}

impl AlertExternal {
    pub fn new(client: SignozClient, references: ReferenceResolver, signal: ShutdownSignal) -> Self {
        Self {
            client,
            references,
            signal,
        }
    }

    fn refresh_status(record: &mut Alert, remote: &RuleData) {
        let obs = &mut record.status.at_provider;
        obs.id = Some(remote.id.clone());
        obs.state = Some(remote.state.clone()).filter(|s| !s.is_empty());
        if let Some(t) = parse_timestamp(remote.created_at.as_deref()) {
            obs.created_at = Some(t);
        }
        if let Some(t) = parse_timestamp(remote.updated_at.as_deref()) {
            obs.updated_at = Some(t);
        }
    }

    /// Resolve channel references and build the payload from the result.
    async fn payload(&self, record: &mut Alert) -> Result<RulePayload> {
        let channels = self.references.resolve(record).await?;
        Ok(rule_payload(record.params(), &channels))
    }
}

#[async_trait]
impl ExternalClient<AlertParameters> for AlertExternal {
    async fn observe(&self, record: &mut Alert) -> Result<ExternalObservation> {
        let Some(id) = record.metadata.external_name().map(str::to_string) else {
            return Ok(ExternalObservation::absent());
        };

        self.signal.check()?;
        let remote = match self.client.rules().get(&id).await {
            Ok(remote) => remote,
            Err(e) if is_not_found(&e) => {
                debug!(alert = %record.metadata.name, %id, "Rule not found in SigNoz");
                return Ok(ExternalObservation::absent());
            }
            Err(e) => return Err(e.into()),
        };

        Self::refresh_status(record, &remote);
        self.references.resolve(record).await?;

        Ok(ExternalObservation::present(alert_up_to_date(
            record.params(),
            &remote,
        )))
    }

    async fn create(&self, record: &mut Alert) -> Result<()> {
        let payload = self.payload(record).await?;

        self.signal.check()?;
        let created = self.client.rules().create(&payload).await?;
        let id = require_id(created.id, "rules")?;
        record.metadata.set_external_name(id);
        Ok(())
    }

    async fn update(&self, record: &mut Alert) -> Result<()> {
        let id = record
            .metadata
            .external_name()
            .ok_or(Error::MissingExternalName)?
            .to_string();
        let payload = self.payload(record).await?;

        self.signal.check()?;
        self.client.rules().update(&id, &payload).await?;
        Ok(())
    }

    async fn delete(&self, record: &Alert) -> Result<()> {
        let Some(id) = record.metadata.external_name() else {
            return Ok(());
        };

        self.signal.check()?;
        match self.client.rules().delete(id).await {
            Ok(()) => Ok(()),
            Err(e) if is_not_found(&e) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
