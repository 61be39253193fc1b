//! Notification channel reconciler.

use async_trait::async_trait;
use tracing::debug;

use super::{
    parse_timestamp, require_id, Connector, ExternalClient, ExternalObservation, ShutdownSignal,
};
use crate::apis::{NotificationChannel, NotificationChannelParameters};
use crate::clients::types::{
    EmailData, EmptyData, MsTeamsData, OpsGenieData, PagerDutyData, SlackData, SnsData,
    WebhookData,
};
use crate::clients::{is_not_found, ChannelData, ChannelPayload, ChannelSettings, SignozClient};
use crate::credentials::CredentialResolver;
use crate::drift::channel_up_to_date;
use crate::error::{Error, Result};
use crate::secrets::SecretResolver;

/// Build the API payload for a channel, resolving secret-backed fields.
///
/// Only the first configuration of the declared type is used. Unsupported
/// types fail before any secret is read.
pub async fn channel_payload(
    params: &NotificationChannelParameters,
    secrets: &SecretResolver,
) -> Result<ChannelPayload> {
    let settings = match params.channel_type.as_str() {
        "slack" => match params.slack_configs.first() {
            Some(c) => ChannelSettings::Slack(SlackData {
                channel: c.channel.clone(),
                webhook_url: secrets
                    .resolve_optional(c.webhook_url.as_deref(), c.webhook_url_secret_ref.as_ref())
                    .await?,
                title: c.title.clone(),
                send_resolved: c.send_resolved,
            }),
            None => ChannelSettings::Empty(EmptyData {}),
        },
        "webhook" => match params.webhook_configs.first() {
            Some(c) => ChannelSettings::Webhook(WebhookData {
                url: secrets
                    .resolve_optional(c.url.as_deref(), c.url_secret_ref.as_ref())
                    .await?,
                http_method: c.method.clone(),
                max_alerts: c.max_alerts,
                send_resolved: c.send_resolved,
            }),
            None => ChannelSettings::Empty(EmptyData {}),
        },
        "pagerduty" => match params.pagerduty_configs.first() {
            Some(c) => ChannelSettings::PagerDuty(PagerDutyData {
                routing_key: secrets
                    .resolve_optional(c.routing_key.as_deref(), c.routing_key_secret_ref.as_ref())
                    .await?,
                service_key: secrets
                    .resolve_optional(c.service_key.as_deref(), c.service_key_secret_ref.as_ref())
                    .await?,
                severity: c.severity.clone(),
                send_resolved: c.send_resolved,
            }),
            None => ChannelSettings::Empty(EmptyData {}),
        },
        "email" => match params.email_configs.first() {
            Some(c) => ChannelSettings::Email(EmailData {
                to: c.to.clone(),
                send_resolved: c.send_resolved,
            }),
            None => ChannelSettings::Empty(EmptyData {}),
        },
        "opsgenie" => match params.opsgenie_configs.first() {
            Some(c) => ChannelSettings::OpsGenie(OpsGenieData {
                api_key: secrets
                    .resolve_optional(c.api_key.as_deref(), c.api_key_secret_ref.as_ref())
                    .await?,
                priority: c.priority.clone(),
                send_resolved: c.send_resolved,
            }),
            None => ChannelSettings::Empty(EmptyData {}),
        },
        "msteams" => match params.msteams_configs.first() {
            Some(c) => ChannelSettings::MsTeams(MsTeamsData {
                webhook_url: secrets
                    .resolve_optional(c.webhook_url.as_deref(), c.webhook_url_secret_ref.as_ref())
                    .await?,
                title: c.title.clone(),
                send_resolved: c.send_resolved,
            }),
            None => ChannelSettings::Empty(EmptyData {}),
        },
        "sns" => match params.sns_configs.first() {
            Some(c) => ChannelSettings::Sns(SnsData {
                topic_arn: c.topic_arn.clone(),
                region: c.region.clone(),
                access_key: secrets
                    .resolve_optional(None, c.access_key_secret_ref.as_ref())
                    .await?,
                secret_key: secrets
                    .resolve_optional(None, c.secret_key_secret_ref.as_ref())
                    .await?,
                send_resolved: c.send_resolved,
            }),
            None => ChannelSettings::Empty(EmptyData {}),
        },
        other => return Err(Error::UnsupportedConfiguration(other.to_string())),
    };

    Ok(ChannelPayload {
        name: params.name.clone(),
        channel_type: params.channel_type.clone(),
        data: settings,
    })
}

pub struct ChannelConnector {
    credentials: CredentialResolver,
    secrets: SecretResolver,
}

impl ChannelConnector {
    pub fn new(credentials: CredentialResolver, secrets: SecretResolver) -> Self {
        Self {
            credentials,
            secrets,
        }
    }
}

#[async_trait]
impl Connector<NotificationChannelParameters> for ChannelConnector {
    async fn connect(
        &self,
        record: &NotificationChannel,
        signal: ShutdownSignal,
    ) -> Result<Box<dyn ExternalClient<NotificationChannelParameters>>> {
        let config = self.credentials.resolve(record).await?;
        let client = SignozClient::new(config)?;
        Ok(Box::new(ChannelExternal::new(
            client,
            self.secrets.clone(),
            signal,
        )))
    }
}

pub struct ChannelExternal {
    client: SignozClient,
    secrets: SecretResolver,
    signal: ShutdownSignal,
}

impl ChannelExternal {
    pub fn new(client: SignozClient, secrets: SecretResolver, signal: ShutdownSignal) -> Self {
        Self {
            client,
            secrets,
            signal,
        }
    }

    fn refresh_status(record: &mut NotificationChannel, remote: &ChannelData) {
        let obs = &mut record.status.at_provider;
        obs.id = Some(remote.id.clone());
        if let Some(t) = parse_timestamp(remote.created_at.as_deref()) {
            obs.created_at = Some(t);
        }
        if let Some(t) = parse_timestamp(remote.updated_at.as_deref()) {
            obs.updated_at = Some(t);
        }
    }
}

#[async_trait]
impl ExternalClient<NotificationChannelParameters> for ChannelExternal {
    async fn observe(&self, record: &mut NotificationChannel) -> Result<ExternalObservation> {
        let Some(id) = record.metadata.external_name().map(str::to_string) else {
            return Ok(ExternalObservation::absent());
        };

        self.signal.check()?;
        let remote = match self.client.channels().get(&id).await {
            Ok(remote) => remote,
            Err(e) if is_not_found(&e) => {
                debug!(channel = %record.metadata.name, %id, "Channel not found in SigNoz");
                return Ok(ExternalObservation::absent());
            }
            Err(e) => return Err(e.into()),
        };

        Self::refresh_status(record, &remote);
        Ok(ExternalObservation::present(channel_up_to_date(
            record.params(),
            &remote,
        )))
    }

    async fn create(&self, record: &mut NotificationChannel) -> Result<()> {
        let payload = channel_payload(record.params(), &self.secrets).await?;

        self.signal.check()?;
        let created = self.client.channels().create(&payload).await?;
        let id = require_id(created.id, "channels")?;
        record.metadata.set_external_name(id);
        Ok(())
    }

    async fn update(&self, record: &mut NotificationChannel) -> Result<()> {
        let id = record
            .metadata
            .external_name()
            .ok_or(Error::MissingExternalName)?
            .to_string();
        let payload = channel_payload(record.params(), &self.secrets).await?;

        self.signal.check()?;
        self.client.channels().update(&id, &payload).await?;
        Ok(())
    }

    async fn delete(&self, record: &NotificationChannel) -> Result<()> {
        let Some(id) = record.metadata.external_name() else {
            return Ok(());
        };

        self.signal.check()?;
        match self.client.channels().delete(id).await {
            Ok(()) => Ok(()),
            Err(e) if is_not_found(&e) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
