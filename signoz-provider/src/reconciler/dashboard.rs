//! Dashboard reconciler.

use async_trait::async_trait;
use tracing::debug;

use super::{
    parse_timestamp, require_id, Connector, ExternalClient, ExternalObservation, ShutdownSignal,
};
use crate::apis::{Dashboard, DashboardParameters};
use crate::clients::{is_not_found, DashboardData, DashboardPayload, SignozClient};
use crate::credentials::CredentialResolver;
use crate::drift::dashboard_up_to_date;
use crate::error::{Error, Result};

/// Build the API payload for a dashboard.
pub fn dashboard_payload(params: &DashboardParameters) -> DashboardPayload {
    DashboardPayload {
        title: params.title.clone(),
        description: params.description.clone().unwrap_or_default(),
        tags: params.tags.clone(),
        layout: params.layout.clone(),
        widgets: params.widgets.clone(),
        variables: params.variables.clone(),
    }
}

pub struct DashboardConnector {
    credentials: CredentialResolver,
}

impl DashboardConnector {
    pub fn new(credentials: CredentialResolver) -> Self {
        Self { credentials }
    }
}

#[async_trait]
impl Connector<DashboardParameters> for DashboardConnector {
    async fn connect(
        &self,
        record: &Dashboard,
        signal: ShutdownSignal,
    ) -> Result<Box<dyn ExternalClient<DashboardParameters>>> {
        let config = self.credentials.resolve(record).await?;
        let client = SignozClient::new(config)?;
        Ok(Box::new(DashboardExternal::new(client, signal)))
    }
}

pub struct DashboardExternal {
    client: SignozClient,
    signal: ShutdownSignal,
}

impl DashboardExternal {
    pub fn new(client: SignozClient, signal: ShutdownSignal) -> Self {
        Self { client, signal }
    }

    fn refresh_status(record: &mut Dashboard, remote: &DashboardData) {
        let obs = &mut record.status.at_provider;
        obs.id = Some(remote.id.clone());
        obs.uuid = Some(remote.uuid.clone()).filter(|u| !u.is_empty());
        if let Some(t) = parse_timestamp(remote.created_at.as_deref()) {
            obs.created_at = Some(t);
        }
        if let Some(t) = parse_timestamp(remote.updated_at.as_deref()) {
            obs.updated_at = Some(t);
        }
    }
}

#[async_trait]
impl ExternalClient<DashboardParameters> for DashboardExternal {
    async fn observe(&self, record: &mut Dashboard) -> Result<ExternalObservation> {
        let Some(id) = record.metadata.external_name().map(str::to_string) else {
            return Ok(ExternalObservation::absent());
        };

        self.signal.check()?;
        let remote = match self.client.dashboards().get(&id).await {
            Ok(remote) => remote,
            Err(e) if is_not_found(&e) => {
                debug!(dashboard = %record.metadata.name, %id, "Dashboard not found in SigNoz");
                return Ok(ExternalObservation::absent());
            }
            Err(e) => return Err(e.into()),
        };

        Self::refresh_status(record, &remote);
        Ok(ExternalObservation::present(dashboard_up_to_date(
            record.params(),
            &remote,
        )))
    }

    async fn create(&self, record: &mut Dashboard) -> Result<()> {
        let payload = dashboard_payload(record.params());

        self.signal.check()?;
        let created = self.client.dashboards().create(&payload).await?;
        let id = require_id(created.id, "dashboards")?;
        record.metadata.set_external_name(id);
        Ok(())
    }

    async fn update(&self, record: &mut Dashboard) -> Result<()> {
        let id = record
            .metadata
            .external_name()
            .ok_or(Error::MissingExternalName)?
            .to_string();
        let payload = dashboard_payload(record.params());

        self.signal.check()?;
        self.client.dashboards().update(&id, &payload).await?;
        Ok(())
    }

    async fn delete(&self, record: &Dashboard) -> Result<()> {
        let Some(id) = record.metadata.external_name() else {
            return Ok(());
        };

        self.signal.check()?;
        match self.client.dashboards().delete(id).await {
            Ok(()) => Ok(()),
            Err(e) if is_not_found(&e) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
