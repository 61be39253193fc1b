//! Reconcilers for the managed SigNoz kinds.
//!
//! Each reconcile cycle connects to SigNoz with the record's credentials,
//! observes the remote resource, and creates, updates or deletes it to match
//! the record. Results are written back to the record through the store.

pub mod alert;
pub mod channel;
pub mod dashboard;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::apis::{
    AlertParameters, Condition, DashboardParameters, Managed, NotificationChannelParameters,
    Object, Parameters, Registry, ResourceKind,
};
use crate::clients::ApiError;
use crate::controller::ControllerSet;
use crate::credentials::CredentialResolver;
use crate::error::{Error, Operation, Result};
use crate::references::ReferenceResolver;
use crate::secrets::SecretResolver;
use crate::store::{DataStore, ResourceStore};

pub use alert::AlertConnector;
pub use channel::ChannelConnector;
pub use dashboard::DashboardConnector;

/// What Observe found out about the remote resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExternalObservation {
    pub resource_exists: bool,
    pub resource_up_to_date: bool,
}

impl ExternalObservation {
    pub fn absent() -> Self {
        Self {
            resource_exists: false,
            resource_up_to_date: false,
        }
    }

    pub fn present(up_to_date: bool) -> Self {
        Self {
            resource_exists: true,
            resource_up_to_date: up_to_date,
        }
    }
}

/// Operations on the remote counterpart of one kind of record.
#[async_trait]
pub trait ExternalClient<P: Parameters>: Send + Sync {
    /// Refresh the record's observed status and report whether the remote
    /// resource exists and matches. Makes no call without an external name.
    async fn observe(&self, record: &mut Managed<P>) -> Result<ExternalObservation>;

    /// Create the remote resource and stamp its id as the external name.
    async fn create(&self, record: &mut Managed<P>) -> Result<()>;

    async fn update(&self, record: &mut Managed<P>) -> Result<()>;

    /// Delete the remote resource. Absent resources are not an error.
    async fn delete(&self, record: &Managed<P>) -> Result<()>;

    async fn disconnect(&self) -> Result<()> {
        Ok(())
    }
}

/// Produces a connected [`ExternalClient`] for a record.
#[async_trait]
pub trait Connector<P: Parameters>: Send + Sync {
    async fn connect(
        &self,
        record: &Managed<P>,
        signal: ShutdownSignal,
    ) -> Result<Box<dyn ExternalClient<P>>>;
}

/// Shutdown flag checked before every outbound call.
#[derive(Clone)]
pub struct ShutdownSignal(watch::Receiver<bool>);

impl ShutdownSignal {
    pub fn new(rx: watch::Receiver<bool>) -> Self {
        Self(rx)
    }

    /// A signal that never fires.
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self(rx)
    }

    pub fn is_shutdown(&self) -> bool {
        *self.0.borrow()
    }

    /// `Err(Cancelled)` once shutdown was requested.
    pub fn check(&self) -> Result<()> {
        if self.is_shutdown() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Wait until shutdown is requested.
    pub async fn wait(&mut self) {
        loop {
            if *self.0.borrow_and_update() {
                return;
            }
            if self.0.changed().await.is_err() {
                // Sender gone without signalling; never fires.
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Where a record stood when a reconcile cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileState {
    /// Never created remotely; a create was issued.
    Unobserved,
    Observing,
    /// Had an external name but the remote resource was gone; re-created.
    AbsentRemotely,
    /// Existed with drift; an update was issued.
    PresentDrifted,
    PresentSynced,
    Deleting,
    /// Remote resource deleted and record removed.
    Deleted,
    /// The record was no longer in the store.
    Gone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub state: ReconcileState,
    pub requeue_after: Option<Duration>,
}

impl ReconcileOutcome {
    fn done(state: ReconcileState) -> Self {
        Self {
            state,
            requeue_after: None,
        }
    }
}

/// Kind-erased reconciler driven by the controller.
#[async_trait]
pub trait Reconciler: Send + Sync {
    fn kind(&self) -> ResourceKind;

    /// Keys of every record of the kind.
    async fn keys(&self) -> Result<Vec<String>>;

    /// Run one reconcile cycle for the record with the given key.
    async fn reconcile(&self, key: &str, signal: &ShutdownSignal) -> Result<ReconcileOutcome>;
}

/// Drives Observe and Create, Update or Delete for one kind.
///
/// Never retries or sleeps; the controller decides when to run again.
pub struct ManagedReconciler<P: Parameters> {
    store: Arc<dyn ResourceStore<Managed<P>>>,
    connector: Arc<dyn Connector<P>>,
}

impl<P: Parameters> ManagedReconciler<P> {
    pub fn new(
        store: Arc<dyn ResourceStore<Managed<P>>>,
        connector: Arc<dyn Connector<P>>,
    ) -> Self {
        Self { store, connector }
    }

    async fn run(
        &self,
        record: &mut Managed<P>,
        signal: &ShutdownSignal,
    ) -> Result<ReconcileOutcome> {
        signal.check().map_err(|e| e.during(Operation::Connect))?;
        let external = self
            .connector
            .connect(record, signal.clone())
            .await
            .map_err(|e| e.during(Operation::Connect))?;

        let result = self.drive(record, external.as_ref()).await;

        if let Err(e) = external.disconnect().await {
            warn!("Failed to disconnect from SigNoz: {}", e);
        }
        result
    }

    async fn drive(
        &self,
        record: &mut Managed<P>,
        external: &dyn ExternalClient<P>,
    ) -> Result<ReconcileOutcome> {
        let key = record.key();

        if record.metadata.deletion_requested {
            debug!(kind = %P::KIND, %key, state = ?ReconcileState::Deleting, "Deleting");
            record.status.set_condition(Condition::deleting());
            self.persist(record).await?;

            external
                .delete(record)
                .await
                .map_err(|e| e.during(Operation::Delete))?;
            self.store.remove(&key).await?;
            info!("Deleted {} {}", P::KIND, key);
            return Ok(ReconcileOutcome::done(ReconcileState::Deleted));
        }

        debug!(kind = %P::KIND, %key, state = ?ReconcileState::Observing, "Observing");
        let observation = external
            .observe(record)
            .await
            .map_err(|e| e.during(Operation::Observe))?;

        let outcome = if !observation.resource_exists {
            let state = if record.metadata.external_name().is_some() {
                ReconcileState::AbsentRemotely
            } else {
                ReconcileState::Unobserved
            };
            external
                .create(record)
                .await
                .map_err(|e| e.during(Operation::Create))?;
            record.status.set_condition(Condition::creating());
            info!(
                "Created {} {} (external name {})",
                P::KIND,
                key,
                record.metadata.external_name().unwrap_or_default()
            );
            // Observe again right away so the status reflects the new resource.
            ReconcileOutcome {
                state,
                requeue_after: Some(Duration::ZERO),
            }
        } else if !observation.resource_up_to_date {
            external
                .update(record)
                .await
                .map_err(|e| e.during(Operation::Update))?;
            record.status.set_condition(Condition::available());
            info!("Updated {} {}", P::KIND, key);
            ReconcileOutcome::done(ReconcileState::PresentDrifted)
        } else {
            record.status.set_condition(Condition::available());
            debug!(kind = %P::KIND, %key, "Up to date");
            ReconcileOutcome::done(ReconcileState::PresentSynced)
        };

        record.status.set_condition(Condition::reconcile_success());
        self.persist(record).await?;
        Ok(outcome)
    }

    /// Write the cycle's results onto the stored record. Only the external
    /// name and the status come from `record`; metadata and spec stay as
    /// stored so edits made during the cycle survive.
    async fn persist(&self, record: &Managed<P>) -> Result<()> {
        let key = record.key();
        let external_name = record.metadata.external_name().map(str::to_string);
        let status = record.status.clone();

        let stored = self
            .store
            .update_with(
                &key,
                Box::new(move |stored: &mut Managed<P>| {
                    if let Some(id) = external_name {
                        stored.metadata.set_external_name(id);
                    }
                    stored.status = status;
                }),
            )
            .await?;
        if stored.is_none() {
            debug!(kind = %P::KIND, %key, "Record removed during reconcile");
        }
        Ok(())
    }
}

#[async_trait]
impl<P: Parameters> Reconciler for ManagedReconciler<P> {
    fn kind(&self) -> ResourceKind {
        P::KIND
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let records = self.store.list(&Default::default()).await?;
        Ok(records.iter().map(Object::key).collect())
    }

    async fn reconcile(&self, key: &str, signal: &ShutdownSignal) -> Result<ReconcileOutcome> {
        let Some(mut record) = self.store.get(key).await? else {
            debug!(kind = %P::KIND, key, "Record no longer exists");
            return Ok(ReconcileOutcome::done(ReconcileState::Gone));
        };

        debug!("Reconciling {} {}", P::KIND, key);
        match self.run(&mut record, signal).await {
            Ok(outcome) => Ok(outcome),
            Err(e) if e.is_cancelled() => Err(e),
            Err(e) => {
                record
                    .status
                    .set_condition(Condition::reconcile_error(e.to_string()));
                if let Err(store_err) = self.persist(&record).await {
                    warn!("Failed to record error on {} {}: {}", P::KIND, key, store_err);
                }
                Err(e)
            }
        }
    }
}

/// Wire one controller per managed kind in the registry.
pub fn setup<S>(controllers: &mut ControllerSet, registry: &Registry, store: Arc<S>)
where
    S: DataStore + 'static,
{
    let secrets = SecretResolver::new(store.clone());
    let credentials = CredentialResolver::new(store.clone(), secrets.clone());
    let references = ReferenceResolver::new(store.clone());

    for kind in registry.managed_kinds() {
        let reconciler: Arc<dyn Reconciler> = match kind {
            ResourceKind::Dashboard => Arc::new(ManagedReconciler::<DashboardParameters>::new(
                store.clone(),
                Arc::new(DashboardConnector::new(credentials.clone())),
            )),
            ResourceKind::Alert => Arc::new(ManagedReconciler::<AlertParameters>::new(
                store.clone(),
                Arc::new(AlertConnector::new(credentials.clone(), references.clone())),
            )),
            ResourceKind::NotificationChannel => {
                Arc::new(ManagedReconciler::<NotificationChannelParameters>::new(
                    store.clone(),
                    Arc::new(ChannelConnector::new(credentials.clone(), secrets.clone())),
                ))
            }
            ResourceKind::ProviderConfig | ResourceKind::Secret => {
                warn!("No reconciler for kind {}", kind);
                continue;
            }
        };
        controllers.add(reconciler);
    }
}

/// Parse an RFC 3339 timestamp from the API. Unparseable values are dropped.
pub(crate) fn parse_timestamp(value: Option<&str>) -> Option<DateTime<Utc>> {
    value
        .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
        .map(|t| t.with_timezone(&Utc))
}

/// Ids of newly created resources must be non-empty to serve as external name.
pub(crate) fn require_id(id: String, collection: &str) -> Result<String> {
    if id.is_empty() {
        return Err(ApiError::EmptyResponse(format!("/api/v1/{}", collection)).into());
    }
    Ok(id)
}
