//! Controller runtime - turns store events and a poll ticker into reconcile
//! requests for one kind, with bounded concurrency and retry backoff.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, Mutex, Semaphore};
use tokio::task::JoinSet;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::apis::ResourceKind;
use crate::reconciler::{Reconciler, ShutdownSignal};
use crate::store::{DataStore, Event};

/// Tuning knobs shared by all controllers.
#[derive(Debug, Clone)]
pub struct ControllerOptions {
    /// Every record is reconciled at least this often.
    pub poll_interval: Duration,
    /// Reconciles running at once, per kind.
    pub max_concurrent_reconciles: usize,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(600),
            max_concurrent_reconciles: 10,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(300),
        }
    }
}

/// Shortest resync period; smaller configured intervals are raised to it.
const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Delay before the retry following the given number of consecutive failures.
pub fn backoff_delay(failures: u32, initial: Duration, max: Duration) -> Duration {
    let exp = failures.saturating_sub(1).min(31);
    initial.saturating_mul(1u32 << exp).min(max)
}

struct Shared {
    reconciler: Arc<dyn Reconciler>,
    options: ControllerOptions,
    semaphore: Arc<Semaphore>,
    /// Keys being reconciled; `true` when another request arrived meanwhile.
    in_flight: Mutex<HashMap<String, bool>>,
    failures: Mutex<HashMap<String, u32>>,
    queue: mpsc::UnboundedSender<String>,
}

impl Shared {
    fn kind(&self) -> ResourceKind {
        self.reconciler.kind()
    }

    async fn enqueue_all(&self) {
        match self.reconciler.keys().await {
            Ok(keys) => {
                debug!("Resync: {} {} records", keys.len(), self.kind());
                for key in keys {
                    let _ = self.queue.send(key);
                }
            }
            Err(e) => warn!("Failed to list {} records: {}", self.kind(), e),
        }
    }

    fn requeue_after(&self, key: String, delay: Duration, signal: &ShutdownSignal) {
        if delay.is_zero() {
            let _ = self.queue.send(key);
            return;
        }
        let queue = self.queue.clone();
        let mut signal = signal.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    let _ = queue.send(key);
                }
                _ = signal.wait() => {}
            }
        });
    }

    async fn reconcile_one(&self, key: String, signal: ShutdownSignal) {
        let permit = match self.semaphore.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => return,
        };

        match self.reconciler.reconcile(&key, &signal).await {
            Ok(outcome) => {
                self.failures.lock().await.remove(&key);
                debug!(kind = %self.kind(), %key, state = ?outcome.state, "Reconciled");
                if let Some(delay) = outcome.requeue_after {
                    self.requeue_after(key.clone(), delay, &signal);
                }
            }
            Err(e) if e.is_cancelled() => {
                debug!("Reconcile of {} {} cancelled", self.kind(), key);
            }
            Err(e) => {
                let failures = {
                    let mut failures = self.failures.lock().await;
                    let n = failures.entry(key.clone()).or_insert(0);
                    *n += 1;
                    *n
                };
                let delay = backoff_delay(
                    failures,
                    self.options.initial_backoff,
                    self.options.max_backoff,
                );
                error!(
                    kind = %self.kind(),
                    %key,
                    class = ?e.class(),
                    retry_in = ?delay,
                    "Reconcile failed: {}",
                    e
                );
                self.requeue_after(key.clone(), delay, &signal);
            }
        }
        drop(permit);

        let dirty = self.in_flight.lock().await.remove(&key).unwrap_or(false);
        if dirty {
            let _ = self.queue.send(key);
        }
    }
}

/// Runs reconciles for one kind.
pub struct Controller {
    shared: Arc<Shared>,
    queue_rx: mpsc::UnboundedReceiver<String>,
}

impl Controller {
    pub fn new(reconciler: Arc<dyn Reconciler>, options: ControllerOptions) -> Self {
        let (queue, queue_rx) = mpsc::unbounded_channel();
        let permits = options.max_concurrent_reconciles.max(1);
        Self {
            shared: Arc::new(Shared {
                reconciler,
                options,
                semaphore: Arc::new(Semaphore::new(permits)),
                in_flight: Mutex::new(HashMap::new()),
                failures: Mutex::new(HashMap::new()),
                queue,
            }),
            queue_rx,
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.shared.kind()
    }

    /// Run until shutdown, then wait for in-flight reconciles to finish.
    pub async fn run(mut self, mut events: broadcast::Receiver<Event>, shutdown: ShutdownSignal) {
        let kind = self.kind();
        info!("Starting {} controller", kind);

        let mut ticker = interval(self.shared.options.poll_interval.max(MIN_POLL_INTERVAL));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut tasks = JoinSet::new();
        let mut stop = shutdown.clone();

        loop {
            tokio::select! {
                _ = stop.wait() => break,
                _ = ticker.tick() => self.shared.enqueue_all().await,
                event = events.recv() => match event {
                    Ok(event) if event.kind() == kind && event.is_desired_state_change() => {
                        let _ = self.shared.queue.send(event.key().to_string());
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(n)) => {
                        warn!("{} controller missed {} events, resyncing", kind, n);
                        self.shared.enqueue_all().await;
                    }
                    Err(RecvError::Closed) => {
                        info!("Event stream closed");
                        break;
                    }
                },
                Some(key) = self.queue_rx.recv() => {
                    self.dispatch(key, &mut tasks, &shutdown).await;
                }
                Some(res) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = res {
                        error!("Reconcile task failed: {}", e);
                    }
                }
            }
        }

        info!("Stopping {} controller", kind);
        while tasks.join_next().await.is_some() {}
    }

    async fn dispatch(&self, key: String, tasks: &mut JoinSet<()>, shutdown: &ShutdownSignal) {
        {
            let mut in_flight = self.shared.in_flight.lock().await;
            if let Some(dirty) = in_flight.get_mut(&key) {
                *dirty = true;
                return;
            }
            in_flight.insert(key.clone(), false);
        }

        let shared = self.shared.clone();
        let signal = shutdown.clone();
        tasks.spawn(async move { shared.reconcile_one(key, signal).await });
    }
}

/// All controllers of the process.
pub struct ControllerSet {
    options: ControllerOptions,
    controllers: Vec<Controller>,
}

impl ControllerSet {
    pub fn new(options: ControllerOptions) -> Self {
        Self {
            options,
            controllers: Vec::new(),
        }
    }

    pub fn add(&mut self, reconciler: Arc<dyn Reconciler>) {
        self.controllers
            .push(Controller::new(reconciler, self.options.clone()));
    }

    pub fn kinds(&self) -> Vec<ResourceKind> {
        self.controllers.iter().map(Controller::kind).collect()
    }

    /// Run every controller until shutdown.
    pub async fn run<S: DataStore + ?Sized>(self, store: &S, shutdown: ShutdownSignal) {
        let mut handles = JoinSet::new();
        for controller in self.controllers {
            let events = store.subscribe();
            handles.spawn(controller.run(events, shutdown.clone()));
        }
        while let Some(res) = handles.join_next().await {
            if let Err(e) = res {
                error!("Controller task failed: {}", e);
            }
        }
    }
}
