use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use relay_core::MessageDefinition;
use relay_store::MessageStore;
use serde::Serialize;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::emission::Emitter;
use crate::signal::RestartSignal;

/// Point-in-time view of the scheduler, published after every reload.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SchedulerStatus {
    pub running: bool,
    /// Number of successful reloads so far.
    pub generation: u64,
    pub periodic_tasks: usize,
    /// One-shot emissions started by the most recent reload.
    pub one_shot_tasks: usize,
    pub last_reload: Option<DateTime<Utc>>,
    /// Error from the most recent failed snapshot fetch, cleared on success.
    pub last_error: Option<String>,
}

struct PeriodicTask {
    topic: String,
    handle: JoinHandle<()>,
}

/// Owns the active task set and rebuilds it from store snapshots.
///
/// Reloads run on this scheduler's own loop, so two task sets never coexist.
pub struct Scheduler {
    store: Arc<dyn MessageStore>,
    emitter: Emitter,
    restart: RestartSignal,
    status: watch::Sender<SchedulerStatus>,
    periodic: Vec<PeriodicTask>,
}

impl Scheduler {
    pub fn new(store: Arc<dyn MessageStore>, emitter: Emitter, restart: RestartSignal) -> Self {
        let (status, _) = watch::channel(SchedulerStatus::default());
        Self {
            store,
            emitter,
            restart,
            status,
            periodic: Vec::new(),
        }
    }

    pub fn status(&self) -> watch::Receiver<SchedulerStatus> {
        self.status.subscribe()
    }

    /// Run on a background task. Stop it through the returned handle.
    pub fn spawn(self) -> SchedulerHandle {
        let shutdown = Arc::new(Notify::new());
        let status = self.status();
        let restart = self.restart.clone();
        let task = tokio::spawn(self.run(shutdown.clone()));
        SchedulerHandle {
            restart,
            status,
            shutdown,
            task,
        }
    }

    /// Load once, then reload on every restart signal until `shutdown` fires.
    pub async fn run(mut self, shutdown: Arc<Notify>) {
        info!("scheduler started");
        self.status.send_modify(|s| s.running = true);
        self.reload().await;

        loop {
            tokio::select! {
                biased;
                _ = shutdown.notified() => break,
                _ = self.restart.notified() => {
                    info!("restart requested, reloading message definitions");
                    self.reload().await;
                }
            }
        }

        self.stop_periodic().await;
        self.status.send_modify(|s| {
            s.running = false;
            s.periodic_tasks = 0;
        });
        info!("scheduler stopped");
    }

    async fn reload(&mut self) {
        let snapshot = match self.store.list_definitions().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!(
                    error = %e,
                    kept = self.periodic.len(),
                    "failed to fetch message definitions, keeping current tasks"
                );
                self.status.send_modify(|s| s.last_error = Some(e.to_string()));
                return;
            }
        };

        self.stop_periodic().await;

        if snapshot.is_empty() {
            info!("no message definitions found, nothing to publish");
        }

        let mut one_shots = 0;
        for definition in snapshot {
            match definition.period() {
                Some(period) => {
                    let topic = definition.topic.clone();
                    let handle = tokio::spawn(run_periodic(self.emitter.clone(), definition, period));
                    self.periodic.push(PeriodicTask { topic, handle });
                }
                None => {
                    one_shots += 1;
                    let emitter = self.emitter.clone();
                    tokio::spawn(async move {
                        emitter.emit_logged(&definition).await;
                    });
                }
            }
        }

        let periodic = self.periodic.len();
        info!(periodic, one_shot = one_shots, "message definitions loaded");
        self.status.send_modify(|s| {
            s.generation += 1;
            s.periodic_tasks = periodic;
            s.one_shot_tasks = one_shots;
            s.last_reload = Some(Utc::now());
            s.last_error = None;
        });
    }

    /// Cancel every periodic task and wait until none can fire again.
    async fn stop_periodic(&mut self) {
        for task in &self.periodic {
            task.handle.abort();
        }
        for task in self.periodic.drain(..) {
            if let Err(e) = task.handle.await {
                if !e.is_cancelled() {
                    warn!(topic = %task.topic, error = %e, "emission task ended abnormally");
                }
            }
        }
    }
}

/// First emission one period after start, then every period.
///
/// Emissions run inline, so a slow publish delays the next tick instead of
/// overlapping it.
async fn run_periodic(emitter: Emitter, definition: MessageDefinition, period: Duration) {
    let Some(start) = Instant::now().checked_add(period) else {
        warn!(
            topic = %definition.topic,
            period_secs = period.as_secs(),
            "period too long to schedule, definition will not emit"
        );
        std::future::pending::<()>().await;
        return;
    };
    let mut ticker = tokio::time::interval_at(start, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        ticker.tick().await;
        emitter.emit_logged(&definition).await;
    }
}

/// Control surface for a spawned [`Scheduler`].
pub struct SchedulerHandle {
    restart: RestartSignal,
    status: watch::Receiver<SchedulerStatus>,
    shutdown: Arc<Notify>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    pub fn restart_signal(&self) -> RestartSignal {
        self.restart.clone()
    }

    pub fn status(&self) -> watch::Receiver<SchedulerStatus> {
        self.status.clone()
    }

    /// Stop all timers and wait for the scheduler loop to exit.
    pub async fn stop(self) {
        self.shutdown.notify_one();
        if let Err(e) = self.task.await {
            warn!(error = %e, "scheduler task ended abnormally");
        }
    }
}
