//! Recurring task scheduler
//!
//! Owns the clock and the list of recurring tasks. `start` gives each task its
//! own tokio interval loop; `tick_all` runs every task once without timers.
//! Shutdown is observed between ticks only, so a tick that already started
//! always runs to completion.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fieldbook_core::{AppResult, Clock};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Shortest period a task may ask for
const MIN_PERIOD: Duration = Duration::from_secs(1);

/// Work executed on a fixed cadence
#[async_trait]
pub trait RecurringTask: Send + Sync {
    fn name(&self) -> &'static str;

    fn period(&self) -> Duration;

    /// One tick at `now`
    async fn run(&self, now: DateTime<Utc>) -> AppResult<()>;
}

pub struct Scheduler {
    clock: Arc<dyn Clock>,
    tasks: Vec<Arc<dyn RecurringTask>>,
}

impl Scheduler {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            tasks: Vec::new(),
        }
    }

    pub fn with_task(mut self, task: Arc<dyn RecurringTask>) -> Self {
        self.tasks.push(task);
        self
    }

    pub fn task_names(&self) -> Vec<&'static str> {
        self.tasks.iter().map(|t| t.name()).collect()
    }

    /// Run every task once at the clock's current time
    ///
    /// Errors are logged and returned per task; one failing task does not
    /// stop the others.
    pub async fn tick_all(&self) -> Vec<(&'static str, AppResult<()>)> {
        let now = self.clock.now();
        let mut outcomes = Vec::with_capacity(self.tasks.len());

        for task in &self.tasks {
            let result = task.run(now).await;
            log_outcome(task.name(), &result);
            outcomes.push((task.name(), result));
        }

        outcomes
    }

    /// Spawn one background loop per task
    pub fn start(self) -> SchedulerHandle {
        let token = CancellationToken::new();

        let handles = self
            .tasks
            .into_iter()
            .map(|task| {
                let clock = self.clock.clone();
                let token = token.clone();
                tokio::spawn(run_loop(task, clock, token))
            })
            .collect();

        SchedulerHandle { token, handles }
    }
}

async fn run_loop(task: Arc<dyn RecurringTask>, clock: Arc<dyn Clock>, token: CancellationToken) {
    let period = task.period().max(MIN_PERIOD);
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(
        task = task.name(),
        period_secs = period.as_secs(),
        "Recurring task started"
    );

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let result = task.run(clock.now()).await;
        log_outcome(task.name(), &result);
    }

    info!(task = task.name(), "Recurring task stopped");
}

fn log_outcome(name: &str, result: &AppResult<()>) {
    match result {
        Ok(()) => debug!(task = name, "Tick finished"),
        Err(e) => error!(task = name, error = %e, "Tick failed, retrying next period"),
    }
}

/// Handle to the running scheduler
pub struct SchedulerHandle {
    token: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Stop the timers after any in-flight tick finishes
    pub async fn shutdown(self) {
        info!("Stopping scheduler");
        self.token.cancel();

        for result in join_all(self.handles).await {
            if let Err(e) = result {
                error!(error = %e, "Recurring task ended abnormally");
            }
        }

        info!("Scheduler stopped");
    }
}
